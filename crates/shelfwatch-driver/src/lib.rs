//! Shelfwatch process driver.
//!
//! Runs a library SUT as a child process, feeds it generated commands and
//! certifies every answer against the reference model in `shelfwatch-core`.
//!
//! # Components
//!
//! - [`Sut`]: line-oriented view of the system under test
//! - [`ProcessSut`]: a SUT in a child process, pumped by Tokio tasks
//! - [`SimSut`]: the in-process simulated library behind the same trait
//! - [`Driver`]: open/close cycles, batch collection, commit or abort
//! - [`Transcript`]: stdin/stdout logs of a run
//! - [`Verdict`]: the JSON object printed for the outer harness
//! - [`check_transcript`]: offline validation of a recorded exchange

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod driver;
pub mod error;
pub mod offline;
pub mod sim;
pub mod sut;
pub mod transcript;
pub mod verdict;

pub use config::{DriverConfig, load_profile};
pub use driver::{Driver, RunSummary};
pub use error::{DriverError, Result, SutError};
pub use offline::check_transcript;
pub use sim::SimSut;
pub use sut::{ProcessSut, Sut};
pub use transcript::Transcript;
pub use verdict::Verdict;
