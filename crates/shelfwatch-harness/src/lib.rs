//! Test oracle for library lending systems.
//!
//! Validates what a library SUT prints against the reference model in
//! `shelfwatch-core`, and produces the commands that drive it.
//!
//! # Checking
//!
//! [`RuleChecker`] judges one response at a time and applies legal ones to
//! the model. [`check_batch`] runs the checker over a whole batch on a copy
//! of the model, so a failed batch never leaves the caller's model half
//! updated.
//!
//! # Generation
//!
//! [`CommandGenerator`] proposes day batches from a seeded RNG and a
//! [`GeneratorConfig`] profile. Same seed and profile, same commands.
//!
//! # Invariant Testing
//!
//! The `invariants` module holds structural properties of the model itself.
//! Use [`InvariantRegistry::standard()`] after every committed batch.
//!
//! # Simulation
//!
//! [`SimLibrary`] is a correct library SUT in process, optionally with a
//! [`SimFault`] injected. Tests and `shelfwatch self-test` run against it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod batch;
pub mod checker;
pub mod generator;
pub mod invariants;
pub mod sim_library;
pub mod violation;

pub use batch::{check_batch, response_len};
pub use checker::{CheckResult, RuleChecker};
pub use generator::{
    CommandGenerator, CommandWeights, ConfigError, DayBatch, GeneratorConfig, TypePriority,
};
pub use invariants::{
    HolderConsistency, Invariant, InvariantRegistry, InvariantResult, InvariantViolation,
    ReservationConsistency, ShelfIndexConsistency, TraceMatchesLocation,
};
pub use sim_library::{SimError, SimFault, SimLibrary};
pub use violation::{BatchFailure, Violation, ViolationKind};
