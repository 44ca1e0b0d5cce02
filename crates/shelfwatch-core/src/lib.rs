//! Shelfwatch reference model.
//!
//! An in-memory model of the library lending domain: book copies and where
//! they are, students and what they hold, the calendar with its day-boundary
//! penalties, and the hot-title bookkeeping that drives shelf placement.
//!
//! The model is the oracle. It never talks to a SUT; the harness feeds it
//! actions it has already validated and asks it what the SUT should be able
//! to do next.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod book;
pub mod error;
mod library;
mod permission;
pub mod rules;
mod student;

pub use book::{BookCopy, TraceRecord};
pub use error::{ModelError, Result};
pub use library::LibrarySystem;
pub use permission::Denial;
pub use rules::TidyKind;
pub use student::{Loan, Student};
