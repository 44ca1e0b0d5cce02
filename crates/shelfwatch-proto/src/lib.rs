//! Shelfwatch line protocol.
//!
//! Text protocol between the shelfwatch driver and a library System Under
//! Test. The driver writes a book inventory followed by day-prefixed
//! commands to the SUT's stdin; the SUT answers on stdout with response
//! lines whose number depends on the command (see [`ResponseShape`]).
//!
//! This crate only knows about shapes. It performs no I/O and holds no
//! library state: deciding whether a well-formed response is *correct* is
//! the rule checker's job.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod command;
pub mod errors;
pub mod ids;
pub mod inventory;
pub mod location;
pub mod response;

pub use command::{ActionVerb, Command, DATE_FORMAT, ResponseShape, parse_date_token};
pub use errors::{ProtocolError, Result};
pub use ids::{BookCopyId, BookType, Isbn, StudentId};
pub use inventory::Inventory;
pub use location::Location;
pub use response::{
    ActionLine, ActionResponse, CreditLine, MoveLine, Status, TraceEntry, TraceHeader,
    parse_move_count,
};
