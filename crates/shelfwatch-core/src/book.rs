//! Physical book copies and their movement history.

use chrono::NaiveDate;
use shelfwatch_proto::{BookCopyId, BookType, Isbn, Location, StudentId};

/// One recorded movement of a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceRecord {
    /// Day the move happened.
    pub date: NaiveDate,
    /// Where the copy was.
    pub from: Location,
    /// Where the copy went.
    pub to: Location,
}

/// A single physical copy of a title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookCopy {
    pub(crate) id: BookCopyId,
    pub(crate) location: Location,
    pub(crate) holder: Option<StudentId>,
    pub(crate) reserved_for: Option<StudentId>,
    pub(crate) pickup_deadline: Option<NaiveDate>,
    pub(crate) trace: Vec<TraceRecord>,
}

impl BookCopy {
    pub(crate) fn on_bookshelf(id: BookCopyId) -> Self {
        Self {
            id,
            location: Location::Bookshelf,
            holder: None,
            reserved_for: None,
            pickup_deadline: None,
            trace: Vec::new(),
        }
    }

    /// Copy identifier.
    pub fn id(&self) -> BookCopyId {
        self.id
    }

    /// Title this copy belongs to.
    pub fn isbn(&self) -> Isbn {
        self.id.isbn()
    }

    /// Book type of the title.
    pub fn book_type(&self) -> BookType {
        self.id.book_type()
    }

    /// Current location.
    pub fn location(&self) -> Location {
        self.location
    }

    /// Student holding the copy. Set only while the copy is with a user or
    /// in the reading room.
    pub fn holder(&self) -> Option<&StudentId> {
        self.holder.as_ref()
    }

    /// Student the copy is reserved for at the appointment office.
    pub fn reserved_for(&self) -> Option<&StudentId> {
        self.reserved_for.as_ref()
    }

    /// Last day the reservation can be picked up.
    pub fn pickup_deadline(&self) -> Option<NaiveDate> {
        self.pickup_deadline
    }

    /// Movement history, oldest first.
    pub fn trace(&self) -> &[TraceRecord] {
        &self.trace
    }

    /// Whether a reservation on this copy has lapsed as of `today`.
    pub fn reservation_expired(&self, today: NaiveDate) -> bool {
        self.pickup_deadline.is_some_and(|deadline| today > deadline)
    }
}
