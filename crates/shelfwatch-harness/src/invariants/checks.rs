//! Standard model invariants.

use std::collections::BTreeSet;

use shelfwatch_core::LibrarySystem;
use shelfwatch_proto::{BookType, Location};

use super::{Invariant, InvariantResult, InvariantViolation};

/// Every trace chains and ends where the copy is.
///
/// Consecutive records connect (`to` of one is `from` of the next), dates
/// never decrease, no record moves a copy onto itself, and the last `to`
/// is the current location. An untraced copy is still on the bookshelf.
pub struct TraceMatchesLocation;

impl Invariant for TraceMatchesLocation {
    fn name(&self) -> &'static str {
        "TraceMatchesLocation"
    }

    fn check(&self, model: &LibrarySystem) -> InvariantResult {
        for copy in model.copies() {
            let trace = copy.trace();
            let fail = |message: String| InvariantViolation { invariant: self.name(), message };

            if let Some(record) = trace.iter().find(|record| record.from == record.to) {
                return Err(fail(format!("{}: self-move at {}", copy.id(), record.date)));
            }
            for pair in trace.windows(2) {
                if pair[0].to != pair[1].from || pair[1].date < pair[0].date {
                    return Err(fail(format!(
                        "{}: trace breaks between {:?} and {:?}",
                        copy.id(),
                        pair[0],
                        pair[1]
                    )));
                }
            }
            let expected = trace.last().map_or(Location::Bookshelf, |record| record.to);
            if copy.location() != expected {
                return Err(fail(format!(
                    "{}: at {} but trace ends at {expected}",
                    copy.id(),
                    copy.location()
                )));
            }
        }
        Ok(())
    }
}

/// Loans and holders agree.
///
/// A copy with a user has a holder who records the loan; a copy in the
/// reading room has a holder; any other copy has none. Every recorded loan
/// points at a copy with that student, and C loans are keyed by their own
/// title.
pub struct HolderConsistency;

impl Invariant for HolderConsistency {
    fn name(&self) -> &'static str {
        "HolderConsistency"
    }

    fn check(&self, model: &LibrarySystem) -> InvariantResult {
        let fail = |message: String| InvariantViolation { invariant: self.name(), message };

        for copy in model.copies() {
            match (copy.location(), copy.holder()) {
                (Location::User, Some(holder)) => {
                    let recorded = model.student(holder).and_then(|s| s.loan_of(copy.id()));
                    if recorded.is_none() {
                        return Err(fail(format!("{} is with {holder} but not on loan", copy.id())));
                    }
                },
                (Location::User | Location::ReadingRoom, None) => {
                    return Err(fail(format!("{} at {} has no holder", copy.id(), copy.location())));
                },
                (Location::User | Location::ReadingRoom, Some(_)) | (_, None) => {},
                (location, Some(holder)) => {
                    return Err(fail(format!("{} at {location} still held by {holder}", copy.id())));
                },
            }
        }

        for student in model.students() {
            if let Some(loan) = student.held_b()
                && loan.copy.book_type() != BookType::B
            {
                return Err(fail(format!("{}: B slot holds {}", student.id(), loan.copy)));
            }
            for (isbn, loan) in student.held_c() {
                if loan.copy.isbn() != *isbn || isbn.book_type() != BookType::C {
                    return Err(fail(format!("{}: C loan {isbn} holds {}", student.id(), loan.copy)));
                }
            }
            for loan in student.loans() {
                let with_student = model.copy(loan.copy).is_some_and(|copy| {
                    copy.location() == Location::User && copy.holder() == Some(student.id())
                });
                if !with_student {
                    return Err(fail(format!("{}: loan of {} is stale", student.id(), loan.copy)));
                }
            }
        }
        Ok(())
    }
}

/// Both sides of a reservation agree.
///
/// Reservation fields on a copy exist only at the appointment office and
/// always come as a pair. A student's reserved copy is reserved for them,
/// and nobody has a pending order and a reservation at once.
pub struct ReservationConsistency;

impl Invariant for ReservationConsistency {
    fn name(&self) -> &'static str {
        "ReservationConsistency"
    }

    fn check(&self, model: &LibrarySystem) -> InvariantResult {
        let fail = |message: String| InvariantViolation { invariant: self.name(), message };

        for copy in model.copies() {
            let reserved = copy.reserved_for().is_some();
            if reserved != copy.pickup_deadline().is_some() {
                return Err(fail(format!("{}: half-recorded reservation", copy.id())));
            }
            if reserved && copy.location() != Location::AppointmentOffice {
                return Err(fail(format!("{} reserved but at {}", copy.id(), copy.location())));
            }
        }

        for student in model.students() {
            if student.pending_order().is_some() && student.reserved_copy().is_some() {
                return Err(fail(format!("{}: pending order and reservation", student.id())));
            }
            if let Some(id) = student.reserved_copy() {
                let matches = model.copy(id).is_some_and(|copy| {
                    copy.reserved_for() == Some(student.id())
                        && copy.pickup_deadline() == student.pickup_deadline()
                });
                if !matches {
                    return Err(fail(format!("{}: reservation of {id} not on the copy", student.id())));
                }
            }
        }
        Ok(())
    }
}

/// The shelf index lists exactly the copies on `bs` and `hbs`.
pub struct ShelfIndexConsistency;

impl Invariant for ShelfIndexConsistency {
    fn name(&self) -> &'static str {
        "ShelfIndexConsistency"
    }

    fn check(&self, model: &LibrarySystem) -> InvariantResult {
        for &isbn in model.titles() {
            let indexed: BTreeSet<_> = model.shelved_copies(isbn).collect();
            let actual: BTreeSet<_> = model
                .copies()
                .filter(|copy| copy.isbn() == isbn && copy.location().is_shelf())
                .map(|copy| copy.id())
                .collect();
            if indexed != actual {
                return Err(InvariantViolation {
                    invariant: self.name(),
                    message: format!("{isbn}: index {indexed:?}, shelves {actual:?}"),
                });
            }
        }
        Ok(())
    }
}
