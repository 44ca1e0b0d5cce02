//! Permission predicates shared by validation, generation and simulation.
//!
//! Each predicate answers "would the reference library allow this?" and,
//! when it would not, names the first rule that blocks the action. The
//! rule checker uses them to decide whether a reject is legitimate, the
//! command generator to pick useful commands, and the simulated library to
//! behave correctly.

use chrono::NaiveDate;
use shelfwatch_proto::{BookCopyId, BookType, Isbn, Location, StudentId};
use thiserror::Error;

use crate::{BookCopy, LibrarySystem, Student, rules};

/// Why the reference library would refuse an action.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// Credit below the action's threshold.
    #[error("credit {credit} below required {required}")]
    CreditTooLow {
        /// Student's current credit
        credit: i64,
        /// Minimum needed
        required: i64,
    },

    /// Type A titles are reference-only.
    #[error("{0} is reference-only")]
    ReferenceOnly(Isbn),

    /// No copy of the title is on a shelf.
    #[error("no copy of {0} on a shelf")]
    NoShelvedCopy(Isbn),

    /// The copy is not on a shelf.
    #[error("{copy} is at {location}, not on a shelf")]
    NotOnShelf {
        /// Copy in question
        copy: BookCopyId,
        /// Where it actually is
        location: Location,
    },

    /// Student already holds a type B book.
    #[error("already holds B book {0}")]
    AlreadyHoldsB(BookCopyId),

    /// Student already holds a copy of this type C title.
    #[error("already holds {0}")]
    AlreadyHoldsTitle(BookCopyId),

    /// An order or reservation is already outstanding.
    #[error("order or reservation already outstanding")]
    OrderOutstanding,

    /// Nothing is reserved for the student.
    #[error("nothing reserved")]
    NothingReserved,

    /// The reservation is for a different title.
    #[error("reservation is for {reserved}, not {requested}")]
    ReservedDifferentTitle {
        /// Reserved title
        reserved: Isbn,
        /// Requested title
        requested: Isbn,
    },

    /// The reserved copy is not waiting at the appointment office.
    #[error("{0} is not waiting at the appointment office")]
    NotAwaitingPickup(BookCopyId),

    /// The pickup window has closed.
    #[error("reservation expired on {0}")]
    ReservationExpired(NaiveDate),

    /// Student is already reading something today.
    #[error("already reading {0}")]
    AlreadyReading(BookCopyId),

    /// The copy is not on loan to the student.
    #[error("{0} is not on loan to this student")]
    NotOnLoan(BookCopyId),

    /// The copy is not the student's current read.
    #[error("{0} is not being read by this student")]
    NotReading(BookCopyId),
}

type Permission = Result<(), Denial>;

fn require_credit(student: &Student, required: i64) -> Permission {
    if student.credit() < required {
        return Err(Denial::CreditTooLow { credit: student.credit(), required });
    }
    Ok(())
}

fn require_lendable(isbn: Isbn) -> Permission {
    if isbn.book_type().is_lendable() { Ok(()) } else { Err(Denial::ReferenceOnly(isbn)) }
}

fn require_no_blocking_loan(student: &Student, isbn: Isbn) -> Permission {
    match (isbn.book_type(), student.blocking_loan(isbn)) {
        (BookType::B, Some(copy)) => Err(Denial::AlreadyHoldsB(copy)),
        (BookType::C, Some(copy)) => Err(Denial::AlreadyHoldsTitle(copy)),
        _ => Ok(()),
    }
}

fn require_read_credit(student: &Student, book_type: BookType) -> Permission {
    require_credit(student, rules::READ_MIN_CREDIT)?;
    if book_type == BookType::A {
        require_credit(student, rules::READ_A_MIN_CREDIT)?;
    }
    Ok(())
}

fn require_on_shelf(copy: &BookCopy) -> Permission {
    if copy.location().is_shelf() {
        Ok(())
    } else {
        Err(Denial::NotOnShelf { copy: copy.id(), location: copy.location() })
    }
}

impl LibrarySystem {
    /// Whether `student` may borrow some copy of `isbn`.
    pub fn can_borrow(&self, student: &Student, isbn: Isbn) -> Permission {
        require_credit(student, rules::BORROW_MIN_CREDIT)?;
        if self.first_shelved_copy(isbn).is_none() {
            return Err(Denial::NoShelvedCopy(isbn));
        }
        require_lendable(isbn)?;
        require_no_blocking_loan(student, isbn)
    }

    /// Whether `student` may borrow this specific copy.
    pub fn can_borrow_copy(&self, student: &Student, copy: &BookCopy) -> Permission {
        require_credit(student, rules::BORROW_MIN_CREDIT)?;
        require_lendable(copy.isbn())?;
        require_on_shelf(copy)?;
        require_no_blocking_loan(student, copy.isbn())
    }

    /// Whether `student` may order `isbn`.
    pub fn can_order(&self, student: &Student, isbn: Isbn) -> Permission {
        require_credit(student, rules::ORDER_MIN_CREDIT)?;
        require_lendable(isbn)?;
        if student.has_outstanding_order() {
            return Err(Denial::OrderOutstanding);
        }
        require_no_blocking_loan(student, isbn)
    }

    /// Whether `student` may pick up a reserved copy of `isbn` on `today`.
    pub fn can_pick(&self, student: &Student, isbn: Isbn, today: NaiveDate) -> Permission {
        let reserved_id = student.reserved_copy().ok_or(Denial::NothingReserved)?;
        let reserved = self.copy(reserved_id).ok_or(Denial::NothingReserved)?;
        require_credit(student, rules::BORROW_MIN_CREDIT)?;
        if reserved.isbn() != isbn {
            return Err(Denial::ReservedDifferentTitle { reserved: reserved.isbn(), requested: isbn });
        }
        if reserved.location() != Location::AppointmentOffice
            || reserved.reserved_for() != Some(student.id())
        {
            return Err(Denial::NotAwaitingPickup(reserved_id));
        }
        let deadline = reserved.pickup_deadline().or(student.pickup_deadline());
        if let Some(deadline) = deadline.filter(|deadline| today > *deadline) {
            return Err(Denial::ReservationExpired(deadline));
        }
        require_no_blocking_loan(student, isbn)
    }

    /// Whether `student` may read some copy of `isbn`.
    pub fn can_read(&self, student: &Student, isbn: Isbn) -> Permission {
        require_read_credit(student, isbn.book_type())?;
        if self.first_shelved_copy(isbn).is_none() {
            return Err(Denial::NoShelvedCopy(isbn));
        }
        match student.reading_today() {
            Some(copy) => Err(Denial::AlreadyReading(copy)),
            None => Ok(()),
        }
    }

    /// Whether `student` may read this specific copy.
    pub fn can_read_copy(&self, student: &Student, copy: &BookCopy) -> Permission {
        require_read_credit(student, copy.book_type())?;
        require_on_shelf(copy)?;
        match student.reading_today() {
            Some(current) => Err(Denial::AlreadyReading(current)),
            None => Ok(()),
        }
    }

    /// Whether `student` may return `copy`.
    pub fn can_return(&self, student: &StudentId, copy: BookCopyId) -> Permission {
        match self.copy(copy) {
            Some(c) if c.location() == Location::User && c.holder() == Some(student) => Ok(()),
            _ => Err(Denial::NotOnLoan(copy)),
        }
    }

    /// Whether `student` may restore `copy` from the reading room.
    pub fn can_restore(&self, student: &Student, copy: BookCopyId) -> Permission {
        match self.copy(copy) {
            Some(c)
                if c.location() == Location::ReadingRoom
                    && c.holder() == Some(student.id())
                    && student.reading_today() == Some(copy) =>
            {
                Ok(())
            },
            _ => Err(Denial::NotReading(copy)),
        }
    }
}
