//! Reference-model constants.
//!
//! Credit thresholds, credit adjustments, loan periods and reservation
//! windows. The SUT is expected to implement exactly these numbers.

use chrono::{NaiveDate, TimeDelta};
use shelfwatch_proto::BookType;

/// Credit score every student starts with.
pub const INITIAL_CREDIT: i64 = 100;
/// Lowest possible credit score.
pub const MIN_CREDIT: i64 = 0;
/// Highest possible credit score.
pub const MAX_CREDIT: i64 = 180;

/// Minimum credit to borrow or pick up a book.
pub const BORROW_MIN_CREDIT: i64 = 60;
/// Minimum credit to place an order.
pub const ORDER_MIN_CREDIT: i64 = 100;
/// Minimum credit to read a type A book.
pub const READ_A_MIN_CREDIT: i64 = 40;
/// Minimum credit to read any book.
pub const READ_MIN_CREDIT: i64 = 1;

/// Returning a loan on or before its due date.
pub const CREDIT_ON_TIME_RETURN: i64 = 10;
/// Restoring the book read today.
pub const CREDIT_SAME_DAY_RESTORE: i64 = 10;
/// Leaving a read book unrestored at closing.
pub const CREDIT_READ_NOT_RESTORED: i64 = -10;
/// A loan passing its due date.
pub const CREDIT_OVERDUE_INITIAL: i64 = -5;
/// Each further day a loan stays overdue.
pub const CREDIT_OVERDUE_DAILY: i64 = -5;
/// A reservation expiring unpicked.
pub const CREDIT_ORDER_NOT_PICKED: i64 = -15;

/// Days a reserved copy waits at the appointment office, counted from the
/// reservation's effective date.
pub const PICKUP_WINDOW_DAYS: i64 = 4;

/// Loan period for a book type; `None` for reference-only books.
pub fn loan_period(book_type: BookType) -> Option<TimeDelta> {
    match book_type {
        BookType::A => None,
        BookType::B => Some(TimeDelta::days(30)),
        BookType::C => Some(TimeDelta::days(60)),
    }
}

/// Which tidy phase is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TidyKind {
    /// Tidy reported after `OPEN`.
    Opening,
    /// Tidy reported after `CLOSE`.
    Closing,
}

impl TidyKind {
    /// Pickup deadline for a reservation made during this tidy.
    ///
    /// Opening reservations take effect the same day; closing reservations
    /// take effect the next day.
    pub fn pickup_deadline(self, tidy_date: NaiveDate) -> NaiveDate {
        let effective = match self {
            Self::Opening => tidy_date,
            Self::Closing => tidy_date + TimeDelta::days(1),
        };
        effective + TimeDelta::days(PICKUP_WINDOW_DAYS)
    }

    /// Whether a reservation with `deadline` still pins its copy to the
    /// appointment office during this tidy.
    pub fn reservation_active(self, tidy_date: NaiveDate, deadline: NaiveDate) -> bool {
        match self {
            Self::Opening => tidy_date <= deadline,
            Self::Closing => tidy_date < deadline,
        }
    }
}

/// Clamp a credit score into the legal range.
pub fn clamp_credit(score: i64) -> i64 {
    score.clamp(MIN_CREDIT, MAX_CREDIT)
}
