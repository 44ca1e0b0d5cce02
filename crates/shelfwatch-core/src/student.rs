//! Per-student lending state.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use shelfwatch_proto::{BookCopyId, BookType, Isbn, StudentId};

use crate::rules;

/// A copy on loan and the day it is due back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loan {
    /// Borrowed copy.
    pub copy: BookCopyId,
    /// Last day the copy can be returned without being overdue.
    pub due: NaiveDate,
}

/// A student as the model sees them.
///
/// Students come into existence on first mention; an unseen student has
/// the initial credit and holds nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Student {
    pub(crate) id: StudentId,
    pub(crate) credit: i64,
    pub(crate) held_b: Option<Loan>,
    pub(crate) held_c: BTreeMap<Isbn, Loan>,
    pub(crate) pending_order: Option<Isbn>,
    pub(crate) reserved_copy: Option<BookCopyId>,
    pub(crate) pickup_deadline: Option<NaiveDate>,
    pub(crate) reading_today: Option<BookCopyId>,
    pub(crate) restore_proposed: bool,
}

impl Student {
    /// A fresh student with default credit.
    pub fn new(id: StudentId) -> Self {
        Self {
            id,
            credit: rules::INITIAL_CREDIT,
            held_b: None,
            held_c: BTreeMap::new(),
            pending_order: None,
            reserved_copy: None,
            pickup_deadline: None,
            reading_today: None,
            restore_proposed: false,
        }
    }

    /// Student identifier.
    pub fn id(&self) -> &StudentId {
        &self.id
    }

    /// Current credit score.
    pub fn credit(&self) -> i64 {
        self.credit
    }

    /// The single type B loan, if any.
    pub fn held_b(&self) -> Option<&Loan> {
        self.held_b.as_ref()
    }

    /// Type C loans keyed by title.
    pub fn held_c(&self) -> &BTreeMap<Isbn, Loan> {
        &self.held_c
    }

    /// All loans, B first.
    pub fn loans(&self) -> impl Iterator<Item = &Loan> {
        self.held_b.iter().chain(self.held_c.values())
    }

    /// Loan record for `copy`, if this student holds it.
    pub fn loan_of(&self, copy: BookCopyId) -> Option<&Loan> {
        self.loans().find(|loan| loan.copy == copy)
    }

    /// Title ordered but not yet reserved.
    pub fn pending_order(&self) -> Option<Isbn> {
        self.pending_order
    }

    /// Copy waiting at the appointment office.
    pub fn reserved_copy(&self) -> Option<BookCopyId> {
        self.reserved_copy
    }

    /// Last pickup day for [`Self::reserved_copy`].
    pub fn pickup_deadline(&self) -> Option<NaiveDate> {
        self.pickup_deadline
    }

    /// Copy being read in the reading room today.
    pub fn reading_today(&self) -> Option<BookCopyId> {
        self.reading_today
    }

    /// Whether a restore of today's read has already been generated.
    ///
    /// Advisory only: set by the command generator so it does not propose
    /// the same restore twice. Validation never consults it.
    pub fn restore_proposed(&self) -> bool {
        self.restore_proposed
    }

    /// Whether an order or reservation is outstanding.
    pub fn has_outstanding_order(&self) -> bool {
        self.pending_order.is_some() || self.reserved_copy.is_some()
    }

    /// Whether the student already holds something that blocks acquiring a
    /// copy of `isbn`: any B for type B, the same title for type C.
    pub fn blocking_loan(&self, isbn: Isbn) -> Option<BookCopyId> {
        match isbn.book_type() {
            BookType::A => None,
            BookType::B => self.held_b.map(|loan| loan.copy),
            BookType::C => self.held_c.get(&isbn).map(|loan| loan.copy),
        }
    }

    pub(crate) fn adjust_credit(&mut self, delta: i64) {
        self.credit = rules::clamp_credit(self.credit + delta);
    }

    pub(crate) fn insert_loan(&mut self, loan: Loan) {
        match loan.copy.book_type() {
            BookType::A => {},
            BookType::B => self.held_b = Some(loan),
            BookType::C => {
                self.held_c.insert(loan.copy.isbn(), loan);
            },
        }
    }

    pub(crate) fn remove_loan(&mut self, copy: BookCopyId) {
        if self.held_b.is_some_and(|loan| loan.copy == copy) {
            self.held_b = None;
        }
        if self.held_c.get(&copy.isbn()).is_some_and(|loan| loan.copy == copy) {
            self.held_c.remove(&copy.isbn());
        }
    }

    pub(crate) fn clear_reservation(&mut self) {
        self.reserved_copy = None;
        self.pickup_deadline = None;
    }

    pub(crate) fn clear_reading(&mut self) {
        self.reading_today = None;
        self.restore_proposed = false;
    }
}
