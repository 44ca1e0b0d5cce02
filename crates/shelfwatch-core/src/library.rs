//! The library model.
//!
//! [`LibrarySystem`] is the reference implementation the SUT is judged
//! against. It owns every copy and student, the shelf index, the calendar
//! and the hot-title bookkeeping. It is `Clone` so a batch can be validated
//! against a scratch copy and committed only when the whole batch holds up.
//!
//! Mutators named `apply_validated_*` trust their caller: the rule checker
//! has already decided the action is legal. They still refuse to corrupt
//! the model when handed a copy it does not know or one that is not where
//! the caller claims.

use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet},
};

use chrono::{NaiveDate, TimeDelta};
use shelfwatch_proto::{BookCopyId, Inventory, Isbn, Location, ProtocolError, StudentId};
use tracing::{debug, trace};

use crate::{
    book::{BookCopy, TraceRecord},
    error::{ModelError, Result},
    rules,
    student::{Loan, Student},
};

/// Reference state of the whole library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibrarySystem {
    copies: BTreeMap<BookCopyId, BookCopy>,
    students: BTreeMap<StudentId, Student>,
    /// Copies on `bs` or `hbs`, by title.
    shelved: BTreeMap<Isbn, BTreeSet<BookCopyId>>,
    /// Titles in inventory order.
    titles: Vec<Isbn>,
    date: Option<NaiveDate>,
    /// Titles that belong on the hot bookshelf after the current opening.
    hot: BTreeSet<Isbn>,
    /// Titles borrowed or read since the last opening.
    becoming_hot: BTreeSet<Isbn>,
    last_open: Option<NaiveDate>,
}

impl LibrarySystem {
    /// Empty library with no inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Library stocked from `inventory`.
    pub fn from_inventory(inventory: &Inventory) -> Result<Self> {
        let mut library = Self::new();
        library.initialize_books(inventory)?;
        Ok(library)
    }

    /// Library stocked from raw inventory lines (title count line first).
    ///
    /// Every line must belong to the inventory block.
    pub fn from_inventory_lines<S: AsRef<str>>(lines: &[S]) -> Result<Self> {
        let (inventory, consumed) = Inventory::parse_block(lines)?;
        if consumed != lines.len() {
            return Err(ProtocolError::MalformedInventory(format!(
                "{} lines after the declared titles",
                lines.len() - consumed
            ))
            .into());
        }
        Self::from_inventory(&inventory)
    }

    /// Place every copy of the inventory on the ordinary bookshelf.
    ///
    /// Copies are numbered `ISBN-01`, `ISBN-02`, ... per title.
    pub fn initialize_books(&mut self, inventory: &Inventory) -> Result<()> {
        if !self.copies.is_empty() {
            return Err(ModelError::AlreadyInitialized);
        }
        for &(isbn, count) in inventory.entries() {
            self.titles.push(isbn);
            let shelf = self.shelved.entry(isbn).or_default();
            for seq in 1..=count {
                let id = BookCopyId::new(isbn, seq);
                self.copies.insert(id, BookCopy::on_bookshelf(id));
                shelf.insert(id);
            }
        }
        debug!(titles = self.titles.len(), copies = self.copies.len(), "inventory loaded");
        Ok(())
    }

    /// Current model date; `None` before the first command.
    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    /// Titles in inventory order.
    pub fn titles(&self) -> &[Isbn] {
        &self.titles
    }

    /// Look up a copy.
    pub fn copy(&self, id: BookCopyId) -> Option<&BookCopy> {
        self.copies.get(&id)
    }

    /// All copies, ordered by id.
    pub fn copies(&self) -> impl Iterator<Item = &BookCopy> {
        self.copies.values()
    }

    /// Copies currently at `location`.
    pub fn copies_at(&self, location: Location) -> impl Iterator<Item = &BookCopy> {
        self.copies.values().filter(move |copy| copy.location == location)
    }

    /// Look up a student the model has seen.
    pub fn student(&self, id: &StudentId) -> Option<&Student> {
        self.students.get(id)
    }

    /// All known students, ordered by id.
    pub fn students(&self) -> impl Iterator<Item = &Student> {
        self.students.values()
    }

    /// The student, or a fresh default if the model has not seen them.
    pub fn student_or_new(&self, id: &StudentId) -> Cow<'_, Student> {
        match self.students.get(id) {
            Some(student) => Cow::Borrowed(student),
            None => Cow::Owned(Student::new(id.clone())),
        }
    }

    /// Record a student on first mention.
    pub fn ensure_student(&mut self, id: &StudentId) -> &Student {
        self.student_entry(id)
    }

    /// Current credit of a student; unseen students have the initial score.
    pub fn credit_of(&self, id: &StudentId) -> i64 {
        self.students.get(id).map_or(rules::INITIAL_CREDIT, Student::credit)
    }

    /// Lowest-numbered copy of `isbn` on a shelf.
    pub fn first_shelved_copy(&self, isbn: Isbn) -> Option<BookCopyId> {
        self.shelved.get(&isbn).and_then(|ids| ids.first().copied())
    }

    /// Copies of `isbn` on a shelf, ordered by id.
    pub fn shelved_copies(&self, isbn: Isbn) -> impl Iterator<Item = BookCopyId> + '_ {
        self.shelved.get(&isbn).into_iter().flatten().copied()
    }

    /// Titles that must sit on the hot bookshelf after this opening.
    pub fn hot_isbns(&self) -> &BTreeSet<Isbn> {
        &self.hot
    }

    /// Movement history for a copy, used to answer trace queries.
    pub fn trace_of(&self, id: BookCopyId) -> Option<&[TraceRecord]> {
        self.copies.get(&id).map(BookCopy::trace)
    }

    /// Move the calendar forward to `date`, settling every elapsed day.
    ///
    /// For each day strictly before `date`: a loan due that day costs its
    /// holder the initial overdue penalty, a loan already past due costs the
    /// daily penalty, and a reservation whose deadline was that day and
    /// which still waits at the appointment office costs the student the
    /// unpicked penalty. Moving backwards is a no-op.
    pub fn advance_time_to(&mut self, date: NaiveDate) {
        let Some(mut day) = self.date else {
            self.date = Some(date);
            return;
        };
        if date <= day {
            return;
        }
        while day < date {
            self.settle_day(day);
            day += TimeDelta::days(1);
        }
        self.date = Some(date);
    }

    fn settle_day(&mut self, day: NaiveDate) {
        for student in self.students.values_mut() {
            let charge: i64 = student
                .loans()
                .map(|loan| {
                    if loan.due == day {
                        rules::CREDIT_OVERDUE_INITIAL
                    } else if loan.due < day {
                        rules::CREDIT_OVERDUE_DAILY
                    } else {
                        0
                    }
                })
                .sum();
            if charge != 0 {
                trace!(student = %student.id, %day, charge, "overdue penalty");
                student.adjust_credit(charge);
            }
        }

        let lapsed: Vec<StudentId> = self
            .copies
            .values()
            .filter(|copy| {
                copy.location == Location::AppointmentOffice && copy.pickup_deadline == Some(day)
            })
            .filter_map(|copy| copy.reserved_for.clone())
            .collect();
        for id in lapsed {
            trace!(student = %id, %day, "reservation not picked up");
            self.student_entry(&id).adjust_credit(rules::CREDIT_ORDER_NOT_PICKED);
        }
    }

    /// Open the library on `date`.
    ///
    /// The first opening on a new date promotes the titles borrowed or read
    /// since the previous opening to hot. Every student's reading state is
    /// cleared.
    pub fn apply_open_action(&mut self, date: NaiveDate) {
        self.advance_time_to(date);
        if self.last_open != Some(date) {
            self.hot = std::mem::take(&mut self.becoming_hot);
            self.last_open = Some(date);
            debug!(%date, hot = self.hot.len(), "hot titles promoted");
        }
        for student in self.students.values_mut() {
            student.clear_reading();
        }
    }

    /// Close the library on `date`.
    ///
    /// Students still holding today's read lose credit.
    pub fn apply_close_action(&mut self, date: NaiveDate) {
        self.advance_time_to(date);
        for student in self.students.values_mut() {
            if student.reading_today.is_some() {
                student.adjust_credit(rules::CREDIT_READ_NOT_RESTORED);
            }
            student.clear_reading();
        }
    }

    /// Lend a shelved copy to `student`.
    pub fn apply_validated_borrow(
        &mut self,
        date: NaiveDate,
        student: &StudentId,
        copy: BookCopyId,
    ) -> Result<()> {
        let from = self.location_of(copy)?;
        if !from.is_shelf() {
            return Err(ModelError::LocationMismatch {
                copy,
                expected: Location::Bookshelf,
                actual: from,
            });
        }
        self.open_loan(date, student, copy);
        self.move_copy(date, copy, from, Location::User, Some(student))?;
        self.becoming_hot.insert(copy.isbn());
        Ok(())
    }

    /// Take a copy back from `student` at the borrow/return office.
    ///
    /// Returns whether the return was overdue. On-time returns earn credit.
    pub fn apply_validated_return(
        &mut self,
        date: NaiveDate,
        student: &StudentId,
        copy: BookCopyId,
    ) -> Result<bool> {
        let due = self.students.get(student).and_then(|s| s.loan_of(copy)).map(|loan| loan.due);
        let overdue = due.is_some_and(|due| date > due);
        self.move_copy(date, copy, Location::User, Location::BorrowReturnOffice, None)?;
        if due.is_some() && !overdue {
            self.student_entry(student).adjust_credit(rules::CREDIT_ON_TIME_RETURN);
        }
        Ok(overdue)
    }

    /// Record an order for `isbn`.
    pub fn apply_validated_order(&mut self, student: &StudentId, isbn: Isbn) {
        self.student_entry(student).pending_order = Some(isbn);
    }

    /// Hand a reserved copy from the appointment office to `student`.
    pub fn apply_validated_pick(
        &mut self,
        date: NaiveDate,
        student: &StudentId,
        copy: BookCopyId,
    ) -> Result<()> {
        self.location_of(copy)?;
        self.student_entry(student).clear_reservation();
        self.open_loan(date, student, copy);
        self.move_copy(date, copy, Location::AppointmentOffice, Location::User, Some(student))
    }

    /// Seat `student` in the reading room with a shelved copy.
    pub fn apply_validated_read(
        &mut self,
        date: NaiveDate,
        student: &StudentId,
        copy: BookCopyId,
    ) -> Result<()> {
        let from = self.location_of(copy)?;
        if !from.is_shelf() {
            return Err(ModelError::LocationMismatch {
                copy,
                expected: Location::Bookshelf,
                actual: from,
            });
        }
        self.move_copy(date, copy, from, Location::ReadingRoom, Some(student))?;
        let reader = self.student_entry(student);
        reader.reading_today = Some(copy);
        reader.restore_proposed = false;
        self.becoming_hot.insert(copy.isbn());
        Ok(())
    }

    /// Move a read copy from the reading room to the borrow/return office.
    ///
    /// Restoring today's read earns credit.
    pub fn apply_validated_restore(
        &mut self,
        date: NaiveDate,
        student: &StudentId,
        copy: BookCopyId,
    ) -> Result<()> {
        self.move_copy(date, copy, Location::ReadingRoom, Location::BorrowReturnOffice, None)?;
        let reader = self.student_entry(student);
        if reader.reading_today == Some(copy) {
            reader.clear_reading();
            reader.adjust_credit(rules::CREDIT_SAME_DAY_RESTORE);
        }
        Ok(())
    }

    /// Apply one tidy movement.
    ///
    /// Leaving the appointment office drops any reservation on the copy.
    /// Reservations for copies arriving at the office are recorded
    /// separately with [`Self::apply_book_reservation_at_ao`].
    pub fn apply_tidy_move(
        &mut self,
        date: NaiveDate,
        copy: BookCopyId,
        from: Location,
        to: Location,
    ) -> Result<()> {
        self.move_copy(date, copy, from, to, None)
    }

    /// Reserve a copy now at the appointment office for `student`.
    ///
    /// Fulfils the student's pending order.
    pub fn apply_book_reservation_at_ao(
        &mut self,
        copy: BookCopyId,
        student: &StudentId,
        deadline: NaiveDate,
    ) -> Result<()> {
        let book = self.copies.get_mut(&copy).ok_or(ModelError::UnknownCopy(copy))?;
        book.reserved_for = Some(student.clone());
        book.pickup_deadline = Some(deadline);

        let reader = self.student_entry(student);
        reader.pending_order = None;
        reader.reserved_copy = Some(copy);
        reader.pickup_deadline = Some(deadline);
        debug!(%copy, %student, %deadline, "reservation recorded");
        Ok(())
    }

    /// Drop a lapsed reservation on `copy` before it leaves the office.
    pub fn clear_expired_ao_reservation(&mut self, copy: BookCopyId) -> Result<()> {
        let book = self.copies.get_mut(&copy).ok_or(ModelError::UnknownCopy(copy))?;
        book.pickup_deadline = None;
        if let Some(owner) = book.reserved_for.take()
            && let Some(student) = self.students.get_mut(&owner)
            && student.reserved_copy == Some(copy)
        {
            student.clear_reservation();
        }
        Ok(())
    }

    /// Note that a restore of today's read has been generated.
    ///
    /// The flag is advisory; it never changes validation outcomes.
    pub fn mark_restore_proposed(&mut self, student: &StudentId) {
        self.student_entry(student).restore_proposed = true;
    }

    fn student_entry(&mut self, id: &StudentId) -> &mut Student {
        self.students.entry(id.clone()).or_insert_with(|| Student::new(id.clone()))
    }

    fn location_of(&self, copy: BookCopyId) -> Result<Location> {
        self.copies.get(&copy).map(BookCopy::location).ok_or(ModelError::UnknownCopy(copy))
    }

    fn open_loan(&mut self, date: NaiveDate, student: &StudentId, copy: BookCopyId) {
        if let Some(period) = rules::loan_period(copy.book_type()) {
            self.student_entry(student).insert_loan(Loan { copy, due: date + period });
        }
    }

    /// Single place where a copy changes location.
    ///
    /// Keeps the shelf index, holder, loan records and reservation fields
    /// consistent with the new location and appends to the trace.
    fn move_copy(
        &mut self,
        date: NaiveDate,
        copy: BookCopyId,
        from: Location,
        to: Location,
        holder: Option<&StudentId>,
    ) -> Result<()> {
        let book = self.copies.get_mut(&copy).ok_or(ModelError::UnknownCopy(copy))?;
        if book.location != from {
            return Err(ModelError::LocationMismatch { copy, expected: from, actual: book.location });
        }

        if from != to {
            book.trace.push(TraceRecord { date, from, to });
        }
        let previous_holder = book.holder.take();
        book.location = to;
        if matches!(to, Location::User | Location::ReadingRoom) {
            book.holder = holder.cloned();
        }
        if from == Location::AppointmentOffice && to != Location::AppointmentOffice {
            book.reserved_for = None;
            book.pickup_deadline = None;
        }

        if from.is_shelf()
            && let Some(ids) = self.shelved.get_mut(&copy.isbn())
        {
            ids.remove(&copy);
        }
        if to.is_shelf() {
            self.shelved.entry(copy.isbn()).or_default().insert(copy);
        }
        if from == Location::User
            && to != Location::User
            && let Some(student) = previous_holder.and_then(|id| self.students.get_mut(&id))
        {
            student.remove_loan(copy);
        }

        trace!(%copy, %from, %to, "copy moved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfwatch_proto::BookType;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn isbn(book_type: BookType, number: u16) -> Isbn {
        Isbn::new(book_type, number).unwrap()
    }

    fn student(id: &str) -> StudentId {
        id.parse().unwrap()
    }

    fn library() -> LibrarySystem {
        let inventory = Inventory::new(vec![
            (isbn(BookType::A, 1), 1),
            (isbn(BookType::B, 1), 2),
            (isbn(BookType::C, 1), 1),
        ])
        .unwrap();
        let mut library = LibrarySystem::from_inventory(&inventory).unwrap();
        library.apply_open_action(day(1));
        library
    }

    #[test]
    fn inventory_numbers_copies_from_one() {
        let library = library();
        let b = isbn(BookType::B, 1);
        let shelved: Vec<_> = library.shelved_copies(b).map(|id| id.to_string()).collect();
        assert_eq!(shelved, vec!["B-0001-01", "B-0001-02"]);
        assert_eq!(library.copies().count(), 4);
    }

    #[test]
    fn inventory_lines_must_not_trail() {
        assert!(LibrarySystem::from_inventory_lines(&["1", "B-0001 1"]).is_ok());
        assert!(LibrarySystem::from_inventory_lines(&["1", "B-0001 1", "junk"]).is_err());
        assert!(LibrarySystem::from_inventory_lines(&["1", "B-0001 0"]).is_err());
    }

    #[test]
    fn borrow_then_on_time_return_earns_credit() {
        let mut library = library();
        let s = student("s1");
        let copy = library.first_shelved_copy(isbn(BookType::B, 1)).unwrap();

        library.apply_validated_borrow(day(1), &s, copy).unwrap();
        assert_eq!(library.copy(copy).unwrap().location(), Location::User);
        assert_eq!(library.student(&s).unwrap().held_b().unwrap().due, day(31));

        let overdue = library.apply_validated_return(day(2), &s, copy).unwrap();
        assert!(!overdue);
        assert_eq!(library.credit_of(&s), 110);
        assert!(library.student(&s).unwrap().held_b().is_none());
        assert_eq!(library.copy(copy).unwrap().location(), Location::BorrowReturnOffice);
        assert_eq!(library.trace_of(copy).unwrap().len(), 2);
    }

    #[test]
    fn overdue_loans_are_charged_per_elapsed_day() {
        let mut library = library();
        let s = student("s1");
        let copy = library.first_shelved_copy(isbn(BookType::B, 1)).unwrap();
        library.apply_validated_borrow(day(1), &s, copy).unwrap();

        // Due on the 31st: the 31st itself is free, then -5 on crossing
        // into Feb 1 and -5 for each further day.
        library.advance_time_to(day(31));
        assert_eq!(library.credit_of(&s), 100);
        library.advance_time_to(NaiveDate::from_ymd_opt(2025, 2, 3).unwrap());
        assert_eq!(library.credit_of(&s), 85);

        let overdue =
            library.apply_validated_return(library.date().unwrap(), &s, copy).unwrap();
        assert!(overdue);
        assert_eq!(library.credit_of(&s), 85);
    }

    #[test]
    fn moving_backwards_in_time_is_ignored() {
        let mut library = library();
        library.advance_time_to(day(5));
        library.advance_time_to(day(3));
        assert_eq!(library.date(), Some(day(5)));
    }

    #[test]
    fn unrestored_read_costs_credit_at_close() {
        let mut library = library();
        let s = student("s1");
        let copy = library.first_shelved_copy(isbn(BookType::A, 1)).unwrap();
        library.apply_validated_read(day(1), &s, copy).unwrap();
        assert_eq!(library.student(&s).unwrap().reading_today(), Some(copy));

        library.apply_close_action(day(1));
        assert_eq!(library.credit_of(&s), 90);
        assert_eq!(library.student(&s).unwrap().reading_today(), None);
        assert_eq!(library.copy(copy).unwrap().location(), Location::ReadingRoom);
    }

    #[test]
    fn same_day_restore_earns_credit() {
        let mut library = library();
        let s = student("s1");
        let copy = library.first_shelved_copy(isbn(BookType::C, 1)).unwrap();
        library.apply_validated_read(day(1), &s, copy).unwrap();
        library.apply_validated_restore(day(1), &s, copy).unwrap();
        assert_eq!(library.credit_of(&s), 110);
        assert_eq!(library.copy(copy).unwrap().holder(), None);
    }

    #[test]
    fn borrowed_and_read_titles_turn_hot_at_next_opening() {
        let mut library = library();
        let b = isbn(BookType::B, 1);
        let copy = library.first_shelved_copy(b).unwrap();
        library.apply_validated_borrow(day(1), &student("s1"), copy).unwrap();
        assert!(library.hot_isbns().is_empty());

        // A second opening on the same date does not promote.
        library.apply_open_action(day(1));
        assert!(library.hot_isbns().is_empty());

        library.apply_open_action(day(2));
        assert!(library.hot_isbns().contains(&b));
        library.apply_open_action(day(3));
        assert!(library.hot_isbns().is_empty());
    }

    #[test]
    fn unpicked_reservation_is_charged_once_after_deadline() {
        let mut library = library();
        let s = student("s1");
        let c = isbn(BookType::C, 1);
        let copy = library.first_shelved_copy(c).unwrap();
        library.apply_validated_order(&s, c);
        library.apply_tidy_move(day(1), copy, Location::Bookshelf, Location::AppointmentOffice).unwrap();
        library.apply_book_reservation_at_ao(copy, &s, day(5)).unwrap();
        assert_eq!(library.student(&s).unwrap().pending_order(), None);
        assert!(library.first_shelved_copy(c).is_none());

        library.advance_time_to(day(5));
        assert_eq!(library.credit_of(&s), 100);
        library.advance_time_to(day(9));
        assert_eq!(library.credit_of(&s), 85);

        library.clear_expired_ao_reservation(copy).unwrap();
        library
            .apply_tidy_move(day(9), copy, Location::AppointmentOffice, Location::Bookshelf)
            .unwrap();
        let student = library.student(&s).unwrap();
        assert_eq!(student.reserved_copy(), None);
        assert!(!student.has_outstanding_order());
        assert_eq!(library.first_shelved_copy(c), Some(copy));
    }

    #[test]
    fn pick_moves_reserved_copy_to_user() {
        let mut library = library();
        let s = student("s1");
        let b = isbn(BookType::B, 1);
        let copy = BookCopyId::new(b, 2);
        library.apply_validated_order(&s, b);
        library.apply_tidy_move(day(1), copy, Location::Bookshelf, Location::AppointmentOffice).unwrap();
        library.apply_book_reservation_at_ao(copy, &s, day(5)).unwrap();

        library.apply_validated_pick(day(2), &s, copy).unwrap();
        let book = library.copy(copy).unwrap();
        assert_eq!(book.location(), Location::User);
        assert_eq!(book.reserved_for(), None);
        assert_eq!(library.student(&s).unwrap().held_b().unwrap().copy, copy);
        assert_eq!(library.student(&s).unwrap().reserved_copy(), None);
    }

    #[test]
    fn move_from_wrong_location_is_refused() {
        let mut library = library();
        let copy = BookCopyId::new(isbn(BookType::B, 1), 1);
        let err = library
            .apply_tidy_move(day(1), copy, Location::ReadingRoom, Location::Bookshelf)
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::LocationMismatch {
                copy,
                expected: Location::ReadingRoom,
                actual: Location::Bookshelf
            }
        );
        let unknown = BookCopyId::new(isbn(BookType::B, 9), 1);
        assert_eq!(
            library.apply_tidy_move(day(1), unknown, Location::Bookshelf, Location::HotBookshelf),
            Err(ModelError::UnknownCopy(unknown))
        );
    }

    #[test]
    fn credit_is_clamped() {
        let mut library = library();
        let s = student("s1");
        let b = isbn(BookType::B, 1);
        for _ in 0..20 {
            let copy = library.first_shelved_copy(b).unwrap();
            library.apply_validated_borrow(day(1), &s, copy).unwrap();
            library.apply_validated_return(day(1), &s, copy).unwrap();
            library.apply_tidy_move(day(1), copy, Location::BorrowReturnOffice, Location::Bookshelf).unwrap();
        }
        assert_eq!(library.credit_of(&s), rules::MAX_CREDIT);
    }
}
