//! Rule checker.
//!
//! Judges one SUT response against the model and, when the response is
//! legal, applies it. Every user action follows the same procedure:
//!
//! 1. Parse the line and check the echoed date, student and verb.
//! 2. On `[reject]`, ask the model whether the action should have been
//!    allowed. A reject of an allowed action is a violation; any other
//!    reject leaves the model untouched.
//! 3. On `[accept]`, resolve the concrete copy the SUT acted on, re-check
//!    every precondition against that copy and apply the mutation.
//!
//! Returns and restores have no legitimate reject path while their
//! preconditions hold.

use chrono::NaiveDate;
use shelfwatch_core::{BookCopy, Denial, LibrarySystem, ModelError, Student, TidyKind};
use shelfwatch_proto::{
    ActionLine, ActionResponse, ActionVerb, BookCopyId, Command, CreditLine, Isbn, Location,
    MoveLine, Status, StudentId, TraceEntry, TraceHeader, parse_move_count,
};
use tracing::{debug, trace};

use crate::violation::Violation;

/// Outcome of checking one response.
pub type CheckResult = Result<(), Violation>;

/// Validates SUT responses against a model it owns for the duration of a
/// batch.
pub struct RuleChecker<'a> {
    model: &'a mut LibrarySystem,
}

impl<'a> RuleChecker<'a> {
    /// Check responses against `model`, mutating it as responses are
    /// accepted.
    pub fn new(model: &'a mut LibrarySystem) -> Self {
        Self { model }
    }

    /// The model as updated so far.
    pub fn model(&self) -> &LibrarySystem {
        self.model
    }

    /// Check the complete response to `command`.
    ///
    /// Advances the model's calendar to the command's date first. `lines`
    /// must be exactly the lines the SUT produced for this command.
    pub fn check<S: AsRef<str>>(&mut self, command: &Command, lines: &[S]) -> CheckResult {
        self.model.advance_time_to(command.date());
        trace!(%command, lines = lines.len(), "checking");
        match command {
            Command::Open { date } => {
                self.model.apply_open_action(*date);
                self.check_tidy(*date, TidyKind::Opening, lines)
            },
            Command::Close { date } => {
                self.model.apply_close_action(*date);
                self.check_tidy(*date, TidyKind::Closing, lines)
            },
            Command::Borrow { date, student, isbn } => {
                self.check_borrow(*date, student, *isbn, single_line(command, lines)?)
            },
            Command::Return { date, student, copy } => {
                self.check_return(*date, student, *copy, single_line(command, lines)?)
            },
            Command::Order { date, student, isbn } => {
                self.check_order(*date, student, *isbn, single_line(command, lines)?)
            },
            Command::Pick { date, student, isbn } => {
                self.check_pick(*date, student, *isbn, single_line(command, lines)?)
            },
            Command::Read { date, student, isbn } => {
                self.check_read(*date, student, *isbn, single_line(command, lines)?)
            },
            Command::Restore { date, student, copy } => {
                self.check_restore(*date, student, *copy, single_line(command, lines)?)
            },
            Command::QueryTrace { date, student, copy } => {
                self.check_trace_query(*date, student, *copy, lines)
            },
            Command::QueryCredit { date, student } => {
                self.check_credit_query(*date, student, single_line(command, lines)?)
            },
        }
    }

    /// Check the response to `borrowed <isbn>`.
    pub fn check_borrow(
        &mut self,
        date: NaiveDate,
        student: &StudentId,
        isbn: Isbn,
        raw: &str,
    ) -> CheckResult {
        let command = Command::Borrow { date, student: student.clone(), isbn };
        let line = expect_action(&command, student, ActionVerb::Borrowed, raw)?;
        let reader = self.model.ensure_student(student).clone();

        match line.status {
            Status::Reject => {
                expect_isbn_echo(&command, &line, isbn, raw)?;
                justify_reject(&command, self.model.can_borrow(&reader, isbn), raw)
            },
            Status::Accept => {
                let copy = {
                    let book = self.claimed_copy(&command, &line, isbn, raw)?;
                    self.model
                        .can_borrow_copy(&reader, book)
                        .map_err(|denial| accepted_but(&command, book.id(), &denial, raw))?;
                    book.id()
                };
                self.model
                    .apply_validated_borrow(date, student, copy)
                    .map_err(|err| model_refused(&command, &err))
            },
        }
    }

    /// Check the response to `returned <copy>`.
    pub fn check_return(
        &mut self,
        date: NaiveDate,
        student: &StudentId,
        copy: BookCopyId,
        raw: &str,
    ) -> CheckResult {
        let command = Command::Return { date, student: student.clone(), copy };
        let line = expect_action(&command, student, ActionVerb::Returned, raw)?;
        expect_copy_echo(&command, &line, copy, raw)?;
        self.model.ensure_student(student);

        match line.status {
            Status::Reject => Err(Violation::logic(
                &command,
                format!("returns must always be accepted; line '{raw}'"),
            )),
            Status::Accept => {
                self.model
                    .can_return(student, copy)
                    .map_err(|denial| accepted_but(&command, copy, &denial, raw))?;
                let overdue = self
                    .model
                    .apply_validated_return(date, student, copy)
                    .map_err(|err| model_refused(&command, &err))?;
                if line.overdue != Some(overdue) {
                    return Err(Violation::logic(
                        &command,
                        format!(
                            "return reported as '{}' but it is '{}'; line '{raw}'",
                            overdue_label(line.overdue.unwrap_or(!overdue)),
                            overdue_label(overdue)
                        ),
                    ));
                }
                Ok(())
            },
        }
    }

    /// Check the response to `ordered <isbn>`.
    pub fn check_order(
        &mut self,
        date: NaiveDate,
        student: &StudentId,
        isbn: Isbn,
        raw: &str,
    ) -> CheckResult {
        let command = Command::Order { date, student: student.clone(), isbn };
        let line = expect_action(&command, student, ActionVerb::Ordered, raw)?;
        expect_isbn_echo(&command, &line, isbn, raw)?;
        let reader = self.model.ensure_student(student).clone();

        match line.status {
            Status::Reject => justify_reject(&command, self.model.can_order(&reader, isbn), raw),
            Status::Accept => {
                self.model.can_order(&reader, isbn).map_err(|denial| {
                    Violation::logic(
                        &command,
                        format!("accepted order for {isbn}, but {denial}; line '{raw}'"),
                    )
                })?;
                self.model.apply_validated_order(student, isbn);
                Ok(())
            },
        }
    }

    /// Check the response to `picked <isbn>`.
    pub fn check_pick(
        &mut self,
        date: NaiveDate,
        student: &StudentId,
        isbn: Isbn,
        raw: &str,
    ) -> CheckResult {
        let command = Command::Pick { date, student: student.clone(), isbn };
        let line = expect_action(&command, student, ActionVerb::Picked, raw)?;
        let reader = self.model.ensure_student(student).clone();

        match line.status {
            Status::Reject => {
                expect_isbn_echo(&command, &line, isbn, raw)?;
                justify_reject(&command, self.model.can_pick(&reader, isbn, date), raw)
            },
            Status::Accept => {
                let copy = self.claimed_copy(&command, &line, isbn, raw)?.id();
                if reader.reserved_copy() != Some(copy) {
                    return Err(Violation::logic(
                        &command,
                        format!(
                            "picked {copy}, but the reservation is {}; line '{raw}'",
                            reader
                                .reserved_copy()
                                .map_or_else(|| "empty".to_string(), |id| id.to_string())
                        ),
                    ));
                }
                self.model
                    .can_pick(&reader, isbn, date)
                    .map_err(|denial| accepted_but(&command, copy, &denial, raw))?;
                self.model
                    .apply_validated_pick(date, student, copy)
                    .map_err(|err| model_refused(&command, &err))
            },
        }
    }

    /// Check the response to `read <isbn>`.
    pub fn check_read(
        &mut self,
        date: NaiveDate,
        student: &StudentId,
        isbn: Isbn,
        raw: &str,
    ) -> CheckResult {
        let command = Command::Read { date, student: student.clone(), isbn };
        let line = expect_action(&command, student, ActionVerb::Read, raw)?;
        let reader = self.model.ensure_student(student).clone();

        match line.status {
            Status::Reject => {
                expect_isbn_echo(&command, &line, isbn, raw)?;
                justify_reject(&command, self.model.can_read(&reader, isbn), raw)
            },
            Status::Accept => {
                let copy = {
                    let book = self.claimed_copy(&command, &line, isbn, raw)?;
                    self.model
                        .can_read_copy(&reader, book)
                        .map_err(|denial| accepted_but(&command, book.id(), &denial, raw))?;
                    book.id()
                };
                self.model
                    .apply_validated_read(date, student, copy)
                    .map_err(|err| model_refused(&command, &err))
            },
        }
    }

    /// Check the response to `restored <copy>`.
    pub fn check_restore(
        &mut self,
        date: NaiveDate,
        student: &StudentId,
        copy: BookCopyId,
        raw: &str,
    ) -> CheckResult {
        let command = Command::Restore { date, student: student.clone(), copy };
        let line = expect_action(&command, student, ActionVerb::Restored, raw)?;
        expect_copy_echo(&command, &line, copy, raw)?;
        let reader = self.model.ensure_student(student).clone();

        match line.status {
            Status::Reject => match self.model.can_restore(&reader, copy) {
                Ok(()) => Err(Violation::logic(
                    &command,
                    format!("rejected restore of {copy}, but it is today's read; line '{raw}'"),
                )),
                Err(_) => Ok(()),
            },
            Status::Accept => {
                if self.model.copy(copy).is_none() {
                    return Err(Violation::logic(
                        &command,
                        format!("accepted restore of unknown copy {copy}; line '{raw}'"),
                    ));
                }
                self.model
                    .can_restore(&reader, copy)
                    .map_err(|denial| accepted_but(&command, copy, &denial, raw))?;
                self.model
                    .apply_validated_restore(date, student, copy)
                    .map_err(|err| model_refused(&command, &err))
            },
        }
    }

    /// Check the response to `queried credit score`. Read-only apart from
    /// registering the student.
    pub fn check_credit_query(
        &mut self,
        date: NaiveDate,
        student: &StudentId,
        raw: &str,
    ) -> CheckResult {
        let command = Command::QueryCredit { date, student: student.clone() };
        let line: CreditLine = raw.parse().map_err(|err| {
            Violation::format(&command, format!("malformed credit line '{raw}': {err}"))
        })?;
        if line.date != date {
            return Err(Violation::context(
                &command,
                format!("credit line dated {}, expected {date}; line '{raw}'", line.date),
            ));
        }
        if &line.student != student {
            return Err(Violation::context(
                &command,
                format!("credit line names {}, expected {student}; line '{raw}'", line.student),
            ));
        }

        let expected = self.model.ensure_student(student).credit();
        if line.score != expected {
            return Err(Violation::logic(
                &command,
                format!("reported credit {}, expected {expected}; line '{raw}'", line.score),
            ));
        }
        Ok(())
    }

    /// Check the header and detail lines answering `queried <copy>`.
    ///
    /// An unknown copy has an empty trace.
    pub fn check_trace_query<S: AsRef<str>>(
        &mut self,
        date: NaiveDate,
        student: &StudentId,
        copy: BookCopyId,
        lines: &[S],
    ) -> CheckResult {
        let command = Command::QueryTrace { date, student: student.clone(), copy };
        let Some((head, details)) = lines.split_first() else {
            return Err(Violation::protocol(&command, "no trace header"));
        };
        let head = head.as_ref();
        let header: TraceHeader = head.parse().map_err(|err| {
            Violation::format(&command, format!("malformed trace header '{head}': {err}"))
        })?;
        if header.date != date {
            return Err(Violation::context(
                &command,
                format!("trace header dated {}, expected {date}; line '{head}'", header.date),
            ));
        }
        if header.copy != copy.to_string() {
            return Err(Violation::context(
                &command,
                format!("trace header names {}, expected {copy}; line '{head}'", header.copy),
            ));
        }
        if details.len() != header.count {
            return Err(Violation::protocol(
                &command,
                format!("header declares {} trace lines, got {}", header.count, details.len()),
            ));
        }

        let expected = self.model.trace_of(copy).unwrap_or_default();
        if header.count != expected.len() {
            return Err(Violation::logic(
                &command,
                format!("reported {} moves, expected {}", header.count, expected.len()),
            ));
        }
        for (index, (raw, want)) in details.iter().zip(expected).enumerate() {
            let raw = raw.as_ref();
            let entry: TraceEntry = raw.parse().map_err(|err| {
                Violation::format(&command, format!("malformed trace line '{raw}': {err}"))
            })?;
            let want = TraceEntry { seq: index + 1, date: want.date, from: want.from, to: want.to };
            if entry != want {
                return Err(Violation::logic(
                    &command,
                    format!("trace line {} is '{raw}', expected '{want}'", index + 1),
                ));
            }
        }
        Ok(())
    }

    /// Check the move list reported for an `OPEN` or `CLOSE` tidy.
    ///
    /// After an opening tidy the library must be in its opening layout:
    /// nothing in the borrow/return office or reading room, no lapsed
    /// reservation at the appointment office, hot titles on the hot shelf
    /// and nothing else there.
    pub fn check_tidy<S: AsRef<str>>(
        &mut self,
        date: NaiveDate,
        kind: TidyKind,
        lines: &[S],
    ) -> CheckResult {
        let command = match kind {
            TidyKind::Opening => Command::Open { date },
            TidyKind::Closing => Command::Close { date },
        };
        let Some((head, moves)) = lines.split_first() else {
            return Err(Violation::protocol(&command, "no move count line"));
        };
        let count = parse_move_count(head.as_ref()).map_err(|err| {
            Violation::format(&command, format!("bad move count '{}': {err}", head.as_ref()))
        })?;
        if moves.len() != count {
            return Err(Violation::protocol(
                &command,
                format!("declared {count} moves, got {}", moves.len()),
            ));
        }

        for raw in moves {
            self.check_move(&command, date, kind, raw.as_ref())?;
        }
        if kind == TidyKind::Opening {
            self.check_opening_layout(&command, date)?;
        }
        debug!(%date, ?kind, moves = count, "tidy validated");
        Ok(())
    }

    fn check_move(
        &mut self,
        command: &Command,
        date: NaiveDate,
        kind: TidyKind,
        raw: &str,
    ) -> CheckResult {
        let mv: MoveLine = raw
            .parse()
            .map_err(|err| Violation::format(command, format!("malformed move '{raw}': {err}")))?;
        if mv.date != date {
            return Err(Violation::context(
                command,
                format!("move dated {}, expected {date}; line '{raw}'", mv.date),
            ));
        }
        let book = self.model.copy(mv.copy).ok_or_else(|| {
            Violation::logic(command, format!("moves unknown copy {}; line '{raw}'", mv.copy))
        })?;
        if mv.from == mv.to {
            return Err(Violation::logic(
                command,
                format!("move from {} to itself; line '{raw}'", mv.from),
            ));
        }
        if book.location() != mv.from {
            return Err(Violation::logic(
                command,
                format!("{} is at {}, not {}; line '{raw}'", mv.copy, book.location(), mv.from),
            ));
        }

        let release = match (mv.from, book.reserved_for(), book.pickup_deadline()) {
            (Location::AppointmentOffice, Some(holder), Some(deadline)) => {
                if kind.reservation_active(date, deadline) {
                    return Err(Violation::logic(
                        command,
                        format!(
                            "{} is held for {holder} until {deadline} and cannot move; line '{raw}'",
                            mv.copy
                        ),
                    ));
                }
                true
            },
            _ => false,
        };

        let reservation = if mv.to == Location::AppointmentOffice {
            let Some(student) = mv.reserved_for.as_ref() else {
                return Err(Violation::format(
                    command,
                    format!("move to ao names no student; line '{raw}'"),
                ));
            };
            let pending = self.model.student(student).and_then(Student::pending_order);
            if pending != Some(mv.copy.isbn()) {
                return Err(Violation::logic(
                    command,
                    format!(
                        "{student} has no pending order for {}; line '{raw}'",
                        mv.copy.isbn()
                    ),
                ));
            }
            Some((student.clone(), kind.pickup_deadline(date)))
        } else {
            None
        };

        if release {
            self.model
                .clear_expired_ao_reservation(mv.copy)
                .map_err(|err| model_refused(command, &err))?;
        }
        self.model
            .apply_tidy_move(date, mv.copy, mv.from, mv.to)
            .map_err(|err| model_refused(command, &err))?;
        if let Some((student, deadline)) = reservation {
            self.model
                .apply_book_reservation_at_ao(mv.copy, &student, deadline)
                .map_err(|err| model_refused(command, &err))?;
        }
        Ok(())
    }

    fn check_opening_layout(&self, command: &Command, date: NaiveDate) -> CheckResult {
        let hot = self.model.hot_isbns();
        for book in self.model.copies() {
            let problem = match book.location() {
                Location::BorrowReturnOffice | Location::ReadingRoom => {
                    Some(format!("{} left at {} after opening", book.id(), book.location()))
                },
                Location::AppointmentOffice if book.reservation_expired(date) => {
                    Some(format!("{} left at ao after its reservation lapsed", book.id()))
                },
                Location::HotBookshelf if !hot.contains(&book.isbn()) => {
                    Some(format!("{} is not a hot title but sits on hbs", book.id()))
                },
                Location::Bookshelf if hot.contains(&book.isbn()) => {
                    Some(format!("{} is a hot title but sits on bs", book.id()))
                },
                _ => None,
            };
            if let Some(problem) = problem {
                return Err(Violation::logic(command, problem));
            }
        }
        Ok(())
    }

    /// Resolve the copy named by an accepted line and check it belongs to
    /// the requested title.
    fn claimed_copy(
        &self,
        command: &Command,
        line: &ActionLine,
        isbn: Isbn,
        raw: &str,
    ) -> Result<&BookCopy, Violation> {
        let id: BookCopyId = line.target.parse().map_err(|_| {
            Violation::format(
                command,
                format!("accepted target '{}' is not a copy id; line '{raw}'", line.target),
            )
        })?;
        let book = self.model.copy(id).ok_or_else(|| {
            Violation::logic(command, format!("accepted unknown copy {id}; line '{raw}'"))
        })?;
        if book.isbn() != isbn {
            return Err(Violation::logic(
                command,
                format!("accepted {id}, which is not a copy of {isbn}; line '{raw}'"),
            ));
        }
        Ok(book)
    }
}

fn single_line<'l, S: AsRef<str>>(command: &Command, lines: &'l [S]) -> Result<&'l str, Violation> {
    match lines {
        [line] => Ok(line.as_ref()),
        _ => Err(Violation::protocol(
            command,
            format!("expected one response line, got {}", lines.len()),
        )),
    }
}

fn expect_action(
    command: &Command,
    student: &StudentId,
    verb: ActionVerb,
    raw: &str,
) -> Result<ActionLine, Violation> {
    let line = match ActionResponse::parse(raw) {
        ActionResponse::Accepted(line) | ActionResponse::Rejected(line) => line,
        ActionResponse::Malformed { error, .. } => {
            return Err(Violation::format(command, format!("malformed response '{raw}': {error}")));
        },
    };
    if line.verb != verb {
        return Err(Violation::context(
            command,
            format!("response verb is '{}', expected '{verb}'; line '{raw}'", line.verb),
        ));
    }
    if &line.student != student {
        return Err(Violation::context(
            command,
            format!("response names {}, expected {student}; line '{raw}'", line.student),
        ));
    }
    if line.date != command.date() {
        return Err(Violation::context(
            command,
            format!("response dated {}, expected {}; line '{raw}'", line.date, command.date()),
        ));
    }
    Ok(line)
}

fn expect_isbn_echo(command: &Command, line: &ActionLine, isbn: Isbn, raw: &str) -> CheckResult {
    match line.target.parse::<Isbn>() {
        Ok(echo) if echo == isbn => Ok(()),
        _ => Err(Violation::format(
            command,
            format!("target '{}' should echo {isbn}; line '{raw}'", line.target),
        )),
    }
}

fn expect_copy_echo(
    command: &Command,
    line: &ActionLine,
    copy: BookCopyId,
    raw: &str,
) -> CheckResult {
    match line.target.parse::<BookCopyId>() {
        Ok(echo) if echo == copy => Ok(()),
        _ => Err(Violation::format(
            command,
            format!("target '{}' should echo {copy}; line '{raw}'", line.target),
        )),
    }
}

fn justify_reject(command: &Command, permission: Result<(), Denial>, raw: &str) -> CheckResult {
    match permission {
        Ok(()) => Err(Violation::logic(
            command,
            format!("rejected, but the action is permitted; line '{raw}'"),
        )),
        Err(denial) => {
            trace!(%command, %denial, "reject justified");
            Ok(())
        },
    }
}

fn accepted_but(command: &Command, copy: BookCopyId, denial: &Denial, raw: &str) -> Violation {
    Violation::logic(command, format!("accepted {copy}, but {denial}; line '{raw}'"))
}

fn model_refused(command: &Command, err: &ModelError) -> Violation {
    Violation::internal(command, format!("model refused approved update: {err}"))
}

fn overdue_label(overdue: bool) -> &'static str {
    if overdue { "overdue" } else { "not overdue" }
}

#[cfg(test)]
mod tests {
    use shelfwatch_proto::{BookType, Inventory};

    use super::*;
    use crate::violation::ViolationKind;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn library(entries: &[(&str, u32)]) -> LibrarySystem {
        let entries = entries.iter().map(|(isbn, n)| (isbn.parse().unwrap(), *n)).collect();
        let mut library = LibrarySystem::from_inventory(&Inventory::new(entries).unwrap()).unwrap();
        library.apply_open_action(day(1));
        library
    }

    fn s(id: &str) -> StudentId {
        id.parse().unwrap()
    }

    fn isbn(raw: &str) -> Isbn {
        raw.parse().unwrap()
    }

    #[test]
    fn malformed_line_is_format_violation() {
        let mut model = library(&[("B-0001", 1)]);
        let mut checker = RuleChecker::new(&mut model);
        let err = checker.check_borrow(day(1), &s("s1"), isbn("B-0001"), "garbage").unwrap_err();
        assert_eq!(err.kind, ViolationKind::Format);
    }

    #[test]
    fn echo_mismatches_are_context_violations() {
        let mut model = library(&[("B-0001", 1)]);
        let mut checker = RuleChecker::new(&mut model);
        let wrong_student = "[2025-01-01] [accept] s2 borrowed B-0001-01";
        let err = checker.check_borrow(day(1), &s("s1"), isbn("B-0001"), wrong_student).unwrap_err();
        assert_eq!(err.kind, ViolationKind::Context);

        let wrong_verb = "[2025-01-01] [accept] s1 read B-0001-01";
        let err = checker.check_borrow(day(1), &s("s1"), isbn("B-0001"), wrong_verb).unwrap_err();
        assert_eq!(err.kind, ViolationKind::Context);
    }

    #[test]
    fn type_a_borrow_must_be_rejected() {
        let mut model = library(&[("A-0001", 1)]);
        let mut checker = RuleChecker::new(&mut model);
        let accept = "[2025-01-01] [accept] s1 borrowed A-0001-01";
        let err = checker.check_borrow(day(1), &s("s1"), isbn("A-0001"), accept).unwrap_err();
        assert_eq!(err.kind, ViolationKind::Logic);

        let reject = "[2025-01-01] [reject] s1 borrowed A-0001";
        checker.check_borrow(day(1), &s("s1"), isbn("A-0001"), reject).unwrap();
    }

    #[test]
    fn accept_naming_another_title_is_refused() {
        let mut model = library(&[("B-0001", 1), ("B-0002", 1)]);
        let mut checker = RuleChecker::new(&mut model);
        let accept = "[2025-01-01] [accept] s1 borrowed B-0002-01";
        let err = checker.check_borrow(day(1), &s("s1"), isbn("B-0001"), accept).unwrap_err();
        assert_eq!(err.kind, ViolationKind::Logic);
        assert!(err.message.contains("not a copy of B-0001"));
    }

    #[test]
    fn reject_of_permitted_order_is_refused() {
        let mut model = library(&[("C-0001", 1)]);
        let mut checker = RuleChecker::new(&mut model);
        let reject = "[2025-01-01] [reject] s1 ordered C-0001";
        let err = checker.check_order(day(1), &s("s1"), isbn("C-0001"), reject).unwrap_err();
        assert_eq!(err.kind, ViolationKind::Logic);

        let accept = "[2025-01-01] [accept] s1 ordered C-0001";
        checker.check_order(day(1), &s("s1"), isbn("C-0001"), accept).unwrap();
        // A second order while one is pending must be refused.
        checker.check_order(day(1), &s("s1"), isbn("C-0001"), reject).unwrap();
        assert_eq!(checker.model().student(&s("s1")).unwrap().pending_order(), Some(isbn("C-0001")));
    }

    #[test]
    fn return_flag_must_match_due_date() {
        let mut model = library(&[("C-0001", 1)]);
        let mut checker = RuleChecker::new(&mut model);
        checker
            .check_borrow(day(1), &s("s1"), isbn("C-0001"), "[2025-01-01] [accept] s1 borrowed C-0001-01")
            .unwrap();
        let copy: BookCopyId = "C-0001-01".parse().unwrap();
        let err = checker
            .check_return(day(2), &s("s1"), copy, "[2025-01-02] [accept] s1 returned C-0001-01 overdue")
            .unwrap_err();
        assert_eq!(err.kind, ViolationKind::Logic);
        assert!(err.message.contains("'not overdue'"));
    }

    #[test]
    fn credit_query_compares_score() {
        let mut model = library(&[("B-0001", 1)]);
        let mut checker = RuleChecker::new(&mut model);
        checker.check_credit_query(day(1), &s("s1"), "[2025-01-01] s1 100").unwrap();
        let err = checker.check_credit_query(day(1), &s("s1"), "[2025-01-01] s1 110").unwrap_err();
        assert_eq!(err.kind, ViolationKind::Logic);
        assert!(checker.model().student(&s("s1")).is_some());
    }

    #[test]
    fn trace_query_checks_count_and_entries() {
        let mut model = library(&[("B-0001", 1)]);
        let mut checker = RuleChecker::new(&mut model);
        let copy: BookCopyId = "B-0001-01".parse().unwrap();
        checker
            .check_borrow(day(1), &s("s1"), isbn("B-0001"), "[2025-01-01] [accept] s1 borrowed B-0001-01")
            .unwrap();

        let good = ["[2025-01-01] B-0001-01 moving trace: 1", "1 [2025-01-01] from bs to user"];
        checker.check_trace_query(day(1), &s("s2"), copy, &good).unwrap();

        let wrong_to = ["[2025-01-01] B-0001-01 moving trace: 1", "1 [2025-01-01] from bs to rr"];
        let err = checker.check_trace_query(day(1), &s("s2"), copy, &wrong_to).unwrap_err();
        assert_eq!(err.kind, ViolationKind::Logic);

        let short = ["[2025-01-01] B-0001-01 moving trace: 2", "1 [2025-01-01] from bs to user"];
        let err = checker.check_trace_query(day(1), &s("s2"), copy, &short).unwrap_err();
        assert_eq!(err.kind, ViolationKind::Protocol);

        let unknown: BookCopyId = "B-0009-01".parse().unwrap();
        checker
            .check_trace_query(day(1), &s("s2"), unknown, &["[2025-01-01] B-0009-01 moving trace: 0"])
            .unwrap();
    }

    #[test]
    fn tidy_rejects_impossible_moves() {
        let mut model = library(&[("B-0001", 2)]);
        let mut checker = RuleChecker::new(&mut model);

        let same = ["1", "[2025-01-02] move B-0001-01 from bs to bs"];
        assert_eq!(
            checker.check_tidy(day(2), TidyKind::Closing, &same).unwrap_err().kind,
            ViolationKind::Logic
        );

        let wrong_from = ["1", "[2025-01-02] move B-0001-01 from bro to bs"];
        assert_eq!(
            checker.check_tidy(day(2), TidyKind::Closing, &wrong_from).unwrap_err().kind,
            ViolationKind::Logic
        );

        let unordered = ["1", "[2025-01-02] move B-0001-01 from bs to ao for s1"];
        assert_eq!(
            checker.check_tidy(day(2), TidyKind::Closing, &unordered).unwrap_err().kind,
            ViolationKind::Logic
        );

        let miscounted = ["2", "[2025-01-02] move B-0001-01 from bs to hbs"];
        assert_eq!(
            checker.check_tidy(day(2), TidyKind::Closing, &miscounted).unwrap_err().kind,
            ViolationKind::Protocol
        );
    }

    #[test]
    fn opening_tidy_enforces_hot_shelf_layout() {
        let mut model = library(&[("B-0001", 2)]);
        {
            let mut checker = RuleChecker::new(&mut model);
            checker
                .check_borrow(day(1), &s("s1"), isbn("B-0001"), "[2025-01-01] [accept] s1 borrowed B-0001-01")
                .unwrap();
        }
        model.apply_close_action(day(1));
        model.advance_time_to(day(2));
        model.apply_open_action(day(2));
        assert!(model.hot_isbns().contains(&isbn("B-0001")));

        let mut scratch = model.clone();
        let err = RuleChecker::new(&mut scratch)
            .check_tidy(day(2), TidyKind::Opening, &["0"])
            .unwrap_err();
        assert!(err.message.contains("hot title but sits on bs"));

        RuleChecker::new(&mut model)
            .check_tidy(day(2), TidyKind::Opening, &["1", "[2025-01-02] move B-0001-02 from bs to hbs"])
            .unwrap();
        let moved = model.copy("B-0001-02".parse().unwrap()).unwrap();
        assert_eq!(moved.location(), Location::HotBookshelf);
        assert_eq!(moved.book_type(), BookType::B);
    }
}
