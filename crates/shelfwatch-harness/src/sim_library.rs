//! In-process library that plays the SUT.
//!
//! `SimLibrary` consumes the same stdin lines a real SUT would and produces
//! the stdout lines a correct one would: it decides every action with the
//! model's own permission predicates and runs a complete tidy plan at OPEN
//! and CLOSE. A [`SimFault`] makes it misbehave in one specific way, which
//! is how the failure paths of the checker and driver get exercised.

use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use shelfwatch_core::{LibrarySystem, ModelError, TidyKind};
use shelfwatch_proto::{
    ActionVerb, BookCopyId, Command, Isbn, Location, MoveLine, ProtocolError, Status, StudentId,
    parse_move_count,
};
use thiserror::Error;
use tracing::{debug, trace};

/// A deliberate deviation from correct behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimFault {
    /// Behave correctly.
    #[default]
    None,
    /// Reject every return.
    RejectReturns,
    /// Report the opposite overdue flag on returns.
    FlipOverdue,
    /// Report credit one point too high.
    InflateCredit,
    /// Report an empty opening tidy and leave the shelves as they are.
    SkipOpeningTidy,
    /// Answer credit queries twice.
    ExtraOutput,
    /// Go silent after this many commands.
    StallAfter(usize),
}

impl fmt::Display for SimFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::RejectReturns => f.write_str("reject-returns"),
            Self::FlipOverdue => f.write_str("flip-overdue"),
            Self::InflateCredit => f.write_str("inflate-credit"),
            Self::SkipOpeningTidy => f.write_str("skip-opening-tidy"),
            Self::ExtraOutput => f.write_str("extra-output"),
            Self::StallAfter(n) => write!(f, "stall:{n}"),
        }
    }
}

impl FromStr for SimFault {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "reject-returns" => Ok(Self::RejectReturns),
            "flip-overdue" => Ok(Self::FlipOverdue),
            "inflate-credit" => Ok(Self::InflateCredit),
            "skip-opening-tidy" => Ok(Self::SkipOpeningTidy),
            "extra-output" => Ok(Self::ExtraOutput),
            other => other
                .strip_prefix("stall:")
                .and_then(|n| n.parse().ok())
                .map(Self::StallAfter)
                .ok_or_else(|| format!("unknown fault '{other}'")),
        }
    }
}

/// Input the simulated library cannot make sense of.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// Bad inventory block.
    #[error("inventory: {0}")]
    Inventory(#[from] ProtocolError),

    /// Unreadable command line.
    #[error("unreadable command '{line}': {source}")]
    Command {
        /// Raw line.
        line: String,
        /// Parse failure.
        source: ProtocolError,
    },

    /// The model refused an update the simulated library decided on.
    #[error("model: {0}")]
    Model(#[from] ModelError),
}

#[derive(Debug)]
enum Phase {
    Header,
    Inventory { expected: usize, lines: Vec<String> },
    Serving,
}

/// A correct library, one line at a time.
#[derive(Debug)]
pub struct SimLibrary {
    model: LibrarySystem,
    fault: SimFault,
    phase: Phase,
    commands_seen: usize,
}

impl SimLibrary {
    /// Create a library waiting for its inventory block.
    pub fn new(fault: SimFault) -> Self {
        Self { model: LibrarySystem::new(), fault, phase: Phase::Header, commands_seen: 0 }
    }

    /// The library's own view of its state.
    pub fn model(&self) -> &LibrarySystem {
        &self.model
    }

    /// Whether the inventory block has been fully read.
    pub fn is_serving(&self) -> bool {
        matches!(self.phase, Phase::Serving)
    }

    /// Consume one input line and return the output lines it produces.
    ///
    /// Inventory lines produce no output.
    pub fn feed_line(&mut self, line: &str) -> Result<Vec<String>, SimError> {
        let line = line.trim();
        match &mut self.phase {
            Phase::Header => {
                let expected = parse_move_count(line)?;
                self.phase = Phase::Inventory { expected, lines: vec![line.to_string()] };
                self.finish_inventory()?;
                Ok(Vec::new())
            },
            Phase::Inventory { lines, .. } => {
                lines.push(line.to_string());
                self.finish_inventory()?;
                Ok(Vec::new())
            },
            Phase::Serving => {
                let command: Command = line
                    .parse()
                    .map_err(|source| SimError::Command { line: line.to_string(), source })?;
                self.commands_seen += 1;
                if let SimFault::StallAfter(limit) = self.fault
                    && self.commands_seen > limit
                {
                    trace!(%command, "stalled");
                    return Ok(Vec::new());
                }
                let mut output = self.respond(&command)?;
                if self.fault == SimFault::ExtraOutput
                    && matches!(command, Command::QueryCredit { .. })
                    && let Some(first) = output.first().cloned()
                {
                    output.push(first);
                }
                Ok(output)
            },
        }
    }

    fn finish_inventory(&mut self) -> Result<(), SimError> {
        if let Phase::Inventory { expected, lines } = &self.phase
            && lines.len() > *expected
        {
            self.model = LibrarySystem::from_inventory_lines(lines)?;
            self.phase = Phase::Serving;
            debug!(titles = self.model.titles().len(), "simulated library stocked");
        }
        Ok(())
    }

    /// Answer one command, updating the library.
    pub fn respond(&mut self, command: &Command) -> Result<Vec<String>, SimError> {
        self.model.advance_time_to(command.date());
        if let Some(student) = command.student() {
            self.model.ensure_student(student);
        }

        let lines = match command {
            Command::Open { date } => {
                self.model.apply_open_action(*date);
                self.tidy(*date, TidyKind::Opening)?
            },
            Command::Close { date } => {
                self.model.apply_close_action(*date);
                self.tidy(*date, TidyKind::Closing)?
            },
            Command::Borrow { date, student, isbn } => vec![self.borrow(*date, student, *isbn)?],
            Command::Return { date, student, copy } => vec![self.give_back(*date, student, *copy)?],
            Command::Order { date, student, isbn } => vec![self.order(*date, student, *isbn)],
            Command::Pick { date, student, isbn } => vec![self.pick(*date, student, *isbn)?],
            Command::Read { date, student, isbn } => vec![self.read(*date, student, *isbn)?],
            Command::Restore { date, student, copy } => vec![self.restore(*date, student, *copy)?],
            Command::QueryTrace { date, copy, .. } => self.trace(*date, *copy),
            Command::QueryCredit { date, student } => {
                let mut credit = self.model.credit_of(student);
                if self.fault == SimFault::InflateCredit {
                    credit += 1;
                }
                vec![format!("[{date}] {student} {credit}")]
            },
        };
        trace!(%command, lines = lines.len(), "answered");
        Ok(lines)
    }

    fn borrow(
        &mut self,
        date: NaiveDate,
        student: &StudentId,
        isbn: Isbn,
    ) -> Result<String, SimError> {
        let reader = self.model.student_or_new(student).into_owned();
        let copy = match self.model.can_borrow(&reader, isbn) {
            Ok(()) => self.model.first_shelved_copy(isbn),
            Err(_) => None,
        };
        let Some(copy) = copy else {
            return Ok(action(date, Status::Reject, student, ActionVerb::Borrowed, isbn));
        };
        self.model.apply_validated_borrow(date, student, copy)?;
        Ok(action(date, Status::Accept, student, ActionVerb::Borrowed, copy))
    }

    fn give_back(
        &mut self,
        date: NaiveDate,
        student: &StudentId,
        copy: BookCopyId,
    ) -> Result<String, SimError> {
        if self.fault == SimFault::RejectReturns || self.model.can_return(student, copy).is_err() {
            let line = action(date, Status::Reject, student, ActionVerb::Returned, copy);
            return Ok(format!("{line} not overdue"));
        }
        let mut overdue = self.model.apply_validated_return(date, student, copy)?;
        if self.fault == SimFault::FlipOverdue {
            overdue = !overdue;
        }
        let label = if overdue { "overdue" } else { "not overdue" };
        let line = action(date, Status::Accept, student, ActionVerb::Returned, copy);
        Ok(format!("{line} {label}"))
    }

    fn order(&mut self, date: NaiveDate, student: &StudentId, isbn: Isbn) -> String {
        let reader = self.model.student_or_new(student).into_owned();
        if self.model.can_order(&reader, isbn).is_err() {
            return action(date, Status::Reject, student, ActionVerb::Ordered, isbn);
        }
        self.model.apply_validated_order(student, isbn);
        action(date, Status::Accept, student, ActionVerb::Ordered, isbn)
    }

    fn pick(&mut self, date: NaiveDate, student: &StudentId, isbn: Isbn) -> Result<String, SimError> {
        let reader = self.model.student_or_new(student).into_owned();
        let copy = match self.model.can_pick(&reader, isbn, date) {
            Ok(()) => reader.reserved_copy(),
            Err(_) => None,
        };
        let Some(copy) = copy else {
            return Ok(action(date, Status::Reject, student, ActionVerb::Picked, isbn));
        };
        self.model.apply_validated_pick(date, student, copy)?;
        Ok(action(date, Status::Accept, student, ActionVerb::Picked, copy))
    }

    fn read(&mut self, date: NaiveDate, student: &StudentId, isbn: Isbn) -> Result<String, SimError> {
        let reader = self.model.student_or_new(student).into_owned();
        let copy = match self.model.can_read(&reader, isbn) {
            Ok(()) => self.model.first_shelved_copy(isbn),
            Err(_) => None,
        };
        let Some(copy) = copy else {
            return Ok(action(date, Status::Reject, student, ActionVerb::Read, isbn));
        };
        self.model.apply_validated_read(date, student, copy)?;
        Ok(action(date, Status::Accept, student, ActionVerb::Read, copy))
    }

    fn restore(
        &mut self,
        date: NaiveDate,
        student: &StudentId,
        copy: BookCopyId,
    ) -> Result<String, SimError> {
        let reader = self.model.student_or_new(student).into_owned();
        if self.model.can_restore(&reader, copy).is_err() {
            return Ok(action(date, Status::Reject, student, ActionVerb::Restored, copy));
        }
        self.model.apply_validated_restore(date, student, copy)?;
        Ok(action(date, Status::Accept, student, ActionVerb::Restored, copy))
    }

    fn trace(&self, date: NaiveDate, copy: BookCopyId) -> Vec<String> {
        let records = self.model.trace_of(copy).unwrap_or_default();
        let mut lines = Vec::with_capacity(records.len() + 1);
        lines.push(format!("[{date}] {copy} moving trace: {}", records.len()));
        lines.extend(records.iter().enumerate().map(|(i, record)| {
            format!("{} [{}] from {} to {}", i + 1, record.date, record.from, record.to)
        }));
        lines
    }

    /// Run a tidy and report it as a count line followed by move lines.
    ///
    /// An opening tidy clears lapsed reservations out of the appointment
    /// office, shelves everything left in the borrow/return office and
    /// reading room, and rebalances the two shelves by hotness. Both tidies
    /// then set aside one shelved copy for every pending order they can
    /// fill.
    fn tidy(&mut self, date: NaiveDate, kind: TidyKind) -> Result<Vec<String>, SimError> {
        if kind == TidyKind::Opening && self.fault == SimFault::SkipOpeningTidy {
            return Ok(vec!["0".to_string()]);
        }

        let mut moves = Vec::new();
        if kind == TidyKind::Opening {
            let lapsed: Vec<BookCopyId> = self
                .model
                .copies_at(Location::AppointmentOffice)
                .filter(|copy| {
                    copy.pickup_deadline()
                        .is_none_or(|deadline| !kind.reservation_active(date, deadline))
                })
                .map(|copy| copy.id())
                .collect();
            for copy in lapsed {
                self.model.clear_expired_ao_reservation(copy)?;
                self.shelve(date, copy, &mut moves)?;
            }

            let hot = self.model.hot_isbns().clone();
            let misplaced: Vec<BookCopyId> = self
                .model
                .copies()
                .filter(|copy| match copy.location() {
                    Location::BorrowReturnOffice | Location::ReadingRoom => true,
                    Location::HotBookshelf => !hot.contains(&copy.isbn()),
                    Location::Bookshelf => hot.contains(&copy.isbn()),
                    _ => false,
                })
                .map(|copy| copy.id())
                .collect();
            for copy in misplaced {
                self.shelve(date, copy, &mut moves)?;
            }
        }

        let wanted: Vec<(StudentId, Isbn)> = self
            .model
            .students()
            .filter_map(|student| Some((student.id().clone(), student.pending_order()?)))
            .collect();
        for (student, isbn) in wanted {
            let Some(copy) = self.model.first_shelved_copy(isbn) else { continue };
            let from = self.model.copy(copy).map_or(Location::Bookshelf, |book| book.location());
            self.model.apply_tidy_move(date, copy, from, Location::AppointmentOffice)?;
            self.model.apply_book_reservation_at_ao(copy, &student, kind.pickup_deadline(date))?;
            moves.push(MoveLine {
                date,
                copy,
                from,
                to: Location::AppointmentOffice,
                reserved_for: Some(student),
            });
        }

        debug!(%date, ?kind, moves = moves.len(), "simulated tidy");
        let mut lines = Vec::with_capacity(moves.len() + 1);
        lines.push(moves.len().to_string());
        lines.extend(moves.iter().map(ToString::to_string));
        Ok(lines)
    }

    fn shelve(
        &mut self,
        date: NaiveDate,
        copy: BookCopyId,
        moves: &mut Vec<MoveLine>,
    ) -> Result<(), SimError> {
        let Some(book) = self.model.copy(copy) else {
            return Err(ModelError::UnknownCopy(copy).into());
        };
        let from = book.location();
        let to = if self.model.hot_isbns().contains(&copy.isbn()) {
            Location::HotBookshelf
        } else {
            Location::Bookshelf
        };
        if from == to {
            return Ok(());
        }
        self.model.apply_tidy_move(date, copy, from, to)?;
        moves.push(MoveLine { date, copy, from, to, reserved_for: None });
        Ok(())
    }
}

fn action(
    date: NaiveDate,
    status: Status,
    student: &StudentId,
    verb: ActionVerb,
    target: impl fmt::Display,
) -> String {
    format!("[{date}] {status} {student} {verb} {target}")
}
