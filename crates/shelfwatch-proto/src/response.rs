//! Typed records for the SUT's stdout.
//!
//! The SUT answers each command with one of four line shapes:
//!
//! ```text
//! [2025-01-03] [accept] 23370001 borrowed B-0001-01
//! [2025-01-03] [accept] 23370001 returned B-0001-01 not overdue
//! [2025-01-03] 23370001 110
//! [2025-01-03] B-0001-01 moving trace: 2
//! 1 [2025-01-03] from bs to user
//! 2
//! [2025-01-04] move B-0001-01 from bro to bs
//! [2025-01-04] move C-0002-01 from bs to ao for 23370002
//! ```
//!
//! Parsers check structure only; whether a line is *correct* is decided by
//! the rule checker against the model.

use std::{fmt, str::FromStr};

use chrono::NaiveDate;

use crate::{
    command::{ActionVerb, parse_date_token},
    errors::{ProtocolError, Result},
    ids::{BookCopyId, StudentId},
    location::Location,
};

/// Accept/reject decision in an action line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `[accept]`
    Accept,
    /// `[reject]`
    Reject,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept => f.write_str("[accept]"),
            Self::Reject => f.write_str("[reject]"),
        }
    }
}

/// A parsed user-action response line.
///
/// The target is kept as raw text: an accepted borrow names a copy while a
/// rejected one echoes the ISBN, so its interpretation depends on context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionLine {
    /// Echoed date.
    pub date: NaiveDate,
    /// Accept or reject.
    pub status: Status,
    /// Echoed student.
    pub student: StudentId,
    /// Echoed verb.
    pub verb: ActionVerb,
    /// Echoed target (ISBN or copy id).
    pub target: String,
    /// Overdue flag; present exactly when `verb` is `returned`.
    pub overdue: Option<bool>,
}

impl FromStr for ActionLine {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self> {
        let malformed = || ProtocolError::malformed("action", line);
        let parts: Vec<&str> = line.split_whitespace().collect();
        if !(5..=7).contains(&parts.len()) {
            return Err(malformed());
        }

        let date = parse_date_token(parts[0])?;
        let status = match parts[1] {
            "[accept]" => Status::Accept,
            "[reject]" => Status::Reject,
            _ => return Err(malformed()),
        };
        let student: StudentId = parts[2].parse()?;
        let verb = ActionVerb::from_wire(parts[3]).ok_or_else(malformed)?;
        let target = parts[4].to_string();

        let overdue = match (verb, &parts[5..]) {
            (ActionVerb::Returned, ["overdue"]) => Some(true),
            (ActionVerb::Returned, ["not", "overdue"]) => Some(false),
            (ActionVerb::Returned, _) => return Err(malformed()),
            (_, []) => None,
            (_, _) => return Err(malformed()),
        };

        Ok(Self { date, status, student, verb, target, overdue })
    }
}

/// Response to a single-line user action, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResponse {
    /// The SUT accepted the action.
    Accepted(ActionLine),
    /// The SUT refused the action.
    Rejected(ActionLine),
    /// The line could not be parsed at all.
    Malformed {
        /// Raw line.
        raw: String,
        /// Why it did not parse.
        error: ProtocolError,
    },
}

impl ActionResponse {
    /// Classify a raw line.
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<ActionLine>() {
            Ok(line) => match line.status {
                Status::Accept => Self::Accepted(line),
                Status::Reject => Self::Rejected(line),
            },
            Err(error) => Self::Malformed { raw: raw.to_string(), error },
        }
    }
}

/// Credit query answer: `[date] <student> <score>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditLine {
    /// Echoed date.
    pub date: NaiveDate,
    /// Echoed student.
    pub student: StudentId,
    /// Reported score.
    pub score: i64,
}

impl FromStr for CreditLine {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self> {
        let [date, student, score] = line.split_whitespace().collect::<Vec<_>>()[..] else {
            return Err(ProtocolError::malformed("credit", line));
        };
        Ok(Self {
            date: parse_date_token(date)?,
            student: student.parse()?,
            score: score.parse().map_err(|_| ProtocolError::malformed("credit", line))?,
        })
    }
}

/// Trace query header: `[date] <copy> moving trace: <k>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceHeader {
    /// Echoed date.
    pub date: NaiveDate,
    /// Echoed copy id, raw.
    pub copy: String,
    /// Number of entry lines that follow.
    pub count: usize,
}

impl FromStr for TraceHeader {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self> {
        let ["moving", "trace:", count] = line.split_whitespace().skip(2).collect::<Vec<_>>()[..]
        else {
            return Err(ProtocolError::malformed("trace header", line));
        };
        let mut head = line.split_whitespace();
        let (Some(date), Some(copy)) = (head.next(), head.next()) else {
            return Err(ProtocolError::malformed("trace header", line));
        };
        Ok(Self {
            date: parse_date_token(date)?,
            copy: copy.to_string(),
            count: parse_count(count)?,
        })
    }
}

/// One trace entry: `<seq> [date] from <loc> to <loc>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    /// 1-based position in the trace.
    pub seq: usize,
    /// Date of the move.
    pub date: NaiveDate,
    /// Origin.
    pub from: Location,
    /// Destination.
    pub to: Location,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] from {} to {}",
            self.seq,
            self.date.format(crate::command::DATE_FORMAT),
            self.from,
            self.to
        )
    }
}

impl FromStr for TraceEntry {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self> {
        let [seq, date, "from", from, "to", to] = line.split_whitespace().collect::<Vec<_>>()[..]
        else {
            return Err(ProtocolError::malformed("trace entry", line));
        };
        Ok(Self {
            seq: seq.parse().map_err(|_| ProtocolError::malformed("trace entry", line))?,
            date: parse_date_token(date)?,
            from: from.parse()?,
            to: to.parse()?,
        })
    }
}

/// One tidy move: `[date] move <copy> from <loc> to <loc> [for <student>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveLine {
    /// Echoed date.
    pub date: NaiveDate,
    /// Moved copy.
    pub copy: BookCopyId,
    /// Claimed origin.
    pub from: Location,
    /// Destination.
    pub to: Location,
    /// Student the copy is reserved for; present exactly when `to` is the
    /// appointment office.
    pub reserved_for: Option<StudentId>,
}

impl fmt::Display for MoveLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] move {} from {} to {}",
            self.date.format(crate::command::DATE_FORMAT),
            self.copy,
            self.from,
            self.to
        )?;
        if let Some(student) = &self.reserved_for {
            write!(f, " for {student}")?;
        }
        Ok(())
    }
}

impl FromStr for MoveLine {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self> {
        let malformed = || ProtocolError::malformed("tidy move", line);
        let parts: Vec<&str> = line.split_whitespace().collect();
        let (date, copy, from, to, reserved_for) = match parts[..] {
            [date, "move", copy, "from", from, "to", to] => (date, copy, from, to, None),
            [date, "move", copy, "from", from, "to", to, "for", student] => {
                (date, copy, from, to, Some(student))
            },
            _ => return Err(malformed()),
        };

        let from: Location = from.parse()?;
        let to: Location = to.parse()?;
        if !from.is_tidy() || !to.is_tidy() {
            return Err(malformed());
        }
        let reserved_for = match (to, reserved_for) {
            (Location::AppointmentOffice, Some(student)) => Some(student.parse()?),
            (Location::AppointmentOffice, None) | (_, Some(_)) => return Err(malformed()),
            (_, None) => None,
        };

        Ok(Self { date: parse_date_token(date)?, copy: copy.parse()?, from, to, reserved_for })
    }
}

/// Parse a tidy move-count line.
pub fn parse_move_count(line: &str) -> Result<usize> {
    parse_count(line.trim())
}

fn parse_count(token: &str) -> Result<usize> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProtocolError::InvalidCount(token.to_string()));
    }
    token.parse().map_err(|_| ProtocolError::InvalidCount(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_line_with_overdue_flag() {
        let line: ActionLine =
            "[2025-01-03] [accept] s1 returned B-0001-01 not overdue".parse().unwrap();
        assert_eq!(line.verb, ActionVerb::Returned);
        assert_eq!(line.overdue, Some(false));

        let line: ActionLine = "[2025-01-03] [accept] s1 returned B-0001-01 overdue".parse().unwrap();
        assert_eq!(line.overdue, Some(true));
    }

    #[test]
    fn overdue_flag_only_on_returns() {
        assert!("[2025-01-03] [accept] s1 returned B-0001-01".parse::<ActionLine>().is_err());
        assert!("[2025-01-03] [accept] s1 borrowed B-0001-01 overdue".parse::<ActionLine>().is_err());
    }

    #[test]
    fn action_response_classifies() {
        assert!(matches!(
            ActionResponse::parse("[2025-01-03] [reject] s1 borrowed B-0001"),
            ActionResponse::Rejected(_)
        ));
        assert!(matches!(
            ActionResponse::parse("[2025-01-03] [maybe] s1 borrowed B-0001"),
            ActionResponse::Malformed { .. }
        ));
    }

    #[test]
    fn trace_header_and_entries() {
        let header: TraceHeader = "[2025-01-03] B-0001-01 moving trace: 2".parse().unwrap();
        assert_eq!(header.copy, "B-0001-01");
        assert_eq!(header.count, 2);
        assert!("[2025-01-03] B-0001-01 moving trace: -1".parse::<TraceHeader>().is_err());

        let entry: TraceEntry = "1 [2025-01-03] from bs to user".parse().unwrap();
        assert_eq!(entry.from, Location::Bookshelf);
        assert_eq!(entry.to, Location::User);
        assert_eq!(entry.to_string(), "1 [2025-01-03] from bs to user");
    }

    #[test]
    fn move_lines_require_student_only_for_appointment_office() {
        let mv: MoveLine = "[2025-01-04] move C-0002-01 from bs to ao for s2".parse().unwrap();
        assert_eq!(mv.reserved_for, Some("s2".parse().unwrap()));
        assert_eq!(mv.to_string(), "[2025-01-04] move C-0002-01 from bs to ao for s2");

        assert!("[2025-01-04] move C-0002-01 from bs to ao".parse::<MoveLine>().is_err());
        assert!("[2025-01-04] move C-0002-01 from bs to hbs for s2".parse::<MoveLine>().is_err());
        assert!("[2025-01-04] move C-0002-01 from bs to user".parse::<MoveLine>().is_err());
    }

    #[test]
    fn move_count_is_non_negative_integer() {
        assert_eq!(parse_move_count("3").unwrap(), 3);
        assert_eq!(parse_move_count("0").unwrap(), 0);
        assert!(parse_move_count("-1").is_err());
        assert!(parse_move_count("three").is_err());
    }

    #[test]
    fn credit_line() {
        let line: CreditLine = "[2025-01-03] s1 110".parse().unwrap();
        assert_eq!(line.score, 110);
        assert!("[2025-01-03] s1".parse::<CreditLine>().is_err());
    }
}
