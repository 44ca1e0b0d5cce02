//! Commands written to the SUT's stdin.
//!
//! Every command is one line prefixed with its simulated date:
//!
//! ```text
//! [2025-01-03] OPEN
//! [2025-01-03] 23370001 borrowed B-0001
//! [2025-01-03] 23370001 queried B-0001-01
//! [2025-01-03] 23370001 queried credit score
//! [2025-01-03] CLOSE
//! ```

use std::{fmt, str::FromStr};

use chrono::NaiveDate;

use crate::{
    errors::{ProtocolError, Result},
    ids::{BookCopyId, Isbn, StudentId},
};

/// Format of the bracketed date prefix.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `[YYYY-MM-DD]` token.
pub fn parse_date_token(token: &str) -> Result<NaiveDate> {
    let inner = token
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| ProtocolError::InvalidDate(token.to_string()))?;
    NaiveDate::parse_from_str(inner, DATE_FORMAT)
        .map_err(|_| ProtocolError::InvalidDate(token.to_string()))
}

/// How many response lines a command produces, and how to count them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Exactly one line.
    Single,
    /// A `moving trace: k` header followed by `k` entry lines.
    TraceQuery,
    /// A move-count line followed by that many move lines.
    Tidy,
}

/// Past-tense verb used by a user action, as echoed in responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionVerb {
    /// `borrowed`
    Borrowed,
    /// `returned`
    Returned,
    /// `ordered`
    Ordered,
    /// `picked`
    Picked,
    /// `read`
    Read,
    /// `restored`
    Restored,
}

impl ActionVerb {
    /// Wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Borrowed => "borrowed",
            Self::Returned => "returned",
            Self::Ordered => "ordered",
            Self::Picked => "picked",
            Self::Read => "read",
            Self::Restored => "restored",
        }
    }

    /// Parse the wire spelling.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "borrowed" => Some(Self::Borrowed),
            "returned" => Some(Self::Returned),
            "ordered" => Some(Self::Ordered),
            "picked" => Some(Self::Picked),
            "read" => Some(Self::Read),
            "restored" => Some(Self::Restored),
            _ => None,
        }
    }
}

impl fmt::Display for ActionVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One command line for the SUT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Library opens; the SUT reports its opening tidy.
    Open {
        /// Simulated date.
        date: NaiveDate,
    },

    /// Library closes; the SUT reports its closing tidy.
    Close {
        /// Simulated date.
        date: NaiveDate,
    },

    /// Borrow any shelved copy of a title.
    Borrow {
        /// Simulated date.
        date: NaiveDate,
        /// Borrowing student.
        student: StudentId,
        /// Requested title.
        isbn: Isbn,
    },

    /// Return a held copy.
    Return {
        /// Simulated date.
        date: NaiveDate,
        /// Returning student.
        student: StudentId,
        /// Copy being returned.
        copy: BookCopyId,
    },

    /// Order a title for later pickup at the appointment office.
    Order {
        /// Simulated date.
        date: NaiveDate,
        /// Ordering student.
        student: StudentId,
        /// Requested title.
        isbn: Isbn,
    },

    /// Pick up a reserved copy from the appointment office.
    Pick {
        /// Simulated date.
        date: NaiveDate,
        /// Picking student.
        student: StudentId,
        /// Title of the reserved copy.
        isbn: Isbn,
    },

    /// Read a shelved copy in the reading room.
    Read {
        /// Simulated date.
        date: NaiveDate,
        /// Reading student.
        student: StudentId,
        /// Requested title.
        isbn: Isbn,
    },

    /// Hand a reading-room copy back.
    Restore {
        /// Simulated date.
        date: NaiveDate,
        /// Restoring student.
        student: StudentId,
        /// Copy being restored.
        copy: BookCopyId,
    },

    /// Ask for a copy's movement trace.
    QueryTrace {
        /// Simulated date.
        date: NaiveDate,
        /// Asking student.
        student: StudentId,
        /// Queried copy.
        copy: BookCopyId,
    },

    /// Ask for a student's credit score.
    QueryCredit {
        /// Simulated date.
        date: NaiveDate,
        /// Asking student.
        student: StudentId,
    },
}

impl Command {
    /// Simulated date of the command.
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Open { date }
            | Self::Close { date }
            | Self::Borrow { date, .. }
            | Self::Return { date, .. }
            | Self::Order { date, .. }
            | Self::Pick { date, .. }
            | Self::Read { date, .. }
            | Self::Restore { date, .. }
            | Self::QueryTrace { date, .. }
            | Self::QueryCredit { date, .. } => *date,
        }
    }

    /// Student issuing the command, if it is a user command.
    pub fn student(&self) -> Option<&StudentId> {
        match self {
            Self::Open { .. } | Self::Close { .. } => None,
            Self::Borrow { student, .. }
            | Self::Return { student, .. }
            | Self::Order { student, .. }
            | Self::Pick { student, .. }
            | Self::Read { student, .. }
            | Self::Restore { student, .. }
            | Self::QueryTrace { student, .. }
            | Self::QueryCredit { student, .. } => Some(student),
        }
    }

    /// Whether this is an OPEN or CLOSE.
    pub fn is_tidy(&self) -> bool {
        matches!(self, Self::Open { .. } | Self::Close { .. })
    }

    /// How the SUT's response to this command is framed.
    pub fn response_shape(&self) -> ResponseShape {
        match self {
            Self::Open { .. } | Self::Close { .. } => ResponseShape::Tidy,
            Self::QueryTrace { .. } => ResponseShape::TraceQuery,
            _ => ResponseShape::Single,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = self.date().format(DATE_FORMAT);
        match self {
            Self::Open { .. } => write!(f, "[{date}] OPEN"),
            Self::Close { .. } => write!(f, "[{date}] CLOSE"),
            Self::Borrow { student, isbn, .. } => write!(f, "[{date}] {student} borrowed {isbn}"),
            Self::Return { student, copy, .. } => write!(f, "[{date}] {student} returned {copy}"),
            Self::Order { student, isbn, .. } => write!(f, "[{date}] {student} ordered {isbn}"),
            Self::Pick { student, isbn, .. } => write!(f, "[{date}] {student} picked {isbn}"),
            Self::Read { student, isbn, .. } => write!(f, "[{date}] {student} read {isbn}"),
            Self::Restore { student, copy, .. } => write!(f, "[{date}] {student} restored {copy}"),
            Self::QueryTrace { student, copy, .. } => write!(f, "[{date}] {student} queried {copy}"),
            Self::QueryCredit { student, .. } => write!(f, "[{date}] {student} queried credit score"),
        }
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((&date_token, rest)) = parts.split_first() else {
            return Err(ProtocolError::malformed("command", line));
        };
        let date = parse_date_token(date_token)?;

        match rest {
            ["OPEN"] => Ok(Self::Open { date }),
            ["CLOSE"] => Ok(Self::Close { date }),
            [student, "queried", "credit", "score"] => {
                Ok(Self::QueryCredit { date, student: student.parse()? })
            },
            [student, verb, target] => {
                let student: StudentId = student.parse()?;
                match *verb {
                    "borrowed" => Ok(Self::Borrow { date, student, isbn: target.parse()? }),
                    "returned" => Ok(Self::Return { date, student, copy: target.parse()? }),
                    "ordered" => Ok(Self::Order { date, student, isbn: target.parse()? }),
                    "picked" => Ok(Self::Pick { date, student, isbn: target.parse()? }),
                    "read" => Ok(Self::Read { date, student, isbn: target.parse()? }),
                    "restored" => Ok(Self::Restore { date, student, copy: target.parse()? }),
                    "queried" => Ok(Self::QueryTrace { date, student, copy: target.parse()? }),
                    _ => Err(ProtocolError::malformed("command", line)),
                }
            },
            _ => Err(ProtocolError::malformed("command", line)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    #[test]
    fn formats_user_commands() {
        let cmd = Command::Borrow {
            date: day(3),
            student: "23370001".parse().unwrap(),
            isbn: "B-0001".parse().unwrap(),
        };
        insta::assert_snapshot!(cmd.to_string(), @"[2025-01-03] 23370001 borrowed B-0001");

        let cmd = Command::QueryCredit { date: day(9), student: "s1".parse().unwrap() };
        insta::assert_snapshot!(cmd.to_string(), @"[2025-01-09] s1 queried credit score");
    }

    #[test]
    fn parses_trace_query_and_credit_query_apart() {
        let trace: Command = "[2025-01-02] s1 queried A-0001-01".parse().unwrap();
        assert_eq!(trace.response_shape(), ResponseShape::TraceQuery);

        let credit: Command = "[2025-01-02] s1 queried credit score".parse().unwrap();
        assert_eq!(credit.response_shape(), ResponseShape::Single);
    }

    #[test]
    fn tidy_commands_have_tidy_shape() {
        let open: Command = "[2025-01-02] OPEN".parse().unwrap();
        assert!(open.is_tidy());
        assert_eq!(open.response_shape(), ResponseShape::Tidy);
        assert_eq!(open.student(), None);
    }

    #[test]
    fn rejects_unknown_verbs_and_bad_dates() {
        assert!("[2025-01-02] s1 stole B-0001".parse::<Command>().is_err());
        assert!("[2025-13-02] OPEN".parse::<Command>().is_err());
        assert!("2025-01-02 OPEN".parse::<Command>().is_err());
        assert!("".parse::<Command>().is_err());
    }
}
