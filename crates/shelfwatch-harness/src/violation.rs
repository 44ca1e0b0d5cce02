//! Violations reported by the rule checker.

use std::fmt;

use thiserror::Error;

/// Category of a rule violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    /// A response line did not parse or had the wrong structure.
    Format,
    /// A response line parsed but echoed the wrong date, student, verb or
    /// target.
    Context,
    /// A response contradicts the model.
    Logic,
    /// Line counts do not add up: missing lines or extraneous output.
    Protocol,
    /// The model refused an update the checker had approved.
    Internal,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Format => "format",
            Self::Context => "context",
            Self::Logic => "logic",
            Self::Protocol => "protocol",
            Self::Internal => "internal",
        };
        f.write_str(label)
    }
}

/// A SUT response that the model does not allow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} error on '{command}': {message}")]
pub struct Violation {
    /// Category.
    pub kind: ViolationKind,
    /// The command whose response was rejected, as sent.
    pub command: String,
    /// What went wrong, including the offending line.
    pub message: String,
}

impl Violation {
    /// Build a violation.
    pub fn new(kind: ViolationKind, command: impl fmt::Display, message: impl Into<String>) -> Self {
        Self { kind, command: command.to_string(), message: message.into() }
    }

    /// Unparsable or structurally wrong line.
    pub fn format(command: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::new(ViolationKind::Format, command, message)
    }

    /// Wrong echo.
    pub fn context(command: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::new(ViolationKind::Context, command, message)
    }

    /// Response contradicts the model.
    pub fn logic(command: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::new(ViolationKind::Logic, command, message)
    }

    /// Line counts do not add up.
    pub fn protocol(command: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::new(ViolationKind::Protocol, command, message)
    }

    /// Model rejected an approved update.
    pub fn internal(command: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::new(ViolationKind::Internal, command, message)
    }
}

/// A batch that failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{violation}")]
pub struct BatchFailure {
    /// Index of the failing command; `None` when the failure is not tied
    /// to one command, such as trailing output.
    pub index: Option<usize>,
    /// What went wrong.
    pub violation: Violation,
}
