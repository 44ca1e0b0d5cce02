//! Protocol error types.

use thiserror::Error;

/// Convenience alias for protocol results.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while parsing protocol text.
///
/// Every variant carries the offending text so that a failure verdict can
/// quote it back verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A response or command line does not have the expected structure.
    #[error("malformed {kind} line: '{line}'")]
    MalformedLine {
        /// Which line shape was expected (e.g. "action", "trace header").
        kind: &'static str,
        /// The raw line.
        line: String,
    },

    /// A token that should be an identifier has the wrong shape.
    #[error("invalid {kind} '{value}'")]
    InvalidIdentifier {
        /// Identifier kind ("ISBN", "book copy id", ...).
        kind: &'static str,
        /// The raw token.
        value: String,
    },

    /// A `[YYYY-MM-DD]` token could not be parsed.
    #[error("invalid date token '{0}'")]
    InvalidDate(String),

    /// A location short code outside the known alphabet.
    #[error("unknown location code '{0}'")]
    UnknownLocation(String),

    /// A count line (tidy move count, trace length) is not a non-negative
    /// integer.
    #[error("invalid count '{0}'")]
    InvalidCount(String),

    /// The book inventory block is malformed.
    #[error("malformed inventory: {0}")]
    MalformedInventory(String),
}

impl ProtocolError {
    pub(crate) fn malformed(kind: &'static str, line: &str) -> Self {
        Self::MalformedLine { kind, line: line.to_string() }
    }
}
