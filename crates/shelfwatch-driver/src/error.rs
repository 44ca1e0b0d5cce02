//! Driver error types.

use std::{io, time::Duration};

use shelfwatch_core::ModelError;
use shelfwatch_harness::{BatchFailure, ConfigError, SimError};
use shelfwatch_proto::ProtocolError;
use thiserror::Error;

/// Failures talking to the system under test.
#[derive(Error, Debug)]
pub enum SutError {
    /// The program could not be started.
    #[error("failed to start '{program}': {source}")]
    Spawn {
        /// Program that was launched.
        program: String,
        /// Underlying OS error.
        source: io::Error,
    },

    /// A standard stream was not captured.
    #[error("SUT {0} was not piped")]
    MissingPipe(&'static str),

    /// Reading, writing or waiting failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No output line arrived in time.
    #[error("no output within {after:?}")]
    Timeout {
        /// Per-line deadline that elapsed.
        after: Duration,
    },

    /// The process ended while output was still expected.
    #[error("SUT exited ({})", exit_label(.code))]
    Exited {
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
    },

    /// Input was already closed.
    #[error("SUT input closed")]
    Closed,

    /// The simulated library failed.
    #[error("simulated library: {0}")]
    Sim(#[from] SimError),
}

#[allow(clippy::ref_option)]
fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "killed by signal".to_string(), |code| format!("code {code}"))
}

/// Everything that can end a run with a failure verdict.
#[derive(Error, Debug)]
pub enum DriverError {
    /// The SUT printed something the model does not allow.
    #[error(transparent)]
    Violation(#[from] BatchFailure),

    /// The SUT process misbehaved while a command was in flight.
    #[error("SUT failure on '{command}': {source}{}", stderr_tail(.stderr))]
    Sut {
        /// Command (or `inventory`) in flight.
        command: String,
        /// What went wrong.
        source: SutError,
        /// Recent SUT stderr lines, if any.
        stderr: Vec<String>,
    },

    /// Input transcript or inventory could not be read.
    #[error("unreadable input: {0}")]
    Protocol(#[from] ProtocolError),

    /// The model refused the inventory.
    #[error("model: {0}")]
    Model(#[from] ModelError),

    /// Generator profile is inconsistent.
    #[error("generator profile: {0}")]
    Config(#[from] ConfigError),

    /// Generator profile is not valid JSON.
    #[error("generator profile: {0}")]
    Profile(#[from] serde_json::Error),

    /// Local file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Interrupted before the run finished.
    #[error("run cancelled")]
    Cancelled,
}

fn stderr_tail(lines: &[String]) -> String {
    if lines.is_empty() {
        String::new()
    } else {
        format!("; stderr: {}", lines.join(" | "))
    }
}

/// Result alias for driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;
