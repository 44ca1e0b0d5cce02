//! Final verdict printed for the outer harness.

use std::{io::Write, process::ExitCode};

use serde::{Deserialize, Serialize};

/// Outcome of one run, as a single JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Verdict {
    /// Every response was legal.
    Success,
    /// The run stopped on the first problem.
    Failure {
        /// What went wrong, for humans.
        reason: String,
    },
}

impl Verdict {
    /// Verdict for a finished run.
    pub fn from_result<T, E: std::fmt::Display>(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(err) => Self::Failure { reason: err.to_string() },
        }
    }

    /// Process exit code: 0 on success, 1 on failure.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Success => ExitCode::SUCCESS,
            Self::Failure { .. } => ExitCode::FAILURE,
        }
    }

    /// Write the verdict as one JSON line.
    pub fn write_to<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        serde_json::to_writer(&mut out, self)?;
        writeln!(out)?;
        out.flush()
    }
}
