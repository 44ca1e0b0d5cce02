//! Transactional validation of one batch of commands.
//!
//! A batch is checked against a private clone of the model. The clone is
//! handed back only if every response in the batch is legal and nothing is
//! left over; the caller then replaces its model with it. A failed batch
//! leaves the caller's model exactly as it was.

use shelfwatch_core::LibrarySystem;
use shelfwatch_proto::{Command, ResponseShape, TraceHeader, parse_move_count};
use tracing::{debug, warn};

use crate::{
    checker::RuleChecker,
    violation::{BatchFailure, Violation},
};

/// Validate `lines` as the SUT's output for `commands`.
///
/// Returns the updated model on success.
pub fn check_batch<S: AsRef<str>>(
    model: &LibrarySystem,
    commands: &[Command],
    lines: &[S],
) -> Result<LibrarySystem, BatchFailure> {
    let mut scratch = model.clone();
    let mut checker = RuleChecker::new(&mut scratch);
    let mut cursor = 0;

    for (index, command) in commands.iter().enumerate() {
        let fail = move |violation: Violation| {
            warn!(index, %violation, "batch rejected");
            BatchFailure { index: Some(index), violation }
        };
        let remaining = lines.get(cursor..).unwrap_or_default();
        let len = response_len(command, remaining).map_err(fail)?;
        checker.check(command, &remaining[..len]).map_err(fail)?;
        cursor += len;
    }

    if let Some(extra) = lines.get(cursor) {
        let violation = Violation::protocol(
            "end of batch",
            format!("{} extraneous lines, first '{}'", lines.len() - cursor, extra.as_ref()),
        );
        warn!(%violation, "batch rejected");
        return Err(BatchFailure { index: None, violation });
    }

    debug!(commands = commands.len(), lines = lines.len(), "batch validated");
    Ok(scratch)
}

/// Number of lines at the head of `remaining` that answer `command`.
///
/// Reads the embedded count of trace headers and tidy count lines. Fails
/// when the header is unreadable or the declared lines are not all there.
pub fn response_len<S: AsRef<str>>(command: &Command, remaining: &[S]) -> Result<usize, Violation> {
    let Some(first) = remaining.first().map(AsRef::as_ref) else {
        return Err(Violation::protocol(command, "SUT output ended before this command's response"));
    };
    let following = match command.response_shape() {
        ResponseShape::Single => 0,
        ResponseShape::TraceQuery => {
            let header: TraceHeader = first.parse().map_err(|err| {
                Violation::format(command, format!("malformed trace header '{first}': {err}"))
            })?;
            header.count
        },
        ResponseShape::Tidy => parse_move_count(first).map_err(|err| {
            Violation::format(command, format!("bad move count '{first}': {err}"))
        })?,
    };
    let len = following
        .checked_add(1)
        .ok_or_else(|| Violation::protocol(command, "declared line count overflows"))?;
    if len > remaining.len() {
        return Err(Violation::protocol(
            command,
            format!("response declares {} lines, only {} available", len, remaining.len()),
        ));
    }
    Ok(len)
}
