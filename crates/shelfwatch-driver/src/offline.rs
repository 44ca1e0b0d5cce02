//! Checking a recorded exchange after the fact.

use shelfwatch_core::LibrarySystem;
use shelfwatch_harness::{BatchFailure, InvariantRegistry, Violation, check_batch};
use shelfwatch_proto::{Command, Inventory};
use tracing::info;

use crate::error::Result;

/// Validate a recorded SUT stdout against the stdin that produced it.
///
/// `input` starts with the inventory block; every following non-blank
/// line is a command. The whole exchange is judged as one batch. Returns
/// the model after the last command.
pub fn check_transcript<S: AsRef<str>>(input: &[S], output: &[S]) -> Result<LibrarySystem> {
    let (inventory, consumed) = Inventory::parse_block(input)?;
    let model = LibrarySystem::from_inventory(&inventory)?;

    let commands = input[consumed..]
        .iter()
        .map(AsRef::as_ref)
        .filter(|line| !line.trim().is_empty())
        .map(str::parse)
        .collect::<std::result::Result<Vec<Command>, _>>()?;
    let lines: Vec<&str> =
        output.iter().map(AsRef::as_ref).filter(|line| !line.trim().is_empty()).collect();

    let model = check_batch(&model, &commands, &lines)?;
    if let Err(broken) = InvariantRegistry::standard().check_all(&model) {
        let details: Vec<String> = broken.iter().map(ToString::to_string).collect();
        let violation = Violation::internal("end of transcript", details.join("; "));
        return Err(BatchFailure { index: None, violation }.into());
    }

    info!(commands = commands.len(), lines = lines.len(), "transcript passed");
    Ok(model)
}
