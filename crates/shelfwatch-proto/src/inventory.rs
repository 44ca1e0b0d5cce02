//! One-time book inventory sent before the first day.
//!
//! ```text
//! 2
//! B-0001 3
//! A-0420 1
//! ```

use std::collections::HashSet;

use crate::{
    errors::{ProtocolError, Result},
    ids::Isbn,
};

/// Titles and their copy counts, in the order they are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    entries: Vec<(Isbn, u32)>,
}

impl Inventory {
    /// Build an inventory. Fails on duplicate ISBNs or zero copy counts.
    pub fn new(entries: Vec<(Isbn, u32)>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(entries.len());
        for (isbn, count) in &entries {
            if !seen.insert(*isbn) {
                return Err(ProtocolError::MalformedInventory(format!("duplicate ISBN {isbn}")));
            }
            if *count == 0 {
                return Err(ProtocolError::MalformedInventory(format!("{isbn} has no copies")));
            }
        }
        Ok(Self { entries })
    }

    /// `(isbn, copy count)` pairs.
    pub fn entries(&self) -> &[(Isbn, u32)] {
        &self.entries
    }

    /// Total number of physical copies.
    pub fn total_copies(&self) -> u64 {
        self.entries.iter().map(|(_, count)| u64::from(*count)).sum()
    }

    /// Lines to write to the SUT: the title count, then one line per title.
    pub fn to_lines(&self) -> Vec<String> {
        std::iter::once(self.entries.len().to_string())
            .chain(self.entries.iter().map(|(isbn, count)| format!("{isbn} {count}")))
            .collect()
    }

    /// Parse an inventory block from the head of `lines`.
    ///
    /// Returns the inventory and the number of lines consumed.
    pub fn parse_block<S: AsRef<str>>(lines: &[S]) -> Result<(Self, usize)> {
        let header = lines
            .first()
            .ok_or_else(|| ProtocolError::MalformedInventory("missing title count".into()))?
            .as_ref()
            .trim();
        let titles: usize = header.parse().map_err(|_| {
            ProtocolError::MalformedInventory(format!("title count '{header}' is not a number"))
        })?;
        if titles >= lines.len() {
            return Err(ProtocolError::MalformedInventory(format!(
                "declared {titles} titles but only {} lines follow",
                lines.len() - 1
            )));
        }

        let mut entries = Vec::with_capacity(titles);
        for raw in &lines[1..=titles] {
            let raw = raw.as_ref();
            let [isbn, count] = raw.split_whitespace().collect::<Vec<_>>()[..] else {
                return Err(ProtocolError::MalformedInventory(format!("bad title line '{raw}'")));
            };
            let count = count.parse().map_err(|_| {
                ProtocolError::MalformedInventory(format!("bad copy count in '{raw}'"))
            })?;
            entries.push((isbn.parse()?, count));
        }

        Ok((Self::new(entries)?, titles + 1))
    }
}
