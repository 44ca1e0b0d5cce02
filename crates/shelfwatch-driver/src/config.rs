//! Run configuration.

use std::{path::Path, time::Duration};

use chrono::NaiveDate;
use shelfwatch_harness::GeneratorConfig;

use crate::error::Result;

/// Parameters of one driver run.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// RNG seed for the command generator.
    pub seed: u64,
    /// Open/close cycles before the run ends.
    pub max_cycles: usize,
    /// Total commands sent before the run ends.
    pub max_commands: usize,
    /// Deadline for each expected output line.
    pub line_timeout: Duration,
    /// How long to listen for stray output after the last batch.
    pub trailing_grace: Duration,
    /// Date of the first OPEN.
    pub start_date: NaiveDate,
    /// Command generator profile.
    pub generator: GeneratorConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            max_cycles: 5,
            max_commands: 200,
            line_timeout: Duration::from_secs(2),
            trailing_grace: Duration::from_millis(200),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
            generator: GeneratorConfig::default(),
        }
    }
}

/// Load a generator profile from a JSON file.
///
/// Missing fields take their defaults. The profile is validated before it
/// is returned.
pub async fn load_profile(path: &Path) -> Result<GeneratorConfig> {
    let text = tokio::fs::read_to_string(path).await?;
    let profile: GeneratorConfig = serde_json::from_str(&text)?;
    profile.validate()?;
    Ok(profile)
}
