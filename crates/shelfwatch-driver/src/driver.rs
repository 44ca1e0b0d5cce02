//! The run loop.
//!
//! One run owns one SUT. After the inventory block, the driver repeats
//! open/close cycles: each day batch is generated from the committed
//! model, sent a command at a time, and its answers are collected line by
//! line. Only when the whole batch is in does the checker judge it.
//!
//! ```text
//! ┌────────────┐  day batch  ┌────────┐  lines  ┌─────────────┐
//! │ Generator  │────────────▶│  SUT   │────────▶│ check_batch │
//! └────────────┘             └────────┘         └─────────────┘
//!       ▲                                              │
//!       └──────────── committed model ◀────────────────┘
//! ```
//!
//! The run ends on the cycle or command budget, the first illegal answer,
//! a silent or dead SUT, or cancellation.

use chrono::NaiveDate;
use shelfwatch_core::LibrarySystem;
use shelfwatch_harness::{
    BatchFailure, CommandGenerator, InvariantRegistry, Violation, check_batch,
};
use shelfwatch_proto::{Command, ResponseShape, TraceHeader, parse_move_count};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    config::DriverConfig,
    error::{DriverError, Result, SutError},
    sut::Sut,
    transcript::Transcript,
};

/// What a finished run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Open/close cycles started.
    pub cycles: usize,
    /// Batches validated and committed.
    pub batches: usize,
    /// Commands sent, excluding the inventory block.
    pub commands: usize,
    /// Date the next batch would have used.
    pub final_date: NaiveDate,
}

/// Drives one SUT through a seeded simulation.
pub struct Driver<S: Sut> {
    sut: S,
    config: DriverConfig,
    generator: CommandGenerator,
    model: LibrarySystem,
    invariants: InvariantRegistry,
    transcript: Transcript,
    cancel: Option<watch::Receiver<bool>>,
}

impl<S: Sut> Driver<S> {
    /// Driver for `sut`, seeded from `config`.
    pub fn new(sut: S, config: DriverConfig) -> Self {
        let generator = CommandGenerator::new(config.seed, config.generator.clone());
        Self {
            sut,
            config,
            generator,
            model: LibrarySystem::new(),
            invariants: InvariantRegistry::standard(),
            transcript: Transcript::disabled(),
            cancel: None,
        }
    }

    /// Mirror the exchange into `transcript`.
    #[must_use]
    pub fn with_transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = transcript;
        self
    }

    /// Stop at the next command once `cancel` turns true.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// The committed model.
    pub fn model(&self) -> &LibrarySystem {
        &self.model
    }

    /// The SUT being driven.
    pub fn sut(&self) -> &S {
        &self.sut
    }

    /// Run to completion, then shut the SUT down.
    ///
    /// The SUT is stopped whatever the outcome. A run failure takes
    /// precedence over a shutdown failure.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let outcome = self.run_cycles().await;
        let stopped = self.sut.shutdown().await;
        self.transcript.flush().await?;

        match &outcome {
            Ok(summary) => info!(
                cycles = summary.cycles,
                batches = summary.batches,
                commands = summary.commands,
                "run passed"
            ),
            Err(err) => warn!(%err, "run failed"),
        }
        let summary = outcome?;
        stopped.map_err(|source| DriverError::Sut {
            command: "shutdown".to_string(),
            source,
            stderr: Vec::new(),
        })?;
        Ok(summary)
    }

    async fn run_cycles(&mut self) -> Result<RunSummary> {
        self.config.generator.validate()?;
        self.stock().await?;

        let mut summary = RunSummary {
            cycles: 0,
            batches: 0,
            commands: 0,
            final_date: self.config.start_date,
        };
        let mut closed = true;

        'cycles: while summary.cycles < self.config.max_cycles
            && summary.commands < self.config.max_commands
        {
            summary.cycles += 1;
            info!(cycle = summary.cycles, date = %summary.final_date, "cycle started");
            let mut close_probability = self.config.generator.initial_close_probability;

            loop {
                let requests = self.generator.requests_per_batch();
                let batch = self.generator.day_batch(
                    &mut self.model,
                    summary.final_date,
                    closed,
                    requests,
                    close_probability,
                );

                let budget = self.config.max_commands - summary.commands;
                let truncated = batch.commands.len() > budget;
                let commands = &batch.commands[..batch.commands.len().min(budget)];

                let lines = self.exchange(commands).await?;
                summary.commands += commands.len();
                self.commit(commands, &lines)?;
                summary.batches += 1;
                info!(
                    date = %summary.final_date,
                    commands = commands.len(),
                    lines = lines.len(),
                    total = summary.commands,
                    "batch committed"
                );

                if truncated {
                    info!(max = self.config.max_commands, "command budget spent");
                    break 'cycles;
                }
                summary.final_date = batch.next_date;
                closed = batch.closed_after;
                if closed {
                    break;
                }
                close_probability = self.config.generator.next_close_probability(close_probability);
            }
        }

        self.expect_silence().await?;
        Ok(summary)
    }

    /// Send the inventory block and load it into the model.
    async fn stock(&mut self) -> Result<()> {
        let inventory = self.generator.inventory()?;
        self.model = LibrarySystem::from_inventory(&inventory)?;
        for line in inventory.to_lines() {
            self.send("inventory", &line).await?;
        }
        info!(
            titles = inventory.entries().len(),
            copies = inventory.total_copies(),
            "inventory sent"
        );
        Ok(())
    }

    /// Send each command and collect exactly its response lines.
    async fn exchange(&mut self, commands: &[Command]) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        for command in commands {
            self.check_cancelled()?;
            let label = command.to_string();
            self.send(&label, &label).await?;

            let first = self.receive(&label).await?;
            let following = match command.response_shape() {
                ResponseShape::Single => 0,
                ResponseShape::TraceQuery => first.parse::<TraceHeader>().map_or(0, |h| h.count),
                ResponseShape::Tidy => parse_move_count(&first).unwrap_or(0),
            };
            lines.push(first);
            for _ in 0..following {
                lines.push(self.receive(&label).await?);
            }
            debug!(command = %label, lines = 1 + following, "response collected");
        }
        Ok(lines)
    }

    /// Judge a batch and, if legal, make its result the committed model.
    fn commit(&mut self, commands: &[Command], lines: &[String]) -> Result<()> {
        let next = check_batch(&self.model, commands, lines)?;
        if let Err(broken) = self.invariants.check_all(&next) {
            let details: Vec<String> = broken.iter().map(ToString::to_string).collect();
            let violation = Violation::internal("after batch", details.join("; "));
            return Err(BatchFailure { index: None, violation }.into());
        }
        self.model = next;
        Ok(())
    }

    /// Any output after the last batch is extraneous.
    async fn expect_silence(&mut self) -> Result<()> {
        match self.sut.next_line(self.config.trailing_grace).await {
            Ok(line) => {
                self.transcript.received(&line).await?;
                let violation =
                    Violation::protocol("end of run", format!("extraneous output '{line}'"));
                Err(BatchFailure { index: None, violation }.into())
            },
            Err(SutError::Timeout { .. } | SutError::Exited { .. }) => Ok(()),
            Err(source) => Err(self.sut_failure("end of run", source)),
        }
    }

    async fn send(&mut self, label: &str, line: &str) -> Result<()> {
        self.transcript.sent(line).await?;
        self.sut.send_line(line).await.map_err(|source| self.sut_failure(label, source))
    }

    async fn receive(&mut self, label: &str) -> Result<String> {
        let line = self
            .sut
            .next_line(self.config.line_timeout)
            .await
            .map_err(|source| self.sut_failure(label, source))?;
        self.transcript.received(&line).await?;
        Ok(line)
    }

    fn sut_failure(&mut self, command: &str, source: SutError) -> DriverError {
        DriverError::Sut { command: command.to_string(), source, stderr: self.sut.stderr_lines() }
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(cancel) if *cancel.borrow() => Err(DriverError::Cancelled),
            _ => Ok(()),
        }
    }
}
