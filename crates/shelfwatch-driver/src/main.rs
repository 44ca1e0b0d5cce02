//! Shelfwatch binary.
//!
//! Prints one JSON verdict on stdout; logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Test a Java implementation, keeping both sides of the exchange
//! shelfwatch run --jar library.jar --seed 7 -i stdin.txt -o stdout.txt
//!
//! # Test any other program
//! shelfwatch run --max-cycles 10 -- ./library --quiet
//!
//! # Re-check a recorded exchange
//! shelfwatch check stdin.txt stdout.txt
//!
//! # Run the oracle against the built-in library with a planted bug
//! shelfwatch self-test --fault flip-overdue
//! ```

use std::{
    io,
    path::{Path, PathBuf},
    process::ExitCode,
    time::Duration,
};

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use shelfwatch_core::LibrarySystem;
use shelfwatch_driver::{
    Driver, DriverConfig, DriverError, ProcessSut, Result, RunSummary, SimSut, Sut, SutError,
    Transcript, Verdict, check_transcript, load_profile,
};
use shelfwatch_harness::{GeneratorConfig, SimFault};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Model-based oracle for library lending systems
#[derive(Parser, Debug)]
#[command(name = "shelfwatch")]
#[command(about = "Model-based oracle for library lending systems")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Drive a SUT process through a generated simulation
    Run(RunArgs),

    /// Validate a recorded stdin/stdout pair
    Check {
        /// Everything that was sent to the SUT
        input: PathBuf,
        /// Everything the SUT printed
        output: PathBuf,
    },

    /// Drive the built-in simulated library
    SelfTest {
        /// Bug to plant in the simulated library (e.g. reject-returns, stall:20)
        #[arg(long, default_value = "none")]
        fault: SimFault,

        #[command(flatten)]
        session: SessionArgs,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Java SUT, started as `java -jar JAR`
    #[arg(long, conflicts_with = "program", required_unless_present = "program")]
    jar: Option<PathBuf>,

    #[command(flatten)]
    session: SessionArgs,

    /// SUT program followed by its arguments
    #[arg(last = true)]
    program: Vec<String>,
}

#[derive(Args, Debug)]
struct SessionArgs {
    /// Generator seed (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Open/close cycles to run
    #[arg(long, default_value_t = 5)]
    max_cycles: usize,

    /// Total commands to send
    #[arg(long, default_value_t = 200)]
    max_commands: usize,

    /// Seconds to wait for each output line
    #[arg(long, default_value = "2.0", value_parser = parse_seconds)]
    line_timeout: Duration,

    /// Date of the first OPEN
    #[arg(long, default_value = "2025-01-01")]
    start_date: NaiveDate,

    /// Generator profile (JSON)
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Write everything sent to the SUT here
    #[arg(short = 'i', long)]
    stdin_log: Option<PathBuf>,

    /// Write everything the SUT printed here
    #[arg(short = 'o', long)]
    stdout_log: Option<PathBuf>,
}

fn parse_seconds(raw: &str) -> std::result::Result<Duration, String> {
    let seconds: f64 = raw.parse().map_err(|_| format!("'{raw}' is not a number of seconds"))?;
    Duration::try_from_secs_f64(seconds).map_err(|err| format!("'{raw}': {err}"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let verdict = match cli.mode {
        Mode::Run(args) => Verdict::from_result(&run(args).await),
        Mode::Check { input, output } => Verdict::from_result(&check(&input, &output).await),
        Mode::SelfTest { fault, session } => {
            info!(%fault, "self-test against the simulated library");
            Verdict::from_result(&self_test(fault, &session).await)
        },
    };

    if let Err(err) = verdict.write_to(io::stdout().lock()) {
        error!(%err, "failed to write verdict");
        return ExitCode::from(2);
    }
    verdict.exit_code()
}

async fn run(args: RunArgs) -> Result<RunSummary> {
    let (config, transcript) = prepare(&args.session).await?;
    let sut = if let Some(jar) = &args.jar {
        ProcessSut::java_jar(jar)
    } else if let Some((program, rest)) = args.program.split_first() {
        ProcessSut::spawn(program, rest)
    } else {
        Err(SutError::Spawn {
            program: String::new(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "no SUT program given"),
        })
    };
    let sut = sut.map_err(|source| DriverError::Sut {
        command: "start".to_string(),
        source,
        stderr: Vec::new(),
    })?;
    drive(sut, config, transcript).await
}

async fn self_test(fault: SimFault, session: &SessionArgs) -> Result<RunSummary> {
    let (config, transcript) = prepare(session).await?;
    drive(SimSut::new(fault), config, transcript).await
}

async fn check(input: &Path, output: &Path) -> Result<LibrarySystem> {
    let input = tokio::fs::read_to_string(input).await?;
    let output = tokio::fs::read_to_string(output).await?;
    let input: Vec<&str> = input.lines().collect();
    let output: Vec<&str> = output.lines().collect();
    check_transcript(&input, &output)
}

async fn prepare(session: &SessionArgs) -> Result<(DriverConfig, Transcript)> {
    let generator = match &session.profile {
        Some(path) => load_profile(path).await?,
        None => GeneratorConfig::default(),
    };
    let seed = session.seed.unwrap_or_else(rand::random);
    info!(seed, "generator seeded");

    let config = DriverConfig {
        seed,
        max_cycles: session.max_cycles,
        max_commands: session.max_commands,
        line_timeout: session.line_timeout,
        start_date: session.start_date,
        generator,
        ..DriverConfig::default()
    };
    let transcript =
        Transcript::create(session.stdin_log.as_deref(), session.stdout_log.as_deref()).await?;
    Ok((config, transcript))
}

async fn drive<S: Sut>(sut: S, config: DriverConfig, transcript: Transcript) -> Result<RunSummary> {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, stopping at the next command");
            let _ = cancel_tx.send(true);
        }
    });

    let mut driver =
        Driver::new(sut, config).with_transcript(transcript).with_cancellation(cancel_rx);
    let outcome = driver.run().await;
    interrupt.abort();
    outcome
}
