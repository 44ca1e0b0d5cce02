//! Whole runs of the driver against the simulated library and real
//! processes.

use std::time::Duration;

use shelfwatch_driver::{
    Driver, DriverConfig, DriverError, ProcessSut, SimSut, SutError, Transcript, Verdict,
    check_transcript,
};
use shelfwatch_harness::{SimFault, ViolationKind};
use tokio::sync::watch;

fn config(seed: u64) -> DriverConfig {
    DriverConfig { seed, trailing_grace: Duration::ZERO, ..DriverConfig::default() }
}

#[tokio::test]
async fn correct_library_passes_within_budget() {
    for seed in 0..8 {
        let mut driver = Driver::new(SimSut::new(SimFault::None), config(seed));
        let summary = driver.run().await.unwrap_or_else(|err| panic!("seed {seed}: {err}"));

        assert!(summary.cycles >= 1 && summary.cycles <= 5);
        assert!(summary.commands > 0 && summary.commands <= 200);
        assert!(summary.batches >= summary.cycles);

        let sim = driver.sut().library().model();
        assert!(driver.model().copies().eq(sim.copies()));
        assert_eq!(driver.model().hot_isbns(), sim.hot_isbns());
    }
}

#[tokio::test]
async fn command_budget_cuts_the_last_batch() {
    let config = DriverConfig { max_cycles: 1000, max_commands: 30, ..config(3) };
    let summary = Driver::new(SimSut::new(SimFault::None), config).run().await.unwrap();
    assert_eq!(summary.commands, 30);
}

#[tokio::test]
async fn planted_bugs_fail_the_run() {
    let cases = [
        (SimFault::RejectReturns, ViolationKind::Logic),
        (SimFault::FlipOverdue, ViolationKind::Logic),
        (SimFault::InflateCredit, ViolationKind::Logic),
        (SimFault::SkipOpeningTidy, ViolationKind::Logic),
    ];

    for (fault, kind) in cases {
        let mut caught = None;
        for seed in 0..32 {
            let config = DriverConfig { max_cycles: 10, max_commands: 400, ..config(seed) };
            if let Err(err) = Driver::new(SimSut::new(fault), config).run().await {
                caught = Some(err);
                break;
            }
        }
        let failure = match caught {
            Some(DriverError::Violation(failure)) => failure,
            other => panic!("{fault} was not reported as a violation: {other:?}"),
        };
        assert_eq!(failure.violation.kind, kind, "{fault}: {failure}");
    }
}

#[tokio::test]
async fn silent_library_times_out_on_the_command_in_flight() {
    let err = Driver::new(SimSut::new(SimFault::StallAfter(3)), config(1)).run().await.unwrap_err();
    let DriverError::Sut { command, source, .. } = &err else {
        panic!("expected a SUT failure, got {err}");
    };
    assert!(command.starts_with('['), "in-flight command was '{command}'");
    assert!(matches!(source, SutError::Timeout { .. }));

    let verdict = Verdict::from_result(&Err::<(), _>(err));
    assert!(matches!(verdict, Verdict::Failure { reason } if reason.contains("no output within")));
}

#[tokio::test]
async fn cancelled_run_stops_before_the_first_command() {
    let (_tx, rx) = watch::channel(true);
    let err = Driver::new(SimSut::new(SimFault::None), config(5))
        .with_cancellation(rx)
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::Cancelled));
}

#[tokio::test]
async fn transcript_replays_offline() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("stdin.txt");
    let output = dir.path().join("stdout.txt");

    let transcript = Transcript::create(Some(&input), Some(&output)).await.unwrap();
    let mut driver = Driver::new(SimSut::new(SimFault::None), config(11)).with_transcript(transcript);
    let summary = driver.run().await.unwrap();

    let input = std::fs::read_to_string(&input).unwrap();
    let output = std::fs::read_to_string(&output).unwrap();
    let input: Vec<&str> = input.lines().collect();
    let output: Vec<&str> = output.lines().collect();

    let titles: usize = input[0].parse().unwrap();
    assert_eq!(input.len(), 1 + titles + summary.commands);

    let replayed = check_transcript(&input, &output).unwrap();
    assert!(replayed.copies().eq(driver.model().copies()));
}

#[tokio::test]
async fn tampered_transcript_fails_offline() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("stdin.txt");
    let output = dir.path().join("stdout.txt");

    let transcript = Transcript::create(Some(&input), Some(&output)).await.unwrap();
    Driver::new(SimSut::new(SimFault::None), config(12))
        .with_transcript(transcript)
        .run()
        .await
        .unwrap();

    let input = std::fs::read_to_string(&input).unwrap();
    let output = std::fs::read_to_string(&output).unwrap();
    let input: Vec<&str> = input.lines().collect();
    let mut output: Vec<&str> = output.lines().collect();
    output.push("[2099-01-01] stray");

    let err = check_transcript(&input, &output).unwrap_err();
    let DriverError::Violation(failure) = &err else {
        panic!("expected a violation, got {err}");
    };
    assert_eq!(failure.index, None);
    assert_eq!(failure.violation.kind, ViolationKind::Protocol);
}

#[cfg(unix)]
#[tokio::test]
async fn mute_process_times_out_on_the_first_open() {
    let sut = ProcessSut::spawn("sh", &["-c".to_string(), "cat > /dev/null".to_string()])
        .unwrap()
        .with_shutdown_grace(Duration::from_millis(100));
    let config = DriverConfig { line_timeout: Duration::from_millis(100), ..config(2) };

    let err = Driver::new(sut, config).run().await.unwrap_err();
    let DriverError::Sut { command, source, .. } = &err else {
        panic!("expected a SUT failure, got {err}");
    };
    assert_eq!(command, "[2025-01-01] OPEN");
    assert!(matches!(source, SutError::Timeout { .. }));
}

#[cfg(unix)]
#[tokio::test]
async fn crashing_process_fails_the_run() {
    let script = "read n; echo 'Exception in thread main' >&2; exit 1";
    let sut = ProcessSut::spawn("sh", &["-c".to_string(), script.to_string()]).unwrap();

    let err = Driver::new(sut, config(4)).run().await.unwrap_err();
    assert!(matches!(err, DriverError::Sut { .. }), "got {err}");
}
