//! Property tests for the oracle as a whole.
//!
//! The generator drives a simulated library, and the checker judges every
//! batch it answers. A correct library must pass every run, the model must
//! keep its invariants after every commit, and each injected fault must be
//! caught.
//!
//! ```text
//! CommandGenerator ──commands──▶ SimLibrary
//!        ▲                           │ lines
//!        │ committed model           ▼
//!        └──────────────────── check_batch ──▶ InvariantRegistry
//! ```

use chrono::NaiveDate;
use proptest::prelude::*;
use shelfwatch_core::LibrarySystem;
use shelfwatch_harness::{
    BatchFailure, CommandGenerator, GeneratorConfig, InvariantRegistry, SimFault, SimLibrary,
    ViolationKind, check_batch,
};
use shelfwatch_proto::{Command, Inventory, TraceEntry, TraceHeader};

/// State left behind by a run.
struct Run {
    model: LibrarySystem,
    sim: SimLibrary,
    commands: usize,
}

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

fn stock(inventory: &Inventory, fault: SimFault) -> (LibrarySystem, SimLibrary) {
    let mut sim = SimLibrary::new(fault);
    for line in inventory.to_lines() {
        assert!(sim.feed_line(&line).unwrap().is_empty());
    }
    assert!(sim.is_serving());
    (LibrarySystem::from_inventory(inventory).unwrap(), sim)
}

fn answer(sim: &mut SimLibrary, commands: &[Command]) -> Vec<String> {
    commands.iter().flat_map(|command| sim.feed_line(&command.to_string()).unwrap()).collect()
}

/// Run `cycles` open/close cycles the way the driver does, minus the
/// process.
fn drive(seed: u64, fault: SimFault, cycles: usize) -> Result<Run, BatchFailure> {
    let config = GeneratorConfig::default();
    let mut generator = CommandGenerator::new(seed, config.clone());
    let inventory = generator.inventory().unwrap();
    let (mut model, mut sim) = stock(&inventory, fault);
    let registry = InvariantRegistry::standard();

    let mut date = start();
    let mut closed = true;
    let mut commands = 0;
    for _ in 0..cycles {
        let mut close_probability = config.initial_close_probability;
        loop {
            let requests = generator.requests_per_batch();
            let batch = generator.day_batch(&mut model, date, closed, requests, close_probability);
            let lines = answer(&mut sim, &batch.commands);
            commands += batch.commands.len();

            model = check_batch(&model, &batch.commands, &lines)?;
            if let Err(violations) = registry.check_all(&model) {
                panic!("invariants broken after seed {seed}: {violations:?}");
            }

            date = batch.next_date;
            closed = batch.closed_after;
            if closed {
                break;
            }
            close_probability = config.next_close_probability(close_probability);
        }
    }
    Ok(Run { model, sim, commands })
}

fn same_state(a: &LibrarySystem, b: &LibrarySystem) -> bool {
    a.copies().eq(b.copies()) && a.students().eq(b.students()) && a.hot_isbns() == b.hot_isbns()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// A correct library passes every batch and ends in the checker's state.
    #[test]
    fn correct_library_always_passes(seed in any::<u64>()) {
        let run = drive(seed, SimFault::None, 6);
        let run = match run {
            Ok(run) => run,
            Err(failure) => return Err(TestCaseError::fail(format!("seed {seed}: {failure}"))),
        };

        prop_assert!(run.commands > 0);
        prop_assert!(run.model.copies().eq(run.sim.model().copies()));
        prop_assert_eq!(run.model.hot_isbns(), run.sim.model().hot_isbns());
        for student in run.model.students() {
            prop_assert_eq!(student.credit(), run.sim.model().credit_of(student.id()));
        }
    }

    /// OPEN then CLOSE with nothing in between leaves a quiescent library
    /// as it was.
    #[test]
    fn quiet_day_changes_nothing_but_the_date(seed in any::<u64>(), gap in 0i64..5) {
        let mut generator = CommandGenerator::new(seed, GeneratorConfig::default());
        let inventory = generator.inventory().unwrap();
        let (model, mut sim) = stock(&inventory, SimFault::None);

        let first = start();
        let quiet = |date: NaiveDate| vec![Command::Open { date }, Command::Close { date }];

        let commands = quiet(first);
        let settled = check_batch(&model, &commands, &answer(&mut sim, &commands)).unwrap();
        prop_assert!(same_state(&model, &settled));

        let later = first + chrono::TimeDelta::days(1 + gap);
        let commands = quiet(later);
        let after = check_batch(&settled, &commands, &answer(&mut sim, &commands)).unwrap();
        prop_assert!(same_state(&settled, &after));
        prop_assert_eq!(after.date(), Some(later));
    }
}

#[test]
fn injected_faults_are_caught() {
    let cases = [
        (SimFault::RejectReturns, &[ViolationKind::Logic][..]),
        (SimFault::FlipOverdue, &[ViolationKind::Logic]),
        (SimFault::InflateCredit, &[ViolationKind::Logic]),
        (SimFault::SkipOpeningTidy, &[ViolationKind::Logic]),
        (
            SimFault::ExtraOutput,
            &[
                ViolationKind::Format,
                ViolationKind::Context,
                ViolationKind::Logic,
                ViolationKind::Protocol,
            ],
        ),
        (SimFault::StallAfter(3), &[ViolationKind::Protocol]),
    ];

    for (fault, kinds) in cases {
        let caught = (0..32u64).find_map(|seed| drive(seed, fault, 10).err());
        let Some(failure) = caught else {
            panic!("{fault} was never caught");
        };
        assert!(
            kinds.contains(&failure.violation.kind),
            "{fault} caught as {}: {failure}",
            failure.violation.kind
        );
    }
}

#[test]
fn same_seed_same_run() {
    let a = drive(42, SimFault::None, 4).unwrap();
    let b = drive(42, SimFault::None, 4).unwrap();
    assert_eq!(a.commands, b.commands);
    assert_eq!(a.model, b.model);
}

#[test]
fn trace_query_replays_every_move() {
    let inventory = Inventory::new(vec![("C-0001".parse().unwrap(), 1)]).unwrap();
    let (model, mut sim) = stock(&inventory, SimFault::None);
    let script: Vec<Command> = [
        "[2025-01-01] OPEN",
        "[2025-01-01] s1 borrowed C-0001",
        "[2025-01-01] s1 returned C-0001-01",
        "[2025-01-01] CLOSE",
        "[2025-01-02] OPEN",
        "[2025-01-02] s2 read C-0001",
        "[2025-01-02] s2 restored C-0001-01",
        "[2025-01-02] s3 queried C-0001-01",
    ]
    .iter()
    .map(|line| line.parse().unwrap())
    .collect();

    let lines = answer(&mut sim, &script);
    let after = check_batch(&model, &script, &lines).unwrap();

    let header_at = lines.len() - 6;
    let header: TraceHeader = lines[header_at].parse().unwrap();
    assert_eq!(header.count, 5);
    let entries: Vec<TraceEntry> =
        lines[header_at + 1..].iter().map(|line| line.parse().unwrap()).collect();
    let route: Vec<String> =
        entries.iter().map(|entry| format!("{}>{}", entry.from, entry.to)).collect();
    assert_eq!(route, ["bs>user", "user>bro", "bro>hbs", "hbs>rr", "rr>bro"]);
    assert!(entries.iter().enumerate().all(|(i, entry)| entry.seq == i + 1));

    let copy = "C-0001-01".parse().unwrap();
    assert_eq!(after.trace_of(copy).map(<[_]>::len), Some(5));
}
