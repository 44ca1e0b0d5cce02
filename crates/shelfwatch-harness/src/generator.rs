//! Seeded command generator.
//!
//! Proposes one batch of commands at a time against the current model. The
//! generator filters out only the cheapest nonsense (restoring when nobody is
//! reading, returning a copy nobody holds); commands whose legality depends
//! on credit or shelf contents are proposed on purpose so the SUT's rejects
//! get exercised too.
//!
//! All randomness comes from one [`ChaCha8Rng`], and the model iterates in
//! key order, so a seed and a config fully determine the run.

use std::collections::BTreeSet;

use chrono::{NaiveDate, TimeDelta};
use rand::{Rng, SeedableRng, seq::SliceRandom};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use shelfwatch_core::{LibrarySystem, Student, rules};
use shelfwatch_proto::{BookType, Command, Inventory, Isbn, ProtocolError, StudentId};
use thiserror::Error;
use tracing::{debug, trace};

/// Number of students in the pool new students are drawn from.
pub const STUDENT_POOL_SIZE: u32 = 74;

/// How many pool students the read generator considers besides known ones.
const READ_POOL_SAMPLE: usize = 10;

/// Draw attempts per free slot before a batch is cut short.
const ATTEMPTS_PER_SLOT: usize = 5;

/// Upper bound on opportunistic returns and picks in one batch.
const MAX_OPPORTUNISTIC: usize = 3;

/// Relative weights of the command families in the draw pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandWeights {
    /// Borrow a shelved title.
    pub borrow: u32,
    /// Order a title the student may order.
    pub order: u32,
    /// Pick up a reserved copy.
    pub pick: u32,
    /// Read a shelved title.
    pub read: u32,
    /// Restore today's read.
    pub restore: u32,
    /// Ask for a copy's trace.
    pub trace_query: u32,
    /// Ask for a known student's credit.
    pub credit_query: u32,
    /// Action a low-credit student is not allowed to take.
    pub failed_credit: u32,
    /// Order that conflicts with what the student holds or awaits.
    pub failed_order: u32,
}

impl Default for CommandWeights {
    fn default() -> Self {
        Self {
            borrow: 3,
            order: 2,
            pick: 2,
            read: 2,
            restore: 1,
            trace_query: 2,
            credit_query: 1,
            failed_credit: 1,
            failed_order: 1,
        }
    }
}

/// Preference for each book type when a generator picks a title.
///
/// Priorities are probabilities tried in A, B, C order; whatever is left
/// over falls back to a uniform pick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypePriority {
    /// Weight of B titles for borrows and reads.
    pub b: f64,
    /// Weight of C titles for borrows and reads.
    pub c: f64,
    /// Weight of A titles for reads. Borrows never prefer A.
    pub a_read: f64,
}

impl Default for TypePriority {
    fn default() -> Self {
        Self { b: 0.4, c: 0.4, a_read: 0.2 }
    }
}

/// Generator profile.
///
/// Every field has a default, so a JSON profile only needs the fields it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Draw-pool weights.
    pub weights: CommandWeights,
    /// Chance per batch of slipping in a return of a held copy.
    pub return_propensity: f64,
    /// Chance per batch of slipping in a pick of a ready reservation.
    pub pick_propensity: f64,
    /// Chance that a restore draw actually proposes a restore.
    pub restore_propensity: f64,
    /// Chance that a user action comes from a new student.
    pub new_student_ratio: f64,
    /// Title preferences.
    pub type_priority: TypePriority,
    /// Fewest user requests per batch.
    pub min_requests: usize,
    /// Most user requests per batch.
    pub max_requests: usize,
    /// Fewest extra days skipped after a close.
    pub min_skip_days: u32,
    /// Most extra days skipped after a close.
    pub max_skip_days: u32,
    /// Close probability at the start of each day.
    pub initial_close_probability: f64,
    /// Added to the close probability after each batch that did not close.
    pub close_probability_step: f64,
    /// Cap on the close probability.
    pub max_close_probability: f64,
    /// Titles in a generated inventory.
    pub inventory_titles: usize,
    /// Fewest copies per title.
    pub min_copies: u32,
    /// Most copies per title.
    pub max_copies: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            weights: CommandWeights::default(),
            return_propensity: 0.7,
            pick_propensity: 0.7,
            restore_propensity: 0.6,
            new_student_ratio: 0.2,
            type_priority: TypePriority::default(),
            min_requests: 1,
            max_requests: 5,
            min_skip_days: 0,
            max_skip_days: 1,
            initial_close_probability: 0.1,
            close_probability_step: 0.15,
            max_close_probability: 0.9,
            inventory_titles: 5,
            min_copies: 1,
            max_copies: 10,
        }
    }
}

/// A generator profile that cannot drive a run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A probability outside `[0, 1]`.
    #[error("{field} must be within [0, 1], got {value}")]
    Probability {
        /// Offending field.
        field: &'static str,
        /// Its value.
        value: f64,
    },

    /// A `min_*` above its `max_*`.
    #[error("{field}: minimum {min} exceeds maximum {max}")]
    Range {
        /// Offending range.
        field: &'static str,
        /// Lower bound.
        min: u64,
        /// Upper bound.
        max: u64,
    },

    /// Inventory would be empty or contain zero-copy titles.
    #[error("inventory needs at least one title with at least one copy")]
    EmptyInventory,
}

impl GeneratorConfig {
    /// Reject profiles the generator cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let probabilities = [
            ("return_propensity", self.return_propensity),
            ("pick_propensity", self.pick_propensity),
            ("restore_propensity", self.restore_propensity),
            ("new_student_ratio", self.new_student_ratio),
            ("type_priority.b", self.type_priority.b),
            ("type_priority.c", self.type_priority.c),
            ("type_priority.a_read", self.type_priority.a_read),
            ("initial_close_probability", self.initial_close_probability),
            ("close_probability_step", self.close_probability_step),
            ("max_close_probability", self.max_close_probability),
        ];
        for (field, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Probability { field, value });
            }
        }

        let ranges = [
            ("requests", self.min_requests as u64, self.max_requests as u64),
            ("skip_days", u64::from(self.min_skip_days), u64::from(self.max_skip_days)),
            ("copies", u64::from(self.min_copies), u64::from(self.max_copies)),
        ];
        for (field, min, max) in ranges {
            if min > max {
                return Err(ConfigError::Range { field, min, max });
            }
        }

        if self.inventory_titles == 0 || self.min_copies == 0 {
            return Err(ConfigError::EmptyInventory);
        }
        Ok(())
    }

    /// Close probability for the batch after one that did not close.
    pub fn next_close_probability(&self, current: f64) -> f64 {
        (current + self.close_probability_step).min(self.max_close_probability)
    }
}

/// One batch of commands for a single date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayBatch {
    /// Commands in sending order.
    pub commands: Vec<Command>,
    /// Date of the next batch.
    pub next_date: NaiveDate,
    /// Whether the library is closed after this batch.
    pub closed_after: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Borrow,
    Order,
    Pick,
    Read,
    Restore,
    TraceQuery,
    CreditQuery,
    FailedCredit,
    FailedOrder,
}

impl CommandWeights {
    fn pool(&self) -> Vec<Family> {
        let weighted = [
            (Family::Borrow, self.borrow),
            (Family::Order, self.order),
            (Family::Pick, self.pick),
            (Family::Read, self.read),
            (Family::Restore, self.restore),
            (Family::TraceQuery, self.trace_query),
            (Family::CreditQuery, self.credit_query),
            (Family::FailedCredit, self.failed_credit),
            (Family::FailedOrder, self.failed_order),
        ];
        weighted
            .into_iter()
            .flat_map(|(family, weight)| std::iter::repeat_n(family, weight as usize))
            .collect()
    }
}

/// Seeded command generator.
pub struct CommandGenerator {
    rng: ChaCha8Rng,
    config: GeneratorConfig,
    pool: Vec<Family>,
    student_pool: Vec<StudentId>,
}

impl CommandGenerator {
    /// Create a generator. The config is assumed to be validated.
    pub fn new(seed: u64, config: GeneratorConfig) -> Self {
        let pool = config.weights.pool();
        Self { rng: ChaCha8Rng::seed_from_u64(seed), config, pool, student_pool: student_pool() }
    }

    /// The active profile.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Draw a random inventory: distinct titles of random type, each with a
    /// random number of copies.
    pub fn inventory(&mut self) -> Result<Inventory, ProtocolError> {
        let types = [BookType::A, BookType::B, BookType::C];
        let mut seen = BTreeSet::new();
        let mut entries = Vec::with_capacity(self.config.inventory_titles);

        for _ in 0..self.config.inventory_titles * 10 {
            if entries.len() >= self.config.inventory_titles {
                break;
            }
            let Some(&book_type) = types.choose(&mut self.rng) else { break };
            let Some(isbn) = Isbn::new(book_type, self.rng.gen_range(0..=9999)) else { continue };
            if seen.insert(isbn) {
                let copies = self.rng.gen_range(self.config.min_copies..=self.config.max_copies);
                entries.push((isbn, copies));
            }
        }
        debug!(titles = entries.len(), "inventory drawn");
        Inventory::new(entries)
    }

    /// Number of user requests for the next batch.
    pub fn requests_per_batch(&mut self) -> usize {
        self.rng.gen_range(self.config.min_requests..=self.config.max_requests)
    }

    /// Produce the next batch for `date`.
    ///
    /// Opens the library first when it is `closed`, then draws `requests`
    /// user commands, then closes with `close_probability`. A close moves the
    /// next batch one day plus a random number of skipped days ahead.
    pub fn day_batch(
        &mut self,
        model: &mut LibrarySystem,
        date: NaiveDate,
        closed: bool,
        requests: usize,
        close_probability: f64,
    ) -> DayBatch {
        let mut commands = Vec::with_capacity(requests + 2);
        if closed {
            commands.push(Command::Open { date });
        }
        commands.extend(self.user_requests(model, date, requests));

        if self.rng.gen_bool(close_probability.clamp(0.0, 1.0)) {
            commands.push(Command::Close { date });
            let skip = self.rng.gen_range(self.config.min_skip_days..=self.config.max_skip_days);
            let next_date = date + TimeDelta::days(1 + i64::from(skip));
            debug!(%date, %next_date, commands = commands.len(), "batch closes the day");
            return DayBatch { commands, next_date, closed_after: true };
        }
        DayBatch { commands, next_date: date, closed_after: false }
    }

    /// Draw up to `n` user commands for `date`.
    ///
    /// A few opportunistic returns and picks go first so held copies keep
    /// circulating; the rest comes from the weighted pool. The result is
    /// shuffled.
    pub fn user_requests(
        &mut self,
        model: &mut LibrarySystem,
        date: NaiveDate,
        n: usize,
    ) -> Vec<Command> {
        if n == 0 {
            return Vec::new();
        }

        let mut opportunistic = Vec::new();
        if self.rng.gen_bool(self.config.return_propensity)
            && let Some(command) = self.return_held(model, date)
        {
            opportunistic.push(command);
        }
        if self.config.weights.pick > 0
            && self.rng.gen_bool(self.config.pick_propensity)
            && let Some(command) = self.pick_ready(model, date)
        {
            opportunistic.push(command);
        }
        opportunistic.shuffle(&mut self.rng);
        let cap = opportunistic.len().min(n / 3).min(MAX_OPPORTUNISTIC);
        let mut commands: Vec<Command> = opportunistic.into_iter().take(cap).collect();

        if !self.pool.is_empty() {
            let attempts = (n - commands.len()) * ATTEMPTS_PER_SLOT;
            for _ in 0..attempts {
                if commands.len() >= n {
                    break;
                }
                let Some(&family) = self.pool.choose(&mut self.rng) else { break };
                if let Some(command) = self.propose(family, model, date) {
                    trace!(?family, %command, "proposed");
                    commands.push(command);
                }
            }
        }

        commands.shuffle(&mut self.rng);
        commands.truncate(n);
        commands
    }

    fn propose(
        &mut self,
        family: Family,
        model: &mut LibrarySystem,
        date: NaiveDate,
    ) -> Option<Command> {
        match family {
            Family::Borrow => self.borrow(model, date),
            Family::Order => self.order(model, date),
            Family::Pick => self.pick_ready(model, date),
            Family::Read => self.read(model, date),
            Family::Restore => self.restore(model, date),
            Family::TraceQuery => self.trace_query(model, date),
            Family::CreditQuery => self.credit_query(model, date),
            Family::FailedCredit => self.failed_credit(model, date),
            Family::FailedOrder => self.failed_order(model, date),
        }
    }

    fn return_held(&mut self, model: &LibrarySystem, date: NaiveDate) -> Option<Command> {
        let held: Vec<_> = model
            .students()
            .flat_map(|student| student.loans().map(move |loan| (student.id(), loan.copy)))
            .collect();
        let &(student, copy) = held.choose(&mut self.rng)?;
        Some(Command::Return { date, student: student.clone(), copy })
    }

    fn pick_ready(&mut self, model: &LibrarySystem, date: NaiveDate) -> Option<Command> {
        let ready: Vec<_> = model
            .students()
            .filter_map(|student| {
                let isbn = student.reserved_copy()?.isbn();
                model.can_pick(student, isbn, date).is_ok().then_some((student.id(), isbn))
            })
            .collect();
        let &(student, isbn) = ready.choose(&mut self.rng)?;
        Some(Command::Pick { date, student: student.clone(), isbn })
    }

    fn borrow(&mut self, model: &LibrarySystem, date: NaiveDate) -> Option<Command> {
        let shelved = shelved_titles(model);
        let student = self.student(model, 1.0 - self.config.new_student_ratio)?;
        let priority = self.config.type_priority;
        let isbn = self.select_isbn(&shelved, 0.0, priority.b, priority.c)?;
        Some(Command::Borrow { date, student, isbn })
    }

    fn order(&mut self, model: &LibrarySystem, date: NaiveDate) -> Option<Command> {
        let student = self.student(model, 1.0 - self.config.new_student_ratio)?;
        let reader = model.student_or_new(&student);
        let orderable: Vec<Isbn> = model
            .titles()
            .iter()
            .copied()
            .filter(|&isbn| model.can_order(&reader, isbn).is_ok())
            .collect();
        let isbn = *orderable.choose(&mut self.rng)?;
        Some(Command::Order { date, student, isbn })
    }

    fn read(&mut self, model: &LibrarySystem, date: NaiveDate) -> Option<Command> {
        let shelved = shelved_titles(model);
        if shelved.is_empty() {
            return None;
        }
        let mut candidates: Vec<StudentId> =
            model.students().map(|student| student.id().clone()).collect();
        candidates.extend(
            self.student_pool.choose_multiple(&mut self.rng, READ_POOL_SAMPLE).cloned(),
        );
        candidates.shuffle(&mut self.rng);

        let priority = self.config.type_priority;
        for student in candidates {
            let reader = model.student_or_new(&student);
            if reader.reading_today().is_some() {
                continue;
            }
            let readable: Vec<Isbn> = shelved
                .iter()
                .copied()
                .filter(|&isbn| model.can_read(&reader, isbn).is_ok())
                .collect();
            if let Some(isbn) = self.select_isbn(&readable, priority.a_read, priority.b, priority.c)
            {
                return Some(Command::Read { date, student, isbn });
            }
        }
        None
    }

    fn restore(&mut self, model: &mut LibrarySystem, date: NaiveDate) -> Option<Command> {
        if !self.rng.gen_bool(self.config.restore_propensity) {
            return None;
        }
        let readers: Vec<_> = model
            .students()
            .filter(|student| !student.restore_proposed())
            .filter_map(|student| Some((student.id().clone(), student.reading_today()?)))
            .collect();
        let (student, copy) = readers.choose(&mut self.rng)?.clone();
        model.mark_restore_proposed(&student);
        Some(Command::Restore { date, student, copy })
    }

    fn trace_query(&mut self, model: &LibrarySystem, date: NaiveDate) -> Option<Command> {
        let copies: Vec<_> = model.copies().map(|copy| copy.id()).collect();
        let copy = *copies.choose(&mut self.rng)?;
        let student = self.student(model, 0.5)?;
        Some(Command::QueryTrace { date, student, copy })
    }

    fn credit_query(&mut self, model: &LibrarySystem, date: NaiveDate) -> Option<Command> {
        let known: Vec<&StudentId> = model.students().map(Student::id).collect();
        let student = (*known.choose(&mut self.rng)?).clone();
        Some(Command::QueryCredit { date, student })
    }

    /// A low-credit student tries something their score forbids.
    fn failed_credit(&mut self, model: &LibrarySystem, date: NaiveDate) -> Option<Command> {
        let poor: Vec<(&StudentId, i64)> = model
            .students()
            .filter(|student| student.credit() < rules::ORDER_MIN_CREDIT)
            .map(|student| (student.id(), student.credit()))
            .collect();
        let &(student, credit) = poor.choose(&mut self.rng)?;
        let student = student.clone();
        let shelved = shelved_titles(model);

        if credit < rules::BORROW_MIN_CREDIT {
            let lendable = of_types(&shelved, &[BookType::B, BookType::C]);
            if let Some(&isbn) = lendable.choose(&mut self.rng) {
                return Some(Command::Borrow { date, student, isbn });
            }
        }
        if credit < rules::READ_A_MIN_CREDIT {
            let reference = of_types(&shelved, &[BookType::A]);
            if let Some(&isbn) = reference.choose(&mut self.rng) {
                return Some(Command::Read { date, student, isbn });
            }
        }
        let lendable = of_types(model.titles(), &[BookType::B, BookType::C]);
        let isbn = *lendable.choose(&mut self.rng)?;
        Some(Command::Order { date, student, isbn })
    }

    /// An order that clashes with the student's loans or outstanding order.
    fn failed_order(&mut self, model: &LibrarySystem, date: NaiveDate) -> Option<Command> {
        let student = self.student(model, 0.95)?;
        let reader = model.student_or_new(&student);

        if reader.has_outstanding_order() && self.rng.gen_bool(0.5) {
            let isbn = *model.titles().choose(&mut self.rng)?;
            return Some(Command::Order { date, student, isbn });
        }
        if reader.held_b().is_some() && self.rng.gen_bool(0.5) {
            let b_titles = of_types(model.titles(), &[BookType::B]);
            if let Some(&isbn) = b_titles.choose(&mut self.rng) {
                return Some(Command::Order { date, student, isbn });
            }
        }
        if !reader.held_c().is_empty() && self.rng.gen_bool(0.5) {
            let held: Vec<Isbn> = reader.held_c().keys().copied().collect();
            let isbn = *held.choose(&mut self.rng)?;
            return Some(Command::Order { date, student, isbn });
        }
        None
    }

    /// Known student with probability `existing_ratio`, else a pool student.
    fn student(&mut self, model: &LibrarySystem, existing_ratio: f64) -> Option<StudentId> {
        let known: Vec<&StudentId> = model.students().map(Student::id).collect();
        if !known.is_empty() && self.rng.gen_bool(existing_ratio.clamp(0.0, 1.0)) {
            return known.choose(&mut self.rng).map(|&id| id.clone());
        }
        self.student_pool.choose(&mut self.rng).cloned()
    }

    /// Pick a title, trying A, B and C buckets by cumulative priority before
    /// falling back to any candidate.
    ///
    /// Priorities are relative: the roll is scaled by their sum.
    fn select_isbn(&mut self, candidates: &[Isbn], a: f64, b: f64, c: f64) -> Option<Isbn> {
        if candidates.is_empty() {
            return None;
        }
        let total = a + b + c;
        if total <= 0.0 {
            return candidates.choose(&mut self.rng).copied();
        }
        let roll: f64 = self.rng.gen_range(0.0..1.0) * total;
        let mut threshold = 0.0;
        for (book_type, priority) in [(BookType::A, a), (BookType::B, b), (BookType::C, c)] {
            threshold += priority;
            if roll < threshold {
                let bucket = of_types(candidates, &[book_type]);
                if let Some(&isbn) = bucket.choose(&mut self.rng) {
                    return Some(isbn);
                }
            }
        }
        candidates.choose(&mut self.rng).copied()
    }
}

fn student_pool() -> Vec<StudentId> {
    (1..=STUDENT_POOL_SIZE).filter_map(|i| format!("2337{i:04}").parse().ok()).collect()
}

fn shelved_titles(model: &LibrarySystem) -> Vec<Isbn> {
    model.titles().iter().copied().filter(|&isbn| model.first_shelved_copy(isbn).is_some()).collect()
}

fn of_types(titles: &[Isbn], types: &[BookType]) -> Vec<Isbn> {
    titles.iter().copied().filter(|isbn| types.contains(&isbn.book_type())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn library() -> LibrarySystem {
        let inventory = Inventory::new(vec![
            ("A-0001".parse().unwrap(), 2),
            ("B-0001".parse().unwrap(), 2),
            ("C-0001".parse().unwrap(), 2),
        ])
        .unwrap();
        LibrarySystem::from_inventory(&inventory).unwrap()
    }

    #[test]
    fn type_priorities_are_relative() {
        let mut generator = CommandGenerator::new(9, GeneratorConfig::default());
        let titles = library().titles().to_vec();
        for _ in 0..200 {
            let isbn = generator.select_isbn(&titles, 0.0, 0.3, 0.0).unwrap();
            assert_eq!(isbn.book_type(), BookType::B);
        }
        let any = generator.select_isbn(&titles, 0.0, 0.0, 0.0);
        assert!(any.is_some_and(|isbn| titles.contains(&isbn)));
    }

    #[test]
    fn default_profile_is_valid() {
        assert_eq!(GeneratorConfig::default().validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_bad_profiles() {
        let config = GeneratorConfig { pick_propensity: 1.5, ..GeneratorConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Probability { .. })));

        let config = GeneratorConfig { min_requests: 6, ..GeneratorConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Range { field: "requests", .. })));

        let config = GeneratorConfig { min_copies: 0, ..GeneratorConfig::default() };
        assert_eq!(config.validate(), Err(ConfigError::EmptyInventory));
    }

    #[test]
    fn close_probability_saturates() {
        let config = GeneratorConfig::default();
        let mut p = config.initial_close_probability;
        for _ in 0..10 {
            p = config.next_close_probability(p);
        }
        assert!((p - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn same_seed_same_commands() {
        let run = |seed| {
            let mut generator = CommandGenerator::new(seed, GeneratorConfig::default());
            let mut model = library();
            generator.day_batch(&mut model, day(1), true, 5, 0.5)
        };
        assert_eq!(run(7), run(7));
    }

    #[test]
    fn inventory_respects_profile() {
        let mut generator = CommandGenerator::new(3, GeneratorConfig::default());
        let inventory = generator.inventory().unwrap();
        assert_eq!(inventory.entries().len(), 5);
        assert!(inventory.entries().iter().all(|&(_, count)| (1..=10).contains(&count)));
    }

    #[test]
    fn closed_library_opens_first_and_close_moves_the_date() {
        let mut generator = CommandGenerator::new(11, GeneratorConfig::default());
        let mut model = library();
        let batch = generator.day_batch(&mut model, day(1), true, 3, 1.0);

        assert_eq!(batch.commands.first(), Some(&Command::Open { date: day(1) }));
        assert_eq!(batch.commands.last(), Some(&Command::Close { date: day(1) }));
        assert!(batch.closed_after);
        assert!(batch.next_date == day(2) || batch.next_date == day(3));
    }

    #[test]
    fn open_library_without_close_stays_on_date() {
        let mut generator = CommandGenerator::new(5, GeneratorConfig::default());
        let mut model = library();
        let batch = generator.day_batch(&mut model, day(4), false, 4, 0.0);

        assert!(batch.commands.iter().all(|command| !command.is_tidy()));
        assert!(batch.commands.len() <= 4);
        assert_eq!(batch.next_date, day(4));
        assert!(!batch.closed_after);
    }

    #[test]
    fn restore_is_proposed_once_per_reading() {
        let config = GeneratorConfig {
            weights: CommandWeights {
                borrow: 0,
                order: 0,
                pick: 0,
                read: 0,
                restore: 1,
                trace_query: 0,
                credit_query: 0,
                failed_credit: 0,
                failed_order: 0,
            },
            return_propensity: 0.0,
            restore_propensity: 1.0,
            ..GeneratorConfig::default()
        };
        let mut generator = CommandGenerator::new(1, config);
        let mut model = library();
        let reader: StudentId = "23370001".parse().unwrap();
        let copy = model.first_shelved_copy("A-0001".parse().unwrap()).unwrap();
        model.apply_open_action(day(1));
        model.apply_validated_read(day(1), &reader, copy).unwrap();

        let first = generator.user_requests(&mut model, day(1), 3);
        assert_eq!(first, vec![Command::Restore { date: day(1), student: reader, copy }]);
        assert!(generator.user_requests(&mut model, day(1), 3).is_empty());
    }

    #[test]
    fn borrows_never_prefer_reference_titles() {
        let config = GeneratorConfig {
            weights: CommandWeights {
                borrow: 1,
                order: 0,
                pick: 0,
                read: 0,
                restore: 0,
                trace_query: 0,
                credit_query: 0,
                failed_credit: 0,
                failed_order: 0,
            },
            type_priority: TypePriority { b: 0.5, c: 0.5, a_read: 0.0 },
            ..GeneratorConfig::default()
        };
        let mut generator = CommandGenerator::new(9, config);
        let mut model = library();
        for command in generator.user_requests(&mut model, day(1), 5) {
            let Command::Borrow { isbn, .. } = command else { panic!("unexpected {command}") };
            assert_ne!(isbn.book_type(), BookType::A);
        }
    }

    #[test]
    fn failed_order_targets_a_held_title() {
        let config = GeneratorConfig {
            weights: CommandWeights {
                borrow: 0,
                order: 0,
                pick: 0,
                read: 0,
                restore: 0,
                trace_query: 0,
                credit_query: 0,
                failed_credit: 0,
                failed_order: 1,
            },
            return_propensity: 0.0,
            new_student_ratio: 0.0,
            ..GeneratorConfig::default()
        };
        let mut generator = CommandGenerator::new(2, config);
        let mut model = library();
        let holder: StudentId = "23370001".parse().unwrap();
        let copy = model.first_shelved_copy("C-0001".parse().unwrap()).unwrap();
        model.apply_validated_borrow(day(1), &holder, copy).unwrap();

        for command in generator.user_requests(&mut model, day(1), 5) {
            let Command::Order { student, isbn, .. } = &command else {
                panic!("unexpected {command}")
            };
            assert_eq!(student, &holder);
            let reader = model.student(student).unwrap();
            assert!(model.can_order(reader, *isbn).is_err());
        }
    }
}
