//! History fuzzer
//!
//! Generates ledger events from several sites, delivers them to a history
//! in a random order (with duplicates) and checks the result against a
//! plain fold over the events sorted by identifier. Revert/replay is correct
//! exactly when the two agree for every delivery order.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use cadence_core::{EventId, Payload, SeqNo, SiteId};
use cadence_log::{AnyEventLog, EventLog, LogBacking};
use cadence_state::{History, HistoryStats, TwoWayProjection};

use crate::{Account, Entry, Ledger};

/// Fuzzer configuration
#[derive(Clone, Debug)]
pub struct FuzzerConfig {
    pub site_count: u32,
    pub event_count: usize,
    /// Probability that an event is a withdrawal
    pub withdraw_prob: f64,
    /// Probability that a delivery is repeated later
    pub duplicate_prob: f64,
    pub backing: LogBacking,
    pub seed: u64,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        FuzzerConfig {
            site_count: 4,
            event_count: 500,
            withdraw_prob: 0.4,
            duplicate_prob: 0.1,
            backing: LogBacking::Buffer,
            seed: 42,
        }
    }
}

impl FuzzerConfig {
    /// Light fuzzing for quick tests
    pub fn light() -> Self {
        FuzzerConfig {
            site_count: 3,
            event_count: 60,
            ..FuzzerConfig::default()
        }
    }

    /// Heavy fuzzing for thorough testing
    pub fn heavy() -> Self {
        FuzzerConfig {
            site_count: 10,
            event_count: 3000,
            withdraw_prob: 0.5,
            duplicate_prob: 0.2,
            ..FuzzerConfig::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_backing(mut self, backing: LogBacking) -> Self {
        self.backing = backing;
        self
    }
}

/// Fuzzing result
#[derive(Debug)]
pub struct FuzzResult {
    /// Model from the sorted fold
    pub expected: Account,
    /// Model from the shuffled deliveries
    pub actual: Account,
    /// Applied events are exactly the log's events, in the log's order
    pub ordered: bool,
    pub stats: HistoryStats,
}

impl FuzzResult {
    pub fn converged(&self) -> bool {
        self.expected == self.actual
    }

    pub fn is_valid(&self) -> bool {
        self.converged() && self.ordered
    }
}

/// History fuzzer
pub struct HistoryFuzzer {
    config: FuzzerConfig,
    rng: StdRng,
}

impl HistoryFuzzer {
    pub fn new(config: FuzzerConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        HistoryFuzzer { config, rng }
    }

    /// Events in issue order; each site numbers its own events densely
    pub fn generate(&mut self) -> Vec<(EventId, Entry)> {
        let sites = self.config.site_count.max(1);
        let mut next = vec![SeqNo::MIN; sites as usize];
        let mut events = Vec::with_capacity(self.config.event_count);

        for _ in 0..self.config.event_count {
            let site = self.rng.gen_range(0..sites);
            let seqno = next[site as usize];
            next[site as usize] = seqno.inc();

            let entry = if self.rng.gen_bool(self.config.withdraw_prob) {
                Entry::Withdraw(self.rng.gen_range(1..=150))
            } else {
                Entry::Deposit(self.rng.gen_range(1..=100))
            };
            events.push((EventId::new(seqno, SiteId::new(site + 1)), entry));
        }
        events
    }

    /// Shuffled delivery order, with some events delivered twice
    pub fn deliveries(&mut self, events: &[(EventId, Entry)]) -> Vec<(EventId, Entry)> {
        let mut deliveries = events.to_vec();
        for event in events {
            if self.rng.gen_bool(self.config.duplicate_prob) {
                deliveries.push(*event);
            }
        }
        deliveries.shuffle(&mut self.rng);
        deliveries
    }

    pub fn run(&mut self) -> FuzzResult {
        let events = self.generate();
        let deliveries = self.deliveries(&events);

        let mut history = History::with_log(
            Ledger,
            Account::default(),
            AnyEventLog::new(self.config.backing),
        );
        for (id, entry) in deliveries {
            history.insert(id.seqno(), id.site(), entry.encode());
        }

        FuzzResult {
            expected: sorted_fold(&events),
            ordered: history.applied() == history.log().acknowledged(),
            actual: history.model().clone(),
            stats: history.stats(),
        }
    }
}

/// Reference model: every event applied once, in identifier order
pub fn sorted_fold(events: &[(EventId, Entry)]) -> Account {
    let mut sorted = events.to_vec();
    sorted.sort_by_key(|(id, _)| *id);
    sorted.dedup_by_key(|(id, _)| *id);

    let mut account = Account::default();
    for (id, entry) in &sorted {
        Ledger.forward(&mut account, *id, entry);
    }
    account
}
