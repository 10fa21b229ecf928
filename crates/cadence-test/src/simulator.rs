//! Link simulator
//!
//! Runs the sync protocol over links that misbehave the way real
//! transports do:
//! - Per-message delay, so independent links interleave unpredictably
//! - Link drops, closing both directions mid-session
//!
//! A link never loses or reorders messages while it is up. Every fault is
//! drawn from a seeded RNG.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use cadence_core::{CadenceError, CadenceResult};
use cadence_sync::{run_incoming, run_outgoing, Exchange, RoleStats, SyncStrategy};
use cadence_transport::{link, IncomingEndpoint, OutgoingEndpoint};

/// Fault configuration
#[derive(Clone, Debug)]
pub struct FaultConfig {
    /// Delay range applied to each forwarded message
    pub delay: (Duration, Duration),
    /// Probability that forwarding a message drops the whole link
    pub drop_prob: f64,
    /// Slots in each direction of every hop
    pub capacity: usize,
}

impl Default for FaultConfig {
    fn default() -> Self {
        FaultConfig {
            delay: (Duration::ZERO, Duration::from_millis(1)),
            drop_prob: 0.0,
            capacity: 4,
        }
    }
}

impl FaultConfig {
    /// No faults at all
    pub fn clean() -> Self {
        FaultConfig {
            delay: (Duration::ZERO, Duration::ZERO),
            ..FaultConfig::default()
        }
    }

    /// Jittery links that stay up
    pub fn jittery() -> Self {
        FaultConfig::default()
    }

    /// Jittery links that often go down
    pub fn flaky() -> Self {
        FaultConfig {
            drop_prob: 0.02,
            ..FaultConfig::default()
        }
    }
}

/// Counters for one simulated link
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub forwarded: u64,
    pub dropped: bool,
}

/// Result of one simulated sync round
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimulationReport {
    pub links: usize,
    pub dropped: usize,
    pub forwarded: u64,
    /// Events new to the receiving replicas
    pub inserted: u64,
}

/// Creates faulty links
pub struct LinkSimulator {
    config: FaultConfig,
    rng: StdRng,
}

impl LinkSimulator {
    pub fn new(config: FaultConfig, seed: u64) -> Self {
        LinkSimulator {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &FaultConfig {
        &self.config
    }

    /// A link whose two hops are pumped by a spawned task
    ///
    /// The task finishes when either side closes or a fault drops the link.
    pub fn link(&mut self) -> (OutgoingEndpoint, IncomingEndpoint, JoinHandle<LinkStats>) {
        let (outgoing, upstream) = link(self.config.capacity);
        let (downstream, incoming) = link(self.config.capacity);
        let rng = StdRng::seed_from_u64(self.rng.gen());
        let config = self.config.clone();

        let pump = tokio::spawn(async move {
            let (up_tx, up_rx) = upstream.split();
            let (down_tx, down_rx) = downstream.split();
            let mut fault = Fault { config, rng };
            let mut stats = LinkStats::default();

            let dropped = fault.forward_both(up_rx, down_tx, down_rx, up_tx, &mut stats).await;
            stats.dropped = dropped;
            stats
        });

        (outgoing, incoming, pump)
    }

    /// One sync round between consecutive participants over faulty links
    ///
    /// Dropped links end their roles early without an error, so a round may
    /// leave replicas behind.
    pub async fn sync(
        &mut self,
        participants: &[&dyn Exchange],
        strategy: SyncStrategy,
    ) -> CadenceResult<SimulationReport> {
        let mut roles: JoinSet<CadenceResult<RoleStats>> = JoinSet::new();
        let mut pumps = Vec::new();
        let mut report = SimulationReport::default();

        for pair in participants.windows(2) {
            let (a, b) = (pair[0].replica(), pair[1].replica());
            let token = CancellationToken::new();

            let (a_out, b_in, pump) = self.link();
            pumps.push(pump);
            let (b_out, a_in, pump) = self.link();
            pumps.push(pump);

            roles.spawn(run_outgoing(a.clone(), a_out, strategy, token.clone()));
            roles.spawn(run_incoming(b.clone(), b_in, strategy, token.clone()));
            roles.spawn(run_outgoing(b, b_out, strategy, token.clone()));
            roles.spawn(run_incoming(a, a_in, strategy, token));
            report.links += 2;
        }

        let mut first_error = None;
        while let Some(joined) = roles.join_next().await {
            match joined {
                Ok(Ok(stats)) => report.inserted += stats.inserted,
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error.get_or_insert(CadenceError::TaskFailed(e.to_string()));
                }
            }
        }
        for pump in pumps {
            if let Ok(stats) = pump.await {
                report.forwarded += stats.forwarded;
                report.dropped += usize::from(stats.dropped);
            }
        }

        debug!(
            "Simulated round: {} links, {} dropped, {} new events",
            report.links, report.dropped, report.inserted
        );
        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}

struct Fault {
    config: FaultConfig,
    rng: StdRng,
}

impl Fault {
    fn delay(&mut self) -> Duration {
        let (min, max) = self.config.delay;
        if max <= min {
            return min;
        }
        self.rng.gen_range(min..=max)
    }

    fn drops(&mut self) -> bool {
        self.config.drop_prob > 0.0 && self.rng.gen_bool(self.config.drop_prob.min(1.0))
    }

    /// Forward both directions until one closes; true if a fault dropped
    /// the link
    ///
    /// Returning drops all four channel halves, which the roles observe as
    /// closure.
    async fn forward_both<A, B>(
        &mut self,
        mut a_rx: mpsc::Receiver<A>,
        b_tx: mpsc::Sender<A>,
        mut b_rx: mpsc::Receiver<B>,
        a_tx: mpsc::Sender<B>,
        stats: &mut LinkStats,
    ) -> bool {
        loop {
            let forwarded = tokio::select! {
                msg = a_rx.recv() => match msg {
                    Some(msg) => self.hop(msg, &b_tx).await,
                    None => return false,
                },
                msg = b_rx.recv() => match msg {
                    Some(msg) => self.hop(msg, &a_tx).await,
                    None => return false,
                },
            };
            match forwarded {
                Some(true) => stats.forwarded += 1,
                Some(false) => return false,
                None => return true,
            }
        }
    }

    /// Some(delivered) or None when the fault drops the link
    async fn hop<T>(&mut self, msg: T, tx: &mpsc::Sender<T>) -> Option<bool> {
        let delay = self.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.drops() {
            return None;
        }
        Some(tx.send(msg).await.is_ok())
    }
}
