//! Exchanges and multi-participant sync

use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use cadence_core::{CadenceError, CadenceResult};
use cadence_log::EventLog;
use cadence_transport::{link, IncomingEndpoint, OutgoingEndpoint};

use crate::{run_incoming, run_outgoing, Replica, RoleStats, SharedLog, SyncStrategy};

/// Anything that can take part in a sync
pub trait Exchange: Send + Sync {
    fn replica(&self) -> Arc<dyn Replica>;

    /// Pull the peer's events over `channel`
    fn outgoing(
        &self,
        channel: OutgoingEndpoint,
        strategy: SyncStrategy,
        cancel: CancellationToken,
    ) -> JoinHandle<CadenceResult<RoleStats>> {
        tokio::spawn(run_outgoing(self.replica(), channel, strategy, cancel))
    }

    /// Serve local events over `channel`
    fn incoming(
        &self,
        channel: IncomingEndpoint,
        strategy: SyncStrategy,
        cancel: CancellationToken,
    ) -> JoinHandle<CadenceResult<RoleStats>> {
        tokio::spawn(run_incoming(self.replica(), channel, strategy, cancel))
    }
}

impl<L: EventLog> Exchange for Arc<SharedLog<L>> {
    fn replica(&self) -> Arc<dyn Replica> {
        self.clone()
    }
}

/// Sync configuration
#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub strategy: SyncStrategy,
    /// Slots in each direction of every link
    pub capacity: usize,
    /// Upper bound on the whole sync
    pub timeout: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            strategy: SyncStrategy::Once,
            capacity: 64,
            timeout: None,
        }
    }
}

impl SyncConfig {
    /// One-shot catch-up
    pub fn once() -> Self {
        SyncConfig::default()
    }

    /// Long-lived replication, ended by cancellation
    pub fn continuous() -> Self {
        SyncConfig {
            strategy: SyncStrategy::Continuous,
            ..SyncConfig::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Summary of a finished sync
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Links opened, two per consecutive pair
    pub links: usize,
    /// Role tasks that finished cleanly
    pub roles: usize,
    pub sent: u64,
    pub received: u64,
    /// Events new to the receiving replica
    pub inserted: u64,
}

impl SyncReport {
    fn add(&mut self, stats: RoleStats) {
        self.roles += 1;
        self.sent += stats.sent;
        self.received += stats.received;
        self.inserted += stats.inserted;
    }
}

/// Sync consecutive participants pairwise until every link completes
///
/// Each pair gets two links, one per direction. Returns the first error
/// after every role task has stopped.
pub async fn sync(participants: &[&dyn Exchange], strategy: SyncStrategy) -> CadenceResult<SyncReport> {
    let config = SyncConfig {
        strategy,
        ..SyncConfig::default()
    };
    sync_with_config(participants, &config, CancellationToken::new()).await
}

/// [`sync`] bounded by `timeout`; every link is aborted when it expires
pub async fn sync_with_timeout(
    participants: &[&dyn Exchange],
    strategy: SyncStrategy,
    timeout: Duration,
) -> CadenceResult<SyncReport> {
    let config = SyncConfig {
        strategy,
        timeout: Some(timeout),
        ..SyncConfig::default()
    };
    sync_with_config(participants, &config, CancellationToken::new()).await
}

/// [`sync`] with explicit configuration; cancelling `cancel` winds every
/// link down
pub async fn sync_with_config(
    participants: &[&dyn Exchange],
    config: &SyncConfig,
    cancel: CancellationToken,
) -> CadenceResult<SyncReport> {
    match config.timeout {
        Some(timeout) => tokio::time::timeout(timeout, run_links(participants, config, cancel))
            .await
            .map_err(|_| {
                warn!("Sync timed out after {:?}", timeout);
                CadenceError::Timeout
            })?,
        None => run_links(participants, config, cancel).await,
    }
}

async fn run_links(
    participants: &[&dyn Exchange],
    config: &SyncConfig,
    cancel: CancellationToken,
) -> CadenceResult<SyncReport> {
    let mut tasks = JoinSet::new();
    let mut report = SyncReport::default();

    for pair in participants.windows(2) {
        let (a, b) = (pair[0].replica(), pair[1].replica());
        let token = cancel.child_token();
        let (a_out, b_in) = link(config.capacity);
        let (b_out, a_in) = link(config.capacity);

        tasks.spawn(run_outgoing(a.clone(), a_out, config.strategy, token.clone()));
        tasks.spawn(run_incoming(b.clone(), b_in, config.strategy, token.clone()));
        tasks.spawn(run_outgoing(b, b_out, config.strategy, token.clone()));
        tasks.spawn(run_incoming(a, a_in, config.strategy, token));
        report.links += 2;
    }

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(stats)) => report.add(stats),
            Ok(Err(e)) => {
                first_error.get_or_insert(e);
            }
            Err(e) => {
                first_error.get_or_insert(CadenceError::TaskFailed(e.to_string()));
            }
        }
    }

    if let Some(e) = first_error {
        warn!("Sync over {} links failed: {}", report.links, e);
        return Err(e);
    }
    info!(
        "Sync ({}) over {} links finished: {} messages, {} new events",
        config.strategy, report.links, report.sent, report.inserted
    );
    Ok(report)
}
