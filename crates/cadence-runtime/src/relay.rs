//! Relay: a participant without a model
//!
//! A relay stores every event it receives and serves them to other
//! participants. It issues no events of its own, so hub-style topologies
//! can route through it without the hub understanding the payloads.

use std::sync::Arc;

use cadence_core::{CadenceResult, SiteId};
use cadence_log::{AnyEventLog, LogBacking};
use cadence_sync::{sync_with_config, Exchange, Replica, SharedLog, SyncConfig, SyncReport};
use tokio_util::sync::CancellationToken;

/// Log-only participant
#[derive(Clone)]
pub struct Relay {
    log: Arc<SharedLog<AnyEventLog>>,
}

impl Relay {
    pub fn new(backing: LogBacking) -> Self {
        Relay {
            log: Arc::new(SharedLog::new(AnyEventLog::new(backing))),
        }
    }

    /// Number of stored events
    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Sites the relay holds events for
    pub fn sites(&self) -> Vec<SiteId> {
        self.log.sites()
    }

    /// Copy of the stored log
    pub fn log(&self) -> AnyEventLog {
        self.log.snapshot()
    }

    /// Sync every spoke with the relay, one after the other
    ///
    /// Under `Once` a later spoke receives everything gathered from the
    /// earlier ones, and earlier spokes catch up on the next round.
    pub async fn gather(
        &self,
        spokes: &[&dyn Exchange],
        config: &SyncConfig,
        cancel: CancellationToken,
    ) -> CadenceResult<SyncReport> {
        let mut total = SyncReport::default();
        for spoke in spokes {
            let report = sync_with_config(&[*spoke, self], config, cancel.clone()).await?;
            total.links += report.links;
            total.roles += report.roles;
            total.sent += report.sent;
            total.received += report.received;
            total.inserted += report.inserted;
        }
        tracing::debug!(
            "Relay gathered {} events from {} spokes ({} sites held)",
            total.inserted,
            spokes.len(),
            self.log.sites().len()
        );
        Ok(total)
    }
}

impl Default for Relay {
    fn default() -> Self {
        Relay::new(LogBacking::default())
    }
}

impl Exchange for Relay {
    fn replica(&self) -> Arc<dyn Replica> {
        self.log.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Site, SiteConfig};
    use cadence_core::{EventId, SeqNo};
    use bytes::Bytes;
    use cadence_state::{Commutative, OneWayProjection};

    struct Count;

    impl OneWayProjection for Count {
        type Model = u64;
        type Event = i64;

        fn forward(&self, model: &mut u64, _id: EventId, _event: &i64) {
            *model += 1;
        }
    }

    fn site(id: u32, events: i64) -> Site<Commutative<Count>> {
        let site = Site::with_config(SiteId::new(id), Commutative(Count), 0, SiteConfig::default());
        for i in 0..events {
            site.append(i).unwrap();
        }
        site
    }

    #[tokio::test]
    async fn test_relay_forwards_between_spokes() {
        let relay = Relay::new(LogBacking::Persistent);
        let a = site(1, 3);
        let b = site(2, 2);
        let c = site(3, 0);
        let spokes: [&dyn Exchange; 3] = [&a, &b, &c];

        let config = SyncConfig::once();
        relay.gather(&spokes, &config, CancellationToken::new()).await.unwrap();
        assert_eq!(relay.len(), 5);
        assert_eq!(c.model(), 5);

        // Second round brings the early spokes up to date
        relay.gather(&spokes, &config, CancellationToken::new()).await.unwrap();
        assert_eq!(a.model(), 5);
        assert_eq!(b.model(), 5);
    }

    #[tokio::test]
    async fn test_relay_keeps_undecodable_events() {
        let relay = Relay::default();
        let replica = relay.replica();
        assert!(replica.insert(SeqNo::new(0), SiteId::new(9), Bytes::from_static(b"?")));

        let a = site(1, 0);
        cadence_sync::sync(&[&relay, &a], cadence_sync::SyncStrategy::Once)
            .await
            .unwrap();
        // Stored and forwarded, never applied
        assert_eq!(a.len(), 1);
        assert_eq!(a.model(), 0);
        assert_eq!(a.stats().skipped, 1);
    }
}
