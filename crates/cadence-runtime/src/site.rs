//! Site: a replica applications read and write
//!
//! A site owns an event log and the history folded from it. Local events
//! and replicated events go through the same lock, so an observer never
//! sees a log entry whose effect is missing from the model. Link tasks only
//! reach the site through [`Replica`].

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use cadence_core::{CadenceError, CadenceResult, EventId, SeqNo, SiteId};
use cadence_log::{AnyEventLog, EventLog};
use cadence_state::{History, HistoryStats, TwoWayProjection};
use cadence_sync::{sync_with_config, Exchange, Replica, SyncReport};

use crate::SiteConfig;

struct SiteInner<P: TwoWayProjection> {
    id: SiteId,
    config: SiteConfig,
    store: Mutex<History<P, AnyEventLog>>,
    /// Bumped with `store` locked
    version: watch::Sender<u64>,
}

impl<P: TwoWayProjection> SiteInner<P> {
    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

impl<P: TwoWayProjection> Replica for SiteInner<P> {
    fn local_site(&self) -> Option<SiteId> {
        Some(self.id)
    }

    fn insert(&self, seqno: SeqNo, site: SiteId, body: Bytes) -> bool {
        let mut store = self.store.lock();
        let inserted = store.insert(seqno, site, body);
        if inserted {
            self.bump();
        }
        inserted
    }

    fn expected(&self, site: SiteId) -> SeqNo {
        self.store.lock().log().expected(site)
    }

    fn sites(&self) -> Vec<SiteId> {
        self.store.lock().log().sites()
    }

    fn events(&self, site: SiteId, from: SeqNo, count: u64) -> Vec<(SeqNo, Bytes)> {
        self.store.lock().log().events(site, from, count)
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}

/// Replica with a model
///
/// Cloning a `Site` yields another handle to the same replica.
pub struct Site<P: TwoWayProjection> {
    inner: Arc<SiteInner<P>>,
}

impl<P: TwoWayProjection> Clone for Site<P> {
    fn clone(&self) -> Self {
        Site {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: TwoWayProjection> Site<P> {
    /// New site with a random identifier and default configuration
    pub fn new(projection: P, initial: P::Model) -> Self {
        Site::with_config(SiteId::random(), projection, initial, SiteConfig::default())
    }

    pub fn with_config(id: SiteId, projection: P, initial: P::Model, config: SiteConfig) -> Self {
        let log = AnyEventLog::new(config.backing);
        Site::from_log(id, projection, initial, log, config)
    }

    /// Restore a site from a stored log
    pub fn from_log(
        id: SiteId,
        projection: P,
        initial: P::Model,
        log: AnyEventLog,
        config: SiteConfig,
    ) -> Self {
        let history = History::with_log(projection, initial, log);
        let (version, _) = watch::channel(0);
        debug!(
            "Site {} opened with {} events ({} log, {} projection)",
            id,
            history.len(),
            config.backing,
            history.projection().kind()
        );
        Site {
            inner: Arc::new(SiteInner {
                id,
                config,
                store: Mutex::new(history),
                version,
            }),
        }
    }

    pub fn id(&self) -> SiteId {
        self.inner.id
    }

    pub fn config(&self) -> &SiteConfig {
        &self.inner.config
    }

    /// Issue one local event
    pub fn append(&self, event: P::Event) -> CadenceResult<EventId> {
        self.event(|scope| scope.emit(event))
    }

    /// Run `f` with read access to the model, issuing any number of events
    ///
    /// Events emitted inside the scope become visible to observers together.
    ///
    /// The site's store stays locked while `f` runs. Calling this site's own
    /// accessors from inside `f` (`read`, `model`, `len`, `stats`, `log`,
    /// `snapshot`, `append` or a nested `event`) deadlocks; read through
    /// [`EventScope::model`] instead. Other threads block until `f` returns.
    pub fn event<T>(&self, f: impl FnOnce(&mut EventScope<'_, P>) -> T) -> T {
        let mut history = self.inner.store.lock();
        let mut scope = EventScope {
            history: &mut history,
            site: self.inner.id,
            issued: 0,
        };
        let out = f(&mut scope);
        if scope.issued > 0 {
            self.inner.bump();
        }
        out
    }

    /// Read the current model
    pub fn read<T>(&self, f: impl FnOnce(&P::Model) -> T) -> T {
        f(self.inner.store.lock().model())
    }

    /// Change counter; bumped whenever the log gains events
    pub fn version(&self) -> u64 {
        *self.inner.version.borrow()
    }

    pub fn watch(&self) -> SiteWatch<P> {
        SiteWatch {
            site: self.clone(),
            changes: self.inner.version.subscribe(),
        }
    }

    /// Number of stored events
    pub fn len(&self) -> usize {
        self.inner.store.lock().log().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> HistoryStats {
        self.inner.store.lock().stats()
    }

    /// Copy of the log; constant time with the persistent backing
    pub fn log(&self) -> AnyEventLog {
        self.inner.store.lock().log().clone()
    }

    /// Sync with `peers` using this site's configuration
    ///
    /// The site is linked to the first peer, which is linked to the second,
    /// and so on.
    pub async fn sync(&self, peers: &[&dyn Exchange]) -> CadenceResult<SyncReport> {
        self.sync_until(peers, CancellationToken::new()).await
    }

    /// [`Site::sync`], stopped early by `cancel`
    pub async fn sync_until(
        &self,
        peers: &[&dyn Exchange],
        cancel: CancellationToken,
    ) -> CadenceResult<SyncReport> {
        let mut participants: Vec<&dyn Exchange> = Vec::with_capacity(peers.len() + 1);
        participants.push(self);
        participants.extend_from_slice(peers);
        let report = sync_with_config(&participants, &self.inner.config.sync_config(), cancel).await?;
        info!("Site {} synced: {} new events", self.id(), report.inserted);
        Ok(report)
    }
}

impl<P> Site<P>
where
    P: TwoWayProjection,
    P::Model: Clone,
{
    /// Copy of the current model
    pub fn model(&self) -> P::Model {
        self.read(|model| model.clone())
    }

    /// Consistent view of the acknowledged events and the model
    pub fn snapshot(&self) -> SiteSnapshot<P::Model> {
        let history = self.inner.store.lock();
        SiteSnapshot {
            site: self.inner.id,
            version: *self.inner.version.borrow(),
            events: history.log().acknowledged(),
            model: history.model().clone(),
        }
    }
}

impl<P: TwoWayProjection> Exchange for Site<P> {
    fn replica(&self) -> Arc<dyn Replica> {
        self.inner.clone()
    }
}

impl<P: TwoWayProjection> fmt::Debug for Site<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Site")
            .field("id", &self.inner.id)
            .field("version", &self.version())
            .finish()
    }
}

/// Scope of [`Site::event`]
pub struct EventScope<'a, P: TwoWayProjection> {
    history: &'a mut History<P, AnyEventLog>,
    site: SiteId,
    issued: usize,
}

impl<'a, P: TwoWayProjection> EventScope<'a, P> {
    /// Model including the events emitted so far in this scope
    pub fn model(&self) -> &P::Model {
        self.history.model()
    }

    pub fn site(&self) -> SiteId {
        self.site
    }

    /// Issue a local event
    pub fn emit(&mut self, event: P::Event) -> CadenceResult<EventId> {
        let id = self.history.append(self.site, event)?;
        self.issued += 1;
        Ok(id)
    }

    /// Events emitted in this scope so far
    pub fn issued(&self) -> usize {
        self.issued
    }
}

/// Change notifications for one site
pub struct SiteWatch<P: TwoWayProjection> {
    site: Site<P>,
    changes: watch::Receiver<u64>,
}

impl<P: TwoWayProjection> SiteWatch<P> {
    /// Wait for the next change
    pub async fn changed(&mut self) -> CadenceResult<u64> {
        self.changes
            .changed()
            .await
            .map_err(|_| CadenceError::ChannelClosed)?;
        Ok(*self.changes.borrow_and_update())
    }

    /// Wait until `pred` holds for the model
    pub async fn wait_for(&mut self, mut pred: impl FnMut(&P::Model) -> bool) -> CadenceResult<()> {
        loop {
            // Mark the current version seen before reading, so no change is missed
            self.changes.borrow_and_update();
            if self.site.read(&mut pred) {
                return Ok(());
            }
            self.changed().await?;
        }
    }

    pub fn site(&self) -> &Site<P> {
        &self.site
    }
}

/// Point-in-time view of a site
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SiteSnapshot<M> {
    pub site: SiteId,
    pub version: u64,
    /// Acknowledged event identifiers, ascending
    pub events: Vec<EventId>,
    pub model: M,
}

impl<M: Serialize> SiteSnapshot<M> {
    pub fn to_json(&self) -> CadenceResult<String> {
        serde_json::to_string(self).map_err(|e| CadenceError::Json(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::Payload;
    use cadence_log::LogBacking;
    use cadence_state::{Commutative, OneWayProjection};
    use cadence_sync::SyncStrategy;
    use std::time::Duration;

    struct Sum;

    impl OneWayProjection for Sum {
        type Model = i64;
        type Event = i64;

        fn forward(&self, model: &mut i64, _id: EventId, event: &i64) {
            *model += event;
        }
    }

    fn site(id: u32) -> Site<Commutative<Sum>> {
        Site::with_config(SiteId::new(id), Commutative(Sum), 0, SiteConfig::default())
    }

    #[test]
    fn test_append_updates_model_and_version() {
        let alice = site(1);
        assert_eq!(alice.append(5).unwrap(), EventId::new(SeqNo::new(0), SiteId::new(1)));
        assert_eq!(alice.append(-2).unwrap(), EventId::new(SeqNo::new(1), SiteId::new(1)));
        assert_eq!(alice.model(), 3);
        assert_eq!(alice.version(), 2);
        assert_eq!(alice.len(), 2);
    }

    #[test]
    fn test_event_scope_reads_and_yields() {
        let alice = site(1);
        alice.append(10).unwrap();
        let version = alice.version();

        // Halve the running total, in two steps
        let issued = alice.event(|scope| {
            let half = *scope.model() / 2;
            scope.emit(-half / 2).unwrap();
            let rest = *scope.model() - half;
            scope.emit(-rest).unwrap();
            scope.issued()
        });

        assert_eq!(issued, 2);
        assert_eq!(alice.model(), 5);
        assert_eq!(alice.version(), version + 1);
    }

    #[test]
    fn test_other_threads_wait_for_the_scope() {
        let alice = site(1);
        let reader = alice.clone();
        let handle = alice.event(|scope| {
            // Blocks on the store until the scope ends
            let handle = std::thread::spawn(move || reader.model());
            std::thread::sleep(Duration::from_millis(10));
            scope.emit(1).unwrap();
            scope.emit(2).unwrap();
            handle
        });
        assert_eq!(handle.join().unwrap(), 3);
    }

    #[test]
    fn test_empty_scope_keeps_version() {
        let alice = site(1);
        let total = alice.event(|scope| *scope.model());
        assert_eq!(total, 0);
        assert_eq!(alice.version(), 0);
    }

    #[test]
    fn test_replica_insert_cascades_into_model() {
        let alice = site(1);
        let replica = alice.replica();
        assert!(replica.insert(SeqNo::new(0), SiteId::new(2), 7i64.encode()));
        assert!(!replica.insert(SeqNo::new(0), SiteId::new(2), 7i64.encode()));
        assert_eq!(alice.model(), 7);
        assert_eq!(replica.sites(), vec![SiteId::new(2)]);
        assert_eq!(replica.local_site(), Some(SiteId::new(1)));
    }

    #[test]
    fn test_snapshot_and_json() {
        let alice = site(1);
        alice.append(4).unwrap();
        let snapshot = alice.snapshot();
        assert_eq!(snapshot.events, vec![EventId::new(SeqNo::new(0), SiteId::new(1))]);
        assert_eq!(snapshot.model, 4);

        let json: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(json["model"], 4);
        assert_eq!(json["site"], 1);
    }

    #[test]
    fn test_restore_from_log() {
        let config = SiteConfig {
            backing: LogBacking::Persistent,
            ..SiteConfig::default()
        };
        let alice = Site::with_config(SiteId::new(1), Commutative(Sum), 0, config.clone());
        alice.append(2).unwrap();
        alice.append(3).unwrap();

        let restored = Site::from_log(SiteId::new(1), Commutative(Sum), 0, alice.log(), config);
        assert_eq!(restored.model(), 5);
        assert_eq!(restored.append(1).unwrap().seqno(), SeqNo::new(2));
    }

    #[tokio::test]
    async fn test_watch_sees_remote_events() {
        let alice = site(1);
        let mut watch = alice.watch();
        let replica = alice.replica();

        tokio::spawn(async move {
            for seqno in 0..3 {
                replica.insert(SeqNo::new(seqno), SiteId::new(2), 1i64.encode());
                tokio::task::yield_now().await;
            }
        });

        tokio::time::timeout(Duration::from_secs(5), watch.wait_for(|total| *total == 3))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(watch.site().model(), 3);
    }

    #[tokio::test]
    async fn test_site_sync_uses_config() {
        let alice = site(1);
        let bob = Site::with_config(
            SiteId::new(2),
            Commutative(Sum),
            0,
            SiteConfig {
                strategy: SyncStrategy::Once,
                capacity: 1,
                ..SiteConfig::default()
            },
        );
        alice.append(2).unwrap();
        bob.append(40).unwrap();

        let report = bob.sync(&[&alice]).await.unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(alice.model(), 42);
        assert_eq!(bob.model(), 42);
    }
}
