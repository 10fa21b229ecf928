//! Replica: what a link needs from the local site
//!
//! Every method takes `&self`; implementations serialize access internally
//! so the roles of several links and the application can share one replica.
//! A single insert is atomic with respect to every observer.

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::watch;

use cadence_core::{EventId, SeqNo, SiteId};
use cadence_log::EventLog;

/// Shared log view used by both sync roles
pub trait Replica: Send + Sync + 'static {
    /// Site issuing local events, if any
    fn local_site(&self) -> Option<SiteId>;

    /// Store a replicated event; false if it was already known
    fn insert(&self, seqno: SeqNo, site: SiteId, body: Bytes) -> bool;

    fn expected(&self, site: SiteId) -> SeqNo;

    /// Sites with at least one stored event
    fn sites(&self) -> Vec<SiteId>;

    /// Contiguous run of stored events of `site` from `from`
    fn events(&self, site: SiteId, from: SeqNo, count: u64) -> Vec<(SeqNo, Bytes)>;

    /// Version counter bumped after every change to the log
    fn subscribe(&self) -> watch::Receiver<u64>;
}

/// A bare event log shared between tasks
pub struct SharedLog<L: EventLog> {
    log: Mutex<L>,
    local: Option<SiteId>,
    version: watch::Sender<u64>,
}

impl<L: EventLog> SharedLog<L> {
    /// Log without a local site, as used by relays
    pub fn new(log: L) -> Self {
        let (version, _) = watch::channel(0);
        SharedLog {
            log: Mutex::new(log),
            local: None,
            version,
        }
    }

    /// Log that can issue events for `site`
    pub fn with_site(site: SiteId, log: L) -> Self {
        SharedLog {
            local: Some(site),
            ..SharedLog::new(log)
        }
    }

    /// Issue a local event; `None` without a local site
    pub fn append(&self, body: Bytes) -> Option<EventId> {
        let site = self.local?;
        let id = self.log.lock().append(site, body);
        if !id.is_specified() {
            return None;
        }
        self.bump();
        Some(id)
    }

    /// Copy of the current log
    pub fn snapshot(&self) -> L {
        self.log.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

impl<L: EventLog + Default> Default for SharedLog<L> {
    fn default() -> Self {
        SharedLog::new(L::default())
    }
}

impl<L: EventLog> Replica for SharedLog<L> {
    fn local_site(&self) -> Option<SiteId> {
        self.local
    }

    fn insert(&self, seqno: SeqNo, site: SiteId, body: Bytes) -> bool {
        let inserted = self.log.lock().insert(seqno, site, body);
        if inserted {
            self.bump();
        }
        inserted
    }

    fn expected(&self, site: SiteId) -> SeqNo {
        self.log.lock().expected(site)
    }

    fn sites(&self) -> Vec<SiteId> {
        self.log.lock().sites()
    }

    fn events(&self, site: SiteId, from: SeqNo, count: u64) -> Vec<(SeqNo, Bytes)> {
        self.log.lock().events(site, from, count)
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_log::BufferEventLog;

    #[test]
    fn test_shared_log_versions() {
        let site = SiteId::new(1);
        let shared = SharedLog::with_site(site, BufferEventLog::new());
        let rx = shared.subscribe();

        assert_eq!(shared.append(Bytes::from_static(b"a")), Some(EventId::new(SeqNo::MIN, site)));
        assert!(shared.insert(SeqNo::new(0), SiteId::new(2), Bytes::from_static(b"b")));
        assert!(!shared.insert(SeqNo::new(0), SiteId::new(2), Bytes::from_static(b"b")));

        assert_eq!(shared.version(), 2);
        assert_eq!(*rx.borrow(), 2);
        assert_eq!(shared.sites(), vec![site, SiteId::new(2)]);
        assert_eq!(shared.snapshot().len(), 2);
    }

    #[test]
    fn test_relay_cannot_append() {
        let relay: SharedLog<BufferEventLog> = SharedLog::default();
        assert_eq!(relay.local_site(), None);
        assert_eq!(relay.append(Bytes::new()), None);
        assert!(relay.is_empty());
    }
}
