//! Persistent-tree backed event log
//!
//! Cloning the log is O(1): both clones share every node until one of them
//! is modified, and a modification copies only one root-to-leaf path.

use bytes::Bytes;

use cadence_core::{EventId, SeqNo, SiteId};

use crate::log::advance_expected;
use crate::{EventLog, PersistentTree};

/// Event log over persistent AVL trees
#[derive(Clone, Debug, Default)]
pub struct PersistentEventLog {
    events: PersistentTree<EventId, Bytes>,
    expected: PersistentTree<SiteId, SeqNo>,
}

impl PersistentEventLog {
    pub fn new() -> Self {
        PersistentEventLog::default()
    }

    /// Does `other` share all of its event storage with `self`?
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        self.events.ptr_eq(&other.events)
    }
}

impl EventLog for PersistentEventLog {
    fn insert(&mut self, seqno: SeqNo, site: SiteId, body: Bytes) -> bool {
        let expected = self.expected(site);
        let id = EventId::new(seqno, site);
        if site.is_reserved() || seqno < expected || self.events.contains_key(&id) {
            return false;
        }

        self.events = self.events.insert(id, body);
        let events = &self.events;
        let next = advance_expected(expected, |s| events.contains_key(&EventId::new(s, site)));
        self.expected = self.expected.insert(site, next);
        true
    }

    fn get(&self, seqno: SeqNo, site: SiteId) -> Option<Bytes> {
        self.events.get(&EventId::new(seqno, site)).cloned()
    }

    fn contains(&self, seqno: SeqNo, site: SiteId) -> bool {
        self.events.contains_key(&EventId::new(seqno, site))
    }

    fn expected(&self, site: SiteId) -> SeqNo {
        self.expected.get(&site).copied().unwrap_or(SeqNo::MIN)
    }

    fn sites(&self) -> Vec<SiteId> {
        self.expected.iter().map(|(site, _)| *site).collect()
    }

    fn acknowledged(&self) -> Vec<EventId> {
        self.events.iter().map(|(id, _)| *id).collect()
    }

    fn entries(&self) -> Vec<(EventId, Bytes)> {
        self.events
            .iter()
            .map(|(id, body)| (*id, body.clone()))
            .collect()
    }

    fn len(&self) -> usize {
        self.events.len()
    }

    fn clear(&mut self) {
        *self = PersistentEventLog::new();
    }

    fn last_id(&self) -> EventId {
        self.events
            .last()
            .map(|(id, _)| *id)
            .unwrap_or(EventId::UNSPECIFIED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::contract::{self, body, id};

    #[test]
    fn test_persistent_log_contract() {
        contract::run_all::<PersistentEventLog>();
    }

    #[test]
    fn test_snapshots_coexist() {
        let mut log = PersistentEventLog::new();
        let site = SiteId::new(1);
        log.append(site, body(0));
        log.append(site, body(1));

        let snapshot = log.clone();
        assert!(snapshot.shares_storage_with(&log));

        log.append(site, body(2));
        log.insert(SeqNo::new(0), SiteId::new(2), body(9));

        assert_eq!(snapshot.acknowledged(), vec![id(0, 1), id(1, 1)]);
        assert_eq!(snapshot.expected(site), SeqNo::new(2));
        assert_eq!(log.len(), 4);
        assert!(!snapshot.shares_storage_with(&log));
    }

    #[test]
    fn test_rejected_insert_keeps_storage() {
        let mut log = PersistentEventLog::new();
        log.append(SiteId::new(1), body(0));
        let before = log.clone();
        assert!(!log.insert(SeqNo::new(0), SiteId::new(1), body(0)));
        assert!(before.shares_storage_with(&log));
    }
}
