//! Gap-buffer backed event log
//!
//! Identifiers live in a sorted gap buffer with a parallel buffer of bodies.
//! Local appends and ordered deliveries from a peer land next to the previous
//! insertion, where the gap already is.

use std::collections::BTreeMap;

use bytes::Bytes;

use cadence_core::{EventId, SeqNo, SiteId};

use crate::log::advance_expected;
use crate::{find, EventLog, GapBuffer};

/// Event log over a gap buffer
#[derive(Clone, Debug, Default)]
pub struct BufferEventLog {
    /// Sorted identifiers
    ids: GapBuffer<EventId>,
    /// Bodies, aligned with `ids`
    bodies: GapBuffer<Bytes>,
    /// Expected sequence number for every site with stored events
    expected: BTreeMap<SiteId, SeqNo>,
}

impl BufferEventLog {
    pub fn new() -> Self {
        BufferEventLog::default()
    }

    /// Build a log from events in any order
    pub fn from_entries<I: IntoIterator<Item = (EventId, Bytes)>>(entries: I) -> Self {
        let mut log = BufferEventLog::new();
        for (id, body) in entries {
            log.insert(id.seqno(), id.site(), body);
        }
        log
    }

    fn position(&self, seqno: SeqNo, site: SiteId) -> Result<usize, usize> {
        find(&self.ids, EventId::new(seqno, site))
    }
}

impl EventLog for BufferEventLog {
    fn insert(&mut self, seqno: SeqNo, site: SiteId, body: Bytes) -> bool {
        let expected = self.expected(site);
        if site.is_reserved() || seqno < expected {
            return false;
        }
        let pos = match self.position(seqno, site) {
            Ok(_) => return false,
            Err(pos) => pos,
        };

        self.ids.insert(pos, EventId::new(seqno, site));
        self.bodies.insert(pos, body);

        let ids = &self.ids;
        let next = advance_expected(expected, |s| find(ids, EventId::new(s, site)).is_ok());
        self.expected.insert(site, next);
        true
    }

    fn get(&self, seqno: SeqNo, site: SiteId) -> Option<Bytes> {
        let pos = self.position(seqno, site).ok()?;
        self.bodies.get(pos).cloned()
    }

    fn contains(&self, seqno: SeqNo, site: SiteId) -> bool {
        self.position(seqno, site).is_ok()
    }

    fn expected(&self, site: SiteId) -> SeqNo {
        self.expected.get(&site).copied().unwrap_or(SeqNo::MIN)
    }

    fn sites(&self) -> Vec<SiteId> {
        self.expected.keys().copied().collect()
    }

    fn acknowledged(&self) -> Vec<EventId> {
        self.ids.iter().copied().collect()
    }

    fn entries(&self) -> Vec<(EventId, Bytes)> {
        self.ids
            .iter()
            .copied()
            .zip(self.bodies.iter().cloned())
            .collect()
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn clear(&mut self) {
        self.ids.clear();
        self.bodies.clear();
        self.expected.clear();
    }

    fn last_id(&self) -> EventId {
        self.ids
            .iter()
            .next_back()
            .copied()
            .unwrap_or(EventId::UNSPECIFIED)
    }
}
