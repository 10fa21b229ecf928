//! Event log contract
//!
//! Every backing stores opaque event bodies keyed by [`EventId`] and tracks,
//! for each site, the *expected* sequence number: one past the highest
//! sequence number held without gaps since [`SeqNo::MIN`]. The sync protocol
//! requests events starting at `expected`, so it must never skip a gap.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use cadence_core::{CadenceError, EventId, SeqNo, SiteId};

use crate::{BufferEventLog, PersistentEventLog};

/// Storage contract shared by every log backing
pub trait EventLog: Clone + Send + Sync + 'static {
    /// Store an event at `seqno` for `site`
    ///
    /// Does nothing and returns `false` when `seqno < expected(site)` or the
    /// event is already stored, and for [`SiteId::RESERVED`], whose last
    /// identifier would be [`EventId::UNSPECIFIED`]. Otherwise stores it, advances `expected`
    /// over every contiguous stored sequence number, and returns `true`.
    fn insert(&mut self, seqno: SeqNo, site: SiteId, body: Bytes) -> bool;

    fn get(&self, seqno: SeqNo, site: SiteId) -> Option<Bytes>;

    /// Next sequence number this log lacks for `site`
    fn expected(&self, site: SiteId) -> SeqNo;

    /// Sites with at least one stored event, sorted
    fn sites(&self) -> Vec<SiteId>;

    /// Stored identifiers in total order
    fn acknowledged(&self) -> Vec<EventId>;

    /// Stored events in total order
    fn entries(&self) -> Vec<(EventId, Bytes)>;

    fn len(&self) -> usize;

    fn clear(&mut self);

    /// Greatest stored identifier, or [`EventId::UNSPECIFIED`] when empty
    fn last_id(&self) -> EventId;

    /// Issue a new event for `site` at `expected(site)`
    ///
    /// Once a site reaches [`SeqNo::MAX`] its clock cannot advance and
    /// further appends are dropped and return [`EventId::UNSPECIFIED`].
    fn append(&mut self, site: SiteId, body: Bytes) -> EventId {
        if site.is_reserved() {
            tracing::warn!(%site, "reserved site cannot author events, event dropped");
            return EventId::UNSPECIFIED;
        }
        let seqno = self.expected(site);
        if !self.insert(seqno, site, body) {
            tracing::warn!(%site, "sequence numbers exhausted, event dropped");
            return EventId::UNSPECIFIED;
        }
        EventId::new(seqno, site)
    }

    fn contains(&self, seqno: SeqNo, site: SiteId) -> bool {
        self.get(seqno, site).is_some()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Contiguous run of stored events of `site`, starting at `from`,
    /// holding at most `count` events
    fn events(&self, site: SiteId, from: SeqNo, count: u64) -> Vec<(SeqNo, Bytes)> {
        let mut out = Vec::new();
        let mut seqno = from;
        while (out.len() as u64) < count {
            let Some(body) = self.get(seqno, site) else {
                break;
            };
            out.push((seqno, body));
            if seqno == SeqNo::MAX {
                break;
            }
            seqno = seqno.inc();
        }
        out
    }

    /// Insert every event of `other`; returns how many were new
    fn merge<L: EventLog>(&mut self, other: &L) -> usize {
        let mut added = 0;
        for (id, body) in other.entries() {
            if self.insert(id.seqno(), id.site(), body) {
                added += 1;
            }
        }
        added
    }
}

/// Next `expected` value once `seqno` is stored, given a membership test
pub(crate) fn advance_expected(
    mut expected: SeqNo,
    contains: impl Fn(SeqNo) -> bool,
) -> SeqNo {
    while contains(expected) {
        let next = expected.inc();
        if next == expected {
            break;
        }
        expected = next;
    }
    expected
}

/// Choice of log backing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LogBacking {
    /// Gap buffer: fastest for appends and ordered catch-up
    #[default]
    Buffer,
    /// Persistent tree: O(1) snapshots
    Persistent,
}

impl fmt::Display for LogBacking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogBacking::Buffer => write!(f, "buffer"),
            LogBacking::Persistent => write!(f, "persistent"),
        }
    }
}

impl FromStr for LogBacking {
    type Err = CadenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buffer" | "gap" => Ok(LogBacking::Buffer),
            "persistent" | "tree" => Ok(LogBacking::Persistent),
            other => Err(CadenceError::InvalidConfig(format!(
                "unknown log backing: {}",
                other
            ))),
        }
    }
}

/// Either backing, chosen at runtime
#[derive(Clone, Debug)]
pub enum AnyEventLog {
    Buffer(BufferEventLog),
    Persistent(PersistentEventLog),
}

impl AnyEventLog {
    pub fn new(backing: LogBacking) -> Self {
        match backing {
            LogBacking::Buffer => AnyEventLog::Buffer(BufferEventLog::new()),
            LogBacking::Persistent => AnyEventLog::Persistent(PersistentEventLog::new()),
        }
    }

    pub fn backing(&self) -> LogBacking {
        match self {
            AnyEventLog::Buffer(_) => LogBacking::Buffer,
            AnyEventLog::Persistent(_) => LogBacking::Persistent,
        }
    }

    /// Same events, stored in the requested backing
    pub fn with_backing(&self, backing: LogBacking) -> Self {
        if backing == self.backing() {
            return self.clone();
        }
        let mut target = AnyEventLog::new(backing);
        target.merge(self);
        target
    }
}

impl Default for AnyEventLog {
    fn default() -> Self {
        AnyEventLog::new(LogBacking::default())
    }
}

macro_rules! delegate {
    ($self:ident, $log:ident => $body:expr) => {
        match $self {
            AnyEventLog::Buffer($log) => $body,
            AnyEventLog::Persistent($log) => $body,
        }
    };
}

impl EventLog for AnyEventLog {
    fn insert(&mut self, seqno: SeqNo, site: SiteId, body: Bytes) -> bool {
        delegate!(self, log => log.insert(seqno, site, body))
    }

    fn get(&self, seqno: SeqNo, site: SiteId) -> Option<Bytes> {
        delegate!(self, log => log.get(seqno, site))
    }

    fn contains(&self, seqno: SeqNo, site: SiteId) -> bool {
        delegate!(self, log => log.contains(seqno, site))
    }

    fn expected(&self, site: SiteId) -> SeqNo {
        delegate!(self, log => log.expected(site))
    }

    fn sites(&self) -> Vec<SiteId> {
        delegate!(self, log => log.sites())
    }

    fn acknowledged(&self) -> Vec<EventId> {
        delegate!(self, log => log.acknowledged())
    }

    fn entries(&self) -> Vec<(EventId, Bytes)> {
        delegate!(self, log => log.entries())
    }

    fn len(&self) -> usize {
        delegate!(self, log => log.len())
    }

    fn clear(&mut self) {
        delegate!(self, log => log.clear())
    }

    fn last_id(&self) -> EventId {
        delegate!(self, log => log.last_id())
    }
}

/// Contract checks run against every backing
#[cfg(test)]
pub(crate) mod contract {
    use super::*;

    pub fn id(seqno: u32, site: u32) -> EventId {
        EventId::new(SeqNo::new(seqno), SiteId::new(site))
    }

    pub fn body(tag: u8) -> Bytes {
        Bytes::from(vec![tag])
    }

    pub fn append_assigns_expected<L: EventLog + Default>() {
        let mut log = L::default();
        let site = SiteId::new(1);
        assert_eq!(log.append(site, body(0)), id(0, 1));
        assert_eq!(log.append(site, body(1)), id(1, 1));
        assert_eq!(log.append(SiteId::new(2), body(2)), id(0, 2));
        assert_eq!(log.expected(site), SeqNo::new(2));
        assert_eq!(log.acknowledged(), vec![id(0, 1), id(0, 2), id(1, 1)]);
        assert_eq!(log.last_id(), id(1, 1));
    }

    pub fn insert_is_idempotent<L: EventLog + Default>() {
        let mut log = L::default();
        let site = SiteId::new(7);
        assert!(log.insert(SeqNo::new(0), site, body(1)));
        let before = log.acknowledged();
        assert!(!log.insert(SeqNo::new(0), site, body(1)));
        assert!(!log.insert(SeqNo::new(0), site, body(9)));
        assert_eq!(log.len(), 1);
        assert_eq!(log.acknowledged(), before);
        assert_eq!(log.get(SeqNo::new(0), site), Some(body(1)));
    }

    pub fn gaps_hold_back_expected<L: EventLog + Default>() {
        let mut log = L::default();
        let site = SiteId::new(3);
        assert!(log.insert(SeqNo::new(2), site, body(2)));
        assert!(log.insert(SeqNo::new(3), site, body(3)));
        assert_eq!(log.expected(site), SeqNo::MIN);
        assert_eq!(log.sites(), vec![site]);

        // Stored beyond the gap: duplicates are still rejected
        assert!(!log.insert(SeqNo::new(3), site, body(3)));

        assert!(log.insert(SeqNo::new(0), site, body(0)));
        assert_eq!(log.expected(site), SeqNo::new(1));
        assert!(log.insert(SeqNo::new(1), site, body(1)));
        assert_eq!(log.expected(site), SeqNo::new(4));

        // Below expected is stale
        assert!(!log.insert(SeqNo::new(1), site, body(1)));
        assert_eq!(log.len(), 4);
    }

    pub fn events_stop_at_gaps<L: EventLog + Default>() {
        let mut log = L::default();
        let site = SiteId::new(5);
        for seqno in [0u32, 1, 2, 4] {
            log.insert(SeqNo::new(seqno), site, body(seqno as u8));
        }
        let run: Vec<u32> = log
            .events(site, SeqNo::MIN, u64::MAX)
            .into_iter()
            .map(|(s, _)| s.get())
            .collect();
        assert_eq!(run, vec![0, 1, 2]);
        assert_eq!(log.events(site, SeqNo::new(1), 1).len(), 1);
        assert_eq!(log.events(site, SeqNo::new(4), 10).len(), 1);
        assert!(log.events(SiteId::new(6), SeqNo::MIN, 10).is_empty());
    }

    pub fn clear_resets<L: EventLog + Default>() {
        let mut log = L::default();
        log.append(SiteId::new(1), body(0));
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.expected(SiteId::new(1)), SeqNo::MIN);
        assert!(log.sites().is_empty());
        assert_eq!(log.last_id(), EventId::UNSPECIFIED);
    }

    pub fn saturates_at_max<L: EventLog + Default>() {
        let mut log = L::default();
        let site = SiteId::new(1);
        assert!(log.insert(SeqNo::MAX, site, body(0)));
        assert!(!log.insert(SeqNo::MAX, site, body(1)));
        assert_eq!(log.len(), 1);

        let mut full = L::default();
        let other = SiteId::new(2);
        assert!(full.insert(SeqNo::MAX, other, body(2)));
        // MAX stored at a gap: the next append lands at 0 as usual
        assert_eq!(full.append(other, body(3)), id(0, 2));
    }

    pub fn rejects_reserved_site<L: EventLog + Default>() {
        let mut log = L::default();
        let reserved = SiteId::new(SiteId::RESERVED);
        assert!(!log.insert(SeqNo::MAX, reserved, body(0)));
        assert!(!log.insert(SeqNo::MIN, reserved, body(1)));
        assert_eq!(log.append(reserved, body(2)), EventId::UNSPECIFIED);
        assert!(log.is_empty());
        assert!(log.sites().is_empty());
        assert_eq!(log.expected(reserved), SeqNo::MIN);

        // The largest real identifier is still accepted
        assert!(log.insert(SeqNo::MAX, SiteId::new(SiteId::RESERVED - 1), body(3)));
        assert_ne!(log.last_id(), EventId::UNSPECIFIED);
    }

    pub fn run_all<L: EventLog + Default>() {
        append_assigns_expected::<L>();
        insert_is_idempotent::<L>();
        gaps_hold_back_expected::<L>();
        events_stop_at_gaps::<L>();
        clear_resets::<L>();
        saturates_at_max::<L>();
        rejects_reserved_site::<L>();
    }
}
