//! Incoming role: offers the local replica's events to the peer
//!
//! The role advertises every site known to the replica plus the local site,
//! sends `Ready`, then serves requests. Each request installs a cursor for
//! its site; cursors are served round-robin, one event per site per turn,
//! oldest first within a site.
//!
//! Under [`SyncStrategy::Once`] the role completes when every site of the
//! initial advertisement has been requested and no cursor of those sites
//! has a stored event left to send. Under [`SyncStrategy::Continuous`] it
//! advertises sites as they appear and keeps unbounded cursors open.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use bytes::Bytes;
use tracing::{debug, trace};

use cadence_core::{Incoming, Outgoing, SeqNo, SiteId, UNBOUNDED};

use crate::{Replica, RoleStats, SyncStrategy};

const ROLE: &str = "incoming";

/// Events fetched from the replica per cursor refill
const FETCH_BATCH: u64 = 64;

/// Incoming role states
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IncomingState {
    Advertising,
    Serving,
    Cancelling,
    Completed,
}

impl IncomingState {
    pub fn name(self) -> &'static str {
        match self {
            IncomingState::Advertising => "advertising",
            IncomingState::Serving => "serving",
            IncomingState::Cancelling => "cancelling",
            IncomingState::Completed => "completed",
        }
    }
}

impl fmt::Display for IncomingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Position of one request in a site's event stream
#[derive(Debug)]
struct Cursor {
    /// Next sequence number to fetch
    next: SeqNo,
    /// Events still to fetch; `UNBOUNDED` never decreases
    remaining: u64,
    /// The event at `SeqNo::MAX` was fetched
    finished: bool,
    /// Fetched but not yet sent
    buffered: VecDeque<(SeqNo, Bytes)>,
}

impl Cursor {
    fn new(from: SeqNo, count: u64) -> Self {
        Cursor {
            next: from,
            remaining: count,
            finished: false,
            buffered: VecDeque::new(),
        }
    }

    /// Next event to send, fetching from the replica when the buffer is empty
    fn next_event<R: Replica + ?Sized>(&mut self, site: SiteId, replica: &R) -> Option<(SeqNo, Bytes)> {
        if self.buffered.is_empty() && !self.finished && self.remaining > 0 {
            let batch = self.remaining.min(FETCH_BATCH);
            let fetched = replica.events(site, self.next, batch);
            if let Some((last, _)) = fetched.last() {
                if *last == SeqNo::MAX {
                    self.finished = true;
                }
                self.next = last.inc();
                if self.remaining != UNBOUNDED {
                    self.remaining -= fetched.len() as u64;
                }
            }
            self.buffered.extend(fetched);
        }
        self.buffered.pop_front()
    }

    /// Nothing is left to send right now
    fn is_drained<R: Replica + ?Sized>(&mut self, site: SiteId, replica: &R) -> bool {
        if !self.buffered.is_empty() {
            return false;
        }
        if self.finished || self.remaining == 0 {
            return true;
        }
        replica.events(site, self.next, 1).is_empty()
    }
}

/// Incoming role state machine
#[derive(Debug)]
pub struct IncomingRole {
    state: IncomingState,
    strategy: SyncStrategy,
    /// Advertisements not yet sent
    unsent: VecDeque<SiteId>,
    advertised: BTreeSet<SiteId>,
    /// Sites of the advertisement preceding `Ready`
    initial: BTreeSet<SiteId>,
    requested: BTreeSet<SiteId>,
    cursors: BTreeMap<SiteId, Cursor>,
    /// Round-robin order of sites with a cursor
    rotation: VecDeque<SiteId>,
    stats: RoleStats,
}

impl IncomingRole {
    /// Snapshot the sites to advertise from `replica`
    pub fn new<R: Replica + ?Sized>(strategy: SyncStrategy, replica: &R) -> Self {
        let mut sites: BTreeSet<SiteId> = replica.sites().into_iter().collect();
        if let Some(local) = replica.local_site() {
            sites.insert(local);
        }
        IncomingRole {
            state: IncomingState::Advertising,
            strategy,
            unsent: sites.iter().copied().collect(),
            advertised: sites.clone(),
            initial: sites,
            requested: BTreeSet::new(),
            cursors: BTreeMap::new(),
            rotation: VecDeque::new(),
            stats: RoleStats::default(),
        }
    }

    pub fn state(&self) -> IncomingState {
        self.state
    }

    pub fn strategy(&self) -> SyncStrategy {
        self.strategy
    }

    pub fn stats(&self) -> RoleStats {
        self.stats
    }

    pub fn is_terminated(&self) -> bool {
        self.state == IncomingState::Completed
    }

    fn transition(&mut self, next: IncomingState) {
        debug!("{} role: {} -> {}", ROLE, self.state, next);
        self.state = next;
    }

    /// Handle one message from the peer
    pub fn on_message(&mut self, msg: Outgoing) {
        self.stats.received += 1;
        match (self.state, msg) {
            (IncomingState::Cancelling | IncomingState::Completed, msg) => {
                trace!("{} role dropped {} while {}", ROLE, msg.kind(), self.state);
            }
            (_, Outgoing::Done) => self.transition(IncomingState::Cancelling),
            (_, Outgoing::Request { site, from, count }) => {
                trace!("{} role serving {} from {} (count {})", ROLE, site, from, count);
                self.requested.insert(site);
                if self.cursors.insert(site, Cursor::new(from, count)).is_none() {
                    self.rotation.push_back(site);
                }
            }
        }
    }

    /// The replica changed; queue advertisements for sites not seen before
    pub fn on_replica_changed<R: Replica + ?Sized>(&mut self, replica: &R) {
        if self.strategy.is_once()
            || !matches!(self.state, IncomingState::Advertising | IncomingState::Serving)
        {
            return;
        }
        for site in replica.sites() {
            if self.advertised.insert(site) {
                self.unsent.push_back(site);
            }
        }
    }

    /// The peer's channel closed
    pub fn on_closed(&mut self) {
        if matches!(self.state, IncomingState::Advertising | IncomingState::Serving) {
            self.transition(IncomingState::Cancelling);
        }
    }

    /// Local cancellation
    pub fn cancel(&mut self) {
        self.on_closed();
    }

    /// The channel can no longer carry messages; finish without `Done`
    pub fn abandon(&mut self) {
        if self.state != IncomingState::Completed {
            self.transition(IncomingState::Completed);
        }
    }

    /// Next message to send, if any
    ///
    /// Call only with send capacity in hand: the message returned is
    /// already accounted for in the role's state.
    pub fn poll_send<R: Replica + ?Sized>(&mut self, replica: &R) -> Option<Incoming> {
        let msg = match self.state {
            IncomingState::Advertising => match self.unsent.pop_front() {
                Some(site) => Incoming::Advertisement { site },
                None => {
                    self.transition(IncomingState::Serving);
                    Incoming::Ready
                }
            },
            IncomingState::Serving => {
                if let Some(site) = self.unsent.pop_front() {
                    Incoming::Advertisement { site }
                } else if let Some(msg) = self.next_event(replica) {
                    msg
                } else if self.strategy.is_once() && self.initial_drained(replica) {
                    debug!("{} role drained {} initial sites", ROLE, self.initial.len());
                    self.transition(IncomingState::Completed);
                    Incoming::Done
                } else {
                    return None;
                }
            }
            IncomingState::Cancelling => {
                self.transition(IncomingState::Completed);
                Incoming::Done
            }
            IncomingState::Completed => return None,
        };
        self.stats.sent += 1;
        Some(msg)
    }

    fn next_event<R: Replica + ?Sized>(&mut self, replica: &R) -> Option<Incoming> {
        for _ in 0..self.rotation.len() {
            let site = self.rotation.pop_front()?;
            self.rotation.push_back(site);
            let Some(cursor) = self.cursors.get_mut(&site) else {
                continue;
            };
            if let Some((seqno, body)) = cursor.next_event(site, replica) {
                return Some(Incoming::Event { seqno, site, body });
            }
        }
        None
    }

    fn initial_drained<R: Replica + ?Sized>(&mut self, replica: &R) -> bool {
        if !self.initial.is_subset(&self.requested) {
            return false;
        }
        let initial = &self.initial;
        self.cursors
            .iter_mut()
            .filter(|(site, _)| initial.contains(*site))
            .all(|(site, cursor)| cursor.is_drained(*site, replica))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SharedLog;
    use cadence_log::BufferEventLog;

    fn site(n: u32) -> SiteId {
        SiteId::new(n)
    }

    fn request(n: u32, from: u32, count: u64) -> Outgoing {
        Outgoing::Request {
            site: site(n),
            from: SeqNo::new(from),
            count,
        }
    }

    fn body(n: u32, seqno: u32) -> Bytes {
        Bytes::from(format!("{}:{}", n, seqno))
    }

    /// Replica for site 1 holding `events` events of site 1 and 2 of site 2
    fn replica(events: u32) -> SharedLog<BufferEventLog> {
        let replica = SharedLog::with_site(site(1), BufferEventLog::new());
        for seqno in 0..events {
            replica.insert(SeqNo::new(seqno), site(1), body(1, seqno));
        }
        replica.insert(SeqNo::new(0), site(2), body(2, 0));
        replica.insert(SeqNo::new(1), site(2), body(2, 1));
        replica
    }

    fn drain<R: Replica>(role: &mut IncomingRole, replica: &R) -> Vec<Incoming> {
        let mut out = Vec::new();
        while let Some(msg) = role.poll_send(replica) {
            out.push(msg);
        }
        out
    }

    fn event_ids(msgs: &[Incoming]) -> Vec<(u32, u32)> {
        msgs.iter()
            .filter_map(|m| match m {
                Incoming::Event { seqno, site, .. } => Some((site.get(), seqno.get())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_advertises_sites_then_ready() {
        let replica = SharedLog::with_site(site(5), BufferEventLog::new());
        replica.insert(SeqNo::new(0), site(2), Bytes::new());
        let mut role = IncomingRole::new(SyncStrategy::Continuous, &replica);

        assert_eq!(
            drain(&mut role, &replica),
            vec![
                Incoming::Advertisement { site: site(2) },
                Incoming::Advertisement { site: site(5) },
                Incoming::Ready,
            ]
        );
        assert_eq!(role.state(), IncomingState::Serving);
    }

    #[test]
    fn test_streams_round_robin() {
        let replica = replica(3);
        let mut role = IncomingRole::new(SyncStrategy::Continuous, &replica);
        drain(&mut role, &replica);

        role.on_message(request(1, 0, UNBOUNDED));
        role.on_message(request(2, 0, UNBOUNDED));
        let msgs = drain(&mut role, &replica);
        assert_eq!(event_ids(&msgs), vec![(1, 0), (2, 0), (1, 1), (2, 1), (1, 2)]);
        match &msgs[0] {
            Incoming::Event { body: b, .. } => assert_eq!(b, &body(1, 0)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_request_honors_from_and_count() {
        let replica = replica(10);
        let mut role = IncomingRole::new(SyncStrategy::Continuous, &replica);
        drain(&mut role, &replica);

        role.on_message(request(1, 4, 3));
        assert_eq!(event_ids(&drain(&mut role, &replica)), vec![(1, 4), (1, 5), (1, 6)]);

        // A new request replaces the cursor
        role.on_message(request(1, 8, UNBOUNDED));
        assert_eq!(event_ids(&drain(&mut role, &replica)), vec![(1, 8), (1, 9)]);
    }

    #[test]
    fn test_unbounded_cursor_follows_growth() {
        let replica = replica(1);
        let mut role = IncomingRole::new(SyncStrategy::Continuous, &replica);
        drain(&mut role, &replica);
        role.on_message(request(1, 0, UNBOUNDED));
        assert_eq!(event_ids(&drain(&mut role, &replica)), vec![(1, 0)]);

        replica.append(body(1, 1));
        replica.insert(SeqNo::new(0), site(3), Bytes::new());
        role.on_replica_changed(&replica);
        let msgs = drain(&mut role, &replica);
        assert_eq!(msgs[0], Incoming::Advertisement { site: site(3) });
        assert_eq!(event_ids(&msgs), vec![(1, 1)]);
    }

    #[test]
    fn test_once_completes_after_initial_sites_drain() {
        let replica = replica(2);
        let mut role = IncomingRole::new(SyncStrategy::Once, &replica);
        drain(&mut role, &replica);

        role.on_message(request(1, 0, UNBOUNDED));
        assert_eq!(event_ids(&drain(&mut role, &replica)), vec![(1, 0), (1, 1)]);
        // Site 2 was advertised but not requested yet
        assert_eq!(role.state(), IncomingState::Serving);

        role.on_message(request(2, 2, UNBOUNDED));
        assert_eq!(drain(&mut role, &replica), vec![Incoming::Done]);
        assert!(role.is_terminated());
    }

    #[test]
    fn test_once_ignores_new_sites() {
        let replica = SharedLog::with_site(site(1), BufferEventLog::new());
        let mut role = IncomingRole::new(SyncStrategy::Once, &replica);
        drain(&mut role, &replica);
        replica.insert(SeqNo::new(0), site(8), Bytes::new());
        role.on_replica_changed(&replica);
        role.on_message(request(1, 0, UNBOUNDED));
        assert_eq!(drain(&mut role, &replica), vec![Incoming::Done]);
    }

    #[test]
    fn test_relay_with_empty_log_completes_at_once() {
        let replica: SharedLog<BufferEventLog> = SharedLog::default();
        let mut role = IncomingRole::new(SyncStrategy::Once, &replica);
        assert_eq!(drain(&mut role, &replica), vec![Incoming::Ready, Incoming::Done]);
    }

    #[test]
    fn test_early_request_is_kept() {
        let replica = replica(1);
        let mut role = IncomingRole::new(SyncStrategy::Continuous, &replica);
        role.on_message(request(2, 1, UNBOUNDED));
        let msgs = drain(&mut role, &replica);
        assert_eq!(msgs.last(), Some(&Incoming::Event {
            seqno: SeqNo::new(1),
            site: site(2),
            body: body(2, 1),
        }));
        assert!(msgs.contains(&Incoming::Ready));
    }

    #[test]
    fn test_done_in_every_state() {
        let replica = replica(3);

        // While advertising
        let mut role = IncomingRole::new(SyncStrategy::Once, &replica);
        assert!(role.poll_send(&replica).is_some());
        role.on_message(Outgoing::Done);
        assert_eq!(drain(&mut role, &replica), vec![Incoming::Done]);

        // Mid-stream
        let mut role = IncomingRole::new(SyncStrategy::Continuous, &replica);
        drain(&mut role, &replica);
        role.on_message(request(1, 0, UNBOUNDED));
        assert!(role.poll_send(&replica).is_some());
        role.on_message(Outgoing::Done);
        assert_eq!(role.poll_send(&replica), Some(Incoming::Done));
        assert!(role.is_terminated());

        // Requests after Done are ignored
        role.on_message(request(2, 0, UNBOUNDED));
        assert_eq!(role.poll_send(&replica), None);
    }

    #[test]
    fn test_closure() {
        let replica = replica(0);
        let mut role = IncomingRole::new(SyncStrategy::Continuous, &replica);
        role.on_closed();
        assert_eq!(role.state(), IncomingState::Cancelling);
        role.abandon();
        assert!(role.is_terminated());
    }
}
