//! Outgoing role: pulls the peer's events into the local replica
//!
//! | State       | Advertisement      | Ready        | Event        | Done / closed |
//! |-------------|--------------------|--------------|--------------|---------------|
//! | Advertising | pending, initial   | → Listening  | violation    | → Cancelling  |
//! | Listening   | pending (Continuous) | violation  | insert       | → Cancelling  |
//! | Cancelling  | dropped            | dropped      | dropped      | -             |
//!
//! While listening the role requests one pending site at a time. While
//! cancelling it sends `Done` and completes.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use tracing::{debug, trace};

use cadence_core::{CadenceError, CadenceResult, Incoming, Outgoing, SiteId, UNBOUNDED};

use crate::{Replica, SyncStrategy};

const ROLE: &str = "outgoing";

/// Outgoing role states
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutgoingState {
    Advertising,
    Listening,
    Cancelling,
    Completed,
}

impl OutgoingState {
    pub fn name(self) -> &'static str {
        match self {
            OutgoingState::Advertising => "advertising",
            OutgoingState::Listening => "listening",
            OutgoingState::Cancelling => "cancelling",
            OutgoingState::Completed => "completed",
        }
    }
}

impl fmt::Display for OutgoingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Traffic counters of one role
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoleStats {
    pub sent: u64,
    pub received: u64,
    /// Events that were new to the local replica
    pub inserted: u64,
}

/// Outgoing role state machine
#[derive(Debug)]
pub struct OutgoingRole {
    state: OutgoingState,
    strategy: SyncStrategy,
    /// Sites waiting for a request, oldest first
    pending: VecDeque<SiteId>,
    /// Sites advertised before `Ready`
    initial: BTreeSet<SiteId>,
    /// Sites with an open request; requests are unbounded, so never repeated
    requested: BTreeSet<SiteId>,
    stats: RoleStats,
}

impl OutgoingRole {
    pub fn new(strategy: SyncStrategy) -> Self {
        OutgoingRole {
            state: OutgoingState::Advertising,
            strategy,
            pending: VecDeque::new(),
            initial: BTreeSet::new(),
            requested: BTreeSet::new(),
            stats: RoleStats::default(),
        }
    }

    pub fn state(&self) -> OutgoingState {
        self.state
    }

    pub fn strategy(&self) -> SyncStrategy {
        self.strategy
    }

    pub fn stats(&self) -> RoleStats {
        self.stats
    }

    /// Sites advertised before `Ready`
    pub fn initial_sites(&self) -> &BTreeSet<SiteId> {
        &self.initial
    }

    pub fn is_terminated(&self) -> bool {
        self.state == OutgoingState::Completed
    }

    fn transition(&mut self, next: OutgoingState) {
        debug!("{} role: {} -> {}", ROLE, self.state, next);
        self.state = next;
    }

    fn violation(&self, message: &'static str) -> CadenceError {
        CadenceError::ProtocolViolation {
            role: ROLE,
            state: self.state.name(),
            message,
        }
    }

    fn enqueue(&mut self, site: SiteId) {
        if self.requested.contains(&site) {
            trace!("{} role: {} already requested", ROLE, site);
            return;
        }
        if !self.pending.contains(&site) {
            self.pending.push_back(site);
        }
    }

    /// Handle one message from the peer
    pub fn on_message<R: Replica + ?Sized>(&mut self, msg: Incoming, replica: &R) -> CadenceResult<()> {
        self.stats.received += 1;
        match (self.state, msg) {
            (OutgoingState::Cancelling | OutgoingState::Completed, msg) => {
                trace!("{} role dropped {} while {}", ROLE, msg.kind(), self.state);
            }
            (_, Incoming::Done) => self.transition(OutgoingState::Cancelling),

            (OutgoingState::Advertising, Incoming::Advertisement { site }) => {
                self.initial.insert(site);
                self.enqueue(site);
            }
            (OutgoingState::Advertising, Incoming::Ready) => {
                self.transition(OutgoingState::Listening);
            }
            (OutgoingState::Advertising, Incoming::Event { .. }) => {
                return Err(self.violation("Event"));
            }

            (OutgoingState::Listening, Incoming::Advertisement { site }) => {
                if self.strategy.is_once() {
                    trace!("{} role ignoring late advertisement of {}", ROLE, site);
                } else {
                    self.enqueue(site);
                }
            }
            (OutgoingState::Listening, Incoming::Ready) => {
                return Err(self.violation("Ready"));
            }
            (OutgoingState::Listening, Incoming::Event { seqno, site, body }) => {
                if replica.insert(seqno, site, body) {
                    self.stats.inserted += 1;
                }
            }
        }
        Ok(())
    }

    /// The peer's channel closed
    pub fn on_closed(&mut self) {
        if matches!(self.state, OutgoingState::Advertising | OutgoingState::Listening) {
            self.transition(OutgoingState::Cancelling);
        }
    }

    /// Local cancellation
    pub fn cancel(&mut self) {
        self.on_closed();
    }

    /// The channel can no longer carry messages; finish without `Done`
    pub fn abandon(&mut self) {
        if self.state != OutgoingState::Completed {
            self.transition(OutgoingState::Completed);
        }
    }

    /// Next message to send, if any
    ///
    /// Call only with send capacity in hand: the message returned is
    /// already accounted for in the role's state.
    pub fn poll_send<R: Replica + ?Sized>(&mut self, replica: &R) -> Option<Outgoing> {
        let msg = match self.state {
            OutgoingState::Listening => {
                let site = self.pending.pop_front()?;
                self.requested.insert(site);
                Outgoing::Request {
                    site,
                    from: replica.expected(site),
                    count: UNBOUNDED,
                }
            }
            OutgoingState::Cancelling => {
                self.transition(OutgoingState::Completed);
                Outgoing::Done
            }
            OutgoingState::Advertising | OutgoingState::Completed => return None,
        };
        self.stats.sent += 1;
        Some(msg)
    }
}
