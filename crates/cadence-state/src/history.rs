//! History: an event log folded into a model
//!
//! The model always equals the fold of every acknowledged event in
//! ascending [`EventId`] order. Events that arrive below the tip of the
//! history are reconciled by reverting the events above them, applying the
//! newcomer, then replaying the reverted events on top.

use bytes::Bytes;
use tracing::{debug, warn};

use cadence_core::{CadenceError, CadenceResult, EventId, Payload, SeqNo, SiteId};
use cadence_log::{EventLog, PersistentEventLog};

use crate::TwoWayProjection;

/// Outcome of handing one event to the history
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushResult {
    /// Applied at the tip
    Applied,
    /// Applied below the tip; `reverted` events were undone and replayed
    Reordered { reverted: usize },
    /// Already part of the history
    Duplicate,
    /// Stored in the log, but the body does not decode
    Skipped,
}

/// Counters for a batch of insertions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub applied: u64,
    pub reordered: u64,
    pub reverted: u64,
    pub duplicates: u64,
    pub skipped: u64,
}

impl HistoryStats {
    pub fn record(&mut self, result: PushResult) {
        match result {
            PushResult::Applied => self.applied += 1,
            PushResult::Reordered { reverted } => {
                self.reordered += 1;
                self.reverted += reverted as u64;
            }
            PushResult::Duplicate => self.duplicates += 1,
            PushResult::Skipped => self.skipped += 1,
        }
    }
}

struct Applied<E, C> {
    id: EventId,
    event: E,
    change: C,
}

/// Versioned model built from an event log
pub struct History<P: TwoWayProjection, L: EventLog = PersistentEventLog> {
    projection: P,
    model: P::Model,
    log: L,
    /// Applied events in ascending id order
    applied: Vec<Applied<P::Event, P::Change>>,
    version: u64,
    stats: HistoryStats,
}

impl<P: TwoWayProjection, L: EventLog + Default> History<P, L> {
    /// Empty history over an empty log
    pub fn new(projection: P, initial: P::Model) -> Self {
        History::with_log(projection, initial, L::default())
    }
}

impl<P: TwoWayProjection, L: EventLog> History<P, L> {
    /// History over an existing log; every stored event is folded in
    pub fn with_log(projection: P, initial: P::Model, log: L) -> Self {
        let mut history = History {
            projection,
            model: initial,
            log,
            applied: Vec::new(),
            version: 0,
            stats: HistoryStats::default(),
        };
        for (id, body) in history.log.entries() {
            let result = history.fold(id, &body);
            history.stats.record(result);
        }
        history
    }

    /// Record a new local event authored by `site`
    pub fn append(&mut self, site: SiteId, event: P::Event) -> CadenceResult<EventId> {
        if site.is_reserved() {
            return Err(CadenceError::ReservedSite(site));
        }
        let id = self.log.append(site, event.encode());
        if !id.is_specified() {
            return Err(CadenceError::SequenceExhausted(site));
        }
        let result = self.push(id, event);
        self.stats.record(result);
        Ok(id)
    }

    /// Store a replicated event and fold it into the model
    ///
    /// Returns false when the log already holds the event. A body that does
    /// not decode is kept in the log for relaying but never reaches the model.
    pub fn insert(&mut self, seqno: SeqNo, site: SiteId, body: Bytes) -> bool {
        if !self.log.insert(seqno, site, body.clone()) {
            self.stats.record(PushResult::Duplicate);
            return false;
        }
        let result = self.fold(EventId::new(seqno, site), &body);
        self.stats.record(result);
        true
    }

    /// Insert every event of a batch
    pub fn insert_all<I>(&mut self, events: I) -> HistoryStats
    where
        I: IntoIterator<Item = (EventId, Bytes)>,
    {
        let before = self.stats;
        for (id, body) in events {
            self.insert(id.seqno(), id.site(), body);
        }
        HistoryStats {
            applied: self.stats.applied - before.applied,
            reordered: self.stats.reordered - before.reordered,
            reverted: self.stats.reverted - before.reverted,
            duplicates: self.stats.duplicates - before.duplicates,
            skipped: self.stats.skipped - before.skipped,
        }
    }

    fn fold(&mut self, id: EventId, body: &[u8]) -> PushResult {
        match P::Event::decode(body) {
            Ok(event) => self.push(id, event),
            Err(e) => {
                warn!(
                    "Skipping undecodable event {} ({} bytes): {}",
                    id,
                    body.len(),
                    e
                );
                PushResult::Skipped
            }
        }
    }

    /// Apply a decoded event to the model
    ///
    /// Does not touch the log, so callers store the event first. Pushing an
    /// id that is already applied is a no-op.
    fn push(&mut self, id: EventId, event: P::Event) -> PushResult {
        let pos = self.applied.partition_point(|a| a.id < id);
        if self.applied.get(pos).map_or(false, |a| a.id == id) {
            return PushResult::Duplicate;
        }

        if P::COMMUTATIVE || pos == self.applied.len() {
            let change = self.projection.forward(&mut self.model, id, &event);
            self.applied.insert(pos, Applied { id, event, change });
            self.version += 1;
            return PushResult::Applied;
        }

        // Revert everything above the insertion point, newest first
        let suffix = self.applied.split_off(pos);
        let reverted = suffix.len();
        let mut undone = Vec::with_capacity(reverted);
        for a in suffix.into_iter().rev() {
            self.projection
                .backward(&mut self.model, a.id, &a.event, a.change);
            undone.push((a.id, a.event));
        }

        let change = self.projection.forward(&mut self.model, id, &event);
        self.applied.push(Applied { id, event, change });

        for (id, event) in undone.into_iter().rev() {
            let change = self.projection.forward(&mut self.model, id, &event);
            self.applied.push(Applied { id, event, change });
        }

        debug!("Reordered event {} below {} later events", id, reverted);
        self.version += 1;
        PushResult::Reordered { reverted }
    }

    pub fn model(&self) -> &P::Model {
        &self.model
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// Incremented on every change to the model
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of events folded into the model
    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }

    /// Identifiers folded into the model, ascending
    pub fn applied(&self) -> Vec<EventId> {
        self.applied.iter().map(|a| a.id).collect()
    }

    /// Events stored but never applied because their body did not decode
    pub fn skipped(&self) -> u64 {
        self.stats.skipped
    }

    pub fn stats(&self) -> HistoryStats {
        self.stats
    }

    pub fn into_parts(self) -> (P::Model, L) {
        (self.model, self.log)
    }
}

impl<P, L> std::fmt::Debug for History<P, L>
where
    P: TwoWayProjection,
    P::Model: std::fmt::Debug,
    L: EventLog,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("History")
            .field("model", &self.model)
            .field("version", &self.version)
            .field("events", &self.applied.len())
            .finish()
    }
}
