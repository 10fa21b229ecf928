//! Protocol messages
//!
//! One link carries two message families. The incoming role (the side
//! offering its events) sends [`Incoming`] messages; the outgoing role (the
//! side pulling events) answers with [`Outgoing`] messages. Names follow the
//! advertising side's perspective.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{EventId, SeqNo, SiteId};

/// Request count meaning "every event, including future ones"
pub const UNBOUNDED: u64 = u64::MAX;

/// Messages sent by the incoming role
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Incoming {
    /// The sender holds events issued by `site`
    Advertisement { site: SiteId },
    /// Initial advertisements are complete
    Ready,
    /// One event, answering an earlier request
    Event {
        seqno: SeqNo,
        site: SiteId,
        body: Bytes,
    },
    /// The sender is terminating the session
    Done,
}

impl Incoming {
    pub fn event(id: EventId, body: Bytes) -> Self {
        Incoming::Event {
            seqno: id.seqno(),
            site: id.site(),
            body,
        }
    }

    /// Short name, used in logs and protocol errors
    pub fn kind(&self) -> &'static str {
        match self {
            Incoming::Advertisement { .. } => "Advertisement",
            Incoming::Ready => "Ready",
            Incoming::Event { .. } => "Event",
            Incoming::Done => "Done",
        }
    }
}

/// Messages sent by the outgoing role
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Outgoing {
    /// Send at most `count` events of `site`, starting at `from`
    Request { site: SiteId, from: SeqNo, count: u64 },
    /// The sender is terminating the session
    Done,
}

impl Outgoing {
    pub fn request_all(site: SiteId, from: SeqNo) -> Self {
        Outgoing::Request {
            site,
            from,
            count: UNBOUNDED,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Outgoing::Request { .. } => "Request",
            Outgoing::Done => "Done",
        }
    }
}
