//! Cadence Sync - Anti-entropy between replicas
//!
//! This crate implements the replication protocol:
//! - `Replica`: the log view both roles of a link work on
//! - Outgoing role: requests and stores the peer's events
//! - Incoming role: advertises sites and streams requested events
//! - `SyncStrategy`: one-shot catch-up or continuous replication
//! - Link drivers and the multi-participant `sync` operation

pub mod strategy;
pub mod replica;
pub mod outgoing;
pub mod incoming;
pub mod driver;
pub mod exchange;

pub use strategy::*;
pub use replica::*;
pub use outgoing::*;
pub use incoming::*;
pub use driver::*;
pub use exchange::*;
