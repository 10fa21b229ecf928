//! Cadence Event Log - Storage of causally identified events
//!
//! This crate implements the event log shared by every site:
//! - The `EventLog` contract (append, insert, queries)
//! - Sorted index search (binary, with a linear cross-check)
//! - Gap buffer backing, tuned for appends near one cursor
//! - Persistent AVL backing, tuned for cheap coexisting snapshots

pub mod search;
pub mod gap;
pub mod tree;
pub mod log;
pub mod buffered;
pub mod persistent;

pub use search::*;
pub use gap::*;
pub use tree::*;
pub use log::*;
pub use buffered::*;
pub use persistent::*;
