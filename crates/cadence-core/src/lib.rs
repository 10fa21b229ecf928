//! Cadence Core - Fundamental types and primitives
//!
//! This crate defines the core types used throughout Cadence:
//! - Causal identifiers (SiteId, SeqNo, EventId)
//! - Protocol messages exchanged between the two sync roles
//! - Payload encoding for application events
//! - Error taxonomy

pub mod id;
pub mod message;
pub mod payload;
pub mod error;

pub use id::*;
pub use message::*;
pub use payload::*;
pub use error::*;
