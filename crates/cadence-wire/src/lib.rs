//! Cadence Wire Protocol - Message encodings
//!
//! This crate implements the encodings of the sync protocol messages:
//! - Message tags (1 byte)
//! - Compact binary bodies (little endian, fixed width)
//! - JSON bodies (serde)
//! - Encoding selection
//! - Length-delimited framing for byte streams

pub mod tag;
pub mod codec;
pub mod json;
pub mod encoding;
pub mod frame;

pub use tag::*;
pub use codec::*;
pub use json::*;
pub use encoding::*;
pub use frame::*;
