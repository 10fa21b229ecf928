//! Cadence Transport Layer - Links between replicas
//!
//! This crate provides:
//! - In-process duplex channels carrying protocol messages
//! - A bridge running a channel over any ordered byte stream
//!
//! Socket bindings are left to the application: hand an accepted or
//! connected stream to [`bridge`].

pub mod channel;
pub mod bridge;

pub use channel::*;
pub use bridge::*;
