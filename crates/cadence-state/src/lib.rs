//! Cadence State Engine - Projection of event logs into models
//!
//! This crate implements the history engine:
//! - One-way projections for order-insensitive events
//! - Two-way projections with undo support
//! - Revert/replay reconciliation of out-of-order arrivals
//! - Deterministic convergence regardless of delivery order

pub mod projection;
pub mod history;

pub use projection::*;
pub use history::*;
