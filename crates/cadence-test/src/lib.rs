//! Cadence Test Harness - Convergence testing and benchmarks
//!
//! This crate provides:
//! - Sample projections (a commutative counter, an order-sensitive ledger)
//! - A fault-injecting link simulator
//! - A history fuzzer checking revert/replay against a sorted fold
//! - End-to-end sync scenarios

pub mod projections;
pub mod simulator;
pub mod history_fuzzer;
pub mod scenarios;

pub use projections::*;
pub use simulator::*;
pub use history_fuzzer::*;
pub use scenarios::*;
