//! Cadence Runtime - Sites and their surroundings
//!
//! This crate composes the lower layers into the objects applications hold:
//! - `Site`: a replica with a local site identifier, a log and a history
//! - `Relay`: a log-only participant forwarding events between sites
//! - `SiteRegistry`: sites keyed by session, created on demand
//! - Configuration from the environment
//! - Telemetry setup for `tracing`

pub mod config;
pub mod telemetry;
pub mod site;
pub mod relay;
pub mod registry;

pub use config::*;
pub use telemetry::*;
pub use site::*;
pub use relay::*;
pub use registry::*;
