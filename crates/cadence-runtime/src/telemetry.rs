//! Telemetry setup
//!
//! Installs a global `tracing` subscriber. `RUST_LOG` wins over the
//! configured filter when it is set.

use std::env;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cadence_core::{CadenceError, CadenceResult};

/// Log output format (`text` or `json`)
pub const ENV_LOG_FORMAT: &str = "CADENCE_LOG_FORMAT";

/// Telemetry configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Emit one JSON document per event instead of human-readable lines
    pub json: bool,
    /// Filter directives used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        TelemetryConfig {
            json: false,
            filter: "cadence=info".into(),
        }
    }
}

impl TelemetryConfig {
    /// Verbose output for debugging sync sessions
    pub fn debug() -> Self {
        TelemetryConfig {
            filter: "cadence=debug".into(),
            ..TelemetryConfig::default()
        }
    }

    /// JSON output for log shippers
    pub fn production() -> Self {
        TelemetryConfig {
            json: true,
            ..TelemetryConfig::default()
        }
    }

    pub fn from_env() -> CadenceResult<Self> {
        let mut config = TelemetryConfig::default();
        match env::var(ENV_LOG_FORMAT).as_deref().map(str::trim) {
            Ok("json") => config.json = true,
            Ok("text") | Ok("") | Err(_) => {}
            Ok(other) => {
                return Err(CadenceError::InvalidConfig(format!(
                    "{}='{}' (expected text or json)",
                    ENV_LOG_FORMAT, other
                )))
            }
        }
        Ok(config)
    }

    fn env_filter(&self) -> CadenceResult<EnvFilter> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.filter)
                .map_err(|e| CadenceError::InvalidConfig(format!("log filter '{}': {}", self.filter, e))),
        }
    }
}

/// Install the global subscriber
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry(config: &TelemetryConfig) -> CadenceResult<()> {
    let filter = config.env_filter()?;
    let json = config.json.then(|| fmt::layer().json().with_target(true));
    let text = (!config.json).then(|| fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .try_init()
        .map_err(|e| CadenceError::InvalidConfig(format!("telemetry already initialized: {}", e)))
}
