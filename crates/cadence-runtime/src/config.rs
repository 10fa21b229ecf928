//! Site configuration

use std::env;
use std::str::FromStr;
use std::time::Duration;

use cadence_core::{CadenceError, CadenceResult};
use cadence_log::LogBacking;
use cadence_sync::{SyncConfig, SyncStrategy};

/// Log backing (`buffer` or `persistent`)
pub const ENV_LOG_BACKING: &str = "CADENCE_LOG_BACKING";
/// Slots in each direction of a link
pub const ENV_CHANNEL_CAPACITY: &str = "CADENCE_CHANNEL_CAPACITY";
/// Default sync strategy (`once` or `continuous`)
pub const ENV_SYNC_STRATEGY: &str = "CADENCE_SYNC_STRATEGY";
/// Sync timeout, e.g. `5s` or `1m 30s`
pub const ENV_SYNC_TIMEOUT: &str = "CADENCE_SYNC_TIMEOUT";

/// Site configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiteConfig {
    /// Storage for the event log
    pub backing: LogBacking,
    /// Slots in each direction of a link
    pub capacity: usize,
    /// Strategy used by [`Site::sync`](crate::Site::sync)
    pub strategy: SyncStrategy,
    /// Upper bound on a sync, if any
    pub timeout: Option<Duration>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        SiteConfig {
            backing: LogBacking::Buffer,
            capacity: 64,
            strategy: SyncStrategy::Once,
            timeout: None,
        }
    }
}

impl SiteConfig {
    /// Long-lived replica: persistent log with cheap snapshots, continuous sync
    pub fn long_lived() -> Self {
        SiteConfig {
            backing: LogBacking::Persistent,
            strategy: SyncStrategy::Continuous,
            ..SiteConfig::default()
        }
    }

    /// Foreground catch-up bounded by `timeout`
    pub fn catch_up(timeout: Duration) -> Self {
        SiteConfig {
            timeout: Some(timeout),
            ..SiteConfig::default()
        }
    }

    /// Defaults overridden by any `CADENCE_*` variable that is set
    pub fn from_env() -> CadenceResult<Self> {
        let mut config = SiteConfig::default();

        if let Some(value) = var(ENV_LOG_BACKING)? {
            config.backing = LogBacking::from_str(&value)?;
        }
        if let Some(value) = var(ENV_CHANNEL_CAPACITY)? {
            config.capacity = value.trim().parse().map_err(|e| {
                CadenceError::InvalidConfig(format!("{}='{}': {}", ENV_CHANNEL_CAPACITY, value, e))
            })?;
        }
        if let Some(value) = var(ENV_SYNC_STRATEGY)? {
            config.strategy = SyncStrategy::from_str(&value)?;
        }
        if let Some(value) = var(ENV_SYNC_TIMEOUT)? {
            let timeout = humantime::parse_duration(value.trim()).map_err(|e| {
                CadenceError::InvalidConfig(format!("{}='{}': {}", ENV_SYNC_TIMEOUT, value, e))
            })?;
            config.timeout = Some(timeout);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CadenceResult<()> {
        if self.capacity == 0 {
            return Err(CadenceError::InvalidConfig(
                "channel capacity must be at least 1".into(),
            ));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(CadenceError::InvalidConfig("sync timeout must be positive".into()));
        }
        Ok(())
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            strategy: self.strategy,
            capacity: self.capacity,
            timeout: self.timeout,
        }
    }
}

fn var(name: &str) -> CadenceResult<Option<String>> {
    match env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(CadenceError::InvalidConfig(format!(
            "{} is not valid unicode",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear() {
        for name in [ENV_LOG_BACKING, ENV_CHANNEL_CAPACITY, ENV_SYNC_STRATEGY, ENV_SYNC_TIMEOUT] {
            env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear();
        assert_eq!(SiteConfig::from_env().unwrap(), SiteConfig::default());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear();
        env::set_var(ENV_LOG_BACKING, "persistent");
        env::set_var(ENV_CHANNEL_CAPACITY, "8");
        env::set_var(ENV_SYNC_STRATEGY, "continuous");
        env::set_var(ENV_SYNC_TIMEOUT, "1m 30s");

        let config = SiteConfig::from_env().unwrap();
        clear();

        assert_eq!(config.backing, LogBacking::Persistent);
        assert_eq!(config.capacity, 8);
        assert_eq!(config.strategy, SyncStrategy::Continuous);
        assert_eq!(config.timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_values() {
        for (name, value) in [
            (ENV_LOG_BACKING, "disk"),
            (ENV_CHANNEL_CAPACITY, "lots"),
            (ENV_CHANNEL_CAPACITY, "0"),
            (ENV_SYNC_STRATEGY, "sometimes"),
            (ENV_SYNC_TIMEOUT, "soon"),
        ] {
            clear();
            env::set_var(name, value);
            let result = SiteConfig::from_env();
            clear();
            assert!(
                matches!(result, Err(CadenceError::InvalidConfig(_))),
                "{}={} accepted",
                name,
                value
            );
        }
    }

    #[test]
    fn test_presets() {
        let config = SiteConfig::long_lived();
        assert_eq!(config.backing, LogBacking::Persistent);
        assert_eq!(config.sync_config().strategy, SyncStrategy::Continuous);

        let config = SiteConfig::catch_up(Duration::from_secs(2));
        assert_eq!(config.sync_config().timeout, Some(Duration::from_secs(2)));
        assert!(config.validate().is_ok());
    }
}
