//! Sync strategies

use std::fmt;
use std::str::FromStr;

use cadence_core::CadenceError;

/// When a link ends on its own
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SyncStrategy {
    /// Stop once the sites advertised before `Ready` are drained
    #[default]
    Once,
    /// Keep replicating until the peer leaves or the link is cancelled
    Continuous,
}

impl SyncStrategy {
    pub fn is_once(self) -> bool {
        self == SyncStrategy::Once
    }
}

impl fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStrategy::Once => write!(f, "once"),
            SyncStrategy::Continuous => write!(f, "continuous"),
        }
    }
}

impl FromStr for SyncStrategy {
    type Err = CadenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "once" => Ok(SyncStrategy::Once),
            "continuous" => Ok(SyncStrategy::Continuous),
            other => Err(CadenceError::InvalidConfig(format!(
                "unknown sync strategy '{}' (expected once or continuous)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parse() {
        assert_eq!("once".parse::<SyncStrategy>().unwrap(), SyncStrategy::Once);
        assert_eq!(" Continuous ".parse::<SyncStrategy>().unwrap(), SyncStrategy::Continuous);
        assert!("forever".parse::<SyncStrategy>().is_err());
        assert_eq!(SyncStrategy::default().to_string(), "once");
    }
}
