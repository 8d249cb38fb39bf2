//! Cycle scheduling settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BridgeConfig {
    /// Pause between the end of one cycle and the start of the next.
    /// Zero restarts the capture tool immediately.
    #[validate(range(max = 3600, message = "Cycle pause must not exceed 3600 seconds"))]
    pub cycle_pause_secs: u64,

    /// Minimum pause after a cycle in which both the capture tool and the
    /// broker connection failed.
    #[validate(range(
        min = 1,
        max = 3600,
        message = "Failure pause must be between 1 and 3600 seconds"
    ))]
    pub failure_pause_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            cycle_pause_secs: 0,
            failure_pause_secs: 5,
        }
    }
}

impl BridgeConfig {
    pub fn cycle_pause(&self) -> Duration {
        Duration::from_secs(self.cycle_pause_secs)
    }

    pub fn failure_pause(&self) -> Duration {
        Duration::from_secs(self.failure_pause_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cycle_pause(), Duration::ZERO);
        assert_eq!(config.failure_pause(), Duration::from_secs(5));
    }

    #[test]
    fn test_zero_failure_pause_rejected() {
        let config = BridgeConfig {
            failure_pause_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
