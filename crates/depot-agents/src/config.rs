//! Configuration for a single worker robot.
//!
//! The [`RobotConfig`] struct bundles every tunable of the robot state
//! machine so that callers (node binary, simulation, tests) can override
//! defaults. The core crate builds it from `depot-config.yaml`.

use depot_types::PackageType;

use crate::battery::MAX_BATTERY;
use crate::error::AgentError;

/// Configuration for one robot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RobotConfig {
    /// Identity used in proposals, awards, and confirmations.
    pub name: String,

    /// The only package kind this robot can handle.
    pub capability: PackageType,

    /// Battery level at start-up (default: 100).
    pub initial_battery: u32,

    /// Below this level the robot stops bidding and charges (default: 20).
    pub low_battery_threshold: u32,

    /// Battery gained per tick while charging (default: 10).
    pub charge_per_tick: u32,

    /// Battery consumed per time unit of job execution (default: 1).
    pub drain_per_unit: u32,

    /// Ticks to wait for an award before giving up the pending bid
    /// (default: 2). 0 disables the timeout.
    pub award_timeout_ticks: u32,
}

impl RobotConfig {
    /// Create a configuration with default battery parameters.
    pub fn new(name: impl Into<String>, capability: PackageType) -> Self {
        Self {
            name: name.into(),
            capability,
            initial_battery: MAX_BATTERY,
            low_battery_threshold: 20,
            charge_per_tick: 10,
            drain_per_unit: 1,
            award_timeout_ticks: 2,
        }
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfig`] when the name is empty, a
    /// battery level exceeds 100, or charging would never progress.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.name.trim().is_empty() {
            return Err(AgentError::InvalidConfig {
                reason: "robot name must not be empty".to_owned(),
            });
        }
        if self.initial_battery > MAX_BATTERY {
            return Err(AgentError::InvalidConfig {
                reason: format!("initial_battery {} exceeds {MAX_BATTERY}", self.initial_battery),
            });
        }
        if self.low_battery_threshold > MAX_BATTERY {
            return Err(AgentError::InvalidConfig {
                reason: format!(
                    "low_battery_threshold {} exceeds {MAX_BATTERY}",
                    self.low_battery_threshold
                ),
            });
        }
        if self.charge_per_tick == 0 {
            return Err(AgentError::InvalidConfig {
                reason: "charge_per_tick must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RobotConfig::new("roboter-1", PackageType::Type1);
        assert_eq!(config.initial_battery, 100);
        assert_eq!(config.low_battery_threshold, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_charge_rate_rejected() {
        let mut config = RobotConfig::new("roboter-1", PackageType::Type1);
        config.charge_per_tick = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn blank_name_rejected() {
        let config = RobotConfig::new("  ", PackageType::Type2);
        assert!(config.validate().is_err());
    }
}
