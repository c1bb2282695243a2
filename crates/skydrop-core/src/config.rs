//! Dispatch configuration with environment overrides.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::ConfigError;
use crate::grid::Cell;
use crate::obstacle::ReroutePolicy;

/// Tunables for vehicles, the obstacle monitor and the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Altitude vehicles climb to on takeoff (meters)
    pub cruise_altitude_m: f64,
    /// Energy below which a flying vehicle must return home, and at or
    /// below which an idle vehicle is not selected
    pub battery_reserve: f64,
    /// Lower bound of the per-step energy drain
    pub drain_min: f64,
    /// Upper bound of the per-step energy drain
    pub drain_max: f64,
    /// Simulated transit time of one grid step
    pub step_delay_ms: u64,
    /// Chance that a transient obstacle is reported before a step
    pub obstacle_probability: f64,
    /// Pause taken when an obstacle is reported
    pub reroute_delay_ms: u64,
    pub reroute_policy: ReroutePolicy,
    /// Vehicles created by `Dispatcher::new`
    pub fleet_size: u32,
    /// Home cell for vehicles created by `Dispatcher::new`
    pub home: Cell,
    /// Seed for energy drain and obstacle detection. `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Buffered vehicle events per subscriber
    pub event_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            cruise_altitude_m: 10.0,
            battery_reserve: 20.0,
            drain_min: 0.5,
            drain_max: 2.0,
            step_delay_ms: 500,
            obstacle_probability: 0.25,
            reroute_delay_ms: 500,
            reroute_policy: ReroutePolicy::Hold,
            fleet_size: 3,
            home: Cell::new(0, 0),
            seed: None,
            event_capacity: 1024,
        }
    }
}

impl DispatchConfig {
    /// Defaults overlaid with `SKYDROP_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cruise_altitude_m: env_parse("SKYDROP_CRUISE_ALTITUDE_M")
                .unwrap_or(defaults.cruise_altitude_m),
            battery_reserve: env_parse("SKYDROP_BATTERY_RESERVE")
                .unwrap_or(defaults.battery_reserve),
            drain_min: env_parse("SKYDROP_DRAIN_MIN").unwrap_or(defaults.drain_min),
            drain_max: env_parse("SKYDROP_DRAIN_MAX").unwrap_or(defaults.drain_max),
            step_delay_ms: env_parse("SKYDROP_STEP_DELAY_MS").unwrap_or(defaults.step_delay_ms),
            obstacle_probability: env_parse("SKYDROP_OBSTACLE_PROBABILITY")
                .unwrap_or(defaults.obstacle_probability),
            reroute_delay_ms: env_parse("SKYDROP_REROUTE_DELAY_MS")
                .unwrap_or(defaults.reroute_delay_ms),
            reroute_policy: env_parse("SKYDROP_REROUTE_POLICY").unwrap_or(defaults.reroute_policy),
            fleet_size: env_parse("SKYDROP_FLEET_SIZE").unwrap_or(defaults.fleet_size),
            home: defaults.home,
            seed: env_parse("SKYDROP_SEED").or(defaults.seed),
            event_capacity: env_parse("SKYDROP_EVENT_CAPACITY").unwrap_or(defaults.event_capacity),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.obstacle_probability) {
            return Err(ConfigError::ObstacleProbability(self.obstacle_probability));
        }
        let drain_finite = self.drain_min.is_finite() && self.drain_max.is_finite();
        if !(drain_finite && self.drain_min >= 0.0 && self.drain_min <= self.drain_max) {
            return Err(ConfigError::DrainRange {
                min: self.drain_min,
                max: self.drain_max,
            });
        }
        if !(0.0..=100.0).contains(&self.battery_reserve) {
            return Err(ConfigError::BatteryReserve(self.battery_reserve));
        }
        if !(self.cruise_altitude_m.is_finite() && self.cruise_altitude_m >= 0.0) {
            return Err(ConfigError::CruiseAltitude(self.cruise_altitude_m));
        }
        Ok(())
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    pub fn reroute_delay(&self) -> Duration {
        Duration::from_millis(self.reroute_delay_ms)
    }

    /// Zero delays and no obstacles; keeps test runs fast and deterministic.
    pub fn instant(seed: u64) -> Self {
        Self {
            step_delay_ms: 0,
            reroute_delay_ms: 0,
            obstacle_probability: 0.0,
            seed: Some(seed),
            ..Self::default()
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = DispatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.step_delay(), Duration::from_millis(500));
        assert_eq!(config.fleet_size, 3);
    }

    #[test]
    fn validate_rejects_bad_ranges() {
        let config = DispatchConfig {
            obstacle_probability: 1.5,
            ..DispatchConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ObstacleProbability(1.5)));

        let config = DispatchConfig {
            drain_min: 3.0,
            drain_max: 1.0,
            ..DispatchConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::DrainRange { .. })));

        let config = DispatchConfig {
            battery_reserve: -1.0,
            ..DispatchConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::BatteryReserve(-1.0)));
    }

    #[test]
    fn validate_rejects_non_finite_values() {
        let config = DispatchConfig {
            drain_max: f64::INFINITY,
            ..DispatchConfig::instant(1)
        };
        assert!(matches!(config.validate(), Err(ConfigError::DrainRange { .. })));

        let config = DispatchConfig {
            drain_min: f64::NAN,
            ..DispatchConfig::instant(1)
        };
        assert!(matches!(config.validate(), Err(ConfigError::DrainRange { .. })));

        let config = DispatchConfig {
            cruise_altitude_m: f64::INFINITY,
            ..DispatchConfig::instant(1)
        };
        assert!(matches!(config.validate(), Err(ConfigError::CruiseAltitude(_))));

        let config = DispatchConfig {
            battery_reserve: f64::NAN,
            ..DispatchConfig::instant(1)
        };
        assert!(matches!(config.validate(), Err(ConfigError::BatteryReserve(_))));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = DispatchConfig::instant(42);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: DispatchConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.seed, Some(42));
        assert_eq!(parsed.reroute_policy, ReroutePolicy::Hold);
    }
}
