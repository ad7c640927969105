//! Engine configuration and physical constants.
//!
//! [`SimulationConfig`] is handed to [`Simulation::new`](crate::Simulation::new)
//! once; there is no process-wide state. Values can be built in code or read
//! from TOML, where any missing key falls back to [`SimulationConfig::default`]:
//!
//! ```toml
//! gravitational_constant = 6.6743e-11
//! timestep = 86400.0
//! collisions_enabled = true
//! seconds_per_tick = 86400.0
//! parallel_forces = false
//! ```

use serde::Deserialize;

use crate::error::ConfigError;

/// Newtonian gravitational constant in m³/(kg·s²).
pub const GRAVITATIONAL_CONSTANT: f64 = 6.6743e-11;

/// One astronomical unit in metres.
pub const AU: f64 = 1.495_978_707e11;

/// Seconds in one day; the day counter advances once per tick.
pub const DAY: f64 = 86_400.0;

/// Trail length used by the scenario helpers.
pub const DEFAULT_TRAIL_RESOLUTION: usize = 1_000;

/// Global engine parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// G used by every pairwise attraction.
    pub gravitational_constant: f64,
    /// Fixed integration step in seconds.
    pub timestep: f64,
    /// Merge overlapping bodies. When off, overlapping bodies keep attracting.
    pub collisions_enabled: bool,
    /// Simulated seconds represented by one tick; read by the host to pace frames.
    pub seconds_per_tick: f64,
    /// Compute the force phase on the rayon pool.
    pub parallel_forces: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            gravitational_constant: GRAVITATIONAL_CONSTANT,
            timestep: DAY,
            collisions_enabled: true,
            seconds_per_tick: DAY,
            parallel_forces: false,
        }
    }
}

impl SimulationConfig {
    /// Parses a TOML document and validates the result.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = self.gravitational_constant;
        if !(g.is_finite() && g >= 0.0) {
            return Err(ConfigError::OutOfRange {
                name: "gravitational_constant",
                value: g,
                expected: "non-negative and finite",
            });
        }
        check_positive("timestep", self.timestep)?;
        check_positive("seconds_per_tick", self.seconds_per_tick)
    }
}

pub(crate) fn check_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            expected: "positive and finite",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.collisions_enabled);
        assert_eq!(config.timestep, DAY);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = SimulationConfig::from_toml_str("collisions_enabled = false\ntimestep = 3600.0\n").unwrap();
        assert!(!config.collisions_enabled);
        assert_eq!(config.timestep, 3600.0);
        assert_eq!(config.gravitational_constant, GRAVITATIONAL_CONSTANT);
        assert_eq!(config.seconds_per_tick, DAY);
    }

    #[test]
    fn rejects_bad_timestep() {
        let err = SimulationConfig::from_toml_str("timestep = -1.0").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { name: "timestep", .. }));
    }

    #[test]
    fn rejects_negative_g() {
        let config = SimulationConfig {
            gravitational_constant: -1.0,
            ..SimulationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = SimulationConfig::from_toml_str("timestep = \"fast\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
