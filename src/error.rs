//! Error types for body construction, configuration and stepping.

use std::collections::TryReserveError;

use thiserror::Error;

use crate::simulation::BodyId;

/// Errors raised by a single [`Body`](crate::Body).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BodyError {
    #[error("body mass must be positive and finite, got {0}")]
    InvalidMass(f64),

    #[error("body radius must be positive and finite, got {0}")]
    InvalidRadius(f64),

    #[error("body {0} must be finite")]
    NonFinite(&'static str),

    /// Two centres coincide, so the direction and magnitude of gravity are undefined.
    #[error("bodies `{0}` and `{1}` share the same centre")]
    Coincident(String, String),

    /// The inverse-square force overflowed `f64`.
    #[error("force between `{0}` and `{1}` is not finite")]
    ForceOverflow(String, String),
}

/// Invalid [`SimulationConfig`](crate::SimulationConfig) values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors surfaced by [`Simulation`](crate::Simulation).
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Two live bodies sit on the same point while collisions are disabled.
    #[error("degenerate configuration between {first} and {second}: {source}")]
    DegenerateConfiguration {
        first: BodyId,
        second: BodyId,
        #[source]
        source: BodyError,
    },

    #[error("out of memory while cloning simulation: {0}")]
    CloneAllocation(#[from] TryReserveError),
}
