//! Error types for dynsim.
//!
//! Every fallible operation returns `Result<T, SimError>`; nothing in the
//! library panics on bad parameters or numerical blow-up.

use thiserror::Error;

/// Result type alias for dynsim operations.
pub type SimResult<T> = Result<T, SimError>;

/// Unified error type for all dynsim operations.
#[derive(Debug, Error)]
pub enum SimError {
    // ===== Jidoka Violations =====
    /// Numerical instability detected (NaN or Inf).
    #[error("Jidoka: non-finite value detected at {location}")]
    NonFiniteValue {
        /// Location where the non-finite value was detected.
        location: String,
    },

    /// A quantity that must stay non-negative went below zero.
    #[error("Jidoka: non-physical state, {name} = {value:.6e} at t = {time}")]
    NonPhysicalState {
        /// Name of the offending state variable.
        name: String,
        /// Offending value.
        value: f64,
        /// Simulation time of the violation.
        time: f64,
    },

    /// Constraint violation detected.
    #[error("Jidoka: constraint '{name}' violated by {violation:.6e} (tolerance: {tolerance:.6e})")]
    ConstraintViolation {
        /// Name of the violated constraint.
        name: String,
        /// Amount of violation.
        violation: f64,
        /// Configured tolerance.
        tolerance: f64,
    },

    // ===== Configuration Errors =====
    /// Invalid configuration parameter.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    // ===== Solver Errors =====
    /// ODE solver failed to make progress.
    #[error("Solver error: {0}")]
    Solver(String),

    // ===== I/O Errors =====
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SimError {
    /// Create a configuration error with a message.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a solver error.
    #[must_use]
    pub fn solver(message: impl Into<String>) -> Self {
        Self::Solver(message.into())
    }

    /// Check if this error is a Jidoka violation (requires immediate stop).
    #[must_use]
    pub const fn is_jidoka_violation(&self) -> bool {
        matches!(
            self,
            Self::NonFiniteValue { .. }
                | Self::NonPhysicalState { .. }
                | Self::ConstraintViolation { .. }
        )
    }
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
