//! Jidoka (自働化) - stop-on-error checks for simulation state.
//!
//! The guard runs after every integration step. It halts the run on the
//! first anomaly instead of letting a bad value propagate through the
//! rest of the trajectory.
//!
//! # Anomaly Types
//!
//! 1. **Non-finite values**: NaN or Inf in any state variable
//! 2. **Non-physical values**: stocks or compartments below zero
//! 3. **Conservation**: total of a closed system drifting from its reference

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{SimError, SimResult};

/// Jidoka configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct JidokaConfig {
    /// NaN/Inf detection enabled.
    #[serde(default = "default_true")]
    pub check_finite: bool,
    /// Reject negative values in quantities that must stay non-negative.
    #[serde(default = "default_true")]
    pub check_non_negative: bool,
    /// Values down to `-negative_tolerance` count as zero.
    #[validate(range(min = 0.0))]
    #[serde(default = "default_negative_tolerance")]
    pub negative_tolerance: f64,
    /// Relative tolerance on conserved totals (`None` disables the check).
    #[validate(range(min = 0.0))]
    #[serde(default = "default_conservation_tolerance")]
    pub conservation_tolerance: Option<f64>,
}

const fn default_true() -> bool {
    true
}

const fn default_negative_tolerance() -> f64 {
    1e-9
}

#[allow(clippy::unnecessary_wraps)]
const fn default_conservation_tolerance() -> Option<f64> {
    Some(1e-6)
}

impl Default for JidokaConfig {
    fn default() -> Self {
        Self {
            check_finite: true,
            check_non_negative: true,
            negative_tolerance: default_negative_tolerance(),
            conservation_tolerance: default_conservation_tolerance(),
        }
    }
}

/// Jidoka guard for autonomous anomaly detection.
///
/// # Example
///
/// ```rust
/// use dynsim::engine::jidoka::{JidokaConfig, JidokaGuard};
///
/// let mut guard = JidokaGuard::new(JidokaConfig::default());
/// assert!(guard.check_finite(0.0, &["stock"], &[12.5]).is_ok());
/// assert!(guard.check_finite(1.0, &["stock"], &[f64::NAN]).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct JidokaGuard {
    config: JidokaConfig,
    /// Reference total for conservation checks, set on first use.
    reference_total: Option<f64>,
    /// Number of checks performed.
    checks: u64,
}

impl JidokaGuard {
    /// Create a new guard.
    #[must_use]
    pub const fn new(config: JidokaConfig) -> Self {
        Self {
            config,
            reference_total: None,
            checks: 0,
        }
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &JidokaConfig {
        &self.config
    }

    /// Number of checks performed so far.
    #[must_use]
    pub const fn checks(&self) -> u64 {
        self.checks
    }

    /// Fix the conserved total explicitly (e.g. the population `N`).
    pub fn set_reference_total(&mut self, total: f64) {
        self.reference_total = Some(total);
    }

    /// Forget the conserved total; the next conservation check records a new one.
    pub fn reset(&mut self) {
        self.reference_total = None;
        self.checks = 0;
    }

    /// Check that every value is finite.
    ///
    /// # Errors
    ///
    /// Returns `NonFiniteValue` naming the first offending label.
    pub fn check_finite(&mut self, time: f64, labels: &[&str], values: &[f64]) -> SimResult<()> {
        self.checks += 1;
        if !self.config.check_finite {
            return Ok(());
        }
        for (i, value) in values.iter().enumerate() {
            if !value.is_finite() {
                return Err(SimError::NonFiniteValue {
                    location: format!("{} at t = {time}", label_for(labels, i)),
                });
            }
        }
        Ok(())
    }

    /// Check finiteness and non-negativity.
    ///
    /// # Errors
    ///
    /// Returns `NonFiniteValue` or `NonPhysicalState` for the first offending value.
    pub fn check_non_negative(
        &mut self,
        time: f64,
        labels: &[&str],
        values: &[f64],
    ) -> SimResult<()> {
        self.check_finite(time, labels, values)?;
        if !self.config.check_non_negative {
            return Ok(());
        }
        for (i, &value) in values.iter().enumerate() {
            if value < -self.config.negative_tolerance {
                return Err(SimError::NonPhysicalState {
                    name: label_for(labels, i),
                    value,
                    time,
                });
            }
        }
        Ok(())
    }

    /// Full check for a closed compartment system: finite, non-negative and
    /// with a conserved total.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn check_conserved(&mut self, time: f64, labels: &[&str], values: &[f64]) -> SimResult<()> {
        self.check_non_negative(time, labels, values)?;

        let Some(tolerance) = self.config.conservation_tolerance else {
            return Ok(());
        };

        let total: f64 = values.iter().sum();
        let reference = *self.reference_total.get_or_insert(total);
        let drift = (total - reference).abs() / reference.abs().max(1.0);

        if drift > tolerance {
            return Err(SimError::ConstraintViolation {
                name: format!("conserved total at t = {time}"),
                violation: drift,
                tolerance,
            });
        }
        Ok(())
    }
}

fn label_for(labels: &[&str], index: usize) -> String {
    labels
        .get(index)
        .map_or_else(|| format!("state[{index}]"), |label| (*label).to_string())
}
