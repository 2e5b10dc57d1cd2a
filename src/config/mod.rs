//! Configuration system with YAML schema and validation.
//!
//! Every section is optional; a missing section takes the classic
//! textbook parameters. Validation runs in two passes:
//! - structural ranges via `validator` derive rules
//! - cross-field rules within a section (timestep versus delay)
//!
//! The intervention-versus-horizon rule spans two sections and only binds
//! the vaccination run, so it is checked when that scenario starts.

use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

use crate::domains::ode::DormandPrince;
use crate::engine::jidoka::JidokaConfig;
use crate::error::SimResult;
use crate::scenarios::{
    FirstOrderDelayConfig, PerceptionLoopConfig, SIRConfig, VaccinationConfig,
};

/// Top-level configuration for every scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct DynConfig {
    /// Schema version for forward compatibility.
    #[validate(length(min = 1))]
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// First-order delay stock.
    #[validate(nested)]
    #[serde(default)]
    pub first_order_delay: FirstOrderDelayConfig,

    /// Perception loop with an Erlang delay.
    #[validate(nested)]
    #[serde(default)]
    pub erlang_delay: PerceptionLoopConfig,

    /// SIR epidemic.
    #[validate(nested)]
    #[serde(default)]
    pub sir: SIRConfig,

    /// Vaccination pulse applied to the SIR epidemic.
    #[validate(nested)]
    #[serde(default)]
    pub vaccination: VaccinationConfig,

    /// Adaptive ODE solver settings.
    #[validate(nested)]
    #[serde(default)]
    pub solver: SolverConfig,

    /// Jidoka (stop-on-error) configuration.
    #[validate(nested)]
    #[serde(default)]
    pub jidoka: JidokaConfig,
}

fn default_schema_version() -> String {
    "1.0".to_string()
}

impl Default for DynConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            first_order_delay: FirstOrderDelayConfig::default(),
            erlang_delay: PerceptionLoopConfig::default(),
            sir: SIRConfig::default(),
            vaccination: VaccinationConfig::default(),
            solver: SolverConfig::default(),
            jidoka: JidokaConfig::default(),
        }
    }
}

impl DynConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - YAML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading configuration");
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    ///
    /// # Errors
    ///
    /// Returns error if parsing or validation fails.
    pub fn from_yaml(yaml: &str) -> SimResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.check()?;
        Ok(config)
    }

    /// Create a builder for configuration.
    #[must_use]
    pub fn builder() -> DynConfigBuilder {
        DynConfigBuilder::default()
    }

    /// Run structural and semantic validation.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn check(&self) -> SimResult<()> {
        self.validate()?;
        self.validate_semantic()
    }

    /// Validate cross-field constraints beyond schema.
    fn validate_semantic(&self) -> SimResult<()> {
        self.first_order_delay.check()?;
        self.erlang_delay.check()?;
        self.sir.check()
    }

    /// Adaptive solver built from the `solver` section.
    #[must_use]
    pub fn dormand_prince(&self) -> DormandPrince {
        DormandPrince::from_config(&self.solver)
    }
}

/// Configuration builder for programmatic construction.
#[derive(Debug, Default)]
pub struct DynConfigBuilder {
    first_order_delay: Option<FirstOrderDelayConfig>,
    erlang_delay: Option<PerceptionLoopConfig>,
    sir: Option<SIRConfig>,
    vaccination: Option<VaccinationConfig>,
    solver: Option<SolverConfig>,
    jidoka: Option<JidokaConfig>,
}

impl DynConfigBuilder {
    /// Set the first-order delay section.
    #[must_use]
    pub fn first_order_delay(mut self, config: FirstOrderDelayConfig) -> Self {
        self.first_order_delay = Some(config);
        self
    }

    /// Set the perception loop section.
    #[must_use]
    pub fn erlang_delay(mut self, config: PerceptionLoopConfig) -> Self {
        self.erlang_delay = Some(config);
        self
    }

    /// Set the SIR section.
    #[must_use]
    pub fn sir(mut self, config: SIRConfig) -> Self {
        self.sir = Some(config);
        self
    }

    /// Set the vaccination section.
    #[must_use]
    pub fn vaccination(mut self, config: VaccinationConfig) -> Self {
        self.vaccination = Some(config);
        self
    }

    /// Set solver tolerances.
    #[must_use]
    pub fn solver(mut self, config: SolverConfig) -> Self {
        self.solver = Some(config);
        self
    }

    /// Set Jidoka configuration.
    #[must_use]
    pub fn jidoka(mut self, config: JidokaConfig) -> Self {
        self.jidoka = Some(config);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> DynConfig {
        let defaults = DynConfig::default();
        DynConfig {
            schema_version: defaults.schema_version,
            first_order_delay: self.first_order_delay.unwrap_or(defaults.first_order_delay),
            erlang_delay: self.erlang_delay.unwrap_or(defaults.erlang_delay),
            sir: self.sir.unwrap_or(defaults.sir),
            vaccination: self.vaccination.unwrap_or(defaults.vaccination),
            solver: self.solver.unwrap_or(defaults.solver),
            jidoka: self.jidoka.unwrap_or(defaults.jidoka),
        }
    }
}

/// Adaptive solver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SolverConfig {
    /// Relative tolerance.
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    #[serde(default = "default_rtol")]
    pub rtol: f64,
    /// Absolute tolerance.
    #[validate(range(exclusive_min = 0.0))]
    #[serde(default = "default_atol")]
    pub atol: f64,
    /// Upper bound on the step size (unbounded when absent).
    #[validate(range(exclusive_min = 0.0))]
    #[serde(default)]
    pub max_step: Option<f64>,
    /// Hard limit on attempted steps per solve.
    #[validate(range(min = 1))]
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

const fn default_rtol() -> f64 {
    1e-3
}

const fn default_atol() -> f64 {
    1e-6
}

const fn default_max_steps() -> usize {
    100_000
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            rtol: default_rtol(),
            atol: default_atol(),
            max_step: None,
            max_steps: default_max_steps(),
        }
    }
}
