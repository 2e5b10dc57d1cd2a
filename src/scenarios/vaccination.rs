//! SIR epidemic with a one-off vaccination pulse.
//!
//! The epidemic runs undisturbed up to the intervention day, a fraction of
//! the remaining susceptibles is moved straight to the recovered
//! compartment, and the solver restarts from the modified state. The
//! intervention time is sampled twice: once before and once after the
//! pulse.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::epidemic::{EpidemicReport, SIRConfig, SIRScenario, SIRState};
use crate::domains::ode::DormandPrince;
use crate::engine::clock::TimeGrid;
use crate::engine::jidoka::JidokaConfig;
use crate::error::{SimError, SimResult};

/// Vaccination intervention parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct VaccinationConfig {
    /// Day of the vaccination pulse.
    #[validate(range(exclusive_min = 0.0))]
    pub intervention_time: f64,
    /// Fraction of susceptibles vaccinated at the pulse.
    #[validate(range(min = 0.0, max = 1.0))]
    pub coverage: f64,
    /// Evaluation points on `[0, intervention_time]`.
    #[validate(range(min = 2))]
    pub phase_one_points: usize,
    /// Evaluation points on `[intervention_time, t_end]`.
    #[validate(range(min = 2))]
    pub phase_two_points: usize,
}

impl Default for VaccinationConfig {
    fn default() -> Self {
        Self {
            intervention_time: 30.0,
            coverage: 0.5,
            phase_one_points: 31,
            phase_two_points: 70,
        }
    }
}

/// Result of a vaccination run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaccinationRun {
    /// Both phases concatenated.
    pub trajectory: Vec<SIRState>,
    /// Individuals moved from S to R at the pulse.
    pub vaccinated: f64,
    /// Index of the first post-intervention sample in `trajectory`.
    pub intervention_index: usize,
}

impl VaccinationRun {
    /// State just before the pulse.
    #[must_use]
    pub fn before_intervention(&self) -> Option<&SIRState> {
        self.intervention_index
            .checked_sub(1)
            .and_then(|i| self.trajectory.get(i))
    }

    /// State just after the pulse.
    #[must_use]
    pub fn after_intervention(&self) -> Option<&SIRState> {
        self.trajectory.get(self.intervention_index)
    }
}

/// Analysis of a vaccination run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaccinationReport {
    /// Epidemic analysis over the combined trajectory.
    pub epidemic: EpidemicReport,
    /// Day of the pulse.
    pub intervention_time: f64,
    /// Fraction of susceptibles vaccinated.
    pub coverage: f64,
    /// Individuals vaccinated.
    pub vaccinated: f64,
    /// Infected count at the pulse.
    pub infected_at_intervention: f64,
    /// Highest infected count after the pulse.
    pub peak_after_intervention: f64,
    /// Recovered through infection by the end (`R_end - R_0 - vaccinated`).
    pub infected_total: f64,
}

/// Two-phase SIR run with a vaccination pulse.
#[derive(Debug, Clone)]
pub struct VaccinationScenario {
    sir: SIRScenario,
    config: VaccinationConfig,
}

impl VaccinationScenario {
    /// Create a new scenario.
    #[must_use]
    pub fn new(sir: SIRConfig, config: VaccinationConfig) -> Self {
        Self {
            sir: SIRScenario::new(sir),
            config,
        }
    }

    /// Replace the ODE solver used for both phases.
    #[must_use]
    pub fn with_solver(mut self, solver: DormandPrince) -> Self {
        self.sir = self.sir.with_solver(solver);
        self
    }

    /// Replace the Jidoka configuration.
    #[must_use]
    pub fn with_jidoka(mut self, jidoka: JidokaConfig) -> Self {
        self.sir = self.sir.with_jidoka(jidoka);
        self
    }

    /// Intervention settings.
    #[must_use]
    pub const fn config(&self) -> &VaccinationConfig {
        &self.config
    }

    /// Underlying epidemic settings.
    #[must_use]
    pub const fn sir_config(&self) -> &SIRConfig {
        self.sir.config()
    }

    /// Check intervention settings against the epidemic horizon.
    ///
    /// # Errors
    ///
    /// Returns an error for out-of-range settings or an intervention
    /// outside `(0, t_end)`.
    pub fn check(&self) -> SimResult<()> {
        self.sir.config().check()?;
        self.config.validate()?;
        let t_end = self.sir.config().t_end;
        if self.config.intervention_time >= t_end {
            return Err(SimError::config(format!(
                "Intervention at day {} is outside the horizon [0, {t_end}]",
                self.config.intervention_time
            )));
        }
        Ok(())
    }

    /// Run both phases.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid settings, solver failure or a Jidoka
    /// violation in either phase.
    pub fn run(&self) -> SimResult<VaccinationRun> {
        self.check()?;
        let sir = self.sir.config();
        let t_switch = self.config.intervention_time;

        let grid_one = TimeGrid::linspace(0.0, t_switch, self.config.phase_one_points)?;
        let mut trajectory =
            self.sir
                .solve_phase((0.0, t_switch), &sir.initial_state(), &grid_one)?;

        let before = trajectory
            .last()
            .cloned()
            .ok_or_else(|| SimError::solver("phase one produced no samples"))?;
        let vaccinated = self.config.coverage * before.susceptible;
        let pulsed = [
            before.susceptible - vaccinated,
            before.infected,
            before.recovered + vaccinated,
        ];
        tracing::debug!(
            time = t_switch,
            vaccinated,
            infected = before.infected,
            "vaccination pulse applied"
        );

        let grid_two = TimeGrid::linspace(t_switch, sir.t_end, self.config.phase_two_points)?;
        let phase_two = self.sir.solve_phase((t_switch, sir.t_end), &pulsed, &grid_two)?;

        let intervention_index = trajectory.len();
        trajectory.extend(phase_two);

        Ok(VaccinationRun {
            trajectory,
            vaccinated,
            intervention_index,
        })
    }

    /// Summarise a run.
    ///
    /// # Errors
    ///
    /// Returns an error if the run has no samples after the pulse.
    pub fn report(&self, run: &VaccinationRun) -> SimResult<VaccinationReport> {
        let epidemic = EpidemicReport::from_trajectory(self.sir.config(), &run.trajectory)?;
        let after = run
            .after_intervention()
            .ok_or_else(|| SimError::config("Vaccination run has no post-intervention samples"))?;

        let peak_after_intervention = run.trajectory[run.intervention_index..]
            .iter()
            .map(|s| s.infected)
            .fold(f64::NEG_INFINITY, f64::max);
        let infected_total = epidemic.final_state.recovered
            - self.sir.config().initial_recovered
            - run.vaccinated;

        Ok(VaccinationReport {
            intervention_time: self.config.intervention_time,
            coverage: self.config.coverage,
            vaccinated: run.vaccinated,
            infected_at_intervention: after.infected,
            peak_after_intervention,
            infected_total,
            epidemic,
        })
    }
}
