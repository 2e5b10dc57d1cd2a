//! First-order delay stock.
//!
//! A single stock drained at rate `stock / τ` and fed by an inflow that
//! steps from one constant to another at a given time:
//!
//! ```text
//! dS/dt = inflow(t) - S/τ
//! ```
//!
//! Each constant inflow has the equilibrium `S* = inflow × τ`, approached
//! exponentially with time constant τ. The model is marched with explicit
//! Euler on a fixed grid, exactly as the difference equation is stated.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domains::ode::{integrate_fixed, EulerIntegrator, OdeSystem};
use crate::engine::clock::TimeGrid;
use crate::engine::jidoka::{JidokaConfig, JidokaGuard};
use crate::error::{SimError, SimResult};

/// Share of a step adjustment completed after one time constant (1 - e^-1).
pub const ONE_TAU_FRACTION: f64 = 0.632;

/// Share of a step adjustment completed after three time constants.
pub const THREE_TAU_FRACTION: f64 = 0.95;

/// Configuration for the first-order delay model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct FirstOrderDelayConfig {
    /// Timestep (days).
    #[validate(range(exclusive_min = 0.0))]
    pub dt: f64,
    /// Simulated horizon (days); the last sample is at `total_time`.
    #[validate(range(exclusive_min = 0.0))]
    pub total_time: f64,
    /// Average residence time τ (days).
    #[validate(range(exclusive_min = 0.0))]
    pub delay: f64,
    /// Stock at t = 0 (units).
    #[validate(range(min = 0.0))]
    pub initial_stock: f64,
    /// Inflow before the change (units/day).
    #[validate(range(min = 0.0))]
    pub initial_inflow: f64,
    /// Inflow from the change onwards (units/day).
    #[validate(range(min = 0.0))]
    pub changed_inflow: f64,
    /// Time of the inflow step (days).
    #[validate(range(min = 0.0))]
    pub change_time: f64,
}

impl Default for FirstOrderDelayConfig {
    fn default() -> Self {
        Self {
            dt: 1.0,
            total_time: 50.0,
            delay: 5.0,
            initial_stock: 0.0,
            initial_inflow: 10.0,
            changed_inflow: 20.0,
            change_time: 25.0,
        }
    }
}

impl FirstOrderDelayConfig {
    /// Check field ranges and cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns an error on out-of-range fields or when `dt > delay`, where
    /// the Euler update overshoots the equilibrium and oscillates.
    pub fn check(&self) -> SimResult<()> {
        self.validate()?;
        if self.dt > self.delay {
            return Err(SimError::config(format!(
                "Timestep {} exceeds delay {}; Euler update would overshoot",
                self.dt, self.delay
            )));
        }
        Ok(())
    }

    /// Inflow in effect at time `t`.
    #[must_use]
    pub fn inflow_at(&self, t: f64) -> f64 {
        if t < self.change_time {
            self.initial_inflow
        } else {
            self.changed_inflow
        }
    }

    /// Equilibrium stock for the inflow before the change.
    #[must_use]
    pub fn initial_equilibrium(&self) -> f64 {
        self.initial_inflow * self.delay
    }

    /// Equilibrium stock for the inflow after the change.
    #[must_use]
    pub fn final_equilibrium(&self) -> f64 {
        self.changed_inflow * self.delay
    }

    /// Equilibrium in effect at time `t`.
    #[must_use]
    pub fn equilibrium_at(&self, t: f64) -> f64 {
        self.inflow_at(t) * self.delay
    }

    /// Closed-form stock for the first phase: `E + (S0 - E)·e^{-t/τ}`.
    #[must_use]
    pub fn analytic_first_phase(&self, t: f64) -> f64 {
        let eq = self.initial_equilibrium();
        eq + (self.initial_stock - eq) * (-t / self.delay).exp()
    }

    fn grid(&self) -> SimResult<TimeGrid> {
        TimeGrid::arange(0.0, self.total_time + self.dt, self.dt)
    }
}

/// Right-hand side `inflow(t) - S/τ`.
struct DelayedStock<'a> {
    config: &'a FirstOrderDelayConfig,
}

impl OdeSystem for DelayedStock<'_> {
    fn dimension(&self) -> usize {
        1
    }

    fn derivatives(&self, t: f64, y: &[f64], dydt: &mut [f64]) {
        dydt[0] = self.config.inflow_at(t) - y[0] / self.config.delay;
    }
}

/// One sample of the delay model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayRecord {
    /// Time (days).
    pub time: f64,
    /// Inflow (units/day).
    pub inflow: f64,
    /// Outflow `stock / τ` (units/day).
    pub outflow: f64,
    /// Stock (units).
    pub stock: f64,
}

/// Summary of a delay run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayReport {
    /// Delay τ (days).
    pub delay: f64,
    /// Timestep (days).
    pub dt: f64,
    /// `initial_inflow × τ`.
    pub initial_equilibrium: f64,
    /// `changed_inflow × τ`.
    pub final_equilibrium: f64,
    /// Stock at the last sample before the inflow change.
    pub stock_before_change: Option<f64>,
    /// Stock at the first sample at or after the inflow change.
    pub stock_at_change: Option<f64>,
    /// Stock at the end of the run.
    pub final_stock: f64,
    /// Inflow at the end of the run.
    pub final_inflow: f64,
    /// Outflow at the end of the run.
    pub final_outflow: f64,
    /// `|inflow - outflow|` at the end of the run.
    pub final_flow_imbalance: f64,
    /// `final_stock - final_equilibrium`.
    pub final_gap: f64,
    /// Time to complete 63.2% of a step adjustment (τ).
    pub time_to_63_percent: f64,
    /// Time to complete 95% of a step adjustment (≈3τ).
    pub time_to_95_percent: f64,
    /// Largest `|stock - analytic|` over the first phase (`t ≤ change_time`).
    pub max_first_phase_error: f64,
    /// `stock - equilibrium(t)` for every sample.
    pub gaps: Vec<f64>,
}

/// First-order delay scenario.
#[derive(Debug, Clone)]
pub struct FirstOrderDelayScenario {
    config: FirstOrderDelayConfig,
    jidoka: JidokaConfig,
}

impl FirstOrderDelayScenario {
    /// Create a new scenario.
    #[must_use]
    pub fn new(config: FirstOrderDelayConfig) -> Self {
        Self {
            config,
            jidoka: JidokaConfig::default(),
        }
    }

    /// Replace the Jidoka configuration.
    #[must_use]
    pub fn with_jidoka(mut self, jidoka: JidokaConfig) -> Self {
        self.jidoka = jidoka;
        self
    }

    /// Get configuration.
    #[must_use]
    pub const fn config(&self) -> &FirstOrderDelayConfig {
        &self.config
    }

    /// Run the model over `[0, total_time]`.
    ///
    /// For each sample `i`: inflow from the step function, outflow
    /// `stock[i] / τ`, then `stock[i+1] = stock[i] + (inflow - outflow)·dt`.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid configuration or if the stock becomes
    /// non-finite or negative.
    pub fn run(&self) -> SimResult<Vec<DelayRecord>> {
        self.config.check()?;
        let grid = self.grid_checked()?;

        let system = DelayedStock {
            config: &self.config,
        };
        let solution = integrate_fixed(&EulerIntegrator, &system, &grid, &[self.config.initial_stock])?;

        let mut guard = JidokaGuard::new(self.jidoka.clone());
        let mut trajectory = Vec::with_capacity(solution.len());
        for (&time, state) in solution.t.iter().zip(&solution.y) {
            let stock = state[0];
            guard.check_non_negative(time, &["stock"], &[stock])?;
            trajectory.push(DelayRecord {
                time,
                inflow: self.config.inflow_at(time),
                outflow: stock / self.config.delay,
                stock,
            });
        }

        tracing::debug!(
            samples = trajectory.len(),
            final_stock = trajectory.last().map_or(f64::NAN, |r| r.stock),
            "first-order delay run finished"
        );

        Ok(trajectory)
    }

    /// Summarise a trajectory produced by [`Self::run`].
    ///
    /// # Errors
    ///
    /// Returns an error if the trajectory is empty.
    pub fn report(&self, trajectory: &[DelayRecord]) -> SimResult<DelayReport> {
        let config = &self.config;
        let last = trajectory
            .last()
            .ok_or_else(|| SimError::config("Cannot report on an empty trajectory"))?;

        let stock_before_change = trajectory
            .iter()
            .take_while(|r| r.time < config.change_time)
            .last()
            .map(|r| r.stock);
        let stock_at_change = trajectory
            .iter()
            .find(|r| r.time >= config.change_time)
            .map(|r| r.stock);

        let max_first_phase_error = trajectory
            .iter()
            .filter(|r| r.time <= config.change_time)
            .map(|r| (r.stock - config.analytic_first_phase(r.time)).abs())
            .fold(0.0, f64::max);

        let gaps = trajectory
            .iter()
            .map(|r| r.stock - config.equilibrium_at(r.time))
            .collect();

        Ok(DelayReport {
            delay: config.delay,
            dt: config.dt,
            initial_equilibrium: config.initial_equilibrium(),
            final_equilibrium: config.final_equilibrium(),
            stock_before_change,
            stock_at_change,
            final_stock: last.stock,
            final_inflow: last.inflow,
            final_outflow: last.outflow,
            final_flow_imbalance: (last.inflow - last.outflow).abs(),
            final_gap: last.stock - config.final_equilibrium(),
            time_to_63_percent: config.delay,
            time_to_95_percent: 3.0 * config.delay,
            max_first_phase_error,
            gaps,
        })
    }

    fn grid_checked(&self) -> SimResult<TimeGrid> {
        let grid = self.config.grid()?;
        if grid.is_empty() {
            return Err(SimError::config("Delay model horizon yields no samples"));
        }
        Ok(grid)
    }
}
