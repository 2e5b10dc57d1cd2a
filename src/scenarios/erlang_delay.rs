//! Perception delay with an Erlang (higher-order) information delay.
//!
//! A decision maker steers a stock towards a target, but only sees the
//! stock through a chain of first-order lags:
//!
//! ```text
//! flow(t)      = (target - perceived(t-1)) / D
//! stock(t)     = stock(t-1) + flow(t)·dt
//! perceived(t) = Erlang_n(stock)(t),  each stage with τ = D / n
//! ```
//!
//! Acting on stale information makes the loop overshoot the target and
//! oscillate before settling.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domains::ode::{EulerIntegrator, Integrator, OdeSystem};
use crate::engine::clock::TimeGrid;
use crate::engine::jidoka::{JidokaConfig, JidokaGuard};
use crate::error::{SimError, SimResult};

/// Chain of `n` identical first-order stages (an Erlang-n delay).
///
/// Each stage relaxes towards its upstream value with time constant
/// `total_delay / n`; the last stage is the delayed output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErlangDelay {
    stages: Vec<f64>,
    total_delay: f64,
}

/// Stage equations for a fixed input:
/// `ds_0/dt = (input - s_0)/τ`, `ds_k/dt = (s_{k-1} - s_k)/τ`.
struct StageChain {
    input: f64,
    stage_time: f64,
    order: usize,
}

impl OdeSystem for StageChain {
    fn dimension(&self) -> usize {
        self.order
    }

    fn derivatives(&self, _t: f64, y: &[f64], dydt: &mut [f64]) {
        for k in 0..self.order {
            let upstream = if k == 0 { self.input } else { y[k - 1] };
            dydt[k] = (upstream - y[k]) / self.stage_time;
        }
    }
}

impl ErlangDelay {
    /// Create an empty delay (all stages at zero).
    ///
    /// # Errors
    ///
    /// Returns an error if `order` is zero or `total_delay` is not positive.
    pub fn new(order: usize, total_delay: f64) -> SimResult<Self> {
        Self::with_initial(order, total_delay, 0.0)
    }

    /// Create a delay in steady state at `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if `order` is zero or `total_delay` is not positive.
    pub fn with_initial(order: usize, total_delay: f64, value: f64) -> SimResult<Self> {
        if order == 0 {
            return Err(SimError::config("Erlang delay needs at least one stage"));
        }
        if !(total_delay.is_finite() && total_delay > 0.0) {
            return Err(SimError::config(format!(
                "Erlang delay time must be positive, got {total_delay}"
            )));
        }
        Ok(Self {
            stages: vec![value; order],
            total_delay,
        })
    }

    /// Number of stages.
    #[must_use]
    pub fn order(&self) -> usize {
        self.stages.len()
    }

    /// Mean delay of the whole chain.
    #[must_use]
    pub const fn total_delay(&self) -> f64 {
        self.total_delay
    }

    /// Time constant of a single stage.
    #[must_use]
    pub fn stage_time_constant(&self) -> f64 {
        self.total_delay / self.stages.len() as f64
    }

    /// Delayed output (last stage).
    #[must_use]
    pub fn output(&self) -> f64 {
        self.stages.last().copied().unwrap_or(0.0)
    }

    /// Current stage values, upstream first.
    #[must_use]
    pub fn stages(&self) -> &[f64] {
        &self.stages
    }

    /// Set every stage to zero.
    pub fn reset(&mut self) {
        self.stages.iter_mut().for_each(|s| *s = 0.0);
    }

    /// Advance all stages by one Euler step with the given input.
    ///
    /// All stages are updated from their values at the start of the step.
    ///
    /// # Errors
    ///
    /// Returns an error if `dt` is not positive.
    pub fn advance(&mut self, input: f64, dt: f64) -> SimResult<f64> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(SimError::config(format!("Timestep must be positive, got {dt}")));
        }
        let chain = StageChain {
            input,
            stage_time: self.stage_time_constant(),
            order: self.stages.len(),
        };
        EulerIntegrator.step(&chain, 0.0, &mut self.stages, dt)?;
        Ok(self.output())
    }
}

/// Configuration for the perception-delay feedback loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct PerceptionLoopConfig {
    /// Simulated horizon (days); samples are taken on `[0, horizon)`.
    #[validate(range(exclusive_min = 0.0))]
    pub horizon: f64,
    /// Desired stock level (units).
    pub target: f64,
    /// Mean perception delay D (days); also the adjustment time.
    #[validate(range(exclusive_min = 0.0))]
    pub total_delay: f64,
    /// Number of stages in the Erlang chain.
    #[validate(range(min = 1, max = 64))]
    pub order: usize,
    /// Timestep (days).
    #[validate(range(exclusive_min = 0.0))]
    pub dt: f64,
}

impl Default for PerceptionLoopConfig {
    fn default() -> Self {
        Self {
            horizon: 200.0,
            target: 50.0,
            total_delay: 15.0,
            order: 3,
            dt: 1.0,
        }
    }
}

impl PerceptionLoopConfig {
    /// Time constant of each stage.
    #[must_use]
    pub fn stage_time_constant(&self) -> f64 {
        self.total_delay / self.order as f64
    }

    /// Check field ranges and cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns an error on out-of-range fields or when `dt` exceeds the
    /// stage time constant.
    pub fn check(&self) -> SimResult<()> {
        self.validate()?;
        if !self.target.is_finite() {
            return Err(SimError::config("Target must be finite"));
        }
        let stage_time = self.stage_time_constant();
        if self.dt > stage_time {
            return Err(SimError::config(format!(
                "Timestep {} exceeds stage time constant {stage_time}",
                self.dt
            )));
        }
        Ok(())
    }
}

/// One sample of the perception loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErlangRecord {
    /// Time (days).
    pub time: f64,
    /// Actual stock (units).
    pub stock: f64,
    /// Corrective flow applied during this step (units/day).
    pub flow: f64,
    /// Perceived (delayed) stock after this step.
    pub perceived: f64,
    /// Stage values after this step, upstream first.
    pub stages: Vec<f64>,
}

/// Interval between two consecutive samples where the stock crosses the target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionWindow {
    /// Sample time before the crossing.
    pub start: f64,
    /// Sample time after the crossing.
    pub end: f64,
}

/// Summary of a perception-loop run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptionReport {
    /// Target level.
    pub target: f64,
    /// Number of stages.
    pub order: usize,
    /// Time constant of each stage.
    pub stage_time_constant: f64,
    /// Windows where the stock crosses the target (over-corrections).
    pub overcorrections: Vec<CorrectionWindow>,
    /// Highest stock reached.
    pub peak_stock: f64,
    /// Time of the highest stock.
    pub peak_time: f64,
    /// `max(peak_stock - target, 0)`.
    pub overshoot: f64,
    /// Stock at the end of the run.
    pub final_stock: f64,
    /// Perceived stock at the end of the run.
    pub final_perceived: f64,
    /// `final_stock - target`.
    pub final_gap: f64,
}

/// Perception-delay feedback loop scenario.
#[derive(Debug, Clone)]
pub struct PerceptionLoopScenario {
    config: PerceptionLoopConfig,
    jidoka: JidokaConfig,
}

impl PerceptionLoopScenario {
    /// Create a new scenario.
    #[must_use]
    pub fn new(config: PerceptionLoopConfig) -> Self {
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
    pub const fn config(&self) -> &PerceptionLoopConfig {
        &self.config
    }

    /// Run the loop over `[0, horizon)`.
    ///
    /// The first sample is all zeros. Each later step reads the perceived
    /// stock, applies the corrective flow to the stock and then pushes the
    /// new stock into the delay chain.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid configuration or non-finite values.
    pub fn run(&self) -> SimResult<Vec<ErlangRecord>> {
        self.config.check()?;
        let config = &self.config;
        let grid = TimeGrid::arange(0.0, config.horizon, config.dt)?;
        let times = grid.points();

        let mut delay = ErlangDelay::new(config.order, config.total_delay)?;
        let mut guard = JidokaGuard::new(self.jidoka.clone());
        let mut trajectory = Vec::with_capacity(times.len());

        let Some(&t0) = times.first() else {
            return Ok(trajectory);
        };
        let mut stock = 0.0;
        trajectory.push(ErlangRecord {
            time: t0,
            stock,
            flow: 0.0,
            perceived: delay.output(),
            stages: delay.stages().to_vec(),
        });

        for k in 1..times.len() {
            let dt = times[k] - times[k - 1];
            let perceived_before = delay.output();
            let flow = (config.target - perceived_before) / config.total_delay;
            stock += flow * dt;
            let perceived = delay.advance(stock, dt)?;

            guard.check_finite(times[k], &["stock", "flow", "perceived"], &[stock, flow, perceived])?;

            trajectory.push(ErlangRecord {
                time: times[k],
                stock,
                flow,
                perceived,
                stages: delay.stages().to_vec(),
            });
        }

        tracing::debug!(
            samples = trajectory.len(),
            final_stock = stock,
            "perception loop run finished"
        );

        Ok(trajectory)
    }

    /// Summarise a trajectory produced by [`Self::run`].
    ///
    /// # Errors
    ///
    /// Returns an error if the trajectory is empty.
    pub fn report(&self, trajectory: &[ErlangRecord]) -> SimResult<PerceptionReport> {
        let target = self.config.target;
        let last = trajectory
            .last()
            .ok_or_else(|| SimError::config("Cannot report on an empty trajectory"))?;

        let (peak_time, peak_stock) = trajectory
            .iter()
            .fold((last.time, f64::NEG_INFINITY), |(best_t, best), r| {
                if r.stock > best {
                    (r.time, r.stock)
                } else {
                    (best_t, best)
                }
            });

        let stocks: Vec<f64> = trajectory.iter().map(|r| r.stock).collect();
        let overcorrections = target_crossings(&stocks, target)
            .into_iter()
            .map(|c| CorrectionWindow {
                start: trajectory[c].time,
                end: trajectory[c + 1].time,
            })
            .collect();

        Ok(PerceptionReport {
            target,
            order: self.config.order,
            stage_time_constant: self.config.stage_time_constant(),
            overcorrections,
            peak_stock,
            peak_time,
            overshoot: (peak_stock - target).max(0.0),
            final_stock: last.stock,
            final_perceived: last.perceived,
            final_gap: last.stock - target,
        })
    }
}

/// Indices `c` where `sign(values[c] - target)` differs from
/// `sign(values[c + 1] - target)`, with sign taking -1, 0 or 1.
#[must_use]
pub fn target_crossings(values: &[f64], target: f64) -> Vec<usize> {
    let sign = |v: f64| {
        let d = v - target;
        if d > 0.0 {
            1
        } else if d < 0.0 {
            -1
        } else {
            0
        }
    };
    values
        .windows(2)
        .enumerate()
        .filter(|(_, w)| sign(w[0]) != sign(w[1]))
        .map(|(c, _)| c)
        .collect()
}
