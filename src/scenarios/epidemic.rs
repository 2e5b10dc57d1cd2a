//! SIR epidemic compartment model.
//!
//! ```text
//! dS/dt = -β S I / N
//! dI/dt =  β S I / N - γ I
//! dR/dt =  γ I
//! ```
//!
//! The system is handed to the adaptive Dormand-Prince solver and sampled on
//! a fixed evaluation grid. The analysis reports the infection peak, the
//! herd immunity crossing and the closed-form peak and final size.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::domains::ode::{DormandPrince, OdeSystem};
use crate::engine::clock::TimeGrid;
use crate::engine::jidoka::{JidokaConfig, JidokaGuard};
use crate::error::{SimError, SimResult};

const COMPARTMENTS: [&str; 3] = ["susceptible", "infected", "recovered"];

/// Configuration for the SIR model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
#[validate(schema(function = "validate_initial_counts"))]
pub struct SIRConfig {
    /// Total population size N.
    #[validate(range(exclusive_min = 0.0))]
    pub population: f64,
    /// Initial number of infected individuals.
    #[validate(range(min = 0.0))]
    pub initial_infected: f64,
    /// Initial number of recovered individuals.
    #[validate(range(min = 0.0))]
    pub initial_recovered: f64,
    /// Transmission rate β (contacts per day × transmission probability).
    #[validate(range(min = 0.0))]
    pub beta: f64,
    /// Recovery rate γ (1 / infectious period).
    #[validate(range(exclusive_min = 0.0))]
    pub gamma: f64,
    /// End of the simulated horizon (days).
    #[validate(range(exclusive_min = 0.0))]
    pub t_end: f64,
    /// Number of evenly spaced evaluation points on `[0, t_end]`.
    #[validate(range(min = 1))]
    pub eval_points: usize,
}

fn validate_initial_counts(config: &SIRConfig) -> Result<(), ValidationError> {
    if config.initial_infected + config.initial_recovered > config.population {
        let mut err = ValidationError::new("initial_counts");
        err.message = Some("initial infected plus recovered exceeds the population".into());
        return Err(err);
    }
    Ok(())
}

impl Default for SIRConfig {
    fn default() -> Self {
        Self {
            population: 1000.0,
            initial_infected: 10.0,
            initial_recovered: 0.0,
            beta: 0.3,  // R0 = 3
            gamma: 0.1, // 10-day infectious period
            t_end: 100.0,
            eval_points: 100,
        }
    }
}

impl SIRConfig {
    /// Basic reproduction number R0 = β/γ.
    #[must_use]
    pub fn r0(&self) -> f64 {
        self.beta / self.gamma
    }

    /// Herd immunity threshold `1 - 1/R0`, zero when R0 ≤ 1.
    #[must_use]
    pub fn herd_immunity_threshold(&self) -> f64 {
        let r0 = self.r0();
        if r0 <= 1.0 {
            0.0
        } else {
            1.0 - 1.0 / r0
        }
    }

    /// Initial susceptible population.
    #[must_use]
    pub fn initial_susceptible(&self) -> f64 {
        self.population - self.initial_infected - self.initial_recovered
    }

    /// Initial state vector `[S, I, R]`.
    #[must_use]
    pub fn initial_state(&self) -> [f64; 3] {
        [
            self.initial_susceptible(),
            self.initial_infected,
            self.initial_recovered,
        ]
    }

    /// Evaluation grid `linspace(0, t_end, eval_points)`.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid horizon.
    pub fn grid(&self) -> SimResult<TimeGrid> {
        TimeGrid::linspace(0.0, self.t_end, self.eval_points)
    }

    /// Check ranges and initial counts.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when a field is out of range or the initial
    /// counts exceed the population.
    pub fn check(&self) -> SimResult<()> {
        self.validate()?;
        Ok(())
    }
}

/// Right-hand side of the SIR equations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SIRModel {
    /// Transmission rate β.
    pub beta: f64,
    /// Recovery rate γ.
    pub gamma: f64,
    /// Population N.
    pub population: f64,
}

impl SIRModel {
    /// Build the model from a configuration.
    #[must_use]
    pub fn from_config(config: &SIRConfig) -> Self {
        Self {
            beta: config.beta,
            gamma: config.gamma,
            population: config.population,
        }
    }
}

impl OdeSystem for SIRModel {
    fn dimension(&self) -> usize {
        3
    }

    #[allow(clippy::many_single_char_names)]
    fn derivatives(&self, _t: f64, y: &[f64], dydt: &mut [f64]) {
        let (s, i) = (y[0], y[1]);
        let infection = self.beta * s * i / self.population;
        let recovery = self.gamma * i;

        dydt[0] = -infection;
        dydt[1] = infection - recovery;
        dydt[2] = recovery;
    }
}

/// State of the SIR model at a sample time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SIRState {
    /// Sample time (days).
    pub time: f64,
    /// Number of susceptible individuals.
    pub susceptible: f64,
    /// Number of infected individuals.
    pub infected: f64,
    /// Number of recovered individuals.
    pub recovered: f64,
    /// Effective reproduction number `R0 · S / N`.
    pub rt: f64,
}

impl SIRState {
    /// Total population.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.susceptible + self.infected + self.recovered
    }

    /// Fewer than one infected individual left.
    #[must_use]
    pub fn is_over(&self) -> bool {
        self.infected < 1.0
    }
}

/// SIR epidemic scenario.
#[derive(Debug, Clone)]
pub struct SIRScenario {
    config: SIRConfig,
    solver: DormandPrince,
    jidoka: JidokaConfig,
}

impl SIRScenario {
    /// Create a new SIR scenario with default solver tolerances.
    #[must_use]
    pub fn new(config: SIRConfig) -> Self {
        Self {
            config,
            solver: DormandPrince::default(),
            jidoka: JidokaConfig::default(),
        }
    }

    /// Replace the ODE solver.
    #[must_use]
    pub fn with_solver(mut self, solver: DormandPrince) -> Self {
        self.solver = solver;
        self
    }

    /// Replace the Jidoka configuration.
    #[must_use]
    pub fn with_jidoka(mut self, jidoka: JidokaConfig) -> Self {
        self.jidoka = jidoka;
        self
    }

    /// Get configuration.
    #[must_use]
    pub const fn config(&self) -> &SIRConfig {
        &self.config
    }

    /// Get solver settings.
    #[must_use]
    pub const fn solver(&self) -> &DormandPrince {
        &self.solver
    }

    /// Solve from the configured initial state over `[0, t_end]`.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid configuration, solver failure or a
    /// Jidoka violation.
    pub fn run(&self) -> SimResult<Vec<SIRState>> {
        self.config.check()?;
        let grid = self.config.grid()?;
        let trajectory =
            self.solve_phase((0.0, self.config.t_end), &self.config.initial_state(), &grid)?;

        if let Some(last) = trajectory.last() {
            tracing::debug!(
                samples = trajectory.len(),
                final_susceptible = last.susceptible,
                final_recovered = last.recovered,
                "SIR run finished"
            );
        }
        Ok(trajectory)
    }

    /// Solve one phase of the epidemic from an arbitrary state.
    ///
    /// Every sample is checked for finiteness, non-negativity and
    /// conservation of the population.
    ///
    /// # Errors
    ///
    /// Returns an error on solver failure or a Jidoka violation.
    pub fn solve_phase(
        &self,
        t_span: (f64, f64),
        y0: &[f64],
        t_eval: &TimeGrid,
    ) -> SimResult<Vec<SIRState>> {
        let model = SIRModel::from_config(&self.config);
        let solution = self.solver.solve(&model, t_span, y0, t_eval)?;
        tracing::trace!(
            steps = solution.steps,
            evaluations = solution.evaluations,
            "SIR phase solved"
        );

        let mut guard = JidokaGuard::new(self.jidoka.clone());
        guard.set_reference_total(self.config.population);

        let r0 = self.config.r0();
        let n = self.config.population;
        let mut trajectory = Vec::with_capacity(solution.len());
        for (&time, y) in solution.t.iter().zip(&solution.y) {
            if let Err(err) = guard.check_conserved(time, &COMPARTMENTS, y) {
                tracing::warn!(time, error = %err, "SIR state rejected");
                return Err(err);
            }
            trajectory.push(SIRState {
                time,
                susceptible: y[0],
                infected: y[1],
                recovered: y[2],
                rt: r0 * y[0] / n,
            });
        }
        Ok(trajectory)
    }

    /// Closed-form infection peak.
    ///
    /// When `S0 > N/R0` the peak is `S0 + I0 - N/R0 + (N/R0)·ln((N/R0)/S0)`;
    /// otherwise infections decline from the start and the peak is `I0`.
    #[must_use]
    pub fn peak_infected(&self) -> f64 {
        analytic_peak(&self.config)
    }

    /// Closed-form final number of recovered individuals.
    #[must_use]
    pub fn final_size(&self) -> f64 {
        analytic_final_size(&self.config)
    }
}

fn analytic_peak(config: &SIRConfig) -> f64 {
    let r0 = config.r0();
    let n = config.population;
    let s0 = config.initial_susceptible();
    let i0 = config.initial_infected;

    if r0 <= 0.0 || s0 <= n / r0 {
        return i0;
    }

    // dI/dt = 0 at S = N/R0
    let s_peak = n / r0;
    s0 + i0 - s_peak + s_peak * (s_peak / s0).ln()
}

/// Largest root of `z = N - S0·exp(-R0 (z - R_init) / N)`.
///
/// Newton from `z = N` decreases monotonically onto the root because the
/// residual is convex and increasing there.
fn analytic_final_size(config: &SIRConfig) -> f64 {
    let r0 = config.r0();
    let n = config.population;
    let s0 = config.initial_susceptible();
    let r_init = config.initial_recovered;

    let mut z = n;
    for _ in 0..100 {
        let decay = (-r0 * (z - r_init) / n).exp();
        let residual = z - n + s0 * decay;
        let slope = 1.0 - r0 * s0 / n * decay;
        if slope <= 0.0 {
            break;
        }
        let delta = residual / slope;
        z -= delta;
        if delta.abs() <= 1e-12 * n {
            break;
        }
    }
    z
}

/// Point where the susceptible fraction first drops below `1 - HIT`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HerdCrossing {
    /// Sample time of the crossing.
    pub time: f64,
    /// Susceptible count at the crossing.
    pub susceptible: f64,
    /// Recovered count at the crossing.
    pub recovered: f64,
}

/// Analysis of an SIR trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpidemicReport {
    /// Basic reproduction number.
    pub r0: f64,
    /// Herd immunity threshold.
    pub herd_immunity_threshold: f64,
    /// Highest sampled infected count.
    pub peak_infected: f64,
    /// Time of the first sampled maximum.
    pub peak_time: f64,
    /// First sample with `S < N (1 - HIT)`; absent when R0 ≤ 1 or never reached.
    pub herd_crossing: Option<HerdCrossing>,
    /// Closed-form peak for the configured initial state.
    pub analytic_peak: f64,
    /// Closed-form final recovered count for the configured initial state.
    pub analytic_final_size: f64,
    /// Last sample of the trajectory.
    pub final_state: SIRState,
}

impl EpidemicReport {
    /// Analyse a trajectory.
    ///
    /// # Errors
    ///
    /// Returns an error if the trajectory is empty.
    pub fn from_trajectory(config: &SIRConfig, trajectory: &[SIRState]) -> SimResult<Self> {
        let final_state = trajectory
            .last()
            .cloned()
            .ok_or_else(|| SimError::config("Cannot analyse an empty SIR trajectory"))?;

        let mut peak = &trajectory[0];
        for state in trajectory {
            if state.infected > peak.infected {
                peak = state;
            }
        }

        let r0 = config.r0();
        let hit = config.herd_immunity_threshold();
        let herd_crossing = if r0 > 1.0 {
            let limit = config.population * (1.0 - hit);
            trajectory
                .iter()
                .find(|s| s.susceptible < limit)
                .map(|s| HerdCrossing {
                    time: s.time,
                    susceptible: s.susceptible,
                    recovered: s.recovered,
                })
        } else {
            None
        };

        Ok(Self {
            r0,
            herd_immunity_threshold: hit,
            peak_infected: peak.infected,
            peak_time: peak.time,
            herd_crossing,
            analytic_peak: analytic_peak(config),
            analytic_final_size: analytic_final_size(config),
            final_state,
        })
    }
}
