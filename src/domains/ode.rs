//! Ordinary differential equation integration.
//!
//! Implements the integrators the scenarios need:
//! - Euler (1st order, fixed step)
//! - RK4 (4th order, fixed step)
//! - Dormand-Prince RK5(4) (adaptive step, sampled at requested times)
//!
//! Models only describe their right-hand side through [`OdeSystem`];
//! stepping, error control and output sampling live here.

use serde::{Deserialize, Serialize};

use crate::config::SolverConfig;
use crate::engine::clock::TimeGrid;
use crate::error::{SimError, SimResult};

/// Right-hand side of `dy/dt = f(t, y)`.
pub trait OdeSystem {
    /// Number of state variables.
    fn dimension(&self) -> usize;

    /// Write `f(t, y)` into `dydt`.
    ///
    /// Both slices have length [`OdeSystem::dimension`].
    fn derivatives(&self, t: f64, y: &[f64], dydt: &mut [f64]);
}

/// Fixed-step numerical integrator.
pub trait Integrator {
    /// Advance `y` from `t` to `t + dt` in place.
    ///
    /// # Errors
    ///
    /// Returns error if the state length does not match the system dimension.
    fn step(&self, system: &dyn OdeSystem, t: f64, y: &mut [f64], dt: f64) -> SimResult<()>;

    /// Global error order of this integrator.
    fn error_order(&self) -> u32;

    /// Right-hand side evaluations per step.
    fn stages(&self) -> usize;

    /// Short display name.
    fn name(&self) -> &'static str;
}

/// Explicit (forward) Euler integrator.
///
/// `y_{n+1} = y_n + h * f(t_n, y_n)`
///
/// First order. This is the scheme the stock-flow models are defined
/// with, so it is used there on purpose rather than as an approximation.
#[derive(Debug, Clone, Copy, Default)]
pub struct EulerIntegrator;

impl EulerIntegrator {
    /// Create a new Euler integrator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Integrator for EulerIntegrator {
    fn step(&self, system: &dyn OdeSystem, t: f64, y: &mut [f64], dt: f64) -> SimResult<()> {
        check_dimension(system, y.len())?;
        let mut dydt = vec![0.0; y.len()];
        system.derivatives(t, y, &mut dydt);
        for (yi, di) in y.iter_mut().zip(&dydt) {
            *yi += dt * di;
        }
        Ok(())
    }

    fn error_order(&self) -> u32 {
        1
    }

    fn stages(&self) -> usize {
        1
    }

    fn name(&self) -> &'static str {
        "euler"
    }
}

/// Classical Runge-Kutta 4th order integrator.
///
/// ```text
/// k1 = f(t, y)
/// k2 = f(t + h/2, y + h/2 * k1)
/// k3 = f(t + h/2, y + h/2 * k2)
/// k4 = f(t + h,   y + h * k3)
/// y_{n+1} = y_n + h/6 * (k1 + 2*k2 + 2*k3 + k4)
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct RK4Integrator;

impl RK4Integrator {
    /// Create a new RK4 integrator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Integrator for RK4Integrator {
    fn step(&self, system: &dyn OdeSystem, t: f64, y: &mut [f64], dt: f64) -> SimResult<()> {
        let n = y.len();
        check_dimension(system, n)?;
        let half_dt = dt / 2.0;

        let mut k1 = vec![0.0; n];
        let mut k2 = vec![0.0; n];
        let mut k3 = vec![0.0; n];
        let mut k4 = vec![0.0; n];
        let mut tmp = vec![0.0; n];

        system.derivatives(t, y, &mut k1);

        for i in 0..n {
            tmp[i] = y[i] + half_dt * k1[i];
        }
        system.derivatives(t + half_dt, &tmp, &mut k2);

        for i in 0..n {
            tmp[i] = y[i] + half_dt * k2[i];
        }
        system.derivatives(t + half_dt, &tmp, &mut k3);

        for i in 0..n {
            tmp[i] = y[i] + dt * k3[i];
        }
        system.derivatives(t + dt, &tmp, &mut k4);

        for i in 0..n {
            y[i] += dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
        }
        Ok(())
    }

    fn error_order(&self) -> u32 {
        4
    }

    fn stages(&self) -> usize {
        4
    }

    fn name(&self) -> &'static str {
        "rk4"
    }
}

/// Sampled solution of an initial value problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdeSolution {
    /// Sample times.
    pub t: Vec<f64>,
    /// State at each sample time (`y[k]` belongs to `t[k]`).
    pub y: Vec<Vec<f64>>,
    /// Right-hand side evaluations performed.
    pub evaluations: usize,
    /// Accepted integration steps.
    pub steps: usize,
}

impl OdeSolution {
    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.t.len()
    }

    /// Whether there are no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Time series of state component `index`.
    #[must_use]
    pub fn component(&self, index: usize) -> Vec<f64> {
        self.y
            .iter()
            .map(|state| state.get(index).copied().unwrap_or(f64::NAN))
            .collect()
    }

    /// Final state, if any.
    #[must_use]
    pub fn last_state(&self) -> Option<&[f64]> {
        self.y.last().map(Vec::as_slice)
    }
}

/// March a system over a fixed grid, one integrator step per grid gap.
///
/// The first sample is `y0` at the first grid point.
///
/// # Errors
///
/// Returns an error if the grid is empty or the state dimension is wrong.
pub fn integrate_fixed(
    integrator: &dyn Integrator,
    system: &dyn OdeSystem,
    grid: &TimeGrid,
    y0: &[f64],
) -> SimResult<OdeSolution> {
    check_dimension(system, y0.len())?;
    if grid.is_empty() {
        return Err(SimError::config("Cannot integrate over an empty time grid"));
    }

    let mut y = y0.to_vec();
    let mut states = Vec::with_capacity(grid.len());
    states.push(y.clone());

    let points = grid.points();
    for k in 0..points.len() - 1 {
        let dt = points[k + 1] - points[k];
        integrator.step(system, points[k], &mut y, dt)?;
        states.push(y.clone());
    }

    let steps = points.len() - 1;
    Ok(OdeSolution {
        t: points.to_vec(),
        y: states,
        evaluations: steps * integrator.stages(),
        steps,
    })
}

// Dormand-Prince 5(4) tableau
const C: [f64; 6] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0];
const A: [[f64; 5]; 6] = [
    [0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0],
    [
        19372.0 / 6561.0,
        -25360.0 / 2187.0,
        64448.0 / 6561.0,
        -212.0 / 729.0,
        0.0,
    ],
    [
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
    ],
];
const B: [f64; 6] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
];
/// Difference between the 5th and embedded 4th order weights (7 stages, FSAL).
const E: [f64; 7] = [
    -71.0 / 57600.0,
    0.0,
    71.0 / 16695.0,
    -71.0 / 1920.0,
    17253.0 / 339_200.0,
    -22.0 / 525.0,
    1.0 / 40.0,
];

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;
/// Exponent for step-size control: 1 / (embedded order + 1).
const ERROR_EXPONENT: f64 = -1.0 / 5.0;

/// Adaptive Dormand-Prince RK5(4) solver.
///
/// Local error is kept below `atol + rtol * |y|` per component (RMS norm).
/// Output is produced only at the requested evaluation times, using cubic
/// Hermite interpolation inside each accepted step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DormandPrince {
    /// Relative tolerance.
    pub rtol: f64,
    /// Absolute tolerance.
    pub atol: f64,
    /// Upper bound on the step size.
    pub max_step: f64,
    /// Hard limit on attempted steps.
    pub max_steps: usize,
}

impl Default for DormandPrince {
    fn default() -> Self {
        Self {
            rtol: 1e-3,
            atol: 1e-6,
            max_step: f64::INFINITY,
            max_steps: 100_000,
        }
    }
}

impl DormandPrince {
    /// Create a solver with the given tolerances.
    #[must_use]
    pub fn new(rtol: f64, atol: f64) -> Self {
        Self {
            rtol,
            atol,
            ..Self::default()
        }
    }

    /// Create a solver from configuration.
    #[must_use]
    pub fn from_config(config: &SolverConfig) -> Self {
        Self {
            rtol: config.rtol,
            atol: config.atol,
            max_step: config.max_step.unwrap_or(f64::INFINITY),
            max_steps: config.max_steps,
        }
    }

    /// Solve `dy/dt = f(t, y)` on `t_span` and sample at `t_eval`.
    ///
    /// # Errors
    ///
    /// Returns `Config` for a bad span, tolerances or evaluation points,
    /// and `Solver` if the step size underflows or `max_steps` is hit.
    pub fn solve(
        &self,
        system: &dyn OdeSystem,
        t_span: (f64, f64),
        y0: &[f64],
        t_eval: &TimeGrid,
    ) -> SimResult<OdeSolution> {
        let (t0, t1) = t_span;
        let n = y0.len();
        check_dimension(system, n)?;
        self.check_settings(t0, t1, t_eval)?;

        let mut samples_t = Vec::with_capacity(t_eval.len());
        let mut samples_y = Vec::with_capacity(t_eval.len());
        let eval = t_eval.points();
        let mut next_eval = 0;

        // Evaluation points sitting on the initial time
        while next_eval < eval.len() && eval[next_eval] <= t0 {
            samples_t.push(eval[next_eval]);
            samples_y.push(y0.to_vec());
            next_eval += 1;
        }

        let mut t = t0;
        let mut y = y0.to_vec();
        let mut f = vec![0.0; n];
        system.derivatives(t, &y, &mut f);
        let mut evaluations = 1;

        let mut h = self.initial_step(system, t0, t1, &y, &f, &mut evaluations);
        let mut steps = 0;
        let mut attempts = 0;

        let mut k = vec![vec![0.0; n]; 7];
        let mut y_stage = vec![0.0; n];
        let mut y_new = vec![0.0; n];

        while t < t1 {
            let min_step = 10.0 * (t.abs() * f64::EPSILON).max(f64::MIN_POSITIVE);
            let mut step_rejected = false;

            // Attempt steps until one is accepted
            let (t_new, f_new) = loop {
                attempts += 1;
                if attempts > self.max_steps {
                    return Err(SimError::solver(format!(
                        "exceeded {} steps at t = {t}",
                        self.max_steps
                    )));
                }
                if h < min_step {
                    return Err(SimError::solver(format!(
                        "step size {h:e} underflow at t = {t}"
                    )));
                }

                h = h.min(self.max_step);
                let mut t_new = t + h;
                if t_new >= t1 {
                    t_new = t1;
                }
                let h_step = t_new - t;

                k[0].copy_from_slice(&f);
                for s in 1..6 {
                    for i in 0..n {
                        let acc: f64 = (0..s).map(|j| A[s][j] * k[j][i]).sum();
                        y_stage[i] = y[i] + h_step * acc;
                    }
                    system.derivatives(t + C[s] * h_step, &y_stage, &mut k[s]);
                }
                for i in 0..n {
                    let acc: f64 = (0..6).map(|j| B[j] * k[j][i]).sum();
                    y_new[i] = y[i] + h_step * acc;
                }
                system.derivatives(t_new, &y_new, &mut k[6]);
                evaluations += 6;

                let error_norm = self.error_norm(&k, &y, &y_new, h_step);

                if error_norm < 1.0 {
                    let mut factor = if error_norm == 0.0 {
                        MAX_FACTOR
                    } else {
                        (SAFETY * error_norm.powf(ERROR_EXPONENT)).min(MAX_FACTOR)
                    };
                    if step_rejected {
                        factor = factor.min(1.0);
                    }
                    h = h_step * factor;
                    break (t_new, k[6].clone());
                }

                h = h_step * (SAFETY * error_norm.powf(ERROR_EXPONENT)).max(MIN_FACTOR);
                step_rejected = true;
            };

            // Sample requested times inside (t, t_new]
            while next_eval < eval.len() && eval[next_eval] <= t_new {
                let te = eval[next_eval];
                samples_t.push(te);
                samples_y.push(hermite(t, &y, &f, t_new, &y_new, &f_new, te));
                next_eval += 1;
            }

            t = t_new;
            y.copy_from_slice(&y_new);
            f = f_new;
            steps += 1;
        }

        // Points within rounding slack past t1
        while next_eval < eval.len() {
            samples_t.push(eval[next_eval]);
            samples_y.push(y.clone());
            next_eval += 1;
        }

        tracing::trace!(steps, evaluations, "dormand-prince solve finished");

        Ok(OdeSolution {
            t: samples_t,
            y: samples_y,
            evaluations,
            steps,
        })
    }

    fn check_settings(&self, t0: f64, t1: f64, t_eval: &TimeGrid) -> SimResult<()> {
        if !(t0.is_finite() && t1.is_finite()) || t1 <= t0 {
            return Err(SimError::config(format!(
                "Invalid integration span [{t0}, {t1}]"
            )));
        }
        if !(self.rtol > 0.0 && self.atol > 0.0) {
            return Err(SimError::config(format!(
                "Tolerances must be positive (rtol = {}, atol = {})",
                self.rtol, self.atol
            )));
        }
        if self.max_step <= 0.0 || self.max_step.is_nan() {
            return Err(SimError::config("max_step must be positive"));
        }
        let slack = 1e-12 * t1.abs().max(1.0);
        if let (Some(first), Some(last)) = (t_eval.first(), t_eval.last()) {
            if first < t0 - slack || last > t1 + slack {
                return Err(SimError::config(format!(
                    "Evaluation times [{first}, {last}] outside span [{t0}, {t1}]"
                )));
            }
        }
        Ok(())
    }

    /// Starting step from the size of `y0` and `f(t0, y0)` (Hairer, Nørsett & Wanner).
    fn initial_step(
        &self,
        system: &dyn OdeSystem,
        t0: f64,
        t1: f64,
        y0: &[f64],
        f0: &[f64],
        evaluations: &mut usize,
    ) -> f64 {
        let scale: Vec<f64> = y0.iter().map(|v| self.atol + v.abs() * self.rtol).collect();
        let d0 = rms_scaled(y0, &scale);
        let d1 = rms_scaled(f0, &scale);

        let h0 = if d0 < 1e-5 || d1 < 1e-5 {
            1e-6
        } else {
            0.01 * d0 / d1
        };
        let h0 = h0.min(t1 - t0);

        let y1: Vec<f64> = y0.iter().zip(f0).map(|(y, f)| y + h0 * f).collect();
        let mut f1 = vec![0.0; y0.len()];
        system.derivatives(t0 + h0, &y1, &mut f1);
        *evaluations += 1;

        let diff: Vec<f64> = f1.iter().zip(f0).map(|(a, b)| a - b).collect();
        let d2 = rms_scaled(&diff, &scale) / h0;

        let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / d1.max(d2)).powf(1.0 / 5.0)
        };

        (100.0 * h0).min(h1).min(self.max_step)
    }

    fn error_norm(&self, k: &[Vec<f64>], y: &[f64], y_new: &[f64], h: f64) -> f64 {
        let n = y.len();
        if n == 0 {
            return 0.0;
        }
        let sum: f64 = (0..n)
            .map(|i| {
                let err: f64 = h * (0..7).map(|j| E[j] * k[j][i]).sum::<f64>();
                let scale = self.atol + y[i].abs().max(y_new[i].abs()) * self.rtol;
                (err / scale).powi(2)
            })
            .sum();
        (sum / n as f64).sqrt()
    }
}

/// Cubic Hermite interpolation between two accepted states.
fn hermite(t0: f64, y0: &[f64], f0: &[f64], t1: f64, y1: &[f64], f1: &[f64], t: f64) -> Vec<f64> {
    let h = t1 - t0;
    if h <= 0.0 {
        return y1.to_vec();
    }
    let s = (t - t0) / h;
    let s2 = s * s;
    let s3 = s2 * s;
    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;

    (0..y0.len())
        .map(|i| h00 * y0[i] + h10 * h * f0[i] + h01 * y1[i] + h11 * h * f1[i])
        .collect()
}

fn rms_scaled(values: &[f64], scale: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: f64 = values
        .iter()
        .zip(scale)
        .map(|(v, s)| (v / s).powi(2))
        .sum();
    (sum / values.len() as f64).sqrt()
}

fn check_dimension(system: &dyn OdeSystem, len: usize) -> SimResult<()> {
    if system.dimension() == len {
        Ok(())
    } else {
        Err(SimError::config(format!(
            "State has {len} components, system expects {}",
            system.dimension()
        )))
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    struct Linear {
        rate: f64,
    }

    impl OdeSystem for Linear {
        fn dimension(&self) -> usize {
            1
        }

        fn derivatives(&self, _t: f64, y: &[f64], dydt: &mut [f64]) {
            dydt[0] = self.rate * y[0];
        }
    }

    proptest! {
        /// Adaptive solution of y' = a*y stays within a loose bound of e^{a t}.
        #[test]
        fn prop_dopri_exponential(
            rate in -1.0f64..0.5,
            y0 in 0.1f64..100.0,
        ) {
            let system = Linear { rate };
            let grid = TimeGrid::linspace(0.0, 5.0, 6).unwrap();
            let solution = DormandPrince::new(1e-6, 1e-9)
                .solve(&system, (0.0, 5.0), &[y0], &grid)
                .unwrap();
            for (t, y) in solution.t.iter().zip(&solution.y) {
                let exact = y0 * (rate * t).exp();
                prop_assert!((y[0] - exact).abs() <= 1e-4 * exact.abs().max(1.0));
            }
        }

        /// Euler on y' = -y/tau with dt <= tau never changes sign.
        #[test]
        fn prop_euler_decay_monotone(
            tau in 1.0f64..50.0,
            ratio in 0.01f64..1.0,
        ) {
            let system = Linear { rate: -1.0 / tau };
            let dt = tau * ratio;
            let grid = TimeGrid::arange(0.0, 20.0 * dt, dt).unwrap();
            let solution = integrate_fixed(&EulerIntegrator, &system, &grid, &[1.0]).unwrap();
            let series = solution.component(0);
            for w in series.windows(2) {
                prop_assert!(w[1] <= w[0]);
                prop_assert!(w[1] >= -1e-12);
            }
        }
    }
}
