//! Simulation time axes.
//!
//! Two constructions cover every scenario:
//! - `arange`: fixed timestep, half-open `[start, stop)`
//! - `linspace`: fixed number of evenly spaced points, both ends included

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Relative slack when counting `arange` points, so that `stop` values
/// that are exact multiples of the step are not included by rounding noise.
const ARANGE_SLACK: f64 = 1e-10;

/// Largest grid either constructor will allocate.
pub const MAX_GRID_POINTS: usize = 10_000_000;

/// Strictly increasing sequence of sample times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeGrid {
    points: Vec<f64>,
}

impl TimeGrid {
    /// Fixed-step grid `start, start + step, ...` strictly below `stop`.
    ///
    /// Points are computed as `start + k * step` rather than by repeated
    /// addition, so long grids do not accumulate rounding error.
    ///
    /// # Errors
    ///
    /// Returns an error if the bounds are not finite, `step` is not
    /// positive, `stop < start` or the grid would exceed [`MAX_GRID_POINTS`].
    pub fn arange(start: f64, stop: f64, step: f64) -> SimResult<Self> {
        check_bounds(start, stop)?;
        if !(step.is_finite() && step > 0.0) {
            return Err(SimError::config(format!(
                "Time step must be positive and finite, got {step}"
            )));
        }

        let span = (stop - start) / step;
        let count = (span - ARANGE_SLACK * span.abs().max(1.0)).ceil().max(0.0);
        if !count.is_finite() || count > MAX_GRID_POINTS as f64 {
            return Err(SimError::config(format!(
                "Time step {step} over [{start}, {stop}) needs more than {MAX_GRID_POINTS} points"
            )));
        }
        let count = count as usize;
        let points = (0..count).map(|k| start + k as f64 * step).collect();

        Ok(Self { points })
    }

    /// `count` evenly spaced points from `start` to `stop` inclusive.
    ///
    /// # Errors
    ///
    /// Returns an error if the bounds are not finite, `stop < start` or
    /// `count` is zero or above [`MAX_GRID_POINTS`].
    pub fn linspace(start: f64, stop: f64, count: usize) -> SimResult<Self> {
        check_bounds(start, stop)?;
        if count == 0 {
            return Err(SimError::config("linspace needs at least one point"));
        }
        if count > MAX_GRID_POINTS {
            return Err(SimError::config(format!(
                "linspace of {count} points exceeds {MAX_GRID_POINTS}"
            )));
        }
        if count == 1 {
            return Ok(Self {
                points: vec![start],
            });
        }

        let step = (stop - start) / (count - 1) as f64;
        let mut points: Vec<f64> = (0..count).map(|k| start + k as f64 * step).collect();
        // Land exactly on the end point
        points[count - 1] = stop;

        Ok(Self { points })
    }

    /// Build a grid from explicit points.
    ///
    /// # Errors
    ///
    /// Returns an error if any point is non-finite or the sequence is not
    /// strictly increasing.
    pub fn from_points(points: Vec<f64>) -> SimResult<Self> {
        if let Some(bad) = points.iter().find(|t| !t.is_finite()) {
            return Err(SimError::config(format!("Non-finite grid point {bad}")));
        }
        if points.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SimError::config("Grid points must be strictly increasing"));
        }
        Ok(Self { points })
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the grid has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All sample times.
    #[must_use]
    pub fn points(&self) -> &[f64] {
        &self.points
    }

    /// First sample time.
    #[must_use]
    pub fn first(&self) -> Option<f64> {
        self.points.first().copied()
    }

    /// Last sample time.
    #[must_use]
    pub fn last(&self) -> Option<f64> {
        self.points.last().copied()
    }

    /// Gap between point `k` and point `k + 1`.
    #[must_use]
    pub fn step(&self, k: usize) -> Option<f64> {
        Some(self.points.get(k + 1)? - self.points.get(k)?)
    }

    /// Index of the point equal to `t` (within a relative 1e-9).
    #[must_use]
    pub fn index_of(&self, t: f64) -> Option<usize> {
        let tol = 1e-9 * t.abs().max(1.0);
        self.points.iter().position(|&p| (p - t).abs() <= tol)
    }

    /// Iterate over sample times.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().copied()
    }
}

fn check_bounds(start: f64, stop: f64) -> SimResult<()> {
    if !(start.is_finite() && stop.is_finite()) {
        return Err(SimError::config(format!(
            "Time bounds must be finite, got [{start}, {stop}]"
        )));
    }
    if stop < start {
        return Err(SimError::config(format!(
            "Time span end {stop} precedes start {start}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arange_daily() {
        let grid = TimeGrid::arange(0.0, 200.0, 1.0).unwrap();
        assert_eq!(grid.len(), 200);
        assert_eq!(grid.first(), Some(0.0));
        assert_eq!(grid.last(), Some(199.0));
    }

    #[test]
    fn test_arange_inclusive_end_via_extra_step() {
        // Equivalent of arange(0, 50 + dt, dt)
        let grid = TimeGrid::arange(0.0, 51.0, 1.0).unwrap();
        assert_eq!(grid.len(), 51);
        assert_eq!(grid.last(), Some(50.0));
    }

    #[test]
    fn test_arange_fractional_step() {
        let grid = TimeGrid::arange(0.0, 1.0, 0.1).unwrap();
        assert_eq!(grid.len(), 10);
        assert!((grid.points()[9] - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_arange_partial_last_step() {
        let grid = TimeGrid::arange(0.0, 10.5, 1.0).unwrap();
        assert_eq!(grid.len(), 11);
        assert_eq!(grid.last(), Some(10.0));
    }

    #[test]
    fn test_arange_empty_span() {
        let grid = TimeGrid::arange(5.0, 5.0, 1.0).unwrap();
        assert!(grid.is_empty());
        assert_eq!(grid.first(), None);
    }

    #[test]
    fn test_arange_rejects_bad_step() {
        assert!(TimeGrid::arange(0.0, 10.0, 0.0).is_err());
        assert!(TimeGrid::arange(0.0, 10.0, -1.0).is_err());
        assert!(TimeGrid::arange(0.0, 10.0, f64::NAN).is_err());
    }

    #[test]
    fn test_arange_rejects_reversed_bounds() {
        assert!(TimeGrid::arange(10.0, 0.0, 1.0).is_err());
        assert!(TimeGrid::arange(0.0, f64::INFINITY, 1.0).is_err());
    }

    #[test]
    fn test_arange_rejects_oversized_grid() {
        let err = TimeGrid::arange(0.0, 51.0, 1e-15).unwrap_err();
        assert!(matches!(err, SimError::Config { .. }));
        assert!(TimeGrid::arange(0.0, f64::MAX, 1e-300).is_err());
    }

    #[test]
    fn test_linspace_includes_ends() {
        let grid = TimeGrid::linspace(0.0, 100.0, 100).unwrap();
        assert_eq!(grid.len(), 100);
        assert_eq!(grid.first(), Some(0.0));
        assert_eq!(grid.last(), Some(100.0));
        let step = grid.step(0).unwrap();
        assert!((step - 100.0 / 99.0).abs() < 1e-12);
    }

    #[test]
    fn test_linspace_unit_steps() {
        let grid = TimeGrid::linspace(0.0, 30.0, 31).unwrap();
        assert_eq!(grid.index_of(30.0), Some(30));
        assert_eq!(grid.index_of(12.0), Some(12));
        assert_eq!(grid.index_of(12.5), None);
    }

    #[test]
    fn test_linspace_single_point() {
        let grid = TimeGrid::linspace(3.0, 9.0, 1).unwrap();
        assert_eq!(grid.points(), &[3.0]);
        assert_eq!(grid.step(0), None);
    }

    #[test]
    fn test_linspace_zero_points() {
        assert!(TimeGrid::linspace(0.0, 1.0, 0).is_err());
    }

    #[test]
    fn test_linspace_rejects_oversized_grid() {
        assert!(TimeGrid::linspace(0.0, 1.0, MAX_GRID_POINTS + 1).is_err());
    }

    #[test]
    fn test_from_points_validation() {
        assert!(TimeGrid::from_points(vec![0.0, 1.0, 2.5]).is_ok());
        assert!(TimeGrid::from_points(vec![0.0, 1.0, 1.0]).is_err());
        assert!(TimeGrid::from_points(vec![0.0, f64::NAN]).is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// arange points are strictly increasing, start at `start` and stay below `stop`.
        #[test]
        fn prop_arange_bounds(
            start in -1e3f64..1e3,
            span in 0.0f64..1e3,
            step in 0.01f64..10.0,
        ) {
            let stop = start + span;
            let grid = TimeGrid::arange(start, stop, step).unwrap();
            if let Some(first) = grid.first() {
                prop_assert!((first - start).abs() < 1e-12);
            }
            for w in grid.points().windows(2) {
                prop_assert!(w[1] > w[0]);
            }
            for &t in grid.points() {
                prop_assert!(t < stop + 1e-9 * stop.abs().max(1.0));
            }
        }

        /// linspace always yields exactly `count` points spanning the interval.
        #[test]
        fn prop_linspace_count(
            start in -1e3f64..1e3,
            span in 1e-3f64..1e3,
            count in 2usize..500,
        ) {
            let grid = TimeGrid::linspace(start, start + span, count).unwrap();
            prop_assert_eq!(grid.len(), count);
            prop_assert_eq!(grid.first(), Some(start));
            prop_assert_eq!(grid.last(), Some(start + span));
        }
    }
}
