//! End-to-end checks of every scenario against closed-form results.

use dynsim::prelude::*;
use dynsim::scenarios::{EpidemicReport, SIRModel};

#[test]
fn delay_stock_matches_hand_recurrence() {
    // S_{n+1} = 0.8 S_n + inflow_n with τ = 5, dt = 1
    let scenario = FirstOrderDelayScenario::new(FirstOrderDelayConfig::default());
    let trajectory = scenario.run().unwrap();

    let mut expected = 0.0_f64;
    for (n, record) in trajectory.iter().enumerate() {
        assert!(
            (record.stock - expected).abs() < 1e-9,
            "day {n}: {} vs {expected}",
            record.stock
        );
        let inflow = if n < 25 { 10.0 } else { 20.0 };
        expected = 0.8 * expected + inflow;
    }

    let day_24 = 50.0 * (1.0 - 0.8_f64.powi(24));
    assert!((trajectory[24].stock - day_24).abs() < 1e-9);
}

#[test]
fn delay_reaches_both_equilibria() {
    let scenario = FirstOrderDelayScenario::new(FirstOrderDelayConfig::default());
    let trajectory = scenario.run().unwrap();
    let report = scenario.report(&trajectory).unwrap();

    assert!((report.initial_equilibrium - 50.0).abs() < f64::EPSILON);
    assert!((report.final_equilibrium - 100.0).abs() < f64::EPSILON);
    assert!(report.stock_before_change.unwrap() > 49.0);
    assert!(report.final_gap.abs() < 0.5);
    assert!((report.max_first_phase_error - 2.0).abs() < 0.05);
}

#[test]
fn erlang_stages_settle_on_target() {
    let config = PerceptionLoopConfig {
        horizon: 600.0,
        ..Default::default()
    };
    let scenario = PerceptionLoopScenario::new(config);
    let trajectory = scenario.run().unwrap();
    let last = trajectory.last().unwrap();

    assert!((last.stock - 50.0).abs() < 0.05);
    for stage in &last.stages {
        assert!((stage - 50.0).abs() < 0.05);
    }
}

#[test]
fn erlang_higher_order_oscillates_more() {
    let crossings = |order: usize| {
        let config = PerceptionLoopConfig {
            order,
            ..Default::default()
        };
        let scenario = PerceptionLoopScenario::new(config);
        let trajectory = scenario.run().unwrap();
        scenario.report(&trajectory).unwrap()
    };

    let first = crossings(1);
    let third = crossings(3);
    assert!(third.overshoot > first.overshoot);
    assert!(third.overcorrections.len() >= first.overcorrections.len());
}

#[test]
fn sir_peak_and_final_size_match_theory() {
    let config = SIRConfig {
        t_end: 300.0,
        eval_points: 3001,
        ..Default::default()
    };
    let scenario = SIRScenario::new(config).with_solver(DormandPrince::new(1e-9, 1e-9));
    let trajectory = scenario.run().unwrap();
    let report = EpidemicReport::from_trajectory(scenario.config(), &trajectory).unwrap();

    assert!((report.peak_infected - report.analytic_peak).abs() < 0.5);
    assert!((report.final_state.recovered - report.analytic_final_size).abs() < 0.5);

    // dI/dt = 0 exactly when S = N / R0
    let crossing = report.herd_crossing.unwrap();
    assert!((crossing.time - report.peak_time).abs() <= 0.1 + 1e-9);
}

#[test]
fn sir_adaptive_solver_agrees_with_rk4() {
    let config = SIRConfig::default();
    let adaptive = SIRScenario::new(config.clone())
        .with_solver(DormandPrince::new(1e-9, 1e-9))
        .run()
        .unwrap();

    let grid = TimeGrid::linspace(0.0, 100.0, 9901).unwrap();
    let fixed = dynsim::domains::integrate_fixed(
        &RK4Integrator,
        &SIRModel::from_config(&config),
        &grid,
        &config.initial_state(),
    )
    .unwrap();

    // Every 100th fixed step lands on a multiple of 100/99
    for (k, state) in adaptive.iter().enumerate() {
        let fixed_state = &fixed.y[k * 100];
        assert!((state.infected - fixed_state[1]).abs() < 1e-3);
    }
}

#[test]
fn early_vaccination_lowers_the_peak() {
    let sir = SIRConfig::default();
    let baseline = SIRScenario::new(sir.clone()).run().unwrap();
    let baseline_report = EpidemicReport::from_trajectory(&sir, &baseline).unwrap();

    let vaccination = VaccinationConfig {
        intervention_time: 10.0,
        phase_one_points: 11,
        phase_two_points: 91,
        ..Default::default()
    };
    let scenario = VaccinationScenario::new(sir, vaccination);
    let run = scenario.run().unwrap();
    let report = scenario.report(&run).unwrap();

    assert_eq!(run.trajectory.len(), 102);
    assert!(report.epidemic.peak_infected < baseline_report.peak_infected);
    assert!(report.infected_total < baseline_report.final_state.recovered);
}

#[test]
fn default_vaccination_has_101_samples() {
    let scenario = VaccinationScenario::new(SIRConfig::default(), VaccinationConfig::default());
    let run = scenario.run().unwrap();
    assert_eq!(run.trajectory.len(), 101);
    assert_eq!(run.trajectory[30].time, run.trajectory[31].time);
}
