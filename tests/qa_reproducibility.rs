use dynsim::cli::{execute, Scenario};
use dynsim::prelude::*;

// H0: Repeated runs of the same configuration produce different outputs
// Falsification: Run every scenario twice; compare the JSON byte for byte
#[test]
fn h0_1_same_config_produces_identical_json() {
    let config = DynConfig::default();
    for scenario in Scenario::ALL {
        let first = execute(scenario, &config).unwrap().to_json().unwrap();
        let second = execute(scenario, &config).unwrap().to_json().unwrap();
        assert_eq!(first, second, "{scenario} output differs between runs");
    }
}

// H0: A configuration file and the builder give different results
// Falsification: Load a YAML document and build the same values in code
#[test]
fn h0_2_yaml_and_builder_agree() {
    let yaml = "sir:\n  beta: 0.45\n  gamma: 0.15\nsolver:\n  rtol: 1.0e-5\n";
    let from_yaml = DynConfig::from_yaml(yaml).unwrap();

    let built = DynConfig::builder()
        .sir(SIRConfig {
            beta: 0.45,
            gamma: 0.15,
            ..Default::default()
        })
        .solver(SolverConfig {
            rtol: 1e-5,
            ..Default::default()
        })
        .build();
    assert_eq!(from_yaml, built);

    let a = execute(Scenario::Sir, &from_yaml).unwrap().to_json().unwrap();
    let b = execute(Scenario::Sir, &built).unwrap().to_json().unwrap();
    assert_eq!(a, b);
}

// H0: Tightening solver tolerances changes the epidemic materially
// Falsification: Peak and final size agree across tolerances
#[test]
fn h0_3_solver_tolerance_convergence() {
    let config = SIRConfig::default();
    let loose = SIRScenario::new(config.clone()).run().unwrap();
    let tight = SIRScenario::new(config)
        .with_solver(DormandPrince::new(1e-10, 1e-10))
        .run()
        .unwrap();

    assert_eq!(loose.len(), tight.len());
    for (a, b) in loose.iter().zip(&tight) {
        assert!(
            (a.infected - b.infected).abs() < 2.0,
            "t = {}: {} vs {}",
            a.time,
            a.infected,
            b.infected
        );
    }
}

// H0: Halving the Euler timestep does not move the delay model closer to the exponential
// Falsification: Error shrinks roughly linearly with dt
#[test]
fn h0_4_euler_first_order_convergence() {
    let error_for = |dt: f64| {
        let config = FirstOrderDelayConfig {
            dt,
            ..Default::default()
        };
        let scenario = FirstOrderDelayScenario::new(config);
        let trajectory = scenario.run().unwrap();
        scenario.report(&trajectory).unwrap().max_first_phase_error
    };

    let coarse = error_for(1.0);
    let fine = error_for(0.5);
    let finer = error_for(0.25);

    assert!(fine < coarse && finer < fine);
    let ratio = coarse / fine;
    assert!(ratio > 1.6 && ratio < 2.6, "convergence ratio {ratio}");
}
