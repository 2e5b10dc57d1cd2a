//! CLI module tests.

use super::args::{Args, Command, Scenario, ScenarioOptions};
use super::commands::{execute, run_all, run_cli, simulate, ScenarioOutput};
use super::output::{
    format_delay_report, format_epidemic_report, format_perception_report,
    format_vaccination_report, version_string,
};
use crate::config::DynConfig;
use crate::error::SimError;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tempfile::NamedTempFile;

// ============================================================================
// Args parsing tests
// ============================================================================

#[test]
fn test_parse_no_args_shows_help() {
    let args = Args::parse_from(["dynsim"]);
    assert_eq!(args.command, Command::Help);
}

#[test]
fn test_parse_help_variants() {
    for flag in ["-h", "--help", "help"] {
        assert_eq!(Args::parse_from(["dynsim", flag]).command, Command::Help);
    }
}

#[test]
fn test_parse_version_variants() {
    for flag in ["-V", "--version", "version"] {
        assert_eq!(Args::parse_from(["dynsim", flag]).command, Command::Version);
    }
}

#[test]
fn test_parse_unknown_command() {
    let args = Args::parse_from(["dynsim", "lorenz"]);
    assert_eq!(
        args.command,
        Command::Invalid("Unknown command: lorenz".to_string())
    );
}

#[test]
fn test_parse_scenario_defaults() {
    for scenario in Scenario::ALL {
        let args = Args::parse_from(["dynsim", scenario.as_str()]);
        assert_eq!(
            args.command,
            Command::Simulate {
                scenario,
                options: ScenarioOptions::default(),
            }
        );
    }
}

#[test]
fn test_parse_scenario_options() {
    let args = Args::parse_from([
        "dynsim", "sir", "--config", "sir.yaml", "--json", "out.json", "-v",
    ]);
    match args.command {
        Command::Simulate { scenario, options } => {
            assert_eq!(scenario, Scenario::Sir);
            assert_eq!(options.config_path, Some(PathBuf::from("sir.yaml")));
            assert_eq!(options.json_path, Some(PathBuf::from("out.json")));
            assert!(options.verbose);
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn test_parse_short_flags() {
    let args = Args::parse_from(["dynsim", "erlang", "-c", "a.yaml", "-o", "b.json"]);
    match args.command {
        Command::Simulate { options, .. } => {
            assert_eq!(options.config_path, Some(PathBuf::from("a.yaml")));
            assert_eq!(options.json_path, Some(PathBuf::from("b.json")));
            assert!(!options.verbose);
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn test_parse_flag_missing_value() {
    let args = Args::parse_from(["dynsim", "delay", "--json"]);
    assert!(matches!(args.command, Command::Invalid(ref reason) if reason.contains("--json")));
    assert!(!args.command.verbose());
}

#[test]
fn test_parse_ignores_unknown_flag() {
    let args = Args::parse_from(["dynsim", "delay", "--plot"]);
    assert!(matches!(
        args.command,
        Command::Simulate {
            scenario: Scenario::Delay,
            ..
        }
    ));
}

#[test]
fn test_parse_run_command() {
    let args = Args::parse_from(["dynsim", "run", "all.yaml", "--verbose"]);
    assert_eq!(
        args.command,
        Command::Run {
            config_path: PathBuf::from("all.yaml"),
            verbose: true,
        }
    );
    assert!(args.command.verbose());
}

#[test]
fn test_parse_run_without_path() {
    let args = Args::parse_from(["dynsim", "run"]);
    assert!(matches!(args.command, Command::Invalid(_)));
}

#[test]
fn test_scenario_names_roundtrip() {
    for scenario in Scenario::ALL {
        assert_eq!(Scenario::from_name(scenario.as_str()), Some(scenario));
        assert_eq!(scenario.to_string(), scenario.as_str());
    }
    assert_eq!(Scenario::from_name("seir"), None);
}

// ============================================================================
// Command execution tests
// ============================================================================

#[test]
fn test_execute_every_scenario() {
    let config = DynConfig::default();
    let expected = [51, 200, 100, 101];
    for (scenario, samples) in Scenario::ALL.into_iter().zip(expected) {
        let output = execute(scenario, &config).unwrap();
        assert_eq!(output.samples(), samples, "{scenario}");
    }
}

#[test]
fn test_execute_json_shape() {
    let output = execute(Scenario::Delay, &DynConfig::default()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&output.to_json().unwrap()).unwrap();
    assert!(json["report"]["final_equilibrium"].is_number());
    assert_eq!(json["trajectory"].as_array().map(Vec::len), Some(51));
    assert!(json["trajectory"][0]["stock"].is_number());
}

#[test]
fn test_execute_vaccination_json_uses_combined_trajectory() {
    let output = execute(Scenario::Vaccinate, &DynConfig::default()).unwrap();
    assert!(matches!(output, ScenarioOutput::Vaccinate { .. }));
    let json: serde_json::Value = serde_json::from_str(&output.to_json().unwrap()).unwrap();
    assert_eq!(json["trajectory"].as_array().map(Vec::len), Some(101));
    assert!(json["report"]["vaccinated"].as_f64().unwrap() > 0.0);
}

#[test]
fn test_execute_propagates_config_errors() {
    let mut config = DynConfig::default();
    config.erlang_delay.dt = 10.0;
    let err = execute(Scenario::Erlang, &config).unwrap_err();
    assert!(matches!(err, SimError::Config { .. }));
}

#[test]
fn test_execute_rejects_tiny_timestep_without_allocating() {
    let config = DynConfig::from_yaml("first_order_delay:\n  dt: 1.0e-15\n").unwrap();
    let err = execute(Scenario::Delay, &config).unwrap_err();
    assert!(matches!(err, SimError::Config { .. }));
}

#[test]
fn test_short_sir_horizon_runs_sir_but_not_vaccination() {
    let config = DynConfig::from_yaml("sir:\n  t_end: 20.0\n").unwrap();
    let output = execute(Scenario::Sir, &config).unwrap();
    assert_eq!(output.samples(), 100);

    let err = execute(Scenario::Vaccinate, &config).unwrap_err();
    assert!(matches!(err, SimError::Config { .. }));
}

#[test]
fn test_simulate_sir_with_short_horizon_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"sir:\n  t_end: 20.0\n").unwrap();
    let options = ScenarioOptions {
        config_path: Some(file.path().to_path_buf()),
        ..Default::default()
    };
    assert!(simulate(Scenario::Sir, &options).is_ok());
}

#[test]
fn test_simulate_writes_json() {
    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("sir.json");
    let options = ScenarioOptions {
        json_path: Some(json_path.clone()),
        ..Default::default()
    };
    simulate(Scenario::Sir, &options).unwrap();

    let text = std::fs::read_to_string(json_path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert!(json["report"]["herd_crossing"]["time"].is_number());
}

#[test]
fn test_simulate_with_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"first_order_delay:\n  delay: 2.0\n").unwrap();
    let options = ScenarioOptions {
        config_path: Some(file.path().to_path_buf()),
        ..Default::default()
    };
    assert!(simulate(Scenario::Delay, &options).is_ok());
}

#[test]
fn test_simulate_missing_config_file() {
    let options = ScenarioOptions {
        config_path: Some(PathBuf::from("/nonexistent/dynsim.yaml")),
        ..Default::default()
    };
    let err = simulate(Scenario::Delay, &options).unwrap_err();
    assert!(matches!(err, SimError::Io(_)));
}

#[test]
fn test_run_all_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"schema_version: '1.0'\nsir:\n  beta: 0.25\n").unwrap();
    assert!(run_all(file.path()).is_ok());
}

#[test]
fn test_run_all_rejects_invalid_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"sir:\n  gamma: -1.0\n").unwrap();
    assert!(run_all(file.path()).is_err());
}

#[test]
fn test_run_cli_exit_codes() {
    assert_eq!(
        run_cli(Args::parse_from(["dynsim", "help"])),
        ExitCode::SUCCESS
    );
    assert_eq!(
        run_cli(Args::parse_from(["dynsim", "version"])),
        ExitCode::SUCCESS
    );
    assert_eq!(
        run_cli(Args::parse_from(["dynsim", "erlang"])),
        ExitCode::SUCCESS
    );
    assert_eq!(
        run_cli(Args::parse_from(["dynsim", "run", "/nonexistent.yaml"])),
        ExitCode::from(1)
    );
}

#[test]
fn test_run_cli_usage_errors_exit_nonzero() {
    for argv in [
        vec!["dynsim", "bogus"],
        vec!["dynsim", "sir", "--config"],
        vec!["dynsim", "delay", "-o"],
        vec!["dynsim", "run"],
    ] {
        assert_eq!(run_cli(Args::parse_from(&argv)), ExitCode::from(1), "{argv:?}");
    }
}

// ============================================================================
// Output formatting tests
// ============================================================================

#[test]
fn test_version_string() {
    let version = version_string();
    assert!(version.starts_with("dynsim "));
    assert!(version.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_format_delay_report() {
    let ScenarioOutput::Delay { report, .. } = execute(Scenario::Delay, &DynConfig::default())
        .unwrap()
    else {
        panic!("expected delay output");
    };
    let text = format_delay_report(&report);
    assert!(text.contains("First-Order Delay"));
    assert!(text.contains("Final:       100.00"));
    assert!(text.contains("✓ Stock settled"));
}

#[test]
fn test_format_perception_report_lists_windows() {
    let ScenarioOutput::Erlang { report, .. } = execute(Scenario::Erlang, &DynConfig::default())
        .unwrap()
    else {
        panic!("expected erlang output");
    };
    let text = format_perception_report(&report);
    assert!(text.contains(&format!(
        "Over-corrections ({})",
        report.overcorrections.len()
    )));
    assert!(text.contains("days "));
}

#[test]
fn test_format_epidemic_reports() {
    let config = DynConfig::default();
    let ScenarioOutput::Sir { report, .. } = execute(Scenario::Sir, &config).unwrap() else {
        panic!("expected sir output");
    };
    let text = format_epidemic_report(&report);
    assert!(text.contains("R0:          3.00"));
    assert!(text.contains("Herd immunity threshold: 66.7%"));
    assert!(text.contains("Reached at day"));

    let ScenarioOutput::Vaccinate { report, .. } = execute(Scenario::Vaccinate, &config).unwrap()
    else {
        panic!("expected vaccination output");
    };
    let text = format_vaccination_report(&report);
    assert!(text.contains("Coverage:    50%"));
    assert!(text.contains("individuals infected in total"));
}
