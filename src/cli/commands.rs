//! CLI command handlers.
//!
//! Each handler returns `SimResult`; conversion to an exit code happens
//! once, in [`run_cli`].

use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;

use super::args::{Args, Command, Scenario, ScenarioOptions};
use super::output::{
    print_delay_report, print_epidemic_report, print_help, print_perception_report,
    print_usage_error, print_vaccination_report, print_version,
};
use crate::config::DynConfig;
use crate::error::SimResult;
use crate::logging::init_logger;
use crate::scenarios::{
    DelayRecord, DelayReport, EpidemicReport, ErlangRecord, FirstOrderDelayScenario,
    PerceptionLoopScenario, PerceptionReport, SIRScenario, SIRState, VaccinationReport,
    VaccinationRun, VaccinationScenario,
};

/// Report and trajectory of one scenario run.
#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioOutput {
    /// First-order delay stock.
    Delay {
        /// Summary.
        report: DelayReport,
        /// Samples.
        trajectory: Vec<DelayRecord>,
    },
    /// Perception loop.
    Erlang {
        /// Summary.
        report: PerceptionReport,
        /// Samples.
        trajectory: Vec<ErlangRecord>,
    },
    /// SIR epidemic.
    Sir {
        /// Summary.
        report: EpidemicReport,
        /// Samples.
        trajectory: Vec<SIRState>,
    },
    /// SIR epidemic with vaccination.
    Vaccinate {
        /// Summary.
        report: VaccinationReport,
        /// Both phases and the pulse size.
        run: VaccinationRun,
    },
}

#[derive(Serialize)]
struct JsonDump<'a, R, T> {
    report: &'a R,
    trajectory: &'a T,
}

fn dump<R: Serialize, T: Serialize>(report: &R, trajectory: &T) -> SimResult<String> {
    Ok(serde_json::to_string_pretty(&JsonDump { report, trajectory })?)
}

impl ScenarioOutput {
    /// `{ "report": ..., "trajectory": [...] }` as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if encoding fails.
    pub fn to_json(&self) -> SimResult<String> {
        match self {
            Self::Delay { report, trajectory } => dump(report, trajectory),
            Self::Erlang { report, trajectory } => dump(report, trajectory),
            Self::Sir { report, trajectory } => dump(report, trajectory),
            Self::Vaccinate { report, run } => dump(report, &run.trajectory),
        }
    }

    /// Number of trajectory samples.
    #[must_use]
    pub fn samples(&self) -> usize {
        match self {
            Self::Delay { trajectory, .. } => trajectory.len(),
            Self::Erlang { trajectory, .. } => trajectory.len(),
            Self::Sir { trajectory, .. } => trajectory.len(),
            Self::Vaccinate { run, .. } => run.trajectory.len(),
        }
    }

    /// Print the framed console report.
    pub fn print(&self) {
        match self {
            Self::Delay { report, .. } => print_delay_report(report),
            Self::Erlang { report, .. } => print_perception_report(report),
            Self::Sir { report, .. } => print_epidemic_report(report),
            Self::Vaccinate { report, .. } => print_vaccination_report(report),
        }
    }
}

/// Run one scenario with the given configuration.
///
/// # Errors
///
/// Returns any configuration, solver or Jidoka error from the scenario.
pub fn execute(scenario: Scenario, config: &DynConfig) -> SimResult<ScenarioOutput> {
    tracing::debug!(%scenario, "running scenario");
    let jidoka = config.jidoka.clone();

    let output = match scenario {
        Scenario::Delay => {
            let sim = FirstOrderDelayScenario::new(config.first_order_delay.clone())
                .with_jidoka(jidoka);
            let trajectory = sim.run()?;
            let report = sim.report(&trajectory)?;
            ScenarioOutput::Delay { report, trajectory }
        }
        Scenario::Erlang => {
            let sim = PerceptionLoopScenario::new(config.erlang_delay.clone()).with_jidoka(jidoka);
            let trajectory = sim.run()?;
            let report = sim.report(&trajectory)?;
            ScenarioOutput::Erlang { report, trajectory }
        }
        Scenario::Sir => {
            let sim = SIRScenario::new(config.sir.clone())
                .with_solver(config.dormand_prince())
                .with_jidoka(jidoka);
            let trajectory = sim.run()?;
            let report = EpidemicReport::from_trajectory(sim.config(), &trajectory)?;
            ScenarioOutput::Sir { report, trajectory }
        }
        Scenario::Vaccinate => {
            let sim = VaccinationScenario::new(config.sir.clone(), config.vaccination.clone())
                .with_solver(config.dormand_prince())
                .with_jidoka(jidoka);
            let run = sim.run()?;
            let report = sim.report(&run)?;
            ScenarioOutput::Vaccinate { report, run }
        }
    };

    tracing::info!(%scenario, samples = output.samples(), "scenario complete");
    Ok(output)
}

/// Main CLI entry point.
///
/// Dispatches to the appropriate command handler based on parsed arguments.
#[must_use]
pub fn run_cli(args: Args) -> ExitCode {
    let result = match args.command {
        Command::Simulate { scenario, options } => {
            init_logger(options.verbose);
            simulate(scenario, &options)
        }
        Command::Run {
            config_path,
            verbose,
        } => {
            init_logger(verbose);
            run_all(&config_path)
        }
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Version => {
            print_version();
            Ok(())
        }
        Command::Invalid(reason) => {
            print_usage_error(&reason);
            return ExitCode::from(1);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.is_jidoka_violation() {
                tracing::error!(error = %e, "simulation halted by Jidoka guard");
            }
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

fn load_config(path: Option<&Path>) -> SimResult<DynConfig> {
    path.map_or_else(|| Ok(DynConfig::default()), DynConfig::load)
}

/// Run a single scenario, print its report and optionally write JSON.
///
/// # Errors
///
/// Returns configuration, simulation or I/O errors.
pub fn simulate(scenario: Scenario, options: &ScenarioOptions) -> SimResult<()> {
    let config = load_config(options.config_path.as_deref())?;
    let output = execute(scenario, &config)?;
    output.print();

    if let Some(path) = &options.json_path {
        std::fs::write(path, output.to_json()?)?;
        tracing::info!(path = %path.display(), "wrote JSON output");
    }
    Ok(())
}

/// Run every scenario from one configuration file.
///
/// # Errors
///
/// Stops at the first failing scenario.
pub fn run_all(path: &Path) -> SimResult<()> {
    let config = DynConfig::load(path)?;
    for scenario in Scenario::ALL {
        let output = execute(scenario, &config)?;
        output.print();
        println!();
    }
    Ok(())
}
