//! CLI argument parsing.
//!
//! Hand-written parser over any iterator of strings so that parsing can be
//! tested without touching the process environment.

use std::fmt;
use std::path::PathBuf;

/// CLI arguments container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    /// The command to execute.
    pub command: Command,
}

/// Simulations reachable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// First-order delay stock.
    Delay,
    /// Perception loop with an Erlang delay.
    Erlang,
    /// SIR epidemic.
    Sir,
    /// SIR epidemic with a vaccination pulse.
    Vaccinate,
}

impl Scenario {
    /// Every scenario, in report order.
    pub const ALL: [Self; 4] = [Self::Delay, Self::Erlang, Self::Sir, Self::Vaccinate];

    /// Command name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Delay => "delay",
            Self::Erlang => "erlang",
            Self::Sir => "sir",
            Self::Vaccinate => "vaccinate",
        }
    }

    /// Look up a scenario by command name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options shared by the single-scenario commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioOptions {
    /// YAML configuration file (defaults when absent).
    pub config_path: Option<PathBuf>,
    /// Where to write the JSON report and trajectory.
    pub json_path: Option<PathBuf>,
    /// Enable debug logging.
    pub verbose: bool,
}

/// Available CLI commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run a single scenario
    Simulate {
        /// Which scenario.
        scenario: Scenario,
        /// Config, JSON output and verbosity.
        options: ScenarioOptions,
    },
    /// Run every scenario from one configuration file
    Run {
        /// Path to the YAML configuration.
        config_path: PathBuf,
        /// Enable verbose output.
        verbose: bool,
    },
    /// Show help
    Help,
    /// Show version
    Version,
    /// Unparseable command line; carries the reason
    Invalid(String),
}

impl Command {
    /// Whether debug logging was requested.
    #[must_use]
    pub const fn verbose(&self) -> bool {
        match self {
            Self::Simulate { options, .. } => options.verbose,
            Self::Run { verbose, .. } => *verbose,
            Self::Help | Self::Version | Self::Invalid(_) => false,
        }
    }
}

impl Args {
    /// Parse command-line arguments from an iterator.
    ///
    /// The first item is the program name.
    #[must_use]
    pub fn parse_from<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();
        Self::parse_from_vec(&args)
    }

    /// Parse command-line arguments from the environment.
    #[must_use]
    pub fn parse() -> Self {
        Self::parse_from(std::env::args())
    }

    fn parse_from_vec(args: &[String]) -> Self {
        if args.len() < 2 {
            return Self {
                command: Command::Help,
            };
        }

        let command = match args[1].as_str() {
            "run" => Self::parse_run_command(args),
            "-h" | "--help" | "help" => Command::Help,
            "-V" | "--version" | "version" => Command::Version,
            name => match Scenario::from_name(name) {
                Some(scenario) => Self::parse_scenario_command(scenario, &args[2..]),
                None => Command::Invalid(format!("Unknown command: {name}")),
            },
        };

        Self { command }
    }

    /// Parse `--config`, `--json` and `--verbose` after a scenario name.
    fn parse_scenario_command(scenario: Scenario, rest: &[String]) -> Command {
        let mut options = ScenarioOptions::default();

        let mut i = 0;
        while i < rest.len() {
            match rest[i].as_str() {
                flag @ ("-c" | "--config" | "-o" | "--json") => {
                    let Some(value) = rest.get(i + 1) else {
                        return Command::Invalid(format!("'{flag}' requires a file path"));
                    };
                    let path = Some(PathBuf::from(value));
                    if matches!(flag, "-c" | "--config") {
                        options.config_path = path;
                    } else {
                        options.json_path = path;
                    }
                    i += 2;
                }
                "-v" | "--verbose" => {
                    options.verbose = true;
                    i += 1;
                }
                other => {
                    eprintln!("Warning: ignoring unknown argument '{other}'");
                    i += 1;
                }
            }
        }

        Command::Simulate { scenario, options }
    }

    /// Parse the 'run' command arguments.
    fn parse_run_command(args: &[String]) -> Command {
        if args.len() < 3 {
            return Command::Invalid("'run' command requires a configuration path".to_string());
        }

        let verbose = args[3..]
            .iter()
            .any(|a| matches!(a.as_str(), "-v" | "--verbose"));

        Command::Run {
            config_path: PathBuf::from(&args[2]),
            verbose,
        }
    }
}
