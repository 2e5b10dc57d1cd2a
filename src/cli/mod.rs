//! Command-line interface for dynsim.
//!
//! All CLI logic lives here rather than in main.rs so that parsing,
//! dispatch and report formatting can be tested. `main` only parses the
//! process arguments and calls [`run_cli`].

mod args;
mod commands;
mod output;

pub use args::{Args, Command, Scenario, ScenarioOptions};
pub use commands::{execute, run_all, run_cli, simulate, ScenarioOutput};
pub use output::{
    format_delay_report, format_epidemic_report, format_perception_report,
    format_vaccination_report, print_help, print_version, version_string,
};

#[cfg(test)]
mod tests;
