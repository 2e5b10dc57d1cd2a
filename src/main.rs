//! dynsim CLI - system dynamics and epidemic simulations.

use std::process::ExitCode;

use dynsim::cli::{run_cli, Args};

fn main() -> ExitCode {
    run_cli(Args::parse())
}
