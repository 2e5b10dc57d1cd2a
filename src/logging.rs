//! Logging setup for the command-line tool.
//!
//! Diagnostics go to stderr through `tracing`; reports stay on stdout.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive.
pub const DEFAULT_FILTER: &str = "dynsim=info";

/// Filter directive used with `--verbose`.
pub const VERBOSE_FILTER: &str = "dynsim=debug,info";

/// Filter from `RUST_LOG`, or the default for the verbosity level.
#[must_use]
pub fn env_filter(verbose: bool) -> EnvFilter {
    let fallback = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install the compact stderr subscriber.
///
/// Returns `false` if a global subscriber was already installed, which
/// happens when the CLI entry point runs more than once in a process.
pub fn init_logger(verbose: bool) -> bool {
    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init()
        .is_ok()
}
