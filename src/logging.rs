//! Console logging for the trade binaries.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise `crate_names` log at `info`, or at
/// `debug` when `verbose`, and everything else at `warn`.
pub fn init_logging(verbose: bool, crate_names: &[&str]) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives: Vec<String> = crate_names
            .iter()
            .map(|name| format!("{name}={level}"))
            .collect();
        EnvFilter::new(format!("{},warn", directives.join(",")))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
