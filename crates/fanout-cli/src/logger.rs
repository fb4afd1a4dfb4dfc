//! Logging setup for the fanout CLI.
//!
//! `--verbose` turns on debug events of the fanout crates, `--quiet` keeps
//! errors only, and otherwise `RUST_LOG` applies with an info default.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const CRATES: &[&str] = &["fanout_cli", "fanout_bundler", "fanout_config", "fanout_plan"];

/// Initialize the tracing subscriber. Call once, before any logging.
///
/// ```rust,no_run
/// use fanout_cli::logger::init_logger;
///
/// init_logger(false, false, false);
/// ```
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .without_time()
        .compact();

    // `try_init` so a second call, e.g. from tests, is a no-op.
    let _ = tracing_subscriber::registry()
        .with(filter_for(verbose, quiet))
        .with(fmt_layer)
        .try_init();
}

/// Filter for the given verbosity flags. `verbose` wins over `quiet`.
pub fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(directives("debug"))
    } else if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives("info")))
    }
}

fn directives(level: &str) -> String {
    let mut parts = vec!["warn".to_string()];
    parts.extend(CRATES.iter().map(|krate| format!("{krate}={level}")));
    parts.join(",")
}
