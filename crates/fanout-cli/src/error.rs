//! CLI error type.
//!
//! Library errors are wrapped as they are; [`cli_error_to_miette`] turns them
//! into reports, keeping the bundler's diagnostic codes and help texts.

use std::path::PathBuf;

use miette::Report;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] fanout_config::ConfigError),

    /// The build pipeline failed
    #[error(transparent)]
    Build(#[from] fanout_bundler::Error),

    /// No package.json in the package root
    #[error("No package.json found in {}", .0.display())]
    ManifestNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convert a CLI error into a miette report for display.
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Build(err) => Report::new(err),
        CliError::Config(err) => match err.hint() {
            Some(hint) => miette::miette!(help = hint.to_string(), "Configuration error: {err}"),
            None => miette::miette!("Configuration error: {err}"),
        },
        CliError::ManifestNotFound(dir) => miette::miette!(
            help = "Run fanout from a package root, or pass --cwd <DIR>",
            "No package.json found in {}",
            dir.display()
        ),
        CliError::Io(err) => miette::miette!("I/O error: {err}"),
    }
}
