//! Command-line interface definition.
//!
//! - `fanout build` - build every target of the package in the current directory

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use fanout_config::DevelopmentMode;

/// Fanout - build every distribution flavor of a package from its exports map
#[derive(Parser, Debug)]
#[command(
    name = "fanout",
    version,
    about = "Build every distribution flavor of a package from its exports map",
    long_about = "Fanout reads the `exports` field of package.json, compiles each entry for\n\
                  every enabled target (esnext, module, node, script, browser), writes a\n\
                  publishable package.json next to the artifacts and collapses identical\n\
                  outputs into re-export facades."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the package
    Build(BuildArgs),
}

/// Arguments for the build command
#[derive(Args, Debug, Default, Clone)]
pub struct BuildArgs {
    /// Package root containing package.json
    ///
    /// Defaults to the current directory.
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Output directory, relative to the package root
    #[arg(short = 'd', long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Keep identical artifacts instead of rewriting them into facades
    #[arg(long)]
    pub no_dedupe: bool,

    /// Skip TypeScript declaration files
    #[arg(long)]
    pub no_dts: bool,

    /// When to run the development pass
    ///
    /// - auto: only when compiled code imports `fanout:env`
    /// - always: every run
    /// - never: production artifacts only
    #[arg(long, value_enum, value_name = "MODE")]
    pub development: Option<DevelopmentArg>,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub enum DevelopmentArg {
    Auto,
    Always,
    Never,
}

impl From<DevelopmentArg> for DevelopmentMode {
    fn from(arg: DevelopmentArg) -> Self {
        match arg {
            DevelopmentArg::Auto => DevelopmentMode::Auto,
            DevelopmentArg::Always => DevelopmentMode::Always,
            DevelopmentArg::Never => DevelopmentMode::Never,
        }
    }
}
