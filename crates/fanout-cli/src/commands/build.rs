//! `fanout build`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use fanout_bundler::{BuildExecutor, BuildReport, NativeRuntime};
use fanout_config::{ConfigDiscovery, DevelopmentMode, FanoutConfig};
use serde::Serialize;
use tracing::debug;

use crate::cli::BuildArgs;
use crate::error::{CliError, Result};
use crate::ui;

/// Flags that override every other configuration source. Unset flags are skipped.
#[derive(Debug, Default, Serialize)]
pub struct BuildOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedupe: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dts: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub development: Option<DevelopmentMode>,
}

impl From<&BuildArgs> for BuildOverrides {
    fn from(args: &BuildArgs) -> Self {
        Self {
            out_dir: args.out_dir.clone(),
            dedupe: args.no_dedupe.then_some(false),
            dts: args.no_dts.then_some(false),
            development: args.development.map(DevelopmentMode::from),
        }
    }
}

/// Execute the build command.
///
/// 1. Locate the package root and load the layered configuration
/// 2. Run the pipeline with rolldown and oxc declarations
/// 3. Report warnings and the written artifacts
pub async fn execute(args: BuildArgs, quiet: bool) -> Result<BuildReport> {
    let start = Instant::now();

    let root = resolve_root(args.cwd.as_deref())?;
    let config = load_config(&root, &args)?;
    debug!(root = %root.display(), ?config, "configuration loaded");

    if !quiet {
        ui::info(&format!("Building {}", root.display()));
    }

    let runtime = Arc::new(NativeRuntime::new(&root));
    let report = BuildExecutor::new(&root, config, runtime).run().await?;

    if !quiet {
        for warning in &report.warnings {
            ui::warning(&format!(
                "'{}' is not a declared dependency ({} in {})",
                warning.specifier,
                warning.kind,
                warning.file.display()
            ));
        }
        ui::print_build_summary(&report);
        ui::success(&format!(
            "Build completed in {}",
            ui::format_duration(start.elapsed())
        ));
    }
    Ok(report)
}

/// Layered configuration of `root` with the command-line flags on top.
pub fn load_config(root: &Path, args: &BuildArgs) -> Result<FanoutConfig> {
    let overrides = BuildOverrides::from(args);
    Ok(ConfigDiscovery::new(root).load_with_overrides(&overrides)?)
}

fn resolve_root(cwd: Option<&Path>) -> Result<PathBuf> {
    let current = std::env::current_dir()?;
    let root = match cwd {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => current.join(dir),
        None => current,
    };
    if !root.join("package.json").is_file() {
        return Err(CliError::ManifestNotFound(root));
    }
    Ok(root)
}
