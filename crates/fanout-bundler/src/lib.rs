#![cfg_attr(docsrs, feature(doc_cfg))]

//! # fanout-bundler
//!
//! Executes a `fanout-plan` build plan: compiles every batch through a
//! [`Compiler`], writes node ESM wrappers, the published manifest and type
//! declarations, then collapses identical artifacts into facades.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use fanout_bundler::{BuildExecutor, NativeRuntime, OxcDeclarationEmitter, RolldownCompiler};
//! use fanout_config::FanoutConfig;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let root = std::env::current_dir()?.join("packages/widgets");
//! let runtime = Arc::new(NativeRuntime::new(&root));
//! let executor = BuildExecutor::new(&root, FanoutConfig::default(), runtime.clone())
//!     .with_compiler(Arc::new(RolldownCompiler::new(runtime.clone())))
//!     .with_declarations(Arc::new(OxcDeclarationEmitter::new(runtime)));
//!
//! let report = executor.run().await?;
//! for artifact in &report.artifacts {
//!     println!("wrote {}", artifact.display());
//! }
//! # Ok(()) }
//! ```

pub mod compiler;
pub mod dts;
pub mod executor;
pub mod exports;
pub mod facade;
pub mod node_wrapper;
pub mod rolldown_compiler;
pub mod runtime;

pub use compiler::{CompileOutput, CompileRequest, Compiler, DeclarationEmitter, EmittedFile};
pub use dts::OxcDeclarationEmitter;
pub use executor::{BuildExecutor, BuildReport, UnresolvedImport};
pub use exports::{ModuleExports, scan_commonjs, scan_esm};
pub use facade::{DedupFacadeGenerator, Facade, FacadeCandidate};
pub use node_wrapper::render_node_wrapper;
pub use rolldown_compiler::{ENV_SPECIFIER, FanoutEnvPlugin, RolldownCompiler};
pub use runtime::{NativeRuntime, Runtime, RuntimeError, RuntimeResult};

// In-memory runtime and recording collaborators for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

/// Error types for fanout-bundler operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A compilation batch failed.
    #[error("Compilation failed for {target} target: {message}")]
    CompileFailed { target: String, message: String },

    /// A script bundle imports a platform module it cannot load at runtime.
    #[error("Unresolved import '{specifier}' in global bundle {file}")]
    UnresolvedGlobalImport { specifier: String, file: String },

    /// Type declaration emission failed.
    #[error("Declaration emit failed for {path}: {message}")]
    Declarations { path: String, message: String },

    /// Compiled output could not be parsed for its export list.
    #[error("Could not scan exports of {path}: {message}")]
    ExportScan { path: String, message: String },

    /// The package manifest could not be read.
    #[error("Invalid package manifest: {0}")]
    InvalidManifest(#[from] fanout_plan::PlanError),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] fanout_config::ConfigError),

    /// Filesystem access through the runtime failed.
    #[error("I/O error: {0}")]
    Runtime(#[from] RuntimeError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The output manifest could not be serialized.
    #[error("Could not serialize manifest: {0}")]
    Json(#[from] serde_json::Error),

    /// A spawned task panicked or was cancelled.
    #[error("Task failed: {0}")]
    Task(String),
}

/// Result type alias for fanout-bundler operations.
pub type Result<T> = std::result::Result<T, Error>;

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::CompileFailed { .. } => "COMPILE_FAILED",
            Error::UnresolvedGlobalImport { .. } => "UNRESOLVED_GLOBAL_IMPORT",
            Error::Declarations { .. } => "DECLARATIONS_FAILED",
            Error::ExportScan { .. } => "EXPORT_SCAN_FAILED",
            Error::InvalidManifest(_) => "INVALID_MANIFEST",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Runtime(_) | Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "SERIALIZATION_FAILED",
            Error::Task(_) => "TASK_FAILED",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::UnresolvedGlobalImport { specifier, .. } => Some(Box::new(format!(
                "Global bundles cannot load '{}' at runtime.\nGive the entry a `script` condition that avoids it, or set `\"script\": null` to skip the global build.",
                specifier
            ))),
            Error::InvalidManifest(_) => Some(Box::new(
                "Check that package.json is valid JSON with a `name` and an `exports` object or string.",
            )),
            Error::InvalidConfig(err) => err
                .hint()
                .map(|hint| Box::new(hint.to_string()) as Box<dyn std::fmt::Display>),
            Error::Declarations { .. } => Some(Box::new(
                "Declarations are emitted with isolated declarations; add explicit types to exported items, or set `dts = false`.",
            )),
            Error::Runtime(_) | Error::Io(_) => Some(Box::new(
                "Check disk space and permissions. The output directory is invalid until a build succeeds.",
            )),
            _ => None,
        }
    }
}
