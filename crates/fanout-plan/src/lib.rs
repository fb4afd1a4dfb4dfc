//! # fanout-plan
//!
//! Pure planning layer for fanout.
//!
//! This crate turns a package's declared `exports` map into a concrete build plan
//! and projects that plan back into the published manifest. It never touches the
//! filesystem and never invokes a compiler; `fanout-bundler` executes what is
//! planned here.
//!
//! ```text
//! package.json exports ─► ExportMapResolver ─► EntryPlan[]
//!                                                   │
//!                              TargetMatrix ────────┤
//!                                                   ▼
//!                                             BuildPlanner ─► BuildPlan
//!                                                   │
//!                                                   ▼
//!                                          ManifestSynthesizer ─► exports block
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use fanout_plan::{BuildPlanner, ExportMapResolver, ManifestSynthesizer, PackageManifest};
//!
//! let manifest = PackageManifest::from_json_str(r#"{
//!     "name": "@acme/widgets",
//!     "exports": {
//!         ".": { "node": "./src/node.ts", "default": "./src/index.ts" },
//!         "./web": { "browser": "./src/web.ts", "script": null }
//!     }
//! }"#).unwrap();
//!
//! let resolved = ExportMapResolver::new(&manifest).resolve();
//! let plan = BuildPlanner::default().plan(&resolved);
//! assert_eq!(plan.entries.len(), 2);
//!
//! let exports = ManifestSynthesizer::default().exports_block(&resolved, &plan, false);
//! assert!(exports["./web"].get("script").is_none());
//! ```

pub mod conditions;
pub mod global_name;
pub mod manifest;
pub mod naming;
pub mod package;
pub mod planner;
pub mod resolver;
pub mod target;

pub use conditions::{ConditionSet, ConditionValue, DeclaredExport};
pub use global_name::{GlobalNames, legalize_identifier, package_global, read_global_name_marker};
pub use manifest::{
    DefaultPrecedence, ManifestSynthesizer, NodeExport, PublishExportEntry, to_manifest_string,
};
pub use naming::{OutputName, manifest_path};
pub use package::PackageManifest;
pub use planner::{
    BatchJob, BuildPlan, BuildPlanner, BuildTask, DeclarationJob, PerEntryJob, PlannerOptions,
};
pub use resolver::{EntryPlan, ExportMapResolver, ExportSlot, PassthroughExport, ResolvedExports};
pub use target::{BuildMode, ModuleFormat, Platform, TargetDescriptor, TargetKind, TargetMatrix};

/// Error types for fanout-plan operations.
///
/// Rejected export entries are not errors; they reduce the plan instead. These
/// variants only cover manifests that cannot be read at all.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// The package manifest is not valid JSON or has the wrong shape.
    #[error("Invalid package manifest: {0}")]
    InvalidManifest(String),

    /// The package manifest has no usable `name`.
    #[error("Package manifest is missing a name")]
    MissingName,

    /// A target language level could not be understood.
    #[error("Invalid language level for {kind} target: {level}")]
    InvalidLanguageLevel { kind: TargetKind, level: String },
}

/// Result type alias for fanout-plan operations.
pub type Result<T> = std::result::Result<T, PlanError>;
