//! Build planning.
//!
//! The planner applies the [`TargetMatrix`] to every [`EntryPlan`] and groups
//! the resulting tasks by topology:
//!
//! - one [`BatchJob`] per batched kind (esnext, module, node, browser) spanning
//!   every entry, so code shared between entries is emitted as common chunks;
//! - one [`PerEntryJob`] per script entry, each a self-contained global bundle.
//!
//! The two shapes are distinct types so a script task can never end up inside
//! a batch.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use crate::conditions::names;
use crate::global_name::GlobalNames;
use crate::naming::OutputName;
use crate::resolver::{EntryPlan, ResolvedExports};
use crate::target::{BuildMode, TargetDescriptor, TargetKind, TargetMatrix};

/// Planner configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerOptions {
    pub matrix: TargetMatrix,
    /// Emit type declarations for TypeScript entries.
    pub declarations: bool,
    /// Package global overriding the one derived from the package name.
    pub global_name: Option<String>,
    /// Global names read from `@globalName` markers, keyed by entry source.
    pub global_overrides: HashMap<PathBuf, String>,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            matrix: TargetMatrix::default(),
            declarations: true,
            global_name: None,
            global_overrides: HashMap::new(),
        }
    }
}

/// One (entry, target) compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTask {
    pub entry: EntryPlan,
    pub descriptor: TargetDescriptor,
    pub mode: BuildMode,
    /// Source file, as declared in the export map.
    pub source: String,
    /// Artifact path relative to the output directory.
    pub output_path: String,
    /// ESM wrapper path for node tasks.
    pub wrapper_path: Option<String>,
}

/// Every entry of one batched kind, compiled as one multi-entry unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub descriptor: TargetDescriptor,
    pub mode: BuildMode,
    pub tasks: Vec<BuildTask>,
}

/// A single self-contained script bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerEntryJob {
    pub task: BuildTask,
    pub global_name: String,
}

/// Type declaration emission for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationJob {
    pub entry: EntryPlan,
    pub source: String,
    pub output_path: String,
}

/// Complete plan for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildPlan {
    pub entries: Vec<EntryPlan>,
    pub batches: Vec<BatchJob>,
    pub per_entry: Vec<PerEntryJob>,
    pub declarations: Vec<DeclarationJob>,
    /// Batched jobs for the second pass; only executed when the mode latch trips.
    pub development: Vec<BatchJob>,
}

impl BuildPlan {
    /// Production tasks of one entry, batched and per-entry alike.
    pub fn tasks_for<'a, 'b>(
        &'a self,
        subpath: &'b str,
    ) -> impl Iterator<Item = &'a BuildTask> + use<'a, 'b> {
        self.batches
            .iter()
            .flat_map(|batch| batch.tasks.iter())
            .chain(self.per_entry.iter().map(|job| &job.task))
            .filter(move |task| task.entry.subpath == subpath)
    }

    /// Production task of `kind` for one entry.
    pub fn task(&self, subpath: &str, kind: TargetKind) -> Option<&BuildTask> {
        self.batches
            .iter()
            .flat_map(|batch| batch.tasks.iter())
            .chain(self.per_entry.iter().map(|job| &job.task))
            .find(|task| task.entry.subpath == subpath && task.descriptor.kind == kind)
    }

    /// Development task of `kind` for one entry.
    pub fn development_task(&self, subpath: &str, kind: TargetKind) -> Option<&BuildTask> {
        self.development
            .iter()
            .flat_map(|batch| batch.tasks.iter())
            .find(|task| task.entry.subpath == subpath && task.descriptor.kind == kind)
    }

    pub fn declaration(&self, subpath: &str) -> Option<&DeclarationJob> {
        self.declarations
            .iter()
            .find(|job| job.entry.subpath == subpath)
    }

    /// Number of production compilation units.
    pub fn unit_count(&self) -> usize {
        self.batches.len() + self.per_entry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty() && self.per_entry.is_empty() && self.declarations.is_empty()
    }
}

/// Combines resolved entries with the target matrix.
#[derive(Debug, Clone, Default)]
pub struct BuildPlanner {
    options: PlannerOptions,
}

impl BuildPlanner {
    pub fn new(options: PlannerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PlannerOptions {
        &self.options
    }

    /// Plan every task for `resolved`. Pure and deterministic.
    pub fn plan(&self, resolved: &ResolvedExports) -> BuildPlan {
        let entries: Vec<EntryPlan> = resolved.entries().cloned().collect();
        let globals = GlobalNames::new(
            self.options
                .global_name
                .clone()
                .unwrap_or_else(|| resolved.package_global.clone()),
        )
        .with_overrides(self.options.global_overrides.clone());

        let mut plan = BuildPlan {
            entries: entries.clone(),
            ..BuildPlan::default()
        };

        for descriptor in self.options.matrix.enabled() {
            let kind = descriptor.kind;
            if kind.is_batched() {
                for mode in [BuildMode::Production, BuildMode::Development] {
                    let tasks: Vec<BuildTask> = entries
                        .iter()
                        .filter_map(|entry| task_for(entry, &descriptor, mode))
                        .collect();
                    if tasks.is_empty() {
                        continue;
                    }
                    let batch = BatchJob {
                        descriptor: descriptor.clone(),
                        mode,
                        tasks,
                    };
                    match mode {
                        BuildMode::Production => plan.batches.push(batch),
                        BuildMode::Development => plan.development.push(batch),
                    }
                }
            } else {
                for entry in &entries {
                    let Some(task) = task_for(entry, &descriptor, BuildMode::Production) else {
                        continue;
                    };
                    let global_name = globals.for_entry(entry, &task.source);
                    plan.per_entry.push(PerEntryJob { task, global_name });
                }
            }
        }

        if self.options.declarations {
            plan.declarations = entries.iter().filter_map(declaration_for).collect();
        }

        debug!(
            entries = plan.entries.len(),
            batches = plan.batches.len(),
            scripts = plan.per_entry.len(),
            declarations = plan.declarations.len(),
            "build plan ready"
        );
        plan
    }
}

/// Resolve the source of one entry for one target, or `None` when the entry
/// suppresses the target or no condition yields a source.
fn task_for(entry: &EntryPlan, descriptor: &TargetDescriptor, mode: BuildMode) -> Option<BuildTask> {
    let kind = descriptor.kind;
    if entry.conditions.is_suppressed(kind.as_str()) {
        debug!(subpath = %entry.subpath, target = %kind, "target suppressed by entry");
        return None;
    }

    let source = match mode {
        BuildMode::Development => entry
            .conditions
            .path(names::DEVELOPMENT)
            .or_else(|| entry.conditions.first_path(kind.source_order())),
        BuildMode::Production => entry.conditions.first_path(kind.source_order()),
    };
    let Some(source) = source else {
        debug!(subpath = %entry.subpath, target = %kind, "no source for target");
        return None;
    };

    let name = OutputName::new(&entry.stem);
    Some(BuildTask {
        entry: entry.clone(),
        descriptor: descriptor.clone(),
        mode,
        source: source.to_string(),
        output_path: name.artifact(kind, mode),
        wrapper_path: (kind == TargetKind::Node).then(|| name.node_wrapper(mode)),
    })
}

/// Declarations are emitted from the module source when it is TypeScript.
fn declaration_for(entry: &EntryPlan) -> Option<DeclarationJob> {
    let source = entry.conditions.first_path(TargetKind::Module.source_order())?;
    let is_typescript =
        (source.ends_with(".ts") || source.ends_with(".tsx")) && !source.ends_with(".d.ts");
    is_typescript.then(|| DeclarationJob {
        entry: entry.clone(),
        source: source.to_string(),
        output_path: OutputName::new(&entry.stem).declarations(),
    })
}
