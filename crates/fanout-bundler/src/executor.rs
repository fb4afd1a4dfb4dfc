//! Build execution.
//!
//! [`BuildExecutor`] runs one package build end to end:
//!
//! 1. resolve the export map and plan every task
//! 2. clear and recreate the output directory
//! 3. compile every batch, every script entry and every declaration job concurrently,
//!    writing node ESM wrappers as soon as their batch is done
//! 4. decide on the development pass from the mode latch and run it alongside the
//!    manifest write
//! 5. collapse identical artifacts into facades
//!
//! The first failing unit aborts the run. Units still in flight are cancelled and
//! the output directory is left as it is.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use fanout_config::{ConfigError, ConfigValidator, FanoutConfig, SchemaValidator};
use fanout_plan::{
    BatchJob, BuildPlan, BuildPlanner, DeclarationJob, ExportMapResolver, ManifestSynthesizer,
    PackageManifest, PerEntryJob, PlannerOptions, ResolvedExports, TargetKind, TargetMatrix,
    read_global_name_marker, to_manifest_string,
};
use indexmap::IndexMap;
use path_clean::PathClean;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::compiler::{CompileOutput, CompileRequest, Compiler, DeclarationEmitter};
use crate::dts::OxcDeclarationEmitter;
use crate::exports::scan_commonjs;
use crate::facade::{DedupFacadeGenerator, Facade};
use crate::node_wrapper::render_node_wrapper;
use crate::rolldown_compiler::{RolldownCompiler, is_platform_specifier};
use crate::runtime::Runtime;
use crate::{Error, Result};

const MANIFEST_FILE: &str = "package.json";

/// An import the compiler left in place that nothing declares as external.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct UnresolvedImport {
    pub specifier: String,
    /// Artifact that contains the import, relative to the output directory.
    pub file: PathBuf,
    pub kind: TargetKind,
}

/// What a successful build wrote.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub out_dir: PathBuf,
    /// Every written file relative to `out_dir`, sorted. Facades are included.
    pub artifacts: Vec<PathBuf>,
    pub facades: Vec<Facade>,
    pub warnings: Vec<UnresolvedImport>,
    /// The development pass ran.
    pub development: bool,
}

/// Runs the build pipeline for one package.
#[derive(Debug)]
pub struct BuildExecutor {
    root: PathBuf,
    config: FanoutConfig,
    runtime: Arc<dyn Runtime>,
    compiler: Arc<dyn Compiler>,
    declarations: Arc<dyn DeclarationEmitter>,
}

/// Absolute package root and output directory of one run.
#[derive(Debug, Clone)]
struct Layout {
    root: PathBuf,
    out_dir: PathBuf,
}

impl Layout {
    fn source(&self, declared: &str) -> PathBuf {
        self.root.join(declared).clean()
    }
}

/// One compilation and the node wrappers that depend on it.
struct CompileUnit {
    request: CompileRequest,
    /// `(artifact, wrapper)` pairs, relative to the output directory.
    wrappers: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct UnitOutcome {
    artifacts: Vec<PathBuf>,
    warnings: Vec<UnresolvedImport>,
    uses_mode_intrinsic: bool,
}

impl BuildExecutor {
    /// Executor over `root` compiling with rolldown and emitting declarations with oxc.
    pub fn new(root: impl Into<PathBuf>, config: FanoutConfig, runtime: Arc<dyn Runtime>) -> Self {
        Self {
            root: root.into(),
            config,
            compiler: Arc::new(RolldownCompiler::new(runtime.clone())),
            declarations: Arc::new(OxcDeclarationEmitter::new(runtime.clone())),
            runtime,
        }
    }

    pub fn with_compiler(mut self, compiler: Arc<dyn Compiler>) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn with_declarations(mut self, declarations: Arc<dyn DeclarationEmitter>) -> Self {
        self.declarations = declarations;
        self
    }

    pub fn config(&self) -> &FanoutConfig {
        &self.config
    }

    /// Read `package.json` from the package root and build it.
    pub async fn run(&self) -> Result<BuildReport> {
        let layout = self.layout()?;
        let text = self
            .runtime
            .read_to_string(&layout.root.join(MANIFEST_FILE))
            .await?;
        let manifest = PackageManifest::from_json_str(&text)?;
        self.run_with_manifest(&manifest).await
    }

    /// Build an already-loaded manifest.
    pub async fn run_with_manifest(&self, manifest: &PackageManifest) -> Result<BuildReport> {
        SchemaValidator.validate(&self.config)?;
        let layout = self.layout()?;
        let matrix = self.config.target_matrix()?;

        if manifest.exports.is_none() {
            warn!(package = %manifest.name, "package.json has no exports field, nothing to build");
        }
        let resolved = ExportMapResolver::new(manifest).resolve();
        let global_overrides = self.global_name_markers(&layout, &resolved, &matrix).await;
        let plan = BuildPlanner::new(PlannerOptions {
            matrix,
            declarations: self.config.dts,
            global_name: self.config.global_name.clone(),
            global_overrides,
        })
        .plan(&resolved);
        info!(
            package = %manifest.name,
            entries = plan.entries.len(),
            units = plan.unit_count(),
            "planned build"
        );

        self.prepare_out_dir(&layout).await?;

        let externals = self.externals(manifest);
        let mut production = JoinSet::new();
        for batch in &plan.batches {
            self.spawn_unit(&mut production, self.batch_unit(&layout, batch, &externals));
        }
        for job in &plan.per_entry {
            self.spawn_unit(&mut production, self.script_unit(&layout, job, &externals));
        }
        for job in &plan.declarations {
            self.spawn_declarations(&mut production, &layout, job);
        }
        let production = join_units(production).await?;

        let latch = production.iter().any(|outcome| outcome.uses_mode_intrinsic);
        let development =
            self.config.development.should_run(latch) && !plan.development.is_empty();
        info!(latch, development, "production pass complete");

        let mut development_units = JoinSet::new();
        if development {
            for batch in &plan.development {
                self.spawn_unit(
                    &mut development_units,
                    self.batch_unit(&layout, batch, &externals),
                );
            }
        }
        let (manifest_path, development_outcomes) = futures::try_join!(
            self.write_manifest(&layout, manifest, &resolved, &plan, development),
            join_units(development_units),
        )?;

        let facades = if self.config.dedupe {
            let candidates = DedupFacadeGenerator::candidates(&plan, development);
            DedupFacadeGenerator::new(self.runtime.clone(), &layout.out_dir)
                .run(&candidates)
                .await?
        } else {
            Vec::new()
        };
        if !facades.is_empty() {
            info!(count = facades.len(), "wrote facades");
        }

        let mut report = BuildReport {
            out_dir: layout.out_dir,
            facades,
            development,
            ..BuildReport::default()
        };
        report.artifacts.push(manifest_path);
        for outcome in production.into_iter().chain(development_outcomes) {
            report.artifacts.extend(outcome.artifacts);
            report.warnings.extend(outcome.warnings);
        }
        report.artifacts.sort();
        report.artifacts.dedup();
        report.warnings.sort();
        report.warnings.dedup();
        Ok(report)
    }

    fn layout(&self) -> Result<Layout> {
        let root = if self.root.is_absolute() {
            self.root.clone()
        } else {
            self.runtime.get_cwd()?.join(&self.root)
        }
        .clean();
        let out_dir = root.join(&self.config.out_dir).clean();

        // Preparing the output directory removes it.
        if root.starts_with(&out_dir) {
            return Err(Error::InvalidConfig(ConfigError::InvalidValue {
                field: "out_dir".to_string(),
                message: format!(
                    "{} would remove the package itself",
                    self.config.out_dir.display()
                ),
            }));
        }
        Ok(Layout { root, out_dir })
    }

    async fn prepare_out_dir(&self, layout: &Layout) -> Result<()> {
        if self.runtime.exists(&layout.out_dir) {
            debug!(out_dir = %layout.out_dir.display(), "clearing output directory");
            self.runtime.remove_dir_all(&layout.out_dir).await?;
        }
        self.runtime.create_dir(&layout.out_dir, true).await?;
        Ok(())
    }

    /// `@globalName` markers of every entry that builds a script bundle.
    async fn global_name_markers(
        &self,
        layout: &Layout,
        resolved: &ResolvedExports,
        matrix: &TargetMatrix,
    ) -> HashMap<PathBuf, String> {
        let mut markers = HashMap::new();
        if !matrix.is_enabled(TargetKind::Script) {
            return markers;
        }

        for entry in resolved.entries() {
            if entry.conditions.is_suppressed(TargetKind::Script.as_str()) {
                continue;
            }
            let Some(source) = entry
                .conditions
                .first_path(TargetKind::Script.source_order())
            else {
                continue;
            };
            // An unreadable source fails later, in the compiler.
            match self.runtime.read_to_string(&layout.source(source)).await {
                Ok(text) => {
                    if let Some(name) = read_global_name_marker(&text) {
                        debug!(source, global = %name, "global name marker");
                        markers.insert(PathBuf::from(source), name);
                    }
                }
                Err(err) => debug!(source, %err, "could not read entry source"),
            }
        }
        markers
    }

    fn externals(&self, manifest: &PackageManifest) -> Vec<String> {
        let mut externals: Vec<String> = manifest.dependencies.iter().cloned().collect();
        for external in &self.config.external {
            if !externals.contains(external) {
                externals.push(external.clone());
            }
        }
        externals
    }

    fn batch_unit(&self, layout: &Layout, batch: &BatchJob, externals: &[String]) -> CompileUnit {
        let entries: IndexMap<String, PathBuf> = batch
            .tasks
            .iter()
            .map(|task| (task.entry.stem.clone(), layout.source(&task.source)))
            .collect();
        let wrappers = batch
            .tasks
            .iter()
            .filter_map(|task| {
                let wrapper = task.wrapper_path.clone()?;
                Some((task.output_path.clone(), wrapper))
            })
            .collect();

        CompileUnit {
            request: CompileRequest {
                root: layout.root.clone(),
                entries,
                descriptor: batch.descriptor.clone(),
                mode: batch.mode,
                out_dir: layout.out_dir.clone(),
                global_name: None,
                externals: externals.to_vec(),
                sourcemap: self.config.sourcemap,
            },
            wrappers,
        }
    }

    fn script_unit(&self, layout: &Layout, job: &PerEntryJob, externals: &[String]) -> CompileUnit {
        let task = &job.task;
        let mut entries = IndexMap::new();
        entries.insert(task.entry.stem.clone(), layout.source(&task.source));

        CompileUnit {
            request: CompileRequest {
                root: layout.root.clone(),
                entries,
                descriptor: task.descriptor.clone(),
                mode: task.mode,
                out_dir: layout.out_dir.clone(),
                global_name: Some(job.global_name.clone()),
                externals: externals.to_vec(),
                sourcemap: self.config.sourcemap,
            },
            wrappers: Vec::new(),
        }
    }

    fn spawn_unit(&self, set: &mut JoinSet<Result<UnitOutcome>>, unit: CompileUnit) {
        let compiler = self.compiler.clone();
        let runtime = self.runtime.clone();
        set.spawn(execute_unit(compiler, runtime, unit));
    }

    fn spawn_declarations(
        &self,
        set: &mut JoinSet<Result<UnitOutcome>>,
        layout: &Layout,
        job: &DeclarationJob,
    ) {
        let emitter = self.declarations.clone();
        let source = layout.source(&job.source);
        let output = layout.out_dir.join(&job.output_path);
        let artifact = PathBuf::from(&job.output_path);
        set.spawn(async move {
            debug!(source = %source.display(), "emitting declarations");
            emitter.emit(&source, &output).await?;
            Ok(UnitOutcome {
                artifacts: vec![artifact],
                ..UnitOutcome::default()
            })
        });
    }

    async fn write_manifest(
        &self,
        layout: &Layout,
        manifest: &PackageManifest,
        resolved: &ResolvedExports,
        plan: &BuildPlan,
        development: bool,
    ) -> Result<PathBuf> {
        let synthesized = ManifestSynthesizer::new(self.config.default_precedence)
            .synthesize(manifest, resolved, plan, development);
        let text = to_manifest_string(&synthesized)?;
        self.runtime
            .write_file(&layout.out_dir.join(MANIFEST_FILE), text.as_bytes())
            .await?;
        debug!("wrote manifest");
        Ok(PathBuf::from(MANIFEST_FILE))
    }
}

async fn execute_unit(
    compiler: Arc<dyn Compiler>,
    runtime: Arc<dyn Runtime>,
    unit: CompileUnit,
) -> Result<UnitOutcome> {
    let request = unit.request;
    debug!(
        kind = %request.descriptor.kind,
        mode = request.mode.as_str(),
        entries = request.entries.len(),
        "compiling"
    );
    let output = compiler.compile(request.clone()).await?;
    let warnings = check_imports(&request, &output)?;

    let mut artifacts: Vec<PathBuf> = output.files.iter().map(|file| file.path.clone()).collect();
    for (artifact, wrapper) in &unit.wrappers {
        let cjs_path = request.out_dir.join(artifact);
        let source = runtime.read_to_string(&cjs_path).await?;
        let exports = scan_commonjs(&cjs_path, &source)?;
        runtime
            .write_file(
                &request.out_dir.join(wrapper),
                render_node_wrapper(artifact, &exports).as_bytes(),
            )
            .await?;
        artifacts.push(PathBuf::from(wrapper));
    }

    Ok(UnitOutcome {
        artifacts,
        warnings,
        uses_mode_intrinsic: output.uses_mode_intrinsic,
    })
}

/// Apply the unresolved import policy to one compilation.
///
/// Platform modules are fine everywhere except in script bundles, where they
/// cannot be loaded. Any other undeclared import is reported and kept.
fn check_imports(request: &CompileRequest, output: &CompileOutput) -> Result<Vec<UnresolvedImport>> {
    let kind = request.descriptor.kind;
    let mut warnings = Vec::new();

    for file in &output.files {
        for specifier in &file.external_imports {
            if request.is_declared_external(specifier) {
                continue;
            }
            if is_platform_specifier(specifier) {
                if kind == TargetKind::Script {
                    return Err(Error::UnresolvedGlobalImport {
                        specifier: specifier.clone(),
                        file: file.path.display().to_string(),
                    });
                }
                continue;
            }
            warn!(
                specifier = %specifier,
                file = %file.path.display(),
                kind = %kind,
                "unresolved import left external"
            );
            warnings.push(UnresolvedImport {
                specifier: specifier.clone(),
                file: file.path.clone(),
                kind,
            });
        }
    }
    Ok(warnings)
}

/// Await every unit; the first failure cancels the rest.
async fn join_units(mut set: JoinSet<Result<UnitOutcome>>) -> Result<Vec<UnitOutcome>> {
    let mut outcomes = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        let outcome = joined.map_err(|e| Error::Task(e.to_string()))??;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::EmittedFile;
    use crate::test_utils::MemoryRuntime;
    use fanout_plan::BuildMode;

    fn request(kind: TargetKind) -> CompileRequest {
        CompileRequest {
            root: PathBuf::from("/pkg"),
            entries: IndexMap::new(),
            descriptor: TargetMatrix::default().descriptor(kind).unwrap(),
            mode: BuildMode::Production,
            out_dir: PathBuf::from("/pkg/dist"),
            global_name: None,
            externals: vec!["react".to_string()],
            sourcemap: false,
        }
    }

    fn output(imports: &[&str]) -> CompileOutput {
        CompileOutput {
            files: vec![EmittedFile {
                path: PathBuf::from("index.js"),
                is_entry: true,
                exports: Vec::new(),
                external_imports: imports.iter().map(|s| s.to_string()).collect(),
            }],
            uses_mode_intrinsic: false,
        }
    }

    #[test]
    fn test_declared_and_platform_imports_are_quiet() {
        let warnings = check_imports(
            &request(TargetKind::Module),
            &output(&["react", "react/jsx-runtime", "node:fs"]),
        )
        .unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_undeclared_import_warns() {
        let warnings =
            check_imports(&request(TargetKind::Node), &output(&["lodash", "react"])).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].specifier, "lodash");
        assert_eq!(warnings[0].kind, TargetKind::Node);
    }

    #[test]
    fn test_platform_import_fails_script() {
        let err = check_imports(&request(TargetKind::Script), &output(&["node:path"])).unwrap_err();
        assert!(matches!(
            err,
            Error::UnresolvedGlobalImport { ref specifier, .. } if specifier == "node:path"
        ));
    }

    #[test]
    fn test_layout_rejects_out_dir_above_root() {
        let runtime = Arc::new(MemoryRuntime::new("/work"));
        let config = FanoutConfig {
            out_dir: PathBuf::from(".."),
            ..FanoutConfig::default()
        };
        let executor = BuildExecutor::new("pkg", config, runtime.clone());
        assert!(matches!(executor.layout(), Err(Error::InvalidConfig(_))));

        let executor = BuildExecutor::new("pkg", FanoutConfig::default(), runtime);
        let layout = executor.layout().unwrap();
        assert_eq!(layout.root, PathBuf::from("/work/pkg"));
        assert_eq!(layout.out_dir, PathBuf::from("/work/pkg/dist"));
    }
}
