//! Rolldown-backed [`Compiler`].
//!
//! Each request becomes one Rolldown build: every entry of a batch is an input
//! of the same bundle (so shared code lands in common chunks), a script request
//! has exactly one input. Output is written through the [`Runtime`].

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use fanout_plan::{BuildMode, ModuleFormat, Platform, TargetKind};
use regex::Regex;
use rolldown::{
    BundlerBuilder, BundlerOptions, InputItem, OutputFormat, RawMinifyOptions, SourceMapType,
};
use rolldown_common::{
    BundlerTransformOptions, Either, ModuleType, Output, ResolvedExternal, StrOrBytes,
};
use rolldown_plugin::{
    __inner::SharedPluginable, HookLoadArgs, HookLoadOutput, HookLoadReturn, HookResolveIdArgs,
    HookResolveIdOutput, HookResolveIdReturn, HookUsage, Plugin, PluginContext,
};
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::compiler::{CompileOutput, CompileRequest, Compiler, EmittedFile};
use crate::runtime::Runtime;
use crate::{Error, Result};

/// Specifier of the build-mode intrinsic module.
pub const ENV_SPECIFIER: &str = "fanout:env";

/// Module id the intrinsic resolves to; the `\0` prefix keeps other plugins away.
const ENV_MODULE_ID: &str = "\0fanout:env";

/// `node:fs`, `bun:ffi`, `deno:...`
static PLATFORM_NAMESPACE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z]+:").ok());

/// Returns true if `specifier` is rooted at a platform namespace.
pub fn is_platform_specifier(specifier: &str) -> bool {
    PLATFORM_NAMESPACE
        .as_ref()
        .is_some_and(|re| re.is_match(specifier))
        && specifier != ENV_SPECIFIER
}

/// Source of the intrinsic module for `mode`.
pub fn env_module_source(mode: BuildMode) -> String {
    format!(
        "export const MODE = \"{}\";\nexport const DEV = {};\nexport const PROD = {};\n",
        mode.as_str(),
        mode.is_dev(),
        !mode.is_dev()
    )
}

/// How the plugin answers a specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolution {
    Intrinsic,
    External,
}

/// Serves `fanout:env` and keeps dependencies and platform modules external.
///
/// Resolving the intrinsic trips the mode latch of this compilation.
#[derive(Debug)]
pub struct FanoutEnvPlugin {
    mode: BuildMode,
    externals: Vec<String>,
    latch: Arc<AtomicBool>,
}

impl FanoutEnvPlugin {
    pub fn new(mode: BuildMode, externals: Vec<String>) -> Self {
        Self {
            mode,
            externals,
            latch: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set once any module of the build imports the intrinsic.
    pub fn latch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.latch)
    }

    fn classify(&self, specifier: &str) -> Option<Resolution> {
        if specifier == ENV_SPECIFIER {
            return Some(Resolution::Intrinsic);
        }
        let declared = self
            .externals
            .iter()
            .any(|external| fanout_plan::package::is_same_or_subpath(specifier, external));
        if declared || is_platform_specifier(specifier) {
            return Some(Resolution::External);
        }
        None
    }
}

impl Plugin for FanoutEnvPlugin {
    fn name(&self) -> Cow<'static, str> {
        "fanout-env".into()
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::ResolveId | HookUsage::Load
    }

    fn resolve_id(
        &self,
        _ctx: &PluginContext,
        args: &HookResolveIdArgs,
    ) -> impl std::future::Future<Output = HookResolveIdReturn> + Send {
        let specifier = args.specifier.to_string();
        let resolution = self.classify(&specifier);
        if resolution == Some(Resolution::Intrinsic) {
            self.latch.store(true, Ordering::Relaxed);
        }

        async move {
            Ok(match resolution {
                Some(Resolution::Intrinsic) => Some(HookResolveIdOutput {
                    id: ENV_MODULE_ID.to_string().into(),
                    external: Some(ResolvedExternal::Bool(false)),
                    ..Default::default()
                }),
                Some(Resolution::External) => Some(HookResolveIdOutput {
                    id: specifier.into(),
                    external: Some(ResolvedExternal::Bool(true)),
                    ..Default::default()
                }),
                None => None,
            })
        }
    }

    fn load(
        &self,
        _ctx: &PluginContext,
        args: &HookLoadArgs<'_>,
    ) -> impl std::future::Future<Output = HookLoadReturn> + Send {
        let is_env = args.id.to_string() == ENV_MODULE_ID;
        let mode = self.mode;

        async move {
            if !is_env {
                return Ok(None);
            }
            Ok(Some(HookLoadOutput {
                code: env_module_source(mode).into(),
                module_type: Some(ModuleType::Js),
                ..Default::default()
            }))
        }
    }
}

/// Compiles requests with Rolldown and writes chunks, assets and maps.
#[derive(Debug, Clone)]
pub struct RolldownCompiler {
    runtime: Arc<dyn Runtime>,
}

impl RolldownCompiler {
    pub fn new(runtime: Arc<dyn Runtime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl Compiler for RolldownCompiler {
    async fn compile(&self, request: CompileRequest) -> Result<CompileOutput> {
        let kind = request.descriptor.kind;
        let plugin = Arc::new(FanoutEnvPlugin::new(request.mode, request.externals.clone()));
        let latch = plugin.latch();
        let plugins: Vec<SharedPluginable> = vec![plugin];

        let mut bundler = BundlerBuilder::default()
            .with_options(bundler_options(&request))
            .with_plugins(plugins)
            .build()
            .map_err(|e| compile_failed(kind, &e))?;
        let bundle = bundler
            .generate()
            .await
            .map_err(|e| compile_failed(kind, &e))?;

        let emitted: FxHashSet<String> = bundle
            .assets
            .iter()
            .map(|output| match output {
                Output::Chunk(chunk) => chunk.filename.to_string(),
                Output::Asset(asset) => asset.filename.to_string(),
            })
            .collect();

        let mut files = Vec::new();
        for output in &bundle.assets {
            match output {
                Output::Chunk(chunk) => {
                    let path = PathBuf::from(chunk.filename.as_str());
                    self.runtime
                        .write_file(&request.out_dir.join(&path), chunk.code.as_bytes())
                        .await?;

                    let map_name = format!("{}.map", chunk.filename);
                    if let (Some(map), false) = (&chunk.map, emitted.contains(&map_name)) {
                        self.runtime
                            .write_file(&request.out_dir.join(&map_name), map.to_json_string().as_bytes())
                            .await?;
                    }

                    files.push(EmittedFile {
                        path,
                        is_entry: chunk.is_entry,
                        exports: chunk.exports.iter().map(|name| name.to_string()).collect(),
                        external_imports: chunk
                            .imports
                            .iter()
                            .filter(|import| !emitted.contains(import.as_str()))
                            .map(|import| import.to_string())
                            .collect(),
                    });
                }
                Output::Asset(asset) => {
                    let bytes: &[u8] = match &asset.source {
                        StrOrBytes::Str(s) => s.as_bytes(),
                        StrOrBytes::Bytes(b) => b,
                    };
                    self.runtime
                        .write_file(&request.out_dir.join(asset.filename.as_str()), bytes)
                        .await?;
                }
            }
        }

        let uses_mode_intrinsic = latch.load(Ordering::Relaxed);
        debug!(
            kind = %kind,
            mode = request.mode.as_str(),
            files = files.len(),
            uses_mode_intrinsic,
            "rolldown build finished"
        );

        Ok(CompileOutput {
            files,
            uses_mode_intrinsic,
        })
    }
}

/// Rolldown options for one request.
pub fn bundler_options(request: &CompileRequest) -> BundlerOptions {
    let descriptor = &request.descriptor;
    // Chunk names share the artifact suffix so kinds and modes never collide.
    let suffix = request.artifact_path("");

    BundlerOptions {
        input: Some(
            request
                .entries
                .iter()
                .map(|(stem, source)| InputItem {
                    name: Some(stem.clone()),
                    import: source.to_string_lossy().into_owned(),
                })
                .collect(),
        ),
        cwd: Some(request.root.clone()),
        format: Some(output_format(descriptor.format)),
        platform: Some(platform(descriptor.platform)),
        sourcemap: request.sourcemap.then_some(SourceMapType::File),
        entry_filenames: Some(format!("[name]{suffix}").into()),
        chunk_filenames: Some(format!("[name]-[hash]{suffix}").into()),
        minify: descriptor.minify.then(|| RawMinifyOptions::from(true)),
        name: request.global_name.clone(),
        transform: Some(BundlerTransformOptions {
            target: Some(Either::Left(descriptor.language_level.clone())),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn output_format(format: ModuleFormat) -> OutputFormat {
    match format {
        ModuleFormat::Esm => OutputFormat::Esm,
        ModuleFormat::Cjs => OutputFormat::Cjs,
        ModuleFormat::Iife => OutputFormat::Iife,
    }
}

fn platform(platform: Platform) -> rolldown::Platform {
    match platform {
        Platform::Node => rolldown::Platform::Node,
        Platform::Browser => rolldown::Platform::Browser,
        Platform::Neutral => rolldown::Platform::Neutral,
    }
}

fn compile_failed(kind: TargetKind, error: &dyn std::fmt::Debug) -> Error {
    Error::CompileFailed {
        target: kind.to_string(),
        message: format!("{:?}", error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_plan::TargetMatrix;
    use indexmap::IndexMap;

    fn request(kind: TargetKind, mode: BuildMode) -> CompileRequest {
        CompileRequest {
            root: PathBuf::from("/pkg"),
            entries: IndexMap::from([
                ("index".to_string(), PathBuf::from("/pkg/src/index.ts")),
                ("utils/fs".to_string(), PathBuf::from("/pkg/src/fs.ts")),
            ]),
            descriptor: TargetMatrix::default().descriptor(kind).unwrap(),
            mode,
            out_dir: PathBuf::from("/pkg/dist"),
            global_name: (kind == TargetKind::Script).then(|| "acme.widgets".to_string()),
            externals: vec!["react".to_string()],
            sourcemap: true,
        }
    }

    #[test]
    fn test_env_module_source() {
        assert_eq!(
            env_module_source(BuildMode::Development),
            "export const MODE = \"development\";\nexport const DEV = true;\nexport const PROD = false;\n"
        );
        assert!(env_module_source(BuildMode::Production).contains("PROD = true"));
    }

    #[test]
    fn test_plugin_classification() {
        let plugin = FanoutEnvPlugin::new(BuildMode::Production, vec!["react".to_string()]);
        assert_eq!(plugin.classify("fanout:env"), Some(Resolution::Intrinsic));
        assert_eq!(plugin.classify("react/jsx-runtime"), Some(Resolution::External));
        assert_eq!(plugin.classify("node:fs"), Some(Resolution::External));
        assert_eq!(plugin.classify("env"), None);
        assert_eq!(plugin.classify("./local.js"), None);
        assert_eq!(plugin.classify("react-dom"), None);
        assert!(!plugin.latch().load(Ordering::Relaxed));
    }

    #[test]
    fn test_platform_specifier() {
        assert!(is_platform_specifier("node:path"));
        assert!(is_platform_specifier("bun:sqlite"));
        assert!(!is_platform_specifier("fanout:env"));
        assert!(!is_platform_specifier("lodash"));
        assert!(!is_platform_specifier("@scope/pkg"));
    }

    #[test]
    fn test_bundler_options_per_kind() {
        let node = bundler_options(&request(TargetKind::Node, BuildMode::Development));
        assert!(matches!(node.format, Some(OutputFormat::Cjs)));
        assert!(matches!(node.platform, Some(rolldown::Platform::Node)));
        assert_eq!(node.input.as_ref().map(Vec::len), Some(2));
        assert!(node.minify.is_none());
        assert!(node.name.is_none());
        assert!(matches!(
            node.transform.as_ref().and_then(|t| t.target.as_ref()),
            Some(Either::Left(level)) if level == "node18"
        ));

        let script = bundler_options(&request(TargetKind::Script, BuildMode::Production));
        assert!(matches!(script.format, Some(OutputFormat::Iife)));
        assert!(script.minify.is_some());
        assert_eq!(script.name.as_deref(), Some("acme.widgets"));
        assert!(matches!(
            script.transform.as_ref().and_then(|t| t.target.as_ref()),
            Some(Either::Left(level)) if level == "es2017"
        ));
    }
}
