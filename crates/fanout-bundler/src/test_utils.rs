//! Test utilities for fanout-bundler.
//!
//! Available in unit tests and, with the `test-utils` feature, to integration
//! tests and dependent crates.
//!
//! - [`MemoryRuntime`]: an in-memory [`Runtime`]
//! - [`RecordingCompiler`]: a [`Compiler`] that copies entry sources to their
//!   planned artifact paths and records every request
//! - [`RecordingDeclarationEmitter`]: writes a stub `.d.ts` per entry

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use fanout_plan::{ModuleFormat, TargetKind};
use fanout_plan::naming::source_map_path;
use parking_lot::{Mutex, RwLock};
use path_clean::PathClean;
use regex::Regex;
use rustc_hash::FxHashMap;

use crate::compiler::{CompileOutput, CompileRequest, Compiler, DeclarationEmitter, EmittedFile};
use crate::rolldown_compiler::ENV_SPECIFIER;
use crate::runtime::{Runtime, RuntimeError, RuntimeResult};
use crate::{Error, Result};

/// In-memory filesystem. Directories exist implicitly while they contain files.
///
/// ```rust
/// use fanout_bundler::Runtime;
/// use fanout_bundler::test_utils::MemoryRuntime;
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() {
/// let runtime = MemoryRuntime::new("/pkg").with_file("src/index.ts", "export const a = 1;");
/// assert!(runtime.exists(Path::new("/pkg/src")));
/// let content = runtime.read_file(Path::new("src/index.ts")).await.unwrap();
/// assert_eq!(content, b"export const a = 1;");
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryRuntime {
    cwd: PathBuf,
    files: RwLock<FxHashMap<PathBuf, Vec<u8>>>,
}

impl MemoryRuntime {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            files: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn with_file(self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = self.resolve(path.as_ref());
        self.files.write().insert(path, content.into());
    }

    /// File content as text, if present.
    pub fn read_string(&self, path: impl AsRef<Path>) -> Option<String> {
        let path = self.resolve(path.as_ref());
        self.files
            .read()
            .get(&path)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Paths of all files below `dir`, relative to it, sorted.
    pub fn files_under(&self, dir: impl AsRef<Path>) -> Vec<String> {
        let dir = self.resolve(dir.as_ref());
        let mut found: Vec<String> = self
            .files
            .read()
            .keys()
            .filter_map(|path| path.strip_prefix(&dir).ok())
            .map(|rel| rel.to_string_lossy().replace('\\', "/"))
            .collect();
        found.sort();
        found
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf().clean()
        } else {
            self.cwd.join(path).clean()
        }
    }
}

#[async_trait]
impl Runtime for MemoryRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        let path = self.resolve(path);
        self.files
            .read()
            .get(&path)
            .cloned()
            .ok_or(RuntimeError::FileNotFound(path))
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()> {
        let path = self.resolve(path);
        self.files.write().insert(path, content.to_vec());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let path = self.resolve(path);
        self.files
            .read()
            .keys()
            .any(|file| file == &path || file.starts_with(&path))
    }

    async fn create_dir(&self, _path: &Path, _recursive: bool) -> RuntimeResult<()> {
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> RuntimeResult<()> {
        let path = self.resolve(path);
        match self.files.write().remove(&path) {
            Some(_) => Ok(()),
            None => Err(RuntimeError::FileNotFound(path)),
        }
    }

    async fn remove_dir_all(&self, path: &Path) -> RuntimeResult<()> {
        let path = self.resolve(path);
        self.files.write().retain(|file, _| !file.starts_with(&path));
        Ok(())
    }

    fn get_cwd(&self) -> RuntimeResult<PathBuf> {
        Ok(self.cwd.clone())
    }
}

/// Bare specifiers of `import ... from "x"`, `import "x"` and `require("x")`.
static BARE_IMPORT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?:\bfrom\s*|\bimport\s*|\brequire\()\s*["']([^"'./][^"']*)["']"#).ok()
});

type Transform = dyn Fn(&str, &CompileRequest) -> String + Send + Sync;

/// Copies every entry source to its planned artifact path.
///
/// CommonJS requests get an `exports.<name>` line per top-level export so the
/// output parses as a script. An optional transform then sees the rendered
/// code. A trailing source map reference and a `.map` file are written when the
/// request asks for source maps, so dedup sees realistic output.
#[derive(Default)]
pub struct RecordingCompiler {
    runtime: Option<Arc<dyn Runtime>>,
    transform: Option<Arc<Transform>>,
    fail_on: Option<TargetKind>,
    requests: Mutex<Vec<CompileRequest>>,
}

impl std::fmt::Debug for RecordingCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingCompiler")
            .field("fail_on", &self.fail_on)
            .field("requests", &self.requests.lock().len())
            .finish()
    }
}

impl RecordingCompiler {
    pub fn new(runtime: Arc<dyn Runtime>) -> Self {
        Self {
            runtime: Some(runtime),
            ..Default::default()
        }
    }

    /// Rewrite source text before it is written.
    pub fn with_transform(
        mut self,
        transform: impl Fn(&str, &CompileRequest) -> String + Send + Sync + 'static,
    ) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Fail every request for `kind`.
    pub fn failing_on(mut self, kind: TargetKind) -> Self {
        self.fail_on = Some(kind);
        self
    }

    /// Requests seen so far, in completion order.
    pub fn requests(&self) -> Vec<CompileRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Compiler for RecordingCompiler {
    async fn compile(&self, request: CompileRequest) -> Result<CompileOutput> {
        self.requests.lock().push(request.clone());

        if self.fail_on == Some(request.descriptor.kind) {
            return Err(Error::CompileFailed {
                target: request.descriptor.kind.to_string(),
                message: "recording compiler asked to fail".to_string(),
            });
        }
        let Some(runtime) = &self.runtime else {
            return Ok(CompileOutput::default());
        };

        let mut output = CompileOutput::default();
        for (stem, source) in &request.entries {
            let original = runtime.read_to_string(source).await?;
            let rendered = match request.descriptor.format {
                ModuleFormat::Cjs => render_commonjs(&original),
                ModuleFormat::Esm | ModuleFormat::Iife => original.clone(),
            };
            let mut code = match &self.transform {
                Some(transform) => transform(&rendered, &request),
                None => rendered,
            };

            let artifact = request.artifact_path(stem);
            if request.sourcemap {
                let map_name = source_map_path(&artifact);
                let file_name = Path::new(&map_name)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                code.push_str(&format!("\n//# sourceMappingURL={file_name}\n"));
                runtime
                    .write_file(
                        &request.out_dir.join(&map_name),
                        br#"{"version":3,"sources":[],"mappings":""}"#,
                    )
                    .await?;
            }
            runtime
                .write_file(&request.out_dir.join(&artifact), code.as_bytes())
                .await?;

            output.uses_mode_intrinsic |= original.contains(ENV_SPECIFIER);
            output.files.push(EmittedFile {
                path: PathBuf::from(&artifact),
                is_entry: true,
                exports: Vec::new(),
                external_imports: bare_imports(&original),
            });
        }
        Ok(output)
    }
}

/// `export const|let|var|function|class <name>` and `export default`.
static ESM_EXPORT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?m)^export\s+(?:(default)\b|(?:async\s+)?(?:const|let|var|function\*?|class)\s+([A-Za-z_$][A-Za-z0-9_$]*))").ok()
});

fn render_commonjs(source: &str) -> String {
    let mut out = String::from("\"use strict\";\n");
    let Some(re) = ESM_EXPORT.as_ref() else {
        return out;
    };
    for caps in re.captures_iter(source) {
        if caps.get(1).is_some() {
            out.push_str("exports.default = undefined;\n");
        } else if let Some(name) = caps.get(2) {
            out.push_str(&format!("exports.{0} = undefined;\n", name.as_str()));
        }
    }
    out
}

fn bare_imports(source: &str) -> Vec<String> {
    let Some(re) = BARE_IMPORT.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(source)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|specifier| specifier != ENV_SPECIFIER)
        .collect()
}

/// Writes `export {};` for every entry and records (source, output) pairs.
#[derive(Debug)]
pub struct RecordingDeclarationEmitter {
    runtime: Arc<dyn Runtime>,
    emitted: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl RecordingDeclarationEmitter {
    pub fn new(runtime: Arc<dyn Runtime>) -> Self {
        Self {
            runtime,
            emitted: Mutex::new(Vec::new()),
        }
    }

    pub fn emitted(&self) -> Vec<(PathBuf, PathBuf)> {
        self.emitted.lock().clone()
    }
}

#[async_trait]
impl DeclarationEmitter for RecordingDeclarationEmitter {
    async fn emit(&self, source: &Path, output: &Path) -> Result<()> {
        self.runtime.write_file(output, b"export {};\n").await?;
        self.emitted
            .lock()
            .push((source.to_path_buf(), output.to_path_buf()));
        Ok(())
    }
}
