//! Collaborator seams: the compiler that turns sources into artifacts, and the
//! emitter that writes type declarations.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fanout_plan::{BuildMode, OutputName, TargetDescriptor};
use indexmap::IndexMap;

use crate::Result;

/// One compilation unit: every entry of a batch, or a single script entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    /// Package root; relative sources resolve against it.
    pub root: PathBuf,
    /// Entry stem to absolute source path, in plan order.
    pub entries: IndexMap<String, PathBuf>,
    pub descriptor: TargetDescriptor,
    pub mode: BuildMode,
    /// Directory artifacts are written to.
    pub out_dir: PathBuf,
    /// Global identifier for script bundles.
    pub global_name: Option<String>,
    /// Packages left as imports: declared dependencies plus configured externals.
    pub externals: Vec<String>,
    pub sourcemap: bool,
}

impl CompileRequest {
    /// Artifact path of `stem`, relative to `out_dir`.
    pub fn artifact_path(&self, stem: &str) -> String {
        OutputName::new(stem).artifact(self.descriptor.kind, self.mode)
    }

    /// Returns true if `specifier` is a declared external or one of its subpaths.
    pub fn is_declared_external(&self, specifier: &str) -> bool {
        self.externals
            .iter()
            .any(|external| fanout_plan::package::is_same_or_subpath(specifier, external))
    }
}

/// A file written by a compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmittedFile {
    /// Path relative to the output directory.
    pub path: PathBuf,
    pub is_entry: bool,
    /// Static export names, when the compiler knows them.
    pub exports: Vec<String>,
    /// Specifiers left unbundled by this file.
    pub external_imports: Vec<String>,
}

/// What a compilation wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOutput {
    pub files: Vec<EmittedFile>,
    /// Some compiled module imported the build-mode intrinsic.
    pub uses_mode_intrinsic: bool,
}

impl CompileOutput {
    pub fn entry(&self, path: &Path) -> Option<&EmittedFile> {
        self.files.iter().find(|file| file.is_entry && file.path == path)
    }
}

/// Compiles one unit and writes its artifacts.
#[async_trait]
pub trait Compiler: Send + Sync + std::fmt::Debug {
    async fn compile(&self, request: CompileRequest) -> Result<CompileOutput>;
}

/// Writes the type declarations of one entry.
#[async_trait]
pub trait DeclarationEmitter: Send + Sync + std::fmt::Debug {
    async fn emit(&self, source: &Path, output: &Path) -> Result<()>;
}
