//! Deterministic output file names.
//!
//! Every artifact lives at `<stem><suffix>` relative to the output directory.
//! Stems are unique per entry and suffixes are unique per target, so no two
//! tasks of one run ever write the same file.

use crate::target::{BuildMode, TargetKind};

/// Suffix of the ESM wrapper emitted next to every node artifact.
pub const NODE_WRAPPER_SUFFIX: &str = ".mjs";
/// Suffix of emitted type declarations.
pub const DECLARATION_SUFFIX: &str = ".d.ts";

/// Output naming for one entry stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputName {
    stem: String,
}

impl OutputName {
    pub fn new(stem: impl Into<String>) -> Self {
        Self { stem: stem.into() }
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Relative artifact path for `kind` in `mode`.
    pub fn artifact(&self, kind: TargetKind, mode: BuildMode) -> String {
        self.with_suffix(target_suffix(kind), mode)
    }

    /// Relative path of the ESM wrapper paired with the node artifact.
    pub fn node_wrapper(&self, mode: BuildMode) -> String {
        self.with_suffix(NODE_WRAPPER_SUFFIX, mode)
    }

    /// Relative path of the type declaration file.
    pub fn declarations(&self) -> String {
        format!("{}{}", self.stem, DECLARATION_SUFFIX)
    }

    fn with_suffix(&self, suffix: &str, mode: BuildMode) -> String {
        match mode {
            BuildMode::Production => format!("{}{}", self.stem, suffix),
            BuildMode::Development => format!("{}{}", self.stem, dev_suffix(suffix)),
        }
    }
}

/// Artifact suffix for a target kind.
pub fn target_suffix(kind: TargetKind) -> &'static str {
    match kind {
        TargetKind::Esnext => ".esnext.js",
        TargetKind::Module => ".js",
        TargetKind::Node => ".cjs",
        TargetKind::Script => ".global.js",
        TargetKind::Browser => ".browser.js",
    }
}

/// Insert `.dev` before the final extension: `.esnext.js` → `.esnext.dev.js`.
fn dev_suffix(suffix: &str) -> String {
    match suffix.rfind('.') {
        Some(idx) => format!("{}.dev{}", &suffix[..idx], &suffix[idx..]),
        None => format!("{suffix}.dev"),
    }
}

/// Path of the source map written next to `artifact`.
pub fn source_map_path(artifact: &str) -> String {
    format!("{artifact}.map")
}

/// Manifest form of a relative artifact path: `index.js` → `./index.js`.
pub fn manifest_path(relative: &str) -> String {
    let relative = relative.trim_start_matches("./");
    format!("./{relative}")
}
