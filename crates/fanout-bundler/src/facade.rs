//! Output deduplication.
//!
//! After every artifact is written, pairs that are byte-identical (ignoring the
//! trailing source map reference) are collapsed: the duplicate is rewritten into
//! a facade that re-exports the canonical file, and its `.map` is deleted.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fanout_plan::naming::source_map_path;
use fanout_plan::{BuildPlan, TargetKind};
use path_clean::PathClean;
use tracing::debug;

use crate::exports::scan_esm;
use crate::runtime::Runtime;
use crate::Result;

const SOURCE_MAP_REFERENCE: &str = "//# sourceMappingURL=";

/// Two artifacts claimed to be interchangeable. Paths are relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacadeCandidate {
    pub canonical: String,
    pub duplicate: String,
}

/// A duplicate that was rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Facade {
    pub path: String,
    pub canonical: String,
}

/// Compares candidate pairs and rewrites duplicates into facades.
#[derive(Debug)]
pub struct DedupFacadeGenerator {
    runtime: Arc<dyn Runtime>,
    out_dir: PathBuf,
}

impl DedupFacadeGenerator {
    pub fn new(runtime: Arc<dyn Runtime>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            out_dir: out_dir.into(),
        }
    }

    /// Candidate pairs of a plan, in the order they must be applied.
    ///
    /// Production is canonical over development, and `module` over `esnext`.
    /// Development pairs come first so every comparison sees the original bytes
    /// of both sides.
    pub fn candidates(plan: &BuildPlan, development: bool) -> Vec<FacadeCandidate> {
        let mut candidates = Vec::new();

        if development {
            for entry in &plan.entries {
                for batch in &plan.batches {
                    let kind = batch.descriptor.kind;
                    let pair = (
                        plan.task(&entry.subpath, kind),
                        plan.development_task(&entry.subpath, kind),
                    );
                    if let (Some(prod), Some(dev)) = pair {
                        candidates.push(FacadeCandidate {
                            canonical: prod.output_path.clone(),
                            duplicate: dev.output_path.clone(),
                        });
                    }
                }
            }
        }

        for entry in &plan.entries {
            let pair = (
                plan.task(&entry.subpath, TargetKind::Module),
                plan.task(&entry.subpath, TargetKind::Esnext),
            );
            if let (Some(module), Some(esnext)) = pair {
                candidates.push(FacadeCandidate {
                    canonical: module.output_path.clone(),
                    duplicate: esnext.output_path.clone(),
                });
            }
        }

        candidates
    }

    /// Apply every candidate in order; returns the facades written.
    pub async fn run(&self, candidates: &[FacadeCandidate]) -> Result<Vec<Facade>> {
        let mut facades = Vec::new();
        for candidate in candidates {
            if let Some(facade) = self.apply(candidate).await? {
                facades.push(facade);
            }
        }
        Ok(facades)
    }

    /// Compare one pair and rewrite the duplicate when both are equivalent.
    pub async fn apply(&self, candidate: &FacadeCandidate) -> Result<Option<Facade>> {
        let canonical_path = self.out_dir.join(&candidate.canonical);
        let duplicate_path = self.out_dir.join(&candidate.duplicate);
        if !self.runtime.exists(&canonical_path) || !self.runtime.exists(&duplicate_path) {
            return Ok(None);
        }

        let canonical = self.runtime.read_file(&canonical_path).await?;
        let duplicate = self.runtime.read_file(&duplicate_path).await?;
        if strip_source_map_reference(&canonical) != strip_source_map_reference(&duplicate) {
            debug!(canonical = %candidate.canonical, duplicate = %candidate.duplicate, "artifacts differ");
            return Ok(None);
        }

        let specifier = relative_specifier(&candidate.duplicate, &candidate.canonical);
        let facade = if candidate.duplicate.ends_with(".cjs") {
            render_cjs_facade(&specifier)
        } else {
            let source = String::from_utf8_lossy(&canonical);
            let exports = scan_esm(&canonical_path, &source)?;
            render_esm_facade(&specifier, &exports)
        };

        self.runtime
            .write_file(&duplicate_path, facade.as_bytes())
            .await?;

        let map_path = self.out_dir.join(source_map_path(&candidate.duplicate));
        if self.runtime.exists(&map_path) {
            self.runtime.remove_file(&map_path).await?;
        }

        debug!(facade = %candidate.duplicate, canonical = %candidate.canonical, "wrote facade");
        Ok(Some(Facade {
            path: candidate.duplicate.clone(),
            canonical: candidate.canonical.clone(),
        }))
    }
}

/// Drop exactly one trailing `//# sourceMappingURL=` line, keeping everything else.
pub fn strip_source_map_reference(content: &[u8]) -> &[u8] {
    let trimmed = content
        .strip_suffix(b"\n")
        .map(|rest| rest.strip_suffix(b"\r").unwrap_or(rest))
        .unwrap_or(content);
    let line_start = trimmed
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |idx| idx + 1);

    if trimmed[line_start..].starts_with(SOURCE_MAP_REFERENCE.as_bytes()) {
        &content[..line_start]
    } else {
        content
    }
}

/// `./name` of `target` as seen from `from`. Both paths share a directory by
/// construction of the naming scheme.
fn relative_specifier(from: &str, target: &str) -> String {
    let from_dir = Path::new(from).parent().unwrap_or(Path::new(""));
    let target = Path::new(target);
    let relative = target.strip_prefix(from_dir).unwrap_or(target);
    format!("./{}", relative.to_string_lossy().replace('\\', "/"))
}

/// ESM facade re-exporting `specifier` with the surface described by `exports`.
pub fn render_esm_facade(specifier: &str, exports: &crate::ModuleExports) -> String {
    let quoted = quote(specifier);
    if exports.is_empty() {
        return format!("import {quoted};\n");
    }

    let mut out = String::new();
    for wildcard in &exports.wildcards {
        let target = if wildcard.starts_with("./") || wildcard.starts_with("../") {
            rebase_relative(specifier, wildcard)
        } else {
            wildcard.clone()
        };
        out.push_str(&format!("export * from {};\n", quote(&target)));
    }
    if !exports.named.is_empty() || !exports.wildcards.is_empty() {
        out.push_str(&format!("export * from {quoted};\n"));
    }
    if exports.has_default {
        out.push_str(&format!("export {{ default }} from {quoted};\n"));
    }
    out
}

/// CommonJS facade delegating to `specifier`.
pub fn render_cjs_facade(specifier: &str) -> String {
    format!("module.exports = require({});\n", quote(specifier))
}

/// Relative wildcards of the canonical file, seen from the facade.
fn rebase_relative(canonical: &str, wildcard: &str) -> String {
    let base = Path::new(canonical.trim_start_matches("./"))
        .parent()
        .unwrap_or(Path::new(""));
    let joined = base.join(wildcard).clean().to_string_lossy().replace('\\', "/");
    if joined.starts_with("../") {
        joined
    } else {
        format!("./{joined}")
    }
}

fn quote(specifier: &str) -> String {
    serde_json::Value::String(specifier.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModuleExports;

    #[test]
    fn test_strip_only_trailing_reference() {
        assert_eq!(
            strip_source_map_reference(b"a();\n//# sourceMappingURL=index.js.map\n"),
            b"a();\n"
        );
        assert_eq!(
            strip_source_map_reference(b"a();\n//# sourceMappingURL=index.js.map"),
            b"a();\n"
        );
        // A reference that is not the last line is content.
        let inner = b"//# sourceMappingURL=x.map\na();\n";
        assert_eq!(strip_source_map_reference(inner), inner);
        assert_eq!(strip_source_map_reference(b""), b"");
    }

    #[test]
    fn test_relative_specifier_same_directory() {
        assert_eq!(relative_specifier("utils/fs.esnext.js", "utils/fs.js"), "./fs.js");
        assert_eq!(relative_specifier("index.dev.cjs", "index.cjs"), "./index.cjs");
    }

    #[test]
    fn test_esm_facade_shapes() {
        let mut exports = ModuleExports::default();
        assert_eq!(render_esm_facade("./index.js", &exports), "import \"./index.js\";\n");

        exports.has_default = true;
        assert_eq!(
            render_esm_facade("./index.js", &exports),
            "export { default } from \"./index.js\";\n"
        );

        exports.named.insert("a".to_string());
        exports.wildcards.insert("dep".to_string());
        exports.wildcards.insert("./chunk-x.js".to_string());
        assert_eq!(
            render_esm_facade("./index.js", &exports),
            concat!(
                "export * from \"dep\";\n",
                "export * from \"./chunk-x.js\";\n",
                "export * from \"./index.js\";\n",
                "export { default } from \"./index.js\";\n",
            )
        );
    }

    #[test]
    fn test_cjs_facade() {
        assert_eq!(
            render_cjs_facade("./index.cjs"),
            "module.exports = require(\"./index.cjs\");\n"
        );
    }
}
