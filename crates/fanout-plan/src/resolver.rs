//! Declared export map normalization.
//!
//! [`ExportMapResolver`] turns the `exports` field into [`EntryPlan`]s in
//! declaration order. Subpaths that cannot be compiled are not errors: they are
//! kept as [`PassthroughExport`]s and copied verbatim into the output manifest.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::conditions::{ConditionSet, ConditionValue, DeclaredExport};
use crate::global_name::package_global;
use crate::package::PackageManifest;

/// Source files the compilers accept.
static SOURCE_EXTENSION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\.(?:ts|tsx|js|jsx|mjs|cjs)$").ok());

/// Returns true if `path` names a compilable source file.
pub fn is_source_path(path: &str) -> bool {
    SOURCE_EXTENSION
        .as_ref()
        .is_some_and(|re| re.is_match(path))
}

/// One compilable export subpath.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPlan {
    /// Declared subpath: `.`, `./web`, `./utils/fs`.
    pub subpath: String,
    pub conditions: ConditionSet,
    /// Output stem; the package short name for `.`.
    pub stem: String,
    /// Whether this is the `.` entry.
    pub is_main: bool,
}

/// A declared subpath copied into the output manifest unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct PassthroughExport {
    pub subpath: String,
    pub value: Value,
}

/// A declared subpath, either planned or passed through.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportSlot {
    Entry(EntryPlan),
    Passthrough(PassthroughExport),
}

/// Resolver output, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedExports {
    pub slots: Vec<ExportSlot>,
    /// Global identifier derived from the package name.
    pub package_global: String,
}

impl ResolvedExports {
    /// Compilable entries in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = &EntryPlan> {
        self.slots.iter().filter_map(|slot| match slot {
            ExportSlot::Entry(entry) => Some(entry),
            ExportSlot::Passthrough(_) => None,
        })
    }

    pub fn passthrough(&self) -> impl Iterator<Item = &PassthroughExport> {
        self.slots.iter().filter_map(|slot| match slot {
            ExportSlot::Passthrough(pass) => Some(pass),
            ExportSlot::Entry(_) => None,
        })
    }

    /// The `.` entry, if it survived resolution.
    pub fn main(&self) -> Option<&EntryPlan> {
        self.entries().find(|entry| entry.is_main)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Normalizes a package's declared export map.
pub struct ExportMapResolver<'a> {
    manifest: &'a PackageManifest,
}

impl<'a> ExportMapResolver<'a> {
    pub fn new(manifest: &'a PackageManifest) -> Self {
        Self { manifest }
    }

    /// Resolve the declared export map. Pure: identical input yields identical output.
    pub fn resolve(&self) -> ResolvedExports {
        let Some(exports) = &self.manifest.exports else {
            warn!(package = %self.manifest.name, "package declares no exports, nothing to build");
            return ResolvedExports {
                slots: Vec::new(),
                package_global: package_global(self.manifest),
            };
        };

        let declared: Vec<(String, Value)> = match exports {
            Value::Object(map) if map.keys().all(|key| key.starts_with('.')) => {
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            }
            // `"exports": "./src/index.ts"` and `"exports": { "node": ..., "default": ... }`
            // both describe the `.` entry.
            other => vec![(".".to_string(), other.clone())],
        };

        let mut stems = HashSet::new();
        let slots = declared
            .into_iter()
            .map(|(subpath, value)| {
                let planned = self
                    .resolve_entry(&subpath, &value)
                    .zip(self.stem_for(&subpath));
                (subpath, value, planned)
            })
            .map(|(subpath, value, planned)| match planned {
                Some((conditions, stem)) => {
                    let is_main = subpath == ".";
                    let stem = unique_stem(&mut stems, stem);
                    ExportSlot::Entry(EntryPlan {
                        subpath,
                        conditions,
                        stem,
                        is_main,
                    })
                }
                None => {
                    debug!(subpath = %subpath, "export passed through without a build");
                    ExportSlot::Passthrough(PassthroughExport { subpath, value })
                }
            })
            .collect();

        ResolvedExports {
            slots,
            package_global: package_global(self.manifest),
        }
    }

    fn resolve_entry(&self, subpath: &str, value: &Value) -> Option<ConditionSet> {
        // Pattern subpaths map many files and cannot be compiled as one entry.
        if subpath.contains('*') {
            return None;
        }

        let conditions = match DeclaredExport::from_value(value) {
            DeclaredExport::Shorthand(path) => {
                is_source_path(&path).then(|| ConditionSet::shorthand(path))?
            }
            DeclaredExport::Conditional(map) => {
                let mut set = ConditionSet::new();
                for (name, value) in map {
                    let value = match value {
                        Value::Null => ConditionValue::Suppressed,
                        Value::String(path) if is_source_path(&path) => ConditionValue::Path(path),
                        _ => return None,
                    };
                    set.insert(name, value);
                }
                set
            }
            DeclaredExport::Opaque(_) => return None,
        };

        conditions.is_usable().then_some(conditions)
    }

    /// Output stem for `subpath`, or `None` when it would not name a file
    /// inside the output directory.
    fn stem_for(&self, subpath: &str) -> Option<String> {
        let stem = if subpath == "." {
            self.manifest.short_name()
        } else {
            let stem = subpath.strip_prefix("./")?.trim_end_matches('/');
            stem.strip_suffix(".mjs")
                .or_else(|| stem.strip_suffix(".cjs"))
                .or_else(|| stem.strip_suffix(".js"))
                .unwrap_or(stem)
        };
        is_safe_stem(stem).then(|| stem.to_string())
    }
}

/// Relative, non-empty segments only: no `..`, `.`, empty or dot-only names.
fn is_safe_stem(stem: &str) -> bool {
    !stem.is_empty()
        && !stem.contains('\\')
        && stem
            .split('/')
            .all(|segment| !segment.is_empty() && !segment.starts_with('.'))
}

/// First come keeps the stem; later collisions get a numeric suffix.
fn unique_stem(taken: &mut HashSet<String>, stem: String) -> String {
    if taken.insert(stem.clone()) {
        return stem;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{stem}-{n}");
        if taken.insert(candidate.clone()) {
            debug!(stem = %stem, renamed = %candidate, "output stem collision");
            return candidate;
        }
        n += 1;
    }
}
