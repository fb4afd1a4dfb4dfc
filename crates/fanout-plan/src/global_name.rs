//! Global identifiers for script (IIFE) bundles.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::package::PackageManifest;
use crate::resolver::EntryPlan;

/// `// @globalName Acme.Widgets` on a line of its own.
static MARKER: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*//\s*@globalName\s+([A-Za-z_$][A-Za-z0-9_$]*(?:\.[A-Za-z_$][A-Za-z0-9_$]*)*)\s*$")
        .ok()
});

/// Read the global name override marker from entry source text.
pub fn read_global_name_marker(source: &str) -> Option<String> {
    MARKER
        .as_ref()?
        .captures(source)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Replace characters outside `[A-Za-z0-9_$]` with `_`; prefix `_` before a leading digit.
pub fn legalize_identifier(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Derive the package global from the manifest name. A scoped package maps to `scope.name`.
pub fn package_global(manifest: &PackageManifest) -> String {
    match manifest.scope() {
        Some(scope) => format!(
            "{}.{}",
            legalize_identifier(scope),
            legalize_identifier(manifest.short_name())
        ),
        None => legalize_identifier(manifest.short_name()),
    }
}

/// Global name assignment for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalNames {
    package_global: String,
    overrides: HashMap<PathBuf, String>,
}

impl GlobalNames {
    pub fn new(package_global: impl Into<String>) -> Self {
        Self {
            package_global: package_global.into(),
            overrides: HashMap::new(),
        }
    }

    /// Register marker overrides keyed by entry source path.
    pub fn with_overrides(mut self, overrides: HashMap<PathBuf, String>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn package_global(&self) -> &str {
        &self.package_global
    }

    /// Global name for the script bundle of `entry` built from `source`.
    pub fn for_entry(&self, entry: &EntryPlan, source: &str) -> String {
        if let Some(name) = self.overrides.get(&PathBuf::from(source)) {
            return name.clone();
        }
        if entry.is_main {
            self.package_global.clone()
        } else {
            let segment = entry.subpath.trim_start_matches("./");
            format!("{}_{}", self.package_global, legalize_identifier(segment))
        }
    }
}
