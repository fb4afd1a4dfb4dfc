//! Condition map model for declared package exports.
//!
//! A package declares, per export subpath, either a bare path or a map from
//! condition name to path. Both shapes are normalized at the boundary into a
//! [`ConditionSet`], so nothing downstream has to look at raw JSON again.

use indexmap::IndexMap;
use serde_json::Value;

/// Condition names with a meaning to the planner.
pub mod names {
    pub const DEFAULT: &str = "default";
    pub const BROWSER: &str = "browser";
    pub const NODE: &str = "node";
    pub const SCRIPT: &str = "script";
    pub const ESNEXT: &str = "esnext";
    pub const MODULE: &str = "module";
    pub const DEVELOPMENT: &str = "development";
    pub const TYPES: &str = "types";
}

/// Value of a single declared condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConditionValue {
    /// Source file backing this condition.
    Path(String),
    /// Explicit `null`: the condition is suppressed for this entry.
    Suppressed,
}

impl ConditionValue {
    /// Returns the path if this condition names one.
    pub fn as_path(&self) -> Option<&str> {
        match self {
            Self::Path(path) => Some(path.as_str()),
            Self::Suppressed => None,
        }
    }
}

/// Normalized conditions for one export subpath.
///
/// Declaration order is preserved. A key that is absent and a key set to `null`
/// mean different things: absence falls through to the next candidate, while
/// `null` suppresses the target that shares the key's name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionSet {
    conditions: IndexMap<String, ConditionValue>,
}

impl ConditionSet {
    /// Create an empty condition set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sugar for a bare string export: `{ "default": path }`.
    pub fn shorthand(path: impl Into<String>) -> Self {
        let mut set = Self::new();
        set.insert(names::DEFAULT, ConditionValue::Path(path.into()));
        set
    }

    /// Insert or replace a condition.
    pub fn insert(&mut self, name: impl Into<String>, value: ConditionValue) {
        self.conditions.insert(name.into(), value);
    }

    /// Builder-style insert of a path condition.
    pub fn with_path(mut self, name: &str, path: impl Into<String>) -> Self {
        self.insert(name, ConditionValue::Path(path.into()));
        self
    }

    /// Builder-style insert of a suppressed condition.
    pub fn with_suppressed(mut self, name: &str) -> Self {
        self.insert(name, ConditionValue::Suppressed);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ConditionValue> {
        self.conditions.get(name)
    }

    /// Path declared for `name`, if the condition exists and is not suppressed.
    pub fn path(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ConditionValue::as_path)
    }

    /// True only when `name` is explicitly set to `null`.
    pub fn is_suppressed(&self, name: &str) -> bool {
        matches!(self.get(name), Some(ConditionValue::Suppressed))
    }

    /// An entry is usable when it declares at least one of `default`, `browser`, `node`.
    pub fn is_usable(&self) -> bool {
        [names::DEFAULT, names::BROWSER, names::NODE]
            .iter()
            .any(|name| self.conditions.contains_key(*name))
    }

    /// First declared path following `order`.
    ///
    /// Suppressed candidates are skipped rather than terminating the search; the
    /// per-target suppression check happens before resolution.
    pub fn first_path(&self, order: &[&str]) -> Option<&str> {
        order.iter().find_map(|name| self.path(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConditionValue)> {
        self.conditions.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Raw declared export value, tagged by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclaredExport {
    /// `"./sub": "./src/sub.ts"`
    Shorthand(String),
    /// `"./sub": { "node": ..., "default": ... }`
    Conditional(IndexMap<String, Value>),
    /// `null`, arrays, numbers and anything else the planner does not compile.
    Opaque(Value),
}

impl DeclaredExport {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(path) => Self::Shorthand(path.clone()),
            Value::Object(map) => Self::Conditional(
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            ),
            other => Self::Opaque(other.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shorthand_is_default_condition() {
        let set = ConditionSet::shorthand("./src/index.ts");
        assert_eq!(set.path("default"), Some("./src/index.ts"));
        assert!(set.is_usable());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_suppressed_differs_from_missing() {
        let set = ConditionSet::shorthand("./a.ts").with_suppressed("script");
        assert!(set.is_suppressed("script"));
        assert!(!set.is_suppressed("browser"));
        assert_eq!(set.path("script"), None);
    }

    #[test]
    fn test_usable_requires_platform_or_default() {
        let set = ConditionSet::new().with_path("esnext", "./a.ts");
        assert!(!set.is_usable());

        let set = set.with_path("node", "./n.ts");
        assert!(set.is_usable());
    }

    #[test]
    fn test_first_path_skips_suppressed() {
        let set = ConditionSet::new()
            .with_suppressed("browser")
            .with_path("default", "./d.ts");
        assert_eq!(set.first_path(&["browser", "default"]), Some("./d.ts"));
        assert_eq!(set.first_path(&["node"]), None);
    }

    #[test]
    fn test_declared_export_shapes() {
        assert_eq!(
            DeclaredExport::from_value(&json!("./x.ts")),
            DeclaredExport::Shorthand("./x.ts".to_string())
        );
        assert!(matches!(
            DeclaredExport::from_value(&json!({ "node": "./n.ts" })),
            DeclaredExport::Conditional(_)
        ));
        assert!(matches!(
            DeclaredExport::from_value(&json!(null)),
            DeclaredExport::Opaque(Value::Null)
        ));
    }
}
