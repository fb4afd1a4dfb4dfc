//! Package manifest model.
//!
//! Only the fields planning depends on are typed. Everything else stays in the
//! raw document so the published manifest can be written back with untouched
//! fields in their original order.

use indexmap::IndexSet;
use serde_json::{Map, Value};

use crate::{PlanError, Result};

/// Maximum accepted size for a manifest document (10MB).
pub const MAX_MANIFEST_SIZE: usize = 10 * 1024 * 1024;

/// Parsed `package.json`.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageManifest {
    /// Full package name, possibly scoped (`@scope/name`).
    pub name: String,
    pub version: Option<String>,
    /// Raw `exports` field; shape is checked here, meaning is left to the resolver.
    pub exports: Option<Value>,
    /// Names from `dependencies` and `peerDependencies`, in declaration order.
    pub dependencies: IndexSet<String>,
    document: Map<String, Value>,
}

impl PackageManifest {
    /// Parse a manifest from JSON text.
    pub fn from_json_str(source: &str) -> Result<Self> {
        if source.len() > MAX_MANIFEST_SIZE {
            return Err(PlanError::InvalidManifest(format!(
                "manifest exceeds maximum size of {}MB",
                MAX_MANIFEST_SIZE / 1024 / 1024
            )));
        }

        let value: Value = serde_json::from_str(source)
            .map_err(|e| PlanError::InvalidManifest(format!("invalid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Build a manifest from an already-parsed JSON document.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(document) = value else {
            return Err(PlanError::InvalidManifest(
                "top-level value must be an object".to_string(),
            ));
        };

        let name = match document.get("name") {
            Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
            _ => return Err(PlanError::MissingName),
        };

        let version = document
            .get("version")
            .and_then(Value::as_str)
            .map(str::to_string);

        let exports = match document.get("exports") {
            None => None,
            Some(value @ (Value::String(_) | Value::Object(_))) => Some(value.clone()),
            Some(other) => {
                return Err(PlanError::InvalidManifest(format!(
                    "`exports` must be a string or an object, found {}",
                    json_kind(other)
                )));
            }
        };

        let mut dependencies = IndexSet::new();
        for field in ["dependencies", "peerDependencies"] {
            if let Some(Value::Object(deps)) = document.get(field) {
                dependencies.extend(deps.keys().cloned());
            }
        }

        Ok(Self {
            name,
            version,
            exports,
            dependencies,
            document,
        })
    }

    /// Name without its scope: `@acme/widgets` → `widgets`.
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Scope without the leading `@`, if the package is scoped.
    pub fn scope(&self) -> Option<&str> {
        self.name
            .strip_prefix('@')
            .and_then(|rest| rest.split_once('/'))
            .map(|(scope, _)| scope)
    }

    /// Raw manifest document in declaration order.
    pub fn document(&self) -> &Map<String, Value> {
        &self.document
    }

    /// Returns true if `specifier` names a declared dependency or one of its subpaths.
    pub fn declares_dependency(&self, specifier: &str) -> bool {
        self.dependencies.iter().any(|dep| is_same_or_subpath(specifier, dep))
    }
}

/// `react` matches `react` and `react/jsx-runtime`, but not `react-dom`.
pub fn is_same_or_subpath(specifier: &str, package: &str) -> bool {
    specifier == package
        || specifier
            .strip_prefix(package)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scoped_package() {
        let manifest = PackageManifest::from_json_str(
            r#"{
                "name": "@acme/widgets",
                "version": "1.2.0",
                "exports": "./src/index.ts",
                "dependencies": { "lodash": "^4" },
                "peerDependencies": { "react": "*" }
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.short_name(), "widgets");
        assert_eq!(manifest.scope(), Some("acme"));
        assert_eq!(manifest.version.as_deref(), Some("1.2.0"));
        assert_eq!(
            manifest.dependencies.iter().collect::<Vec<_>>(),
            vec!["lodash", "react"]
        );
    }

    #[test]
    fn test_unscoped_package_has_no_scope() {
        let manifest = PackageManifest::from_json_str(r#"{ "name": "tiny" }"#).unwrap();
        assert_eq!(manifest.short_name(), "tiny");
        assert_eq!(manifest.scope(), None);
        assert!(manifest.exports.is_none());
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let err = PackageManifest::from_json_str(r#"{ "version": "1.0.0" }"#).unwrap_err();
        assert!(matches!(err, PlanError::MissingName));

        let err = PackageManifest::from_json_str(r#"{ "name": "  " }"#).unwrap_err();
        assert!(matches!(err, PlanError::MissingName));
    }

    #[test]
    fn test_exports_shape_is_checked() {
        let err =
            PackageManifest::from_json_str(r#"{ "name": "x", "exports": ["./a.js"] }"#).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn test_document_keeps_field_order() {
        let manifest = PackageManifest::from_json_str(
            r#"{ "name": "x", "zeta": 1, "alpha": 2, "exports": "./a.ts" }"#,
        )
        .unwrap();
        let keys: Vec<_> = manifest.document().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "zeta", "alpha", "exports"]);
    }

    #[test]
    fn test_dependency_subpaths() {
        let manifest = PackageManifest::from_json_str(
            r#"{ "name": "x", "dependencies": { "react": "*" } }"#,
        )
        .unwrap();
        assert!(manifest.declares_dependency("react"));
        assert!(manifest.declares_dependency("react/jsx-runtime"));
        assert!(!manifest.declares_dependency("react-dom"));
    }
}
