//! Published manifest synthesis.
//!
//! Projects a [`BuildPlan`] into the `exports` block of the output
//! `package.json` plus the legacy top-level fields read by older tooling and
//! CDNs. Field order is fixed so repeated builds diff cleanly.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::naming::manifest_path;
use crate::package::PackageManifest;
use crate::planner::{BuildPlan, BuildTask};
use crate::resolver::{EntryPlan, ExportSlot, ResolvedExports};
use crate::target::TargetKind;

/// Manifest fields never copied into the published manifest.
pub const STRIPPED_FIELDS: &[&str] = &["fanout", "scripts", "devDependencies"];

/// Legacy top-level fields, in the order they are appended when missing.
const LEGACY_FIELDS: &[&str] = &["main", "module", "browser", "types", "unpkg", "jsdelivr"];

/// Which artifact a consumer matching no condition receives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefaultPrecedence {
    /// `module`, `node.require`, `esnext`, `script`, `browser`
    #[default]
    ModuleFirst,
    /// `node.require`, `module`, `esnext`, `script`, `browser`
    NodeFirst,
}

/// Paired node artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeExport {
    /// ESM wrapper (`.mjs`).
    pub import: String,
    /// CommonJS artifact (`.cjs`).
    pub require: String,
}

/// Manifest fragment for one entry. Paths are in manifest form (`./x.js`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishExportEntry {
    pub types: Option<String>,
    pub development: Option<Box<PublishExportEntry>>,
    pub esnext: Option<String>,
    pub module: Option<String>,
    pub browser: Option<String>,
    pub script: Option<String>,
    pub node: Option<NodeExport>,
    pub default: Option<String>,
}

impl PublishExportEntry {
    fn resolve_default(&mut self, precedence: DefaultPrecedence) {
        let node = self.node.as_ref().map(|node| node.require.clone());
        let (first, second) = match precedence {
            DefaultPrecedence::ModuleFirst => (self.module.clone(), node),
            DefaultPrecedence::NodeFirst => (node, self.module.clone()),
        };
        self.default = first
            .or(second)
            .or_else(|| self.esnext.clone())
            .or_else(|| self.script.clone())
            .or_else(|| self.browser.clone());
    }

    pub fn has_artifacts(&self) -> bool {
        self.default.is_some()
    }

    /// JSON object with keys in the fixed publishing order.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        put_path(&mut map, "types", &self.types);
        if let Some(dev) = &self.development {
            map.insert("development".to_string(), dev.to_value());
        }
        put_path(&mut map, "esnext", &self.esnext);
        put_path(&mut map, "module", &self.module);
        put_path(&mut map, "browser", &self.browser);
        put_path(&mut map, "script", &self.script);
        if let Some(node) = &self.node {
            let mut pair = Map::new();
            pair.insert("import".to_string(), Value::String(node.import.clone()));
            pair.insert("require".to_string(), Value::String(node.require.clone()));
            map.insert("node".to_string(), Value::Object(pair));
        }
        put_path(&mut map, "default", &self.default);
        Value::Object(map)
    }
}

fn put_path(map: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        map.insert(key.to_string(), Value::String(value.clone()));
    }
}

/// Projects plans into publishable manifests.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestSynthesizer {
    precedence: DefaultPrecedence,
}

impl ManifestSynthesizer {
    pub fn new(precedence: DefaultPrecedence) -> Self {
        Self { precedence }
    }

    /// Manifest fragment for one entry.
    ///
    /// With `development`, a sibling `development` block mirrors the batched
    /// fields using the `.dev` artifacts.
    pub fn entry(&self, entry: &EntryPlan, plan: &BuildPlan, development: bool) -> PublishExportEntry {
        let subpath = entry.subpath.as_str();
        let production = |kind| plan.task(subpath, kind);

        let mut published = PublishExportEntry {
            types: plan
                .declaration(subpath)
                .map(|job| manifest_path(&job.output_path)),
            esnext: production(TargetKind::Esnext).map(|t| manifest_path(&t.output_path)),
            module: production(TargetKind::Module).map(|t| manifest_path(&t.output_path)),
            browser: production(TargetKind::Browser).map(|t| manifest_path(&t.output_path)),
            script: production(TargetKind::Script).map(|t| manifest_path(&t.output_path)),
            node: production(TargetKind::Node).and_then(node_export),
            ..PublishExportEntry::default()
        };
        published.resolve_default(self.precedence);

        if development {
            let dev_task = |kind| plan.development_task(subpath, kind);
            let mut dev = PublishExportEntry {
                esnext: dev_task(TargetKind::Esnext).map(|t| manifest_path(&t.output_path)),
                module: dev_task(TargetKind::Module).map(|t| manifest_path(&t.output_path)),
                browser: dev_task(TargetKind::Browser).map(|t| manifest_path(&t.output_path)),
                node: dev_task(TargetKind::Node).and_then(node_export),
                ..PublishExportEntry::default()
            };
            dev.resolve_default(self.precedence);
            if dev.has_artifacts() {
                published.development = Some(Box::new(dev));
            }
        }

        published
    }

    /// The `exports` block, in declaration order, passthrough entries verbatim.
    ///
    /// Entries that produced no artifact at all are left out.
    pub fn exports_block(&self, resolved: &ResolvedExports, plan: &BuildPlan, development: bool) -> Value {
        let mut exports = Map::new();
        for slot in &resolved.slots {
            match slot {
                ExportSlot::Entry(entry) => {
                    let published = self.entry(entry, plan, development);
                    if published.has_artifacts() {
                        exports.insert(entry.subpath.clone(), published.to_value());
                    } else {
                        debug!(subpath = %entry.subpath, "entry produced no artifacts");
                    }
                }
                ExportSlot::Passthrough(pass) => {
                    exports.insert(pass.subpath.clone(), pass.value.clone());
                }
            }
        }
        Value::Object(exports)
    }

    /// Legacy top-level fields derived from the main entry.
    pub fn legacy_fields(&self, main: Option<&PublishExportEntry>) -> Vec<(&'static str, Option<String>)> {
        let main = main.cloned().unwrap_or_default();
        let main_field = main
            .node
            .as_ref()
            .map(|node| node.require.clone())
            .or_else(|| main.default.clone());
        vec![
            ("main", main_field),
            ("module", main.module.clone()),
            ("browser", main.browser.clone()),
            ("types", main.types.clone()),
            ("unpkg", main.script.clone()),
            ("jsdelivr", main.script.clone()),
        ]
    }

    /// The complete output manifest.
    ///
    /// Untouched fields keep their position. Stripped fields and absent legacy
    /// fields are removed; new fields are appended.
    pub fn synthesize(
        &self,
        manifest: &PackageManifest,
        resolved: &ResolvedExports,
        plan: &BuildPlan,
        development: bool,
    ) -> Value {
        let exports = self.exports_block(resolved, plan, development);
        let main = resolved.main().map(|entry| self.entry(entry, plan, development));
        let mut legacy: Vec<(&str, Option<String>)> = self.legacy_fields(main.as_ref());

        let mut output = Map::new();
        let mut exports_slot = Some(exports);
        for (key, value) in manifest.document() {
            if STRIPPED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            if key == "exports" {
                if let Some(exports) = exports_slot.take() {
                    output.insert(key.clone(), exports);
                }
                continue;
            }
            if let Some(pos) = legacy.iter().position(|(name, _)| *name == key.as_str()) {
                let (_, derived) = legacy.remove(pos);
                if let Some(derived) = derived {
                    output.insert(key.clone(), Value::String(derived));
                }
                continue;
            }
            output.insert(key.clone(), value.clone());
        }

        if let Some(exports) = exports_slot {
            output.insert("exports".to_string(), exports);
        }
        for name in LEGACY_FIELDS {
            if let Some(pos) = legacy.iter().position(|(field, _)| field == name) {
                if let (_, Some(derived)) = legacy.remove(pos) {
                    output.insert((*name).to_string(), Value::String(derived));
                }
            }
        }

        Value::Object(output)
    }
}

fn node_export(task: &BuildTask) -> Option<NodeExport> {
    Some(NodeExport {
        import: manifest_path(task.wrapper_path.as_deref()?),
        require: manifest_path(&task.output_path),
    })
}

/// Pretty JSON with a trailing newline.
pub fn to_manifest_string(manifest: &Value) -> serde_json::Result<String> {
    let mut out = serde_json::to_string_pretty(manifest)?;
    out.push('\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{BuildPlanner, PlannerOptions};
    use crate::resolver::ExportMapResolver;
    use crate::target::TargetMatrix;
    use serde_json::json;

    const EXAMPLE: &str = r#"{
        "name": "widgets",
        "version": "1.0.0",
        "main": "./old.js",
        "scripts": { "build": "fanout build" },
        "exports": {
            ".": { "node": "./src/node.ts", "default": "./src/index.ts" },
            "./web": { "browser": "./src/web.ts", "script": null },
            "./package.json": "./package.json"
        },
        "devDependencies": { "typescript": "*" },
        "fanout": { "out_dir": "lib" },
        "license": "MIT"
    }"#;

    fn setup(json: &str, options: PlannerOptions) -> (PackageManifest, ResolvedExports, BuildPlan) {
        let manifest = PackageManifest::from_json_str(json).unwrap();
        let resolved = ExportMapResolver::new(&manifest).resolve();
        let plan = BuildPlanner::new(options).plan(&resolved);
        (manifest, resolved, plan)
    }

    #[test]
    fn test_example_exports_block() {
        let (_, resolved, plan) = setup(EXAMPLE, PlannerOptions::default());
        let exports = ManifestSynthesizer::default().exports_block(&resolved, &plan, false);

        assert_eq!(
            exports["."],
            json!({
                "types": "./widgets.d.ts",
                "esnext": "./widgets.esnext.js",
                "module": "./widgets.js",
                "browser": "./widgets.browser.js",
                "script": "./widgets.global.js",
                "node": { "import": "./widgets.mjs", "require": "./widgets.cjs" },
                "default": "./widgets.js"
            })
        );

        let web = &exports["./web"];
        assert!(web.get("script").is_none());
        assert!(web.get("node").is_none());
        assert_eq!(web["default"], web["module"]);
        assert_eq!(exports["./package.json"], json!("./package.json"));
    }

    #[test]
    fn test_field_order_is_fixed() {
        let (_, resolved, plan) = setup(EXAMPLE, PlannerOptions::default());
        let exports = ManifestSynthesizer::default().exports_block(&resolved, &plan, true);
        let keys: Vec<_> = exports["."].as_object().unwrap().keys().cloned().collect();
        assert_eq!(
            keys,
            vec!["types", "development", "esnext", "module", "browser", "script", "node", "default"]
        );
        let subpaths: Vec<_> = exports.as_object().unwrap().keys().cloned().collect();
        assert_eq!(subpaths, vec![".", "./web", "./package.json"]);
    }

    #[test]
    fn test_development_block_mirrors_batched_fields() {
        let (_, resolved, plan) = setup(EXAMPLE, PlannerOptions::default());
        let exports = ManifestSynthesizer::default().exports_block(&resolved, &plan, true);
        assert_eq!(
            exports["."]["development"],
            json!({
                "esnext": "./widgets.esnext.dev.js",
                "module": "./widgets.dev.js",
                "browser": "./widgets.browser.dev.js",
                "node": { "import": "./widgets.dev.mjs", "require": "./widgets.dev.cjs" },
                "default": "./widgets.dev.js"
            })
        );
    }

    #[test]
    fn test_default_precedence_policies() {
        let matrix = TargetMatrix::default()
            .with_level(TargetKind::Module, None)
            .unwrap();
        let (_, resolved, plan) = setup(
            EXAMPLE,
            PlannerOptions {
                matrix,
                ..PlannerOptions::default()
            },
        );
        let exports = ManifestSynthesizer::default().exports_block(&resolved, &plan, false);
        assert_eq!(exports["."]["default"], json!("./widgets.cjs"));
        assert_eq!(exports["./web"]["default"], json!("./web.esnext.js"));

        let (_, resolved, plan) = setup(EXAMPLE, PlannerOptions::default());
        let exports = ManifestSynthesizer::new(DefaultPrecedence::NodeFirst)
            .exports_block(&resolved, &plan, false);
        assert_eq!(exports["."]["default"], json!("./widgets.cjs"));
        assert_eq!(exports["./web"]["default"], json!("./web.js"));
    }

    #[test]
    fn test_synthesized_manifest_fields() {
        let (manifest, resolved, plan) = setup(EXAMPLE, PlannerOptions::default());
        let output = ManifestSynthesizer::default().synthesize(&manifest, &resolved, &plan, false);
        let object = output.as_object().unwrap();

        let keys: Vec<_> = object.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "name", "version", "main", "exports", "license", "module", "browser", "types",
                "unpkg", "jsdelivr"
            ]
        );
        assert_eq!(output["main"], json!("./widgets.cjs"));
        assert_eq!(output["unpkg"], json!("./widgets.global.js"));
        assert_eq!(output["types"], json!("./widgets.d.ts"));
    }

    #[test]
    fn test_absent_legacy_fields_are_removed() {
        let matrix = TargetMatrix::default()
            .with_level(TargetKind::Script, None)
            .unwrap();
        let json = r#"{ "name": "w", "unpkg": "./old.js", "exports": "./src/index.js" }"#;
        let (manifest, resolved, plan) = setup(
            json,
            PlannerOptions {
                matrix,
                ..PlannerOptions::default()
            },
        );
        let output = ManifestSynthesizer::default().synthesize(&manifest, &resolved, &plan, false);
        assert!(output.get("unpkg").is_none());
        assert!(output.get("jsdelivr").is_none());
        assert!(output.get("types").is_none());
    }

    #[test]
    fn test_manifest_string_has_trailing_newline() {
        let text = to_manifest_string(&json!({ "name": "x" })).unwrap();
        assert!(text.ends_with("}\n"));
    }
}
