//! End-to-end planning tests: resolver, planner and manifest synthesis together.

use fanout_plan::{
    BuildPlanner, DefaultPrecedence, ExportMapResolver, ManifestSynthesizer, PackageManifest,
    PlannerOptions, TargetKind, TargetMatrix,
};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

fn manifest_with_exports(exports: Value) -> PackageManifest {
    PackageManifest::from_value(json!({ "name": "@acme/widgets", "exports": exports })).unwrap()
}

#[test]
fn example_scenario() {
    let manifest = manifest_with_exports(json!({
        ".": { "node": "./src/node.ts", "default": "./src/index.ts" },
        "./web": { "browser": "./src/web.ts", "script": null }
    }));
    let resolved = ExportMapResolver::new(&manifest).resolve();
    let plan = BuildPlanner::default().plan(&resolved);

    assert_eq!(plan.task(".", TargetKind::Node).unwrap().source, "./src/node.ts");
    assert_eq!(plan.task(".", TargetKind::Module).unwrap().source, "./src/index.ts");
    assert_eq!(plan.task(".", TargetKind::Esnext).unwrap().source, "./src/index.ts");
    assert_eq!(plan.task("./web", TargetKind::Browser).unwrap().source, "./src/web.ts");
    assert!(plan.task("./web", TargetKind::Script).is_none());

    let exports = ManifestSynthesizer::default().exports_block(&resolved, &plan, false);
    let web = exports["./web"].as_object().unwrap();
    assert!(!web.contains_key("script"));
    assert_eq!(web["default"], web["module"]);
    assert_eq!(web["default"], json!("./web.js"));
}

#[test]
fn script_jobs_never_share_a_unit() {
    let manifest = manifest_with_exports(json!({
        ".": "./src/index.ts",
        "./a": "./src/a.ts",
        "./b": "./src/b.ts"
    }));
    let resolved = ExportMapResolver::new(&manifest).resolve();
    let plan = BuildPlanner::default().plan(&resolved);

    let module = plan
        .batches
        .iter()
        .find(|batch| batch.descriptor.kind == TargetKind::Module)
        .unwrap();
    assert_eq!(module.tasks.len(), 3);

    assert_eq!(plan.per_entry.len(), 3);
    let mut outputs: Vec<_> = plan.per_entry.iter().map(|j| j.task.output_path.clone()).collect();
    outputs.dedup();
    assert_eq!(outputs.len(), 3);
    let globals: Vec<_> = plan.per_entry.iter().map(|j| j.global_name.as_str()).collect();
    assert_eq!(globals, vec!["acme.widgets", "acme.widgets_a", "acme.widgets_b"]);
}

#[test]
fn node_first_precedence_is_configurable() {
    let manifest = manifest_with_exports(json!({ ".": "./src/index.ts" }));
    let resolved = ExportMapResolver::new(&manifest).resolve();
    let plan = BuildPlanner::default().plan(&resolved);

    let module_first = ManifestSynthesizer::new(DefaultPrecedence::ModuleFirst)
        .exports_block(&resolved, &plan, false);
    let node_first = ManifestSynthesizer::new(DefaultPrecedence::NodeFirst)
        .exports_block(&resolved, &plan, false);
    assert_eq!(module_first["."]["default"], json!("./widgets.js"));
    assert_eq!(node_first["."]["default"], json!("./widgets.cjs"));
}

#[test]
fn every_artifact_path_is_unique() {
    let manifest = manifest_with_exports(json!({
        ".": { "node": "./src/node.ts", "default": "./src/index.ts" },
        "./widgets": "./src/widgets.ts",
        "./utils/fs": "./src/fs.ts"
    }));
    let resolved = ExportMapResolver::new(&manifest).resolve();
    let plan = BuildPlanner::default().plan(&resolved);

    let mut paths: Vec<String> = plan
        .batches
        .iter()
        .chain(plan.development.iter())
        .flat_map(|batch| batch.tasks.iter())
        .chain(plan.per_entry.iter().map(|job| &job.task))
        .flat_map(|task| std::iter::once(task.output_path.clone()).chain(task.wrapper_path.clone()))
        .chain(plan.declarations.iter().map(|job| job.output_path.clone()))
        .collect();
    let total = paths.len();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), total);
}

const CONDITIONS: &[&str] = &["default", "browser", "node", "script", "esnext", "module", "development"];

fn condition_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        3 => "[a-z]{1,6}".prop_map(|name| Value::String(format!("./src/{name}.ts"))),
        1 => Just(Value::Null),
        1 => Just(Value::String("./styles.css".to_string())),
    ]
}

fn declared_export() -> impl Strategy<Value = Value> {
    prop_oneof![
        1 => "[a-z]{1,6}".prop_map(|name| Value::String(format!("./src/{name}.js"))),
        3 => prop::collection::vec((0..CONDITIONS.len(), condition_value()), 0..6).prop_map(|pairs| {
            let mut map = Map::new();
            for (idx, value) in pairs {
                map.insert(CONDITIONS[idx].to_string(), value);
            }
            Value::Object(map)
        }),
    ]
}

fn export_map() -> impl Strategy<Value = Value> {
    prop::collection::vec(("[a-z]{1,5}", declared_export()), 1..6).prop_map(|entries| {
        let mut map = Map::new();
        for (idx, (name, value)) in entries.into_iter().enumerate() {
            let subpath = if idx == 0 { ".".to_string() } else { format!("./{name}") };
            map.insert(subpath, value);
        }
        Value::Object(map)
    })
}

fn matrix() -> impl Strategy<Value = TargetMatrix> {
    prop::collection::vec(prop::bool::ANY, 5).prop_map(|enabled| {
        TargetKind::ALL
            .into_iter()
            .zip(enabled)
            .fold(TargetMatrix::default(), |matrix, (kind, on)| {
                let level = on.then(|| kind.default_level());
                matrix.with_level(kind, level).unwrap()
            })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Planning twice yields identical plans and byte-identical export blocks.
    #[test]
    fn prop_planning_is_deterministic(exports in export_map(), matrix in matrix()) {
        let manifest = manifest_with_exports(exports);
        let options = PlannerOptions { matrix, ..PlannerOptions::default() };

        let first_resolved = ExportMapResolver::new(&manifest).resolve();
        let second_resolved = ExportMapResolver::new(&manifest).resolve();
        prop_assert_eq!(&first_resolved, &second_resolved);

        let first = BuildPlanner::new(options.clone()).plan(&first_resolved);
        let second = BuildPlanner::new(options).plan(&second_resolved);
        prop_assert_eq!(&first, &second);

        let synth = ManifestSynthesizer::default();
        let a = serde_json::to_string(&synth.exports_block(&first_resolved, &first, true)).unwrap();
        let b = serde_json::to_string(&synth.exports_block(&second_resolved, &second, true)).unwrap();
        prop_assert_eq!(a, b);
    }

    /// Every published entry carries a `default`, and a suppressed target never gets a task.
    #[test]
    fn prop_default_present_and_suppression_respected(exports in export_map()) {
        let manifest = manifest_with_exports(exports);
        let resolved = ExportMapResolver::new(&manifest).resolve();
        let plan = BuildPlanner::default().plan(&resolved);
        let block = ManifestSynthesizer::default().exports_block(&resolved, &plan, false);

        for entry in resolved.entries() {
            if let Some(published) = block.get(&entry.subpath) {
                prop_assert!(published.get("default").is_some(), "{} lacks default", entry.subpath);
            }
            for kind in TargetKind::ALL {
                if entry.conditions.is_suppressed(kind.as_str()) {
                    prop_assert!(plan.task(&entry.subpath, kind).is_none());
                }
            }
        }

        for pass in resolved.passthrough() {
            prop_assert!(plan.tasks_for(&pass.subpath).next().is_none());
        }
    }
}
