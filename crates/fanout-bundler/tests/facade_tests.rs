//! A facade must expose exactly what its canonical file exposes.

use std::path::Path;
use std::sync::Arc;

use fanout_bundler::test_utils::MemoryRuntime;
use fanout_bundler::{DedupFacadeGenerator, FacadeCandidate, ModuleExports, scan_esm};
use proptest::prelude::*;

/// Reserved words a module cannot bind, up to the generated name length.
const RESERVED: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "default", "delete", "do", "else",
    "enum", "eval", "export", "extends", "false", "finally", "for", "if", "import", "in",
    "let", "new", "null", "package", "private", "public", "return", "static", "super",
    "switch", "this", "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

fn module_source(names: &[String], has_default: bool) -> String {
    let mut source = String::new();
    for name in names {
        source.push_str(&format!("export const {name} = 1;\n"));
    }
    if has_default {
        source.push_str("export default 42;\n");
    }
    source
}

/// Bindings visible through `exports`, following `export *` into `canonical`.
fn visible_bindings(exports: &ModuleExports, canonical: &ModuleExports) -> (Vec<String>, bool) {
    let mut named: Vec<String> = exports.named.iter().cloned().collect();
    if exports.wildcards.contains("./index.js") {
        named.extend(canonical.named.iter().cloned());
    }
    named.sort();
    named.dedup();
    (named, exports.has_default)
}

fn run_facade(source: &str) -> (String, bool) {
    let runtime = Arc::new(
        MemoryRuntime::new("/dist")
            .with_file("index.js", format!("{source}//# sourceMappingURL=index.js.map\n"))
            .with_file("index.esnext.js", format!("{source}//# sourceMappingURL=index.esnext.js.map\n"))
            .with_file("index.esnext.js.map", "{}"),
    );
    let generator = DedupFacadeGenerator::new(runtime.clone(), "/dist");
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    let facade = rt
        .block_on(generator.apply(&FacadeCandidate {
            canonical: "index.js".to_string(),
            duplicate: "index.esnext.js".to_string(),
        }))
        .expect("apply");

    assert!(runtime.read_string("index.esnext.js.map").is_none());
    (
        runtime.read_string("index.esnext.js").expect("facade"),
        facade.is_some(),
    )
}

proptest! {
    #[test]
    fn facade_exposes_canonical_bindings(
        names in prop::collection::btree_set("[a-z][a-z0-9_]{0,6}", 0..6),
        has_default in any::<bool>(),
    ) {
        let names: Vec<String> = names
            .into_iter()
            .filter(|name| !RESERVED.contains(&name.as_str()))
            .collect();
        let source = module_source(&names, has_default);
        let (facade_source, rewritten) = run_facade(&source);
        prop_assert!(rewritten);

        let canonical = scan_esm(Path::new("index.js"), &source).unwrap();
        let facade = scan_esm(Path::new("index.esnext.js"), &facade_source).unwrap();

        let expected = visible_bindings(&canonical, &canonical);
        prop_assert_eq!(visible_bindings(&facade, &canonical), expected);

        if canonical.is_empty() {
            prop_assert_eq!(facade_source, "import \"./index.js\";\n");
        }
    }
}

#[test]
fn different_content_is_not_rewritten() {
    let runtime = Arc::new(
        MemoryRuntime::new("/dist")
            .with_file("index.js", "export const a = 1;\n")
            .with_file("index.esnext.js", "export const a = 2;\n"),
    );
    let generator = DedupFacadeGenerator::new(runtime.clone(), "/dist");
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    let facade = rt
        .block_on(generator.apply(&FacadeCandidate {
            canonical: "index.js".to_string(),
            duplicate: "index.esnext.js".to_string(),
        }))
        .expect("apply");

    assert!(facade.is_none());
    assert_eq!(
        runtime.read_string("index.esnext.js").unwrap(),
        "export const a = 2;\n"
    );
}
