//! ESM wrappers for node artifacts.
//!
//! Node targets compile to CommonJS. The `.mjs` wrapper next to each `.cjs`
//! file gives `import` consumers the same named bindings.

use std::fmt::Write as _;
use std::path::Path;

use crate::exports::ModuleExports;

/// Render the wrapper for the CommonJS file `cjs_path` with the scanned `exports`.
///
/// ```
/// use fanout_bundler::{ModuleExports, render_node_wrapper};
///
/// let mut exports = ModuleExports::default();
/// exports.named.insert("a".to_string());
/// exports.has_default = true;
///
/// assert_eq!(
///     render_node_wrapper("index.cjs", &exports),
///     "import __cjs from \"./index.cjs\";\nexport { a } from \"./index.cjs\";\nexport default __cjs.default;\n"
/// );
/// ```
pub fn render_node_wrapper(cjs_path: &str, exports: &ModuleExports) -> String {
    let file_name = Path::new(cjs_path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(cjs_path);
    let specifier = format!("./{file_name}");

    let mut out = String::new();
    if exports.has_default {
        let _ = writeln!(out, "import __cjs from {};", quote(&specifier));
    } else if exports.named.is_empty() {
        // Nothing else in the wrapper would load the CommonJS file.
        let _ = writeln!(out, "import {};", quote(&specifier));
    }

    if !exports.named.is_empty() {
        let names: Vec<String> = exports.named.iter().map(|name| export_name(name)).collect();
        let _ = writeln!(out, "export {{ {} }} from {};", names.join(", "), quote(&specifier));
    }

    for wildcard in &exports.wildcards {
        let _ = writeln!(out, "export * from {};", quote(wildcard));
    }

    if exports.has_default {
        out.push_str("export default __cjs.default;\n");
    }

    out
}

fn quote(specifier: &str) -> String {
    serde_json::Value::String(specifier.to_string()).to_string()
}

/// Identifier names stay bare; anything else becomes a string export name.
fn export_name(name: &str) -> String {
    let mut chars = name.chars();
    let is_identifier = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if is_identifier {
        name.to_string()
    } else {
        quote(name)
    }
}
