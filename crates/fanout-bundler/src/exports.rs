//! Static export scanning of compiled output.
//!
//! Node wrappers need the named bindings of a CommonJS artifact, and ESM
//! facades need the export list of the canonical file. Both are read from the
//! AST only; nothing is executed.

use std::path::Path;

use indexmap::IndexSet;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, AssignmentExpression, AssignmentTarget, CallExpression, Declaration, Expression,
    ModuleDeclaration, ObjectExpression, ObjectPropertyKind, Program, PropertyKey,
    StaticMemberExpression, VariableDeclarator,
};
use oxc_ast_visit::{Visit, walk};
use oxc_parser::Parser;
use oxc_span::SourceType;
use rustc_hash::FxHashMap;

use crate::{Error, Result};

/// Static export surface of one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleExports {
    /// Named bindings in first-seen order, without `default`.
    pub named: IndexSet<String>,
    pub has_default: bool,
    /// Specifiers re-exported wholesale (`export * from`, `module.exports = require(..)`).
    pub wildcards: IndexSet<String>,
}

impl ModuleExports {
    fn add(&mut self, name: &str) {
        match name {
            "default" => self.has_default = true,
            "__esModule" => {}
            _ => {
                self.named.insert(name.to_string());
            }
        }
    }

    /// True when the module exports nothing at all.
    pub fn is_empty(&self) -> bool {
        self.named.is_empty() && !self.has_default && self.wildcards.is_empty()
    }
}

fn parse<'a>(
    allocator: &'a Allocator,
    path: &Path,
    source: &'a str,
    source_type: SourceType,
) -> Result<Program<'a>> {
    let ret = Parser::new(allocator, source, source_type).parse();
    if ret.panicked || !ret.errors.is_empty() {
        let message = ret
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(Error::ExportScan {
            path: path.display().to_string(),
            message,
        });
    }
    Ok(ret.program)
}

/// Scan an ES module: declarations, specifiers, `export *` and `export * as ns`.
/// Type-only exports are skipped.
pub fn scan_esm(path: &Path, source: &str) -> Result<ModuleExports> {
    let allocator = Allocator::default();
    let program = parse(&allocator, path, source, SourceType::mjs())?;
    let mut exports = ModuleExports::default();

    for stmt in &program.body {
        let Some(module_decl) = stmt.as_module_declaration() else {
            continue;
        };
        match module_decl {
            ModuleDeclaration::ExportDefaultDeclaration(_) => exports.has_default = true,
            ModuleDeclaration::ExportAllDeclaration(all) => {
                if all.export_kind.is_type() {
                    continue;
                }
                match &all.exported {
                    Some(name) => exports.add(name.name().as_str()),
                    None => {
                        exports.wildcards.insert(all.source.value.to_string());
                    }
                }
            }
            ModuleDeclaration::ExportNamedDeclaration(named) => {
                if named.export_kind.is_type() {
                    continue;
                }
                if let Some(decl) = &named.declaration {
                    declared_names(decl, &mut exports);
                }
                for spec in &named.specifiers {
                    if !spec.export_kind.is_type() {
                        exports.add(spec.exported.name().as_str());
                    }
                }
            }
            _ => {}
        }
    }

    Ok(exports)
}

fn declared_names(decl: &Declaration<'_>, exports: &mut ModuleExports) {
    match decl {
        Declaration::VariableDeclaration(var) => {
            for declarator in &var.declarations {
                for id in declarator.id.get_binding_identifiers() {
                    exports.add(id.name.as_str());
                }
            }
        }
        Declaration::FunctionDeclaration(func) => {
            if let Some(id) = &func.id {
                exports.add(id.name.as_str());
            }
        }
        Declaration::ClassDeclaration(class) => {
            if let Some(id) = &class.id {
                exports.add(id.name.as_str());
            }
        }
        // Interfaces, type aliases, enums and namespaces carry no runtime binding here.
        _ => {}
    }
}

/// Scan a CommonJS module for the export patterns bundlers and compilers emit.
pub fn scan_commonjs(path: &Path, source: &str) -> Result<ModuleExports> {
    let allocator = Allocator::default();
    let program = parse(&allocator, path, source, SourceType::cjs())?;

    let mut scanner = CommonJsScanner::default();
    scanner.visit_program(&program);
    Ok(scanner.exports)
}

#[derive(Default)]
struct CommonJsScanner {
    exports: ModuleExports,
    /// Local bindings initialised with `require("m")`.
    requires: FxHashMap<String, String>,
}

impl CommonJsScanner {
    fn assign_module_exports(&mut self, value: &Expression<'_>) {
        if let Some(specifier) = self.required_module(value) {
            self.exports.wildcards.insert(specifier);
            return;
        }
        if let Expression::ObjectExpression(object) = value {
            self.object_keys(object);
        }
    }

    fn object_keys(&mut self, object: &ObjectExpression<'_>) {
        for property in &object.properties {
            match property {
                ObjectPropertyKind::ObjectProperty(prop) => {
                    if let Some(name) = property_name(&prop.key) {
                        self.exports.add(name);
                    }
                }
                ObjectPropertyKind::SpreadProperty(spread) => {
                    if let Some(specifier) = self.required_module(&spread.argument) {
                        self.exports.wildcards.insert(specifier);
                    }
                }
            }
        }
    }

    /// `require("m")`, or a local bound to one.
    fn required_module(&self, expr: &Expression<'_>) -> Option<String> {
        match expr {
            Expression::Identifier(ident) => self.requires.get(ident.name.as_str()).cloned(),
            _ => require_specifier(expr),
        }
    }

    fn required_argument(&self, argument: &Argument<'_>) -> Option<String> {
        argument.as_expression().and_then(|expr| self.required_module(expr))
    }
}

impl<'a> Visit<'a> for CommonJsScanner {
    fn visit_variable_declarator(&mut self, it: &VariableDeclarator<'a>) {
        let required = it.init.as_ref().and_then(require_specifier);
        if let (Some(id), Some(specifier)) = (it.id.get_binding_identifier(), required) {
            self.requires.insert(id.name.to_string(), specifier);
        }
        walk::walk_variable_declarator(self, it);
    }

    fn visit_assignment_expression(&mut self, it: &AssignmentExpression<'a>) {
        match &it.left {
            AssignmentTarget::StaticMemberExpression(member) => {
                if is_module_exports(member) {
                    self.assign_module_exports(&it.right);
                } else if is_exports_object(&member.object) {
                    self.exports.add(member.property.name.as_str());
                }
            }
            AssignmentTarget::ComputedMemberExpression(member) => {
                if let (true, Expression::StringLiteral(name)) =
                    (is_exports_object(&member.object), &member.expression)
                {
                    self.exports.add(name.value.as_str());
                }
            }
            _ => {}
        }
        walk::walk_assignment_expression(self, it);
    }

    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        match &it.callee {
            // Object.defineProperty(exports, "x", { get: ... })
            Expression::StaticMemberExpression(callee)
                if is_member(callee, "Object", "defineProperty") =>
            {
                let target = it.arguments.first().and_then(Argument::as_expression);
                let name = match it.arguments.get(1) {
                    Some(Argument::StringLiteral(name)) => Some(name.value.as_str()),
                    _ => None,
                };
                if let (Some(target), Some(name)) = (target, name) {
                    if is_exports_object(target) {
                        self.exports.add(name);
                    }
                }
            }
            // Object.keys(m).forEach(...) where m = require("x")
            Expression::StaticMemberExpression(callee) if callee.property.name.as_str() == "forEach" => {
                if let Expression::CallExpression(keys) = &callee.object {
                    let is_keys = matches!(
                        &keys.callee,
                        Expression::StaticMemberExpression(m) if is_member(m, "Object", "keys")
                    );
                    let specifier = keys.arguments.first().and_then(|a| self.required_argument(a));
                    if let (true, Some(specifier)) = (is_keys, specifier) {
                        self.exports.wildcards.insert(specifier);
                    }
                }
            }
            Expression::Identifier(callee) => match callee.name.as_str() {
                // __export(target, { x: () => x })
                "__export" => {
                    if let Some(Argument::ObjectExpression(object)) = it.arguments.get(1) {
                        self.object_keys(object);
                    }
                }
                // __exportStar(require("m"), exports) / __reExport(target, require("m"))
                "__exportStar" | "__reExport" => {
                    let found: Vec<String> = it
                        .arguments
                        .iter()
                        .filter_map(|a| self.required_argument(a))
                        .collect();
                    self.exports.wildcards.extend(found);
                }
                _ => {}
            },
            _ => {}
        }
        walk::walk_call_expression(self, it);
    }
}

fn property_name<'b>(key: &'b PropertyKey<'_>) -> Option<&'b str> {
    match key {
        PropertyKey::StaticIdentifier(ident) => Some(ident.name.as_str()),
        PropertyKey::StringLiteral(lit) => Some(lit.value.as_str()),
        _ => None,
    }
}

fn require_specifier(expr: &Expression<'_>) -> Option<String> {
    let Expression::CallExpression(call) = expr else {
        return None;
    };
    let is_require = matches!(&call.callee, Expression::Identifier(ident) if ident.name.as_str() == "require");
    if !is_require || call.arguments.len() != 1 {
        return None;
    }
    match call.arguments.first() {
        Some(Argument::StringLiteral(lit)) => Some(lit.value.to_string()),
        _ => None,
    }
}

fn is_member(member: &StaticMemberExpression<'_>, object: &str, property: &str) -> bool {
    matches!(&member.object, Expression::Identifier(ident) if ident.name.as_str() == object)
        && member.property.name.as_str() == property
}

fn is_module_exports(member: &StaticMemberExpression<'_>) -> bool {
    is_member(member, "module", "exports")
}

/// `exports` or `module.exports`.
fn is_exports_object(expr: &Expression<'_>) -> bool {
    match expr {
        Expression::Identifier(ident) => ident.name.as_str() == "exports",
        Expression::StaticMemberExpression(member) => is_module_exports(member),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn esm(source: &str) -> ModuleExports {
        scan_esm(Path::new("test.js"), source).unwrap()
    }

    fn cjs(source: &str) -> ModuleExports {
        scan_commonjs(Path::new("test.cjs"), source).unwrap()
    }

    fn names(exports: &ModuleExports) -> Vec<&str> {
        exports.named.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_esm_declarations_and_specifiers() {
        let exports = esm(r#"
            export const a = 1, { b, c: [d] } = obj;
            export function f() {}
            export class K {}
            const x = 1;
            export { x as y, x as default };
        "#);
        assert_eq!(names(&exports), vec!["a", "b", "d", "f", "K", "y"]);
        assert!(exports.has_default);
        assert!(exports.wildcards.is_empty());
    }

    #[test]
    fn test_esm_reexports() {
        let exports = esm(r#"
            export * from "./chunk.js";
            export * as ns from "lib";
            export { z } from "./z.js";
            export default function () {}
        "#);
        assert_eq!(names(&exports), vec!["ns", "z"]);
        assert_eq!(exports.wildcards.iter().collect::<Vec<_>>(), vec!["./chunk.js"]);
        assert!(exports.has_default);
    }

    #[test]
    fn test_esm_side_effect_only() {
        let exports = esm(r#"import "./setup.js"; console.log(1);"#);
        assert!(exports.is_empty());
    }

    #[test]
    fn test_esm_parse_error() {
        let err = scan_esm(Path::new("bad.js"), "export const = ;").unwrap_err();
        assert!(matches!(err, Error::ExportScan { .. }));
    }

    #[test]
    fn test_cjs_assignments() {
        let exports = cjs(r#"
            "use strict";
            Object.defineProperty(exports, "__esModule", { value: true });
            exports.a = 1;
            module.exports.b = 2;
            exports["c"] = 3;
            Object.defineProperty(exports, "d", { enumerable: true, get: function () { return d; } });
            exports.default = main;
        "#);
        assert_eq!(names(&exports), vec!["a", "b", "c", "d"]);
        assert!(exports.has_default);
    }

    #[test]
    fn test_cjs_export_helper_and_object_literal() {
        let exports = cjs(r#"
            __export(lib_exports, { one: () => one, "two": () => two });
            module.exports = { three, four: 4 };
        "#);
        assert_eq!(names(&exports), vec!["one", "two", "three", "four"]);
    }

    #[test]
    fn test_cjs_wildcards() {
        let exports = cjs(r#"
            var shared = require("./shared.cjs");
            Object.keys(shared).forEach(function (k) {
                if (k !== "default") exports[k] = shared[k];
            });
            __exportStar(require("./star.cjs"), exports);
            __reExport(lib_exports, require("dep"), module.exports);
        "#);
        assert_eq!(
            exports.wildcards.iter().collect::<Vec<_>>(),
            vec!["./shared.cjs", "./star.cjs", "dep"]
        );
    }

    #[test]
    fn test_cjs_module_exports_require() {
        let exports = cjs(r#"module.exports = require("./index.cjs");"#);
        assert!(exports.named.is_empty());
        assert_eq!(exports.wildcards.iter().collect::<Vec<_>>(), vec!["./index.cjs"]);
    }
}
