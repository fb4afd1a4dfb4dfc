//! Type declarations via oxc isolated declarations.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use oxc_allocator::Allocator;
use oxc_codegen::Codegen;
use oxc_isolated_declarations::{IsolatedDeclarations, IsolatedDeclarationsOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;

use crate::compiler::DeclarationEmitter;
use crate::runtime::Runtime;
use crate::{Error, Result};

/// Emits `.d.ts` files one entry at a time, without a type checker.
///
/// Only the entry module itself is transformed; its relative imports are kept
/// as written.
#[derive(Debug, Clone)]
pub struct OxcDeclarationEmitter {
    runtime: Arc<dyn Runtime>,
    strip_internal: bool,
}

impl OxcDeclarationEmitter {
    pub fn new(runtime: Arc<dyn Runtime>) -> Self {
        Self {
            runtime,
            strip_internal: true,
        }
    }

    /// Keep declarations tagged `@internal`.
    pub fn keep_internal(mut self) -> Self {
        self.strip_internal = false;
        self
    }
}

#[async_trait]
impl DeclarationEmitter for OxcDeclarationEmitter {
    async fn emit(&self, source: &Path, output: &Path) -> Result<()> {
        let code = self.runtime.read_to_string(source).await?;
        let declarations = generate_declarations(source, &code, self.strip_internal)?;
        self.runtime
            .write_file(output, declarations.as_bytes())
            .await?;
        Ok(())
    }
}

/// Declarations for one TypeScript module.
pub fn generate_declarations(path: &Path, source: &str, strip_internal: bool) -> Result<String> {
    let failed = |message: String| Error::Declarations {
        path: path.display().to_string(),
        message,
    };

    let allocator = Allocator::default();
    let source_type =
        SourceType::from_path(path).map_err(|e| failed(format!("unsupported file type: {e}")))?;

    let parse_result = Parser::new(&allocator, source, source_type).parse();
    if !parse_result.errors.is_empty() {
        return Err(failed(join_errors(&parse_result.errors)));
    }

    let options = IsolatedDeclarationsOptions { strip_internal };
    let dts_result = IsolatedDeclarations::new(&allocator, options).build(&parse_result.program);
    if !dts_result.errors.is_empty() {
        return Err(failed(join_errors(&dts_result.errors)));
    }

    Ok(Codegen::new().build(&dts_result.program).code)
}

fn join_errors<E: std::fmt::Display>(errors: &[E]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generates_declarations() {
        let dts = generate_declarations(
            Path::new("src/index.ts"),
            "export function add(a: number, b: number): number { return a + b; }\nexport const name: string = 'x';\n",
            true,
        )
        .unwrap();
        assert!(dts.contains("export declare function add(a: number, b: number): number;"));
        assert!(dts.contains("export declare const name: string;"));
    }

    #[test]
    fn test_strips_internal() {
        let source = "/** @internal */\nexport const hidden: number = 1;\nexport const shown: number = 2;\n";
        let dts = generate_declarations(Path::new("a.ts"), source, true).unwrap();
        assert!(!dts.contains("hidden"));
        assert!(dts.contains("shown"));
    }

    #[test]
    fn test_missing_annotation_fails() {
        let err = generate_declarations(
            Path::new("a.ts"),
            "export function f(a) { return a; }\n",
            true,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Declarations { .. }));
    }

    #[test]
    fn test_parse_error_fails() {
        let err = generate_declarations(Path::new("a.ts"), "export const = ;", true).unwrap_err();
        assert!(matches!(err, Error::Declarations { .. }));
    }
}
