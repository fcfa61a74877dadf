//! Shared helpers for the integration tests.
//!
//! Tests describe modules as JSON documents, compile them with the built-in
//! transformations and then inspect the AST or run it through the evaluator.

#![allow(dead_code)]

use canopy::ast::document::ModuleDocument;
use canopy::errors::CompileFailure;
use canopy::transform::TransformLoader;
use canopy::{CompilationUnit, CompilerConfiguration};
use std::path::PathBuf;

pub fn document(json: &str) -> ModuleDocument {
    ModuleDocument::from_json(json).unwrap_or_else(|e| panic!("invalid test document: {e}"))
}

/// Compiles a document with the built-ins and a custom loader, returning the
/// unit whatever the outcome.
pub fn try_compile_with(
    loader: TransformLoader,
    config: CompilerConfiguration,
    json: &str,
) -> (CompilationUnit, Result<(), CompileFailure>) {
    let mut unit = CompilationUnit::new(config, loader);
    unit.add_document("Test.json", &document(json))
        .expect("document loads");
    let result = unit.compile();
    (unit, result)
}

pub fn try_compile(json: &str) -> (CompilationUnit, Result<(), CompileFailure>) {
    try_compile_with(
        TransformLoader::with_builtins(),
        CompilerConfiguration::default(),
        json,
    )
}

/// Compiles a document that is expected to be free of errors.
pub fn compile(json: &str) -> CompilationUnit {
    let (unit, result) = try_compile(json);
    if let Err(failure) = result {
        panic!("{failure}: {:#?}", error_messages(&unit));
    }
    unit
}

/// Messages of every reported error, warnings excluded.
pub fn error_messages(unit: &CompilationUnit) -> Vec<String> {
    unit.diagnostics()
        .into_iter()
        .filter(|d| !d.is_warning())
        .map(|d| d.message())
        .collect()
}

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}
