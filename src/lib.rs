//! Canopy: the annotation-driven AST transformation engine of a JVM-hosted
//! dynamic language compiler.
//!
//! Module documents are lowered into an [`ast::Ast`], annotation uses are
//! collected into per-class transformation registrations, and a
//! [`compiler::CompilationUnit`] runs them phase by phase alongside any global
//! transformations found on the classpath. The [`eval`] module executes the
//! result so synthesized members can be exercised directly.

pub mod ast;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod errors;
pub mod eval;
pub mod transform;

pub use compiler::{CompilationUnit, CompilePhase};
pub use config::CompilerConfiguration;
pub use errors::{CompileError, CompileFailure, InternalError};
