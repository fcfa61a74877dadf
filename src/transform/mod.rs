//! # Transform Module
//!
//! ## Purpose
//! Annotation-driven AST transformation: finding annotation uses, mapping them
//! to transformation classes, running those at the right compile phase, and
//! the built-in transformation library.
//!
//! ## Layout
//! - [`collector`]: registers (transformation, annotation use) pairs per class
//! - [`alias`]: expands annotation-collector aliases before collection
//! - [`dispatch`]: per-phase two-pass dispatch
//! - [`global`]: service-file discovery of unit-wide transformations
//! - [`base`] and [`synth`]: shared helpers for transformations
//! - [`builtin`]: the built-in library
//!
//! ## Invariants
//! - Target collection never mutates the AST; it only borrows it shared.
//! - A (transformation, annotation use) pair runs at most once per phase.

use crate::ast::{Ast, NodeRef};
use crate::compiler::{CompilePhase, SourceUnit};
use crate::config::CompilerConfiguration;
use crate::errors::InternalError;

pub mod alias;
pub mod base;
pub mod builtin;
pub mod collector;
pub mod dispatch;
pub mod global;
pub mod loader;
pub mod names;
pub mod synth;

pub use loader::{
    AliasDefinition, AliasMode, AnnotationType, ClassLoader, LoadError, ResourceLocation,
    TransformHandle, TransformLoader,
};

/// Everything a transformation may touch while it runs.
pub struct TransformContext<'a> {
    pub ast: &'a mut Ast,
    pub source: &'a mut SourceUnit,
    pub loader: &'a dyn ClassLoader,
    pub config: &'a CompilerConfiguration,
    pub phase: CompilePhase,
}

/// The transformation capability.
///
/// Local transformations receive `[Annotation, annotated node]`; global ones
/// receive `[Module]`. User mistakes are reported through
/// `cx.source`; an `Err` means the engine itself is broken and aborts the
/// compilation.
pub trait AstTransformation {
    fn visit(&mut self, nodes: &[NodeRef], cx: &mut TransformContext<'_>)
        -> Result<(), InternalError>;
}
