//! Internal engine errors.
//!
//! These indicate a compiler bug, never a problem in the user's program, and
//! are propagated with `?` rather than collected.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum InternalError {
    #[error("Internal error: expecting [AnnotationNode, AnnotatedNode] but got: {found}")]
    #[diagnostic(
        code(canopy::internal::node_shape),
        help("This is an internal compiler error. Please report this as a bug.")
    )]
    NodeShape { found: String },

    #[error("Internal error: expecting [ModuleNode] but got: {found}")]
    #[diagnostic(
        code(canopy::internal::module_shape),
        help("This is an internal compiler error. Please report this as a bug.")
    )]
    ModuleShape { found: String },

    #[error("Internal error: transformation for {expected} invoked for annotation {found}")]
    #[diagnostic(
        code(canopy::internal::wrong_annotation),
        help("This is an internal compiler error. Please report this as a bug.")
    )]
    WrongAnnotation { expected: String, found: String },

    #[error("Internal error: {message}")]
    #[diagnostic(
        code(canopy::internal::invariant),
        help("This is an internal compiler error. Please report this as a bug.")
    )]
    Invariant { message: String },
}

impl InternalError {
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }
}
