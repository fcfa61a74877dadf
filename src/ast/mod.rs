//! AST node model for the Canopy transformation engine.
//!
//! Class-level structure (modules, classes, methods, fields, properties and
//! annotations) lives in an arena, [`Ast`], and is addressed by typed IDs.
//! Transformations hold IDs across mutations, so a class captured in a target
//! list stays valid while methods are added to it. Statements and expressions
//! are plain owned trees inside method bodies and initializers.

// ============================================================================
// IMPORTS
// ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod annotation;
pub mod arena;
pub mod class;
pub mod document;
pub mod expr;
pub mod member;
pub mod modifiers;
pub mod printer;
pub mod stmt;
pub mod types;
pub mod visitor;
pub mod walk;

pub use annotation::{AnnotationNode, AnnotationValue, Constant};
pub use arena::Ast;
pub use class::{ClassNode, ModuleNode, PendingTransforms};
pub use expr::{BinaryOp, CtorKind, Expr, MapEntry};
pub use member::{FieldNode, MethodKind, MethodNode, Parameter, PropertyNode};
pub use modifiers::Modifiers;
pub use stmt::Stmt;
pub use types::TypeRef;
pub use visitor::{walk_class, walk_module, AstVisitor, NodeRef};

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// Line/column range of a node in the original source. Zero means unknown.
///
/// # Examples
///
/// ```rust
/// use canopy::ast::SourcePos;
/// let pos = SourcePos::at(4, 2);
/// assert!(pos.is_known());
/// assert!(!SourcePos::default().is_known());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourcePos {
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
    #[serde(default)]
    pub last_line: u32,
    #[serde(default)]
    pub last_column: u32,
}

impl SourcePos {
    pub fn at(line: u32, column: u32) -> Self {
        Self {
            line,
            column,
            last_line: line,
            last_column: column,
        }
    }

    pub fn is_known(&self) -> bool {
        self.line > 0
    }
}

macro_rules! node_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

node_id!(
    /// Handle to a [`ModuleNode`] in the arena.
    ModuleId,
    "module"
);
node_id!(
    /// Handle to a [`ClassNode`] in the arena.
    ClassId,
    "class"
);
node_id!(
    /// Handle to a [`MethodNode`]; constructors are methods too.
    MethodId,
    "method"
);
node_id!(FieldId, "field");
node_id!(PropertyId, "property");
node_id!(
    /// Handle to one annotation *use*.
    AnnotationId,
    "annotation"
);
