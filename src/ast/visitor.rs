//! Read-only traversal over the class-level AST.
//!
//! There is one visitor trait over the tagged union [`NodeRef`]. The walk order
//! is fixed and shared by the annotation collector and the dispatcher's target
//! collection, so both see annotation uses in the same order.

use super::{AnnotationId, Ast, ClassId, FieldId, MethodId, ModuleId, PropertyId};
use std::fmt;

/// A handle to any node a transformation can be pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Module(ModuleId),
    Class(ClassId),
    /// A method or constructor.
    Method(MethodId),
    Field(FieldId),
    Property(PropertyId),
    /// The n-th parameter of a method or constructor.
    Parameter(MethodId, usize),
    Annotation(AnnotationId),
}

impl NodeRef {
    pub fn as_annotation(self) -> Option<AnnotationId> {
        match self {
            NodeRef::Annotation(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_class(self) -> Option<ClassId> {
        match self {
            NodeRef::Class(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_method(self) -> Option<MethodId> {
        match self {
            NodeRef::Method(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_field(self) -> Option<FieldId> {
        match self {
            NodeRef::Field(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_module(self) -> Option<ModuleId> {
        match self {
            NodeRef::Module(id) => Some(id),
            _ => None,
        }
    }

    /// Node kind, as used in internal error messages.
    pub fn kind(self) -> &'static str {
        match self {
            NodeRef::Module(_) => "ModuleNode",
            NodeRef::Class(_) => "ClassNode",
            NodeRef::Method(_) => "MethodNode",
            NodeRef::Field(_) => "FieldNode",
            NodeRef::Property(_) => "PropertyNode",
            NodeRef::Parameter(..) => "Parameter",
            NodeRef::Annotation(_) => "AnnotationNode",
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Module(id) => write!(f, "{}", id),
            NodeRef::Class(id) => write!(f, "{}", id),
            NodeRef::Method(id) => write!(f, "{}", id),
            NodeRef::Field(id) => write!(f, "{}", id),
            NodeRef::Property(id) => write!(f, "{}", id),
            NodeRef::Parameter(id, index) => write!(f, "{}/param#{}", id, index),
            NodeRef::Annotation(id) => write!(f, "{}", id),
        }
    }
}

pub trait AstVisitor {
    fn visit(&mut self, ast: &Ast, node: NodeRef);
}

impl<F> AstVisitor for F
where
    F: FnMut(&Ast, NodeRef),
{
    fn visit(&mut self, ast: &Ast, node: NodeRef) {
        self(ast, node)
    }
}

/// Visits a class and everything annotatable beneath it, in document order:
/// the class, its annotations, each field then its annotations, each
/// constructor then its annotations and parameters, and likewise each method.
///
/// Property annotations live on the backing field and are reached through it.
pub fn walk_class<V: AstVisitor + ?Sized>(visitor: &mut V, ast: &Ast, class: ClassId) {
    let node = ast.class(class);
    visitor.visit(ast, NodeRef::Class(class));
    for anno in &node.annotations {
        visitor.visit(ast, NodeRef::Annotation(*anno));
    }
    for field in &node.fields {
        visitor.visit(ast, NodeRef::Field(*field));
        for anno in &ast.field(*field).annotations {
            visitor.visit(ast, NodeRef::Annotation(*anno));
        }
    }
    for method in node.constructors.iter().chain(node.methods.iter()) {
        walk_method(visitor, ast, *method);
    }
}

fn walk_method<V: AstVisitor + ?Sized>(visitor: &mut V, ast: &Ast, method: MethodId) {
    let node = ast.method(method);
    visitor.visit(ast, NodeRef::Method(method));
    for anno in &node.annotations {
        visitor.visit(ast, NodeRef::Annotation(*anno));
    }
    for (index, param) in node.params.iter().enumerate() {
        visitor.visit(ast, NodeRef::Parameter(method, index));
        for anno in &param.annotations {
            visitor.visit(ast, NodeRef::Annotation(*anno));
        }
    }
}

/// Visits the module, then walks each of its classes in order.
pub fn walk_module<V: AstVisitor + ?Sized>(visitor: &mut V, ast: &Ast, module: ModuleId) {
    visitor.visit(ast, NodeRef::Module(module));
    for class in &ast.module(module).classes {
        walk_class(visitor, ast, *class);
    }
}
