//! Class members: fields, properties, methods and parameters.

use super::{AnnotationId, ClassId, Expr, FieldId, Modifiers, SourcePos, Stmt, TypeRef};

#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    pub name: String,
    pub modifiers: Modifiers,
    pub ty: TypeRef,
    pub init: Option<Expr>,
    pub annotations: Vec<AnnotationId>,
    pub owner: ClassId,
    pub pos: SourcePos,
}

impl FieldNode {
    pub fn is_static(&self) -> bool {
        self.modifiers.is_static()
    }
}

/// A property owns a backing field plus optional custom accessor bodies.
/// Annotations on a property are carried by its field.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyNode {
    pub name: String,
    pub modifiers: Modifiers,
    pub field: FieldId,
    pub getter: Option<Stmt>,
    pub setter: Option<Stmt>,
    pub owner: ClassId,
}

impl PropertyNode {
    pub fn is_static(&self) -> bool {
        self.modifiers.is_static()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Constructor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeRef,
    pub default: Option<Expr>,
    pub annotations: Vec<AnnotationId>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            annotations: Vec::new(),
        }
    }

    pub fn with_default(mut self, default: Expr) -> Self {
        self.default = Some(default);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodNode {
    pub name: String,
    pub kind: MethodKind,
    pub modifiers: Modifiers,
    pub return_type: TypeRef,
    pub params: Vec<Parameter>,
    pub body: Option<Stmt>,
    pub annotations: Vec<AnnotationId>,
    pub owner: ClassId,
    /// Synthesized by a transformation rather than written by the user.
    pub generated: bool,
    pub pos: SourcePos,
}

impl MethodNode {
    pub const CONSTRUCTOR_NAME: &'static str = "<init>";

    pub fn method(
        name: impl Into<String>,
        modifiers: Modifiers,
        return_type: TypeRef,
        params: Vec<Parameter>,
        body: Stmt,
    ) -> Self {
        Self {
            name: name.into(),
            kind: MethodKind::Method,
            modifiers,
            return_type,
            params,
            body: Some(body),
            annotations: Vec::new(),
            owner: ClassId(0),
            generated: false,
            pos: SourcePos::default(),
        }
    }

    pub fn constructor(modifiers: Modifiers, params: Vec<Parameter>, body: Stmt) -> Self {
        Self {
            kind: MethodKind::Constructor,
            ..Self::method(Self::CONSTRUCTOR_NAME, modifiers, TypeRef::void(), params, body)
        }
    }

    /// An abstract declaration without body.
    pub fn declaration(
        name: impl Into<String>,
        modifiers: Modifiers,
        return_type: TypeRef,
        params: Vec<Parameter>,
    ) -> Self {
        Self {
            body: None,
            ..Self::method(name, modifiers, return_type, params, Stmt::Empty)
        }
    }

    pub fn generated(mut self) -> Self {
        self.generated = true;
        self
    }

    pub fn is_constructor(&self) -> bool {
        self.kind == MethodKind::Constructor
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.is_static()
    }

    pub fn is_abstract(&self) -> bool {
        self.modifiers.is_abstract() || self.body.is_none()
    }

    /// `name(type1,type2)`, used for ordering synthesized members.
    pub fn descriptor(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|p| p.ty.descriptor()).collect();
        format!("{}({})", self.name, params.join(","))
    }

    /// Same name and parameter types.
    pub fn has_signature(&self, name: &str, param_types: &[TypeRef]) -> bool {
        self.name == name
            && self.params.len() == param_types.len()
            && self
                .params
                .iter()
                .zip(param_types)
                .all(|(p, t)| p.ty.is(t) || (p.ty.is_object() && t.is_object()))
    }
}
