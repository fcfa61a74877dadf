//! Shared machinery for the built-in transformations.
//!
//! [`Usage::init`] checks the `[annotation, annotated node]` shape every local
//! transformation receives; the member readers and checks report user mistakes
//! against the annotation's position.

use super::{names, TransformContext};
use crate::ast::{
    AnnotationId, AnnotationNode, AnnotationValue, Ast, ClassId, Constant, FieldId, NodeRef,
    PropertyId, SourcePos, TypeRef,
};
use crate::errors::{ErrorKind, InternalError};

/// A validated annotation use handed to a transformation.
#[derive(Debug, Clone)]
pub struct Usage {
    pub annotation: AnnotationId,
    pub node: NodeRef,
    /// `@Simple` name of the annotation type.
    pub name: String,
    pub pos: SourcePos,
}

impl Usage {
    /// Checks the node shape and the annotation type.
    pub fn init(ast: &Ast, nodes: &[NodeRef], expected: &str) -> Result<Usage, InternalError> {
        let (annotation, node) = match nodes {
            [NodeRef::Annotation(a), node]
                if !matches!(node, NodeRef::Annotation(_) | NodeRef::Module(_)) =>
            {
                (*a, *node)
            }
            _ => {
                let found: Vec<&str> = nodes.iter().map(|n| n.kind()).collect();
                return Err(InternalError::NodeShape {
                    found: format!("[{}]", found.join(", ")),
                });
            }
        };
        let anno = ast.annotation(annotation);
        if !anno.is_type(expected) {
            return Err(InternalError::WrongAnnotation {
                expected: names::at_name(expected),
                found: anno.ty.to_string(),
            });
        }
        Ok(Usage {
            annotation,
            node,
            name: names::at_name(expected),
            pos: anno.pos,
        })
    }

    pub fn anno<'a>(&self, ast: &'a Ast) -> &'a AnnotationNode {
        ast.annotation(self.annotation)
    }

    // ------------------------------------------------------------------------
    // Reporting
    // ------------------------------------------------------------------------

    /// Reports `message` verbatim at the annotation.
    pub fn error(&self, cx: &mut TransformContext<'_>, message: impl Into<String>) {
        cx.source.add_error(
            ErrorKind::TransformUsage {
                annotation: self.name.clone(),
                message: message.into(),
            },
            self.pos,
        );
    }

    /// Reports `Error during @X processing: <detail>`.
    pub fn error_during(&self, cx: &mut TransformContext<'_>, detail: impl AsRef<str>) {
        let message = format!("Error during {} processing: {}", self.name, detail.as_ref());
        self.error(cx, message);
    }

    pub fn warning(&self, cx: &mut TransformContext<'_>, message: impl Into<String>) {
        cx.source.add_warning(
            crate::errors::WarningCategory::LikelyErrors,
            ErrorKind::TransformUsage {
                annotation: self.name.clone(),
                message: message.into(),
            },
            self.pos,
        );
    }

    // ------------------------------------------------------------------------
    // Member readers
    // ------------------------------------------------------------------------

    /// Whether member `name` is the constant `value`.
    pub fn member_has_value(&self, ast: &Ast, name: &str, value: &Constant) -> bool {
        self.anno(ast).member(name).and_then(AnnotationValue::as_constant) == Some(value)
    }

    pub fn member_bool(&self, cx: &mut TransformContext<'_>, name: &str, default: bool) -> bool {
        match self.anno(cx.ast).member(name) {
            None => default,
            Some(value) => match value.as_bool() {
                Some(b) => b,
                None => {
                    self.not_constant(cx, name);
                    default
                }
            },
        }
    }

    pub fn member_string(&self, cx: &mut TransformContext<'_>, name: &str) -> Option<String> {
        let value = self.anno(cx.ast).member(name)?;
        match value {
            AnnotationValue::Constant(Constant::Str(s)) => Some(s.clone()),
            AnnotationValue::ClassLiteral { class } => Some(class.name.clone()),
            AnnotationValue::Property { property, .. } => Some(property.clone()),
            _ => {
                self.not_constant(cx, name);
                None
            }
        }
    }

    pub fn member_int(&self, cx: &mut TransformContext<'_>, name: &str) -> Option<i64> {
        let value = self.anno(cx.ast).member(name)?;
        match value {
            AnnotationValue::Constant(Constant::Int(i)) => Some(*i),
            _ => {
                self.not_constant(cx, name);
                None
            }
        }
    }

    /// A list of names. Single strings are split on commas.
    pub fn member_string_list(&self, cx: &mut TransformContext<'_>, name: &str) -> Vec<String> {
        let Some(value) = self.anno(cx.ast).member(name) else {
            return Vec::new();
        };
        let Some(items) = value.as_strings() else {
            self.not_constant(cx, name);
            return Vec::new();
        };
        items
            .iter()
            .flat_map(|item| item.split(','))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn member_class_list(&self, cx: &mut TransformContext<'_>, name: &str) -> Vec<TypeRef> {
        let Some(value) = self.anno(cx.ast).member(name) else {
            return Vec::new();
        };
        match value.as_classes() {
            Some(classes) => classes,
            None => {
                self.not_constant(cx, name);
                Vec::new()
            }
        }
    }

    fn not_constant(&self, cx: &mut TransformContext<'_>, name: &str) {
        self.error(
            cx,
            format!(
                "Expecting to find a constant value for '{}' of {} but found an expression",
                name, self.name
            ),
        );
    }

    // ------------------------------------------------------------------------
    // Checks
    // ------------------------------------------------------------------------

    /// Reports when both lists are given. Returns whether they are usable.
    pub fn check_include_exclude(
        &self,
        cx: &mut TransformContext<'_>,
        includes: &[String],
        excludes: &[String],
    ) -> bool {
        if !includes.is_empty() && !excludes.is_empty() {
            cx.source.add_error(
                ErrorKind::IncludesAndExcludes {
                    annotation: self.name.clone(),
                },
                self.pos,
            );
            return false;
        }
        true
    }

    /// Reports every name in `list` that is not a member of `class`.
    pub fn check_property_list(
        &self,
        cx: &mut TransformContext<'_>,
        class: ClassId,
        list: &[String],
        list_name: &str,
        include_fields: bool,
    ) -> bool {
        let known: Vec<String> = instance_members(cx.ast, class, include_fields, true)
            .into_iter()
            .map(|m| m.name)
            .collect();
        let mut ok = true;
        for name in list {
            if !known.contains(name) {
                cx.source.add_error(
                    ErrorKind::UnknownProperty {
                        annotation: self.name.clone(),
                        list: list_name.to_string(),
                        property: name.clone(),
                    },
                    self.pos,
                );
                ok = false;
            }
        }
        ok
    }

    pub fn check_not_interface(&self, cx: &mut TransformContext<'_>, class: ClassId) -> bool {
        let node = cx.ast.class(class);
        if !node.is_interface() {
            return true;
        }
        let class_name = node.name.clone();
        cx.source.add_error(
            ErrorKind::NotAllowedForInterface {
                annotation: self.name.clone(),
                class: class_name,
            },
            self.pos,
        );
        false
    }

    /// The annotated class, or a usage error when the target is something else.
    pub fn target_class(&self, cx: &mut TransformContext<'_>) -> Option<ClassId> {
        match self.node {
            NodeRef::Class(c) => Some(c),
            _ => {
                self.error(
                    cx,
                    format!("{} is only allowed on classes", self.name),
                );
                None
            }
        }
    }
}

/// Whether a member is left out of generated code.
pub fn should_skip(name: &str, excludes: &[String], includes: &[String], all_names: bool) -> bool {
    excludes.iter().any(|e| e == name)
        || (name.contains('$') && !all_names)
        || (!includes.is_empty() && !includes.iter().any(|i| i == name))
}

/// A property or field considered by generated methods.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: String,
    pub ty: TypeRef,
    pub field: FieldId,
    pub property: Option<PropertyId>,
}

impl Member {
    /// Fields without a property are read directly, never through a getter.
    pub fn is_direct(&self) -> bool {
        self.property.is_none()
    }
}

/// Instance properties, then (optionally) plain instance fields.
pub fn instance_members(
    ast: &Ast,
    class: ClassId,
    include_fields: bool,
    include_synthetic: bool,
) -> Vec<Member> {
    let mut out: Vec<Member> = ast
        .instance_properties(class)
        .into_iter()
        .map(|p| {
            let prop = ast.property(p);
            Member {
                name: prop.name.clone(),
                ty: ast.field(prop.field).ty.clone(),
                field: prop.field,
                property: Some(p),
            }
        })
        .collect();
    if include_fields {
        out.extend(
            ast.plain_fields(class)
                .into_iter()
                .filter(|f| !ast.field(*f).is_static())
                .filter(|f| include_synthetic || !ast.field(*f).modifiers.is_synthetic())
                .map(|f| {
                    let field = ast.field(f);
                    Member {
                        name: field.name.clone(),
                        ty: field.ty.clone(),
                        field: f,
                        property: None,
                    }
                }),
        );
    }
    out
}

/// Properties declared by superclasses in this compilation, outermost first.
pub fn super_members(ast: &Ast, class: ClassId) -> Vec<Member> {
    let mut chain = Vec::new();
    let mut current = ast.superclass(class);
    while let Some(sup) = current {
        if chain.contains(&sup) {
            break;
        }
        chain.push(sup);
        current = ast.superclass(sup);
    }
    chain
        .into_iter()
        .rev()
        .flat_map(|c| instance_members(ast, c, false, false))
        .collect()
}

/// Keeps members that survive `should_skip`, ordered as in `includes` when
/// it is given.
pub fn select_members(
    members: Vec<Member>,
    includes: &[String],
    excludes: &[String],
    all_names: bool,
) -> Vec<Member> {
    let mut kept: Vec<Member> = members
        .into_iter()
        .filter(|m| !should_skip(&m.name, excludes, includes, all_names))
        .collect();
    if !includes.is_empty() {
        kept.sort_by_key(|m| includes.iter().position(|i| *i == m.name));
    }
    kept
}

/// Adds `method` under its own name, or under the private fallback `_name`
/// when the user already declared a method with that name and arity. Nothing
/// is added when the fallback is taken too, or when the existing method was
/// itself generated.
pub fn add_generated_method(
    ast: &mut Ast,
    class: ClassId,
    mut method: crate::ast::MethodNode,
) -> Option<crate::ast::MethodId> {
    let arity = method.params.len();
    let existing = ast
        .methods_named(class, &method.name)
        .into_iter()
        .find(|m| ast.method(*m).params.len() == arity);
    if let Some(existing) = existing {
        let fallback = format!("_{}", method.name);
        if ast.method(existing).generated || ast.declares_method(class, &fallback, arity) {
            return None;
        }
        method.name = fallback;
        method.modifiers = method
            .modifiers
            .with_visibility(crate::ast::Modifiers::PRIVATE);
    }
    Some(ast.add_method(class, method.generated()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ClassNode, MethodNode, Modifiers, Stmt};

    #[test]
    fn skip_rules() {
        let none: Vec<String> = Vec::new();
        let ex = vec!["b".to_string()];
        let inc = vec!["a".to_string()];
        assert!(should_skip("b", &ex, &none, false));
        assert!(should_skip("x$y", &none, &none, false));
        assert!(!should_skip("x$y", &none, &none, true));
        assert!(should_skip("c", &none, &inc, false));
        assert!(!should_skip("a", &none, &inc, false));
    }

    #[test]
    fn wrong_shape_is_internal() {
        let ast = Ast::new();
        let err = Usage::init(&ast, &[], names::TO_STRING).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Internal error: expecting [AnnotationNode, AnnotatedNode] but got: []"
        );
    }

    #[test]
    fn generated_method_falls_back_then_stops() {
        let mut ast = Ast::new();
        let module = ast.add_module("M", None);
        let class = ast.add_class(module, ClassNode::new("C", Modifiers::PUBLIC));
        let make = || {
            MethodNode::method("equals", Modifiers::PUBLIC, TypeRef::boolean(), vec![], Stmt::Empty)
        };
        ast.add_method(class, make());
        let fallback = add_generated_method(&mut ast, class, make()).unwrap();
        assert_eq!(ast.method(fallback).name, "_equals");
        assert!(ast.method(fallback).modifiers.is_private());
        assert!(add_generated_method(&mut ast, class, make()).is_none());
    }

    #[test]
    fn includes_order_is_honored() {
        let mut ast = Ast::new();
        let module = ast.add_module("M", None);
        let class = ast.add_class(module, ClassNode::new("C", Modifiers::PUBLIC));
        for name in ["a", "b", "c"] {
            ast.add_property(class, name, Modifiers::NONE, TypeRef::string(), None);
        }
        let members = instance_members(&ast, class, false, false);
        let includes = vec!["c".to_string(), "a".to_string()];
        let names: Vec<String> = select_members(members, &includes, &[], false)
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, ["c", "a"]);
    }
}
