//! `@AutoClone`: makes a class `Cloneable` and generates `clone()`.

use super::immutable::is_cloneable;
use crate::ast::{Ast, ClassId, CtorKind, Expr, MethodNode, Modifiers, NodeRef, Stmt, TypeRef};
use crate::errors::InternalError;
use crate::transform::base::{add_generated_method, instance_members, Member, Usage};
use crate::transform::synth::*;
use crate::transform::{names, AstTransformation, TransformContext};

const CLONEABLE: &str = "java.lang.Cloneable";
const RESULT: &str = "_result";
const OTHER: &str = "other";
const COPY_MEMBERS: &str = "cloneOrCopyMembers";

/// Library types known to implement `Cloneable`.
const CLONEABLE_TYPES: &[&str] = &[
    "java.util.ArrayList",
    "java.util.LinkedList",
    "java.util.HashMap",
    "java.util.LinkedHashMap",
    "java.util.TreeMap",
    "java.util.HashSet",
    "java.util.LinkedHashSet",
    "java.util.TreeSet",
    "java.util.Date",
];

/// Library types that cannot be subclassed, so never hold a clone-able value.
const FINAL_TYPES: &[&str] = &[
    "java.lang.String",
    "java.lang.Boolean",
    "java.lang.Byte",
    "java.lang.Character",
    "java.lang.Double",
    "java.lang.Float",
    "java.lang.Integer",
    "java.lang.Long",
    "java.lang.Short",
    "java.lang.Class",
    "java.math.BigInteger",
    "java.util.UUID",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Clone,
    Simple,
    CopyConstructor,
}

#[derive(Debug, Default)]
pub struct AutoCloneTransformation;

impl AstTransformation for AutoCloneTransformation {
    fn visit(
        &mut self,
        nodes: &[NodeRef],
        cx: &mut TransformContext<'_>,
    ) -> Result<(), InternalError> {
        let usage = Usage::init(cx.ast, nodes, names::AUTO_CLONE)?;
        let Some(class) = usage.target_class(cx) else {
            return Ok(());
        };
        if !usage.check_not_interface(cx, class) {
            return Ok(());
        }
        let cloneable = TypeRef::new(CLONEABLE);
        if !cx.ast.class(class).implements(&cloneable) {
            cx.ast.class_mut(class).interfaces.push(cloneable);
        }
        let include_fields = usage.member_bool(cx, "includeFields", false);
        let excludes = usage.member_string_list(cx, "excludes");
        if !usage.check_property_list(cx, class, &excludes, "excludes", include_fields) {
            return Ok(());
        }
        let style = match usage
            .anno(cx.ast)
            .member("style")
            .and_then(|v| v.as_enum_constant())
        {
            None | Some("CLONE") => Style::Clone,
            Some("SIMPLE") => Style::Simple,
            Some("COPY_CONSTRUCTOR") => Style::CopyConstructor,
            Some(other) => {
                let other = other.to_string();
                usage.error_during(cx, format!("style {} is not supported", other));
                return Ok(());
            }
        };
        let members: Vec<Member> = instance_members(cx.ast, class, include_fields, false)
            .into_iter()
            .filter(|m| !excludes.contains(&m.name))
            .collect();
        match style {
            Style::Clone => create_clone(cx.ast, class, &members),
            Style::Simple => create_simple_clone(cx.ast, class, &members),
            Style::CopyConstructor => create_copy_constructor_clone(cx.ast, class, &members),
        }
        Ok(())
    }
}

fn is_cloneable_type(ast: &Ast, ty: &TypeRef) -> bool {
    ty.is_array() || CLONEABLE_TYPES.iter().any(|n| ty.is_named(n)) || is_cloneable(ast, ty)
}

fn possibly_cloneable(ast: &Ast, ty: &TypeRef) -> bool {
    if ty.is_primitive() || FINAL_TYPES.iter().any(|n| ty.is_named(n)) {
        return false;
    }
    is_cloneable_type(ast, ty)
        || ast
            .find_class(&ty.name)
            .map_or(true, |c| !ast.class(c).modifiers.is_final())
}

/// `value == null ? null : value.clone()`
fn clone_direct(value: Expr) -> Expr {
    ternary(is_null(value.clone()), null(), call(value, "clone", vec![]))
}

/// Clones through the meta layer when the static type doesn't promise it.
fn clone_dynamic(value: Expr) -> Expr {
    static_call(
        names::INVOKER_HELPER,
        "invokeMethod",
        vec![value, string("clone"), null()],
    )
}

/// Copies one member from `from` into `to`, cloning where the value allows.
fn copy_member(ast: &Ast, member: &Member, from: Expr, to: Expr) -> Stmt {
    let ty = &member.ty;
    if is_cloneable_type(ast, ty) {
        assign(to, cast(ty.clone(), clone_direct(from)))
    } else if !possibly_cloneable(ast, ty) {
        assign(to, from)
    } else {
        if_else(
            instance_of(from.clone(), TypeRef::new(CLONEABLE)),
            assign(to.clone(), cast(ty.clone(), clone_dynamic(from.clone()))),
            assign(to, from),
        )
    }
}

fn has_parent(ast: &Ast, class: ClassId) -> bool {
    ast.class(class)
        .superclass
        .as_ref()
        .is_some_and(|s| !s.is_object())
}

fn add_clone_method(ast: &mut Ast, class: ClassId, body: Vec<Stmt>) {
    let class_type = ast.class(class).type_ref();
    add_generated_method(
        ast,
        class,
        MethodNode::method("clone", Modifiers::PUBLIC, class_type, vec![], Stmt::block(body)),
    );
}

fn add_no_arg_constructor_if_missing(ast: &mut Ast, class: ClassId) {
    if ast.class(class).constructors.is_empty() {
        ast.add_constructor(
            class,
            MethodNode::constructor(Modifiers::PUBLIC, vec![], Stmt::block(vec![])).generated(),
        );
    }
}

/// `super.clone()`, then a clone of each member that can be cloned.
fn create_clone(ast: &mut Ast, class: ClassId, members: &[Member]) {
    let class_type = ast.class(class).type_ref();
    let mut body = vec![declare(
        class_type.clone(),
        RESULT,
        cast(class_type, call(Expr::Super, "clone", vec![])),
    )];
    for member in members {
        let value = this_field(&member.name);
        let to = prop(var(RESULT), &member.name);
        if is_cloneable_type(ast, &member.ty) {
            body.push(assign(to, cast(member.ty.clone(), clone_direct(value))));
        } else if possibly_cloneable(ast, &member.ty) {
            body.push(if_then(
                instance_of(value.clone(), TypeRef::new(CLONEABLE)),
                assign(to, cast(member.ty.clone(), clone_dynamic(value))),
            ));
        }
    }
    body.push(ret(var(RESULT)));
    add_clone_method(ast, class, body);
}

/// A fresh instance filled by a protected `cloneOrCopyMembers(other)` chain.
fn create_simple_clone(ast: &mut Ast, class: ClassId, members: &[Member]) {
    add_no_arg_constructor_if_missing(ast, class);
    let class_type = ast.class(class).type_ref();
    let mut copy = Vec::new();
    if has_parent(ast, class) {
        copy.push(expr(call(Expr::Super, COPY_MEMBERS, vec![var(OTHER)])));
    }
    for member in members {
        copy.push(copy_member(
            ast,
            member,
            prop(Expr::This, &member.name),
            prop(var(OTHER), &member.name),
        ));
    }
    ast.add_method(
        class,
        MethodNode::method(
            COPY_MEMBERS,
            Modifiers::PROTECTED,
            TypeRef::void(),
            vec![param(OTHER, class_type.clone())],
            Stmt::block(copy),
        )
        .generated(),
    );
    add_clone_method(
        ast,
        class,
        vec![
            declare(class_type.clone(), RESULT, new_instance(class_type, vec![])),
            expr(call_this(COPY_MEMBERS, vec![var(RESULT)])),
            ret(var(RESULT)),
        ],
    );
}

/// A protected copy constructor, with `clone()` delegating to it.
fn create_copy_constructor_clone(ast: &mut Ast, class: ClassId, members: &[Member]) {
    add_no_arg_constructor_if_missing(ast, class);
    let class_type = ast.class(class).type_ref();
    if ast.declared_constructor(class, &[class_type.clone()]).is_none() {
        let mut body = Vec::new();
        if has_parent(ast, class) {
            body.push(expr(ctor_call(CtorKind::Super, vec![var(OTHER)])));
        }
        for member in members {
            body.push(copy_member(
                ast,
                member,
                prop(var(OTHER), &member.name),
                prop(Expr::This, &member.name),
            ));
        }
        ast.add_constructor(
            class,
            MethodNode::constructor(
                Modifiers::PROTECTED,
                vec![param(OTHER, class_type.clone())],
                Stmt::block(body),
            )
            .generated(),
        );
    }
    add_clone_method(
        ast,
        class,
        vec![ret(new_instance(class_type, vec![Expr::This]))],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::printer::print_class;
    use crate::ast::{AnnotationNode, AnnotationValue, ClassNode};
    use crate::compiler::{CompilePhase, SourceUnit};
    use crate::config::CompilerConfiguration;
    use crate::errors::WarningCategory;
    use crate::transform::TransformLoader;

    fn run(anno: AnnotationNode, interface: bool) -> (Ast, SourceUnit, ClassId) {
        let mut ast = Ast::new();
        let module = ast.add_module("M", None);
        let mods = if interface {
            Modifiers::PUBLIC | Modifiers::INTERFACE | Modifiers::ABSTRACT
        } else {
            Modifiers::PUBLIC
        };
        let class = ast.add_class(module, ClassNode::new("Person", mods));
        ast.add_property(class, "name", Modifiers::NONE, TypeRef::string(), None);
        ast.add_property(class, "born", Modifiers::NONE, TypeRef::new("java.util.Date"), None);
        ast.add_property(class, "tags", Modifiers::NONE, TypeRef::list(), None);
        let anno = ast.annotate(NodeRef::Class(class), anno).unwrap();
        let mut source = SourceUnit::new("M", module, WarningCategory::LikelyErrors);
        let loader = TransformLoader::with_builtins();
        let config = CompilerConfiguration::default();
        let mut cx = TransformContext {
            ast: &mut ast,
            source: &mut source,
            loader: &loader,
            config: &config,
            phase: CompilePhase::Canonicalization,
        };
        AutoCloneTransformation
            .visit(&[NodeRef::Annotation(anno), NodeRef::Class(class)], &mut cx)
            .unwrap();
        (ast, source, class)
    }

    #[test]
    fn default_style_clones_cloneable_members() {
        let (ast, source, class) = run(AnnotationNode::new("AutoClone"), false);
        assert!(!source.errors().has_errors());
        assert!(ast.class(class).implements(&TypeRef::new("java.lang.Cloneable")));
        let printed = print_class(&ast, class);
        assert!(printed.contains("Person _result = (Person) super.clone()"));
        assert!(printed.contains("_result.born = (Date) "));
        assert!(printed.contains("this.@born.clone()"));
        // String is final: nothing to clone.
        assert!(!printed.contains("_result.name"));
        assert!(printed.contains("if (this.@tags instanceof Cloneable)"));
    }

    #[test]
    fn simple_style_adds_copy_helper() {
        let anno = AnnotationNode::new("AutoClone").with_member(
            "style",
            AnnotationValue::Property {
                owner: TypeRef::new("AutoCloneStyle"),
                property: "SIMPLE".into(),
            },
        );
        let (ast, source, class) = run(anno, false);
        assert!(!source.errors().has_errors());
        assert!(ast.declares_method(class, COPY_MEMBERS, 1));
        assert_eq!(ast.class(class).constructors.len(), 1);
        let printed = print_class(&ast, class);
        assert!(printed.contains("other.name = this.name"));
    }

    #[test]
    fn interfaces_and_unknown_excludes_are_rejected() {
        let (_, source, _) = run(AnnotationNode::new("AutoClone"), true);
        assert_eq!(source.errors().error_count(), 1);
        let anno = AnnotationNode::new("AutoClone")
            .with_member("excludes", AnnotationValue::string("missing"));
        let (ast, source, class) = run(anno, false);
        assert_eq!(source.errors().error_count(), 1);
        assert!(!ast.declares_method(class, "clone", 0));
    }
}
