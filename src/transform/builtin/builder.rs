//! `@Builder` with the default strategy: a nested `C$CBuilder` class with
//! chained setters and a `build()` method.

use crate::ast::types::capitalize;
use crate::ast::{
    Ast, ClassId, ClassNode, Expr, FieldNode, MethodId, MethodNode, Modifiers, NodeRef,
    Parameter, SourcePos, Stmt, TypeRef,
};
use crate::errors::InternalError;
use crate::transform::base::{instance_members, select_members, Usage};
use crate::transform::synth::*;
use crate::transform::{names, AstTransformation, TransformContext};

const DEFAULT_STRATEGY: &str = "DefaultStrategy";

struct BuilderNames {
    class_name: String,
    builder_method: String,
    build_method: String,
    prefix: String,
}

#[derive(Debug, Default)]
pub struct BuilderTransformation;

impl AstTransformation for BuilderTransformation {
    fn visit(
        &mut self,
        nodes: &[NodeRef],
        cx: &mut TransformContext<'_>,
    ) -> Result<(), InternalError> {
        let usage = Usage::init(cx.ast, nodes, names::BUILDER)?;
        if let Some(strategy) = usage.member_string(cx, "builderStrategy") {
            if crate::ast::types::simple_name(&strategy) != DEFAULT_STRATEGY {
                usage.error_during(
                    cx,
                    format!("builder strategy '{}' is not supported", strategy),
                );
                return Ok(());
            }
        }
        if usage.anno(cx.ast).member("forClass").is_some() {
            usage.error_during(
                cx,
                "annotation attribute 'forClass' not supported by DefaultStrategy",
            );
            return Ok(());
        }
        let buildee = match usage.node {
            NodeRef::Class(c) => c,
            NodeRef::Method(m) => cx.ast.method(m).owner,
            _ => {
                usage.error(cx, format!("{} is only allowed on classes and methods", usage.name));
                return Ok(());
            }
        };
        let simple = cx.ast.class(buildee).simple_name().to_string();
        let builder_class = usage
            .member_string(cx, "builderClassName")
            .unwrap_or_else(|| format!("{}Builder", simple));
        let naming = BuilderNames {
            class_name: format!("{}${}", cx.ast.class(buildee).name, builder_class),
            builder_method: usage
                .member_string(cx, "builderMethodName")
                .unwrap_or_else(|| "builder".to_string()),
            build_method: usage
                .member_string(cx, "buildMethodName")
                .unwrap_or_else(|| "build".to_string()),
            prefix: usage.member_string(cx, "prefix").unwrap_or_default(),
        };

        match usage.node {
            NodeRef::Method(method) => build_for_method(&usage, cx, buildee, method, &naming),
            _ => build_for_class(&usage, cx, buildee, &naming),
        }
        Ok(())
    }
}

fn build_for_class(
    usage: &Usage,
    cx: &mut TransformContext<'_>,
    buildee: ClassId,
    naming: &BuilderNames,
) {
    let includes = usage.member_string_list(cx, "includes");
    let excludes = usage.member_string_list(cx, "excludes");
    if !usage.check_include_exclude(cx, &includes, &excludes)
        || !usage.check_property_list(cx, buildee, &includes, "includes", false)
        || !usage.check_property_list(cx, buildee, &excludes, "excludes", false)
    {
        return;
    }
    let members: Vec<(String, TypeRef)> =
        select_members(instance_members(cx.ast, buildee, false, false), &includes, &excludes, false)
            .into_iter()
            .map(|m| (m.name, m.ty))
            .collect();

    let builder = create_builder_class(cx.ast, buildee, naming);
    for (name, ty) in &members {
        add_builder_member(cx.ast, builder, name, ty, None, &naming.prefix);
    }

    let buildee_type = cx.ast.class(buildee).type_ref();
    let instance = format!("_the{}", cx.ast.class(buildee).simple_name());
    let mut body = vec![declare(
        buildee_type.clone(),
        &instance,
        new_instance(buildee_type.clone(), vec![]),
    )];
    for (name, _) in &members {
        body.push(assign(prop(var(&instance), name), this_field(name)));
    }
    body.push(ret(var(&instance)));
    cx.ast.add_method(
        builder,
        MethodNode::method(
            naming.build_method.clone(),
            Modifiers::PUBLIC,
            buildee_type,
            vec![],
            Stmt::block(body),
        )
        .generated(),
    );
}

fn build_for_method(
    usage: &Usage,
    cx: &mut TransformContext<'_>,
    buildee: ClassId,
    method: MethodId,
    naming: &BuilderNames,
) {
    let anno = usage.anno(cx.ast);
    if anno.member("includes").is_some() || anno.member("excludes").is_some() {
        usage.error_during(cx, "includes/excludes only allowed on classes");
        return;
    }
    let target = cx.ast.method(method).clone();
    if !target.is_constructor() && !target.is_static() {
        usage.error_during(
            cx,
            format!(
                "method builders are only allowed on static methods, '{}' is not static",
                target.name
            ),
        );
        return;
    }

    let builder = create_builder_class(cx.ast, buildee, naming);
    for parameter in &target.params {
        add_builder_member(
            cx.ast,
            builder,
            &parameter.name,
            &parameter.ty,
            parameter.default.clone(),
            &naming.prefix,
        );
    }
    let args: Vec<Expr> = target.params.iter().map(|p| this_field(&p.name)).collect();
    let buildee_type = cx.ast.class(buildee).type_ref();
    let (return_type, result) = if target.is_constructor() {
        (buildee_type.clone(), new_instance(buildee_type, args))
    } else {
        (
            target.return_type.clone(),
            Expr::StaticCall {
                owner: buildee_type,
                method: target.name.clone(),
                args,
            },
        )
    };
    cx.ast.add_method(
        builder,
        MethodNode::method(
            naming.build_method.clone(),
            Modifiers::PUBLIC,
            return_type,
            vec![],
            Stmt::block(vec![ret(result)]),
        )
        .generated(),
    );
}

/// Adds the builder class to the buildee's module and the static factory
/// method to the buildee.
fn create_builder_class(ast: &mut Ast, buildee: ClassId, naming: &BuilderNames) -> ClassId {
    let module = ast.class(buildee).module;
    let mut node = ClassNode::new(
        naming.class_name.clone(),
        Modifiers::PUBLIC | Modifiers::STATIC | Modifiers::SYNTHETIC,
    );
    node.superclass = Some(TypeRef::object());
    node.outer = Some(buildee);
    let builder = ast.add_class(module, node);
    let builder_type = ast.class(builder).type_ref();
    ast.add_method(
        buildee,
        MethodNode::method(
            naming.builder_method.clone(),
            Modifiers::PUBLIC | Modifiers::STATIC | Modifiers::SYNTHETIC,
            builder_type.clone(),
            vec![],
            Stmt::block(vec![ret(new_instance(builder_type, vec![]))]),
        )
        .generated(),
    );
    builder
}

fn add_builder_member(
    ast: &mut Ast,
    builder: ClassId,
    name: &str,
    ty: &TypeRef,
    init: Option<Expr>,
    prefix: &str,
) {
    ast.add_field(
        builder,
        FieldNode {
            name: name.to_string(),
            modifiers: Modifiers::PRIVATE,
            ty: ty.clone(),
            init,
            annotations: Vec::new(),
            owner: builder,
            pos: SourcePos::default(),
        },
    );
    let setter = if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}{}", prefix, capitalize(name))
    };
    let builder_type = ast.class(builder).type_ref();
    ast.add_method(
        builder,
        MethodNode::method(
            setter,
            Modifiers::PUBLIC,
            builder_type,
            vec![Parameter::new(name, ty.clone())],
            Stmt::block(vec![assign(this_field(name), var(name)), ret(Expr::This)]),
        )
        .generated(),
    );
}
