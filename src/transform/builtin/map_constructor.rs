//! `@MapConstructor`: a constructor taking named arguments.

use super::tuple_constructor::has_explicit_constructor;
use crate::ast::{Ast, ClassId, CtorKind, Expr, MethodNode, Modifiers, NodeRef, Stmt, TypeRef};
use crate::errors::InternalError;
use crate::transform::base::{instance_members, select_members, super_members, Usage};
use crate::transform::synth::*;
use crate::transform::{names, AstTransformation, TransformContext};

const ARGS: &str = "args";

#[derive(Debug, Clone, Default)]
pub struct MapOptions {
    pub include_fields: bool,
    pub include_super_properties: bool,
    pub no_arg: bool,
    pub force: bool,
    pub all_names: bool,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
}

#[derive(Debug, Default)]
pub struct MapConstructorTransformation;

impl AstTransformation for MapConstructorTransformation {
    fn visit(
        &mut self,
        nodes: &[NodeRef],
        cx: &mut TransformContext<'_>,
    ) -> Result<(), InternalError> {
        let usage = Usage::init(cx.ast, nodes, names::MAP_CONSTRUCTOR)?;
        let Some(class) = usage.target_class(cx) else {
            return Ok(());
        };
        if !usage.check_not_interface(cx, class) {
            return Ok(());
        }
        let options = MapOptions {
            include_fields: usage.member_bool(cx, "includeFields", false),
            include_super_properties: usage.member_bool(cx, "includeSuperProperties", false),
            no_arg: usage.member_bool(cx, "noArg", false),
            force: usage.member_bool(cx, "force", false),
            all_names: usage.member_bool(cx, "allNames", false),
            includes: usage.member_string_list(cx, "includes"),
            excludes: usage.member_string_list(cx, "excludes"),
        };
        if !usage.check_include_exclude(cx, &options.includes, &options.excludes)
            || !usage.check_property_list(
                cx,
                class,
                &options.includes,
                "includes",
                options.include_fields,
            )
            || !usage.check_property_list(
                cx,
                class,
                &options.excludes,
                "excludes",
                options.include_fields,
            )
        {
            return Ok(());
        }
        create_map_constructor(cx.ast, class, &options);
        Ok(())
    }
}

/// Adds `C(Map args)` and, with `no_arg`, `C()` delegating to it. Returns
/// whether anything was added.
pub fn create_map_constructor(ast: &mut Ast, class: ClassId, options: &MapOptions) -> bool {
    if !options.force && has_explicit_constructor(ast, class) {
        return false;
    }
    if ast
        .declared_constructor(class, &[TypeRef::map()])
        .is_some()
    {
        return false;
    }
    let mut members = Vec::new();
    if options.include_super_properties {
        members.extend(super_members(ast, class));
    }
    members.extend(instance_members(ast, class, options.include_fields, false));
    let members = select_members(members, &options.includes, &options.excludes, options.all_names);

    let mut body = vec![if_then(
        is_null(var(ARGS)),
        assign(var(ARGS), Expr::Map(Vec::new())),
    )];
    for member in &members {
        let has_key = call(var(ARGS), "containsKey", vec![string(&member.name)]);
        let target = if member.is_direct() {
            this_field(&member.name)
        } else {
            prop(Expr::This, &member.name)
        };
        body.push(if_then(has_key, assign(target, prop(var(ARGS), &member.name))));
    }
    ast.add_constructor(
        class,
        MethodNode::constructor(
            Modifiers::PUBLIC,
            vec![param(ARGS, TypeRef::map())],
            Stmt::block(body),
        )
        .generated(),
    );

    if options.no_arg && ast.declared_constructor(class, &[]).is_none() {
        let delegate = expr(ctor_call(CtorKind::This, vec![Expr::Map(Vec::new())]));
        ast.add_constructor(
            class,
            MethodNode::constructor(Modifiers::PUBLIC, vec![], Stmt::block(vec![delegate]))
                .generated(),
        );
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::printer::print_class;
    use crate::ast::ClassNode;

    #[test]
    fn assigns_only_supplied_keys() {
        let mut ast = Ast::new();
        let module = ast.add_module("M", None);
        let class = ast.add_class(module, ClassNode::new("Point", Modifiers::PUBLIC));
        ast.add_property(class, "x", Modifiers::NONE, TypeRef::int(), None);
        let options = MapOptions {
            no_arg: true,
            ..Default::default()
        };
        assert!(create_map_constructor(&mut ast, class, &options));
        assert_eq!(ast.class(class).constructors.len(), 2);
        let printed = print_class(&ast, class);
        assert!(printed.contains("if (args.containsKey('x'))"));
        assert!(printed.contains("this.x = args.x"));
        assert!(!create_map_constructor(&mut ast, class, &options));
    }
}
