//! `@TupleConstructor`: a constructor taking the members in declaration order.

use crate::ast::{
    Ast, ClassId, Constant, CtorKind, Expr, MethodId, MethodNode, Modifiers, NodeRef, Parameter,
    Stmt, TypeRef,
};
use crate::errors::InternalError;
use crate::transform::base::{instance_members, should_skip, super_members, Member, Usage};
use crate::transform::synth::*;
use crate::transform::{names, AstTransformation, TransformContext};

#[derive(Debug, Clone)]
pub struct TupleOptions {
    pub include_fields: bool,
    pub include_properties: bool,
    pub include_super_properties: bool,
    pub call_super: bool,
    pub force: bool,
    pub defaults: bool,
    pub all_names: bool,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
}

impl Default for TupleOptions {
    fn default() -> Self {
        Self {
            include_fields: false,
            include_properties: true,
            include_super_properties: false,
            call_super: false,
            force: false,
            defaults: true,
            all_names: false,
            includes: Vec::new(),
            excludes: Vec::new(),
        }
    }
}

impl TupleOptions {
    pub fn read(usage: &Usage, cx: &mut TransformContext<'_>, class: ClassId) -> Option<Self> {
        let options = Self {
            include_fields: usage.member_bool(cx, "includeFields", false),
            include_properties: usage.member_bool(cx, "includeProperties", true),
            include_super_properties: usage.member_bool(cx, "includeSuperProperties", false),
            call_super: usage.member_bool(cx, "callSuper", false),
            force: usage.member_bool(cx, "force", false),
            defaults: usage.member_bool(cx, "defaults", true),
            all_names: usage.member_bool(cx, "allNames", false),
            includes: usage.member_string_list(cx, "includes"),
            excludes: usage.member_string_list(cx, "excludes"),
        };
        if !usage.check_include_exclude(cx, &options.includes, &options.excludes) {
            return None;
        }
        let inherited: Vec<String> = if options.include_super_properties {
            super_members(cx.ast, class).into_iter().map(|m| m.name).collect()
        } else {
            Vec::new()
        };
        for (list_name, list) in [("includes", &options.includes), ("excludes", &options.excludes)]
        {
            let own: Vec<String> = list
                .iter()
                .filter(|n| !inherited.contains(n))
                .cloned()
                .collect();
            if !usage.check_property_list(cx, class, &own, list_name, options.include_fields) {
                return None;
            }
        }
        Some(options)
    }
}

/// What happened to the requested constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TupleOutcome {
    Added(MethodId),
    /// The class declares its own constructor and `force` is off.
    SkippedExplicit,
    /// A constructor with the same parameter types already exists.
    Duplicate(String),
}

#[derive(Debug, Default)]
pub struct TupleConstructorTransformation;

impl AstTransformation for TupleConstructorTransformation {
    fn visit(
        &mut self,
        nodes: &[NodeRef],
        cx: &mut TransformContext<'_>,
    ) -> Result<(), InternalError> {
        let usage = Usage::init(cx.ast, nodes, names::TUPLE_CONSTRUCTOR)?;
        let Some(class) = usage.target_class(cx) else {
            return Ok(());
        };
        if !usage.check_not_interface(cx, class) {
            return Ok(());
        }
        let Some(options) = TupleOptions::read(&usage, cx, class) else {
            return Ok(());
        };
        if let TupleOutcome::Duplicate(signature) = create_constructor(cx.ast, class, &options) {
            usage.warning(
                cx,
                format!("{} specifies duplicate constructor: {}", usage.name, signature),
            );
        }
        Ok(())
    }
}

/// Whether the user wrote a constructor.
pub fn has_explicit_constructor(ast: &Ast, class: ClassId) -> bool {
    ast.class(class)
        .constructors
        .iter()
        .any(|c| !ast.method(*c).generated)
}

/// Zero value for a type, used when a member has no initializer.
pub fn default_value(ty: &TypeRef) -> Expr {
    if !ty.is_primitive() {
        return null();
    }
    match ty.name.as_str() {
        "boolean" => boolean(false),
        "float" | "double" => Expr::Constant(Constant::Float(0.0)),
        _ => int(0),
    }
}

/// Adds the ordered constructor.
pub fn create_constructor(ast: &mut Ast, class: ClassId, options: &TupleOptions) -> TupleOutcome {
    if !options.force && has_explicit_constructor(ast, class) {
        return TupleOutcome::SkippedExplicit;
    }
    let keep = |m: &Member| {
        !should_skip(&m.name, &options.excludes, &options.includes, options.all_names)
    };

    let super_list: Vec<Member> = if options.include_super_properties {
        super_members(ast, class).into_iter().filter(keep).collect()
    } else {
        Vec::new()
    };
    let own: Vec<Member> = instance_members(ast, class, options.include_fields, false)
        .into_iter()
        .filter(|m| options.include_properties || m.is_direct())
        .filter(keep)
        .collect();

    let mut params = Vec::new();
    let mut body = Vec::new();
    let mut super_args = Vec::new();
    for member in &super_list {
        params.push(make_param(ast, member, options.defaults));
        if options.call_super {
            super_args.push(var(&member.name));
        } else {
            body.push(assign(prop(Expr::This, &member.name), var(&member.name)));
        }
    }
    if options.call_super {
        body.push(expr(ctor_call(CtorKind::Super, super_args)));
    }
    for member in &own {
        params.push(make_param(ast, member, options.defaults));
        body.push(assign(this_field(&member.name), var(&member.name)));
    }
    if !options.includes.is_empty() {
        params.sort_by_key(|p| options.includes.iter().position(|i| *i == p.name));
    }

    let types: Vec<TypeRef> = params.iter().map(|p| p.ty.clone()).collect();
    if ast.declared_constructor(class, &types).is_some() {
        let shown: Vec<String> = types.iter().map(TypeRef::short).collect();
        return TupleOutcome::Duplicate(format!(
            "{}({})",
            ast.class(class).simple_name(),
            shown.join(",")
        ));
    }
    let ctor = MethodNode::constructor(Modifiers::PUBLIC, params, Stmt::block(body)).generated();
    TupleOutcome::Added(ast.add_constructor(class, ctor))
}

fn make_param(ast: &Ast, member: &Member, defaults: bool) -> Parameter {
    let parameter = param(&member.name, member.ty.clone());
    if !defaults {
        return parameter;
    }
    let init = ast
        .field(member.field)
        .init
        .clone()
        .filter(|init| !(member.ty.is_primitive() && init.is_null()))
        .unwrap_or_else(|| default_value(&member.ty));
    parameter.with_default(init)
}
