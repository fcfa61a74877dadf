//! `@ToString`: a readable `toString()` built with a `StringBuilder`.

use super::equals_hashcode::add_cache_field;
use crate::ast::{Ast, ClassId, Expr, MethodNode, Modifiers, NodeRef, Stmt, TypeRef};
use crate::errors::InternalError;
use crate::transform::base::{
    add_generated_method, instance_members, select_members, super_members, Usage,
};
use crate::transform::synth::*;
use crate::transform::{names, AstTransformation, TransformContext};

const RESULT: &str = "_result";
const FIRST: &str = "$toStringFirst";
const CACHE: &str = "$to$string";

#[derive(Debug, Clone)]
pub struct ToStringOptions {
    pub include_names: bool,
    pub include_fields: bool,
    pub ignore_nulls: bool,
    pub include_package: bool,
    pub include_super: bool,
    pub include_super_properties: bool,
    pub cache: bool,
    pub all_names: bool,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
}

impl Default for ToStringOptions {
    fn default() -> Self {
        Self {
            include_names: false,
            include_fields: false,
            ignore_nulls: false,
            include_package: true,
            include_super: false,
            include_super_properties: false,
            cache: false,
            all_names: false,
            includes: Vec::new(),
            excludes: Vec::new(),
        }
    }
}

impl ToStringOptions {
    pub fn read(usage: &Usage, cx: &mut TransformContext<'_>, class: ClassId) -> Option<Self> {
        let options = Self {
            include_names: usage.member_bool(cx, "includeNames", false),
            include_fields: usage.member_bool(cx, "includeFields", false),
            ignore_nulls: usage.member_bool(cx, "ignoreNulls", false),
            include_package: usage.member_bool(cx, "includePackage", true),
            include_super: usage.member_bool(cx, "includeSuper", false),
            include_super_properties: usage.member_bool(cx, "includeSuperProperties", false),
            cache: usage.member_bool(cx, "cache", false),
            all_names: usage.member_bool(cx, "allNames", false),
            includes: usage.member_string_list(cx, "includes"),
            excludes: usage.member_string_list(cx, "excludes"),
        };
        if !usage.check_include_exclude(cx, &options.includes, &options.excludes) {
            return None;
        }
        // `super` is a valid include name when the super call is requested.
        let includes: Vec<String> = options
            .includes
            .iter()
            .filter(|name| !(options.include_super && *name == "super"))
            .cloned()
            .collect();
        if !usage.check_property_list(cx, class, &includes, "includes", options.include_fields)
            || !usage.check_property_list(
                cx,
                class,
                &options.excludes,
                "excludes",
                options.include_fields,
            )
        {
            return None;
        }
        Some(options)
    }
}

#[derive(Debug, Default)]
pub struct ToStringTransformation;

impl AstTransformation for ToStringTransformation {
    fn visit(
        &mut self,
        nodes: &[NodeRef],
        cx: &mut TransformContext<'_>,
    ) -> Result<(), InternalError> {
        let usage = Usage::init(cx.ast, nodes, names::TO_STRING)?;
        let Some(class) = usage.target_class(cx) else {
            return Ok(());
        };
        if !usage.check_not_interface(cx, class) {
            return Ok(());
        }
        if let Some(options) = ToStringOptions::read(&usage, cx, class) {
            create_to_string(cx.ast, class, &options);
        }
        Ok(())
    }
}

struct Element {
    name: String,
    value: Expr,
    can_be_self: bool,
}

/// Adds `toString()`, or `_toString()` when the user wrote one.
pub fn create_to_string(ast: &mut Ast, class: ClassId, options: &ToStringOptions) {
    let node = ast.class(class);
    let class_type = node.type_ref();
    let class_name = if options.include_package {
        node.name.clone()
    } else {
        node.simple_name().to_string()
    };

    let mut members = instance_members(ast, class, options.include_fields, false);
    if options.include_super_properties {
        members.extend(super_members(ast, class));
    }
    let mut elements: Vec<Element> =
        select_members(members, &[], &options.excludes, options.all_names)
            .into_iter()
            .filter(|m| options.includes.is_empty() || options.includes.contains(&m.name))
            .map(|m| Element {
                value: if m.is_direct() {
                    this_field(&m.name)
                } else {
                    prop(Expr::This, &m.name)
                },
                can_be_self: m.ty.is(&class_type) || m.ty.is_object(),
                name: m.name,
            })
            .collect();
    if options.include_super {
        elements.push(Element {
            name: "super".to_string(),
            value: call(Expr::Super, "toString", vec![]),
            can_be_self: false,
        });
    }
    if !options.includes.is_empty() {
        elements.sort_by_key(|e| options.includes.iter().position(|i| *i == e.name));
    }

    let mut stmts = vec![
        declare(
            TypeRef::new("java.lang.StringBuilder"),
            RESULT,
            new_instance(TypeRef::new("java.lang.StringBuilder"), vec![]),
        ),
        declare(TypeRef::boolean(), FIRST, boolean(true)),
        append(string(&format!("{}(", class_name))),
    ];
    for element in elements {
        stmts.push(append_element(element, options));
    }
    stmts.push(append(string(")")));
    let text = call(var(RESULT), "toString", vec![]);

    let body = if options.cache {
        add_cache_field(ast, class, CACHE, TypeRef::string());
        stmts.push(assign(this_field(CACHE), text));
        Stmt::block(vec![
            if_then(is_null(this_field(CACHE)), Stmt::block(stmts)),
            ret(this_field(CACHE)),
        ])
    } else {
        stmts.push(ret(text));
        Stmt::block(stmts)
    };
    add_generated_method(
        ast,
        class,
        MethodNode::method("toString", Modifiers::PUBLIC, TypeRef::string(), vec![], body),
    );
}

fn append(value: Expr) -> Stmt {
    expr(call(var(RESULT), "append", vec![value]))
}

fn append_element(element: Element, options: &ToStringOptions) -> Stmt {
    let mut block = vec![if_else(
        var(FIRST),
        assign(var(FIRST), boolean(false)),
        append(string(", ")),
    )];
    if options.include_names {
        block.push(append(string(&format!("{}:", element.name))));
    }
    let rendered = static_call(names::INVOKER_HELPER, "toString", vec![element.value.clone()]);
    if element.can_be_self {
        block.push(if_else(
            identical(element.value.clone(), Expr::This),
            append(string("(this)")),
            append(rendered),
        ));
    } else {
        block.push(append(rendered));
    }
    if options.ignore_nulls {
        if_then(not_null(element.value), Stmt::block(block))
    } else {
        Stmt::block(block)
    }
}
