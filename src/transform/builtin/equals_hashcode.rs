//! `@EqualsAndHashCode`: value-based `equals`, `canEqual` and `hashCode`.

use crate::ast::{
    Ast, BinaryOp, ClassId, Expr, FieldNode, MethodNode, Modifiers, NodeRef, SourcePos, Stmt,
    TypeRef,
};
use crate::errors::InternalError;
use crate::transform::base::{
    add_generated_method, instance_members, select_members, Member, Usage,
};
use crate::transform::synth::*;
use crate::transform::{names, AstTransformation, TransformContext};

const OTHER: &str = "other";
const OTHER_TYPED: &str = "otherTyped";
const RESULT: &str = "_result";
const HASH_CACHE: &str = "$hash$code";

/// Options shared with the transformations that generate these methods on
/// another annotation's behalf.
#[derive(Debug, Clone, Default)]
pub struct EqualsOptions {
    pub call_super: bool,
    pub include_fields: bool,
    pub cache: bool,
    pub use_can_equal: bool,
    pub all_names: bool,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
}

impl EqualsOptions {
    /// Reads and validates the members of `usage`. `None` when they conflict.
    pub fn read(usage: &Usage, cx: &mut TransformContext<'_>, class: ClassId) -> Option<Self> {
        let options = Self {
            call_super: usage.member_bool(cx, "callSuper", false),
            include_fields: usage.member_bool(cx, "includeFields", false),
            cache: usage.member_bool(cx, "cache", false),
            use_can_equal: usage.member_bool(cx, "useCanEqual", true),
            all_names: usage.member_bool(cx, "allNames", false),
            includes: usage.member_string_list(cx, "includes"),
            excludes: usage.member_string_list(cx, "excludes"),
        };
        if !usage.check_include_exclude(cx, &options.includes, &options.excludes) {
            return None;
        }
        let lists = [("includes", &options.includes), ("excludes", &options.excludes)];
        for (list_name, list) in lists {
            if !usage.check_property_list(cx, class, list, list_name, options.include_fields) {
                return None;
            }
        }
        Some(options)
    }

    fn members(&self, ast: &Ast, class: ClassId) -> Vec<Member> {
        select_members(
            instance_members(ast, class, self.include_fields, false),
            &self.includes,
            &self.excludes,
            self.all_names,
        )
    }
}

#[derive(Debug, Default)]
pub struct EqualsAndHashCodeTransformation;

impl AstTransformation for EqualsAndHashCodeTransformation {
    fn visit(
        &mut self,
        nodes: &[NodeRef],
        cx: &mut TransformContext<'_>,
    ) -> Result<(), InternalError> {
        let usage = Usage::init(cx.ast, nodes, names::EQUALS_AND_HASH_CODE)?;
        let Some(class) = usage.target_class(cx) else {
            return Ok(());
        };
        if !usage.check_not_interface(cx, class) {
            return Ok(());
        }
        let Some(options) = EqualsOptions::read(&usage, cx, class) else {
            return Ok(());
        };
        if options.call_super && cx.ast.class(class).superclass.is_none() {
            usage.error_during(
                cx,
                format!(
                    "You can't use callSuper=true with class '{}' as it has no superclass.",
                    cx.ast.class(class).name
                ),
            );
            return Ok(());
        }
        create_hash_code(cx.ast, class, &options);
        create_equals(cx.ast, class, &options);
        Ok(())
    }
}

/// Adds `hashCode()`, folding each member into `_result` with
/// `HashCodeHelper.updateHash`.
pub fn create_hash_code(ast: &mut Ast, class: ClassId, options: &EqualsOptions) {
    let members = options.members(ast, class);
    let mut stmts = vec![declare(
        TypeRef::int(),
        RESULT,
        static_call(names::HASH_CODE_HELPER, "initHash", vec![]),
    )];
    for member in &members {
        let value = if member.is_direct() {
            this_field(&member.name)
        } else {
            prop(Expr::This, &member.name)
        };
        let update = static_call(
            names::HASH_CODE_HELPER,
            "updateHash",
            vec![var(RESULT), value.clone()],
        );
        stmts.push(if_then(
            not(identical(value, Expr::This)),
            assign(var(RESULT), update),
        ));
    }
    if options.call_super {
        let update = static_call(
            names::HASH_CODE_HELPER,
            "updateHash",
            vec![var(RESULT), call(Expr::Super, "hashCode", vec![])],
        );
        stmts.push(assign(var(RESULT), update));
    }

    let body = if options.cache {
        add_cache_field(ast, class, HASH_CACHE, TypeRef::int());
        stmts.push(assign(this_field(HASH_CACHE), var(RESULT)));
        Stmt::block(vec![
            if_then(
                binary(BinaryOp::Eq, this_field(HASH_CACHE), int(0)),
                Stmt::block(stmts),
            ),
            ret(this_field(HASH_CACHE)),
        ])
    } else {
        stmts.push(ret(var(RESULT)));
        Stmt::block(stmts)
    };
    add_generated_method(
        ast,
        class,
        MethodNode::method("hashCode", Modifiers::PUBLIC, TypeRef::int(), vec![], body),
    );
}

/// Adds `equals(Object)` and, when enabled, `canEqual(Object)`.
pub fn create_equals(ast: &mut Ast, class: ClassId, options: &EqualsOptions) {
    let class_type = ast.class(class).type_ref();
    let members = options.members(ast, class);

    let mut stmts = vec![
        return_if(is_null(var(OTHER)), boolean(false)),
        return_if(identical(Expr::This, var(OTHER)), boolean(true)),
    ];
    if options.use_can_equal {
        stmts.push(return_if(
            not(instance_of(var(OTHER), class_type.clone())),
            boolean(false),
        ));
        stmts.push(declare(
            class_type.clone(),
            OTHER_TYPED,
            cast(class_type.clone(), var(OTHER)),
        ));
        stmts.push(return_if(
            not(call(var(OTHER_TYPED), "canEqual", vec![Expr::This])),
            boolean(false),
        ));
    } else {
        stmts.push(return_if(
            binary(
                BinaryOp::Ne,
                call_this("getClass", vec![]),
                call(var(OTHER), "getClass", vec![]),
            ),
            boolean(false),
        ));
        stmts.push(declare(
            class_type.clone(),
            OTHER_TYPED,
            cast(class_type.clone(), var(OTHER)),
        ));
    }

    for member in &members {
        let (mine, theirs) = member_pair(&member.name, OTHER_TYPED, member.is_direct());
        stmts.push(return_if(
            differs_in_self_reference(mine.clone(), theirs.clone(), OTHER_TYPED),
            boolean(false),
        ));
        stmts.push(if_then(
            not(both_self_references(mine.clone(), theirs.clone(), OTHER_TYPED)),
            return_if(differs(mine, theirs), boolean(false)),
        ));
    }
    if options.call_super {
        stmts.push(return_if(
            not(call(Expr::Super, "equals", vec![var(OTHER)])),
            boolean(false),
        ));
    }
    stmts.push(ret(boolean(true)));

    add_generated_method(
        ast,
        class,
        MethodNode::method(
            "equals",
            Modifiers::PUBLIC,
            TypeRef::boolean(),
            vec![param(OTHER, TypeRef::object())],
            Stmt::block(stmts),
        ),
    );

    if options.use_can_equal {
        let body = Stmt::block(vec![ret(instance_of(var(OTHER), class_type))]);
        add_generated_method(
            ast,
            class,
            MethodNode::method(
                "canEqual",
                Modifiers::PUBLIC,
                TypeRef::boolean(),
                vec![param(OTHER, TypeRef::object())],
                body,
            ),
        );
    }
}

/// Adds a private synthetic cache field unless the class already has it.
pub(crate) fn add_cache_field(ast: &mut Ast, class: ClassId, name: &str, ty: TypeRef) {
    if ast.field_by_name(class, name).is_some() {
        return;
    }
    ast.add_field(
        class,
        FieldNode {
            name: name.to_string(),
            modifiers: Modifiers::PRIVATE | Modifiers::SYNTHETIC,
            ty,
            init: None,
            annotations: Vec::new(),
            owner: class,
            pos: SourcePos::default(),
        },
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

    fn run(annotation: AnnotationNode, user_equals: bool) -> (Ast, SourceUnit, ClassId) {
        let mut ast = Ast::new();
        let module = ast.add_module("P", None);
        let class = ast.add_class(module, ClassNode::new("P", Modifiers::PUBLIC));
        ast.add_property(class, "name", Modifiers::NONE, TypeRef::string(), None);
        ast.add_property(class, "age", Modifiers::NONE, TypeRef::int(), None);
        if user_equals {
            ast.add_method(
                class,
                MethodNode::method(
                    "equals",
                    Modifiers::PUBLIC,
                    TypeRef::boolean(),
                    vec![param("o", TypeRef::object())],
                    Stmt::block(vec![ret(boolean(false))]),
                ),
            );
        }
        let anno = ast.annotate(NodeRef::Class(class), annotation).unwrap();
        let mut source = SourceUnit::new("P", module, WarningCategory::LikelyErrors);
        let loader = TransformLoader::with_builtins();
        let config = CompilerConfiguration::default();
        let mut cx = TransformContext {
            ast: &mut ast,
            source: &mut source,
            loader: &loader,
            config: &config,
            phase: CompilePhase::Canonicalization,
        };
        EqualsAndHashCodeTransformation
            .visit(&[NodeRef::Annotation(anno), NodeRef::Class(class)], &mut cx)
            .unwrap();
        (ast, source, class)
    }

    #[test]
    fn generates_hash_code_over_properties() {
        let (ast, source, class) = run(AnnotationNode::new("EqualsAndHashCode"), false);
        assert!(!source.errors().has_errors());
        let printed = print_class(&ast, class);
        assert!(printed.contains("int _result = HashCodeHelper.initHash()"));
        assert!(printed.contains(
            "if (!(this.name is this)) {\n            _result = HashCodeHelper.updateHash(_result, this.name)"
        ));
        assert!(ast.declares_method(class, "canEqual", 1));
    }

    #[test]
    fn user_equals_gets_private_fallback_once() {
        let (mut ast, source, class) = run(AnnotationNode::new("EqualsAndHashCode"), true);
        let fallback = ast.methods_named(class, "_equals");
        assert_eq!(fallback.len(), 1);
        assert!(ast.method(fallback[0]).modifiers.is_private());

        let options = EqualsOptions::default();
        create_equals(&mut ast, class, &options);
        assert_eq!(ast.methods_named(class, "_equals").len(), 1);
        assert_eq!(ast.methods_named(class, "equals").len(), 1);
        assert!(!source.errors().has_errors());
    }

    #[test]
    fn includes_and_excludes_together_generate_nothing() {
        let anno = AnnotationNode::new("EqualsAndHashCode")
            .with_member("includes", AnnotationValue::string("name"))
            .with_member("excludes", AnnotationValue::string("age"));
        let (ast, source, class) = run(anno, false);
        assert_eq!(source.errors().error_count(), 1);
        assert!(ast.class(class).methods.is_empty());
    }
}
