//! `@Sortable`: natural ordering through `compareTo`, plus one comparator
//! per property.

use crate::ast::types::capitalize;
use crate::ast::{
    Ast, BinaryOp, ClassId, ClassNode, Expr, MethodNode, Modifiers, NodeRef, Stmt, TypeRef,
};
use crate::errors::InternalError;
use crate::transform::base::{instance_members, select_members, Member, Usage};
use crate::transform::synth::*;
use crate::transform::{names, AstTransformation, TransformContext};

const COMPARABLE: &str = "java.lang.Comparable";
const COMPARATOR: &str = "java.util.Comparator";
const OTHER: &str = "other";
const VALUE: &str = "value";

/// Library types with a natural ordering.
const COMPARABLE_TYPES: &[&str] = &[
    "java.lang.String",
    "java.lang.Boolean",
    "java.lang.Byte",
    "java.lang.Character",
    "java.lang.Double",
    "java.lang.Float",
    "java.lang.Integer",
    "java.lang.Long",
    "java.lang.Short",
    "java.math.BigInteger",
    "java.math.BigDecimal",
    "java.util.Date",
    "java.util.UUID",
    COMPARABLE,
];

#[derive(Debug, Default)]
pub struct SortableTransformation;

impl AstTransformation for SortableTransformation {
    fn visit(
        &mut self,
        nodes: &[NodeRef],
        cx: &mut TransformContext<'_>,
    ) -> Result<(), InternalError> {
        let usage = Usage::init(cx.ast, nodes, names::SORTABLE)?;
        let Some(class) = usage.target_class(cx) else {
            return Ok(());
        };
        if !usage.check_not_interface(cx, class) {
            return Ok(());
        }
        let includes = usage.member_string_list(cx, "includes");
        let excludes = usage.member_string_list(cx, "excludes");
        if !usage.check_include_exclude(cx, &includes, &excludes)
            || !usage.check_property_list(cx, class, &includes, "includes", false)
            || !usage.check_property_list(cx, class, &excludes, "excludes", false)
        {
            return Ok(());
        }
        let members =
            select_members(instance_members(cx.ast, class, false, false), &includes, &excludes, false);
        let mut comparable = true;
        for member in &members {
            if !is_comparable(cx.ast, &member.ty) {
                usage.error_during(cx, format!("property '{}' must be Comparable", member.name));
                comparable = false;
            }
        }
        if !comparable {
            return Ok(());
        }

        let class_type = cx.ast.class(class).type_ref();
        let comparable_of = TypeRef::generic(COMPARABLE, vec![class_type.clone()]);
        if !cx.ast.class(class).implements(&comparable_of) {
            cx.ast.class_mut(class).interfaces.push(comparable_of);
        }
        create_compare_to(cx.ast, class, &members);
        for member in &members {
            create_comparator(cx.ast, class, member);
        }
        Ok(())
    }
}

fn is_comparable(ast: &Ast, ty: &TypeRef) -> bool {
    if ty.is_primitive() || COMPARABLE_TYPES.iter().any(|n| ty.is_named(n)) {
        return true;
    }
    if ty.is_array() {
        return false;
    }
    ast.find_class(&ty.name).is_some_and(|c| {
        let node = ast.class(c);
        node.is_enum()
            || node.implements(&TypeRef::new(COMPARABLE))
            || ast.has_annotation(NodeRef::Class(c), names::SORTABLE)
    })
}

/// `if (this.is(other)) return 0`, then the first non-zero `<=>` in
/// property order.
fn create_compare_to(ast: &mut Ast, class: ClassId, members: &[Member]) {
    let class_type = ast.class(class).type_ref();
    let mut body = vec![
        return_if(identical(Expr::This, var(OTHER)), int(0)),
        declare(TypeRef::new("java.lang.Integer"), VALUE, int(0)),
    ];
    for member in members {
        body.push(assign(
            var(VALUE),
            binary(
                BinaryOp::Cmp,
                prop(Expr::This, &member.name),
                prop(var(OTHER), &member.name),
            ),
        ));
        body.push(return_if(
            binary(BinaryOp::Ne, var(VALUE), int(0)),
            var(VALUE),
        ));
    }
    body.push(ret(int(0)));
    ast.add_method(
        class,
        MethodNode::method(
            "compareTo",
            Modifiers::PUBLIC,
            TypeRef::int(),
            vec![param(OTHER, class_type)],
            Stmt::block(body),
        )
        .generated(),
    );
}

/// A nested `C$PComparator` and the static `comparatorByP()` returning one.
fn create_comparator(ast: &mut Ast, class: ClassId, member: &Member) {
    let class_type = ast.class(class).type_ref();
    let suffix = capitalize(&member.name);
    let mut node = ClassNode::new(
        format!("{}${}Comparator", ast.class(class).name, suffix),
        Modifiers::PUBLIC | Modifiers::STATIC | Modifiers::SYNTHETIC,
    );
    node.superclass = Some(TypeRef::object());
    node.interfaces
        .push(TypeRef::generic(COMPARATOR, vec![class_type.clone()]));
    node.outer = Some(class);
    let module = ast.class(class).module;
    let comparator = ast.add_class(module, node);

    let (a, b) = (var("arg0"), var("arg1"));
    let body = vec![
        return_if(identical(a.clone(), b.clone()), int(0)),
        return_if(and(not_null(a.clone()), is_null(b.clone())), int(-1)),
        return_if(and(is_null(a.clone()), not_null(b.clone())), int(1)),
        ret(binary(
            BinaryOp::Cmp,
            prop(a, &member.name),
            prop(b, &member.name),
        )),
    ];
    ast.add_method(
        comparator,
        MethodNode::method(
            "compare",
            Modifiers::PUBLIC,
            TypeRef::int(),
            vec![param("arg0", class_type.clone()), param("arg1", class_type.clone())],
            Stmt::block(body),
        )
        .generated(),
    );

    let comparator_type = ast.class(comparator).type_ref();
    ast.add_method(
        class,
        MethodNode::method(
            format!("comparatorBy{}", suffix),
            Modifiers::PUBLIC | Modifiers::STATIC,
            TypeRef::generic(COMPARATOR, vec![class_type]),
            vec![],
            Stmt::block(vec![ret(new_instance(comparator_type, vec![]))]),
        )
        .generated(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::printer::print_class;
    use crate::ast::{AnnotationNode, AnnotationValue};
    use crate::compiler::{CompilePhase, SourceUnit};
    use crate::config::CompilerConfiguration;
    use crate::errors::WarningCategory;
    use crate::transform::TransformLoader;

    fn run(extra: Option<TypeRef>, anno: AnnotationNode) -> (Ast, SourceUnit, ClassId) {
        let mut ast = Ast::new();
        let module = ast.add_module("M", None);
        let class = ast.add_class(module, ClassNode::new("Person", Modifiers::PUBLIC));
        ast.add_property(class, "last", Modifiers::NONE, TypeRef::string(), None);
        ast.add_property(class, "born", Modifiers::NONE, TypeRef::int(), None);
        if let Some(ty) = extra {
            ast.add_property(class, "extra", Modifiers::NONE, ty, None);
        }
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
        SortableTransformation
            .visit(&[NodeRef::Annotation(anno), NodeRef::Class(class)], &mut cx)
            .unwrap();
        (ast, source, class)
    }

    #[test]
    fn compare_to_follows_property_order() {
        let (ast, source, class) = run(None, AnnotationNode::new("Sortable"));
        assert!(!source.errors().has_errors());
        let printed = print_class(&ast, class);
        let last = printed.find("value = this.last <=> other.last").unwrap();
        let born = printed.find("value = this.born <=> other.born").unwrap();
        assert!(last < born);
        assert!(ast.declares_method(class, "comparatorByLast", 0));
        assert!(ast.declares_method(class, "comparatorByBorn", 0));
        let comparator = ast.find_class("Person$BornComparator").unwrap();
        assert!(ast.declares_method(comparator, "compare", 2));
    }

    #[test]
    fn includes_restrict_members() {
        let anno = AnnotationNode::new("Sortable").with_member("includes", AnnotationValue::string("born"));
        let (ast, _, class) = run(None, anno);
        assert!(!ast.declares_method(class, "comparatorByLast", 0));
        assert!(ast.declares_method(class, "comparatorByBorn", 0));
    }

    #[test]
    fn non_comparable_property_is_rejected() {
        let (ast, source, class) = run(Some(TypeRef::list()), AnnotationNode::new("Sortable"));
        assert_eq!(source.errors().error_count(), 1);
        assert!(!ast.declares_method(class, "compareTo", 1));
    }
}
