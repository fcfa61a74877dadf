//! `@Lazy`: the field moves to `$name` and is built by its getter on first
//! access.

use crate::ast::{Expr, FieldId, MethodNode, Modifiers, NodeRef, Stmt};
use crate::errors::InternalError;
use crate::transform::base::Usage;
use crate::transform::synth::*;
use crate::transform::{names, AstTransformation, TransformContext};

#[derive(Debug, Default)]
pub struct LazyTransformation;

impl AstTransformation for LazyTransformation {
    fn visit(
        &mut self,
        nodes: &[NodeRef],
        cx: &mut TransformContext<'_>,
    ) -> Result<(), InternalError> {
        let usage = Usage::init(cx.ast, nodes, names::LAZY)?;
        let target_field: FieldId = match usage.node {
            NodeRef::Field(f) => f,
            NodeRef::Property(p) => cx.ast.property(p).field,
            _ => {
                usage.error(cx, format!("{} is only allowed on fields", usage.name));
                return Ok(());
            }
        };
        let node = cx.ast.field(target_field).clone();
        if node.ty.is_primitive() {
            usage.error(
                cx,
                format!(
                    "{} field '{}' must have a class type, but is declared as {}",
                    usage.name, node.name, node.ty.name
                ),
            );
            return Ok(());
        }

        let owner = node.owner;
        if let Some(property) = cx.ast.property_of_field(target_field) {
            cx.ast.remove_property(owner, property);
        }
        let backing = format!("${}", node.name);
        let initial = match &node.init {
            Some(init) if !init.is_null() => init.clone(),
            _ => new_instance(node.ty.clone(), vec![]),
        };
        {
            let f = cx.ast.field_mut(target_field);
            f.name = backing.clone();
            f.init = None;
            f.modifiers = f.modifiers.with_visibility(Modifiers::PRIVATE);
        }

        let target = if node.is_static() {
            field(Expr::ClassLit(cx.ast.class(owner).type_ref()), &backing)
        } else {
            this_field(&backing)
        };
        let create = ret(assign_expr(target.clone(), initial));
        let body = if node.modifiers.contains(Modifiers::VOLATILE) {
            let lock = if node.is_static() {
                Expr::ClassLit(cx.ast.class(owner).type_ref())
            } else {
                Expr::This
            };
            if_else(
                not_null(target.clone()),
                ret(target.clone()),
                Stmt::Synchronized {
                    lock,
                    body: Box::new(if_else(not_null(target.clone()), ret(target), create)),
                },
            )
        } else {
            if_else(not_null(target.clone()), ret(target), create)
        };

        let mut modifiers = Modifiers::PUBLIC;
        if node.is_static() {
            modifiers.insert(Modifiers::STATIC);
        }
        cx.ast.add_method(
            owner,
            MethodNode::method(
                getter_name(&node.name, &node.ty),
                modifiers,
                node.ty.clone(),
                vec![],
                Stmt::block(vec![body]),
            )
            .generated(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::printer::print_class;
    use crate::ast::{AnnotationNode, Ast, ClassId, ClassNode, FieldNode, SourcePos, TypeRef};
    use crate::compiler::{CompilePhase, SourceUnit};
    use crate::config::CompilerConfiguration;
    use crate::errors::WarningCategory;
    use crate::transform::TransformLoader;

    fn run(ty: TypeRef, modifiers: Modifiers, init: Option<Expr>) -> (Ast, SourceUnit, ClassId) {
        let mut ast = Ast::new();
        let module = ast.add_module("M", None);
        let class = ast.add_class(module, ClassNode::new("Cache", Modifiers::PUBLIC));
        let field = ast.add_field(
            class,
            FieldNode {
                name: "items".into(),
                modifiers,
                ty,
                init,
                annotations: Vec::new(),
                owner: class,
                pos: SourcePos::default(),
            },
        );
        let anno = ast
            .annotate(NodeRef::Field(field), AnnotationNode::new("Lazy"))
            .unwrap();
        let mut source = SourceUnit::new("M", module, WarningCategory::LikelyErrors);
        let loader = TransformLoader::with_builtins();
        let config = CompilerConfiguration::default();
        let mut cx = TransformContext {
            ast: &mut ast,
            source: &mut source,
            loader: &loader,
            config: &config,
            phase: CompilePhase::SemanticAnalysis,
        };
        LazyTransformation
            .visit(&[NodeRef::Annotation(anno), NodeRef::Field(field)], &mut cx)
            .unwrap();
        (ast, source, class)
    }

    #[test]
    fn renames_field_and_builds_on_first_access() {
        let (ast, source, class) = run(TypeRef::new("java.util.ArrayList"), Modifiers::NONE, None);
        assert!(!source.errors().has_errors());
        assert!(ast.field_by_name(class, "$items").is_some());
        assert!(ast.field_by_name(class, "items").is_none());
        let printed = print_class(&ast, class);
        assert!(printed.contains("return this.@$items = new ArrayList()"));
        assert!(!printed.contains("synchronized"));
    }

    #[test]
    fn volatile_field_is_double_checked() {
        let (ast, _, class) = run(
            TypeRef::list(),
            Modifiers::VOLATILE,
            Some(Expr::List(vec![int(1)])),
        );
        let printed = print_class(&ast, class);
        assert!(printed.contains("synchronized (this)"));
        assert!(printed.contains("return this.@$items = [1]"));
        assert!(ast.declares_method(class, "getItems", 0));
    }

    #[test]
    fn static_initializer_moves_into_the_getter() {
        let (ast, source, class) = run(
            TypeRef::list(),
            Modifiers::STATIC,
            Some(Expr::List(vec![int(2)])),
        );
        assert!(!source.errors().has_errors());
        let backing = ast.field_by_name(class, "$items").unwrap();
        assert!(ast.field(backing).init.is_none());
        assert!(ast.field(backing).modifiers.is_static());
        let getter = ast.methods_named(class, "getItems")[0];
        assert!(ast.method(getter).modifiers.is_static());
        assert!(print_class(&ast, class).contains("= [2]"));
    }

    #[test]
    fn primitive_field_is_rejected() {
        let (ast, source, class) = run(TypeRef::int(), Modifiers::NONE, None);
        assert_eq!(source.errors().error_count(), 1);
        assert!(!ast.declares_method(class, "getItems", 0));
    }
}
