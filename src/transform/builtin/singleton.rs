//! `@Singleton`: one shared instance behind a static field and getter.

use crate::ast::{
    Ast, ClassId, Expr, FieldNode, MethodNode, Modifiers, NodeRef, SourcePos, Stmt,
};
use crate::errors::InternalError;
use crate::transform::base::Usage;
use crate::transform::synth::*;
use crate::transform::{names, AstTransformation, TransformContext};

#[derive(Debug, Default)]
pub struct SingletonTransformation;

impl AstTransformation for SingletonTransformation {
    fn visit(
        &mut self,
        nodes: &[NodeRef],
        cx: &mut TransformContext<'_>,
    ) -> Result<(), InternalError> {
        let usage = Usage::init(cx.ast, nodes, names::SINGLETON)?;
        let Some(class) = usage.target_class(cx) else {
            return Ok(());
        };
        let property = usage
            .member_string(cx, "property")
            .unwrap_or_else(|| "instance".to_string());
        let lazy = usage.member_bool(cx, "lazy", false);
        let strict = usage.member_bool(cx, "strict", true);

        create_field(cx.ast, class, &property, lazy);
        let constructors = cx.ast.class(class).constructors.clone();
        if strict && !constructors.is_empty() {
            for _ in &constructors {
                usage.error(
                    cx,
                    "@Singleton didn't expect to find one or more additional constructors: remove constructor(s) or set strict=false",
                );
            }
        }
        let has_no_arg = constructors
            .iter()
            .any(|c| cx.ast.method(*c).params.is_empty());
        if !has_no_arg {
            create_guard_constructor(cx.ast, class, &property);
        }
        Ok(())
    }
}

fn instance_field(ast: &Ast, class: ClassId, property: &str) -> Expr {
    Expr::Field {
        receiver: Box::new(Expr::ClassLit(ast.class(class).type_ref())),
        name: property.to_string(),
    }
}

fn create_field(ast: &mut Ast, class: ClassId, property: &str, lazy: bool) {
    let class_type = ast.class(class).type_ref();
    let (modifiers, init) = if lazy {
        (
            Modifiers::PRIVATE | Modifiers::STATIC | Modifiers::VOLATILE,
            None,
        )
    } else {
        (
            Modifiers::PUBLIC | Modifiers::FINAL | Modifiers::STATIC,
            Some(new_instance(class_type.clone(), vec![])),
        )
    };
    ast.add_field(
        class,
        FieldNode {
            name: property.to_string(),
            modifiers,
            ty: class_type.clone(),
            init,
            annotations: Vec::new(),
            owner: class,
            pos: SourcePos::default(),
        },
    );

    let field = instance_field(ast, class, property);
    let body = if lazy {
        // Double-checked: the unsynchronized read, then a re-check under the
        // class lock before constructing.
        Stmt::block(vec![if_else(
            not_null(field.clone()),
            ret(field.clone()),
            Stmt::Synchronized {
                lock: Expr::ClassLit(class_type.clone()),
                body: Box::new(if_else(
                    not_null(field.clone()),
                    ret(field.clone()),
                    ret(assign_expr(field, new_instance(class_type.clone(), vec![]))),
                )),
            },
        )])
    } else {
        Stmt::block(vec![ret(field)])
    };
    let getter = format!("get{}", crate::ast::types::capitalize(property));
    ast.add_method(
        class,
        MethodNode::method(
            getter,
            Modifiers::PUBLIC | Modifiers::STATIC,
            class_type,
            vec![],
            body,
        )
        .generated(),
    );
}

fn create_guard_constructor(ast: &mut Ast, class: ClassId, property: &str) {
    let name = ast.class(class).name.clone();
    let body = Stmt::block(vec![if_then(
        not_null(instance_field(ast, class, property)),
        throw_new(
            "java.lang.RuntimeException",
            string(&format!(
                "Can't instantiate singleton {}. Use {}.{}",
                name, name, property
            )),
        ),
    )]);
    ast.add_constructor(
        class,
        MethodNode::constructor(Modifiers::PRIVATE, vec![], body).generated(),
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

    fn run(anno: AnnotationNode, user_ctor: bool) -> (Ast, SourceUnit, ClassId) {
        let mut ast = Ast::new();
        let module = ast.add_module("M", None);
        let class = ast.add_class(module, ClassNode::new("Registry", Modifiers::PUBLIC));
        if user_ctor {
            ast.add_constructor(
                class,
                MethodNode::constructor(Modifiers::PUBLIC, vec![param("x", crate::ast::TypeRef::int())], Stmt::Empty),
            );
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
        SingletonTransformation
            .visit(&[NodeRef::Annotation(anno), NodeRef::Class(class)], &mut cx)
            .unwrap();
        (ast, source, class)
    }

    #[test]
    fn eager_field_and_private_guard() {
        let (ast, source, class) = run(AnnotationNode::new("Singleton"), false);
        assert!(!source.errors().has_errors());
        let printed = print_class(&ast, class);
        assert!(printed.contains("public static final Registry instance = new Registry()"));
        assert!(printed.contains(r"Can\'t instantiate singleton Registry. Use Registry.instance"));
        let ctor = ast.class(class).constructors[0];
        assert!(ast.method(ctor).modifiers.is_private());
    }

    #[test]
    fn lazy_uses_synchronized_recheck() {
        let anno = AnnotationNode::new("Singleton")
            .with_member("lazy", AnnotationValue::bool(true))
            .with_member("property", AnnotationValue::string("shared"));
        let (ast, _, class) = run(anno, false);
        let printed = print_class(&ast, class);
        assert!(printed.contains("private static volatile Registry shared"));
        assert!(printed.contains("synchronized (Registry)"));
        assert!(ast.declares_method(class, "getShared", 0));
    }

    #[test]
    fn strict_rejects_user_constructors() {
        let (_, source, _) = run(AnnotationNode::new("Singleton"), true);
        assert_eq!(source.errors().error_count(), 1);
        let lenient = AnnotationNode::new("Singleton").with_member("strict", AnnotationValue::bool(false));
        let (ast, source, class) = run(lenient, true);
        assert!(!source.errors().has_errors());
        assert_eq!(ast.class(class).constructors.len(), 2);
    }
}
