//! `@Log`: a `java.util.logging` logger field, with logging calls guarded
//! by `isLoggable` when their arguments cost something to build.

use crate::ast::walk::rewrite_exprs_bottom_up;
use crate::ast::{
    Ast, ClassId, Expr, FieldNode, Modifiers, NodeRef, SourcePos, Stmt, TypeRef,
};
use crate::errors::InternalError;
use crate::transform::base::Usage;
use crate::transform::synth::*;
use crate::transform::{names, AstTransformation, TransformContext};

const LOGGER: &str = "java.util.logging.Logger";
const LEVEL: &str = "java.util.logging.Level";

/// Logging method name → `Level` constant.
const LOGGING_METHODS: &[(&str, &str)] = &[
    ("severe", "SEVERE"),
    ("warning", "WARNING"),
    ("info", "INFO"),
    ("config", "CONFIG"),
    ("fine", "FINE"),
    ("finer", "FINER"),
    ("finest", "FINEST"),
];

#[derive(Debug, Default)]
pub struct LogTransformation;

impl AstTransformation for LogTransformation {
    fn visit(
        &mut self,
        nodes: &[NodeRef],
        cx: &mut TransformContext<'_>,
    ) -> Result<(), InternalError> {
        let usage = Usage::init(cx.ast, nodes, names::LOG)?;
        let Some(class) = usage.target_class(cx) else {
            return Ok(());
        };
        let field_name = usage
            .member_string(cx, "value")
            .unwrap_or_else(|| "log".to_string());
        let category = usage
            .member_string(cx, "category")
            .unwrap_or_else(|| cx.ast.class(class).name.clone());

        if cx.ast.field_by_name(class, &field_name).is_some() {
            usage.error(
                cx,
                "Class annotated with Log annotation cannot have log field declared",
            );
            return Ok(());
        }
        if let Some(parent) = inherited_field_owner(cx.ast, class, &field_name) {
            let parent = cx.ast.class(parent).name.clone();
            usage.error(
                cx,
                format!(
                    "Class annotated with Log annotation cannot have log field declared because the field exists in the parent class: {}",
                    parent
                ),
            );
            return Ok(());
        }

        cx.ast.add_field_first(
            class,
            FieldNode {
                name: field_name.clone(),
                modifiers: Modifiers::PRIVATE | Modifiers::STATIC | Modifiers::FINAL,
                ty: TypeRef::new(LOGGER),
                init: Some(static_call(LOGGER, "getLogger", vec![string(&category)])),
                annotations: Vec::new(),
                owner: class,
                pos: SourcePos::default(),
            },
        );

        let node = cx.ast.class(class);
        let members: Vec<_> = node.methods.iter().chain(&node.constructors).copied().collect();
        for method in members {
            if let Some(body) = cx.ast.method_mut(method).body.as_mut() {
                guard_logging_calls(body, &field_name);
            }
        }
        for init in &mut cx.ast.class_mut(class).object_initializers {
            guard_logging_calls(init, &field_name);
        }
        Ok(())
    }
}

/// The superclass in this unit declaring a visible field with that name.
fn inherited_field_owner(ast: &Ast, class: ClassId, name: &str) -> Option<ClassId> {
    let mut current = ast.superclass(class);
    while let Some(sup) = current {
        if let Some(field) = ast.field_by_name(sup, name) {
            if !ast.field(field).modifiers.is_private() {
                return Some(sup);
            }
        }
        current = ast.superclass(sup);
    }
    None
}

/// Constants and variables are already built, so a guard saves nothing.
fn is_simple(expr: &Expr) -> bool {
    matches!(expr, Expr::Constant(_) | Expr::Var(_))
}

fn level_of(method: &str) -> Option<&'static str> {
    LOGGING_METHODS
        .iter()
        .find(|(m, _)| *m == method)
        .map(|(_, level)| *level)
}

/// `log.info(a + b)` becomes `log.isLoggable(Level.INFO) ? log.info(a + b) : null`.
fn guard_logging_calls(stmt: &mut Stmt, log: &str) {
    rewrite_exprs_bottom_up(stmt, &mut |e| match e {
        Expr::Closure { body, .. } => guard_logging_calls(body, log),
        Expr::Call {
            receiver,
            method,
            args,
            ..
        } if receiver.as_var() == Some(log) && !args.iter().all(is_simple) => {
            let Some(level) = level_of(method) else {
                return;
            };
            let loggable = call(
                var(log),
                "isLoggable",
                vec![prop(Expr::ClassLit(TypeRef::new(LEVEL)), level)],
            );
            let original = e.clone();
            *e = ternary(loggable, original, null());
        }
        _ => {}
    });
}
