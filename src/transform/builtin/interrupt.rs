//! Interruption guards: `@ThreadInterrupt`, `@TimedInterrupt` and
//! `@ConditionalInterrupt`.
//!
//! All three share one shape. Every loop body in scope starts with
//! `if (cond) throw new E(message)`, and so does every method when
//! `checkOnMethodStart` is set. Only the condition, the exception and any
//! per-class support members differ.

use crate::ast::printer::print_expr;
use crate::ast::walk::rewrite_loops;
use crate::ast::{
    AnnotationValue, Ast, BinaryOp, ClassId, Expr, FieldNode, MethodId, MethodNode, Modifiers,
    NodeRef, SourcePos, Stmt, TypeRef,
};
use crate::errors::InternalError;
use crate::transform::base::Usage;
use crate::transform::synth::*;
use crate::transform::{names, AstTransformation, TransformContext};

const APPLY_TO_ALL_CLASSES: &str = "applyToAllClasses";
const APPLY_TO_ALL_MEMBERS: &str = "applyToAllMembers";
const CHECK_ON_METHOD_START: &str = "checkOnMethodStart";
const SCRIPT_BODY: &str = "run";

pub const EXPIRE_TIME_FIELD: &str = "timedInterrupt$expireTime";
pub const CONDITION_METHOD: &str = "conditionalTransform$condition";

/// What distinguishes one guard from another.
trait GuardVariant {
    const ANNOTATION: &'static str;
    const DEFAULT_THROWN: &'static str;

    /// Reads variant-specific members. False once a problem is reported.
    fn read(&mut self, usage: &Usage, cx: &mut TransformContext<'_>) -> bool;

    fn condition(&self) -> Expr;

    fn message(&self) -> String;

    /// Whether static methods can be guarded. Guards reading instance state
    /// cannot run there.
    fn guards_static(&self) -> bool {
        true
    }

    /// Adds whatever the condition needs to a guarded class.
    fn prepare_class(&self, _ast: &mut Ast, _class: ClassId) {}
}

// ============================================================================
// VARIANTS
// ============================================================================

#[derive(Debug, Default)]
struct ThreadGuard;

impl GuardVariant for ThreadGuard {
    const ANNOTATION: &'static str = names::THREAD_INTERRUPT;
    const DEFAULT_THROWN: &'static str = "java.lang.InterruptedException";

    fn read(&mut self, _usage: &Usage, _cx: &mut TransformContext<'_>) -> bool {
        true
    }

    fn condition(&self) -> Expr {
        call(static_call("Thread", "currentThread", vec![]), "isInterrupted", vec![])
    }

    fn message(&self) -> String {
        "Execution interrupted. The current thread has been interrupted.".to_string()
    }
}

#[derive(Debug, Default)]
struct TimedGuard {
    value: i64,
    unit: String,
    nanos: i64,
}

/// Nanoseconds per unit of each `TimeUnit` constant.
fn nanos_per(unit: &str) -> Option<i64> {
    Some(match unit {
        "NANOSECONDS" => 1,
        "MICROSECONDS" => 1_000,
        "MILLISECONDS" => 1_000_000,
        "SECONDS" => 1_000_000_000,
        "MINUTES" => 60 * 1_000_000_000,
        "HOURS" => 3_600 * 1_000_000_000,
        "DAYS" => 86_400 * 1_000_000_000,
        _ => return None,
    })
}

impl GuardVariant for TimedGuard {
    const ANNOTATION: &'static str = names::TIMED_INTERRUPT;
    const DEFAULT_THROWN: &'static str = "java.util.concurrent.TimeoutException";

    fn read(&mut self, usage: &Usage, cx: &mut TransformContext<'_>) -> bool {
        let Some(value) = usage.member_int(cx, "value") else {
            if usage.anno(cx.ast).member("value").is_none() {
                usage.error_during(cx, "the 'value' member is required");
            }
            return false;
        };
        let unit = usage
            .anno(cx.ast)
            .member("unit")
            .and_then(AnnotationValue::as_enum_constant)
            .unwrap_or("SECONDS")
            .to_string();
        let Some(per) = nanos_per(&unit) else {
            usage.error_during(cx, format!("unknown time unit '{}'", unit));
            return false;
        };
        self.value = value;
        self.nanos = value.checked_mul(per).unwrap_or(i64::MAX);
        self.unit = unit;
        true
    }

    fn condition(&self) -> Expr {
        not(binary(
            BinaryOp::Lt,
            static_call("System", "nanoTime", vec![]),
            this_field(EXPIRE_TIME_FIELD),
        ))
    }

    fn message(&self) -> String {
        format!(
            "Execution timed out after {} {}.",
            self.value,
            self.unit.to_lowercase()
        )
    }

    fn guards_static(&self) -> bool {
        false
    }

    fn prepare_class(&self, ast: &mut Ast, class: ClassId) {
        if ast.field_by_name(class, EXPIRE_TIME_FIELD).is_some() {
            return;
        }
        ast.add_field_first(
            class,
            FieldNode {
                name: EXPIRE_TIME_FIELD.to_string(),
                modifiers: Modifiers::PRIVATE | Modifiers::FINAL,
                ty: TypeRef::long(),
                init: Some(binary(
                    BinaryOp::Add,
                    static_call("System", "nanoTime", vec![]),
                    int(self.nanos),
                )),
                annotations: Vec::new(),
                owner: class,
                pos: SourcePos::default(),
            },
        );
    }
}

#[derive(Debug, Default)]
struct ConditionalGuard {
    condition: Option<(Vec<String>, Stmt)>,
    source: String,
}

impl GuardVariant for ConditionalGuard {
    const ANNOTATION: &'static str = names::CONDITIONAL_INTERRUPT;
    const DEFAULT_THROWN: &'static str = "java.lang.InterruptedException";

    fn read(&mut self, usage: &Usage, cx: &mut TransformContext<'_>) -> bool {
        match usage.anno(cx.ast).member("value") {
            Some(AnnotationValue::Expr {
                expr: closure @ Expr::Closure { params, body },
            }) => {
                self.source = print_expr(closure);
                self.condition = Some((params.clone(), (**body).clone()));
                true
            }
            other => {
                let found = other.map_or_else(|| "nothing".to_string(), |v| v.to_string());
                usage.error(
                    cx,
                    format!(
                        "Expected closure value for annotation parameter 'value'. Found {}",
                        found
                    ),
                );
                false
            }
        }
    }

    fn condition(&self) -> Expr {
        call_this(CONDITION_METHOD, vec![])
    }

    fn message(&self) -> String {
        format!(
            "Execution interrupted. The following condition failed: {}",
            self.source
        )
    }

    fn guards_static(&self) -> bool {
        false
    }

    fn prepare_class(&self, ast: &mut Ast, class: ClassId) {
        let Some((_, body)) = &self.condition else {
            return;
        };
        if ast.declares_method(class, CONDITION_METHOD, 0) {
            return;
        }
        // The closure's last expression is its result.
        let mut stmts = body.clone().into_block();
        if let Some(Stmt::Expr(last)) = stmts.last().cloned() {
            if let Some(slot) = stmts.last_mut() {
                *slot = ret(last);
            }
        }
        ast.add_method(
            class,
            MethodNode::method(
                CONDITION_METHOD,
                Modifiers::PRIVATE,
                TypeRef::boolean(),
                vec![],
                Stmt::block(stmts),
            )
            .generated(),
        );
    }
}

// ============================================================================
// TRANSFORMATIONS
// ============================================================================

#[derive(Debug, Default)]
pub struct ThreadInterruptTransformation;

impl AstTransformation for ThreadInterruptTransformation {
    fn visit(
        &mut self,
        nodes: &[NodeRef],
        cx: &mut TransformContext<'_>,
    ) -> Result<(), InternalError> {
        apply_guard(ThreadGuard, nodes, cx)
    }
}

#[derive(Debug, Default)]
pub struct TimedInterruptTransformation;

impl AstTransformation for TimedInterruptTransformation {
    fn visit(
        &mut self,
        nodes: &[NodeRef],
        cx: &mut TransformContext<'_>,
    ) -> Result<(), InternalError> {
        apply_guard(TimedGuard::default(), nodes, cx)
    }
}

#[derive(Debug, Default)]
pub struct ConditionalInterruptTransformation;

impl AstTransformation for ConditionalInterruptTransformation {
    fn visit(
        &mut self,
        nodes: &[NodeRef],
        cx: &mut TransformContext<'_>,
    ) -> Result<(), InternalError> {
        apply_guard(ConditionalGuard::default(), nodes, cx)
    }
}

// ============================================================================
// SHARED GUARD LOGIC
// ============================================================================

/// Whether `applyToAllClasses` is in effect for an annotation use.
fn applies_to_all_classes(ast: &Ast, annotation: crate::ast::AnnotationId) -> bool {
    ast.annotation(annotation)
        .member(APPLY_TO_ALL_CLASSES)
        .and_then(AnnotationValue::as_bool)
        .unwrap_or(true)
}

/// Other class-level uses of the same annotation in the class's module.
fn sibling_uses(
    ast: &Ast,
    class: ClassId,
    annotation_type: &str,
    except: crate::ast::AnnotationId,
) -> Vec<(ClassId, crate::ast::AnnotationId)> {
    let module = ast.class(class).module;
    ast.module(module)
        .classes
        .iter()
        .flat_map(|c| {
            ast.annotations_of(NodeRef::Class(*c))
                .iter()
                .map(move |a| (*c, *a))
        })
        .filter(|(_, a)| *a != except && ast.annotation(*a).is_type(annotation_type))
        .collect()
}

fn apply_guard<V: GuardVariant>(
    mut variant: V,
    nodes: &[NodeRef],
    cx: &mut TransformContext<'_>,
) -> Result<(), InternalError> {
    let usage = Usage::init(cx.ast, nodes, V::ANNOTATION)?;
    let check_on_start = usage.member_bool(cx, CHECK_ON_METHOD_START, true);
    let all_classes = usage.member_bool(cx, APPLY_TO_ALL_CLASSES, true);
    let all_members = usage.member_bool(cx, APPLY_TO_ALL_MEMBERS, true);
    let thrown = usage
        .member_string(cx, "thrown")
        .unwrap_or_else(|| V::DEFAULT_THROWN.to_string());
    if !variant.read(&usage, cx) {
        return Ok(());
    }

    let (classes, only_method) = match usage.node {
        NodeRef::Method(method) => {
            let owner = cx.ast.method(method).owner;
            let covered = cx.ast.has_annotation(NodeRef::Class(owner), V::ANNOTATION)
                || sibling_uses(cx.ast, owner, V::ANNOTATION, usage.annotation)
                    .iter()
                    .any(|(_, a)| applies_to_all_classes(cx.ast, *a));
            if covered {
                tracing::debug!(annotation = %usage.name, "method-level guard covered by a broader use");
                return Ok(());
            }
            (vec![owner], Some(method))
        }
        NodeRef::Class(class) => {
            let broader = sibling_uses(cx.ast, class, V::ANNOTATION, usage.annotation)
                .into_iter()
                .find(|(c, a)| cx.ast.class(*c).script && applies_to_all_classes(cx.ast, *a));
            if !all_classes {
                if broader.is_some() {
                    usage.error_during(
                        cx,
                        format!(
                            "{}=false conflicts with the script-level {} that applies to all classes",
                            APPLY_TO_ALL_CLASSES, usage.name
                        ),
                    );
                    return Ok(());
                }
                (vec![class], None)
            } else if broader.is_some() && !cx.ast.class(class).script {
                tracing::debug!(annotation = %usage.name, "class-level guard covered by a script-level use");
                return Ok(());
            } else {
                let module = cx.ast.class(class).module;
                let classes = cx
                    .ast
                    .module(module)
                    .classes
                    .iter()
                    .copied()
                    .filter(|c| !cx.ast.class(*c).is_interface())
                    .collect();
                (classes, None)
            }
        }
        _ => {
            usage.error(
                cx,
                format!("{} is only allowed on classes and methods", usage.name),
            );
            return Ok(());
        }
    };

    let guard = if_then(
        variant.condition(),
        throw_new(&thrown, string(&variant.message())),
    );
    for class in classes {
        let methods: Vec<MethodId> = match only_method {
            Some(method) => vec![method],
            None => {
                let node = cx.ast.class(class);
                if !all_members && !node.script {
                    continue;
                }
                node.methods
                    .iter()
                    .chain(node.constructors.iter())
                    .copied()
                    .filter(|m| all_members || cx.ast.method(*m).name == SCRIPT_BODY)
                    .collect()
            }
        };
        let methods: Vec<MethodId> = methods
            .into_iter()
            .filter(|m| {
                let method = cx.ast.method(*m);
                !method.generated
                    && !method.is_abstract()
                    && (variant.guards_static() || !method.is_static())
            })
            .collect();
        if methods.is_empty() {
            continue;
        }
        variant.prepare_class(cx.ast, class);
        for method in methods {
            guard_method(cx.ast.method_mut(method), &guard, check_on_start);
        }
    }
    Ok(())
}

fn starts_with(stmt: &Stmt, guard: &Stmt) -> bool {
    stmt.statements().first() == Some(guard)
}

fn guard_method(method: &mut MethodNode, guard: &Stmt, check_on_start: bool) {
    let is_constructor = method.is_constructor();
    let Some(body) = method.body.as_mut() else {
        return;
    };
    rewrite_loops(body, &mut |l| {
        if let Some(loop_body) = l.loop_body_mut() {
            if !starts_with(loop_body, guard) {
                loop_body.prepend(guard.clone());
            }
        }
    });
    // A constructor must begin with its this(...)/super(...) call.
    if check_on_start && !is_constructor && !starts_with(body, guard) {
        body.prepend(guard.clone());
    }
}
