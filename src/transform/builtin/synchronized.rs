//! `@Synchronized`: method bodies locked on a private field instead of
//! `this` or the class.

use crate::ast::{Ast, ClassId, Expr, FieldNode, Modifiers, NodeRef, SourcePos, Stmt, TypeRef};
use crate::errors::InternalError;
use crate::transform::base::Usage;
use crate::transform::synth::*;
use crate::transform::{names, AstTransformation, TransformContext};

pub const LOCK_NAME: &str = "$lock";
pub const STATIC_LOCK_NAME: &str = "$LOCK";

#[derive(Debug, Default)]
pub struct SynchronizedTransformation;

impl AstTransformation for SynchronizedTransformation {
    fn visit(
        &mut self,
        nodes: &[NodeRef],
        cx: &mut TransformContext<'_>,
    ) -> Result<(), InternalError> {
        let usage = Usage::init(cx.ast, nodes, names::SYNCHRONIZED)?;
        let NodeRef::Method(method) = usage.node else {
            usage.error(cx, format!("{} is only allowed on methods", usage.name));
            return Ok(());
        };
        let node = cx.ast.method(method);
        let (name, owner, is_static) = (node.name.clone(), node.owner, node.is_static());
        if node.is_abstract() {
            usage.error_during(
                cx,
                format!("annotation not allowed on abstract method '{}'", name),
            );
            return Ok(());
        }
        let lock = match usage.member_string(cx, "value") {
            Some(lock) => {
                let Some(field) = cx.ast.field_by_name(owner, &lock) else {
                    let class = cx.ast.class(owner).name.clone();
                    usage.error_during(
                        cx,
                        format!("lock field with name '{}' not found in class {}", lock, class),
                    );
                    return Ok(());
                };
                if is_static && !cx.ast.field(field).is_static() {
                    usage.error_during(
                        cx,
                        format!("lock field with name '{}' should be static", lock),
                    );
                    return Ok(());
                }
                lock
            }
            None => {
                let lock = if is_static { STATIC_LOCK_NAME } else { LOCK_NAME };
                ensure_lock_field(cx.ast, owner, lock, is_static);
                lock.to_string()
            }
        };

        let lock_expr = if is_static {
            field(Expr::ClassLit(cx.ast.class(owner).type_ref()), &lock)
        } else {
            this_field(&lock)
        };
        let method = cx.ast.method_mut(method);
        let body = method.body.take().unwrap_or(Stmt::Empty);
        method.body = Some(Stmt::block(vec![Stmt::Synchronized {
            lock: lock_expr,
            body: Box::new(body),
        }]));
        Ok(())
    }
}

/// `private final Object[] $lock = new Object[0]`, once per class.
fn ensure_lock_field(ast: &mut Ast, class: ClassId, name: &str, is_static: bool) {
    if ast.field_by_name(class, name).is_some() {
        return;
    }
    let mut modifiers = Modifiers::PRIVATE | Modifiers::FINAL;
    if is_static {
        modifiers.insert(Modifiers::STATIC);
    }
    ast.add_field(
        class,
        FieldNode {
            name: name.to_string(),
            modifiers,
            ty: TypeRef::array_of(TypeRef::object()),
            init: Some(Expr::NewArray {
                element: TypeRef::object(),
                items: Vec::new(),
            }),
            annotations: Vec::new(),
            owner: class,
            pos: SourcePos::default(),
        },
    );
}
