//! `@NullCheck`: rejects `null` arguments up front.

use crate::ast::{Expr, MethodId, MethodNode, NodeRef, Stmt};
use crate::errors::InternalError;
use crate::transform::base::Usage;
use crate::transform::synth::*;
use crate::transform::{names, AstTransformation, TransformContext};

const EXCEPTION: &str = "java.lang.IllegalArgumentException";

#[derive(Debug, Default)]
pub struct NullCheckTransformation;

impl AstTransformation for NullCheckTransformation {
    fn visit(
        &mut self,
        nodes: &[NodeRef],
        cx: &mut TransformContext<'_>,
    ) -> Result<(), InternalError> {
        let usage = Usage::init(cx.ast, nodes, names::NULL_CHECK)?;
        let include_generated = usage.member_bool(cx, "includeGenerated", false);
        let targets: Vec<MethodId> = match usage.node {
            NodeRef::Method(m) => vec![m],
            NodeRef::Class(c) => {
                let node = cx.ast.class(c);
                node.constructors.iter().chain(&node.methods).copied().collect()
            }
            _ => {
                usage.error(
                    cx,
                    format!("{} is only allowed on classes, constructors and methods", usage.name),
                );
                return Ok(());
            }
        };
        for method in targets {
            let node = cx.ast.method(method);
            if node.is_abstract() || (node.generated && !include_generated) {
                continue;
            }
            add_null_checks(cx.ast.method_mut(method));
        }
        Ok(())
    }
}

fn check_for(name: &str) -> Stmt {
    if_then(
        is_null(var(name)),
        throw_new(EXCEPTION, string(&format!("{} cannot be null", name))),
    )
}

fn add_null_checks(method: &mut MethodNode) {
    let checks: Vec<Stmt> = method
        .params
        .iter()
        .filter(|p| !p.ty.is_primitive())
        .map(|p| check_for(&p.name))
        .collect();
    let Some(body) = method.body.take() else {
        return;
    };
    let mut stmts = body.into_block();
    // Checks go after an explicit this(...)/super(...) call.
    let at = match stmts.first() {
        Some(Stmt::Expr(Expr::CtorCall { .. })) => 1,
        _ => 0,
    };
    let fresh: Vec<Stmt> = checks
        .into_iter()
        .filter(|c| !stmts.contains(c))
        .collect();
    stmts.splice(at..at, fresh);
    method.body = Some(Stmt::block(stmts));
}
