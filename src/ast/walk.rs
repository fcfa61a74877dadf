//! Walkers over statement and expression trees.
//!
//! Expression rewriting is pre-order: the callback sees a node before its
//! children, and the walk then descends into whatever the callback left in
//! place. Closure bodies are opaque to expression walks.

use super::{Expr, Stmt};

/// Applies `f` to every expression under `stmt`, parents before children.
pub fn rewrite_exprs(stmt: &mut Stmt, f: &mut dyn FnMut(&mut Expr)) {
    for expr in stmt.exprs_mut() {
        rewrite_expr(expr, f);
    }
    for child in stmt.children_mut() {
        rewrite_exprs(child, f);
    }
}

/// Applies `f` to `expr`, then to the children of the result.
pub fn rewrite_expr(expr: &mut Expr, f: &mut dyn FnMut(&mut Expr)) {
    f(expr);
    for child in expr.children_mut() {
        rewrite_expr(child, f);
    }
}

/// Applies `f` to every expression under `stmt`, children before parents.
/// Replacements are not revisited.
pub fn rewrite_exprs_bottom_up(stmt: &mut Stmt, f: &mut dyn FnMut(&mut Expr)) {
    for expr in stmt.exprs_mut() {
        rewrite_expr_bottom_up(expr, f);
    }
    for child in stmt.children_mut() {
        rewrite_exprs_bottom_up(child, f);
    }
}

pub fn rewrite_expr_bottom_up(expr: &mut Expr, f: &mut dyn FnMut(&mut Expr)) {
    for child in expr.children_mut() {
        rewrite_expr_bottom_up(child, f);
    }
    f(expr);
}

/// Applies `f` to every loop statement under `stmt`, innermost first.
pub fn rewrite_loops(stmt: &mut Stmt, f: &mut dyn FnMut(&mut Stmt)) {
    for child in stmt.children_mut() {
        rewrite_loops(child, f);
    }
    if stmt.is_loop() {
        f(stmt);
    }
}

/// Whether any expression under `stmt` satisfies `pred`.
pub fn any_expr(stmt: &Stmt, pred: &dyn Fn(&Expr) -> bool) -> bool {
    stmt.exprs().into_iter().any(|e| expr_any(e, pred))
        || stmt.children().into_iter().any(|s| any_expr(s, pred))
}

/// Whether `expr` or any sub-expression satisfies `pred`.
pub fn expr_any(expr: &Expr, pred: &dyn Fn(&Expr) -> bool) -> bool {
    pred(expr) || expr.children().into_iter().any(|e| expr_any(e, pred))
}

/// Number of statements in the tree, blocks included.
pub fn count_stmts(stmt: &Stmt) -> usize {
    1 + stmt.children().into_iter().map(count_stmts).sum::<usize>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Constant;

    fn loop_over(body: Stmt) -> Stmt {
        Stmt::While {
            cond: Expr::Constant(Constant::Bool(true)),
            body: Box::new(body),
        }
    }

    #[test]
    fn loops_are_visited_innermost_first() {
        let mut stmt = loop_over(Stmt::Block(vec![loop_over(Stmt::Break)]));
        let mut seen = Vec::new();
        rewrite_loops(&mut stmt, &mut |s| seen.push(count_stmts(s)));
        assert_eq!(seen, vec![2, 4]);
    }

    #[test]
    fn bottom_up_rewrite_does_not_revisit() {
        let mut stmt = Stmt::Expr(Expr::Var("x".into()));
        let mut calls = 0;
        rewrite_exprs_bottom_up(&mut stmt, &mut |e| {
            calls += 1;
            if let Some(name) = e.as_var() {
                let inner = Expr::Var(name.to_string());
                *e = Expr::Not(Box::new(inner));
            }
        });
        assert_eq!(calls, 1);
        assert_eq!(stmt, Stmt::Expr(Expr::Not(Box::new(Expr::Var("x".into())))));
    }

    #[test]
    fn rewrite_descends_into_replacement() {
        let mut stmt = Stmt::Expr(Expr::Not(Box::new(Expr::This)));
        rewrite_exprs(&mut stmt, &mut |e| {
            if e.is_this() {
                *e = Expr::Var("$self".into());
            }
        });
        assert_eq!(
            stmt,
            Stmt::Expr(Expr::Not(Box::new(Expr::Var("$self".into()))))
        );
        assert!(any_expr(&stmt, &|e| e.as_var() == Some("$self")));
    }
}
