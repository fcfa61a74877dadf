//! Statements.

use super::Expr;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stmt {
    Block(Vec<Stmt>),
    Expr(Expr),
    Return(Option<Expr>),
    If {
        cond: Expr,
        then: Box<Stmt>,
        #[serde(default)]
        otherwise: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        #[serde(default)]
        init: Option<Expr>,
        #[serde(default)]
        cond: Option<Expr>,
        #[serde(default)]
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForEach {
        var: String,
        iterable: Expr,
        body: Box<Stmt>,
    },
    Throw(Expr),
    Synchronized {
        lock: Expr,
        body: Box<Stmt>,
    },
    Break,
    Continue,
    Empty,
}

impl Stmt {
    pub fn block(stmts: Vec<Stmt>) -> Stmt {
        Stmt::Block(stmts)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Stmt::Empty => true,
            Stmt::Block(stmts) => stmts.iter().all(Stmt::is_empty),
            _ => false,
        }
    }

    /// The statements of a block, or the statement itself.
    pub fn statements(&self) -> &[Stmt] {
        match self {
            Stmt::Block(stmts) => stmts,
            other => std::slice::from_ref(other),
        }
    }

    /// Converts into a block, wrapping a single statement.
    pub fn into_block(self) -> Vec<Stmt> {
        match self {
            Stmt::Block(stmts) => stmts,
            Stmt::Empty => Vec::new(),
            other => vec![other],
        }
    }

    /// Prepends a statement, turning the receiver into a block.
    pub fn prepend(&mut self, stmt: Stmt) {
        let mut stmts = std::mem::replace(self, Stmt::Empty).into_block();
        stmts.insert(0, stmt);
        *self = Stmt::Block(stmts);
    }

    /// Appends a statement, turning the receiver into a block.
    pub fn append(&mut self, stmt: Stmt) {
        let mut stmts = std::mem::replace(self, Stmt::Empty).into_block();
        stmts.push(stmt);
        *self = Stmt::Block(stmts);
    }

    pub fn is_loop(&self) -> bool {
        matches!(
            self,
            Stmt::While { .. } | Stmt::DoWhile { .. } | Stmt::For { .. } | Stmt::ForEach { .. }
        )
    }

    /// Loop body, if this is a loop.
    pub fn loop_body_mut(&mut self) -> Option<&mut Box<Stmt>> {
        match self {
            Stmt::While { body, .. }
            | Stmt::DoWhile { body, .. }
            | Stmt::For { body, .. }
            | Stmt::ForEach { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Nested statements.
    pub fn children(&self) -> Vec<&Stmt> {
        match self {
            Stmt::Block(stmts) => stmts.iter().collect(),
            Stmt::If {
                then, otherwise, ..
            } => {
                let mut out: Vec<&Stmt> = vec![&**then];
                if let Some(other) = otherwise {
                    out.push(&**other);
                }
                out
            }
            Stmt::While { body, .. }
            | Stmt::DoWhile { body, .. }
            | Stmt::For { body, .. }
            | Stmt::ForEach { body, .. }
            | Stmt::Synchronized { body, .. } => vec![&**body],
            _ => Vec::new(),
        }
    }

    /// Expressions owned directly by this statement.
    pub fn exprs(&self) -> Vec<&Expr> {
        match self {
            Stmt::Expr(e) | Stmt::Throw(e) => vec![e],
            Stmt::Return(e) => e.iter().collect(),
            Stmt::If { cond, .. } | Stmt::While { cond, .. } | Stmt::DoWhile { cond, .. } => {
                vec![cond]
            }
            Stmt::For {
                init, cond, update, ..
            } => init.iter().chain(cond.iter()).chain(update.iter()).collect(),
            Stmt::ForEach { iterable, .. } => vec![iterable],
            Stmt::Synchronized { lock, .. } => vec![lock],
            _ => Vec::new(),
        }
    }

    /// Mutable counterpart of [`Stmt::children`].
    pub fn children_mut(&mut self) -> Vec<&mut Stmt> {
        match self {
            Stmt::Block(stmts) => stmts.iter_mut().collect(),
            Stmt::If {
                then, otherwise, ..
            } => {
                let mut out: Vec<&mut Stmt> = vec![&mut **then];
                if let Some(other) = otherwise {
                    out.push(&mut **other);
                }
                out
            }
            Stmt::While { body, .. }
            | Stmt::DoWhile { body, .. }
            | Stmt::For { body, .. }
            | Stmt::ForEach { body, .. }
            | Stmt::Synchronized { body, .. } => vec![&mut **body],
            _ => Vec::new(),
        }
    }

    pub fn exprs_mut(&mut self) -> Vec<&mut Expr> {
        match self {
            Stmt::Expr(e) | Stmt::Throw(e) => vec![e],
            Stmt::Return(e) => e.iter_mut().collect(),
            Stmt::If { cond, .. } | Stmt::While { cond, .. } | Stmt::DoWhile { cond, .. } => {
                vec![cond]
            }
            Stmt::For {
                init, cond, update, ..
            } => init
                .iter_mut()
                .chain(cond.iter_mut())
                .chain(update.iter_mut())
                .collect(),
            Stmt::ForEach { iterable, .. } => vec![iterable],
            Stmt::Synchronized { lock, .. } => vec![lock],
            _ => Vec::new(),
        }
    }
}
