//! Expressions.

use super::{Constant, Stmt, TypeRef};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    /// Value equality (`==`).
    Eq,
    Ne,
    /// Reference identity (`is`).
    Is,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    /// Three-way comparison (`<=>`).
    Cmp,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Is => "is",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Cmp => "<=>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CtorKind {
    This,
    Super,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapEntry {
    pub key: Expr,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Constant(Constant),
    This,
    Super,
    Var(String),
    ClassLit(TypeRef),
    /// Direct field access (`obj.@name`), bypassing accessors.
    Field {
        receiver: Box<Expr>,
        name: String,
    },
    /// Property access (`obj.name`): a getter if one exists, else the field.
    Property {
        receiver: Box<Expr>,
        name: String,
        #[serde(default)]
        safe: bool,
    },
    Call {
        receiver: Box<Expr>,
        method: String,
        #[serde(default)]
        args: Vec<Expr>,
        #[serde(default)]
        implicit_this: bool,
        #[serde(default)]
        safe: bool,
    },
    StaticCall {
        owner: TypeRef,
        method: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    New {
        #[serde(rename = "type")]
        ty: TypeRef,
        #[serde(default)]
        args: Vec<Expr>,
    },
    NewArray {
        element: TypeRef,
        #[serde(default)]
        items: Vec<Expr>,
    },
    /// `this(...)` or `super(...)` as the first constructor statement.
    CtorCall {
        kind: CtorKind,
        #[serde(default)]
        args: Vec<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Cast {
        #[serde(rename = "type")]
        ty: TypeRef,
        expr: Box<Expr>,
    },
    InstanceOf {
        expr: Box<Expr>,
        #[serde(rename = "type")]
        ty: TypeRef,
    },
    List(Vec<Expr>),
    Map(Vec<MapEntry>),
    Index {
        receiver: Box<Expr>,
        index: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    /// Local variable declaration.
    Declare {
        #[serde(rename = "type")]
        ty: TypeRef,
        name: String,
        #[serde(default)]
        init: Option<Box<Expr>>,
    },
    Closure {
        #[serde(default)]
        params: Vec<String>,
        body: Box<Stmt>,
    },
}

impl Expr {
    pub fn is_this(&self) -> bool {
        matches!(self, Expr::This)
    }

    pub fn as_var(&self) -> Option<&str> {
        match self {
            Expr::Var(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Expr::Constant(Constant::Null))
    }

    /// Immediate sub-expressions, in evaluation order.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Constant(_)
            | Expr::This
            | Expr::Super
            | Expr::Var(_)
            | Expr::ClassLit(_)
            | Expr::Closure { .. } => Vec::new(),
            Expr::Field { receiver, .. } | Expr::Property { receiver, .. } => vec![&**receiver],
            Expr::Call { receiver, args, .. } => {
                let mut out: Vec<&Expr> = vec![&**receiver];
                out.extend(args.iter());
                out
            }
            Expr::StaticCall { args, .. }
            | Expr::New { args, .. }
            | Expr::CtorCall { args, .. }
            | Expr::NewArray { items: args, .. }
            | Expr::List(args) => args.iter().collect(),
            Expr::Binary { left, right, .. } => vec![&**left, &**right],
            Expr::Not(e) | Expr::Cast { expr: e, .. } | Expr::InstanceOf { expr: e, .. } => {
                vec![&**e]
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => vec![&**cond, &**then, &**otherwise],
            Expr::Map(entries) => entries.iter().flat_map(|e| [&e.key, &e.value]).collect(),
            Expr::Index { receiver, index } => vec![&**receiver, &**index],
            Expr::Assign { target, value } => vec![&**target, &**value],
            Expr::Declare { init, .. } => init.iter().map(|e| &**e).collect(),
        }
    }

    /// Mutable counterpart of [`Expr::children`].
    pub fn children_mut(&mut self) -> Vec<&mut Expr> {
        match self {
            Expr::Constant(_)
            | Expr::This
            | Expr::Super
            | Expr::Var(_)
            | Expr::ClassLit(_)
            | Expr::Closure { .. } => Vec::new(),
            Expr::Field { receiver, .. } | Expr::Property { receiver, .. } => {
                vec![&mut **receiver]
            }
            Expr::Call { receiver, args, .. } => {
                let mut out: Vec<&mut Expr> = vec![&mut **receiver];
                out.extend(args.iter_mut());
                out
            }
            Expr::StaticCall { args, .. }
            | Expr::New { args, .. }
            | Expr::CtorCall { args, .. }
            | Expr::NewArray { items: args, .. }
            | Expr::List(args) => args.iter_mut().collect(),
            Expr::Binary { left, right, .. } => vec![&mut **left, &mut **right],
            Expr::Not(e) | Expr::Cast { expr: e, .. } | Expr::InstanceOf { expr: e, .. } => {
                vec![&mut **e]
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => vec![&mut **cond, &mut **then, &mut **otherwise],
            Expr::Map(entries) => entries
                .iter_mut()
                .flat_map(|e| [&mut e.key, &mut e.value])
                .collect(),
            Expr::Index { receiver, index } => vec![&mut **receiver, &mut **index],
            Expr::Assign { target, value } => vec![&mut **target, &mut **value],
            Expr::Declare { init, .. } => init.iter_mut().map(|e| &mut **e).collect(),
        }
    }
}
