//! Reference evaluator for transformed ASTs.
//!
//! The evaluator runs class bodies after transformation so the behaviour of
//! synthesized members can be observed directly: an `equals` written by
//! `@EqualsAndHashCode` is executed rather than pattern-matched.
//!
//! ## Model
//!
//! - Values with identity (instances, collections, arrays, builders) live in
//!   a heap and are compared with `is` by id.
//! - Each call runs in its own frame; locals are a persistent map so closures
//!   capture them cheaply.
//! - Library classes the synthesized code relies on (`HashCodeHelper`,
//!   `InvokerHelper`, `Collections`, `Objects`, `System`, `Thread`, JUL
//!   logging) are provided as intrinsics.
//! - `System.nanoTime()` reads a virtual clock that only moves when the host
//!   advances it, so time-based guards are deterministic.
//!
//! ## Errors
//!
//! An exception thrown by evaluated code surfaces as
//! [`EvalError::Thrown`] with its class and message. Everything else is a
//! failure of the evaluator itself.

use thiserror::Error;

mod interpreter;
mod library;
pub mod value;

pub use interpreter::{Interpreter, LogRecord};
pub use value::{Object, ObjectId, Value};

pub type EvalResult<T = Value> = Result<T, EvalError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("{class}: {message}")]
    Thrown { class: String, message: String },

    #[error("no method {name}() taking {arity} argument(s) on {receiver}")]
    MissingMethod {
        receiver: String,
        name: String,
        arity: usize,
    },

    #[error("no property '{name}' on {receiver}")]
    MissingProperty { receiver: String, name: String },

    #[error("no constructor of {class} takes {arity} argument(s)")]
    NoConstructor { class: String, arity: usize },

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("unknown class '{0}'")]
    UnknownClass(String),

    #[error("call depth exceeded the limit of {0}")]
    DepthExceeded(usize),

    #[error("{0}")]
    Unsupported(String),
}

impl EvalError {
    pub fn thrown(class: impl Into<String>, message: impl Into<String>) -> Self {
        EvalError::Thrown {
            class: class.into(),
            message: message.into(),
        }
    }

    pub(crate) fn null_pointer(message: impl Into<String>) -> Self {
        Self::thrown("java.lang.NullPointerException", message)
    }

    /// Whether this is a thrown exception of the given class, by qualified or
    /// simple name.
    pub fn is_thrown(&self, class_name: &str) -> bool {
        match self {
            EvalError::Thrown { class, .. } => crate::ast::types::same_name(class, class_name),
            _ => false,
        }
    }
}
