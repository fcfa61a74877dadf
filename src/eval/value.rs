//! Runtime values and the object heap.
//!
//! Scalars are carried inline in [`Value`]; everything with identity lives in
//! the [`Heap`] and is referenced by [`ObjectId`]. Two references are the same
//! object exactly when their ids are equal, which is what `is` compares.

use crate::ast::{Ast, ClassId, Stmt, TypeRef};
use indexmap::IndexMap;
use std::rc::Rc;

pub type ObjectId = usize;

/// Local variables of one call frame.
pub type Env = im::HashMap<String, Value>;

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A class literal, by qualified name.
    Class(String),
    Ref(ObjectId),
    Closure(Rc<Closure>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Value {
        Value::Str(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Reference identity for heap values, value identity for scalars.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Ref(a), Value::Ref(b)) => a == b,
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Class(a), Value::Class(b)) => a == b,
            _ => false,
        }
    }
}

/// A closure with the frame it was created in.
#[derive(Debug, Clone)]
pub struct Closure {
    pub params: Vec<String>,
    pub body: Stmt,
    pub captured: Env,
    pub this: Option<ObjectId>,
    pub class: Option<ClassId>,
}

#[derive(Debug, Clone)]
pub enum Object {
    Instance {
        class: ClassId,
        fields: IndexMap<String, Value>,
    },
    List {
        items: Vec<Value>,
        read_only: bool,
    },
    /// Insertion-ordered; uniqueness is kept by the interpreter's equality.
    Set {
        items: Vec<Value>,
        read_only: bool,
    },
    Map {
        entries: Vec<(Value, Value)>,
        read_only: bool,
    },
    Array {
        element: TypeRef,
        items: Vec<Value>,
    },
    StringBuilder(String),
    /// Milliseconds since the epoch.
    Date(i64),
    Throwable {
        class: String,
        message: Option<String>,
    },
    Logger {
        name: String,
    },
    Thread,
    Plain {
        class: String,
    },
}

impl Object {
    /// Qualified runtime class name.
    pub fn class_name(&self, ast: &Ast) -> String {
        match self {
            Object::Instance { class, .. } => ast.class(*class).name.clone(),
            Object::List { read_only: false, .. } => "java.util.ArrayList".into(),
            Object::Set { read_only: false, .. } => "java.util.LinkedHashSet".into(),
            Object::Map { read_only: false, .. } => "java.util.LinkedHashMap".into(),
            Object::List { .. } => "java.util.Collections$UnmodifiableRandomAccessList".into(),
            Object::Set { .. } => "java.util.Collections$UnmodifiableSet".into(),
            Object::Map { .. } => "java.util.Collections$UnmodifiableMap".into(),
            Object::Array { element, .. } => format!("{}[]", element.qualified_name()),
            Object::StringBuilder(_) => "java.lang.StringBuilder".into(),
            Object::Date(_) => "java.util.Date".into(),
            Object::Throwable { class, .. } => class.clone(),
            Object::Logger { .. } => "java.util.logging.Logger".into(),
            Object::Thread => "java.lang.Thread".into(),
            Object::Plain { class } => class.clone(),
        }
    }

    /// Elements of a list, set or array.
    pub fn elements(&self) -> Option<&[Value]> {
        match self {
            Object::List { items, .. } | Object::Set { items, .. } | Object::Array { items, .. } => {
                Some(items)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<Object>,
}

impl Heap {
    pub fn alloc(&mut self, object: Object) -> Value {
        self.objects.push(object);
        Value::Ref(self.objects.len() - 1)
    }

    pub fn get(&self, id: ObjectId) -> &Object {
        &self.objects[id]
    }

    pub fn get_mut(&mut self, id: ObjectId) -> &mut Object {
        &mut self.objects[id]
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Java's `String.hashCode`, over UTF-16 code units.
pub fn string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}

/// `Integer.hashCode` for values in int range, `Long.hashCode` beyond it.
pub fn int_hash(i: i64) -> i32 {
    if i32::try_from(i).is_ok() {
        i as i32
    } else {
        (i ^ ((i as u64) >> 32) as i64) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_hash_matches_java() {
        assert_eq!(string_hash(""), 0);
        assert_eq!(string_hash("a"), 97);
        assert_eq!(string_hash("Ann"), 65_985);
        assert_eq!(string_hash("hello"), 99_162_322);
    }

    #[test]
    fn long_hash_folds_high_bits() {
        assert_eq!(int_hash(42), 42);
        assert_eq!(int_hash(-1), -1);
        assert_eq!(int_hash(1 << 32), 1);
    }
}
