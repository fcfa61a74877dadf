//! Library classes available to evaluated code.
//!
//! Only the surface that synthesized members and ordinary class bodies lean
//! on is provided; anything else reports [`EvalError::MissingMethod`].

use super::interpreter::{identity_hash, Interpreter};
use super::value::{Object, Value};
use super::{EvalError, EvalResult};
use crate::ast::types::{capitalize, qualify, same_name, simple_name};
use crate::ast::TypeRef;
use crate::transform::names;
use once_cell::sync::Lazy;
use std::cmp::Ordering;
use std::collections::HashMap;

const LEVEL: &str = "java.util.logging.Level";

/// JUL levels by name, with their numeric weight.
const LEVELS: &[(&str, i32)] = &[
    ("OFF", i32::MAX),
    ("SEVERE", 1000),
    ("WARNING", 900),
    ("INFO", 800),
    ("CONFIG", 700),
    ("FINE", 500),
    ("FINER", 400),
    ("FINEST", 300),
    ("ALL", i32::MIN),
];

pub fn level_value(name: &str) -> Option<i32> {
    LEVELS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| *v)
}

// ============================================================================
// TYPE HIERARCHY
// ============================================================================

/// Direct supertypes of the library types the evaluator models.
static SUPERTYPES: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    const RUNTIME: &[&str] = &["java.lang.RuntimeException"];
    const CHECKED: &[&str] = &["java.lang.Exception"];
    const NUMBER: &[&str] = &["java.lang.Number", "java.lang.Comparable"];
    let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
    m.insert(
        "java.lang.String",
        &["java.lang.CharSequence", "java.lang.Comparable", "java.io.Serializable"],
    );
    m.insert("java.lang.Integer", NUMBER);
    m.insert("java.lang.Long", NUMBER);
    m.insert("java.lang.Double", NUMBER);
    m.insert("java.lang.Number", &["java.io.Serializable"]);
    m.insert("java.lang.Boolean", &["java.lang.Comparable", "java.io.Serializable"]);
    m.insert("java.lang.Class", &["java.io.Serializable"]);
    m.insert("java.lang.StringBuilder", &["java.lang.CharSequence"]);
    m.insert("java.lang.Thread", &["java.lang.Runnable"]);
    m.insert("java.util.logging.Logger", &[]);
    m.insert("groovy.lang.Closure", &["java.lang.Cloneable", "java.io.Serializable"]);
    m.insert(
        "java.util.Date",
        &["java.lang.Cloneable", "java.lang.Comparable", "java.io.Serializable"],
    );
    m.insert("java.util.Collection", &["java.lang.Iterable"]);
    m.insert("java.util.List", &["java.util.Collection"]);
    m.insert("java.util.Set", &["java.util.Collection"]);
    m.insert(
        "java.util.ArrayList",
        &["java.util.List", "java.util.RandomAccess", "java.lang.Cloneable", "java.io.Serializable"],
    );
    m.insert(
        "java.util.Collections$UnmodifiableRandomAccessList",
        &["java.util.List", "java.util.RandomAccess", "java.io.Serializable"],
    );
    m.insert("java.util.LinkedHashSet", &["java.util.HashSet"]);
    m.insert(
        "java.util.HashSet",
        &["java.util.Set", "java.lang.Cloneable", "java.io.Serializable"],
    );
    m.insert("java.util.Collections$UnmodifiableSet", &["java.util.Set", "java.io.Serializable"]);
    m.insert("java.util.LinkedHashMap", &["java.util.HashMap"]);
    m.insert(
        "java.util.HashMap",
        &["java.util.Map", "java.lang.Cloneable", "java.io.Serializable"],
    );
    m.insert("java.util.Collections$UnmodifiableMap", &["java.util.Map", "java.io.Serializable"]);
    m.insert("java.lang.Throwable", &["java.io.Serializable"]);
    m.insert("java.lang.Exception", &["java.lang.Throwable"]);
    m.insert("java.lang.Error", &["java.lang.Throwable"]);
    m.insert("java.lang.RuntimeException", CHECKED);
    m.insert("java.lang.InterruptedException", CHECKED);
    m.insert("java.lang.CloneNotSupportedException", CHECKED);
    m.insert("java.util.concurrent.TimeoutException", CHECKED);
    for name in [
        "java.lang.IllegalArgumentException",
        "java.lang.IllegalStateException",
        "java.lang.UnsupportedOperationException",
        "java.lang.NullPointerException",
        "java.lang.ArithmeticException",
        "java.lang.ClassCastException",
        "java.lang.IndexOutOfBoundsException",
        "groovy.lang.GroovyRuntimeException",
    ] {
        m.insert(name, RUNTIME);
    }
    m.insert("java.lang.NumberFormatException", &["java.lang.IllegalArgumentException"]);
    m.insert(
        "java.lang.ArrayIndexOutOfBoundsException",
        &["java.lang.IndexOutOfBoundsException"],
    );
    m.insert(
        "java.lang.StringIndexOutOfBoundsException",
        &["java.lang.IndexOutOfBoundsException"],
    );
    m.insert("groovy.lang.MissingPropertyException", &["groovy.lang.GroovyRuntimeException"]);
    m.insert("groovy.lang.ReadOnlyPropertyException", &["groovy.lang.MissingPropertyException"]);
    m.insert(
        "org.codehaus.groovy.runtime.typehandling.GroovyCastException",
        &["java.lang.ClassCastException"],
    );
    m
});

fn is_throwable_name(name: &str) -> bool {
    let simple = simple_name(name);
    simple.ends_with("Exception") || simple.ends_with("Error") || simple == "Throwable"
}

fn supertypes(name: &str) -> &'static [&'static str] {
    match SUPERTYPES.get(name) {
        Some(supers) => supers,
        None if is_throwable_name(name) => &["java.lang.RuntimeException"],
        None => &[],
    }
}

/// Whether the evaluator models `name`, as a class or as an interface.
pub fn is_known_type(name: &str) -> bool {
    let name = qualify(name);
    SUPERTYPES.contains_key(name)
        || SUPERTYPES.values().any(|supers| supers.contains(&name))
        || is_throwable_name(name)
}

/// Whether a library value of class `runtime` can be assigned to `ty`.
pub fn is_assignable(runtime: &str, ty: &TypeRef) -> bool {
    if ty.is_object() {
        return true;
    }
    let mut pending = vec![qualify(runtime)];
    while let Some(name) = pending.pop() {
        if same_name(name, &ty.name) {
            return true;
        }
        pending.extend(supertypes(name).iter().copied());
    }
    false
}

// ============================================================================
// CONSTRUCTION
// ============================================================================

/// `new T(args)` for a library class.
pub fn new_object(interp: &mut Interpreter<'_>, ty: &TypeRef, args: Vec<Value>) -> EvalResult {
    let class = qualify(&ty.name);
    let source = args.first().and_then(|a| interp.elements(a));
    let object = match simple_name(class) {
        "ArrayList" | "LinkedList" | "List" | "Collection" => Object::List {
            items: source.unwrap_or_default(),
            read_only: false,
        },
        "HashSet" | "LinkedHashSet" | "TreeSet" | "Set" => {
            let items = interp.distinct(source.unwrap_or_default())?;
            Object::Set {
                items,
                read_only: false,
            }
        }
        "HashMap" | "LinkedHashMap" | "TreeMap" | "Map" => {
            let entries = args
                .first()
                .and_then(Value::as_object)
                .and_then(|id| interp.map_entries(id))
                .unwrap_or_default();
            Object::Map {
                entries,
                read_only: false,
            }
        }
        "StringBuilder" | "StringBuffer" => {
            let text = match args.first() {
                Some(Value::Int(_)) | None => String::new(),
                Some(other) => interp.display(other)?,
            };
            Object::StringBuilder(text)
        }
        "Date" => Object::Date(args.first().and_then(Value::as_int).unwrap_or(0)),
        "Object" => Object::Plain {
            class: "java.lang.Object".into(),
        },
        "String" => {
            return match args.first() {
                Some(v) => Ok(Value::Str(interp.display(v)?)),
                None => Ok(Value::string("")),
            }
        }
        _ if is_throwable_name(class) => {
            let message = match args.first() {
                Some(Value::Null) | None => None,
                Some(v) => Some(interp.display(v)?),
            };
            Object::Throwable {
                class: class.to_string(),
                message,
            }
        }
        _ => return Err(EvalError::UnknownClass(ty.name.clone())),
    };
    Ok(interp.heap.alloc(object))
}

fn read_only(items: Vec<Value>, kind: &str) -> Object {
    match kind {
        "Set" => Object::Set {
            items,
            read_only: true,
        },
        _ => Object::List {
            items,
            read_only: true,
        },
    }
}

// ============================================================================
// STATIC MEMBERS
// ============================================================================

/// `Class.method(args)` for a library class given by qualified name.
pub fn call_static(
    interp: &mut Interpreter<'_>,
    class: &str,
    method: &str,
    args: Vec<Value>,
) -> EvalResult {
    let class = qualify(class);
    match (class, method, args.as_slice()) {
        (names::HASH_CODE_HELPER, "initHash", []) => Ok(Value::Int(127)),
        (names::HASH_CODE_HELPER, "updateHash", [current, value]) => {
            let current = current.as_int().unwrap_or(0) as i32;
            let hash = interp.hash_code(value)?;
            Ok(Value::Int(current.wrapping_mul(59).wrapping_add(hash) as i64))
        }
        (names::INVOKER_HELPER, "toString", [value]) => Ok(Value::Str(interp.display(value)?)),
        (names::INVOKER_HELPER, "invokeMethod", [target, name, arguments]) => {
            let name = interp.display(name)?;
            let arguments = match arguments {
                Value::Null => Vec::new(),
                other => interp.elements(other).unwrap_or_else(|| vec![other.clone()]),
            };
            interp.call(target, &name, arguments)
        }
        ("java.lang.System", "nanoTime", []) => Ok(Value::Int(interp.tick())),
        ("java.lang.System", "currentTimeMillis", []) => Ok(Value::Int(interp.tick() / 1_000_000)),
        ("java.lang.System", "identityHashCode", [value]) => Ok(Value::Int(match value {
            Value::Ref(id) => identity_hash(*id) as i64,
            other => interp.hash_code(other)? as i64,
        })),
        ("java.lang.Thread", "currentThread", []) => Ok(interp.current_thread()),
        ("java.lang.Thread", "interrupted", []) => {
            Ok(Value::Bool(std::mem::replace(&mut interp.interrupted, false)))
        }
        ("java.util.Collections", "unmodifiableList" | "unmodifiableCollection", [value])
        | ("java.util.Collections", "unmodifiableSet", [value]) => {
            let items = interp
                .elements(value)
                .ok_or_else(|| EvalError::null_pointer("Cannot wrap null collection"))?;
            let kind = if method == "unmodifiableSet" { "Set" } else { "List" };
            Ok(interp.heap.alloc(read_only(items, kind)))
        }
        ("java.util.Collections", "unmodifiableMap", [value]) => {
            let entries = value
                .as_object()
                .and_then(|id| interp.map_entries(id))
                .ok_or_else(|| EvalError::null_pointer("Cannot wrap null map"))?;
            Ok(interp.heap.alloc(Object::Map {
                entries,
                read_only: true,
            }))
        }
        ("java.util.Collections", "emptyList", []) => Ok(interp.heap.alloc(read_only(Vec::new(), "List"))),
        ("java.util.Collections", "emptySet", []) => Ok(interp.heap.alloc(read_only(Vec::new(), "Set"))),
        ("java.util.Collections", "emptyMap", []) => Ok(interp.heap.alloc(Object::Map {
            entries: Vec::new(),
            read_only: true,
        })),
        ("java.util.Objects", "equals", [a, b]) => Ok(Value::Bool(interp.equals(a, b)?)),
        ("java.util.Objects", "hashCode", [value]) => Ok(Value::Int(interp.hash_code(value)? as i64)),
        ("java.util.Objects", "hash", values) => {
            let list = interp.list(values.to_vec());
            Ok(Value::Int(interp.hash_code(&list)? as i64))
        }
        ("java.util.Objects", "isNull", [value]) => Ok(Value::Bool(value.is_null())),
        ("java.util.Objects", "nonNull", [value]) => Ok(Value::Bool(!value.is_null())),
        ("java.util.Objects", "requireNonNull", [value, rest @ ..]) if rest.len() <= 1 => {
            if value.is_null() {
                let message = match rest.first() {
                    Some(m) => interp.display(m)?,
                    None => String::new(),
                };
                return Err(EvalError::null_pointer(message));
            }
            Ok(value.clone())
        }
        ("java.util.Arrays", "asList", values) => {
            let items = match values {
                [single] => match interp.object_of(single) {
                    Some(Object::Array { items, .. }) => items.clone(),
                    _ => values.to_vec(),
                },
                _ => values.to_vec(),
            };
            Ok(interp.list(items))
        }
        ("java.util.logging.Logger", "getLogger", [name]) => {
            let name = interp.display(name)?;
            Ok(interp.heap.alloc(Object::Logger { name }))
        }
        ("java.lang.String", "valueOf", [value]) => Ok(Value::Str(interp.display(value)?)),
        ("java.lang.Integer" | "java.lang.Long", "valueOf" | "parseInt" | "parseLong", [value]) => {
            match value {
                Value::Int(i) => Ok(Value::Int(*i)),
                Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
                    EvalError::thrown(
                        "java.lang.NumberFormatException",
                        format!("For input string: \"{}\"", s),
                    )
                }),
                other => Err(EvalError::thrown(
                    "java.lang.NumberFormatException",
                    interp.display(other)?,
                )),
            }
        }
        ("java.lang.Math", "max" | "min", [a, b]) => {
            let order = interp.compare(a, b)?;
            let pick_a = (method == "max") == (order != Ordering::Less);
            Ok(if pick_a { a.clone() } else { b.clone() })
        }
        ("java.lang.Math", "abs", [Value::Int(i)]) => Ok(Value::Int(i.wrapping_abs())),
        ("java.lang.Math", "abs", [Value::Float(f)]) => Ok(Value::Float(f.abs())),
        _ => Err(EvalError::MissingMethod {
            receiver: class.to_string(),
            name: method.to_string(),
            arity: args.len(),
        }),
    }
}

/// `Class.NAME` for a library class.
pub fn static_property(class: &str, name: &str) -> EvalResult {
    match qualify(class) {
        LEVEL if level_value(name).is_some() => Ok(Value::string(name)),
        "java.lang.Integer" if name == "MAX_VALUE" => Ok(Value::Int(i32::MAX as i64)),
        "java.lang.Integer" if name == "MIN_VALUE" => Ok(Value::Int(i32::MIN as i64)),
        "java.lang.Long" if name == "MAX_VALUE" => Ok(Value::Int(i64::MAX)),
        "java.lang.Long" if name == "MIN_VALUE" => Ok(Value::Int(i64::MIN)),
        "java.util.concurrent.TimeUnit" => Ok(Value::string(name)),
        qualified => match name {
            "name" => Ok(Value::string(qualified)),
            "simpleName" => Ok(Value::string(simple_name(qualified))),
            _ => Err(EvalError::MissingProperty {
                receiver: qualified.to_string(),
                name: name.to_string(),
            }),
        },
    }
}

// ============================================================================
// INSTANCE MEMBERS
// ============================================================================

/// `value.name` for library values: array length, spread over collection
/// elements, else the `getName()` method.
pub fn property(interp: &mut Interpreter<'_>, receiver: &Value, name: &str) -> EvalResult {
    match interp.object_of(receiver) {
        Some(Object::Array { items, .. }) if name == "length" => Ok(Value::Int(items.len() as i64)),
        Some(Object::List { items, .. }) | Some(Object::Set { items, .. }) if name != "empty" => {
            let items = items.clone();
            let mut spread = Vec::with_capacity(items.len());
            for item in &items {
                spread.push(interp.get_property(item, name)?);
            }
            Ok(interp.list(spread))
        }
        _ => {
            let getter = if name == "empty" {
                "isEmpty".to_string()
            } else {
                format!("get{}", capitalize(name))
            };
            match call_builtin(interp, receiver, &getter, Vec::new()) {
                Err(EvalError::MissingMethod { receiver, .. }) => Err(EvalError::MissingProperty {
                    receiver,
                    name: name.to_string(),
                }),
                other => other,
            }
        }
    }
}

/// `receiver.method(args)` where the receiver is not an instance of a class
/// declared in the AST.
pub fn call_builtin(
    interp: &mut Interpreter<'_>,
    receiver: &Value,
    method: &str,
    args: Vec<Value>,
) -> EvalResult {
    match (method, args.as_slice()) {
        ("is", [other]) => return Ok(Value::Bool(receiver.identical(other))),
        ("getClass", []) => {
            return Ok(Value::Class(match receiver {
                Value::Class(_) => "java.lang.Class".to_string(),
                other => interp.runtime_class(other),
            }))
        }
        ("equals", [other]) => return Ok(Value::Bool(interp.equals(receiver, other)?)),
        ("hashCode", []) => return Ok(Value::Int(interp.hash_code(receiver)? as i64)),
        ("toString", []) => return Ok(Value::Str(interp.display(receiver)?)),
        ("compareTo", [other]) => {
            return Ok(Value::Int(match interp.compare(receiver, other)? {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            }))
        }
        _ => {}
    }
    match receiver {
        Value::Str(s) => string_method(interp, s, method, &args),
        Value::Int(_) | Value::Float(_) | Value::Bool(_) => number_method(receiver, method, &args),
        Value::Class(name) => match (method, args.as_slice()) {
            ("getName", []) => Ok(Value::string(name.as_str())),
            ("getSimpleName", []) => Ok(Value::string(simple_name(name))),
            ("isInstance", [value]) => Ok(Value::Bool(interp.instance_of(value, &TypeRef::new(name.as_str())))),
            _ => call_static(interp, name, method, args),
        },
        Value::Closure(closure) if method == "call" => interp.call_closure(closure, args),
        Value::Ref(id) => {
            let id = *id;
            match interp.object(id).clone() {
                Object::List { items, read_only } => list_method(interp, id, items, read_only, method, args),
                Object::Set { items, read_only } => set_method(interp, id, items, read_only, method, args),
                Object::Map { entries, read_only } => map_method(interp, id, entries, read_only, method, args),
                Object::Array { element, items } => match (method, args.as_slice()) {
                    ("clone", []) => Ok(interp.heap.alloc(Object::Array { element, items })),
                    ("size", []) => Ok(Value::Int(items.len() as i64)),
                    _ => collection_method(interp, receiver, &items, method, &args),
                },
                Object::StringBuilder(text) => match (method, args.as_slice()) {
                    ("append", [value]) => {
                        let more = interp.display(value)?;
                        if let Object::StringBuilder(text) = interp.heap.get_mut(id) {
                            text.push_str(&more);
                        }
                        Ok(receiver.clone())
                    }
                    ("length", []) => Ok(Value::Int(text.encode_utf16().count() as i64)),
                    _ => Err(missing(interp, receiver, method, &args)),
                },
                Object::Date(ms) => match (method, args.as_slice()) {
                    ("getTime", []) => Ok(Value::Int(ms)),
                    ("clone", []) => Ok(interp.heap.alloc(Object::Date(ms))),
                    ("before" | "after", [other]) => {
                        let order = interp.compare(receiver, other)?;
                        let wanted = if method == "before" { Ordering::Less } else { Ordering::Greater };
                        Ok(Value::Bool(order == wanted))
                    }
                    _ => Err(missing(interp, receiver, method, &args)),
                },
                Object::Throwable { message, .. } => match (method, args.as_slice()) {
                    ("getMessage" | "getLocalizedMessage", []) => {
                        Ok(message.map(Value::Str).unwrap_or(Value::Null))
                    }
                    _ => Err(missing(interp, receiver, method, &args)),
                },
                Object::Logger { name } => logger_method(interp, &name, method, &args),
                Object::Thread => match (method, args.as_slice()) {
                    ("isInterrupted", []) => Ok(Value::Bool(interp.interrupted)),
                    ("interrupt", []) => {
                        interp.interrupt();
                        Ok(Value::Null)
                    }
                    ("getName", []) => Ok(Value::string("main")),
                    _ => Err(missing(interp, receiver, method, &args)),
                },
                Object::Instance { .. } | Object::Plain { .. } => {
                    Err(missing(interp, receiver, method, &args))
                }
            }
        }
        _ => Err(missing(interp, receiver, method, &args)),
    }
}

fn missing(interp: &Interpreter<'_>, receiver: &Value, method: &str, args: &[Value]) -> EvalError {
    EvalError::MissingMethod {
        receiver: interp.runtime_class(receiver),
        name: method.to_string(),
        arity: args.len(),
    }
}

fn string_method(interp: &mut Interpreter<'_>, s: &str, method: &str, args: &[Value]) -> EvalResult {
    let text = |v: &Value| v.as_str().map(str::to_string);
    let chars: Vec<char> = s.chars().collect();
    Ok(match (method, args) {
        ("length" | "size", []) => Value::Int(s.encode_utf16().count() as i64),
        ("isEmpty", []) => Value::Bool(s.is_empty()),
        ("toUpperCase", []) => Value::Str(s.to_uppercase()),
        ("toLowerCase", []) => Value::Str(s.to_lowercase()),
        ("trim", []) => Value::string(s.trim()),
        ("capitalize", []) => Value::Str(capitalize(s)),
        ("contains", [Value::Str(p)]) => Value::Bool(s.contains(p.as_str())),
        ("startsWith", [Value::Str(p)]) => Value::Bool(s.starts_with(p.as_str())),
        ("endsWith", [Value::Str(p)]) => Value::Bool(s.ends_with(p.as_str())),
        ("equalsIgnoreCase", [other]) => {
            Value::Bool(text(other).is_some_and(|o| o.to_lowercase() == s.to_lowercase()))
        }
        ("indexOf", [Value::Str(p)]) => Value::Int(
            s.find(p.as_str())
                .map(|at| s[..at].chars().count() as i64)
                .unwrap_or(-1),
        ),
        ("charAt", [Value::Int(i)]) => match usize::try_from(*i).ok().and_then(|i| chars.get(i)) {
            Some(c) => Value::Str(c.to_string()),
            None => {
                return Err(EvalError::thrown(
                    "java.lang.StringIndexOutOfBoundsException",
                    i.to_string(),
                ))
            }
        },
        ("substring", [Value::Int(from), rest @ ..]) if rest.len() <= 1 => {
            let to = match rest.first() {
                Some(Value::Int(to)) => *to,
                _ => chars.len() as i64,
            };
            if *from < 0 || to < *from || to > chars.len() as i64 {
                return Err(EvalError::thrown(
                    "java.lang.StringIndexOutOfBoundsException",
                    format!("begin {}, end {}, length {}", from, to, chars.len()),
                ));
            }
            Value::Str(chars[*from as usize..to as usize].iter().collect())
        }
        ("concat" | "plus", [other]) => Value::Str(format!("{}{}", s, interp.display(other)?)),
        ("split", [Value::Str(sep)]) => {
            let parts = s.split(sep.as_str()).map(Value::string).collect();
            interp.list(parts)
        }
        _ => return Err(missing(interp, &Value::string(s), method, args)),
    })
}

fn number_method(receiver: &Value, method: &str, args: &[Value]) -> EvalResult {
    Ok(match (receiver, method, args) {
        (Value::Int(i), "intValue", []) => Value::Int(*i as i32 as i64),
        (Value::Int(i), "longValue", []) => Value::Int(*i),
        (Value::Int(i), "doubleValue", []) => Value::Float(*i as f64),
        (Value::Float(f), "intValue" | "longValue", []) => Value::Int(*f as i64),
        (Value::Float(f), "doubleValue", []) => Value::Float(*f),
        (Value::Int(i), "abs", []) => Value::Int(i.wrapping_abs()),
        (Value::Float(f), "abs", []) => Value::Float(f.abs()),
        (Value::Bool(b), "booleanValue", []) => Value::Bool(*b),
        _ => {
            return Err(EvalError::MissingMethod {
                receiver: match receiver {
                    Value::Bool(_) => "java.lang.Boolean",
                    Value::Float(_) => "java.lang.Double",
                    _ => "java.lang.Integer",
                }
                .to_string(),
                name: method.to_string(),
                arity: args.len(),
            })
        }
    })
}

/// Calls a closure, or the single abstract method of a comparator.
fn apply(interp: &mut Interpreter<'_>, f: &Value, args: Vec<Value>) -> EvalResult {
    match f {
        Value::Closure(closure) => interp.call_closure(closure, args),
        other => interp.call(other, "compare", args),
    }
}

fn sorted(interp: &mut Interpreter<'_>, mut items: Vec<Value>, by: Option<&Value>) -> EvalResult<Vec<Value>> {
    let mut failure = None;
    items.sort_by(|a, b| {
        if failure.is_some() {
            return Ordering::Equal;
        }
        let order = match by {
            Some(f) => apply(interp, f, vec![a.clone(), b.clone()])
                .map(|v| v.as_int().unwrap_or(0).cmp(&0)),
            None => interp.compare(a, b),
        };
        order.unwrap_or_else(|e| {
            failure = Some(e);
            Ordering::Equal
        })
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(items),
    }
}

/// Methods shared by lists, sets and arrays.
fn collection_method(
    interp: &mut Interpreter<'_>,
    receiver: &Value,
    items: &[Value],
    method: &str,
    args: &[Value],
) -> EvalResult {
    Ok(match (method, args) {
        ("size", []) => Value::Int(items.len() as i64),
        ("isEmpty", []) => Value::Bool(items.is_empty()),
        ("contains", [value]) => Value::Bool(interp.contains(items, value)?),
        ("each", [f]) => {
            for item in items {
                apply(interp, f, vec![item.clone()])?;
            }
            receiver.clone()
        }
        ("collect", [f]) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(apply(interp, f, vec![item.clone()])?);
            }
            interp.list(out)
        }
        ("findAll", [f]) => {
            let mut out = Vec::new();
            for item in items {
                let keep = apply(interp, f, vec![item.clone()])?;
                if interp.truthy(&keep) {
                    out.push(item.clone());
                }
            }
            interp.list(out)
        }
        ("find", [f]) => {
            for item in items {
                let hit = apply(interp, f, vec![item.clone()])?;
                if interp.truthy(&hit) {
                    return Ok(item.clone());
                }
            }
            Value::Null
        }
        ("any" | "every", [f]) => {
            let any = method == "any";
            for item in items {
                let hit = apply(interp, f, vec![item.clone()])?;
                if interp.truthy(&hit) == any {
                    return Ok(Value::Bool(any));
                }
            }
            Value::Bool(!any)
        }
        ("join", [sep]) => {
            let sep = interp.display(sep)?;
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                parts.push(interp.display(item)?);
            }
            Value::Str(parts.join(&sep))
        }
        ("first", []) => items.first().cloned().ok_or_else(no_such_element)?,
        ("last", []) => items.last().cloned().ok_or_else(no_such_element)?,
        ("getAt", [Value::Int(i)]) => {
            let at = if *i < 0 { items.len() as i64 + i } else { *i };
            usize::try_from(at)
                .ok()
                .and_then(|at| items.get(at))
                .cloned()
                .unwrap_or(Value::Null)
        }
        ("toList", []) => interp.list(items.to_vec()),
        ("toSet", []) => {
            let items = interp.distinct(items.to_vec())?;
            interp.heap.alloc(Object::Set {
                items,
                read_only: false,
            })
        }
        ("toSorted" | "sort", rest) if rest.len() <= 1 => {
            let items = sorted(interp, items.to_vec(), rest.first())?;
            interp.list(items)
        }
        _ => return Err(missing(interp, receiver, method, args)),
    })
}

fn no_such_element() -> EvalError {
    EvalError::thrown("java.util.NoSuchElementException", "Cannot access first() element from an empty List")
}

fn set_items(interp: &mut Interpreter<'_>, id: usize, items: Vec<Value>) {
    match interp.heap.get_mut(id) {
        Object::List { items: slot, .. } | Object::Set { items: slot, .. } => *slot = items,
        _ => {}
    }
}

fn list_method(
    interp: &mut Interpreter<'_>,
    id: usize,
    mut items: Vec<Value>,
    read_only: bool,
    method: &str,
    args: Vec<Value>,
) -> EvalResult {
    let receiver = Value::Ref(id);
    let mutating = matches!(method, "add" | "addAll" | "remove" | "clear" | "set" | "putAt")
        || (method == "sort" && args.len() <= 1);
    if mutating && read_only {
        return Err(Interpreter::read_only_error());
    }
    let out_of_bounds = |i: i64, len: usize| {
        EvalError::thrown(
            "java.lang.IndexOutOfBoundsException",
            format!("Index {} out of bounds for length {}", i, len),
        )
    };
    let result = match (method, args.as_slice()) {
        ("get", [Value::Int(i)]) => {
            return usize::try_from(*i)
                .ok()
                .and_then(|at| items.get(at))
                .cloned()
                .ok_or_else(|| out_of_bounds(*i, items.len()))
        }
        ("indexOf", [value]) => {
            for (at, item) in items.iter().enumerate() {
                if interp.equals(item, value)? {
                    return Ok(Value::Int(at as i64));
                }
            }
            return Ok(Value::Int(-1));
        }
        ("add", [value]) => {
            items.push(value.clone());
            Value::Bool(true)
        }
        ("add", [Value::Int(i), value]) => {
            let at = usize::try_from(*i)
                .ok()
                .filter(|at| *at <= items.len())
                .ok_or_else(|| out_of_bounds(*i, items.len()))?;
            items.insert(at, value.clone());
            Value::Null
        }
        ("addAll", [other]) => {
            let more = interp.elements(other).unwrap_or_default();
            let changed = !more.is_empty();
            items.extend(more);
            Value::Bool(changed)
        }
        ("set" | "putAt", [Value::Int(i), value]) => {
            let at = usize::try_from(*i)
                .ok()
                .filter(|at| *at < items.len())
                .ok_or_else(|| out_of_bounds(*i, items.len()))?;
            std::mem::replace(&mut items[at], value.clone())
        }
        ("remove", [Value::Int(i)]) => {
            let at = usize::try_from(*i)
                .ok()
                .filter(|at| *at < items.len())
                .ok_or_else(|| out_of_bounds(*i, items.len()))?;
            items.remove(at)
        }
        ("remove", [value]) => {
            let mut removed = false;
            for at in 0..items.len() {
                if interp.equals(&items[at], value)? {
                    items.remove(at);
                    removed = true;
                    break;
                }
            }
            Value::Bool(removed)
        }
        ("clear", []) => {
            items.clear();
            Value::Null
        }
        ("sort", rest) if rest.len() <= 1 => {
            items = sorted(interp, items, rest.first())?;
            receiver.clone()
        }
        ("clone", []) => {
            return Ok(interp.heap.alloc(Object::List {
                items,
                read_only: false,
            }))
        }
        ("subList", [Value::Int(from), Value::Int(to)]) => {
            let (from, to) = (*from, *to);
            if from < 0 || to < from || to as usize > items.len() {
                return Err(out_of_bounds(to, items.len()));
            }
            return Ok(interp.list(items[from as usize..to as usize].to_vec()));
        }
        ("plus", [other]) => {
            match interp.elements(other) {
                Some(more) => items.extend(more),
                None => items.push(other.clone()),
            }
            return Ok(interp.list(items));
        }
        _ => return collection_method(interp, &receiver, &items, method, &args),
    };
    set_items(interp, id, items);
    Ok(result)
}

fn set_method(
    interp: &mut Interpreter<'_>,
    id: usize,
    mut items: Vec<Value>,
    read_only: bool,
    method: &str,
    args: Vec<Value>,
) -> EvalResult {
    let receiver = Value::Ref(id);
    if matches!(method, "add" | "addAll" | "remove" | "clear") && read_only {
        return Err(Interpreter::read_only_error());
    }
    let result = match (method, args.as_slice()) {
        ("add", [value]) => {
            let fresh = !interp.contains(&items, value)?;
            if fresh {
                items.push(value.clone());
            }
            Value::Bool(fresh)
        }
        ("addAll", [other]) => {
            let mut changed = false;
            for value in interp.elements(other).unwrap_or_default() {
                if !interp.contains(&items, &value)? {
                    items.push(value);
                    changed = true;
                }
            }
            Value::Bool(changed)
        }
        ("remove", [value]) => {
            let mut removed = false;
            for at in 0..items.len() {
                if interp.equals(&items[at], value)? {
                    items.remove(at);
                    removed = true;
                    break;
                }
            }
            Value::Bool(removed)
        }
        ("clear", []) => {
            items.clear();
            Value::Null
        }
        ("clone", []) => {
            return Ok(interp.heap.alloc(Object::Set {
                items,
                read_only: false,
            }))
        }
        _ => return collection_method(interp, &receiver, &items, method, &args),
    };
    set_items(interp, id, items);
    Ok(result)
}

fn map_method(
    interp: &mut Interpreter<'_>,
    id: usize,
    entries: Vec<(Value, Value)>,
    read_only: bool,
    method: &str,
    args: Vec<Value>,
) -> EvalResult {
    let receiver = Value::Ref(id);
    if matches!(method, "put" | "putAll" | "remove" | "clear" | "putAt") && read_only {
        return Err(Interpreter::read_only_error());
    }
    Ok(match (method, args.as_slice()) {
        ("size", []) => Value::Int(entries.len() as i64),
        ("isEmpty", []) => Value::Bool(entries.is_empty()),
        ("get" | "getAt", [key]) => interp.map_get(id, key)?,
        ("containsKey", [key]) => Value::Bool(interp.map_contains(id, key)?),
        ("containsValue", [value]) => {
            let values: Vec<Value> = entries.into_iter().map(|(_, v)| v).collect();
            Value::Bool(interp.contains(&values, value)?)
        }
        ("put" | "putAt", [key, value]) => interp.map_put(id, key.clone(), value.clone())?,
        ("putAll", [other]) => {
            let more = other
                .as_object()
                .and_then(|o| interp.map_entries(o))
                .unwrap_or_default();
            for (key, value) in more {
                interp.map_put(id, key, value)?;
            }
            Value::Null
        }
        ("remove", [key]) => {
            let mut previous = Value::Null;
            let mut kept = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                if previous.is_null() && interp.equals(&k, key)? {
                    previous = v;
                } else {
                    kept.push((k, v));
                }
            }
            if let Object::Map { entries, .. } = interp.heap.get_mut(id) {
                *entries = kept;
            }
            previous
        }
        ("clear", []) => {
            if let Object::Map { entries, .. } = interp.heap.get_mut(id) {
                entries.clear();
            }
            Value::Null
        }
        ("keySet", []) => interp.heap.alloc(Object::Set {
            items: entries.into_iter().map(|(k, _)| k).collect(),
            read_only: false,
        }),
        ("values", []) => interp.list(entries.into_iter().map(|(_, v)| v).collect()),
        ("each", [f]) => {
            let pairs = matches!(f, Value::Closure(c) if c.params.len() == 2);
            for (key, value) in entries {
                let args = if pairs { vec![key, value] } else { vec![key] };
                apply(interp, f, args)?;
            }
            receiver
        }
        ("clone", []) => interp.heap.alloc(Object::Map {
            entries,
            read_only: false,
        }),
        _ => return Err(missing(interp, &receiver, method, &args)),
    })
}

fn logger_method(interp: &mut Interpreter<'_>, logger: &str, method: &str, args: &[Value]) -> EvalResult {
    let (level, message) = match (method, args) {
        ("isLoggable", [level]) => {
            let level = interp.display(level)?;
            let weight = level_value(&level).unwrap_or(i32::MIN);
            return Ok(Value::Bool(weight >= interp.log_threshold));
        }
        ("getName", []) => return Ok(Value::string(logger)),
        ("log", [level, message]) => (interp.display(level)?.to_uppercase(), message),
        (_, [message]) if level_value(method).is_some() && method != "all" && method != "off" => {
            (method.to_uppercase(), message)
        }
        _ => {
            return Err(EvalError::MissingMethod {
                receiver: "java.util.logging.Logger".into(),
                name: method.to_string(),
                arity: args.len(),
            })
        }
    };
    let weight = level_value(&level).unwrap_or(i32::MIN);
    if weight >= interp.log_threshold {
        let message = interp.display(message)?;
        tracing::debug!(target: "canopy::eval", logger, level = %level, "{}", message);
        interp.records.push(super::LogRecord {
            logger: logger.to_string(),
            level,
            message,
        });
    }
    Ok(Value::Null)
}
