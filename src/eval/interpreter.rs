//! Tree-walking interpreter over class bodies.

use super::library;
use super::value::{int_hash, string_hash, Closure, Env, Heap, Object, ObjectId, Value};
use super::{EvalError, EvalResult};
use crate::ast::types::{capitalize, qualify, same_name};
use crate::ast::{
    Ast, BinaryOp, ClassId, Constant, CtorKind, Expr, FieldNode, MethodId, Parameter, Stmt,
    TypeRef,
};
use crate::config::CompilerConfiguration;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// How a statement completed.
enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

struct Frame {
    vars: Env,
    this: Option<ObjectId>,
    class: Option<ClassId>,
}

impl Frame {
    fn detached() -> Self {
        Frame {
            vars: Env::new(),
            this: None,
            class: None,
        }
    }

    fn for_class(class: ClassId) -> Self {
        Frame {
            vars: Env::new(),
            this: None,
            class: Some(class),
        }
    }

    fn for_instance(class: ClassId, this: ObjectId) -> Self {
        Frame {
            vars: Env::new(),
            this: Some(this),
            class: Some(class),
        }
    }
}

/// A message accepted by an evaluated `java.util.logging.Logger`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub logger: String,
    pub level: String,
    pub message: String,
}

/// Executes methods of an [`Ast`].
///
/// # Examples
///
/// ```rust
/// use canopy::ast::{Ast, ClassNode, Modifiers, TypeRef};
/// use canopy::eval::{Interpreter, Value};
///
/// let mut ast = Ast::new();
/// let module = ast.add_module("M", None);
/// let class = ast.add_class(module, ClassNode::new("Point", Modifiers::PUBLIC));
/// ast.add_property(class, "x", Modifiers::NONE, TypeRef::int(), None);
///
/// let mut interp = Interpreter::new(&ast);
/// let point = interp.instantiate("Point", vec![]).unwrap();
/// interp.set_property(&point, "x", Value::Int(3)).unwrap();
/// assert_eq!(interp.get_property(&point, "x").unwrap().as_int(), Some(3));
/// ```
pub struct Interpreter<'a> {
    ast: &'a Ast,
    pub(super) heap: Heap,
    statics: HashMap<ClassId, IndexMap<String, Value>>,
    initialized: HashSet<ClassId>,
    depth: usize,
    max_depth: usize,
    clock: i64,
    pub(super) interrupted: bool,
    thread: Option<ObjectId>,
    pub(super) log_threshold: i32,
    pub(super) records: Vec<LogRecord>,
}

impl<'a> Interpreter<'a> {
    pub fn new(ast: &'a Ast) -> Self {
        Self::with_config(ast, &CompilerConfiguration::default())
    }

    pub fn with_config(ast: &'a Ast, config: &CompilerConfiguration) -> Self {
        Self {
            ast,
            heap: Heap::default(),
            statics: HashMap::new(),
            initialized: HashSet::new(),
            depth: 0,
            max_depth: config.max_eval_depth,
            clock: 0,
            interrupted: false,
            thread: None,
            log_threshold: library::level_value("INFO").unwrap_or(800),
            records: Vec::new(),
        }
    }

    pub fn ast(&self) -> &'a Ast {
        self.ast
    }

    pub fn object(&self, id: ObjectId) -> &Object {
        self.heap.get(id)
    }

    pub(super) fn object_of(&self, value: &Value) -> Option<&Object> {
        value.as_object().map(|id| self.heap.get(id))
    }

    /// Messages logged so far, oldest first.
    pub fn log_records(&self) -> &[LogRecord] {
        &self.records
    }

    /// Sets the level below which evaluated loggers discard messages.
    pub fn set_log_level(&mut self, level: &str) -> EvalResult<()> {
        self.log_threshold = library::level_value(level)
            .ok_or_else(|| EvalError::Unsupported(format!("unknown log level {}", level)))?;
        Ok(())
    }

    /// Moves the clock read by `System.nanoTime()` forward.
    pub fn advance_clock(&mut self, nanos: i64) {
        self.clock += nanos;
    }

    /// Sets the interrupt flag of the evaluating thread.
    pub fn interrupt(&mut self) {
        self.interrupted = true;
    }

    /// Current clock reading; every read advances it by one nanosecond so
    /// successive readings are strictly increasing.
    pub(super) fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }

    pub(super) fn current_thread(&mut self) -> Value {
        match self.thread {
            Some(id) => Value::Ref(id),
            None => {
                let thread = self.heap.alloc(Object::Thread);
                self.thread = thread.as_object();
                thread
            }
        }
    }

    // ========================================================================
    // PUBLIC ENTRY POINTS
    // ========================================================================

    /// Creates an instance of a class declared in the AST.
    pub fn instantiate(&mut self, class_name: &str, args: Vec<Value>) -> EvalResult {
        let class = self
            .unit_class(class_name)
            .ok_or_else(|| EvalError::UnknownClass(class_name.to_string()))?;
        self.construct(class, args)
    }

    /// Calls `method` on `receiver`, dispatching on its runtime class.
    pub fn call(&mut self, receiver: &Value, method: &str, args: Vec<Value>) -> EvalResult {
        match receiver {
            Value::Null => match (method, args.as_slice()) {
                ("equals", [other]) => Ok(Value::Bool(other.is_null())),
                ("toString", []) => Ok(Value::string("null")),
                ("is", [other]) => Ok(Value::Bool(other.is_null())),
                _ => Err(EvalError::null_pointer(format!(
                    "Cannot invoke method {}() on null object",
                    method
                ))),
            },
            Value::Ref(id) => match self.heap.get(*id) {
                Object::Instance { class, .. } => {
                    let class = *class;
                    if let Some(m) = self.find_method(class, method, &args, false) {
                        return self.invoke(m, Some(*id), args);
                    }
                    if let Some(value) = self.implicit_accessor(*id, class, method, &args)? {
                        return Ok(value);
                    }
                    self.object_method(*id, method, args)
                }
                _ => library::call_builtin(self, receiver, method, args),
            },
            Value::Class(name) => {
                if let Some(class) = self.unit_class(name) {
                    if let Some(m) = self.find_method(class, method, &args, true) {
                        return self.invoke(m, None, args);
                    }
                }
                library::call_builtin(self, receiver, method, args)
            }
            Value::Closure(closure) if method == "call" => self.call_closure(closure, args),
            _ => library::call_builtin(self, receiver, method, args),
        }
    }

    /// Calls a static method of a class, declared in the AST or provided by
    /// the library.
    pub fn call_static(&mut self, class_name: &str, method: &str, args: Vec<Value>) -> EvalResult {
        match self.unit_class(class_name) {
            Some(class) => self.call_static_in(class, method, args),
            None => library::call_static(self, qualify(class_name), method, args),
        }
    }

    /// Runs the `run()` method of a script class.
    pub fn run_script(&mut self, class_name: &str) -> EvalResult {
        let script = self.instantiate(class_name, Vec::new())?;
        self.call(&script, "run", Vec::new())
    }

    /// Evaluates a free-standing expression with no receiver in scope.
    pub fn evaluate(&mut self, expr: &Expr) -> EvalResult {
        self.eval(expr, &mut Frame::detached())
    }

    /// Evaluates an expression with local variables bound.
    pub fn evaluate_with(&mut self, expr: &Expr, vars: &[(&str, Value)]) -> EvalResult {
        let mut frame = Frame::detached();
        for (name, value) in vars {
            frame.vars.insert((*name).to_string(), value.clone());
        }
        self.eval(expr, &mut frame)
    }

    pub fn string(&self, s: &str) -> Value {
        Value::string(s)
    }

    pub fn list(&mut self, items: Vec<Value>) -> Value {
        self.heap.alloc(Object::List {
            items,
            read_only: false,
        })
    }

    pub fn map(&mut self, entries: Vec<(Value, Value)>) -> EvalResult {
        let map = self.heap.alloc(Object::Map {
            entries: Vec::new(),
            read_only: false,
        });
        if let Value::Ref(id) = map {
            for (key, value) in entries {
                self.map_put(id, key, value)?;
            }
        }
        Ok(map)
    }

    /// Elements of a list, set or array value.
    pub fn elements(&self, value: &Value) -> Option<Vec<Value>> {
        let id = value.as_object()?;
        self.heap.get(id).elements().map(<[Value]>::to_vec)
    }

    /// Reads a field directly, bypassing accessors.
    pub fn field(&mut self, receiver: &Value, name: &str) -> EvalResult {
        self.read_field(receiver, name)
    }

    pub fn static_field(&mut self, class_name: &str, name: &str) -> EvalResult {
        self.read_field(&Value::Class(self.class_name(class_name)), name)
    }

    // ========================================================================
    // CLASSES AND METHOD LOOKUP
    // ========================================================================

    fn unit_class(&self, name: &str) -> Option<ClassId> {
        self.ast.find_class(name)
    }

    /// Canonical name for a class reference.
    fn class_name(&self, name: &str) -> String {
        match self.unit_class(name) {
            Some(class) => self.ast.class(class).name.clone(),
            None => qualify(name).to_string(),
        }
    }

    /// The class followed by its superclasses declared in the AST.
    fn lineage(&self, class: ClassId) -> Vec<ClassId> {
        let mut out = vec![class];
        let mut current = self.ast.superclass(class);
        while let Some(c) = current {
            if out.contains(&c) {
                break;
            }
            out.push(c);
            current = self.ast.superclass(c);
        }
        out
    }

    /// Most specific method applicable to `args`, searched from `class`
    /// upwards.
    fn find_method(
        &self,
        class: ClassId,
        name: &str,
        args: &[Value],
        static_only: bool,
    ) -> Option<MethodId> {
        let ast = self.ast;
        for c in self.lineage(class) {
            let candidates: Vec<MethodId> = ast
                .class(c)
                .methods
                .iter()
                .copied()
                .filter(|m| {
                    let node = ast.method(*m);
                    node.name == name && node.body.is_some() && (!static_only || node.is_static())
                })
                .collect();
            if let Some(found) = self.select(&candidates, args) {
                return Some(found);
            }
        }
        None
    }

    fn select(&self, candidates: &[MethodId], args: &[Value]) -> Option<MethodId> {
        let mut best: Option<(MethodId, (bool, usize))> = None;
        for &candidate in candidates {
            let params = &self.ast.method(candidate).params;
            if args.len() > params.len()
                || params[args.len()..].iter().any(|p| p.default.is_none())
            {
                continue;
            }
            if !params.iter().zip(args).all(|(p, a)| self.accepts(&p.ty, a)) {
                continue;
            }
            let exact = params.len() == args.len();
            let specific = params.iter().take(args.len()).filter(|p| !p.ty.is_object()).count();
            let score = (exact, specific);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((candidate, score));
            }
        }
        best.map(|(m, _)| m)
    }

    /// Whether a parameter of type `ty` takes `value`. Types the evaluator
    /// knows nothing about take anything.
    fn accepts(&self, ty: &TypeRef, value: &Value) -> bool {
        if value.is_null() {
            return !ty.is_primitive();
        }
        if ty.is_object() {
            return true;
        }
        if ty.is_primitive() {
            return match (ty.name.as_str(), value) {
                ("boolean", Value::Bool(_)) => true,
                ("float" | "double", Value::Float(_) | Value::Int(_)) => true,
                ("int" | "long" | "short" | "byte" | "char", Value::Int(_)) => true,
                _ => false,
            };
        }
        if !ty.is_array() && self.unit_class(&ty.name).is_none() && !library::is_known_type(&ty.name)
        {
            return true;
        }
        self.instance_of(value, ty)
    }

    pub fn instance_of(&self, value: &Value, ty: &TypeRef) -> bool {
        match value {
            Value::Null => false,
            Value::Ref(id) => match self.heap.get(*id) {
                Object::Instance { class, .. } => self.class_is(*class, ty),
                Object::Array { .. } => {
                    ty.is_array()
                        || ty.is_object()
                        || ty.is_named("java.lang.Cloneable")
                        || ty.is_named("java.io.Serializable")
                }
                other => !ty.is_array() && library::is_assignable(&other.class_name(self.ast), ty),
            },
            Value::Closure(_) => ty.is_object() || ty.is_named("groovy.lang.Closure"),
            other => !ty.is_array() && library::is_assignable(&self.runtime_class(other), ty),
        }
    }

    fn class_is(&self, class: ClassId, ty: &TypeRef) -> bool {
        if ty.is_array() {
            return false;
        }
        if ty.is_object() {
            return true;
        }
        let node = self.ast.class(class);
        if same_name(&node.name, &ty.name) {
            return true;
        }
        for iface in &node.interfaces {
            if iface.is(&ty.plain()) {
                return true;
            }
            match self.unit_class(&iface.name) {
                Some(c) if c != class && self.class_is(c, ty) => return true,
                None if library::is_assignable(iface.qualified_name(), ty) => return true,
                _ => {}
            }
        }
        match &node.superclass {
            Some(sup) => match self.unit_class(&sup.name) {
                Some(c) if c != class => self.class_is(c, ty),
                Some(_) => false,
                None => library::is_assignable(sup.qualified_name(), ty),
            },
            None => false,
        }
    }

    /// Qualified runtime class of a value.
    pub fn runtime_class(&self, value: &Value) -> String {
        match value {
            Value::Null => "null".into(),
            Value::Bool(_) => "java.lang.Boolean".into(),
            Value::Int(i) if i32::try_from(*i).is_ok() => "java.lang.Integer".into(),
            Value::Int(_) => "java.lang.Long".into(),
            Value::Float(_) => "java.lang.Double".into(),
            Value::Str(_) => "java.lang.String".into(),
            Value::Class(_) => "java.lang.Class".into(),
            Value::Closure(_) => "groovy.lang.Closure".into(),
            Value::Ref(id) => self.heap.get(*id).class_name(self.ast),
        }
    }

    fn field_node(&self, class: ClassId, name: &str) -> Option<&'a FieldNode> {
        let ast = self.ast;
        self.lineage(class)
            .into_iter()
            .find_map(|c| ast.field_by_name(c, name))
            .map(|f| ast.field(f))
    }

    // ========================================================================
    // INVOCATION
    // ========================================================================

    fn enter(&mut self) -> EvalResult<()> {
        if self.depth >= self.max_depth {
            return Err(EvalError::DepthExceeded(self.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    fn invoke(&mut self, method: MethodId, this: Option<ObjectId>, args: Vec<Value>) -> EvalResult {
        self.enter()?;
        let result = self.run_method(method, this, args);
        self.depth -= 1;
        result
    }

    fn run_method(&mut self, method: MethodId, this: Option<ObjectId>, args: Vec<Value>) -> EvalResult {
        let ast = self.ast;
        let node = ast.method(method);
        let mut frame = if node.is_static() {
            self.ensure_static_init(node.owner)?;
            Frame::for_class(node.owner)
        } else {
            Frame {
                vars: Env::new(),
                this,
                class: Some(node.owner),
            }
        };
        self.bind_params(&node.params, args, &mut frame)?;
        let Some(body) = &node.body else {
            return Err(EvalError::Unsupported(format!(
                "cannot invoke abstract method {}",
                node.name
            )));
        };
        match self.exec(body, &mut frame)? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Null),
        }
    }

    fn bind_params(&mut self, params: &[Parameter], args: Vec<Value>, frame: &mut Frame) -> EvalResult<()> {
        let mut args = args.into_iter();
        for param in params {
            let value = match (args.next(), &param.default) {
                (Some(value), _) => value,
                (None, Some(default)) => self.eval(default, frame)?,
                (None, None) => Value::Null,
            };
            frame.vars.insert(param.name.clone(), value);
        }
        Ok(())
    }

    fn call_static_in(&mut self, class: ClassId, method: &str, args: Vec<Value>) -> EvalResult {
        match self.find_method(class, method, &args, true) {
            Some(m) => self.invoke(m, None, args),
            None => Err(EvalError::MissingMethod {
                receiver: self.ast.class(class).name.clone(),
                name: method.to_string(),
                arity: args.len(),
            }),
        }
    }

    /// `super.method(args)` from code declared in `frame.class`.
    fn call_super(&mut self, method: &str, args: Vec<Value>, frame: &Frame) -> EvalResult {
        let (Some(this), Some(class)) = (frame.this, frame.class) else {
            return Err(EvalError::Unsupported("`super` outside an instance method".into()));
        };
        if let Some(sup) = self.ast.superclass(class) {
            if let Some(m) = self.find_method(sup, method, &args, false) {
                return self.invoke(m, Some(this), args);
            }
        }
        self.object_method(this, method, args)
    }

    /// Accessors of a property that declares none as methods: its custom
    /// accessor body when present, else direct field access. Final
    /// properties have no setter.
    fn implicit_accessor(
        &mut self,
        id: ObjectId,
        class: ClassId,
        method: &str,
        args: &[Value],
    ) -> EvalResult<Option<Value>> {
        let (suffix, is_setter) = if let Some(s) = method
            .strip_prefix("get")
            .or_else(|| method.strip_prefix("is"))
        {
            (s, false)
        } else if let Some(s) = method.strip_prefix("set") {
            (s, true)
        } else {
            return Ok(None);
        };
        if suffix.is_empty() || args.len() != usize::from(is_setter) {
            return Ok(None);
        }
        let ast = self.ast;
        let Some(property) = self.lineage(class).into_iter().find_map(|c| {
            ast.class(c)
                .properties
                .iter()
                .map(|p| ast.property(*p))
                .find(|p| capitalize(&p.name) == suffix)
        }) else {
            return Ok(None);
        };
        let field = ast.field(property.field);
        if method.starts_with("is") && !field.ty.is_named("boolean") {
            return Ok(None);
        }
        let mut frame = Frame::for_instance(property.owner, id);
        if is_setter {
            if field.modifiers.is_final() {
                return Ok(None);
            }
            let value = args[0].clone();
            match &property.setter {
                Some(body) => {
                    frame.vars.insert("value".to_string(), value);
                    self.enter()?;
                    let result = self.exec(body, &mut frame);
                    self.depth -= 1;
                    result?;
                }
                None => self.write_field(&Value::Ref(id), &field.name, value)?,
            }
            return Ok(Some(Value::Null));
        }
        match &property.getter {
            Some(body) => {
                self.enter()?;
                let result = self.exec(body, &mut frame);
                self.depth -= 1;
                match result? {
                    Flow::Return(value) => Ok(Some(value)),
                    _ => Ok(Some(Value::Null)),
                }
            }
            None => self.read_field(&Value::Ref(id), &field.name).map(Some),
        }
    }

    /// Methods every instance inherits from `java.lang.Object`.
    fn object_method(&mut self, id: ObjectId, method: &str, args: Vec<Value>) -> EvalResult {
        let class_name = self.heap.get(id).class_name(self.ast);
        match (method, args.as_slice()) {
            ("equals" | "is", [other]) => Ok(Value::Bool(other.as_object() == Some(id))),
            ("hashCode", []) => Ok(Value::Int(identity_hash(id) as i64)),
            ("toString", []) => Ok(Value::Str(format!("{}@{:x}", class_name, identity_hash(id)))),
            ("getClass", []) => Ok(Value::Class(class_name)),
            ("clone", []) => {
                if !self.instance_of(&Value::Ref(id), &TypeRef::new("java.lang.Cloneable")) {
                    return Err(EvalError::thrown(
                        "java.lang.CloneNotSupportedException",
                        class_name,
                    ));
                }
                let copy = self.heap.get(id).clone();
                Ok(self.heap.alloc(copy))
            }
            _ => Err(EvalError::MissingMethod {
                receiver: class_name,
                name: method.to_string(),
                arity: args.len(),
            }),
        }
    }

    pub fn call_closure(&mut self, closure: &Closure, args: Vec<Value>) -> EvalResult {
        self.enter()?;
        let result = self.run_closure(closure, args);
        self.depth -= 1;
        result
    }

    fn run_closure(&mut self, closure: &Closure, args: Vec<Value>) -> EvalResult {
        let mut frame = Frame {
            vars: closure.captured.clone(),
            this: closure.this,
            class: closure.class,
        };
        if closure.params.is_empty() {
            frame
                .vars
                .insert("it".to_string(), args.into_iter().next().unwrap_or(Value::Null));
        } else {
            let mut args = args.into_iter();
            for param in &closure.params {
                frame
                    .vars
                    .insert(param.clone(), args.next().unwrap_or(Value::Null));
            }
        }
        // The value of a trailing expression statement is the result.
        let stmts = closure.body.statements();
        let Some((last, init)) = stmts.split_last() else {
            return Ok(Value::Null);
        };
        for stmt in init {
            if let Flow::Return(value) = self.exec(stmt, &mut frame)? {
                return Ok(value);
            }
        }
        match last {
            Stmt::Expr(expr) => self.eval(expr, &mut frame),
            other => match self.exec(other, &mut frame)? {
                Flow::Return(value) => Ok(value),
                _ => Ok(Value::Null),
            },
        }
    }

    // ========================================================================
    // CONSTRUCTION AND INITIALIZATION
    // ========================================================================

    fn construct(&mut self, class: ClassId, args: Vec<Value>) -> EvalResult {
        let ast = self.ast;
        let node = ast.class(class);
        if node.is_interface() || node.modifiers.is_abstract() {
            return Err(EvalError::Unsupported(format!(
                "cannot instantiate abstract type {}",
                node.name
            )));
        }
        self.ensure_static_init(class)?;
        let mut fields = IndexMap::new();
        for c in self.lineage(class).into_iter().rev() {
            for field in &ast.class(c).fields {
                let field = ast.field(*field);
                if !field.is_static() {
                    fields.insert(field.name.clone(), default_value(&field.ty));
                }
            }
        }
        let instance = self.heap.alloc(Object::Instance { class, fields });
        let Value::Ref(id) = instance else {
            return Err(EvalError::Unsupported("allocation failed".into()));
        };
        self.enter()?;
        let result = self.run_constructor(class, id, args);
        self.depth -= 1;
        result.map(|_| instance)
    }

    fn run_constructor(&mut self, class: ClassId, id: ObjectId, args: Vec<Value>) -> EvalResult<()> {
        let ast = self.ast;
        let node = ast.class(class);
        let Some(ctor) = self.select(&node.constructors, &args) else {
            if args.is_empty() && node.constructors.is_empty() {
                self.construct_super(class, id, Vec::new())?;
                return self.init_instance(class, id);
            }
            // Named arguments: the no-arg constructor, then one property per
            // map entry.
            if let [Value::Ref(map)] = args.as_slice() {
                if let Object::Map { entries, .. } = self.heap.get(*map).clone() {
                    if node.constructors.is_empty() || self.select(&node.constructors, &[]).is_some() {
                        self.run_constructor(class, id, Vec::new())?;
                        for (key, value) in entries {
                            let key = self.display(&key)?;
                            self.set_property(&Value::Ref(id), &key, value)?;
                        }
                        return Ok(());
                    }
                }
            }
            return Err(EvalError::NoConstructor {
                class: node.name.clone(),
                arity: args.len(),
            });
        };

        let method = ast.method(ctor);
        let mut frame = Frame::for_instance(class, id);
        self.bind_params(&method.params, args, &mut frame)?;
        let stmts = method.body.as_ref().map(Stmt::statements).unwrap_or(&[]);
        let rest = match stmts.first() {
            Some(Stmt::Expr(Expr::CtorCall { kind, args })) => {
                let values = self.eval_args(args, &mut frame)?;
                match kind {
                    CtorKind::This => self.run_constructor(class, id, values)?,
                    CtorKind::Super => {
                        self.construct_super(class, id, values)?;
                        self.init_instance(class, id)?;
                    }
                }
                &stmts[1..]
            }
            _ => {
                self.construct_super(class, id, Vec::new())?;
                self.init_instance(class, id)?;
                stmts
            }
        };
        for stmt in rest {
            if let Flow::Return(_) = self.exec(stmt, &mut frame)? {
                break;
            }
        }
        Ok(())
    }

    fn construct_super(&mut self, class: ClassId, id: ObjectId, args: Vec<Value>) -> EvalResult<()> {
        match self.ast.superclass(class) {
            Some(sup) => self.run_constructor(sup, id, args),
            None => Ok(()),
        }
    }

    /// Field initializers, then object initializer blocks.
    fn init_instance(&mut self, class: ClassId, id: ObjectId) -> EvalResult<()> {
        let ast = self.ast;
        let node = ast.class(class);
        let mut frame = Frame::for_instance(class, id);
        for field in &node.fields {
            let field = ast.field(*field);
            if field.is_static() {
                continue;
            }
            if let Some(init) = &field.init {
                let value = self.eval(init, &mut frame)?;
                self.write_instance_field(id, &field.name, value);
            }
        }
        for stmt in &node.object_initializers {
            self.exec(stmt, &mut frame)?;
        }
        Ok(())
    }

    /// Runs static initialization of `class` once, superclasses first.
    fn ensure_static_init(&mut self, class: ClassId) -> EvalResult<()> {
        if !self.initialized.insert(class) {
            return Ok(());
        }
        if let Some(sup) = self.ast.superclass(class) {
            self.ensure_static_init(sup)?;
        }
        let ast = self.ast;
        let node = ast.class(class);
        let statics: Vec<&FieldNode> = node
            .fields
            .iter()
            .map(|f| ast.field(*f))
            .filter(|f| f.is_static())
            .collect();
        let slots = statics
            .iter()
            .map(|f| (f.name.clone(), default_value(&f.ty)))
            .collect();
        self.statics.insert(class, slots);
        let mut frame = Frame::for_class(class);
        for field in statics {
            if let Some(init) = &field.init {
                let value = self.eval(init, &mut frame)?;
                if let Some(slots) = self.statics.get_mut(&class) {
                    slots.insert(field.name.clone(), value);
                }
            }
        }
        for stmt in &node.static_initializers {
            self.exec(stmt, &mut frame)?;
        }
        Ok(())
    }

    /// Class in the lineage of `class` holding static field `name`.
    fn static_owner(&mut self, class: ClassId, name: &str) -> EvalResult<Option<ClassId>> {
        for c in self.lineage(class) {
            self.ensure_static_init(c)?;
            if self.statics.get(&c).is_some_and(|s| s.contains_key(name)) {
                return Ok(Some(c));
            }
        }
        Ok(None)
    }

    // ========================================================================
    // FIELDS AND PROPERTIES
    // ========================================================================

    fn instance_field(&self, id: ObjectId, name: &str) -> Option<Value> {
        match self.heap.get(id) {
            Object::Instance { fields, .. } => fields.get(name).cloned(),
            _ => None,
        }
    }

    fn write_instance_field(&mut self, id: ObjectId, name: &str, value: Value) -> bool {
        match self.heap.get_mut(id) {
            Object::Instance { fields, .. } if fields.contains_key(name) => {
                fields.insert(name.to_string(), value);
                true
            }
            _ => false,
        }
    }

    fn instance_class(&self, id: ObjectId) -> Option<ClassId> {
        match self.heap.get(id) {
            Object::Instance { class, .. } => Some(*class),
            _ => None,
        }
    }

    fn read_field(&mut self, receiver: &Value, name: &str) -> EvalResult {
        match receiver {
            Value::Null => Err(EvalError::null_pointer(format!(
                "Cannot get property '{}' on null object",
                name
            ))),
            Value::Class(class_name) => {
                if let Some(class) = self.unit_class(class_name) {
                    if let Some(owner) = self.static_owner(class, name)? {
                        if let Some(value) = self.statics.get(&owner).and_then(|s| s.get(name)) {
                            return Ok(value.clone());
                        }
                    }
                }
                Err(self.missing_property(receiver, name))
            }
            Value::Ref(id) => match self.instance_field(*id, name) {
                Some(value) => Ok(value),
                None => match self.instance_class(*id) {
                    Some(class) => self.read_static(class, name, receiver),
                    None => Err(self.missing_property(receiver, name)),
                },
            },
            _ => Err(self.missing_property(receiver, name)),
        }
    }

    fn read_static(&mut self, class: ClassId, name: &str, receiver: &Value) -> EvalResult {
        if let Some(owner) = self.static_owner(class, name)? {
            if let Some(value) = self.statics.get(&owner).and_then(|s| s.get(name)) {
                return Ok(value.clone());
            }
        }
        Err(self.missing_property(receiver, name))
    }

    fn write_field(&mut self, receiver: &Value, name: &str, value: Value) -> EvalResult<()> {
        match receiver {
            Value::Null => Err(EvalError::null_pointer(format!(
                "Cannot set property '{}' on null object",
                name
            ))),
            Value::Ref(id) => {
                if self.write_instance_field(*id, name, value.clone()) {
                    return Ok(());
                }
                match self.instance_class(*id) {
                    Some(class) => self.write_static(class, name, value, receiver),
                    None => Err(self.missing_property(receiver, name)),
                }
            }
            Value::Class(class_name) => match self.unit_class(class_name) {
                Some(class) => self.write_static(class, name, value, receiver),
                None => Err(self.missing_property(receiver, name)),
            },
            _ => Err(self.missing_property(receiver, name)),
        }
    }

    fn write_static(&mut self, class: ClassId, name: &str, value: Value, receiver: &Value) -> EvalResult<()> {
        match self.static_owner(class, name)? {
            Some(owner) => {
                if let Some(slots) = self.statics.get_mut(&owner) {
                    slots.insert(name.to_string(), value);
                }
                Ok(())
            }
            None => Err(self.missing_property(receiver, name)),
        }
    }

    fn missing_property(&self, receiver: &Value, name: &str) -> EvalError {
        let receiver = match receiver {
            Value::Class(name) => name.clone(),
            other => self.runtime_class(other),
        };
        EvalError::MissingProperty {
            receiver,
            name: name.to_string(),
        }
    }

    /// `receiver.name`: the getter when there is one, else the field.
    pub fn get_property(&mut self, receiver: &Value, name: &str) -> EvalResult {
        let suffix = capitalize(name);
        match receiver {
            Value::Null => Err(EvalError::null_pointer(format!(
                "Cannot get property '{}' on null object",
                name
            ))),
            Value::Class(class_name) => match self.unit_class(class_name) {
                Some(class) => {
                    for getter in [format!("get{}", suffix), format!("is{}", suffix)] {
                        if let Some(m) = self.find_method(class, &getter, &[], true) {
                            return self.invoke(m, None, Vec::new());
                        }
                    }
                    self.read_field(receiver, name)
                }
                None => library::static_property(class_name, name),
            },
            Value::Ref(id) => match self.heap.get(*id) {
                Object::Instance { class, .. } => {
                    let class = *class;
                    for getter in [format!("get{}", suffix), format!("is{}", suffix)] {
                        if let Some(m) = self.find_method(class, &getter, &[], false) {
                            return self.invoke(m, Some(*id), Vec::new());
                        }
                        if let Some(value) = self.implicit_accessor(*id, class, &getter, &[])? {
                            return Ok(value);
                        }
                    }
                    self.read_field(receiver, name)
                }
                Object::Map { .. } => self.map_get(*id, &Value::string(name)),
                _ => library::property(self, receiver, name),
            },
            _ => library::property(self, receiver, name),
        }
    }

    /// `receiver.name = value`: the setter when there is one, else the field.
    /// Final fields without a setter are read-only.
    pub fn set_property(&mut self, receiver: &Value, name: &str, value: Value) -> EvalResult<()> {
        let setter = format!("set{}", capitalize(name));
        match receiver {
            Value::Null => Err(EvalError::null_pointer(format!(
                "Cannot set property '{}' on null object",
                name
            ))),
            Value::Class(class_name) => {
                if let Some(class) = self.unit_class(class_name) {
                    let args = vec![value.clone()];
                    if let Some(m) = self.find_method(class, &setter, &args, true) {
                        return self.invoke(m, None, args).map(|_| ());
                    }
                }
                self.write_field(receiver, name, value)
            }
            Value::Ref(id) => match self.heap.get(*id) {
                Object::Instance { class, .. } => {
                    let class = *class;
                    let args = vec![value.clone()];
                    if let Some(m) = self.find_method(class, &setter, &args, false) {
                        return self.invoke(m, Some(*id), args).map(|_| ());
                    }
                    if self.implicit_accessor(*id, class, &setter, &args)?.is_some() {
                        return Ok(());
                    }
                    if self
                        .field_node(class, name)
                        .is_some_and(|f| f.modifiers.is_final())
                    {
                        return Err(EvalError::thrown(
                            "groovy.lang.ReadOnlyPropertyException",
                            format!(
                                "Cannot set readonly property: {} for class: {}",
                                name,
                                self.ast.class(class).name
                            ),
                        ));
                    }
                    self.write_field(receiver, name, value)
                }
                Object::Map { .. } => self.map_put(*id, Value::string(name), value).map(|_| ()),
                _ => Err(self.missing_property(receiver, name)),
            },
            _ => Err(self.missing_property(receiver, name)),
        }
    }

    // ========================================================================
    // COLLECTION HELPERS
    // ========================================================================

    pub(super) fn read_only_error() -> EvalError {
        EvalError::thrown("java.lang.UnsupportedOperationException", "")
    }

    fn find_key(&mut self, entries: &[(Value, Value)], key: &Value) -> EvalResult<Option<usize>> {
        for (i, (k, _)) in entries.iter().enumerate() {
            if self.equals(k, key)? {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    pub(super) fn map_entries(&self, id: ObjectId) -> Option<Vec<(Value, Value)>> {
        match self.heap.get(id) {
            Object::Map { entries, .. } => Some(entries.clone()),
            _ => None,
        }
    }

    pub(super) fn map_get(&mut self, id: ObjectId, key: &Value) -> EvalResult {
        let entries = self.map_entries(id).unwrap_or_default();
        Ok(match self.find_key(&entries, key)? {
            Some(i) => entries[i].1.clone(),
            None => Value::Null,
        })
    }

    pub(super) fn map_contains(&mut self, id: ObjectId, key: &Value) -> EvalResult<bool> {
        let entries = self.map_entries(id).unwrap_or_default();
        Ok(self.find_key(&entries, key)?.is_some())
    }

    /// Puts an entry, returning the previous value.
    pub(super) fn map_put(&mut self, id: ObjectId, key: Value, value: Value) -> EvalResult {
        let entries = self.map_entries(id).unwrap_or_default();
        let at = self.find_key(&entries, &key)?;
        let Object::Map { entries, read_only } = self.heap.get_mut(id) else {
            return Err(EvalError::Unsupported("not a map".into()));
        };
        if *read_only {
            return Err(Self::read_only_error());
        }
        Ok(match at {
            Some(i) => std::mem::replace(&mut entries[i].1, value),
            None => {
                entries.push((key, value));
                Value::Null
            }
        })
    }

    pub(super) fn contains(&mut self, items: &[Value], value: &Value) -> EvalResult<bool> {
        for item in items {
            if self.equals(item, value)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// `items` without repeats, first occurrence kept.
    pub(super) fn distinct(&mut self, items: Vec<Value>) -> EvalResult<Vec<Value>> {
        let mut out: Vec<Value> = Vec::with_capacity(items.len());
        for item in items {
            if !self.contains(&out, &item)? {
                out.push(item);
            }
        }
        Ok(out)
    }

    fn index_get(&mut self, receiver: &Value, index: &Value) -> EvalResult {
        let Value::Ref(id) = receiver else {
            return match (receiver, index) {
                (Value::Null, _) => Err(EvalError::null_pointer("Cannot get index on null object")),
                (Value::Str(s), Value::Int(i)) => {
                    let chars: Vec<char> = s.chars().collect();
                    let at = normalize_index(*i, chars.len()).ok_or_else(|| {
                        EvalError::thrown("java.lang.StringIndexOutOfBoundsException", i.to_string())
                    })?;
                    Ok(Value::Str(chars[at].to_string()))
                }
                _ => Err(EvalError::Unsupported(format!(
                    "cannot index {}",
                    self.runtime_class(receiver)
                ))),
            };
        };
        match self.heap.get(*id).clone() {
            Object::Map { .. } => self.map_get(*id, index),
            Object::List { items, .. } | Object::Set { items, .. } => {
                let i = index_of(index)?;
                Ok(normalize_index(i, items.len())
                    .map(|at| items[at].clone())
                    .unwrap_or(Value::Null))
            }
            Object::Array { items, .. } => {
                let i = index_of(index)?;
                let at = normalize_index(i, items.len()).ok_or_else(|| {
                    EvalError::thrown(
                        "java.lang.ArrayIndexOutOfBoundsException",
                        format!("Index {} out of bounds for length {}", i, items.len()),
                    )
                })?;
                Ok(items[at].clone())
            }
            _ => self.call(receiver, "getAt", vec![index.clone()]),
        }
    }

    fn index_set(&mut self, receiver: &Value, index: &Value, value: Value) -> EvalResult<()> {
        let Value::Ref(id) = receiver else {
            return Err(EvalError::null_pointer("Cannot set index on null object"));
        };
        if matches!(self.heap.get(*id), Object::Map { .. }) {
            return self.map_put(*id, index.clone(), value).map(|_| ());
        }
        let i = index_of(index)?;
        match self.heap.get_mut(*id) {
            Object::List { items, read_only } => {
                if *read_only {
                    return Err(Self::read_only_error());
                }
                let at = if i < 0 {
                    normalize_index(i, items.len()).ok_or_else(|| {
                        EvalError::thrown("java.lang.IndexOutOfBoundsException", i.to_string())
                    })?
                } else {
                    i as usize
                };
                if at >= items.len() {
                    items.resize(at + 1, Value::Null);
                }
                items[at] = value;
                Ok(())
            }
            Object::Array { items, .. } => {
                let len = items.len();
                let at = normalize_index(i, len).ok_or_else(|| {
                    EvalError::thrown(
                        "java.lang.ArrayIndexOutOfBoundsException",
                        format!("Index {} out of bounds for length {}", i, len),
                    )
                })?;
                items[at] = value;
                Ok(())
            }
            _ => self
                .call(receiver, "putAt", vec![index.clone(), value])
                .map(|_| ()),
        }
    }

    // ========================================================================
    // VALUE SEMANTICS
    // ========================================================================

    /// Groovy truth.
    pub fn truthy(&self, value: &Value) -> bool {
        match value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Class(_) | Value::Closure(_) => true,
            Value::Ref(id) => match self.heap.get(*id) {
                Object::List { items, .. }
                | Object::Set { items, .. }
                | Object::Array { items, .. } => !items.is_empty(),
                Object::Map { entries, .. } => !entries.is_empty(),
                Object::StringBuilder(s) => !s.is_empty(),
                _ => true,
            },
        }
    }

    /// Groovy `==`: user `equals` for instances, structural for collections.
    pub fn equals(&mut self, left: &Value, right: &Value) -> EvalResult<bool> {
        Ok(match (left, right) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(a), Value::Float(b)) => (*a as f64) == *b,
            (Value::Float(a), Value::Int(b)) => *a == (*b as f64),
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Class(a), Value::Class(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) if a == b => true,
            (Value::Ref(id), _) => self.object_equals(*id, right)?,
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            _ => false,
        })
    }

    fn object_equals(&mut self, id: ObjectId, other: &Value) -> EvalResult<bool> {
        let Value::Ref(other_id) = other else {
            if let Object::StringBuilder(s) = self.heap.get(id) {
                return Ok(other.as_str() == Some(s.as_str()));
            }
            return Ok(false);
        };
        match (self.heap.get(id).clone(), self.heap.get(*other_id).clone()) {
            (Object::Instance { class, .. }, _) => {
                let args = vec![other.clone()];
                match self.find_method(class, "equals", &args, false) {
                    Some(m) => {
                        let result = self.invoke(m, Some(id), args)?;
                        Ok(self.truthy(&result))
                    }
                    None => Ok(false),
                }
            }
            (Object::List { items: a, .. }, Object::List { items: b, .. })
            | (Object::Array { items: a, .. }, Object::Array { items: b, .. }) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(&b) {
                    if !self.equals(x, y)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Object::Set { items: a, .. }, Object::Set { items: b, .. }) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for x in &a {
                    if !self.contains(&b, x)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Object::Map { entries: a, .. }, Object::Map { entries: b, .. }) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (key, value) in &a {
                    match self.find_key(&b, key)? {
                        Some(i) if self.equals(value, &b[i].1)? => {}
                        _ => return Ok(false),
                    }
                }
                Ok(true)
            }
            (Object::Date(a), Object::Date(b)) => Ok(a == b),
            _ => Ok(false),
        }
    }

    /// `hashCode()` with Java's results for library values.
    pub fn hash_code(&mut self, value: &Value) -> EvalResult<i32> {
        Ok(match value {
            Value::Null => 0,
            Value::Bool(true) => 1231,
            Value::Bool(false) => 1237,
            Value::Int(i) => int_hash(*i),
            Value::Float(f) => {
                let bits = f.to_bits();
                (bits ^ (bits >> 32)) as i32
            }
            Value::Str(s) | Value::Class(s) => string_hash(s),
            Value::Closure(c) => (Rc::as_ptr(c) as usize as u32 >> 3) as i32,
            Value::Ref(id) => match self.heap.get(*id).clone() {
                Object::Instance { class, .. } => match self.find_method(class, "hashCode", &[], false) {
                    Some(m) => {
                        let result = self.invoke(m, Some(*id), Vec::new())?;
                        result.as_int().map(|i| i as i32).unwrap_or(0)
                    }
                    None => identity_hash(*id),
                },
                Object::List { items, .. } | Object::Array { items, .. } => {
                    let mut hash = 1i32;
                    for item in &items {
                        hash = hash.wrapping_mul(31).wrapping_add(self.hash_code(item)?);
                    }
                    hash
                }
                Object::Set { items, .. } => {
                    let mut hash = 0i32;
                    for item in &items {
                        hash = hash.wrapping_add(self.hash_code(item)?);
                    }
                    hash
                }
                Object::Map { entries, .. } => {
                    let mut hash = 0i32;
                    for (key, value) in &entries {
                        hash = hash.wrapping_add(self.hash_code(key)? ^ self.hash_code(value)?);
                    }
                    hash
                }
                Object::Date(ms) => int_hash_long(ms),
                _ => identity_hash(*id),
            },
        })
    }

    /// `toString()` in Groovy's formatting.
    pub fn display(&mut self, value: &Value) -> EvalResult<String> {
        Ok(match value {
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => s.clone(),
            Value::Class(name) => format!("class {}", name),
            Value::Closure(_) => "Closure".into(),
            Value::Ref(id) => match self.heap.get(*id).clone() {
                Object::Instance { class, .. } => match self.find_method(class, "toString", &[], false) {
                    Some(m) => {
                        let result = self.invoke(m, Some(*id), Vec::new())?;
                        self.display(&result)?
                    }
                    None => format!("{}@{:x}", self.ast.class(class).name, identity_hash(*id)),
                },
                Object::List { items, .. }
                | Object::Set { items, .. }
                | Object::Array { items, .. } => {
                    let mut parts = Vec::with_capacity(items.len());
                    for item in &items {
                        parts.push(self.display(item)?);
                    }
                    format!("[{}]", parts.join(", "))
                }
                Object::Map { entries, .. } => {
                    if entries.is_empty() {
                        "[:]".into()
                    } else {
                        let mut parts = Vec::with_capacity(entries.len());
                        for (key, value) in &entries {
                            parts.push(format!("{}:{}", self.display(key)?, self.display(value)?));
                        }
                        format!("[{}]", parts.join(", "))
                    }
                }
                Object::StringBuilder(s) => s,
                Object::Date(ms) => ms.to_string(),
                Object::Throwable { class, message } => match message {
                    Some(message) => format!("{}: {}", class, message),
                    None => class,
                },
                Object::Thread => "Thread[main,5,main]".into(),
                other => format!("{}@{:x}", other.class_name(self.ast), identity_hash(*id)),
            },
        })
    }

    /// Natural ordering; `null` sorts first.
    pub fn compare(&mut self, left: &Value, right: &Value) -> EvalResult<Ordering> {
        Ok(match (left, right) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                let (a, b) = (as_float(left), as_float(right));
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
            (Value::Str(a), Value::Str(b)) => compare_utf16(a, b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Class(a), Value::Class(b)) => a.cmp(b),
            (Value::Ref(id), _) => match self.heap.get(*id).clone() {
                Object::Date(a) => match right.as_object().map(|r| self.heap.get(r)) {
                    Some(Object::Date(b)) => a.cmp(b),
                    _ => return Err(self.incomparable(left, right)),
                },
                Object::Instance { class, .. } => {
                    let args = vec![right.clone()];
                    let Some(m) = self.find_method(class, "compareTo", &args, false) else {
                        return Err(self.incomparable(left, right));
                    };
                    let result = self.invoke(m, Some(*id), args)?;
                    result.as_int().unwrap_or(0).cmp(&0)
                }
                _ => return Err(self.incomparable(left, right)),
            },
            _ => return Err(self.incomparable(left, right)),
        })
    }

    fn incomparable(&self, left: &Value, right: &Value) -> EvalError {
        EvalError::thrown(
            "java.lang.IllegalArgumentException",
            format!(
                "Cannot compare {} with {}",
                self.runtime_class(left),
                self.runtime_class(right)
            ),
        )
    }

    fn throwable(&mut self, value: Value) -> EvalError {
        match &value {
            Value::Ref(id) => match self.heap.get(*id) {
                Object::Throwable { class, message } => EvalError::Thrown {
                    class: class.clone(),
                    message: message.clone().unwrap_or_default(),
                },
                other => EvalError::thrown(other.class_name(self.ast), ""),
            },
            Value::Null => EvalError::null_pointer("Cannot throw null"),
            other => EvalError::Unsupported(format!("cannot throw {}", self.runtime_class(other))),
        }
    }

    // ========================================================================
    // STATEMENTS
    // ========================================================================

    fn exec(&mut self, stmt: &Stmt, frame: &mut Frame) -> EvalResult<Flow> {
        match stmt {
            Stmt::Block(stmts) => {
                for stmt in stmts {
                    let flow = self.exec(stmt, frame)?;
                    if !matches!(flow, Flow::Normal) {
                        return Ok(flow);
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Expr(expr) => {
                self.eval(expr, frame)?;
                Ok(Flow::Normal)
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, frame)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.eval(cond, frame)?;
                if self.truthy(&cond) {
                    self.exec(then, frame)
                } else if let Some(otherwise) = otherwise {
                    self.exec(otherwise, frame)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { cond, body } => {
                loop {
                    let c = self.eval(cond, frame)?;
                    if !self.truthy(&c) {
                        break;
                    }
                    match self.exec(body, frame)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::DoWhile { body, cond } => {
                loop {
                    match self.exec(body, frame)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    let c = self.eval(cond, frame)?;
                    if !self.truthy(&c) {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.eval(init, frame)?;
                }
                loop {
                    if let Some(cond) = cond {
                        let c = self.eval(cond, frame)?;
                        if !self.truthy(&c) {
                            break;
                        }
                    }
                    match self.exec(body, frame)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if let Some(update) = update {
                        self.eval(update, frame)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::ForEach {
                var,
                iterable,
                body,
            } => {
                let iterable = self.eval(iterable, frame)?;
                for item in self.iteration(&iterable)? {
                    frame.vars.insert(var.clone(), item);
                    match self.exec(body, frame)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Throw(expr) => {
                let value = self.eval(expr, frame)?;
                Err(self.throwable(value))
            }
            Stmt::Synchronized { lock, body } => {
                let lock = self.eval(lock, frame)?;
                if lock.is_null() {
                    return Err(EvalError::null_pointer("Cannot synchronize on null"));
                }
                self.exec(body, frame)
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Empty => Ok(Flow::Normal),
        }
    }

    fn iteration(&mut self, iterable: &Value) -> EvalResult<Vec<Value>> {
        match iterable {
            Value::Null => Ok(Vec::new()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            Value::Ref(id) => match self.heap.get(*id) {
                Object::Map { entries, .. } => Ok(entries.iter().map(|(k, _)| k.clone()).collect()),
                other => other.elements().map(<[Value]>::to_vec).ok_or_else(|| {
                    EvalError::Unsupported(format!("cannot iterate over {}", other.class_name(self.ast)))
                }),
            },
            other => Ok(vec![other.clone()]),
        }
    }

    // ========================================================================
    // EXPRESSIONS
    // ========================================================================

    fn eval_args(&mut self, args: &[Expr], frame: &mut Frame) -> EvalResult<Vec<Value>> {
        args.iter().map(|a| self.eval(a, frame)).collect()
    }

    fn eval(&mut self, expr: &Expr, frame: &mut Frame) -> EvalResult {
        match expr {
            Expr::Constant(c) => Ok(constant(c)),
            Expr::This | Expr::Super => frame
                .this
                .map(Value::Ref)
                .ok_or_else(|| EvalError::Unsupported("`this` in a static context".into())),
            Expr::Var(name) => self.read_var(name, frame),
            Expr::ClassLit(ty) => Ok(Value::Class(self.class_name(&ty.name))),
            Expr::Field { receiver, name } => {
                let receiver = self.eval(receiver, frame)?;
                self.read_field(&receiver, name)
            }
            Expr::Property {
                receiver: receiver_expr,
                name,
                safe,
            } => {
                let receiver = self.eval(receiver_expr, frame)?;
                if receiver.is_null() && *safe {
                    return Ok(Value::Null);
                }
                // Inside the class, `this.name` is the field itself.
                if receiver_expr.is_this() {
                    if let Some(value) = frame.this.and_then(|id| self.instance_field(id, name)) {
                        return Ok(value);
                    }
                }
                self.get_property(&receiver, name)
            }
            Expr::Call {
                receiver,
                method,
                args,
                implicit_this,
                safe,
            } => self.eval_call(receiver, method, args, *implicit_this, *safe, frame),
            Expr::StaticCall {
                owner,
                method,
                args,
            } => {
                let args = self.eval_args(args, frame)?;
                self.call_static(&owner.name, method, args)
            }
            Expr::New { ty, args } => {
                let args = self.eval_args(args, frame)?;
                match self.unit_class(&ty.name) {
                    Some(class) => self.construct(class, args),
                    None => library::new_object(self, ty, args),
                }
            }
            Expr::NewArray { element, items } => {
                let items = self.eval_args(items, frame)?;
                Ok(self.heap.alloc(Object::Array {
                    element: element.clone(),
                    items,
                }))
            }
            Expr::CtorCall { .. } => Err(EvalError::Unsupported(
                "constructor call outside the first statement of a constructor".into(),
            )),
            Expr::Binary { op, left, right } => match op {
                BinaryOp::And => {
                    let l = self.eval(left, frame)?;
                    if !self.truthy(&l) {
                        return Ok(Value::Bool(false));
                    }
                    let r = self.eval(right, frame)?;
                    Ok(Value::Bool(self.truthy(&r)))
                }
                BinaryOp::Or => {
                    let l = self.eval(left, frame)?;
                    if self.truthy(&l) {
                        return Ok(Value::Bool(true));
                    }
                    let r = self.eval(right, frame)?;
                    Ok(Value::Bool(self.truthy(&r)))
                }
                _ => {
                    let l = self.eval(left, frame)?;
                    let r = self.eval(right, frame)?;
                    self.binary(*op, &l, &r)
                }
            },
            Expr::Not(inner) => {
                let value = self.eval(inner, frame)?;
                Ok(Value::Bool(!self.truthy(&value)))
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                let c = self.eval(cond, frame)?;
                if self.truthy(&c) {
                    self.eval(then, frame)
                } else {
                    self.eval(otherwise, frame)
                }
            }
            Expr::Cast { ty, expr } => {
                let value = self.eval(expr, frame)?;
                self.cast(ty, value)
            }
            Expr::InstanceOf { expr, ty } => {
                let value = self.eval(expr, frame)?;
                Ok(Value::Bool(self.instance_of(&value, ty)))
            }
            Expr::List(items) => {
                let items = self.eval_args(items, frame)?;
                Ok(self.list(items))
            }
            Expr::Map(entries) => {
                let mut pairs = Vec::with_capacity(entries.len());
                for entry in entries {
                    let key = self.eval(&entry.key, frame)?;
                    let value = self.eval(&entry.value, frame)?;
                    pairs.push((key, value));
                }
                self.map(pairs)
            }
            Expr::Index { receiver, index } => {
                let receiver = self.eval(receiver, frame)?;
                let index = self.eval(index, frame)?;
                self.index_get(&receiver, &index)
            }
            Expr::Assign { target, value } => {
                let value = self.eval(value, frame)?;
                self.assign(target, value.clone(), frame)?;
                Ok(value)
            }
            Expr::Declare { ty, name, init } => {
                let value = match init {
                    Some(init) => self.eval(init, frame)?,
                    None => default_value(ty),
                };
                frame.vars.insert(name.clone(), value.clone());
                Ok(value)
            }
            Expr::Closure { params, body } => Ok(Value::Closure(Rc::new(Closure {
                params: params.clone(),
                body: (**body).clone(),
                captured: frame.vars.clone(),
                this: frame.this,
                class: frame.class,
            }))),
        }
    }

    /// Locals, then fields of `this`, then static fields, then class names.
    fn read_var(&mut self, name: &str, frame: &mut Frame) -> EvalResult {
        if let Some(value) = frame.vars.get(name) {
            return Ok(value.clone());
        }
        if let Some(value) = frame.this.and_then(|id| self.instance_field(id, name)) {
            return Ok(value);
        }
        if let Some(class) = frame.class {
            if let Some(owner) = self.static_owner(class, name)? {
                if let Some(value) = self.statics.get(&owner).and_then(|s| s.get(name)) {
                    return Ok(value.clone());
                }
            }
        }
        if let Some(class) = self.unit_class(name) {
            return Ok(Value::Class(self.ast.class(class).name.clone()));
        }
        if qualify(name) != name {
            return Ok(Value::Class(qualify(name).to_string()));
        }
        Err(EvalError::UnknownVariable(name.to_string()))
    }

    fn assign(&mut self, target: &Expr, value: Value, frame: &mut Frame) -> EvalResult<()> {
        match target {
            Expr::Var(name) => {
                if frame.vars.contains_key(name) {
                    frame.vars.insert(name.clone(), value);
                    return Ok(());
                }
                if let Some(id) = frame.this {
                    if self.write_instance_field(id, name, value.clone()) {
                        return Ok(());
                    }
                }
                if let Some(class) = frame.class {
                    if let Some(owner) = self.static_owner(class, name)? {
                        if let Some(slots) = self.statics.get_mut(&owner) {
                            slots.insert(name.clone(), value);
                        }
                        return Ok(());
                    }
                }
                frame.vars.insert(name.clone(), value);
                Ok(())
            }
            Expr::Field { receiver, name } => {
                let receiver = self.eval(receiver, frame)?;
                self.write_field(&receiver, name, value)
            }
            Expr::Property {
                receiver: receiver_expr,
                name,
                ..
            } => {
                if receiver_expr.is_this() {
                    if let Some(id) = frame.this {
                        if self.write_instance_field(id, name, value.clone()) {
                            return Ok(());
                        }
                    }
                }
                let receiver = self.eval(receiver_expr, frame)?;
                self.set_property(&receiver, name, value)
            }
            Expr::Index { receiver, index } => {
                let receiver = self.eval(receiver, frame)?;
                let index = self.eval(index, frame)?;
                self.index_set(&receiver, &index, value)
            }
            other => Err(EvalError::Unsupported(format!(
                "cannot assign to {:?}",
                other
            ))),
        }
    }

    fn eval_call(
        &mut self,
        receiver: &Expr,
        method: &str,
        args: &[Expr],
        implicit_this: bool,
        safe: bool,
        frame: &mut Frame,
    ) -> EvalResult {
        if matches!(receiver, Expr::Super) {
            let args = self.eval_args(args, frame)?;
            return self.call_super(method, args, frame);
        }
        if implicit_this {
            if let Some(Value::Closure(closure)) = frame.vars.get(method).cloned() {
                let args = self.eval_args(args, frame)?;
                return self.call_closure(&closure, args);
            }
            if frame.this.is_none() {
                let class = frame.class.ok_or_else(|| {
                    EvalError::Unsupported(format!("call to {}() without a receiver", method))
                })?;
                let args = self.eval_args(args, frame)?;
                return self.call_static_in(class, method, args);
            }
        }
        let target = self.eval(receiver, frame)?;
        if target.is_null() && safe {
            return Ok(Value::Null);
        }
        let args = self.eval_args(args, frame)?;
        self.call(&target, method, args)
    }

    fn binary(&mut self, op: BinaryOp, left: &Value, right: &Value) -> EvalResult {
        Ok(match op {
            BinaryOp::Eq => Value::Bool(self.equals(left, right)?),
            BinaryOp::Ne => Value::Bool(!self.equals(left, right)?),
            BinaryOp::Is => Value::Bool(left.identical(right)),
            BinaryOp::Lt => Value::Bool(self.compare(left, right)?.is_lt()),
            BinaryOp::Le => Value::Bool(self.compare(left, right)?.is_le()),
            BinaryOp::Gt => Value::Bool(self.compare(left, right)?.is_gt()),
            BinaryOp::Ge => Value::Bool(self.compare(left, right)?.is_ge()),
            BinaryOp::Cmp => Value::Int(match self.compare(left, right)? {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            }),
            BinaryOp::And => Value::Bool(self.truthy(left) && self.truthy(right)),
            BinaryOp::Or => Value::Bool(self.truthy(left) || self.truthy(right)),
            BinaryOp::Add => self.add(left, right)?,
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                arithmetic(op, left, right)?
            }
        })
    }

    fn add(&mut self, left: &Value, right: &Value) -> EvalResult {
        if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) {
            let text = format!("{}{}", self.display(left)?, self.display(right)?);
            return Ok(Value::Str(text));
        }
        if let Some(items) = self.elements(left) {
            let mut items = items;
            match self.elements(right) {
                Some(more) => items.extend(more),
                None => items.push(right.clone()),
            }
            return Ok(self.list(items));
        }
        arithmetic(BinaryOp::Add, left, right)
    }

    fn cast(&mut self, ty: &TypeRef, value: Value) -> EvalResult {
        if value.is_null() {
            return Ok(value);
        }
        if ty.is_primitive() {
            return Ok(match (ty.name.as_str(), &value) {
                ("boolean", _) => Value::Bool(self.truthy(&value)),
                ("int" | "long" | "short" | "byte", Value::Float(f)) => Value::Int(*f as i64),
                ("float" | "double", Value::Int(i)) => Value::Float(*i as f64),
                _ => value,
            });
        }
        if self.unit_class(&ty.name).is_some() && !self.instance_of(&value, ty) {
            return Err(EvalError::thrown(
                "org.codehaus.groovy.runtime.typehandling.GroovyCastException",
                format!(
                    "Cannot cast object with class '{}' to class '{}'",
                    self.runtime_class(&value),
                    ty.name
                ),
            ));
        }
        Ok(value)
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn constant(c: &Constant) -> Value {
    match c {
        Constant::Null => Value::Null,
        Constant::Bool(b) => Value::Bool(*b),
        Constant::Int(i) => Value::Int(*i),
        Constant::Float(f) => Value::Float(*f),
        Constant::Str(s) => Value::Str(s.clone()),
    }
}

fn default_value(ty: &TypeRef) -> Value {
    if !ty.is_primitive() {
        return Value::Null;
    }
    match ty.name.as_str() {
        "boolean" => Value::Bool(false),
        "float" | "double" => Value::Float(0.0),
        _ => Value::Int(0),
    }
}

pub(super) fn identity_hash(id: ObjectId) -> i32 {
    ((id as u32).wrapping_add(1).wrapping_mul(0x9E37_79B1) & 0x7fff_ffff) as i32
}

fn int_hash_long(v: i64) -> i32 {
    (v ^ ((v as u64) >> 32) as i64) as i32
}

fn as_float(value: &Value) -> f64 {
    match value {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        _ => 0.0,
    }
}

/// `String.compareTo`: by UTF-16 code unit.
fn compare_utf16(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e7 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

fn index_of(index: &Value) -> EvalResult<i64> {
    index
        .as_int()
        .ok_or_else(|| EvalError::Unsupported("index must be an integer".into()))
}

/// Resolves a possibly negative index against `len`.
fn normalize_index(i: i64, len: usize) -> Option<usize> {
    let at = if i < 0 { len as i64 + i } else { i };
    (0..len as i64).contains(&at).then_some(at as usize)
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> EvalResult {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            if matches!(op, BinaryOp::Div | BinaryOp::Mod) && b == 0 {
                return Err(EvalError::thrown("java.lang.ArithmeticException", "Division by zero"));
            }
            Ok(Value::Int(match op {
                BinaryOp::Add => a.wrapping_add(b),
                BinaryOp::Sub => a.wrapping_sub(b),
                BinaryOp::Mul => a.wrapping_mul(b),
                BinaryOp::Div => a.wrapping_div(b),
                _ => a.wrapping_rem(b),
            }))
        }
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (a, b) = (as_float(left), as_float(right));
            Ok(Value::Float(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => a % b,
            }))
        }
        _ => Err(EvalError::Unsupported(format!(
            "operator {} does not apply to these operands",
            op.symbol()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ClassNode, MethodNode, Modifiers};
    use crate::transform::synth::*;

    fn counter_class(ast: &mut Ast) -> ClassId {
        let module = ast.add_module("M", None);
        let class = ast.add_class(module, ClassNode::new("Counter", Modifiers::PUBLIC));
        ast.add_property(class, "count", Modifiers::NONE, TypeRef::int(), Some(int(0)));
        ast.add_method(
            class,
            MethodNode::method(
                "bump",
                Modifiers::PUBLIC,
                TypeRef::int(),
                vec![param("by", TypeRef::int()).with_default(int(1))],
                Stmt::block(vec![
                    assign(
                        this_field("count"),
                        binary(BinaryOp::Add, this_field("count"), var("by")),
                    ),
                    ret(this_field("count")),
                ]),
            ),
        );
        class
    }

    #[test]
    fn methods_use_defaults_and_fields() {
        let mut ast = Ast::new();
        counter_class(&mut ast);
        let mut interp = Interpreter::new(&ast);
        let counter = interp.instantiate("Counter", vec![]).unwrap();
        interp.call(&counter, "bump", vec![]).unwrap();
        let count = interp.call(&counter, "bump", vec![Value::Int(5)]).unwrap();
        assert_eq!(count.as_int(), Some(6));
        assert_eq!(interp.get_property(&counter, "count").unwrap().as_int(), Some(6));
    }

    #[test]
    fn recursion_is_bounded() {
        let mut ast = Ast::new();
        let class = counter_class(&mut ast);
        ast.add_method(
            class,
            MethodNode::method(
                "forever",
                Modifiers::PUBLIC,
                TypeRef::int(),
                vec![],
                Stmt::block(vec![ret(call_this("forever", vec![]))]),
            ),
        );
        let config = CompilerConfiguration {
            max_eval_depth: 16,
            ..CompilerConfiguration::default()
        };
        let mut interp = Interpreter::with_config(&ast, &config);
        let counter = interp.instantiate("Counter", vec![]).unwrap();
        assert_eq!(
            interp.call(&counter, "forever", vec![]).unwrap_err(),
            EvalError::DepthExceeded(16)
        );
    }

    #[test]
    fn thrown_exceptions_carry_class_and_message() {
        let ast = Ast::new();
        let mut interp = Interpreter::new(&ast);
        let body = Stmt::block(vec![throw_new(
            "java.lang.IllegalStateException",
            string("boom"),
        )]);
        let closure = Expr::Closure {
            params: vec![],
            body: Box::new(body),
        };
        let closure = interp.evaluate(&closure).unwrap();
        let err = interp.call(&closure, "call", vec![]).unwrap_err();
        assert!(err.is_thrown("IllegalStateException"));
        assert_eq!(err.to_string(), "java.lang.IllegalStateException: boom");
    }

    #[test]
    fn groovy_equality_and_display_of_collections() {
        let ast = Ast::new();
        let mut interp = Interpreter::new(&ast);
        let a = interp.evaluate(&Expr::List(vec![int(1), string("x")])).unwrap();
        let b = interp.evaluate(&Expr::List(vec![int(1), string("x")])).unwrap();
        assert!(interp.equals(&a, &b).unwrap());
        assert!(!a.identical(&b));
        assert_eq!(interp.hash_code(&a).unwrap(), interp.hash_code(&b).unwrap());
        assert_eq!(interp.display(&a).unwrap(), "[1, x]");
        let map = interp
            .map(vec![(Value::string("a"), Value::Int(1))])
            .unwrap();
        assert_eq!(interp.display(&map).unwrap(), "[a:1]");
        assert_eq!(interp.get_property(&map, "a").unwrap().as_int(), Some(1));
    }

    #[test]
    fn static_initializers_run_once() {
        let mut ast = Ast::new();
        let class = counter_class(&mut ast);
        ast.add_field(
            class,
            FieldNode {
                name: "created".into(),
                modifiers: Modifiers::PRIVATE | Modifiers::STATIC,
                ty: TypeRef::int(),
                init: Some(int(10)),
                annotations: Vec::new(),
                owner: class,
                pos: Default::default(),
            },
        );
        ast.class_mut(class).object_initializers.push(assign(
            var("created"),
            binary(BinaryOp::Add, var("created"), int(1)),
        ));
        let mut interp = Interpreter::new(&ast);
        interp.instantiate("Counter", vec![]).unwrap();
        interp.instantiate("Counter", vec![]).unwrap();
        assert_eq!(
            interp.static_field("Counter", "created").unwrap().as_int(),
            Some(12)
        );
    }
}
