//! Pure AST builders shared by the built-in transformations.
//!
//! Nothing here touches the arena; callers attach what they build.

use crate::ast::types::capitalize;
use crate::ast::{BinaryOp, Constant, CtorKind, Expr, Parameter, Stmt, TypeRef};

// ============================================================================
// EXPRESSIONS
// ============================================================================

pub fn var(name: &str) -> Expr {
    Expr::Var(name.to_string())
}

pub fn string(value: &str) -> Expr {
    Expr::Constant(Constant::Str(value.to_string()))
}

pub fn int(value: i64) -> Expr {
    Expr::Constant(Constant::Int(value))
}

pub fn boolean(value: bool) -> Expr {
    Expr::Constant(Constant::Bool(value))
}

pub fn null() -> Expr {
    Expr::Constant(Constant::Null)
}

/// `receiver.@name`
pub fn field(receiver: Expr, name: &str) -> Expr {
    Expr::Field {
        receiver: Box::new(receiver),
        name: name.to_string(),
    }
}

/// `this.@name`
pub fn this_field(name: &str) -> Expr {
    field(Expr::This, name)
}

/// `receiver.name`
pub fn prop(receiver: Expr, name: &str) -> Expr {
    Expr::Property {
        receiver: Box::new(receiver),
        name: name.to_string(),
        safe: false,
    }
}

pub fn call(receiver: Expr, method: &str, args: Vec<Expr>) -> Expr {
    Expr::Call {
        receiver: Box::new(receiver),
        method: method.to_string(),
        args,
        implicit_this: false,
        safe: false,
    }
}

/// `method(args)` on the implicit receiver.
pub fn call_this(method: &str, args: Vec<Expr>) -> Expr {
    Expr::Call {
        receiver: Box::new(Expr::This),
        method: method.to_string(),
        args,
        implicit_this: true,
        safe: false,
    }
}

pub fn static_call(owner: &str, method: &str, args: Vec<Expr>) -> Expr {
    Expr::StaticCall {
        owner: TypeRef::new(owner),
        method: method.to_string(),
        args,
    }
}

pub fn new_instance(ty: TypeRef, args: Vec<Expr>) -> Expr {
    Expr::New { ty, args }
}

pub fn ctor_call(kind: CtorKind, args: Vec<Expr>) -> Expr {
    Expr::CtorCall { kind, args }
}

pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

pub fn not(expr: Expr) -> Expr {
    Expr::Not(Box::new(expr))
}

pub fn and(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::And, left, right)
}

pub fn or(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Or, left, right)
}

/// `left is right`
pub fn identical(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Is, left, right)
}

/// `left == right`
pub fn equal(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Eq, left, right)
}

pub fn is_null(expr: Expr) -> Expr {
    equal(expr, null())
}

pub fn not_null(expr: Expr) -> Expr {
    binary(BinaryOp::Ne, expr, null())
}

pub fn cast(ty: TypeRef, expr: Expr) -> Expr {
    Expr::Cast {
        ty,
        expr: Box::new(expr),
    }
}

pub fn instance_of(expr: Expr, ty: TypeRef) -> Expr {
    Expr::InstanceOf {
        expr: Box::new(expr),
        ty,
    }
}

pub fn ternary(cond: Expr, then: Expr, otherwise: Expr) -> Expr {
    Expr::Ternary {
        cond: Box::new(cond),
        then: Box::new(then),
        otherwise: Box::new(otherwise),
    }
}

pub fn assign_expr(target: Expr, value: Expr) -> Expr {
    Expr::Assign {
        target: Box::new(target),
        value: Box::new(value),
    }
}

// ============================================================================
// PROPERTY COMPARISONS
// ============================================================================

/// `this.name` and `other.name` for a compared member. Fields that back no
/// property are read directly.
pub fn member_pair(name: &str, other: &str, direct: bool) -> (Expr, Expr) {
    if direct {
        (this_field(name), field(var(other), name))
    } else {
        (prop(Expr::This, name), prop(var(other), name))
    }
}

/// `!(a == b)`
pub fn differs(a: Expr, b: Expr) -> Expr {
    not(equal(a, b))
}

/// True when exactly one side refers to its own owner.
pub fn differs_in_self_reference(this_side: Expr, other_side: Expr, other: &str) -> Expr {
    let this_self = identical(this_side, Expr::This);
    let other_self = identical(other_side, var(other));
    or(
        and(this_self.clone(), not(other_self.clone())),
        and(not(this_self), other_self),
    )
}

/// True when both sides refer to their own owner.
pub fn both_self_references(this_side: Expr, other_side: Expr, other: &str) -> Expr {
    and(
        identical(this_side, Expr::This),
        identical(other_side, var(other)),
    )
}

// ============================================================================
// STATEMENTS
// ============================================================================

pub fn expr(expr: Expr) -> Stmt {
    Stmt::Expr(expr)
}

pub fn assign(target: Expr, value: Expr) -> Stmt {
    Stmt::Expr(assign_expr(target, value))
}

/// `if (value != null) target = value`
pub fn assign_if_not_null(target: Expr, value: Expr) -> Stmt {
    if_then(not_null(value.clone()), assign(target, value))
}

pub fn declare(ty: TypeRef, name: &str, init: Expr) -> Stmt {
    Stmt::Expr(Expr::Declare {
        ty,
        name: name.to_string(),
        init: Some(Box::new(init)),
    })
}

pub fn ret(expr: Expr) -> Stmt {
    Stmt::Return(Some(expr))
}

pub fn if_then(cond: Expr, then: Stmt) -> Stmt {
    Stmt::If {
        cond,
        then: Box::new(then),
        otherwise: None,
    }
}

pub fn if_else(cond: Expr, then: Stmt, otherwise: Stmt) -> Stmt {
    Stmt::If {
        cond,
        then: Box::new(then),
        otherwise: Some(Box::new(otherwise)),
    }
}

/// `throw new <exception>(message)`
pub fn throw_new(exception: &str, message: Expr) -> Stmt {
    Stmt::Throw(new_instance(TypeRef::new(exception), vec![message]))
}

/// `if (cond) return value`
pub fn return_if(cond: Expr, value: Expr) -> Stmt {
    if_then(cond, ret(value))
}

// ============================================================================
// MEMBER BODIES
// ============================================================================

pub fn getter_name(name: &str, ty: &TypeRef) -> String {
    format!("{}{}", ty.getter_prefix(), capitalize(name))
}

pub fn setter_name(name: &str) -> String {
    format!("set{}", capitalize(name))
}

pub fn param(name: &str, ty: TypeRef) -> Parameter {
    Parameter::new(name, ty)
}

/// `return this.@name`
pub fn getter_body(name: &str) -> Stmt {
    Stmt::block(vec![ret(this_field(name))])
}

/// `this.@name = value`
pub fn setter_body(name: &str, value: &str) -> Stmt {
    Stmt::block(vec![assign(this_field(name), var(value))])
}

/// `this.@name = from.@name`
pub fn copy_field(name: &str, from: Expr) -> Stmt {
    assign(this_field(name), field(from, name))
}

/// Assigns a member from a named-argument map, falling back to its declared
/// initializer. Without an initializer the member is left unset.
pub fn assign_from_args(args: &str, name: &str, initializer: Option<Expr>) -> Stmt {
    let has_key = call(var(args), "containsKey", vec![string(name)]);
    let from_map = assign(this_field(name), prop(var(args), name));
    match initializer {
        Some(init) => if_else(has_key, from_map, assign(this_field(name), init)),
        None => if_then(has_key, from_map),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::printer::print_stmt;

    #[test]
    fn map_assignment_falls_back_to_initializer() {
        let stmt = assign_from_args("args", "age", Some(int(3)));
        assert_eq!(
            print_stmt(&stmt),
            "if (args.containsKey('age')) {\n    this.@age = args.age\n} else {\n    this.@age = 3\n}\n"
        );
    }

    #[test]
    fn accessor_names_follow_type() {
        assert_eq!(getter_name("done", &TypeRef::boolean()), "isDone");
        assert_eq!(getter_name("name", &TypeRef::string()), "getName");
        assert_eq!(setter_name("name"), "setName");
    }
}
