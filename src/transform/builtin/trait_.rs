//! Traits: flattening a `@Trait` class into an interface plus helper classes,
//! and composing flattened traits into the classes that implement them.
//!
//! A trait `T` becomes:
//! - the interface `T`, holding abstract declarations of its public methods;
//! - `T$Trait$Helper`, an abstract class with one static method per concrete
//!   trait method, taking the receiver as its first parameter `$self`
//!   (`$static$self` for static methods), plus `$init$` and `$static$init$`
//!   holding the field initializers;
//! - `T$Trait$FieldHelper`, an interface with `pkg_T__f$get()` and
//!   `pkg_T__f$set(v)` accessors for every trait field, when there are any.
//!
//! Composition then gives each implementing class forwarders to the helper
//! methods, real fields behind the field-helper accessors, and initializer
//! calls into the helper.

use crate::ast::{
    Ast, ClassId, ClassNode, Expr, FieldNode, MethodNode, Modifiers, NodeRef,
    SourcePos, Stmt, TypeRef,
};
use crate::compiler::SourceUnit;
use crate::errors::{ErrorKind, InternalError};
use crate::transform::base::Usage;
use crate::transform::synth::*;
use crate::transform::{names, AstTransformation, TransformContext};
use indexmap::IndexMap;
use std::collections::HashSet;

pub const SELF: &str = "$self";
pub const STATIC_SELF: &str = "$static$self";
pub const INIT_METHOD: &str = "$init$";
pub const STATIC_INIT_METHOD: &str = "$static$init$";
const HELPER_SUFFIX: &str = "$Trait$Helper";
const FIELD_HELPER_SUFFIX: &str = "$Trait$FieldHelper";
const GETTER_SUFFIX: &str = "$get";
const SETTER_SUFFIX: &str = "$set";

pub fn helper_class_name(trait_name: &str) -> String {
    format!("{}{}", trait_name, HELPER_SUFFIX)
}

pub fn field_helper_class_name(trait_name: &str) -> String {
    format!("{}{}", trait_name, FIELD_HELPER_SUFFIX)
}

/// `pkg_T__f`: the name a trait field gets in implementing classes.
pub fn remapped_field_name(trait_node: &ClassNode, field: &str) -> String {
    format!("{}__{}", trait_node.mangled_name(), field)
}

// ============================================================================
// FLATTENING
// ============================================================================

#[derive(Debug, Default)]
pub struct TraitTransformation;

impl AstTransformation for TraitTransformation {
    fn visit(
        &mut self,
        nodes: &[NodeRef],
        cx: &mut TransformContext<'_>,
    ) -> Result<(), InternalError> {
        let usage = Usage::init(cx.ast, nodes, names::TRAIT)?;
        let Some(class) = usage.target_class(cx) else {
            return Ok(());
        };
        if !check_trait(&usage, cx, class) {
            return Ok(());
        }
        replace_extends_by_implements(cx.ast, class);
        flatten(cx.ast, class);
        Ok(())
    }
}

/// Reports every structural problem. Returns whether flattening can go on.
fn check_trait(usage: &Usage, cx: &mut TransformContext<'_>, class: ClassId) -> bool {
    let node = cx.ast.class(class).clone();
    let mut ok = true;

    let inner: Vec<String> = cx
        .ast
        .class_ids()
        .into_iter()
        .filter(|c| cx.ast.class(*c).outer == Some(class))
        .filter(|c| !cx.ast.class(*c).modifiers.is_static())
        .map(|c| cx.ast.class(c).name.clone())
        .collect();
    for name in inner {
        usage.error(
            cx,
            format!("Cannot have non-static inner class inside a trait ({})", name),
        );
        ok = false;
    }

    if !node.constructors.is_empty() {
        usage.error(
            cx,
            format!(
                "Error processing trait '{}'. Constructors are not allowed.",
                node.name
            ),
        );
        ok = false;
    }

    if let Some(sup) = cx.ast.superclass(class) {
        if cx.ast.class(sup).is_interface() && !cx.ast.is_trait(sup) {
            usage.error(
                cx,
                "A trait cannot extend an interface. Use 'implements' instead.",
            );
            ok = false;
        }
    }

    for field in &node.fields {
        let field = cx.ast.field(*field);
        if field.modifiers.is_protected() {
            let message = format!(
                "Cannot have protected field in a trait ({}#{})",
                node.name, field.name
            );
            usage.error(cx, message);
            ok = false;
        }
    }

    for method in &node.methods {
        let method = cx.ast.method(*method);
        let mods = method.modifiers;
        if !mods.is_synthetic() && (mods.is_protected() || mods.is_package_private()) {
            let message = format!(
                "Cannot have protected/package-private method in a trait ({}#{})",
                node.name,
                method.descriptor()
            );
            usage.error(cx, message);
            return false;
        }
    }
    ok
}

fn replace_extends_by_implements(ast: &mut Ast, class: ClassId) {
    let Some(sup) = ast.superclass(class) else {
        return;
    };
    if !ast.is_trait(sup) {
        return;
    }
    let node = ast.class_mut(class);
    if let Some(sup_type) = node.superclass.take() {
        node.interfaces.push(sup_type);
    }
}

/// A trait field as recorded while flattening.
struct TraitField {
    name: String,
    remapped: String,
    ty: TypeRef,
    modifiers: Modifiers,
    init: Option<Expr>,
}

fn flatten(ast: &mut Ast, class: ClassId) {
    let trait_node = ast.class(class).clone();
    let trait_type = trait_node.type_ref();
    ast.class_mut(class).modifiers = Modifiers::PUBLIC | Modifiers::ABSTRACT | Modifiers::INTERFACE;

    let mut helper_node = ClassNode::new(
        helper_class_name(&trait_node.name),
        Modifiers::PUBLIC | Modifiers::STATIC | Modifiers::ABSTRACT | Modifiers::SYNTHETIC,
    );
    helper_node.superclass = Some(TypeRef::object());
    helper_node.outer = Some(class);
    helper_node.pos = trait_node.pos;
    let helper = ast.add_class(trait_node.module, helper_node);
    let helper_type = ast.class(helper).type_ref();

    let fields: Vec<TraitField> = trait_node
        .fields
        .iter()
        .map(|f| ast.field(*f))
        .filter(|f| !(f.modifiers.is_synthetic() && f.name.contains('$')))
        .map(|f| TraitField {
            name: f.name.clone(),
            remapped: remapped_field_name(&trait_node, &f.name),
            ty: f.ty.clone(),
            modifiers: f.modifiers,
            init: f.init.clone(),
        })
        .collect();
    let remapped: IndexMap<String, String> = fields
        .iter()
        .map(|f| (f.name.clone(), f.remapped.clone()))
        .collect();
    let private_methods: HashSet<String> = trait_node
        .methods
        .iter()
        .map(|m| ast.method(*m))
        .filter(|m| m.modifiers.is_private())
        .map(|m| m.name.clone())
        .collect();
    let rewriter = |self_var: &'static str, shadowed: HashSet<String>| ReceiverRewriter {
        self_var,
        helper: helper_type.clone(),
        fields: remapped.clone(),
        private_methods: private_methods.clone(),
        shadowed,
    };

    // Field helper interface and initializers.
    let mut init_body = Vec::new();
    let mut static_init_body = Vec::new();
    if !fields.is_empty() {
        let mut field_helper_node = ClassNode::new(
            field_helper_class_name(&trait_node.name),
            Modifiers::PUBLIC
                | Modifiers::STATIC
                | Modifiers::ABSTRACT
                | Modifiers::INTERFACE
                | Modifiers::SYNTHETIC,
        );
        field_helper_node.outer = Some(class);
        let field_helper = ast.add_class(trait_node.module, field_helper_node);
        for field in &fields {
            let is_static = field.modifiers.is_static();
            let accessor_mods = if is_static {
                Modifiers::PUBLIC | Modifiers::ABSTRACT | Modifiers::STATIC
            } else {
                Modifiers::PUBLIC | Modifiers::ABSTRACT
            };
            ast.add_method(
                field_helper,
                MethodNode::declaration(
                    format!("{}{}", field.remapped, SETTER_SUFFIX),
                    accessor_mods,
                    field.ty.clone(),
                    vec![param("val", field.ty.clone())],
                )
                .generated(),
            );
            ast.add_method(
                field_helper,
                MethodNode::declaration(
                    format!("{}{}", field.remapped, GETTER_SUFFIX),
                    accessor_mods,
                    field.ty.clone(),
                    vec![],
                )
                .generated(),
            );
            // Carries the original modifiers over to implementing classes.
            ast.add_field(
                field_helper,
                FieldNode {
                    name: field.remapped.clone(),
                    modifiers: field.modifiers.with(Modifiers::SYNTHETIC),
                    ty: field.ty.clone(),
                    init: None,
                    annotations: Vec::new(),
                    owner: field_helper,
                    pos: SourcePos::default(),
                },
            );

            if let Some(init) = &field.init {
                let self_var = if is_static { STATIC_SELF } else { SELF };
                let mut value = Stmt::Expr(init.clone());
                rewriter(self_var, HashSet::new()).body(&mut value);
                let Stmt::Expr(value) = value else {
                    continue;
                };
                let set = expr(call(
                    var(self_var),
                    &format!("{}{}", field.remapped, SETTER_SUFFIX),
                    vec![value],
                ));
                if is_static {
                    static_init_body.push(set);
                } else {
                    init_body.push(set);
                }
            }
        }
    }
    for stmt in &trait_node.object_initializers {
        let mut stmt = stmt.clone();
        rewriter(SELF, HashSet::new()).body(&mut stmt);
        init_body.push(stmt);
    }
    for stmt in &trait_node.static_initializers {
        let mut stmt = stmt.clone();
        rewriter(STATIC_SELF, HashSet::new()).body(&mut stmt);
        static_init_body.push(stmt);
    }
    ast.add_method(
        helper,
        MethodNode::method(
            INIT_METHOD,
            Modifiers::PUBLIC | Modifiers::STATIC | Modifiers::SYNTHETIC,
            TypeRef::void(),
            vec![param(SELF, trait_type.clone())],
            Stmt::block(init_body),
        )
        .generated(),
    );
    ast.add_method(
        helper,
        MethodNode::method(
            STATIC_INIT_METHOD,
            Modifiers::PUBLIC | Modifiers::STATIC | Modifiers::SYNTHETIC,
            TypeRef::void(),
            vec![param(STATIC_SELF, TypeRef::class_type())],
            Stmt::block(static_init_body),
        )
        .generated(),
    );

    // Properties become accessor declarations on the interface, implemented
    // by helper methods over the remapped field.
    for property in &trait_node.properties {
        let property = ast.property(*property).clone();
        let ty = ast.field(property.field).ty.clone();
        let remapped_name = remapped_field_name(&trait_node, &property.name);
        let getter = getter_name(&property.name, &ty);
        if !ast.declares_method(class, &getter, 0) {
            ast.add_method(
                class,
                MethodNode::declaration(
                    getter.clone(),
                    Modifiers::PUBLIC | Modifiers::ABSTRACT,
                    ty.clone(),
                    vec![],
                )
                .generated(),
            );
            ast.add_method(
                helper,
                MethodNode::method(
                    getter,
                    Modifiers::PUBLIC | Modifiers::STATIC,
                    ty.clone(),
                    vec![param(SELF, trait_type.clone())],
                    Stmt::block(vec![ret(call(
                        var(SELF),
                        &format!("{}{}", remapped_name, GETTER_SUFFIX),
                        vec![],
                    ))]),
                )
                .generated(),
            );
        }
        let setter = setter_name(&property.name);
        if !property.modifiers.is_final() && !ast.declares_method(class, &setter, 1) {
            ast.add_method(
                class,
                MethodNode::declaration(
                    setter.clone(),
                    Modifiers::PUBLIC | Modifiers::ABSTRACT,
                    TypeRef::void(),
                    vec![param(&property.name, ty.clone())],
                )
                .generated(),
            );
            ast.add_method(
                helper,
                MethodNode::method(
                    setter,
                    Modifiers::PUBLIC | Modifiers::STATIC,
                    TypeRef::void(),
                    vec![
                        param(SELF, trait_type.clone()),
                        param(&property.name, ty.clone()),
                    ],
                    Stmt::block(vec![expr(call(
                        var(SELF),
                        &format!("{}{}", remapped_name, SETTER_SUFFIX),
                        vec![var(&property.name)],
                    ))]),
                )
                .generated(),
            );
        }
    }

    // Methods move to the helper; the interface keeps abstract declarations
    // of the public instance ones.
    for method_id in &trait_node.methods {
        let method = ast.method(*method_id).clone();
        if !method.is_abstract() {
            let is_static = method.is_static();
            let (self_var, self_type) = if is_static {
                (STATIC_SELF, TypeRef::class_type())
            } else {
                (SELF, trait_type.clone())
            };
            let mut params = vec![param(self_var, self_type)];
            params.extend(method.params.iter().cloned());
            let mut body = method.body.clone().unwrap_or(Stmt::Empty);
            let params_in_scope = method.params.iter().map(|p| p.name.clone()).collect();
            rewriter(self_var, params_in_scope).body(&mut body);
            let visibility = if method.modifiers.is_private() {
                Modifiers::PRIVATE
            } else {
                Modifiers::PUBLIC
            };
            let mut mods = visibility | Modifiers::STATIC;
            if method.modifiers.is_final() {
                mods.insert(Modifiers::FINAL);
            }
            let mut helper_method =
                MethodNode::method(method.name.clone(), mods, method.return_type.clone(), params, body);
            helper_method.pos = method.pos;
            ast.add_method(helper, helper_method);
        }
        if method.modifiers.is_private() || method.is_static() {
            ast.remove_method(class, *method_id);
        } else {
            let declaration = ast.method_mut(*method_id);
            declaration.body = None;
            declaration.modifiers = declaration.modifiers.with(Modifiers::ABSTRACT);
        }
    }

    let node = ast.class_mut(class);
    node.object_initializers.clear();
    node.static_initializers.clear();
    node.properties.clear();
    node.fields.clear();
}

/// Rewrites a trait method body so it runs against `$self` from a static
/// helper method.
struct ReceiverRewriter {
    self_var: &'static str,
    helper: TypeRef,
    fields: IndexMap<String, String>,
    private_methods: HashSet<String>,
    /// Names in scope for the whole body, parameters included.
    shadowed: HashSet<String>,
}

impl ReceiverRewriter {
    fn body(&self, stmt: &mut Stmt) {
        let mut scope = self.shadowed.clone();
        self.stmt(stmt, &mut scope);
    }

    /// A local hides a field from its declaration to the end of its block.
    fn stmt(&self, stmt: &mut Stmt, scope: &mut HashSet<String>) {
        match stmt {
            Stmt::Block(stmts) => {
                let mut inner = scope.clone();
                for stmt in stmts {
                    self.stmt(stmt, &mut inner);
                }
            }
            Stmt::Expr(expr) => self.expr(expr, scope),
            _ => {
                let mut inner = scope.clone();
                for expr in stmt.exprs_mut() {
                    self.expr(expr, &mut inner);
                }
                if let Stmt::ForEach { var, .. } = stmt {
                    inner.insert(var.clone());
                }
                for child in stmt.children_mut() {
                    self.stmt(child, &mut inner.clone());
                }
            }
        }
    }

    fn expr(&self, expr: &mut Expr, scope: &mut HashSet<String>) {
        match expr {
            Expr::Closure { params, body } => {
                let mut inner = scope.clone();
                inner.extend(params.iter().cloned());
                self.stmt(body, &mut inner);
                return;
            }
            Expr::Declare { name, init, .. } => {
                if let Some(init) = init {
                    self.expr(init, scope);
                }
                scope.insert(name.clone());
                return;
            }
            _ => {}
        }
        if let Some(replacement) = self.replacement(expr, scope) {
            *expr = replacement;
        }
        for child in expr.children_mut() {
            self.expr(child, scope);
        }
    }

    /// Remapped name when `expr` reads a trait field.
    fn remapped(&self, expr: &Expr, scope: &HashSet<String>) -> Option<String> {
        let name = match expr {
            Expr::Var(name) if !scope.contains(name) => name,
            Expr::Field { receiver, name } | Expr::Property { receiver, name, .. }
                if receiver.is_this() =>
            {
                name
            }
            _ => return None,
        };
        self.fields.get(name).cloned()
    }

    fn accessor(&self, remapped: &str, suffix: &str, args: Vec<Expr>) -> Expr {
        call(var(self.self_var), &format!("{}{}", remapped, suffix), args)
    }

    fn replacement(&self, expr: &Expr, scope: &HashSet<String>) -> Option<Expr> {
        match expr {
            Expr::Assign { target, value } => {
                let remapped = self.remapped(target, scope)?;
                Some(self.accessor(&remapped, SETTER_SUFFIX, vec![(**value).clone()]))
            }
            Expr::Var(_) | Expr::Field { .. } | Expr::Property { .. } => {
                let remapped = self.remapped(expr, scope)?;
                Some(self.accessor(&remapped, GETTER_SUFFIX, Vec::new()))
            }
            Expr::This => Some(var(self.self_var)),
            Expr::Call {
                receiver,
                method,
                args,
                safe,
                ..
            } if receiver.is_this() => {
                if self.private_methods.contains(method) {
                    let mut all = vec![var(self.self_var)];
                    all.extend(args.iter().cloned());
                    Some(Expr::StaticCall {
                        owner: self.helper.clone(),
                        method: method.clone(),
                        args: all,
                    })
                } else {
                    Some(Expr::Call {
                        receiver: Box::new(var(self.self_var)),
                        method: method.clone(),
                        args: args.clone(),
                        implicit_this: false,
                        safe: *safe,
                    })
                }
            }
            _ => None,
        }
    }
}

// ============================================================================
// COMPOSITION
// ============================================================================

/// Applies every trait `class` implements. Trait classes are only checked.
pub fn compose_traits(
    ast: &mut Ast,
    source: &mut SourceUnit,
    class: ClassId,
) -> Result<(), InternalError> {
    let node = ast.class(class);
    if ast.is_trait(class) {
        check_trait_superclass(ast, source, class);
        return Ok(());
    }
    if node.is_interface() || node.name.ends_with(HELPER_SUFFIX) {
        return Ok(());
    }
    for trait_id in find_traits(ast, class) {
        let trait_name = ast.class(trait_id).name.clone();
        let Some(helper) = ast.find_class(&helper_class_name(&trait_name)) else {
            // Not flattened: the trait itself failed its checks.
            continue;
        };
        let field_helper = ast.find_class(&field_helper_class_name(&trait_name));
        tracing::debug!(class = %ast.class(class).name, trait_name = %trait_name, "applying trait");
        apply_trait(ast, class, helper, field_helper);
    }
    Ok(())
}

fn check_trait_superclass(ast: &Ast, source: &mut SourceUnit, class: ClassId) {
    let Some(sup) = &ast.class(class).superclass else {
        return;
    };
    if sup.is_object() {
        return;
    }
    let is_trait = ast.superclass(class).is_some_and(|s| ast.is_trait(s));
    if !is_trait {
        source.add_error(
            ErrorKind::TransformUsage {
                annotation: names::at_name(names::TRAIT),
                message: "A trait can only inherit from another trait".to_string(),
            },
            ast.class(class).pos,
        );
    }
}

/// Traits implemented by `class`, directly or through other interfaces.
/// Later-declared traits come first, and every trait precedes the traits it
/// extends, so the first forwarder added for a method is the one that wins.
pub fn find_traits(ast: &Ast, class: ClassId) -> Vec<ClassId> {
    fn collect(ast: &Ast, class: ClassId, seen: &mut Vec<ClassId>) {
        for iface in ast.class(class).interfaces.iter().rev() {
            let Some(id) = ast.find_class(&iface.name) else {
                continue;
            };
            if !seen.contains(&id) {
                seen.push(id);
                collect(ast, id, seen);
            }
        }
    }
    let mut interfaces = Vec::new();
    collect(ast, class, &mut interfaces);
    interfaces.retain(|c| ast.is_trait(*c));
    interfaces
}

fn apply_trait(ast: &mut Ast, class: ClassId, helper: ClassId, field_helper: Option<ClassId>) {
    let class_type = ast.class(class).type_ref();
    let helper_type = ast.class(helper).type_ref();

    let mut helper_methods: Vec<MethodNode> = ast
        .class(helper)
        .methods
        .iter()
        .map(|m| ast.method(*m).clone())
        .collect();
    helper_methods.sort_by_key(MethodNode::descriptor);
    for method in helper_methods {
        if method.name == INIT_METHOD || method.name == STATIC_INIT_METHOD {
            continue;
        }
        if method.modifiers.is_private() || method.is_abstract() || !method.is_static() {
            continue;
        }
        let Some((self_param, params)) = method.params.split_first() else {
            continue;
        };
        let is_static = match self_param.name.as_str() {
            SELF => false,
            STATIC_SELF => true,
            _ => continue,
        };
        if ast.declares_method(class, &method.name, params.len()) {
            continue;
        }
        let receiver = if is_static {
            Expr::ClassLit(class_type.clone())
        } else {
            Expr::This
        };
        let mut args = vec![receiver];
        args.extend(params.iter().map(|p| var(&p.name)));
        let forwarded = Expr::StaticCall {
            owner: helper_type.clone(),
            method: method.name.clone(),
            args,
        };
        let body = if method.return_type.is_void() {
            expr(forwarded)
        } else {
            ret(forwarded)
        };
        let mods = if is_static {
            Modifiers::PUBLIC | Modifiers::STATIC
        } else {
            Modifiers::PUBLIC
        };
        ast.add_method(
            class,
            MethodNode::method(
                method.name.clone(),
                mods,
                method.return_type.clone(),
                params.to_vec(),
                Stmt::block(vec![body]),
            )
            .generated(),
        );
    }

    if let Some(field_helper) = field_helper {
        let field_helper_type = ast.class(field_helper).type_ref();
        if !ast.class(class).implements(&field_helper_type) {
            ast.class_mut(class).interfaces.push(field_helper_type);
            implement_field_helper(ast, class, field_helper);
        }
    }

    let helper_name = helper_type.name.clone();
    ast.class_mut(class)
        .static_initializers
        .push(expr(static_call(
            &helper_name,
            STATIC_INIT_METHOD,
            vec![Expr::ClassLit(class_type)],
        )));
    ast.class_mut(class)
        .object_initializers
        .push(expr(static_call(&helper_name, INIT_METHOD, vec![Expr::This])));
}

/// Adds the remapped fields and the accessor bodies, getters first.
fn implement_field_helper(ast: &mut Ast, class: ClassId, field_helper: ClassId) {
    let class_type = ast.class(class).type_ref();
    let mut accessors: Vec<MethodNode> = ast
        .class(field_helper)
        .methods
        .iter()
        .map(|m| ast.method(*m).clone())
        .collect();
    accessors.sort_by_key(MethodNode::descriptor);
    accessors.sort_by_key(|m| !m.name.ends_with(GETTER_SUFFIX));

    for accessor in accessors {
        let (remapped, getter) = if let Some(base) = accessor.name.strip_suffix(GETTER_SUFFIX) {
            (base.to_string(), true)
        } else if let Some(base) = accessor.name.strip_suffix(SETTER_SUFFIX) {
            (base.to_string(), false)
        } else {
            continue;
        };
        let Some(carrier) = ast.field_by_name(field_helper, &remapped) else {
            continue;
        };
        let carrier = ast.field(carrier).clone();
        let is_static = carrier.is_static();
        let visibility = if carrier.modifiers.is_public() {
            Modifiers::PUBLIC
        } else {
            Modifiers::PRIVATE
        };
        if getter && ast.field_by_name(class, &remapped).is_none() {
            let mut modifiers = visibility;
            if is_static {
                modifiers.insert(Modifiers::STATIC);
            }
            ast.add_field(
                class,
                FieldNode {
                    name: remapped.clone(),
                    modifiers,
                    ty: carrier.ty.clone(),
                    init: None,
                    annotations: Vec::new(),
                    owner: class,
                    pos: SourcePos::default(),
                },
            );
        }
        let receiver = if is_static {
            Expr::ClassLit(class_type.clone())
        } else {
            Expr::This
        };
        let target = field(receiver, &remapped);
        let (params, body) = if getter {
            (Vec::new(), ret(target))
        } else {
            (
                vec![param("val", carrier.ty.clone())],
                ret(assign_expr(target, var("val"))),
            )
        };
        let mut mods = Modifiers::PUBLIC;
        if is_static {
            mods.insert(Modifiers::STATIC);
        }
        ast.add_method(
            class,
            MethodNode::method(
                accessor.name.clone(),
                mods,
                carrier.ty.clone(),
                params,
                Stmt::block(vec![body]),
            )
            .generated(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::printer::print_class;
    use crate::ast::AnnotationNode;
    use crate::config::CompilerConfiguration;
    use crate::compiler::CompilePhase;
    use crate::errors::WarningCategory;
    use crate::transform::TransformLoader;

    fn greeter(ast: &mut Ast) -> ClassId {
        let module = ast.add_module("M", Some("demo".into()));
        let trait_id = ast.add_class(module, ClassNode::new("demo.Greeter", Modifiers::PUBLIC));
        ast.add_field(
            trait_id,
            FieldNode {
                name: "greeting".into(),
                modifiers: Modifiers::PRIVATE,
                ty: TypeRef::string(),
                init: Some(string("Hello")),
                annotations: Vec::new(),
                owner: trait_id,
                pos: SourcePos::default(),
            },
        );
        ast.add_method(
            trait_id,
            MethodNode::method(
                "greet",
                Modifiers::PUBLIC,
                TypeRef::string(),
                vec![param("who", TypeRef::string())],
                Stmt::block(vec![ret(call_this("format", vec![var("greeting"), var("who")]))]),
            ),
        );
        ast.add_method(
            trait_id,
            MethodNode::method(
                "format",
                Modifiers::PRIVATE,
                TypeRef::string(),
                vec![param("a", TypeRef::string()), param("b", TypeRef::string())],
                Stmt::block(vec![ret(crate::ast::Expr::Binary {
                    op: crate::ast::BinaryOp::Add,
                    left: Box::new(var("a")),
                    right: Box::new(var("b")),
                })]),
            ),
        );
        trait_id
    }

    fn flatten_trait(ast: &mut Ast, trait_id: ClassId) -> SourceUnit {
        let anno = ast
            .annotate(NodeRef::Class(trait_id), AnnotationNode::new("Trait"))
            .unwrap();
        let module = ast.class(trait_id).module;
        let mut source = SourceUnit::new("M", module, WarningCategory::LikelyErrors);
        let loader = TransformLoader::with_builtins();
        let config = CompilerConfiguration::default();
        let mut cx = TransformContext {
            ast,
            source: &mut source,
            loader: &loader,
            config: &config,
            phase: CompilePhase::SemanticAnalysis,
        };
        TraitTransformation
            .visit(&[NodeRef::Annotation(anno), NodeRef::Class(trait_id)], &mut cx)
            .unwrap();
        source
    }

    #[test]
    fn flattening_builds_helpers_and_rewrites_bodies() {
        let mut ast = Ast::new();
        let trait_id = greeter(&mut ast);
        let source = flatten_trait(&mut ast, trait_id);
        assert!(!source.errors().has_errors());

        assert!(ast.class(trait_id).is_interface());
        assert!(ast.class(trait_id).fields.is_empty());
        // The private method left the interface.
        assert!(!ast.declares_method(trait_id, "format", 2));
        let greet = ast.methods_named(trait_id, "greet")[0];
        assert!(ast.method(greet).is_abstract());

        let helper = ast.find_class("demo.Greeter$Trait$Helper").unwrap();
        let printed = print_class(&ast, helper);
        assert!(printed.contains("$self.demo_Greeter__greeting$set('Hello')"));
        assert!(printed.contains(
            "demo.Greeter$Trait$Helper.format($self, $self.demo_Greeter__greeting$get(), who)"
        ));
        let field_helper = ast.find_class("demo.Greeter$Trait$FieldHelper").unwrap();
        assert!(ast.declares_method(field_helper, "demo_Greeter__greeting$get", 0));
        assert!(ast.declares_method(field_helper, "demo_Greeter__greeting$set", 1));
    }

    #[test]
    fn class_override_wins_over_forwarder() {
        let mut ast = Ast::new();
        let trait_id = greeter(&mut ast);
        flatten_trait(&mut ast, trait_id);
        let module = ast.class(trait_id).module;
        let mut node = ClassNode::new("demo.Polite", Modifiers::PUBLIC);
        node.interfaces.push(TypeRef::new("demo.Greeter"));
        let class = ast.add_class(module, node);
        let own = ast.add_method(
            class,
            MethodNode::method(
                "greet",
                Modifiers::PUBLIC,
                TypeRef::string(),
                vec![param("who", TypeRef::string())],
                Stmt::block(vec![ret(string("Good day"))]),
            ),
        );

        let mut source = SourceUnit::new("M", module, WarningCategory::LikelyErrors);
        compose_traits(&mut ast, &mut source, class).unwrap();
        assert!(!source.errors().has_errors());

        assert_eq!(ast.methods_named(class, "greet"), vec![own]);
        assert!(!ast.method(own).generated);
        assert!(ast.field_by_name(class, "demo_Greeter__greeting").is_some());
        assert!(ast.declares_method(class, "demo_Greeter__greeting$get", 0));
        assert!(ast
            .class(class)
            .implements(&TypeRef::new("demo.Greeter$Trait$FieldHelper")));
        assert_eq!(ast.class(class).object_initializers.len(), 1);
        assert_eq!(ast.class(class).static_initializers.len(), 1);
    }

    #[test]
    fn last_declared_trait_wins() {
        let mut ast = Ast::new();
        let module = ast.add_module("M", None);
        let mut traits = Vec::new();
        for (name, reply) in [("A", "from A"), ("B", "from B")] {
            let t = ast.add_class(module, ClassNode::new(name, Modifiers::PUBLIC));
            ast.add_method(
                t,
                MethodNode::method(
                    "who",
                    Modifiers::PUBLIC,
                    TypeRef::string(),
                    vec![],
                    Stmt::block(vec![ret(string(reply))]),
                ),
            );
            flatten_trait(&mut ast, t);
            traits.push(t);
        }
        let mut node = ClassNode::new("C", Modifiers::PUBLIC);
        node.interfaces = vec![TypeRef::new("A"), TypeRef::new("B")];
        let class = ast.add_class(module, node);
        assert_eq!(find_traits(&ast, class), vec![traits[1], traits[0]]);

        let mut source = SourceUnit::new("M", module, WarningCategory::LikelyErrors);
        compose_traits(&mut ast, &mut source, class).unwrap();
        let who = ast.methods_named(class, "who");
        assert_eq!(who.len(), 1);
        assert!(print_class(&ast, class).contains("B$Trait$Helper.who(this)"));
    }

    #[test]
    fn constructors_are_rejected() {
        let mut ast = Ast::new();
        let trait_id = greeter(&mut ast);
        ast.add_constructor(
            trait_id,
            MethodNode::constructor(Modifiers::PUBLIC, vec![], Stmt::Empty),
        );
        let source = flatten_trait(&mut ast, trait_id);
        assert_eq!(
            source.errors().errors()[0].message(),
            "Error processing trait 'demo.Greeter'. Constructors are not allowed."
        );
        assert!(ast.find_class("demo.Greeter$Trait$Helper").is_none());
    }
}
