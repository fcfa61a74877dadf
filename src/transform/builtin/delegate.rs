//! `@Delegate`: forwards the public API of a field's (or no-arg method's)
//! type through the owning class.

use crate::ast::types::capitalize;
use crate::ast::{
    Ast, ClassId, Expr, MethodId, MethodNode, Modifiers, NodeRef, Parameter, Stmt, TypeRef,
};
use crate::errors::InternalError;
use crate::transform::base::{should_skip, Usage};
use crate::transform::synth::*;
use crate::transform::{names, AstTransformation, TransformContext};
use indexmap::IndexSet;

const DEPRECATED: &str = "java.lang.Deprecated";

/// The delegate as seen by the owner.
struct Delegate {
    name: String,
    origin: &'static str,
    owner: ClassId,
    /// Reads the delegate inside generated methods.
    get_op: Expr,
    excludes: Vec<String>,
    includes: Vec<String>,
}

#[derive(Debug, Default)]
pub struct DelegateTransformation;

impl AstTransformation for DelegateTransformation {
    fn visit(
        &mut self,
        nodes: &[NodeRef],
        cx: &mut TransformContext<'_>,
    ) -> Result<(), InternalError> {
        let usage = Usage::init(cx.ast, nodes, names::DELEGATE)?;
        let (name, origin, ty, owner, get_op) = match usage.node {
            NodeRef::Field(field) => {
                let node = cx.ast.field(field);
                let get_op = if cx.ast.has_annotation(NodeRef::Field(field), names::LAZY)
                    && node.name.starts_with('$')
                {
                    // The lazy getter owns initialization.
                    prop(Expr::This, &node.name[1..])
                } else {
                    this_field(&node.name)
                };
                (node.name.clone(), "field", node.ty.clone(), node.owner, get_op)
            }
            NodeRef::Property(property) => {
                let node = cx.ast.property(property);
                let field = cx.ast.field(node.field);
                let get_op = this_field(&field.name);
                (node.name.clone(), "field", field.ty.clone(), node.owner, get_op)
            }
            NodeRef::Method(method) => {
                let node = cx.ast.method(method);
                if !node.params.is_empty() {
                    let message = format!(
                        "You can only delegate to methods that take no parameters, but {} takes {} parameters.",
                        node.name,
                        node.params.len()
                    );
                    usage.error(cx, message);
                    return Ok(());
                }
                let get_op = call_this(&node.name, vec![]);
                (node.name.clone(), "method", node.return_type.clone(), node.owner, get_op)
            }
            _ => {
                usage.error(cx, format!("{} is only allowed on fields and methods", usage.name));
                return Ok(());
            }
        };

        if ty.is_object() {
            let message = format!(
                "{} {} '{}' has an inappropriate type: {}. Please add an explicit type but not java.lang.Object.",
                usage.name,
                origin,
                name,
                ty.qualified_name()
            );
            usage.error(cx, message);
            return Ok(());
        }
        if cx.ast.class(owner).type_ref().is(&ty) {
            let message = format!(
                "{} {} '{}' has an inappropriate type: {}. Delegation to own type not supported. Please use a different type.",
                usage.name,
                origin,
                name,
                ty.qualified_name()
            );
            usage.error(cx, message);
            return Ok(());
        }
        let Some(target) = cx.ast.find_class(&ty.name).filter(|_| !ty.is_array()) else {
            usage.error_during(
                cx,
                format!(
                    "{} '{}' has type {} which is not declared in this compilation",
                    origin,
                    name,
                    ty.qualified_name()
                ),
            );
            return Ok(());
        };

        let skip_interfaces = !usage.member_bool(cx, "interfaces", true);
        let include_deprecated = usage.member_bool(cx, "deprecated", false)
            || (cx.ast.class(target).is_interface() && !skip_interfaces);
        let all_names = usage.member_bool(cx, "allNames", false);
        let delegate = Delegate {
            name,
            origin,
            owner,
            get_op,
            excludes: usage.member_string_list(cx, "excludes"),
            includes: usage.member_string_list(cx, "includes"),
        };
        if !usage.check_include_exclude(cx, &delegate.includes, &delegate.excludes) {
            return Ok(());
        }
        tracing::debug!(
            owner = %cx.ast.class(owner).name,
            delegate = %delegate.name,
            origin = delegate.origin,
            "delegating"
        );

        let (hierarchy, interfaces) = type_hierarchy(cx.ast, target);
        let candidates: Vec<MethodId> = hierarchy
            .iter()
            .chain(interfaces.iter())
            .flat_map(|c| cx.ast.class(*c).methods.clone())
            .collect();
        for candidate in candidates {
            add_delegate_method(cx.ast, &delegate, candidate, include_deprecated, all_names);
        }
        for class in &hierarchy {
            for property in cx.ast.class(*class).properties.clone() {
                let node = cx.ast.property(property).clone();
                if node.is_static() || !node.modifiers.is_public() {
                    continue;
                }
                add_property_accessors(cx.ast, &delegate, property, all_names);
            }
        }

        if skip_interfaces {
            return Ok(());
        }
        let mut added: Vec<TypeRef> = interfaces
            .iter()
            .map(|i| cx.ast.class(*i).type_ref())
            .collect();
        // Library interfaces the target names but this compilation doesn't declare.
        for class in &hierarchy {
            for iface in &cx.ast.class(*class).interfaces {
                if cx.ast.find_class(&iface.name).is_none() {
                    added.push(iface.clone());
                }
            }
        }
        for iface in added {
            if !cx.ast.class(delegate.owner).implements(&iface) {
                cx.ast.class_mut(delegate.owner).interfaces.push(iface);
            }
        }
        Ok(())
    }
}

/// The target with its superclasses, and every interface (the target
/// included, when it is one) reachable from them, all within this unit.
fn type_hierarchy(ast: &Ast, target: ClassId) -> (Vec<ClassId>, Vec<ClassId>) {
    let mut classes = Vec::new();
    let mut interfaces: IndexSet<ClassId> = IndexSet::new();
    let mut pending = Vec::new();
    if ast.class(target).is_interface() {
        pending.push(target);
    } else {
        let mut current = Some(target);
        while let Some(class) = current {
            if classes.contains(&class) {
                break;
            }
            classes.push(class);
            pending.extend(
                ast.class(class)
                    .interfaces
                    .iter()
                    .filter_map(|i| ast.find_class(&i.name)),
            );
            current = ast.superclass(class);
        }
    }
    while let Some(iface) = pending.pop() {
        if interfaces.insert(iface) {
            pending.extend(
                ast.class(iface)
                    .interfaces
                    .iter()
                    .filter_map(|i| ast.find_class(&i.name)),
            );
        }
    }
    (classes, interfaces.into_iter().collect())
}

/// Whether the owner (or a superclass with a concrete version) already
/// answers to this signature.
fn owner_has(ast: &Ast, owner: ClassId, name: &str, params: &[TypeRef]) -> bool {
    if ast.declared_method(owner, name, params).is_some() {
        return true;
    }
    let mut current = ast.superclass(owner);
    while let Some(class) = current {
        if let Some(m) = ast.declared_method(class, name, params) {
            let method = ast.method(m);
            if !method.is_abstract() && !method.is_static() {
                return true;
            }
        }
        current = ast.superclass(class);
    }
    false
}

/// A parameter name that clashes with neither the delegate nor the other
/// parameters.
fn param_name(params: &[Parameter], i: usize, delegate: &str) -> String {
    let mut name = params[i].name.clone();
    while name == delegate
        || params
            .iter()
            .enumerate()
            .any(|(j, p)| j != i && p.name == name)
    {
        name = format!("_{}", name);
    }
    name
}

fn add_delegate_method(
    ast: &mut Ast,
    delegate: &Delegate,
    candidate: MethodId,
    include_deprecated: bool,
    all_names: bool,
) {
    let method = ast.method(candidate).clone();
    if !method.modifiers.is_public() || method.is_static() || method.modifiers.is_synthetic() {
        return;
    }
    if !include_deprecated && ast.has_annotation(NodeRef::Method(candidate), DEPRECATED) {
        return;
    }
    if should_skip(&method.name, &delegate.excludes, &delegate.includes, all_names) {
        return;
    }
    let types: Vec<TypeRef> = method.params.iter().map(|p| p.ty.clone()).collect();
    if owner_has(ast, delegate.owner, &method.name, &types) {
        return;
    }

    let params: Vec<Parameter> = (0..method.params.len())
        .map(|i| {
            let original = &method.params[i];
            Parameter {
                name: param_name(&method.params, i, &delegate.name),
                ty: original.ty.clone(),
                default: original.default.clone(),
                annotations: Vec::new(),
            }
        })
        .collect();
    let args = params.iter().map(|p| var(&p.name)).collect();
    let forward = call(delegate.get_op.clone(), &method.name, args);
    let body = if method.return_type.is_void() {
        expr(forward)
    } else {
        ret(forward)
    };
    ast.add_method(
        delegate.owner,
        MethodNode::method(
            method.name.clone(),
            method.modifiers.without(Modifiers::ABSTRACT),
            method.return_type.clone(),
            params,
            Stmt::block(vec![body]),
        )
        .generated(),
    );
}

fn add_property_accessors(
    ast: &mut Ast,
    delegate: &Delegate,
    property: crate::ast::PropertyId,
    all_names: bool,
) {
    let node = ast.property(property).clone();
    let ty = ast.field(node.field).ty.clone();
    let skipped = |accessor: &str| {
        should_skip(&node.name, &delegate.excludes, &delegate.includes, all_names)
            && should_skip(accessor, &delegate.excludes, &delegate.includes, all_names)
    };
    // Properties the owner declares itself get their own accessors.
    if ast.property_by_name(delegate.owner, &node.name).is_some() {
        return;
    }

    let getter = format!("{}{}", ty.getter_prefix(), capitalize(&node.name));
    if !skipped(&getter) && !owner_has(ast, delegate.owner, &getter, &[]) {
        ast.add_method(
            delegate.owner,
            MethodNode::method(
                getter,
                Modifiers::PUBLIC,
                ty.clone(),
                vec![],
                Stmt::block(vec![ret(prop(delegate.get_op.clone(), &node.name))]),
            )
            .generated(),
        );
    }

    let setter = format!("set{}", capitalize(&node.name));
    if node.modifiers.is_final()
        || skipped(&setter)
        || owner_has(ast, delegate.owner, &setter, &[ty.clone()])
    {
        return;
    }
    ast.add_method(
        delegate.owner,
        MethodNode::method(
            setter,
            Modifiers::PUBLIC,
            TypeRef::void(),
            vec![param("value", ty)],
            Stmt::block(vec![assign(prop(delegate.get_op.clone(), &node.name), var("value"))]),
        )
        .generated(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::printer::print_class;
    use crate::ast::{AnnotationNode, AnnotationValue, ClassNode, FieldNode, SourcePos};
    use crate::compiler::{CompilePhase, SourceUnit};
    use crate::config::CompilerConfiguration;
    use crate::errors::WarningCategory;
    use crate::transform::TransformLoader;

    /// `interface Named`, `class Engine implements Named` and `class Car`
    /// holding an `Engine engine` field.
    fn setup(ast: &mut Ast, field_type: TypeRef) -> (ClassId, ClassId, crate::ast::FieldId) {
        let module = ast.add_module("M", None);
        let named = ast.add_class(
            module,
            ClassNode::new("Named", Modifiers::PUBLIC | Modifiers::INTERFACE | Modifiers::ABSTRACT),
        );
        ast.add_method(
            named,
            MethodNode::declaration("name", Modifiers::PUBLIC | Modifiers::ABSTRACT, TypeRef::string(), vec![]),
        );
        let mut engine = ClassNode::new("Engine", Modifiers::PUBLIC);
        engine.interfaces.push(TypeRef::new("Named"));
        let engine = ast.add_class(module, engine);
        ast.add_method(
            engine,
            MethodNode::method(
                "start",
                Modifiers::PUBLIC,
                TypeRef::boolean(),
                vec![param("engine", TypeRef::int())],
                Stmt::block(vec![ret(boolean(true))]),
            ),
        );
        ast.add_method(
            engine,
            MethodNode::method(
                "name",
                Modifiers::PUBLIC,
                TypeRef::string(),
                vec![],
                Stmt::block(vec![ret(string("v8"))]),
            ),
        );
        ast.add_property(engine, "power", Modifiers::NONE, TypeRef::int(), None);
        let car = ast.add_class(module, ClassNode::new("Car", Modifiers::PUBLIC));
        ast.add_method(
            car,
            MethodNode::method(
                "name",
                Modifiers::PUBLIC,
                TypeRef::string(),
                vec![],
                Stmt::block(vec![ret(string("car"))]),
            ),
        );
        let field = ast.add_field(
            car,
            FieldNode {
                name: "engine".into(),
                modifiers: Modifiers::PRIVATE,
                ty: field_type,
                init: None,
                annotations: Vec::new(),
                owner: car,
                pos: SourcePos::default(),
            },
        );
        (engine, car, field)
    }

    fn run(ast: &mut Ast, field: crate::ast::FieldId, anno: AnnotationNode) -> SourceUnit {
        let anno = ast.annotate(NodeRef::Field(field), anno).unwrap();
        let module = ast.module_ids().next().unwrap();
        let mut source = SourceUnit::new("M", module, WarningCategory::LikelyErrors);
        let loader = TransformLoader::with_builtins();
        let config = CompilerConfiguration::default();
        let mut cx = TransformContext {
            ast,
            source: &mut source,
            loader: &loader,
            config: &config,
            phase: CompilePhase::Canonicalization,
        };
        DelegateTransformation
            .visit(&[NodeRef::Annotation(anno), NodeRef::Field(field)], &mut cx)
            .unwrap();
        source
    }

    #[test]
    fn forwards_missing_methods_and_interfaces() {
        let mut ast = Ast::new();
        let (_, car, field) = setup(&mut ast, TypeRef::new("Engine"));
        let source = run(&mut ast, field, AnnotationNode::new("Delegate"));
        assert!(!source.errors().has_errors());
        let printed = print_class(&ast, car);
        // The parameter clashes with the delegate's name.
        assert!(printed.contains("return this.@engine.start(_engine)"));
        assert!(printed.contains("return this.@engine.power"));
        assert!(ast.declares_method(car, "setPower", 1));
        // Car keeps its own name().
        assert_eq!(ast.methods_named(car, "name").len(), 1);
        assert!(ast.class(car).implements(&TypeRef::new("Named")));
    }

    #[test]
    fn excludes_and_interfaces_flag() {
        let mut ast = Ast::new();
        let (_, car, field) = setup(&mut ast, TypeRef::new("Engine"));
        let anno = AnnotationNode::new("Delegate")
            .with_member("excludes", AnnotationValue::string("start"))
            .with_member("interfaces", AnnotationValue::bool(false));
        run(&mut ast, field, anno);
        assert!(!ast.declares_method(car, "start", 1));
        assert!(ast.class(car).interfaces.is_empty());
    }

    #[test]
    fn object_typed_field_is_rejected() {
        let mut ast = Ast::new();
        let (_, car, field) = setup(&mut ast, TypeRef::object());
        let source = run(&mut ast, field, AnnotationNode::new("Delegate"));
        assert_eq!(source.errors().error_count(), 1);
        assert!(source.errors().errors()[0].message().contains("has an inappropriate type"));
        assert_eq!(ast.class(car).methods.len(), 1);
    }
}
