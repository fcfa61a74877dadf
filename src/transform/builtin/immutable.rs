//! `@Immutable`: final class, read-only properties, map and ordered
//! constructors that copy their arguments, value-based
//! equals/hashCode/toString and an optional `copyWith`.

use super::equals_hashcode::{create_equals, create_hash_code, EqualsOptions};
use super::to_string::{create_to_string, ToStringOptions};
use crate::ast::{
    Ast, ClassId, CtorKind, Expr, FieldId, MapEntry, MethodNode, Modifiers, NodeRef, PropertyId,
    Stmt, TypeRef,
};
use crate::errors::InternalError;
use crate::transform::base::{add_generated_method, Usage};
use crate::transform::synth::*;
use crate::transform::{names, AstTransformation, TransformContext};

const ARGS: &str = "args";

/// Types whose instances cannot change once built.
const IMMUTABLE_TYPES: &[&str] = &[
    "java.lang.Class",
    "java.lang.Boolean",
    "java.lang.Byte",
    "java.lang.Character",
    "java.lang.Double",
    "java.lang.Float",
    "java.lang.Integer",
    "java.lang.Long",
    "java.lang.Short",
    "java.lang.String",
    "java.math.BigInteger",
    "java.math.BigDecimal",
    "java.awt.Color",
    "java.net.URI",
    "java.util.UUID",
];

const SETS: &[&str] = &[
    "java.util.Set",
    "java.util.HashSet",
    "java.util.LinkedHashSet",
    "java.util.SortedSet",
];
const MAPS: &[&str] = &[
    "java.util.Map",
    "java.util.HashMap",
    "java.util.LinkedHashMap",
    "java.util.SortedMap",
];
const LISTS: &[&str] = &[
    "java.util.List",
    "java.util.ArrayList",
    "java.util.LinkedList",
    "java.util.Collection",
    "java.lang.Iterable",
];

/// How a member value is copied in and out of the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handling {
    Plain,
    Clone,
    Date,
    Collection,
}

#[derive(Debug, Default)]
pub struct ImmutableTransformation;

impl AstTransformation for ImmutableTransformation {
    fn visit(
        &mut self,
        nodes: &[NodeRef],
        cx: &mut TransformContext<'_>,
    ) -> Result<(), InternalError> {
        let usage = Usage::init(cx.ast, nodes, names::IMMUTABLE)?;
        let Some(class) = usage.target_class(cx) else {
            return Ok(());
        };
        if !usage.check_not_interface(cx, class) {
            return Ok(());
        }
        let known_classes: Vec<TypeRef> = usage.member_class_list(cx, "knownImmutableClasses");
        let known_names = usage.member_string_list(cx, "knownImmutables");
        let copy_with = usage.member_bool(cx, "copyWith", false);

        cx.ast.class_mut(class).modifiers.insert(Modifiers::FINAL);
        let properties = cx.ast.instance_properties(class);
        for property in &properties {
            make_read_only(cx.ast, *property);
        }
        let class_name = cx.ast.class(class).name.clone();
        for field in cx.ast.class(class).fields.clone() {
            let f = cx.ast.field(field);
            if f.modifiers.is_public() && !f.name.contains('$') && !(f.is_static() && f.modifiers.is_final())
            {
                let message = format!(
                    "Public field '{}' not allowed for {} class '{}'.",
                    f.name, usage.name, class_name
                );
                usage.error(cx, message);
            }
        }

        if let Some(handlings) = classify(&usage, cx, class, &properties, &known_classes, &known_names)
        {
            if validate_constructors(&usage, cx, class) {
                create_map_constructor(cx.ast, class, &properties, &handlings);
                // A lone map-typed property would give the ordered constructor
                // the named-argument signature.
                if !is_lone_map_property(cx.ast, &properties) {
                    create_ordered_constructor(cx.ast, class, &properties);
                }
                if !properties.is_empty() && cx.ast.declared_constructor(class, &[]).is_none() {
                    let delegate = expr(ctor_call(CtorKind::This, vec![Expr::Map(Vec::new())]));
                    cx.ast.add_constructor(
                        class,
                        MethodNode::constructor(
                            Modifiers::PUBLIC,
                            vec![],
                            Stmt::block(vec![delegate]),
                        )
                        .generated(),
                    );
                }
            }
            for (property, handling) in properties.iter().zip(&handlings) {
                let field = cx.ast.property(*property).field;
                cx.ast.property_mut(*property).getter = getter_body_for(cx.ast, field, *handling);
            }
        }

        let node = NodeRef::Class(class);
        if !cx.ast.has_annotation(node, names::EQUALS_AND_HASH_CODE) {
            let options = EqualsOptions {
                cache: true,
                ..Default::default()
            };
            create_hash_code(cx.ast, class, &options);
            create_equals(cx.ast, class, &options);
        }
        if !cx.ast.has_annotation(node, names::TO_STRING) {
            let options = ToStringOptions {
                cache: true,
                ..Default::default()
            };
            create_to_string(cx.ast, class, &options);
        }
        if copy_with && !properties.is_empty() && !cx.ast.declares_method(class, "copyWith", 1) {
            create_copy_with(cx.ast, class, &properties);
        }
        Ok(())
    }
}

/// The field becomes private final and the property loses its setter.
fn make_read_only(ast: &mut Ast, property: PropertyId) {
    let node = ast.property_mut(property);
    node.setter = None;
    node.modifiers.insert(Modifiers::FINAL);
    let field = node.field;
    let field = ast.field_mut(field);
    field.modifiers = field
        .modifiers
        .with_visibility(Modifiers::PRIVATE)
        .with(Modifiers::FINAL);
}

fn validate_constructors(usage: &Usage, cx: &mut TransformContext<'_>, class: ClassId) -> bool {
    let explicit = cx
        .ast
        .class(class)
        .constructors
        .iter()
        .any(|c| !cx.ast.method(*c).generated);
    if explicit {
        let message = format!(
            "Explicit constructors not allowed for {} class: {}",
            usage.name,
            cx.ast.class(class).simple_name()
        );
        usage.error(cx, message);
        return false;
    }
    true
}

fn named_in(ty: &TypeRef, list: &[&str]) -> bool {
    list.iter().any(|name| ty.is_named(name))
}

/// Decides how each property is copied. `None` after reporting a property
/// whose type cannot be made immutable.
fn classify(
    usage: &Usage,
    cx: &mut TransformContext<'_>,
    class: ClassId,
    properties: &[PropertyId],
    known_classes: &[TypeRef],
    known_names: &[String],
) -> Option<Vec<Handling>> {
    let mut out = Vec::new();
    let mut ok = true;
    for property in properties {
        let node = cx.ast.property(*property);
        let name = node.name.clone();
        let ty = cx.ast.field(node.field).ty.clone();
        let handling = if ty.is_primitive()
            || named_in(&ty, IMMUTABLE_TYPES)
            || known_classes.iter().any(|k| k.is(&ty))
            || known_names.contains(&name)
            || declared_immutable(cx.ast, &ty)
        {
            Handling::Plain
        } else if named_in(&ty, SETS) || named_in(&ty, MAPS) || named_in(&ty, LISTS) {
            Handling::Collection
        } else if ty.is_array() || is_cloneable(cx.ast, &ty) {
            Handling::Clone
        } else if ty.is_named("java.util.Date") {
            Handling::Date
        } else {
            let shown = if ty.is_object() {
                format!("{} or def", ty.qualified_name())
            } else {
                ty.qualified_name().to_string()
            };
            let message = format!(
                "{name} processor doesn't know how to handle field '{field}' of type '{shown}' while compiling class {class}.\n\
                 {name} classes only support properties with effectively immutable types including:\n\
                 - Strings, primitive types, wrapper types, Class, BigInteger and BigDecimal, enums\n\
                 - other {name} classes and known immutables (java.awt.Color, java.net.URI)\n\
                 - Cloneable classes, collections, maps and arrays, and other classes with special handling (java.util.Date)",
                name = usage.name,
                field = name,
                shown = shown,
                class = cx.ast.class(class).name,
            );
            usage.error(cx, message);
            ok = false;
            Handling::Plain
        };
        out.push(handling);
    }
    ok.then_some(out)
}

/// Enums and `@Immutable` classes of this compilation.
fn declared_immutable(ast: &Ast, ty: &TypeRef) -> bool {
    if ty.is_array() {
        return false;
    }
    ast.find_class(&ty.name).is_some_and(|c| {
        ast.class(c).is_enum() || ast.has_annotation(NodeRef::Class(c), names::IMMUTABLE)
    })
}

pub(super) fn is_cloneable(ast: &Ast, ty: &TypeRef) -> bool {
    ty.is_named("java.lang.Cloneable")
        || ast.find_class(&ty.name).is_some_and(|c| {
            ast.class(c)
                .implements(&TypeRef::new("java.lang.Cloneable"))
                || ast.has_annotation(NodeRef::Class(c), names::AUTO_CLONE)
        })
}

/// A read-only copy of a collection value, picked by its runtime type.
fn immutable_collection(value: Expr) -> Expr {
    let view = |wrapper: &str, copy: &str, value: &Expr| {
        static_call(
            "java.util.Collections",
            wrapper,
            vec![new_instance(TypeRef::new(copy), vec![value.clone()])],
        )
    };
    ternary(
        instance_of(value.clone(), TypeRef::new("java.util.Map")),
        view("unmodifiableMap", "java.util.LinkedHashMap", &value),
        ternary(
            instance_of(value.clone(), TypeRef::new("java.util.Set")),
            view("unmodifiableSet", "java.util.LinkedHashSet", &value),
            view("unmodifiableList", "java.util.ArrayList", &value),
        ),
    )
}

fn copy_of(value: Expr, ty: &TypeRef, handling: Handling) -> Expr {
    match handling {
        Handling::Plain => value,
        Handling::Clone => cast(ty.clone(), call(value, "clone", vec![])),
        Handling::Date => new_instance(
            TypeRef::new("java.util.Date"),
            vec![call(value, "getTime", vec![])],
        ),
        Handling::Collection => immutable_collection(value),
    }
}

/// `if (args.f == null) this.@f = <init> else this.@f = <copy of args.f>`
fn assign_member(ast: &Ast, field: FieldId, handling: Handling) -> Stmt {
    let f = ast.field(field);
    let target = this_field(&f.name);
    let arg = prop(var(ARGS), &f.name);
    let init = match &f.init {
        Some(init) if !init.is_null() => copy_of(init.clone(), &f.ty, handling),
        _ => null(),
    };
    if_else(
        is_null(arg.clone()),
        assign(target.clone(), init),
        assign(target, copy_of(arg, &f.ty, handling)),
    )
}

/// Types a named-argument map could be passed as.
const NAMED_ARG_TYPES: &[&str] = &[
    "java.util.Map",
    "java.util.HashMap",
    "java.util.AbstractMap",
    "java.lang.Object",
];

/// One property whose type accepts the named-argument map itself.
fn is_lone_map_property(ast: &Ast, properties: &[PropertyId]) -> bool {
    let [property] = properties else {
        return false;
    };
    let ty = &ast.field(ast.property(*property).field).ty;
    NAMED_ARG_TYPES.iter().any(|name| ty.is_named(name))
}

fn create_map_constructor(
    ast: &mut Ast,
    class: ClassId,
    properties: &[PropertyId],
    handlings: &[Handling],
) {
    let mut body = vec![if_then(
        is_null(var(ARGS)),
        assign(var(ARGS), Expr::Map(Vec::new())),
    )];
    let lone_map = is_lone_map_property(ast, properties);
    for (property, handling) in properties.iter().zip(handlings) {
        let field = ast.property(*property).field;
        let assigned = assign_member(ast, field, *handling);
        if lone_map {
            // `C([k: 1])` without the property's key passes the map as its value.
            let f = ast.field(field);
            body.push(if_else(
                call(var(ARGS), "containsKey", vec![string(&f.name)]),
                assigned,
                assign(this_field(&f.name), copy_of(var(ARGS), &f.ty, *handling)),
            ));
        } else {
            body.push(assigned);
        }
    }
    for field in ast.plain_fields(class) {
        let f = ast.field(field);
        if f.modifiers.is_public()
            || (f.is_static() && f.modifiers.is_final())
            || f.name.contains('$')
            || f.modifiers.is_synthetic()
        {
            continue;
        }
        if f.is_static() {
            continue;
        }
        if f.modifiers.is_final() && f.init.is_some() {
            body.push(if_then(
                not_null(prop(var(ARGS), &f.name)),
                throw_new(
                    "groovy.lang.ReadOnlyPropertyException",
                    string(&format!(
                        "Cannot set readonly property: {} for class: {}",
                        f.name,
                        ast.class(class).name
                    )),
                ),
            ));
        }
        body.push(assign_member(ast, field, Handling::Plain));
    }
    ast.add_constructor(
        class,
        MethodNode::constructor(
            Modifiers::PUBLIC,
            vec![param(ARGS, TypeRef::new("java.util.HashMap"))],
            Stmt::block(body),
        )
        .generated(),
    );
}

/// `C(a, b)` delegating to the map constructor with `[a: a, b: b]`.
fn create_ordered_constructor(ast: &mut Ast, class: ClassId, properties: &[PropertyId]) {
    let mut params = Vec::new();
    let mut entries = Vec::new();
    for property in properties {
        let p = ast.property(*property);
        params.push(param(&p.name, ast.field(p.field).ty.clone()));
        entries.push(MapEntry {
            key: string(&p.name),
            value: var(&p.name),
        });
    }
    let delegate = ctor_call(
        CtorKind::This,
        vec![cast(TypeRef::new("java.util.HashMap"), Expr::Map(entries))],
    );
    ast.add_constructor(
        class,
        MethodNode::constructor(Modifiers::PUBLIC, params, Stmt::block(vec![expr(delegate)]))
            .generated(),
    );
}

/// Defensive getter for arrays, Cloneable values and dates. Other members use
/// the plain accessor.
fn getter_body_for(ast: &Ast, field: FieldId, handling: Handling) -> Option<Stmt> {
    let f = ast.field(field);
    match handling {
        Handling::Clone | Handling::Date => {
            let value = this_field(&f.name);
            Some(Stmt::block(vec![ret(ternary(
                is_null(value.clone()),
                null(),
                copy_of(value, &f.ty, handling),
            ))]))
        }
        Handling::Plain | Handling::Collection => None,
    }
}

/// `copyWith(Map map)`: a new instance with the given properties replaced, or
/// `this` when nothing changes.
fn create_copy_with(ast: &mut Ast, class: ClassId, properties: &[PropertyId]) {
    const MAP: &str = "map";
    const DIRTY: &str = "dirty";
    const CONSTRUCT: &str = "construct";
    let class_type = ast.class(class).type_ref();

    let mut body = vec![
        return_if(
            or(
                is_null(var(MAP)),
                equal(call(var(MAP), "size", vec![]), int(0)),
            ),
            Expr::This,
        ),
        declare(TypeRef::boolean(), DIRTY, boolean(false)),
        declare(
            TypeRef::new("java.util.HashMap"),
            CONSTRUCT,
            new_instance(TypeRef::new("java.util.HashMap"), vec![]),
        ),
    ];
    for property in properties {
        let p = ast.property(*property);
        let name = p.name.clone();
        let getter = call_this(&getter_name(&name, &ast.field(p.field).ty), vec![]);
        let put = |value: Expr| expr(call(var(CONSTRUCT), "put", vec![string(&name), value]));
        let changed = Stmt::block(vec![
            declare(
                TypeRef::object(),
                "newValue",
                call(var(MAP), "get", vec![string(&name)]),
            ),
            declare(TypeRef::object(), "oldValue", getter.clone()),
            if_then(
                binary(crate::ast::BinaryOp::Ne, var("newValue"), var("oldValue")),
                Stmt::block(vec![
                    assign(var("oldValue"), var("newValue")),
                    assign(var(DIRTY), boolean(true)),
                ]),
            ),
            put(var("oldValue")),
        ]);
        body.push(if_else(
            call(var(MAP), "containsKey", vec![string(&name)]),
            changed,
            Stmt::block(vec![put(getter)]),
        ));
    }
    body.push(ret(ternary(
        var(DIRTY),
        new_instance(class_type.clone(), vec![var(CONSTRUCT)]),
        Expr::This,
    )));
    add_generated_method(
        ast,
        class,
        MethodNode::method(
            "copyWith",
            Modifiers::PUBLIC | Modifiers::FINAL,
            class_type,
            vec![param(MAP, TypeRef::map())],
            Stmt::block(body),
        ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AnnotationNode, AnnotationValue, ClassNode};
    use crate::compiler::{CompilePhase, SourceUnit};
    use crate::config::CompilerConfiguration;
    use crate::errors::WarningCategory;
    use crate::transform::TransformLoader;

    fn run(setup: impl FnOnce(&mut Ast, ClassId), anno: AnnotationNode) -> (Ast, SourceUnit, ClassId) {
        let mut ast = Ast::new();
        let module = ast.add_module("M", None);
        let class = ast.add_class(module, ClassNode::new("Point", Modifiers::PUBLIC));
        setup(&mut ast, class);
        let anno = ast.annotate(NodeRef::Class(class), anno).unwrap();
        let mut source = SourceUnit::new("M", module, WarningCategory::LikelyErrors);
        let loader = TransformLoader::with_builtins();
        let config = CompilerConfiguration::default();
        let mut cx = TransformContext {
            ast: &mut ast,
            source: &mut source,
            loader: &loader,
            config: &config,
            phase: CompilePhase::Canonicalization,
        };
        ImmutableTransformation
            .visit(&[NodeRef::Annotation(anno), NodeRef::Class(class)], &mut cx)
            .unwrap();
        (ast, source, class)
    }

    #[test]
    fn class_is_final_with_three_constructors() {
        let (ast, source, class) = run(
            |ast, class| {
                ast.add_property(class, "x", Modifiers::NONE, TypeRef::int(), None);
                ast.add_property(class, "tags", Modifiers::NONE, TypeRef::list(), None);
            },
            AnnotationNode::new("Immutable"),
        );
        assert!(!source.errors().has_errors());
        let node = ast.class(class);
        assert!(node.modifiers.is_final());
        assert_eq!(node.constructors.len(), 3);
        let prop = ast.property(node.properties[0]);
        assert!(prop.modifiers.is_final());
        assert!(ast.field(prop.field).modifiers.is_private());
        assert!(ast.field_by_name(class, "$hash$code").is_some());
    }

    #[test]
    fn unknown_mutable_type_is_rejected_unless_listed() {
        let setup = |ast: &mut Ast, class| {
            ast.add_property(class, "sb", Modifiers::NONE, TypeRef::new("java.lang.StringBuilder"), None);
        };
        let (_, source, _) = run(setup, AnnotationNode::new("Immutable"));
        assert_eq!(source.errors().error_count(), 1);
        assert!(source.errors().errors()[0]
            .to_string()
            .contains("doesn't know how to handle field 'sb'"));

        let listed = AnnotationNode::new("Immutable")
            .with_member("knownImmutables", AnnotationValue::string("sb"));
        let (_, source, _) = run(setup, listed);
        assert!(!source.errors().has_errors());
    }

    #[test]
    fn explicit_constructor_is_an_error() {
        let (_, source, _) = run(
            |ast, class| {
                ast.add_constructor(
                    class,
                    MethodNode::constructor(Modifiers::PUBLIC, vec![], Stmt::Empty),
                );
            },
            AnnotationNode::new("Immutable"),
        );
        assert!(source.errors().errors()[0]
            .to_string()
            .contains("Explicit constructors not allowed for @Immutable class: Point"));
    }
}
