//! Value-object built-ins, compiled end to end and exercised with the
//! reference evaluator.

mod common;

use canopy::eval::{Interpreter, Value};
use canopy::errors::CompileFailure;
use canopy::ast::{Expr, TypeRef};
use common::{compile, error_messages, try_compile};

fn person(interp: &mut Interpreter<'_>, class: &str, name: &str, age: i64) -> Value {
    let args = interp
        .map(vec![
            (Value::string("name"), Value::string(name)),
            (Value::string("age"), Value::Int(age)),
        ])
        .unwrap();
    interp.instantiate(class, vec![args]).unwrap()
}

fn equals(interp: &mut Interpreter<'_>, a: &Value, b: &Value) -> bool {
    interp
        .call(a, "equals", vec![b.clone()])
        .unwrap()
        .as_bool()
        .unwrap()
}

const PEOPLE: &str = r#"{
    "package": "demo",
    "classes": [
        {
            "name": "Person",
            "annotations": [{"type": "EqualsAndHashCode"}],
            "properties": [
                {"name": "name", "type": "String"},
                {"name": "age", "type": "int"}
            ]
        },
        {
            "name": "Pet",
            "annotations": [{"type": "EqualsAndHashCode"}],
            "properties": [
                {"name": "name", "type": "String"},
                {"name": "age", "type": "int"}
            ]
        }
    ]
}"#;

#[test]
fn equals_and_hash_code_over_name_and_age() {
    let unit = compile(PEOPLE);
    let mut interp = Interpreter::new(unit.ast());

    let ann = person(&mut interp, "demo.Person", "Ann", 30);
    let twin = person(&mut interp, "demo.Person", "Ann", 30);
    let older = person(&mut interp, "demo.Person", "Ann", 31);
    let pet = person(&mut interp, "demo.Pet", "Ann", 30);

    // initHash() = 127, then 59 * h + field hash in declaration order.
    let expected = (127 * 59 + 65_985) * 59 + 30;
    let hash = interp.call(&ann, "hashCode", vec![]).unwrap();
    assert_eq!(hash.as_int(), Some(expected));
    assert_eq!(interp.call(&twin, "hashCode", vec![]).unwrap().as_int(), Some(expected));

    assert!(equals(&mut interp, &ann, &ann));
    assert!(equals(&mut interp, &ann, &twin));
    assert!(!equals(&mut interp, &ann, &older));
    assert!(!equals(&mut interp, &ann, &Value::Null));
    assert!(!equals(&mut interp, &ann, &pet));
}

#[test]
fn user_equals_is_kept_and_canonical_logic_goes_to_a_fallback() {
    let unit = compile(
        r#"{"classes": [{
            "name": "Account",
            "annotations": [{"type": "EqualsAndHashCode"}],
            "properties": [{"name": "id", "type": "int"}],
            "methods": [{
                "name": "equals",
                "returns": "boolean",
                "params": [{"name": "other", "type": "Object"}],
                "body": {"return": {"constant": false}}
            }]
        }]}"#,
    );
    let ast = unit.ast();
    let class = ast.find_class("Account").unwrap();
    let equals = ast.methods_named(class, "equals");
    assert_eq!(equals.len(), 1);
    assert!(!ast.method(equals[0]).generated);
    let fallback = ast.methods_named(class, "_equals");
    assert_eq!(fallback.len(), 1);
    assert!(ast.method(fallback[0]).modifiers.is_private());
}

#[test]
fn includes_with_excludes_is_one_error_and_no_members() {
    for annotation in ["ToString", "EqualsAndHashCode"] {
        let json = format!(
            r#"{{"classes": [{{
                "name": "Person",
                "annotations": [{{"type": "{annotation}", "members": {{"includes": "name", "excludes": "age"}}}}],
                "properties": [
                    {{"name": "name", "type": "String"}},
                    {{"name": "age", "type": "int"}}
                ]
            }}]}}"#
        );
        let (unit, result) = try_compile(&json);
        assert!(matches!(result, Err(CompileFailure::CompilationFailed { errors: 1, .. })));
        let messages = error_messages(&unit);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Only one of 'includes' and 'excludes' should be supplied not both."));
        let class = unit.ast().find_class("Person").unwrap();
        assert!(unit.ast().class(class).methods.is_empty());
    }
}

#[test]
fn to_string_lists_names_in_declaration_order() {
    let unit = compile(
        r#"{"package": "demo", "classes": [{
            "name": "Person",
            "annotations": [{"type": "ToString", "members": {"includeNames": true}}],
            "properties": [
                {"name": "name", "type": "String"},
                {"name": "age", "type": "int"},
                {"name": "nick", "type": "String"}
            ]
        }]}"#,
    );
    let mut interp = Interpreter::new(unit.ast());
    let ann = person(&mut interp, "demo.Person", "Ann", 30);
    let text = interp.call(&ann, "toString", vec![]).unwrap();
    assert_eq!(text.as_str(), Some("demo.Person(name:Ann, age:30, nick:null)"));
}

#[test]
fn canonical_combines_constructor_equality_and_text() {
    let unit = compile(
        r#"{"classes": [{
            "name": "Point",
            "annotations": [{"type": "Canonical"}],
            "properties": [
                {"name": "x", "type": "int"},
                {"name": "y", "type": "int"}
            ]
        }]}"#,
    );
    let mut interp = Interpreter::new(unit.ast());
    let a = interp.instantiate("Point", vec![Value::Int(1), Value::Int(2)]).unwrap();
    let b = interp.instantiate("Point", vec![Value::Int(1), Value::Int(2)]).unwrap();
    assert!(equals(&mut interp, &a, &b));
    assert!(!a.identical(&b));
    assert_eq!(interp.display(&a).unwrap(), "Point(1, 2)");
}

const IMMUTABLE: &str = r#"{
    "package": "demo",
    "classes": [{
        "name": "Snapshot",
        "annotations": [{"type": "Immutable", "members": {"copyWith": true}}],
        "properties": [
            {"name": "name", "type": "String"},
            {"name": "tags", "type": "List"},
            {"name": "scores", "type": "int[]"}
        ]
    }]
}"#;

fn snapshot(interp: &mut Interpreter<'_>) -> (Value, Value, Value) {
    let tags = interp.list(vec![Value::string("a"), Value::string("b")]);
    let scores = interp
        .evaluate(&Expr::NewArray {
            element: TypeRef::int(),
            items: vec![
                Expr::Constant(canopy::ast::Constant::Int(3)),
                Expr::Constant(canopy::ast::Constant::Int(4)),
            ],
        })
        .unwrap();
    let snap = interp
        .instantiate(
            "demo.Snapshot",
            vec![Value::string("first"), tags.clone(), scores.clone()],
        )
        .unwrap();
    (snap, tags, scores)
}

#[test]
fn immutable_round_trip_copies_mutable_members() {
    let unit = compile(IMMUTABLE);
    let mut interp = Interpreter::new(unit.ast());
    let (snap, tags, scores) = snapshot(&mut interp);

    let name = interp.get_property(&snap, "name").unwrap();
    assert_eq!(name.as_str(), Some("first"));

    let read_tags = interp.get_property(&snap, "tags").unwrap();
    assert!(interp.equals(&read_tags, &tags).unwrap());
    assert!(!read_tags.identical(&tags));

    let read_scores = interp.get_property(&snap, "scores").unwrap();
    assert!(interp.equals(&read_scores, &scores).unwrap());
    assert!(!read_scores.identical(&scores));
    let again = interp.get_property(&snap, "scores").unwrap();
    assert!(!again.identical(&read_scores));
}

#[test]
fn immutable_instances_reject_changes() {
    let unit = compile(IMMUTABLE);
    let mut interp = Interpreter::new(unit.ast());
    let (snap, _, _) = snapshot(&mut interp);

    let err = interp
        .set_property(&snap, "name", Value::string("other"))
        .unwrap_err();
    assert!(err.is_thrown("ReadOnlyPropertyException"));

    let tags = interp.get_property(&snap, "tags").unwrap();
    let err = interp
        .call(&tags, "add", vec![Value::string("c")])
        .unwrap_err();
    assert!(err.is_thrown("UnsupportedOperationException"));
}

#[test]
fn copy_with_returns_this_unless_something_changes() {
    let unit = compile(IMMUTABLE);
    let mut interp = Interpreter::new(unit.ast());
    let (snap, _, _) = snapshot(&mut interp);

    let empty = interp.map(vec![]).unwrap();
    let same = interp.call(&snap, "copyWith", vec![empty]).unwrap();
    assert!(same.identical(&snap));

    let unchanged = interp
        .map(vec![(Value::string("name"), Value::string("first"))])
        .unwrap();
    let same = interp.call(&snap, "copyWith", vec![unchanged]).unwrap();
    assert!(same.identical(&snap));

    let renamed = interp
        .map(vec![(Value::string("name"), Value::string("second"))])
        .unwrap();
    let copy = interp.call(&snap, "copyWith", vec![renamed]).unwrap();
    assert!(!copy.identical(&snap));
    assert_eq!(
        interp.get_property(&copy, "name").unwrap().as_str(),
        Some("second")
    );
    assert!(!interp.equals(&copy, &snap).unwrap());
}

#[test]
fn immutable_rejects_explicit_constructors_and_mutable_types() {
    let (unit, result) = try_compile(
        r#"{"classes": [{
            "name": "Holder",
            "annotations": [{"type": "Immutable"}],
            "properties": [{"name": "buffer", "type": "java.lang.StringBuilder"}]
        }]}"#,
    );
    assert!(result.is_err());
    assert!(error_messages(&unit)[0].contains("doesn't know how to handle field 'buffer'"));
}

#[test]
fn immutable_lone_map_property_accepts_the_map_itself() {
    let unit = compile(
        r#"{"package": "demo", "classes": [{
            "name": "Cfg",
            "annotations": [{"type": "Immutable"}],
            "properties": [{"name": "settings", "type": "Map"}]
        }]}"#,
    );
    let cfg = unit.ast().find_class("demo.Cfg").unwrap();
    // Map constructor and no-arg constructor only.
    assert_eq!(unit.ast().class(cfg).constructors.len(), 2);

    let mut interp = Interpreter::new(unit.ast());
    let raw = interp
        .map(vec![(Value::string("k"), Value::Int(1))])
        .unwrap();
    let plain = interp.instantiate("demo.Cfg", vec![raw.clone()]).unwrap();
    let settings = interp.get_property(&plain, "settings").unwrap();
    let k = interp.call(&settings, "get", vec![Value::string("k")]).unwrap();
    assert_eq!(k.as_int(), Some(1));

    let named = interp
        .map(vec![(Value::string("settings"), raw)])
        .unwrap();
    let named = interp.instantiate("demo.Cfg", vec![named]).unwrap();
    let settings = interp.get_property(&named, "settings").unwrap();
    let k = interp.call(&settings, "get", vec![Value::string("k")]).unwrap();
    assert_eq!(k.as_int(), Some(1));
    assert!(interp.equals(&plain, &named).unwrap());
}

const REGISTRY: &str = r#"{
    "package": "demo",
    "classes": [{
        "name": "Registry",
        "annotations": [{"type": "Singleton"}]
    }]
}"#;

#[test]
fn singleton_accessor_is_stable_and_constructor_is_guarded() {
    let unit = compile(REGISTRY);
    let mut interp = Interpreter::new(unit.ast());
    let first = interp.call_static("demo.Registry", "getInstance", vec![]).unwrap();
    let second = interp.call_static("demo.Registry", "getInstance", vec![]).unwrap();
    assert!(first.identical(&second));
    let by_property = interp
        .get_property(&Value::Class("demo.Registry".into()), "instance")
        .unwrap();
    assert!(by_property.identical(&first));

    let err = interp.instantiate("demo.Registry", vec![]).unwrap_err();
    assert!(err.is_thrown("java.lang.RuntimeException"));
    assert!(err
        .to_string()
        .ends_with("Can't instantiate singleton demo.Registry. Use demo.Registry.instance"));
}

#[test]
fn strict_singleton_rejects_user_constructors() {
    let (unit, result) = try_compile(
        r#"{"classes": [{
            "name": "Registry",
            "annotations": [{"type": "Singleton"}],
            "constructors": [{"params": [{"name": "size", "type": "int"}], "body": {"block": []}}]
        }]}"#,
    );
    assert!(result.is_err());
    assert!(error_messages(&unit)[0].contains("remove constructor(s) or set strict=false"));
}

#[test]
fn builder_chains_setters_into_a_new_instance() {
    let unit = compile(
        r#"{"package": "demo", "classes": [{
            "name": "Person",
            "annotations": [{"type": "Builder"}],
            "properties": [
                {"name": "name", "type": "String"},
                {"name": "age", "type": "int"}
            ]
        }]}"#,
    );
    assert!(unit.ast().find_class("demo.Person$PersonBuilder").is_some());

    let mut interp = Interpreter::new(unit.ast());
    let builder = interp.call_static("demo.Person", "builder", vec![]).unwrap();
    let same = interp
        .call(&builder, "name", vec![Value::string("Ann")])
        .unwrap();
    assert!(same.identical(&builder));
    interp.call(&builder, "age", vec![Value::Int(30)]).unwrap();
    let built = interp.call(&builder, "build", vec![]).unwrap();

    assert_eq!(interp.runtime_class(&built), "demo.Person");
    assert_eq!(interp.get_property(&built, "name").unwrap().as_str(), Some("Ann"));
    assert_eq!(interp.get_property(&built, "age").unwrap().as_int(), Some(30));
}

#[test]
fn tuple_and_map_constructors_fill_properties() {
    let unit = compile(
        r#"{"classes": [
            {
                "name": "Pair",
                "annotations": [{"type": "TupleConstructor"}],
                "properties": [
                    {"name": "left", "type": "String"},
                    {"name": "right", "type": "String"}
                ]
            },
            {
                "name": "Options",
                "annotations": [{"type": "MapConstructor", "members": {"noArg": true}}],
                "properties": [
                    {"name": "verbose", "type": "boolean"},
                    {"name": "level", "type": "int"}
                ]
            }
        ]}"#,
    );
    let mut interp = Interpreter::new(unit.ast());
    let pair = interp
        .instantiate("Pair", vec![Value::string("l"), Value::string("r")])
        .unwrap();
    assert_eq!(interp.get_property(&pair, "right").unwrap().as_str(), Some("r"));

    let args = interp
        .map(vec![(Value::string("level"), Value::Int(3))])
        .unwrap();
    let options = interp.instantiate("Options", vec![args]).unwrap();
    assert_eq!(interp.get_property(&options, "level").unwrap().as_int(), Some(3));
    assert_eq!(interp.get_property(&options, "verbose").unwrap().as_bool(), Some(false));
    assert!(interp.instantiate("Options", vec![]).is_ok());
}

#[test]
fn sortable_compares_properties_in_order() {
    let unit = compile(
        r#"{"classes": [{
            "name": "Name",
            "annotations": [{"type": "Sortable"}],
            "properties": [
                {"name": "last", "type": "String"},
                {"name": "first", "type": "String"}
            ]
        }]}"#,
    );
    let mut interp = Interpreter::new(unit.ast());
    let mut make = |last: &str, first: &str| {
        let args = interp
            .map(vec![
                (Value::string("last"), Value::string(last)),
                (Value::string("first"), Value::string(first)),
            ])
            .unwrap();
        interp.instantiate("Name", vec![args]).unwrap()
    };
    let ann = make("Doe", "Ann");
    let bo = make("Doe", "Bo");
    let cy = make("Abe", "Cy");

    let cmp = interp.call(&ann, "compareTo", vec![bo.clone()]).unwrap();
    assert!(cmp.as_int().unwrap() < 0);
    let cmp = interp.call(&ann, "compareTo", vec![cy]).unwrap();
    assert!(cmp.as_int().unwrap() > 0);
    assert_eq!(interp.call(&ann, "compareTo", vec![ann.clone()]).unwrap().as_int(), Some(0));

    let class = unit.ast().find_class("Name").unwrap();
    assert!(unit.ast().declares_method(class, "comparatorByFirst", 0));
}
