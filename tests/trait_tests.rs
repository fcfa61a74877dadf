//! Trait flattening and composition, run through the evaluator.

mod common;

use canopy::eval::{Interpreter, Value};
use common::{compile, error_messages, try_compile};

const GREETERS: &str = r#"{
    "package": "demo",
    "classes": [
        {
            "name": "Greeter",
            "annotations": [{"type": "Trait"}],
            "fields": [{
                "name": "greeting",
                "modifiers": ["private"],
                "type": "String",
                "init": {"constant": "Hello"}
            }],
            "methods": [{
                "name": "greet",
                "returns": "String",
                "params": [{"name": "who", "type": "String"}],
                "body": {"return": {"binary": {
                    "op": "add",
                    "left": {"binary": {"op": "add", "left": {"var": "greeting"}, "right": {"constant": ", "}}},
                    "right": {"var": "who"}
                }}}
            }]
        },
        {
            "name": "Loud",
            "annotations": [{"type": "Trait"}],
            "methods": [{
                "name": "greet",
                "returns": "String",
                "params": [{"name": "who", "type": "String"}],
                "body": {"return": {"binary": {"op": "add", "left": {"constant": "HEY "}, "right": {"var": "who"}}}}
            }]
        },
        {
            "name": "Friendly",
            "implements": ["demo.Greeter"]
        },
        {
            "name": "Shouty",
            "implements": ["demo.Greeter", "demo.Loud"]
        },
        {
            "name": "Formal",
            "implements": ["demo.Greeter"],
            "methods": [{
                "name": "greet",
                "returns": "String",
                "params": [{"name": "who", "type": "String"}],
                "body": {"return": {"binary": {"op": "add", "left": {"constant": "Good day, "}, "right": {"var": "who"}}}}
            }]
        }
    ]
}"#;

fn greet(interp: &mut Interpreter<'_>, class: &str) -> String {
    let instance = interp.instantiate(class, vec![]).unwrap();
    let reply = interp
        .call(&instance, "greet", vec![Value::string("Bo")])
        .unwrap();
    reply.as_str().unwrap().to_string()
}

#[test]
fn flattened_trait_becomes_interface_and_helpers() {
    let unit = compile(GREETERS);
    let ast = unit.ast();
    let greeter = ast.find_class("demo.Greeter").unwrap();
    assert!(ast.class(greeter).is_interface());
    assert!(ast.find_class("demo.Greeter$Trait$Helper").is_some());
    let field_helper = ast.find_class("demo.Greeter$Trait$FieldHelper").unwrap();
    let names: Vec<&str> = ast
        .class(field_helper)
        .methods
        .iter()
        .map(|m| ast.method(*m).name.as_str())
        .collect();
    assert_eq!(names, ["demo_Greeter__greeting$set", "demo_Greeter__greeting$get"]);
    // Traits without fields get no field helper.
    assert!(ast.find_class("demo.Loud$Trait$FieldHelper").is_none());
}

#[test]
fn implementing_class_forwards_to_the_trait_with_its_own_state() {
    let unit = compile(GREETERS);
    let mut interp = Interpreter::new(unit.ast());
    assert_eq!(greet(&mut interp, "demo.Friendly"), "Hello, Bo");

    let class = unit.ast().find_class("demo.Friendly").unwrap();
    assert!(unit
        .ast()
        .field_by_name(class, "demo_Greeter__greeting")
        .is_some());
}

#[test]
fn later_trait_wins_and_own_methods_are_kept() {
    let unit = compile(GREETERS);
    let mut interp = Interpreter::new(unit.ast());
    assert_eq!(greet(&mut interp, "demo.Shouty"), "HEY Bo");
    assert_eq!(greet(&mut interp, "demo.Formal"), "Good day, Bo");

    let ast = unit.ast();
    let formal = ast.find_class("demo.Formal").unwrap();
    let greets = ast.methods_named(formal, "greet");
    assert_eq!(greets.len(), 1);
    assert!(!ast.method(greets[0]).generated);
}

#[test]
fn traits_cannot_declare_constructors() {
    let (unit, result) = try_compile(
        r#"{"package": "demo", "classes": [{
            "name": "Broken",
            "annotations": [{"type": "Trait"}],
            "constructors": [{"body": {"block": []}}]
        }]}"#,
    );
    assert!(result.is_err());
    assert_eq!(
        error_messages(&unit),
        ["Error processing trait 'demo.Broken'. Constructors are not allowed."]
    );
}

#[test]
fn locals_hide_trait_fields_only_after_their_declaration_and_within_their_block() {
    let unit = compile(
        r#"{
            "package": "demo",
            "classes": [
                {
                    "name": "Counter",
                    "annotations": [{"type": "Trait"}],
                    "fields": [{
                        "name": "count",
                        "modifiers": ["private"],
                        "type": "int",
                        "init": {"constant": 5}
                    }],
                    "methods": [{
                        "name": "total",
                        "returns": "int",
                        "body": {"block": [
                            {"expr": {"declare": {"type": "int", "name": "before", "init": {"var": "count"}}}},
                            {"if": {
                                "cond": {"constant": true},
                                "then": {"block": [
                                    {"expr": {"declare": {"type": "int", "name": "count", "init": {"constant": 100}}}}
                                ]}
                            }},
                            {"expr": {"declare": {"type": "int", "name": "after", "init": {"var": "count"}}}},
                            {"expr": {"declare": {"type": "int", "name": "count", "init": {"constant": 1}}}},
                            {"return": {"binary": {
                                "op": "add",
                                "left": {"binary": {"op": "add", "left": {"var": "before"}, "right": {"var": "after"}}},
                                "right": {"var": "count"}
                            }}}
                        ]}
                    }]
                },
                {"name": "Tally", "implements": ["demo.Counter"]}
            ]
        }"#,
    );
    let mut interp = Interpreter::new(unit.ast());
    let tally = interp.instantiate("demo.Tally", vec![]).unwrap();
    // Field, field again past the inner block, then the outer local.
    let total = interp.call(&tally, "total", vec![]).unwrap();
    assert_eq!(total.as_int(), Some(5 + 5 + 1));
}
