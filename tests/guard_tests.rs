//! Interruption guards, logging and null checks at run time.

mod common;

use canopy::eval::{Interpreter, Value};
use common::compile;

fn worker(annotation: &str) -> String {
    format!(
        r#"{{
            "package": "demo",
            "classes": [{{
                "name": "Worker",
                "annotations": [{annotation}],
                "methods": [{{
                    "name": "work",
                    "returns": "int",
                    "body": {{"return": {{"constant": 42}}}}
                }}]
            }}]
        }}"#
    )
}

#[test]
fn thread_interrupt_stops_the_next_call() {
    let unit = compile(&worker(r#"{"type": "ThreadInterrupt"}"#));
    let mut interp = Interpreter::new(unit.ast());
    let worker = interp.instantiate("demo.Worker", vec![]).unwrap();
    assert_eq!(interp.call(&worker, "work", vec![]).unwrap().as_int(), Some(42));

    interp.interrupt();
    let err = interp.call(&worker, "work", vec![]).unwrap_err();
    assert!(err.is_thrown("java.lang.InterruptedException"), "{err}");
    assert_eq!(
        err.to_string(),
        "java.lang.InterruptedException: Execution interrupted. The current thread has been interrupted."
    );
}

#[test]
fn timed_interrupt_expires_once_the_clock_passes_the_deadline() {
    let unit = compile(&worker(r#"{"type": "TimedInterrupt", "members": {"value": 1}}"#));
    let mut interp = Interpreter::new(unit.ast());
    let worker = interp.instantiate("demo.Worker", vec![]).unwrap();
    interp.advance_clock(500_000_000);
    assert_eq!(interp.call(&worker, "work", vec![]).unwrap().as_int(), Some(42));

    interp.advance_clock(2_000_000_000);
    let err = interp.call(&worker, "work", vec![]).unwrap_err();
    assert!(err.is_thrown("TimeoutException"));
    assert_eq!(
        err.to_string(),
        "java.util.concurrent.TimeoutException: Execution timed out after 1 seconds."
    );

    // The deadline is per instance.
    let fresh = interp.instantiate("demo.Worker", vec![]).unwrap();
    assert!(interp.call(&fresh, "work", vec![]).is_ok());
}

#[test]
fn timed_interrupt_honours_the_unit() {
    let unit = compile(&worker(
        r#"{"type": "TimedInterrupt", "members": {
            "value": 250,
            "unit": {"owner": "java.util.concurrent.TimeUnit", "property": "MILLISECONDS"}
        }}"#,
    ));
    let mut interp = Interpreter::new(unit.ast());
    let worker = interp.instantiate("demo.Worker", vec![]).unwrap();
    interp.advance_clock(300_000_000);
    let err = interp.call(&worker, "work", vec![]).unwrap_err();
    assert!(err
        .to_string()
        .ends_with("Execution timed out after 250 milliseconds."));
}

const SERVICE: &str = r#"{
    "package": "demo",
    "classes": [{
        "name": "Service",
        "annotations": [{"type": "Log"}],
        "methods": [{
            "name": "start",
            "returns": "void",
            "body": {"block": [
                {"expr": {"call": {"receiver": {"var": "log"}, "method": "info", "args": [{"constant": "started"}]}}},
                {"expr": {"call": {"receiver": {"var": "log"}, "method": "fine", "args": [
                    {"binary": {"op": "add", "left": {"constant": "details: "}, "right": {"constant": 7}}}
                ]}}}
            ]}
        }]
    }]
}"#;

#[test]
fn log_records_messages_above_the_threshold() {
    let unit = compile(SERVICE);
    let mut interp = Interpreter::new(unit.ast());
    let service = interp.instantiate("demo.Service", vec![]).unwrap();
    interp.call(&service, "start", vec![]).unwrap();

    let records: Vec<(&str, &str, &str)> = interp
        .log_records()
        .iter()
        .map(|r| (r.logger.as_str(), r.level.as_str(), r.message.as_str()))
        .collect();
    assert_eq!(records, [("demo.Service", "INFO", "started")]);

    interp.set_log_level("FINE").unwrap();
    interp.call(&service, "start", vec![]).unwrap();
    let last = interp.log_records().last().unwrap();
    assert_eq!((last.level.as_str(), last.message.as_str()), ("FINE", "details: 7"));
    assert_eq!(interp.log_records().len(), 3);
}

#[test]
fn null_check_rejects_null_arguments() {
    let unit = compile(
        r#"{
            "package": "demo",
            "classes": [{
                "name": "Greeter",
                "annotations": [{"type": "NullCheck"}],
                "methods": [{
                    "name": "greet",
                    "returns": "String",
                    "params": [{"name": "p", "type": "String"}],
                    "body": {"return": {"binary": {"op": "add", "left": {"constant": "Hi "}, "right": {"var": "p"}}}}
                }]
            }]
        }"#,
    );
    let mut interp = Interpreter::new(unit.ast());
    let greeter = interp.instantiate("demo.Greeter", vec![]).unwrap();
    let reply = interp
        .call(&greeter, "greet", vec![Value::string("Bo")])
        .unwrap();
    assert_eq!(reply.as_str(), Some("Hi Bo"));

    let err = interp.call(&greeter, "greet", vec![Value::Null]).unwrap_err();
    assert!(err.is_thrown("IllegalArgumentException"));
    assert!(err.to_string().ends_with("p cannot be null"));
}
