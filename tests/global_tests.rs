//! Global transformations discovered from service files on the classpath.

mod common;

use canopy::ast::{Constant, Expr, MethodNode, Modifiers, NodeRef, Stmt};
use canopy::errors::{CompileFailure, InternalError};
use canopy::eval::Interpreter;
use canopy::transform::names::SERVICE_PATH;
use canopy::transform::{AstTransformation, TransformContext, TransformLoader};
use canopy::{CompilePhase, CompilerConfiguration};
use common::{error_messages, try_compile_with};
use std::path::Path;
use tempfile::TempDir;

const VERSION: &str = "demo.VersionTransformation";

/// Gives every class in the module a static `version()` returning "1.0".
#[derive(Default)]
struct Version;

impl AstTransformation for Version {
    fn visit(&mut self, nodes: &[NodeRef], cx: &mut TransformContext<'_>) -> Result<(), InternalError> {
        let [NodeRef::Module(module)] = nodes else {
            return Err(InternalError::invariant("global transforms visit a module"));
        };
        let classes = cx.ast.module(*module).classes.clone();
        for class in classes {
            if cx.ast.declares_method(class, "version", 0) {
                continue;
            }
            cx.ast.add_method(
                class,
                MethodNode::method(
                    "version",
                    Modifiers::PUBLIC | Modifiers::STATIC,
                    "String".into(),
                    vec![],
                    Stmt::Return(Some(Expr::Constant(Constant::Str("1.0".into())))),
                ),
            );
        }
        Ok(())
    }
}

fn loader() -> TransformLoader {
    let mut loader = TransformLoader::with_builtins();
    loader.register::<Version>(VERSION, CompilePhase::Conversion);
    loader
}

fn classpath_dir(service: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join(SERVICE_PATH);
    std::fs::create_dir_all(file.parent().unwrap()).unwrap();
    std::fs::write(&file, service).unwrap();
    dir
}

fn config(dirs: &[&Path]) -> CompilerConfiguration {
    CompilerConfiguration {
        classpath: dirs.iter().map(|d| d.to_path_buf()).collect(),
        ..CompilerConfiguration::default()
    }
}

const APP: &str = r#"{"package": "demo", "classes": [{"name": "App"}]}"#;

#[test]
fn service_file_registers_a_global_transform() {
    let dir = classpath_dir(&format!("# versions\n{}\n", VERSION));
    let (unit, result) = try_compile_with(loader(), config(&[dir.path()]), APP);
    result.unwrap();

    let mut interp = Interpreter::new(unit.ast());
    let version = interp.call_static("demo.App", "version", vec![]).unwrap();
    assert_eq!(version.as_str(), Some("1.0"));
}

#[test]
fn disabled_global_transforms_are_skipped() {
    let dir = classpath_dir(VERSION);
    let config = CompilerConfiguration {
        disabled_global_transforms: vec![VERSION.to_string()],
        ..config(&[dir.path()])
    };
    let (unit, result) = try_compile_with(loader(), config, APP);
    result.unwrap();
    let app = unit.ast().find_class("demo.App").unwrap();
    assert!(!unit.ast().declares_method(app, "version", 0));
}

#[test]
fn duplicate_declarations_warn_and_run_once() {
    let first = classpath_dir(VERSION);
    let second = classpath_dir(VERSION);
    let config = CompilerConfiguration {
        warning_level: 2,
        ..config(&[first.path(), second.path()])
    };
    let (unit, result) = try_compile_with(loader(), config, APP);
    result.unwrap();

    let warnings: Vec<String> = unit
        .diagnostics()
        .into_iter()
        .filter(|d| d.is_warning())
        .map(|d| d.message())
        .collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].starts_with(&format!(
        "The global transform for class {} is defined in both",
        VERSION
    )));

    let app = unit.ast().find_class("demo.App").unwrap();
    assert_eq!(unit.ast().methods_named(app, "version").len(), 1);
}

#[test]
fn duplicate_warning_is_below_the_default_level() {
    let first = classpath_dir(VERSION);
    let second = classpath_dir(VERSION);
    let (unit, result) = try_compile_with(loader(), config(&[first.path(), second.path()]), APP);
    result.unwrap();
    assert!(unit.diagnostics().is_empty());
}

#[test]
fn invalid_entries_fail_initialization() {
    let dir = classpath_dir("9bad\ndemo.Missing\n");
    let (unit, result) = try_compile_with(loader(), config(&[dir.path()]), APP);
    match result {
        Err(CompileFailure::CompilationFailed { errors, phase }) => {
            assert_eq!(errors, 2);
            assert_eq!(phase, CompilePhase::Initialization);
        }
        other => panic!("expected a failed compilation, got {other:?}"),
    }
    let messages = error_messages(&unit);
    assert!(messages[0].starts_with("Invalid transform class name '9bad'"));
    assert!(messages[1].starts_with("Could not find class for Transformation Processor demo.Missing"));
}

#[test]
fn in_memory_resources_are_scanned_too() {
    let mut loader = loader();
    loader.add_resource("plugins", SERVICE_PATH, VERSION);
    let (unit, result) = try_compile_with(loader, CompilerConfiguration::default(), APP);
    result.unwrap();
    let app = unit.ast().find_class("demo.App").unwrap();
    assert!(unit.ast().declares_method(app, "version", 0));
}
