//! Collection and phase-bound dispatch, observed through transformations
//! that only record when and where they ran.

mod common;

use canopy::ast::{AnnotationNode, Ast, ClassId, Constant, Expr, MethodNode, Modifiers, NodeRef, Stmt};
use canopy::ast::printer::print_module;
use canopy::errors::{CompileFailure, InternalError};
use canopy::transform::collector::annotation_uses;
use canopy::transform::dispatch::collect_targets;
use canopy::transform::{AnnotationType, AstTransformation, TransformContext, TransformLoader};
use canopy::{CompilePhase, CompilerConfiguration};
use common::{document, error_messages, try_compile_with};
use indexmap::IndexSet;

const RECORD: &str = "demo.RecordTransformation";
const SPAWN: &str = "demo.SpawnTransformation";

fn owner_class(ast: &Ast, node: NodeRef) -> ClassId {
    match node {
        NodeRef::Class(c) => c,
        NodeRef::Method(m) | NodeRef::Parameter(m, _) => ast.method(m).owner,
        NodeRef::Field(f) => ast.field(f).owner,
        other => panic!("unexpected target {other:?}"),
    }
}

/// Appends `"<tag>@<PHASE>"` to the static initializers of the target's class.
#[derive(Default)]
struct Record;

impl AstTransformation for Record {
    fn visit(&mut self, nodes: &[NodeRef], cx: &mut TransformContext<'_>) -> Result<(), InternalError> {
        let [NodeRef::Annotation(anno), target] = nodes else {
            return Err(InternalError::invariant("expected an annotation and its target"));
        };
        let tag = cx
            .ast
            .annotation(*anno)
            .member("tag")
            .and_then(|v| v.as_str())
            .unwrap_or("?")
            .to_string();
        let class = owner_class(cx.ast, *target);
        let entry = format!("{}@{}", tag, cx.phase);
        cx.ast
            .class_mut(class)
            .static_initializers
            .push(Stmt::Expr(Expr::Constant(Constant::Str(entry))));
        Ok(())
    }
}

/// Adds a method carrying a fresh `@Record` while dispatch is under way.
#[derive(Default)]
struct Spawn;

impl AstTransformation for Spawn {
    fn visit(&mut self, nodes: &[NodeRef], cx: &mut TransformContext<'_>) -> Result<(), InternalError> {
        let class = owner_class(cx.ast, nodes[1]);
        let method = cx.ast.add_method(
            class,
            MethodNode::method("spawned", Modifiers::PUBLIC, "void".into(), vec![], Stmt::block(vec![])),
        );
        cx.ast.annotate(
            NodeRef::Method(method),
            AnnotationNode::new("demo.Record").with_member("tag", canopy::ast::AnnotationValue::string("spawned")),
        )?;
        Ok(())
    }
}

fn loader() -> TransformLoader {
    let mut loader = TransformLoader::with_builtins();
    loader.register::<Record>(RECORD, CompilePhase::Canonicalization);
    loader.register::<Record>("demo.LateRecordTransformation", CompilePhase::ClassGeneration);
    loader.register::<Spawn>(SPAWN, CompilePhase::Canonicalization);
    loader.register_annotation_type(AnnotationType::transforming("demo.Record", &[RECORD]));
    loader.register_annotation_type(AnnotationType::transforming(
        "demo.Late",
        &["demo.LateRecordTransformation"],
    ));
    loader.register_annotation_type(AnnotationType::transforming("demo.Spawn", &[SPAWN]));
    loader.register_annotation_type(AnnotationType::transforming(
        "demo.TooEarly",
        &["demo.EarlyTransformation"],
    ));
    loader.register::<Record>("demo.EarlyTransformation", CompilePhase::Conversion);
    loader
}

fn recorded(ast: &Ast, name: &str) -> Vec<String> {
    let class = ast.find_class(name).expect("class exists");
    ast.class(class)
        .static_initializers
        .iter()
        .filter_map(|s| match s {
            Stmt::Expr(Expr::Constant(Constant::Str(entry))) => Some(entry.clone()),
            _ => None,
        })
        .collect()
}

const ORDERED: &str = r#"{
    "package": "demo",
    "classes": [{
        "name": "Job",
        "annotations": [
            {"type": "demo.Late", "members": {"tag": "late"}},
            {"type": "demo.Record", "members": {"tag": "first"}},
            {"type": "demo.Record", "members": {"tag": "second"}}
        ],
        "methods": [{
            "name": "run",
            "returns": "void",
            "annotations": [{"type": "demo.Record", "members": {"tag": "method"}}],
            "body": {"block": []}
        }]
    }]
}"#;

#[test]
fn transformations_run_in_phase_then_walk_order() {
    let (unit, result) = try_compile_with(loader(), CompilerConfiguration::default(), ORDERED);
    result.unwrap();
    assert_eq!(
        recorded(unit.ast(), "demo.Job"),
        [
            "first@CANONICALIZATION",
            "second@CANONICALIZATION",
            "method@CANONICALIZATION",
            "late@CLASS_GENERATION",
        ]
    );
}

#[test]
fn rerunning_a_completed_phase_dispatches_nothing() {
    let mut unit = canopy::CompilationUnit::new(CompilerConfiguration::default(), loader());
    unit.add_document("Job.json", &document(ORDERED)).unwrap();
    unit.compile_to(CompilePhase::Canonicalization).unwrap();
    unit.compile_to(CompilePhase::Canonicalization).unwrap();
    assert_eq!(recorded(unit.ast(), "demo.Job").len(), 3);
    assert_eq!(unit.completed_phase(), Some(CompilePhase::Canonicalization));

    let class = unit.ast().find_class("demo.Job").unwrap();
    for anno in unit.ast().annotations_of(NodeRef::Class(class)).iter().skip(1) {
        assert!(unit
            .ast()
            .class(class)
            .transforms
            .was_dispatched(CompilePhase::Canonicalization, RECORD, *anno));
    }

    unit.compile().unwrap();
    assert_eq!(recorded(unit.ast(), "demo.Job").len(), 4);
}

#[test]
fn nodes_added_during_dispatch_are_not_revisited() {
    let json = r#"{"classes": [{
        "name": "Host",
        "annotations": [{"type": "demo.Spawn"}]
    }]}"#;
    let (unit, result) = try_compile_with(loader(), CompilerConfiguration::default(), json);
    result.unwrap();
    let class = unit.ast().find_class("Host").unwrap();
    assert!(unit.ast().declares_method(class, "spawned", 0));
    assert!(recorded(unit.ast(), "Host").is_empty());
}

#[test]
fn unit_declared_annotation_types_name_their_transformations() {
    let json = r#"{
        "package": "demo",
        "classes": [
            {
                "name": "Audit",
                "modifiers": ["public", "annotation"],
                "annotations": [{
                    "type": "canopy.transform.AstTransformationClass",
                    "members": {"value": "demo.RecordTransformation"}
                }]
            },
            {
                "name": "Ledger",
                "annotations": [{"type": "demo.Audit", "members": {"tag": "audited"}}]
            }
        ]
    }"#;
    let (unit, result) = try_compile_with(loader(), CompilerConfiguration::default(), json);
    result.unwrap();
    assert_eq!(recorded(unit.ast(), "demo.Ledger"), ["audited@CANONICALIZATION"]);
}

#[test]
fn missing_and_early_transformations_are_reported() {
    let json = r#"{
        "package": "demo",
        "classes": [
            {
                "name": "Broken",
                "modifiers": ["public", "annotation"],
                "annotations": [{
                    "type": "canopy.transform.AstTransformationClass",
                    "members": {"value": "demo.Nowhere"}
                }]
            },
            {
                "name": "Empty",
                "modifiers": ["public", "annotation"],
                "annotations": [{"type": "canopy.transform.AstTransformationClass"}]
            },
            {
                "name": "User",
                "annotations": [
                    {"type": "demo.Broken"},
                    {"type": "demo.Empty"},
                    {"type": "demo.TooEarly"}
                ]
            }
        ]
    }"#;
    let (unit, result) = try_compile_with(loader(), CompilerConfiguration::default(), json);
    match result {
        Err(CompileFailure::CompilationFailed { errors, phase }) => {
            assert_eq!(errors, 3);
            assert_eq!(phase, CompilePhase::SemanticAnalysis);
        }
        other => panic!("expected a failed compilation, got {other:?}"),
    }
    let messages = error_messages(&unit);
    assert!(messages[0].starts_with("Could not find class for Transformation Processor demo.Nowhere"));
    assert!(messages[1].contains("does not specify any transform class names/classes"));
    assert!(messages[2].contains("Local AST transformations must run in SEMANTIC_ANALYSIS or later!"));
}

#[test]
fn target_phase_stops_compilation_early() {
    let config = CompilerConfiguration {
        target_phase: CompilePhase::SemanticAnalysis,
        ..CompilerConfiguration::default()
    };
    let (unit, result) = try_compile_with(loader(), config, ORDERED);
    result.unwrap();
    assert!(recorded(unit.ast(), "demo.Job").is_empty());
    let class = unit.ast().find_class("demo.Job").unwrap();
    assert!(!unit
        .ast()
        .class(class)
        .transforms
        .is_empty_for(CompilePhase::Canonicalization));
}

#[test]
fn gathering_annotation_uses_leaves_the_tree_untouched() {
    let mut unit = canopy::CompilationUnit::new(CompilerConfiguration::default(), loader());
    let module = unit.add_document("Job.json", &document(ORDERED)).unwrap();
    let before = print_module(unit.ast(), module);
    let class = unit.ast().find_class("demo.Job").unwrap();
    let triggers: IndexSet<_> = annotation_uses(unit.ast(), class).into_iter().collect();
    let targets = collect_targets(unit.ast(), class, &triggers);
    assert_eq!(targets.len(), triggers.len());
    assert_eq!(targets.len(), 4);
    assert_eq!(print_module(unit.ast(), module), before);
}
