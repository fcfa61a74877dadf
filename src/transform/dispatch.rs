//! Per-phase dispatch of local transformations.
//!
//! ## Purpose
//! Runs the transformations registered on a class for one phase.
//!
//! ## Invariants
//! - Pass 1 ([`collect_targets`]) borrows the AST shared and returns the
//!   targets; it cannot mutate.
//! - Pass 2 visits exactly the pass-1 targets, in discovery order. Nodes
//!   synthesized during pass 2 are not revisited.
//! - The phase entry is drained before pass 2 starts, so a pair never runs
//!   twice in one phase.

use super::{AstTransformation, ClassLoader, TransformContext};
use crate::ast::{walk_class, AnnotationId, Ast, ClassId, NodeRef};
use crate::compiler::{CompilePhase, SourceUnit};
use crate::config::CompilerConfiguration;
use crate::errors::{ErrorKind, InternalError};
use indexmap::{IndexMap, IndexSet};

/// An annotation use and the node it annotates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub annotation: AnnotationId,
    pub node: NodeRef,
}

impl Target {
    /// The `[annotation, annotated node]` pair handed to `visit`.
    pub fn nodes(self) -> [NodeRef; 2] {
        [NodeRef::Annotation(self.annotation), self.node]
    }
}

/// Pass 1: the annotation uses under `class` that trigger a transformation,
/// in walk order.
pub fn collect_targets(ast: &Ast, class: ClassId, triggers: &IndexSet<AnnotationId>) -> Vec<Target> {
    let mut targets = Vec::new();
    let mut owner = NodeRef::Class(class);
    walk_class(
        &mut |_: &Ast, node: NodeRef| match node {
            NodeRef::Annotation(annotation) => {
                if triggers.contains(&annotation) {
                    targets.push(Target {
                        annotation,
                        node: owner,
                    });
                }
            }
            other => owner = other,
        },
        ast,
        class,
    );
    targets
}

struct Instance {
    name: String,
    transform: Box<dyn AstTransformation>,
}

/// Runs every transformation pending on `class` for `phase`.
pub fn dispatch_class(
    ast: &mut Ast,
    source: &mut SourceUnit,
    loader: &dyn ClassLoader,
    config: &CompilerConfiguration,
    phase: CompilePhase,
    class: ClassId,
) -> Result<(), InternalError> {
    let pending = ast.class_mut(class).transforms.take_phase(phase);
    // Guard: nothing registered, no walk.
    if pending.is_empty() {
        return Ok(());
    }

    let mut instances = Vec::new();
    let mut by_annotation: IndexMap<AnnotationId, Vec<usize>> = IndexMap::new();
    for (name, annotations) in pending {
        let created = loader
            .resolve_transformation(&name)
            .map_err(|e| e.to_string())
            .and_then(|handle| handle.instantiate());
        let transform = match created {
            Ok(transform) => transform,
            Err(reason) => {
                source.add_error(
                    ErrorKind::InstantiationFailed {
                        transform: name,
                        reason,
                    },
                    ast.class(class).pos,
                );
                continue;
            }
        };
        let index = instances.len();
        instances.push(Instance { name, transform });
        for annotation in annotations {
            by_annotation.entry(annotation).or_default().push(index);
        }
    }

    let triggers: IndexSet<AnnotationId> = by_annotation.keys().copied().collect();
    let targets = collect_targets(ast, class, &triggers);

    let mut cx = TransformContext {
        ast,
        source,
        loader,
        config,
        phase,
    };
    for target in targets {
        let Some(indices) = by_annotation.get(&target.annotation) else {
            continue;
        };
        for index in indices {
            let instance = &mut instances[*index];
            tracing::debug!(
                %phase,
                transform = %instance.name,
                target = %cx.ast.describe(target.node),
                "applying transformation"
            );
            instance.transform.visit(&target.nodes(), &mut cx)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AnnotationNode, ClassNode, FieldNode, Modifiers, TypeRef};
    use crate::errors::WarningCategory;
    use crate::transform::TransformLoader;
    use std::sync::{Arc, Mutex};

    fn field(name: &str) -> FieldNode {
        FieldNode {
            name: name.into(),
            modifiers: Modifiers::PRIVATE,
            ty: TypeRef::string(),
            init: None,
            annotations: Vec::new(),
            owner: ClassId(0),
            pos: Default::default(),
        }
    }

    #[test]
    fn targets_pair_annotations_with_their_owner() {
        let mut ast = Ast::new();
        let module = ast.add_module("M", None);
        let class = ast.add_class(module, ClassNode::new("C", Modifiers::PUBLIC));
        let on_class = ast
            .annotate(NodeRef::Class(class), AnnotationNode::new("A"))
            .unwrap();
        let f = ast.add_field(class, field("x"));
        let on_field = ast
            .annotate(NodeRef::Field(f), AnnotationNode::new("B"))
            .unwrap();
        let snapshot = ast.clone();

        let triggers: IndexSet<_> = [on_field, on_class].into_iter().collect();
        let targets = collect_targets(&ast, class, &triggers);
        assert_eq!(
            targets,
            vec![
                Target {
                    annotation: on_class,
                    node: NodeRef::Class(class)
                },
                Target {
                    annotation: on_field,
                    node: NodeRef::Field(f)
                },
            ]
        );
        assert_eq!(ast, snapshot);
    }

    #[derive(Clone)]
    struct Recorder(Arc<Mutex<Vec<NodeRef>>>);

    impl AstTransformation for Recorder {
        fn visit(
            &mut self,
            nodes: &[NodeRef],
            cx: &mut TransformContext<'_>,
        ) -> Result<(), InternalError> {
            self.0.lock().unwrap().push(nodes[1]);
            // Synthesized members must not be picked up by this pass.
            if let NodeRef::Class(c) = nodes[1] {
                let f = cx.ast.add_field(c, field("added"));
                cx.ast.annotate(NodeRef::Field(f), AnnotationNode::new("demo.Mark"))?;
            }
            Ok(())
        }
    }

    #[test]
    fn each_pair_runs_once_and_new_nodes_are_not_revisited() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut loader = TransformLoader::new();
        let recorder = Recorder(Arc::clone(&seen));
        loader.register_transform("demo.Rec", Some(CompilePhase::Canonicalization), move || {
            Ok(Box::new(recorder.clone()) as Box<dyn AstTransformation>)
        });

        let mut ast = Ast::new();
        let module = ast.add_module("M", None);
        let class = ast.add_class(module, ClassNode::new("C", Modifiers::PUBLIC));
        let anno = ast
            .annotate(NodeRef::Class(class), AnnotationNode::new("demo.Mark"))
            .unwrap();
        let phase = CompilePhase::Canonicalization;
        ast.class_mut(class).transforms.register(phase, "demo.Rec", anno);

        let mut source = SourceUnit::new("M", module, WarningCategory::LikelyErrors);
        let config = CompilerConfiguration::default();
        dispatch_class(&mut ast, &mut source, &loader, &config, phase, class).unwrap();
        dispatch_class(&mut ast, &mut source, &loader, &config, phase, class).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![NodeRef::Class(class)]);
        assert!(!ast.class_mut(class).transforms.register(phase, "demo.Rec", anno));
    }

    #[test]
    fn instantiation_failure_is_reported_and_skipped() {
        let mut loader = TransformLoader::new();
        loader.register_transform("demo.Broken", Some(CompilePhase::Canonicalization), || {
            Err("constructor threw".to_string())
        });
        let mut ast = Ast::new();
        let module = ast.add_module("M", None);
        let class = ast.add_class(module, ClassNode::new("C", Modifiers::PUBLIC));
        let anno = ast
            .annotate(NodeRef::Class(class), AnnotationNode::new("demo.Mark"))
            .unwrap();
        let phase = CompilePhase::Canonicalization;
        ast.class_mut(class)
            .transforms
            .register(phase, "demo.Broken", anno);

        let mut source = SourceUnit::new("M", module, WarningCategory::LikelyErrors);
        let config = CompilerConfiguration::default();
        dispatch_class(&mut ast, &mut source, &loader, &config, phase, class).unwrap();
        assert_eq!(
            source.errors().errors()[0].message(),
            "Could not instantiate Transformation Processor demo.Broken: constructor threw"
        );
    }
}
