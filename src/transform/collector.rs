//! The annotation collector.
//!
//! Runs once per class at semantic analysis, ahead of that phase's
//! dispatcher. It walks the class, resolves each annotation use to its
//! annotation type and registers every transformation class the type names in
//! the class's pending map, under the phase the transformation declares.

use super::{alias, names, AnnotationType, ClassLoader, LoadError};
use crate::ast::{walk_class, AnnotationId, AnnotationValue, Ast, ClassId, NodeRef, TypeRef};
use crate::compiler::{CompilePhase, SourceUnit};
use crate::errors::{ErrorKind, InternalError};

/// Annotation uses under a class, in walk order.
pub fn annotation_uses(ast: &Ast, class: ClassId) -> Vec<AnnotationId> {
    let mut uses = Vec::new();
    walk_class(
        &mut |_: &Ast, node: NodeRef| {
            if let NodeRef::Annotation(id) = node {
                uses.push(id);
            }
        },
        ast,
        class,
    );
    uses
}

/// The transformation-bearing annotation type `ty` refers to, either declared
/// in this compilation or known to the loader. Aliases are not included.
pub fn transform_annotation_type(
    ast: &Ast,
    loader: &dyn ClassLoader,
    ty: &TypeRef,
) -> Option<AnnotationType> {
    if let Some(class) = ast.find_class(&ty.name) {
        if ast.class(class).is_annotation_type() {
            return declared_annotation_type(ast, class);
        }
    }
    loader.annotation_type(&ty.name).filter(|t| t.alias.is_none())
}

fn declared_annotation_type(ast: &Ast, class: ClassId) -> Option<AnnotationType> {
    let marker = ast.find_annotation(NodeRef::Class(class), names::AST_TRANSFORMATION_CLASS)?;
    let marker = ast.annotation(marker);
    let transform_names = marker
        .member("value")
        .and_then(AnnotationValue::as_strings)
        .unwrap_or_default();
    let transform_classes = marker
        .member("classes")
        .and_then(AnnotationValue::as_classes)
        .unwrap_or_default();
    Some(AnnotationType {
        name: ast.class(class).name.clone(),
        transform_names,
        transform_classes,
        alias: None,
    })
}

/// Expands aliases, then registers the class's transformations.
pub fn collect_class(
    ast: &mut Ast,
    source: &mut SourceUnit,
    loader: &dyn ClassLoader,
    class: ClassId,
) -> Result<(), InternalError> {
    alias::expand_aliases(ast, source, loader, class)?;

    let is_trait = ast.is_trait(class);
    let mut registrations = Vec::new();
    for anno in annotation_uses(ast, class) {
        let node = ast.annotation(anno);
        // Trait members are transformed where the trait is applied.
        if is_trait && !node.is_type(names::TRAIT) {
            continue;
        }
        let Some(ty) = transform_annotation_type(ast, loader, &node.ty) else {
            continue;
        };
        let pos = node.pos;
        let declared_by = names::at_name(&ty.name);

        let transforms: Vec<String> = match (
            ty.transform_names.is_empty(),
            ty.transform_classes.is_empty(),
        ) {
            (true, true) => {
                source.add_error(ErrorKind::NoTransformClasses { annotation: declared_by }, pos);
                continue;
            }
            (false, false) => {
                source.add_error(
                    ErrorKind::AmbiguousTransformClasses {
                        annotation: declared_by,
                    },
                    pos,
                );
                continue;
            }
            (false, true) => ty.transform_names.clone(),
            (true, false) => ty
                .transform_classes
                .iter()
                .map(|c| c.qualified_name().to_string())
                .collect(),
        };

        for transform in transforms {
            match loader.resolve_transformation(&transform) {
                Ok(handle) => {
                    let phase = handle.phase.unwrap_or(CompilePhase::Canonicalization);
                    if phase < CompilePhase::SemanticAnalysis {
                        source.add_error(
                            ErrorKind::LocalPhaseTooEarly {
                                annotation: declared_by.clone(),
                                phase: phase.to_string(),
                            },
                            pos,
                        );
                        continue;
                    }
                    registrations.push((phase, transform, anno));
                }
                Err(LoadError::NotFound(_)) if ast.find_class(&transform).is_none() => {
                    source.add_error(
                        ErrorKind::TransformNotFound {
                            transform,
                            declared_by: declared_by.clone(),
                        },
                        pos,
                    );
                }
                Err(_) => {
                    source.add_error(
                        ErrorKind::NotATransformation {
                            transform,
                            declared_by: declared_by.clone(),
                        },
                        pos,
                    );
                }
            }
        }
    }

    let pending = &mut ast.class_mut(class).transforms;
    for (phase, transform, anno) in registrations {
        if pending.register(phase, &transform, anno) {
            tracing::trace!(%class, %phase, transform = %transform, annotation = %anno, "registered transformation");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AnnotationNode, ClassNode, Modifiers};
    use crate::errors::WarningCategory;
    use crate::transform::TransformLoader;

    fn setup(annotations: &[&str]) -> (Ast, SourceUnit, ClassId) {
        let mut ast = Ast::new();
        let module = ast.add_module("A.json", None);
        let class = ast.add_class(module, ClassNode::new("A", Modifiers::PUBLIC));
        for a in annotations {
            ast.annotate(NodeRef::Class(class), AnnotationNode::new(*a))
                .unwrap();
        }
        let source = SourceUnit::new("A.json", module, WarningCategory::LikelyErrors);
        (ast, source, class)
    }

    #[test]
    fn registers_builtin_under_declared_phase() {
        let (mut ast, mut source, class) = setup(&["ToString", "Builder"]);
        let loader = TransformLoader::with_builtins();
        collect_class(&mut ast, &mut source, &loader, class).unwrap();
        let pending = &ast.class(class).transforms;
        let canon = pending.for_phase(CompilePhase::Canonicalization).unwrap();
        assert!(canon.contains_key(&names::transform_class(names::TO_STRING)));
        let semantic = pending.for_phase(CompilePhase::SemanticAnalysis).unwrap();
        assert!(semantic.contains_key(&names::transform_class(names::BUILDER)));
        assert!(!source.errors().has_errors());
    }

    #[test]
    fn unknown_annotations_are_ignored() {
        let (mut ast, mut source, class) = setup(&["Deprecated"]);
        let loader = TransformLoader::with_builtins();
        collect_class(&mut ast, &mut source, &loader, class).unwrap();
        assert_eq!(ast.class(class).transforms.phases().count(), 0);
        assert!(!source.errors().has_errors());
    }
}
