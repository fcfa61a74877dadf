//! Annotation-collector aliases.
//!
//! An alias annotation stands for a list of other annotations. Expansion
//! replaces each alias use in place, copying the use's members onto every
//! collected annotation, and resolves clashes with explicit annotations of the
//! same type according to the alias mode.

use super::collector::annotation_uses;
use super::{names, AliasDefinition, AliasMode, ClassLoader};
use crate::ast::{AnnotationId, AnnotationNode, AnnotationValue, Ast, ClassId, NodeRef, TypeRef};
use crate::compiler::SourceUnit;
use crate::errors::{ErrorKind, InternalError};

/// The alias definition behind `ty`, if it is an alias.
pub fn alias_definition(
    ast: &Ast,
    loader: &dyn ClassLoader,
    ty: &TypeRef,
) -> Option<Result<AliasDefinition, String>> {
    if let Some(class) = ast.find_class(&ty.name) {
        if ast.class(class).is_annotation_type() {
            return declared_alias(ast, class);
        }
    }
    loader.annotation_type(&ty.name)?.alias.map(Ok)
}

fn declared_alias(ast: &Ast, class: ClassId) -> Option<Result<AliasDefinition, String>> {
    let marker_id = ast.find_annotation(NodeRef::Class(class), names::ANNOTATION_COLLECTOR)?;
    let marker = ast.annotation(marker_id);

    let mode = match marker.member("mode") {
        None => AliasMode::Duplicate,
        Some(value) => match value.as_enum_constant().map(str::parse::<AliasMode>) {
            Some(Ok(mode)) => mode,
            Some(Err(reason)) => return Some(Err(reason)),
            None => return Some(Err(format!("invalid mode {}", value))),
        },
    };

    let annotations = match marker.member("value") {
        Some(value) => match value.as_classes() {
            Some(classes) => classes.into_iter().map(AnnotationNode::new).collect(),
            None => return Some(Err("value must list annotation classes".to_string())),
        },
        None => ast
            .annotations_of(NodeRef::Class(class))
            .iter()
            .map(|a| ast.annotation(*a))
            .filter(|a| {
                !a.is_type(names::ANNOTATION_COLLECTOR) && !a.is_type(names::AST_TRANSFORMATION_CLASS)
            })
            .map(|a| AnnotationNode {
                owner: None,
                ..a.clone()
            })
            .collect::<Vec<_>>(),
    };
    if annotations.is_empty() {
        return Some(Err("it does not collect any annotations".to_string()));
    }
    Some(Ok(AliasDefinition { annotations, mode }))
}

/// Replaces every alias use under `class` with the annotations it collects.
pub fn expand_aliases(
    ast: &mut Ast,
    source: &mut SourceUnit,
    loader: &dyn ClassLoader,
    class: ClassId,
) -> Result<(), InternalError> {
    for anno in annotation_uses(ast, class) {
        let ty = ast.annotation(anno).ty.clone();
        match alias_definition(ast, loader, &ty) {
            None => {}
            Some(Ok(def)) => apply_alias(ast, anno, &def)?,
            Some(Err(reason)) => source.add_error(
                ErrorKind::InvalidAlias {
                    alias: names::at_name(&ty.name),
                    reason,
                },
                ast.annotation(anno).pos,
            ),
        }
    }
    Ok(())
}

fn apply_alias(
    ast: &mut Ast,
    alias_use: AnnotationId,
    def: &AliasDefinition,
) -> Result<(), InternalError> {
    let usage = ast.annotation(alias_use).clone();
    let owner = usage
        .owner
        .ok_or_else(|| InternalError::invariant("alias use is not attached to a node"))?;
    let siblings = ast.annotations_of(owner).to_vec();
    let split = siblings
        .iter()
        .position(|a| *a == alias_use)
        .unwrap_or(siblings.len());
    let before: Vec<AnnotationId> = siblings[..split].to_vec();
    let explicit: Vec<AnnotationId> = siblings
        .iter()
        .copied()
        .filter(|a| *a != alias_use)
        .collect();

    let mut expanded = Vec::new();
    for template in &def.annotations {
        let mut collected = template.clone();
        for (name, value) in &usage.members {
            collected.members.insert(name.clone(), value.clone());
        }
        collected.pos = usage.pos;

        let existing = explicit
            .iter()
            .copied()
            .find(|e| ast.annotation(*e).ty.is(&collected.ty));
        match (def.mode, existing) {
            (AliasMode::Duplicate, _) | (_, None) => expanded.push(collected),
            (AliasMode::PreferCollector, Some(e)) => {
                ast.remove_annotation(e)?;
                expanded.push(collected);
            }
            (AliasMode::PreferCollectorMerged, Some(e)) => {
                merge_missing(&mut collected.members, &ast.annotation(e).members);
                ast.remove_annotation(e)?;
                expanded.push(collected);
            }
            (AliasMode::PreferExplicit, Some(_)) => {}
            (AliasMode::PreferExplicitMerged, Some(e)) => {
                merge_missing(&mut ast.annotation_mut(e).members, &collected.members);
            }
        }
    }

    ast.remove_annotation(alias_use)?;
    let index = ast
        .annotations_of(owner)
        .iter()
        .filter(|a| before.contains(a))
        .count();
    for (offset, anno) in expanded.into_iter().enumerate() {
        ast.insert_annotation(owner, index + offset, anno)?;
    }
    tracing::trace!(alias = %usage.ty, "expanded annotation collector");
    Ok(())
}

fn merge_missing(
    into: &mut indexmap::IndexMap<String, AnnotationValue>,
    from: &indexmap::IndexMap<String, AnnotationValue>,
) {
    for (name, value) in from {
        into.entry(name.clone()).or_insert_with(|| value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ClassNode, Constant, Modifiers};
    use crate::errors::WarningCategory;
    use crate::transform::TransformLoader;

    fn class_with(annotations: Vec<AnnotationNode>) -> (Ast, SourceUnit, ClassId) {
        let mut ast = Ast::new();
        let module = ast.add_module("A.json", None);
        let class = ast.add_class(module, ClassNode::new("A", Modifiers::PUBLIC));
        for a in annotations {
            ast.annotate(NodeRef::Class(class), a).unwrap();
        }
        let source = SourceUnit::new("A.json", module, WarningCategory::LikelyErrors);
        (ast, source, class)
    }

    fn types(ast: &Ast, class: ClassId) -> Vec<String> {
        ast.annotations_of(NodeRef::Class(class))
            .iter()
            .map(|a| ast.annotation(*a).ty.simple_name().to_string())
            .collect()
    }

    fn loader(mode: AliasMode) -> TransformLoader {
        let mut loader = TransformLoader::with_builtins();
        loader.register_alias(
            "demo.Value",
            vec![AnnotationNode::new("ToString"), AnnotationNode::new("EqualsAndHashCode")],
            mode,
        );
        loader
    }

    #[test]
    fn alias_is_replaced_in_place_with_usage_members() {
        let usage = AnnotationNode::new("demo.Value")
            .with_member("excludes", AnnotationValue::string("id"));
        let (mut ast, mut source, class) =
            class_with(vec![AnnotationNode::new("Sortable"), usage, AnnotationNode::new("Log")]);
        expand_aliases(&mut ast, &mut source, &loader(AliasMode::Duplicate), class).unwrap();
        assert_eq!(types(&ast, class), ["Sortable", "ToString", "EqualsAndHashCode", "Log"]);
        let to_string = ast.annotations_of(NodeRef::Class(class))[1];
        assert_eq!(
            ast.annotation(to_string).member("excludes"),
            Some(&AnnotationValue::string("id"))
        );
    }

    #[test]
    fn prefer_explicit_merged_keeps_explicit_values() {
        let explicit =
            AnnotationNode::new("ToString").with_member("includeNames", AnnotationValue::bool(false));
        let usage = AnnotationNode::new("demo.Value")
            .with_member("includeNames", AnnotationValue::bool(true))
            .with_member("cache", AnnotationValue::bool(true));
        let (mut ast, mut source, class) = class_with(vec![explicit, usage]);
        expand_aliases(
            &mut ast,
            &mut source,
            &loader(AliasMode::PreferExplicitMerged),
            class,
        )
        .unwrap();
        assert_eq!(types(&ast, class), ["ToString", "EqualsAndHashCode"]);
        let kept = ast.annotation(ast.annotations_of(NodeRef::Class(class))[0]);
        assert_eq!(kept.member("includeNames"), Some(&AnnotationValue::bool(false)));
        assert_eq!(kept.member("cache"), Some(&AnnotationValue::bool(true)));
    }

    #[test]
    fn prefer_collector_drops_explicit() {
        let (mut ast, mut source, class) = class_with(vec![
            AnnotationNode::new("EqualsAndHashCode"),
            AnnotationNode::new("demo.Value"),
        ]);
        expand_aliases(&mut ast, &mut source, &loader(AliasMode::PreferCollector), class).unwrap();
        assert_eq!(types(&ast, class), ["ToString", "EqualsAndHashCode"]);
    }

    #[test]
    fn bad_declared_mode_is_reported() {
        let mut ast = Ast::new();
        let module = ast.add_module("A.json", None);
        let alias = ast.add_class(
            module,
            ClassNode::new("Broken", Modifiers::PUBLIC | Modifiers::ANNOTATION),
        );
        ast.annotate(NodeRef::Class(alias), AnnotationNode::new("ToString"))
            .unwrap();
        ast.annotate(
            NodeRef::Class(alias),
            AnnotationNode::new("AnnotationCollector")
                .with_member("mode", AnnotationValue::Constant(Constant::Str("SOMETIMES".into()))),
        )
        .unwrap();
        let user = ast.add_class(module, ClassNode::new("User", Modifiers::PUBLIC));
        ast.annotate(NodeRef::Class(user), AnnotationNode::new("Broken"))
            .unwrap();
        let mut source = SourceUnit::new("A.json", module, WarningCategory::LikelyErrors);
        expand_aliases(&mut ast, &mut source, &TransformLoader::with_builtins(), user).unwrap();
        assert_eq!(source.errors().error_count(), 1);
        assert_eq!(types(&ast, user), ["Broken"]);
    }
}
