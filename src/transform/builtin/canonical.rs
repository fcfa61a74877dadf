//! `@Canonical`: tuple constructor, equals/hashCode and toString in one
//! annotation. Any of the three that is annotated explicitly on the class is
//! left to its own transformation.

use super::equals_hashcode::{create_equals, create_hash_code, EqualsOptions};
use super::to_string::{create_to_string, ToStringOptions};
use super::tuple_constructor::{create_constructor, TupleOptions, TupleOutcome};
use crate::ast::NodeRef;
use crate::errors::InternalError;
use crate::transform::base::Usage;
use crate::transform::{names, AstTransformation, TransformContext};

#[derive(Debug, Default)]
pub struct CanonicalTransformation;

impl AstTransformation for CanonicalTransformation {
    fn visit(
        &mut self,
        nodes: &[NodeRef],
        cx: &mut TransformContext<'_>,
    ) -> Result<(), InternalError> {
        let usage = Usage::init(cx.ast, nodes, names::CANONICAL)?;
        let Some(class) = usage.target_class(cx) else {
            return Ok(());
        };
        if !usage.check_not_interface(cx, class) {
            return Ok(());
        }
        let includes = usage.member_string_list(cx, "includes");
        let excludes = usage.member_string_list(cx, "excludes");
        let all_names = usage.member_bool(cx, "allNames", false);
        if !usage.check_include_exclude(cx, &includes, &excludes)
            || !usage.check_property_list(cx, class, &includes, "includes", false)
            || !usage.check_property_list(cx, class, &excludes, "excludes", false)
        {
            return Ok(());
        }

        let node = NodeRef::Class(class);
        if !cx.ast.has_annotation(node, names::TUPLE_CONSTRUCTOR) {
            let options = TupleOptions {
                all_names,
                includes: includes.clone(),
                excludes: excludes.clone(),
                ..Default::default()
            };
            if let TupleOutcome::Duplicate(signature) = create_constructor(cx.ast, class, &options)
            {
                usage.warning(
                    cx,
                    format!("{} specifies duplicate constructor: {}", usage.name, signature),
                );
            }
        }
        if !cx.ast.has_annotation(node, names::EQUALS_AND_HASH_CODE) {
            let options = EqualsOptions {
                use_can_equal: true,
                all_names,
                includes: includes.clone(),
                excludes: excludes.clone(),
                ..Default::default()
            };
            create_hash_code(cx.ast, class, &options);
            create_equals(cx.ast, class, &options);
        }
        if !cx.ast.has_annotation(node, names::TO_STRING) {
            let options = ToStringOptions {
                all_names,
                includes,
                excludes,
                ..Default::default()
            };
            create_to_string(cx.ast, class, &options);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AnnotationNode, Ast, ClassNode, Modifiers, TypeRef};
    use crate::compiler::{CompilePhase, SourceUnit};
    use crate::config::CompilerConfiguration;
    use crate::errors::WarningCategory;
    use crate::transform::TransformLoader;

    #[test]
    fn explicit_to_string_is_left_alone() {
        let mut ast = Ast::new();
        let module = ast.add_module("M", None);
        let class = ast.add_class(module, ClassNode::new("Point", Modifiers::PUBLIC));
        ast.add_property(class, "x", Modifiers::NONE, TypeRef::int(), None);
        let anno = ast
            .annotate(NodeRef::Class(class), AnnotationNode::new("Canonical"))
            .unwrap();
        ast.annotate(NodeRef::Class(class), AnnotationNode::new("ToString"))
            .unwrap();

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
        CanonicalTransformation
            .visit(&[NodeRef::Annotation(anno), NodeRef::Class(class)], &mut cx)
            .unwrap();

        assert_eq!(ast.class(class).constructors.len(), 1);
        assert!(ast.declares_method(class, "equals", 1));
        assert!(ast.declares_method(class, "hashCode", 0));
        assert!(!ast.declares_method(class, "toString", 0));
    }
}
