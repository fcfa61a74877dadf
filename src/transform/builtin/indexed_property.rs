//! `@IndexedProperty`: element accessors for list and array properties.

use crate::ast::types::capitalize;
use crate::ast::{Expr, MethodNode, Modifiers, NodeRef, Stmt, TypeRef};
use crate::errors::InternalError;
use crate::transform::base::Usage;
use crate::transform::synth::*;
use crate::transform::{names, AstTransformation, TransformContext};

const INDEX: &str = "index";
const VALUE: &str = "value";

#[derive(Debug, Default)]
pub struct IndexedPropertyTransformation;

impl AstTransformation for IndexedPropertyTransformation {
    fn visit(
        &mut self,
        nodes: &[NodeRef],
        cx: &mut TransformContext<'_>,
    ) -> Result<(), InternalError> {
        let usage = Usage::init(cx.ast, nodes, names::INDEXED_PROPERTY)?;
        let property = match usage.node {
            NodeRef::Property(p) => Some(p),
            NodeRef::Field(f) => cx.ast.property_of_field(f),
            _ => None,
        };
        let Some(property) = property else {
            usage.error(cx, format!("{} is only allowed on properties", usage.name));
            return Ok(());
        };
        let node = cx.ast.property(property).clone();
        let storage = cx.ast.field(node.field).clone();
        let element = if storage.ty.is_array() {
            storage.ty.element_type()
        } else if storage.ty.is_named("java.util.List") {
            Some(storage.ty.generics.first().cloned().unwrap_or_else(TypeRef::object))
        } else {
            None
        };
        let Some(element) = element else {
            let message = format!(
                "Error during {} processing. Non-Indexable property '{}' found. Type must be an array or list but found {}",
                usage.name,
                node.name,
                storage.ty.qualified_name()
            );
            usage.error(cx, message);
            return Ok(());
        };

        let owner = node.owner;
        let mut modifiers = Modifiers::PUBLIC;
        if node.is_static() {
            modifiers.insert(Modifiers::STATIC);
        }
        let backing = if storage.is_static() {
            field(Expr::ClassLit(cx.ast.class(owner).type_ref()), &storage.name)
        } else {
            this_field(&storage.name)
        };
        let slot = || Expr::Index {
            receiver: Box::new(backing.clone()),
            index: Box::new(var(INDEX)),
        };
        let suffix = capitalize(&node.name);

        let getter = format!("get{}", suffix);
        if !cx.ast.declares_method(owner, &getter, 1) {
            cx.ast.add_method(
                owner,
                MethodNode::method(
                    getter,
                    modifiers,
                    element.clone(),
                    vec![param(INDEX, TypeRef::int())],
                    Stmt::block(vec![ret(slot())]),
                )
                .generated(),
            );
        }
        let setter = format!("set{}", suffix);
        if !node.modifiers.is_final() && !cx.ast.declares_method(owner, &setter, 2) {
            cx.ast.add_method(
                owner,
                MethodNode::method(
                    setter,
                    modifiers,
                    TypeRef::void(),
                    vec![param(INDEX, TypeRef::int()), param(VALUE, element)],
                    Stmt::block(vec![assign(slot(), var(VALUE))]),
                )
                .generated(),
            );
        }
        Ok(())
    }
}
