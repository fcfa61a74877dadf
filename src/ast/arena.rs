//! The node arena.
//!
//! Nodes are never freed. Removing a member only unlinks it from its class,
//! so IDs held by a transformation stay valid for the whole compilation.

use super::{
    AnnotationId, AnnotationNode, ClassId, ClassNode, Expr, FieldId, FieldNode, MethodId,
    MethodKind, MethodNode, Modifiers, ModuleId, ModuleNode, NodeRef, PropertyId, PropertyNode,
    SourcePos, TypeRef,
};
use crate::errors::InternalError;
use crate::transform::names;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ast {
    modules: Vec<ModuleNode>,
    classes: Vec<ClassNode>,
    methods: Vec<MethodNode>,
    fields: Vec<FieldNode>,
    properties: Vec<PropertyNode>,
    annotations: Vec<AnnotationNode>,
}

fn next_id(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

// ============================================================================
// ACCESSORS
// ============================================================================

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module(&self, id: ModuleId) -> &ModuleNode {
        &self.modules[id.index()]
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut ModuleNode {
        &mut self.modules[id.index()]
    }

    pub fn class(&self, id: ClassId) -> &ClassNode {
        &self.classes[id.index()]
    }

    pub fn class_mut(&mut self, id: ClassId) -> &mut ClassNode {
        &mut self.classes[id.index()]
    }

    pub fn method(&self, id: MethodId) -> &MethodNode {
        &self.methods[id.index()]
    }

    pub fn method_mut(&mut self, id: MethodId) -> &mut MethodNode {
        &mut self.methods[id.index()]
    }

    pub fn field(&self, id: FieldId) -> &FieldNode {
        &self.fields[id.index()]
    }

    pub fn field_mut(&mut self, id: FieldId) -> &mut FieldNode {
        &mut self.fields[id.index()]
    }

    pub fn property(&self, id: PropertyId) -> &PropertyNode {
        &self.properties[id.index()]
    }

    pub fn property_mut(&mut self, id: PropertyId) -> &mut PropertyNode {
        &mut self.properties[id.index()]
    }

    pub fn annotation(&self, id: AnnotationId) -> &AnnotationNode {
        &self.annotations[id.index()]
    }

    pub fn annotation_mut(&mut self, id: AnnotationId) -> &mut AnnotationNode {
        &mut self.annotations[id.index()]
    }

    pub fn module_ids(&self) -> impl Iterator<Item = ModuleId> {
        (0..next_id(self.modules.len())).map(ModuleId)
    }

    /// Every class of every module, in module order.
    pub fn class_ids(&self) -> Vec<ClassId> {
        self.modules
            .iter()
            .flat_map(|m| m.classes.iter().copied())
            .collect()
    }

    pub fn parameter(&self, method: MethodId, index: usize) -> Option<&super::Parameter> {
        self.method(method).params.get(index)
    }
}

// ============================================================================
// CONSTRUCTION
// ============================================================================

impl Ast {
    pub fn add_module(&mut self, name: impl Into<String>, package: Option<String>) -> ModuleId {
        let id = ModuleId(next_id(self.modules.len()));
        self.modules.push(ModuleNode {
            name: name.into(),
            package,
            classes: Vec::new(),
        });
        id
    }

    /// Appends a class to a module. Later phases see it.
    pub fn add_class(&mut self, module: ModuleId, mut class: ClassNode) -> ClassId {
        let id = ClassId(next_id(self.classes.len()));
        class.module = module;
        self.classes.push(class);
        self.modules[module.index()].classes.push(id);
        id
    }

    pub fn add_field(&mut self, class: ClassId, mut field: FieldNode) -> FieldId {
        let id = FieldId(next_id(self.fields.len()));
        field.owner = class;
        self.fields.push(field);
        self.classes[class.index()].fields.push(id);
        id
    }

    /// Like [`Ast::add_field`] but puts the field first, so it is initialized
    /// before user fields.
    pub fn add_field_first(&mut self, class: ClassId, mut field: FieldNode) -> FieldId {
        let id = FieldId(next_id(self.fields.len()));
        field.owner = class;
        self.fields.push(field);
        self.classes[class.index()].fields.insert(0, id);
        id
    }

    /// Adds a property with a private backing field of the same name.
    pub fn add_property(
        &mut self,
        class: ClassId,
        name: impl Into<String>,
        modifiers: Modifiers,
        ty: TypeRef,
        init: Option<Expr>,
    ) -> PropertyId {
        let name = name.into();
        let carried = Modifiers::STATIC | Modifiers::FINAL;
        let field_mods = modifiers.intersection(carried).with(Modifiers::PRIVATE);
        let field = self.add_field(
            class,
            FieldNode {
                name: name.clone(),
                modifiers: field_mods,
                ty,
                init,
                annotations: Vec::new(),
                owner: class,
                pos: SourcePos::default(),
            },
        );
        let property_mods = if modifiers.has_visibility() {
            modifiers
        } else {
            modifiers.with(Modifiers::PUBLIC)
        };
        let id = PropertyId(next_id(self.properties.len()));
        self.properties.push(PropertyNode {
            name,
            modifiers: property_mods,
            field,
            getter: None,
            setter: None,
            owner: class,
        });
        self.classes[class.index()].properties.push(id);
        id
    }

    pub fn add_method(&mut self, class: ClassId, mut method: MethodNode) -> MethodId {
        let id = MethodId(next_id(self.methods.len()));
        method.owner = class;
        let is_ctor = method.kind == MethodKind::Constructor;
        self.methods.push(method);
        let node = &mut self.classes[class.index()];
        if is_ctor {
            node.constructors.push(id);
        } else {
            node.methods.push(id);
        }
        id
    }

    pub fn add_constructor(&mut self, class: ClassId, mut ctor: MethodNode) -> MethodId {
        ctor.kind = MethodKind::Constructor;
        ctor.name = MethodNode::CONSTRUCTOR_NAME.to_string();
        self.add_method(class, ctor)
    }

    pub fn remove_method(&mut self, class: ClassId, method: MethodId) {
        let node = &mut self.classes[class.index()];
        node.methods.retain(|m| *m != method);
        node.constructors.retain(|m| *m != method);
    }

    pub fn remove_field(&mut self, class: ClassId, field: FieldId) {
        self.classes[class.index()].fields.retain(|f| *f != field);
    }

    /// Unlinks a property. Its backing field stays in place.
    pub fn remove_property(&mut self, class: ClassId, property: PropertyId) {
        self.classes[class.index()]
            .properties
            .retain(|p| *p != property);
    }

    /// Attaches an annotation use to a node and records the owner. Property
    /// annotations are stored on the backing field.
    pub fn annotate(
        &mut self,
        target: NodeRef,
        annotation: AnnotationNode,
    ) -> Result<AnnotationId, InternalError> {
        let len = self.annotation_list(target)?.len();
        self.insert_annotation(target, len, annotation)
    }

    /// Attaches an annotation use at `index` in the node's annotation list.
    pub fn insert_annotation(
        &mut self,
        target: NodeRef,
        index: usize,
        mut annotation: AnnotationNode,
    ) -> Result<AnnotationId, InternalError> {
        let target = self.annotation_holder(target);
        let id = AnnotationId(next_id(self.annotations.len()));
        annotation.owner = Some(target);
        let list = self.annotation_list_mut(target)?;
        let index = index.min(list.len());
        list.insert(index, id);
        self.annotations.push(annotation);
        Ok(id)
    }

    /// Detaches an annotation use from its owner.
    pub fn remove_annotation(&mut self, annotation: AnnotationId) -> Result<(), InternalError> {
        let Some(owner) = self.annotation(annotation).owner else {
            return Ok(());
        };
        self.annotation_list_mut(owner)?
            .retain(|a| *a != annotation);
        self.annotations[annotation.index()].owner = None;
        Ok(())
    }

    fn annotation_holder(&self, target: NodeRef) -> NodeRef {
        match target {
            NodeRef::Property(p) => NodeRef::Field(self.property(p).field),
            other => other,
        }
    }

    fn annotation_list(&self, target: NodeRef) -> Result<&Vec<AnnotationId>, InternalError> {
        match self.annotation_holder(target) {
            NodeRef::Class(c) => Ok(&self.class(c).annotations),
            NodeRef::Method(m) => Ok(&self.method(m).annotations),
            NodeRef::Field(f) => Ok(&self.field(f).annotations),
            NodeRef::Parameter(m, i) => self
                .method(m)
                .params
                .get(i)
                .map(|p| &p.annotations)
                .ok_or_else(|| InternalError::invariant(format!("no parameter {} on {}", i, m))),
            other => Err(InternalError::invariant(format!(
                "{} cannot carry annotations",
                other.kind()
            ))),
        }
    }

    fn annotation_list_mut(
        &mut self,
        target: NodeRef,
    ) -> Result<&mut Vec<AnnotationId>, InternalError> {
        match self.annotation_holder(target) {
            NodeRef::Class(c) => Ok(&mut self.classes[c.index()].annotations),
            NodeRef::Method(m) => Ok(&mut self.methods[m.index()].annotations),
            NodeRef::Field(f) => Ok(&mut self.fields[f.index()].annotations),
            NodeRef::Parameter(m, i) => self.methods[m.index()]
                .params
                .get_mut(i)
                .map(|p| &mut p.annotations)
                .ok_or_else(|| InternalError::invariant(format!("no parameter {} on {}", i, m))),
            other => Err(InternalError::invariant(format!(
                "{} cannot carry annotations",
                other.kind()
            ))),
        }
    }
}

// ============================================================================
// QUERIES
// ============================================================================

impl Ast {
    /// Finds a class by qualified name, or by simple name when unambiguous.
    pub fn find_class(&self, name: &str) -> Option<ClassId> {
        let ids = self.class_ids();
        if let Some(exact) = ids.iter().find(|c| self.class(**c).name == name) {
            return Some(*exact);
        }
        let mut matches = ids
            .into_iter()
            .filter(|c| super::types::same_name(&self.class(*c).name, name));
        let first = matches.next()?;
        matches.next().is_none().then_some(first)
    }

    /// The superclass, when it is declared in this compilation.
    pub fn superclass(&self, class: ClassId) -> Option<ClassId> {
        let sup = self.class(class).superclass.as_ref()?;
        self.find_class(&sup.name)
    }

    /// Annotation uses attached to a node, in source order.
    pub fn annotations_of(&self, node: NodeRef) -> &[AnnotationId] {
        self.annotation_list(node).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// First annotation use of the given type on a node.
    pub fn find_annotation(&self, node: NodeRef, qualified: &str) -> Option<AnnotationId> {
        self.annotations_of(node)
            .iter()
            .copied()
            .find(|a| self.annotation(*a).is_type(qualified))
    }

    pub fn has_annotation(&self, node: NodeRef, qualified: &str) -> bool {
        self.find_annotation(node, qualified).is_some()
    }

    /// Whether the class is a trait, before or after flattening.
    pub fn is_trait(&self, class: ClassId) -> bool {
        self.has_annotation(NodeRef::Class(class), names::TRAIT)
    }

    pub fn methods_named(&self, class: ClassId, name: &str) -> Vec<MethodId> {
        self.class(class)
            .methods
            .iter()
            .copied()
            .filter(|m| self.method(*m).name == name)
            .collect()
    }

    /// A declared method with exactly this name and parameter types.
    pub fn declared_method(
        &self,
        class: ClassId,
        name: &str,
        param_types: &[TypeRef],
    ) -> Option<MethodId> {
        self.class(class)
            .methods
            .iter()
            .copied()
            .find(|m| self.method(*m).has_signature(name, param_types))
    }

    /// Whether a method with this name and parameter count is declared.
    pub fn declares_method(&self, class: ClassId, name: &str, arity: usize) -> bool {
        self.class(class).methods.iter().any(|m| {
            let method = self.method(*m);
            method.name == name && method.params.len() == arity
        })
    }

    pub fn declared_constructor(&self, class: ClassId, param_types: &[TypeRef]) -> Option<MethodId> {
        self.class(class).constructors.iter().copied().find(|m| {
            self.method(*m)
                .has_signature(MethodNode::CONSTRUCTOR_NAME, param_types)
        })
    }

    pub fn field_by_name(&self, class: ClassId, name: &str) -> Option<FieldId> {
        self.class(class)
            .fields
            .iter()
            .copied()
            .find(|f| self.field(*f).name == name)
    }

    pub fn property_by_name(&self, class: ClassId, name: &str) -> Option<PropertyId> {
        self.class(class)
            .properties
            .iter()
            .copied()
            .find(|p| self.property(*p).name == name)
    }

    /// The property backed by this field, if any.
    pub fn property_of_field(&self, field: FieldId) -> Option<PropertyId> {
        let owner = self.field(field).owner;
        self.class(owner)
            .properties
            .iter()
            .copied()
            .find(|p| self.property(*p).field == field)
    }

    /// Non-static properties, in declaration order.
    pub fn instance_properties(&self, class: ClassId) -> Vec<PropertyId> {
        self.class(class)
            .properties
            .iter()
            .copied()
            .filter(|p| !self.property(*p).is_static())
            .collect()
    }

    /// Fields that do not back a property.
    pub fn plain_fields(&self, class: ClassId) -> Vec<FieldId> {
        self.class(class)
            .fields
            .iter()
            .copied()
            .filter(|f| self.property_of_field(*f).is_none())
            .collect()
    }

    pub fn pos_of(&self, node: NodeRef) -> SourcePos {
        match node {
            NodeRef::Module(_) => SourcePos::default(),
            NodeRef::Class(c) => self.class(c).pos,
            NodeRef::Method(m) | NodeRef::Parameter(m, _) => self.method(m).pos,
            NodeRef::Field(f) => self.field(f).pos,
            NodeRef::Property(p) => self.field(self.property(p).field).pos,
            NodeRef::Annotation(a) => self.annotation(a).pos,
        }
    }

    /// Short human-readable description, used in messages.
    pub fn describe(&self, node: NodeRef) -> String {
        match node {
            NodeRef::Module(m) => format!("ModuleNode {}", self.module(m).name),
            NodeRef::Class(c) => format!("ClassNode {}", self.class(c).name),
            NodeRef::Method(m) => format!("MethodNode {}", self.method(m).descriptor()),
            NodeRef::Field(f) => format!("FieldNode {}", self.field(f).name),
            NodeRef::Property(p) => format!("PropertyNode {}", self.property(p).name),
            NodeRef::Parameter(m, i) => match self.parameter(m, i) {
                Some(p) => format!("Parameter {}", p.name),
                None => format!("Parameter #{}", i),
            },
            NodeRef::Annotation(a) => format!("AnnotationNode {}", self.annotation(a)),
        }
    }

    /// The class that declares `node`, if it is a member.
    pub fn declaring_class(&self, node: NodeRef) -> Option<ClassId> {
        match node {
            NodeRef::Class(c) => Some(c),
            NodeRef::Method(m) | NodeRef::Parameter(m, _) => Some(self.method(m).owner),
            NodeRef::Field(f) => Some(self.field(f).owner),
            NodeRef::Property(p) => Some(self.property(p).owner),
            NodeRef::Annotation(a) => self
                .annotation(a)
                .owner
                .and_then(|owner| self.declaring_class(owner)),
            NodeRef::Module(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Stmt;

    fn person() -> (Ast, ClassId) {
        let mut ast = Ast::new();
        let module = ast.add_module("Person.yaml", None);
        let class = ast.add_class(module, ClassNode::new("Person", Modifiers::PUBLIC));
        ast.add_property(class, "name", Modifiers::NONE, TypeRef::string(), None);
        (ast, class)
    }

    #[test]
    fn property_gets_private_backing_field() {
        let (ast, class) = person();
        let prop = ast.property_by_name(class, "name").unwrap();
        let field = ast.property(prop).field;
        assert!(ast.field(field).modifiers.is_private());
        assert!(ast.property(prop).modifiers.is_public());
        assert_eq!(ast.property_of_field(field), Some(prop));
        assert!(ast.plain_fields(class).is_empty());
    }

    #[test]
    fn property_annotations_land_on_the_field() {
        let (mut ast, class) = person();
        let prop = ast.property_by_name(class, "name").unwrap();
        let anno = ast
            .annotate(NodeRef::Property(prop), AnnotationNode::new("Lazy"))
            .unwrap();
        let field = ast.property(prop).field;
        assert_eq!(ast.annotations_of(NodeRef::Field(field)), &[anno]);
        assert_eq!(ast.annotation(anno).owner, Some(NodeRef::Field(field)));
    }

    #[test]
    fn removed_method_keeps_its_id_valid() {
        let (mut ast, class) = person();
        let m = ast.add_method(
            class,
            MethodNode::method("greet", Modifiers::PUBLIC, TypeRef::void(), vec![], Stmt::Empty),
        );
        ast.remove_method(class, m);
        assert!(ast.class(class).methods.is_empty());
        assert_eq!(ast.method(m).name, "greet");
        assert_eq!(ast.method(m).owner, class);
    }

    #[test]
    fn modules_cannot_carry_annotations() {
        let (mut ast, _) = person();
        let module = ModuleId(0);
        assert!(ast
            .annotate(NodeRef::Module(module), AnnotationNode::new("ToString"))
            .is_err());
    }
}
