//! Module documents: the serde interchange format for parsed modules.
//!
//! A document is what the parser hands over: classes with their members,
//! annotations inline, modifiers as keyword lists and bodies as statement
//! trees. [`Ast::load_document`] lowers one into the arena and
//! [`Ast::to_document`] raises a (possibly transformed) module back out.

use super::{
    AnnotationNode, Ast, ClassId, ClassNode, Expr, FieldNode, MethodId, MethodKind, MethodNode,
    Modifiers, ModuleId, NodeRef, Parameter, SourcePos, Stmt, TypeRef,
};
use crate::errors::InternalError;
use serde::de::Error as _;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModuleDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(default)]
    pub classes: Vec<ClassDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDoc {
    pub name: String,
    /// Defaults to `public` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifiers: Option<MemberModifiers>,
    #[serde(default, rename = "extends", skip_serializing_if = "Option::is_none")]
    pub superclass: Option<TypeRef>,
    #[serde(default, rename = "implements", skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<TypeRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<AnnotationNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constructors: Vec<MethodDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<MethodDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub initializers: Vec<Stmt>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_initializers: Vec<Stmt>,
    /// Name of the enclosing class, for inner classes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outer: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub script: bool,
    #[serde(default, skip_serializing_if = "is_unknown")]
    pub pos: SourcePos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDoc {
    pub name: String,
    #[serde(rename = "type", default = "TypeRef::object")]
    pub ty: TypeRef,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<AnnotationNode>,
    #[serde(default, skip_serializing_if = "is_unknown")]
    pub pos: SourcePos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDoc {
    pub name: String,
    #[serde(rename = "type", default = "TypeRef::object")]
    pub ty: TypeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifiers: Option<MemberModifiers>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<AnnotationNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub getter: Option<Stmt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setter: Option<Stmt>,
    #[serde(default, skip_serializing_if = "is_unknown")]
    pub pos: SourcePos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDoc {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifiers: Option<MemberModifiers>,
    #[serde(rename = "returns", default = "TypeRef::object")]
    pub return_type: TypeRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParamDoc>,
    /// Absent for abstract methods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Stmt>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<AnnotationNode>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub generated: bool,
    #[serde(default, skip_serializing_if = "is_unknown")]
    pub pos: SourcePos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDoc {
    pub name: String,
    #[serde(rename = "type", default = "TypeRef::object")]
    pub ty: TypeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<AnnotationNode>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn is_unknown(pos: &SourcePos) -> bool {
    !pos.is_known()
}

/// Modifiers of a class, property, method or constructor as written in a
/// document. Without a visibility keyword these default to public; the
/// `package` keyword asks for package-private visibility instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemberModifiers {
    pub modifiers: Modifiers,
    pub package_private: bool,
}

impl MemberModifiers {
    pub fn resolve(self) -> Modifiers {
        if self.package_private || self.modifiers.has_visibility() {
            self.modifiers
        } else {
            self.modifiers.with(Modifiers::PUBLIC)
        }
    }
}

impl From<Modifiers> for MemberModifiers {
    fn from(modifiers: Modifiers) -> Self {
        Self {
            modifiers,
            package_private: !modifiers.has_visibility(),
        }
    }
}

impl Serialize for MemberModifiers {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut words = self.modifiers.keywords();
        if self.package_private {
            words.insert(0, "package");
        }
        words.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MemberModifiers {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let words = Vec::<String>::deserialize(deserializer)?;
        let package_private = words.iter().any(|w| w == "package");
        let mut modifiers = Modifiers::NONE;
        for word in words.iter().filter(|w| *w != "package") {
            let bits = Modifiers::from_keyword(word)
                .ok_or_else(|| D::Error::custom(format!("unknown modifier '{}'", word)))?;
            modifiers.insert(bits);
        }
        Ok(Self {
            modifiers,
            package_private,
        })
    }
}

fn resolve_modifiers(modifiers: Option<MemberModifiers>) -> Modifiers {
    modifiers.unwrap_or_default().resolve()
}

impl ModuleDocument {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Reads YAML, where statements and expressions are single-key maps
    /// such as `return: {var: x}`.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::with::singleton_map_recursive::deserialize(serde_yaml::Deserializer::from_str(
            text,
        ))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Writes YAML in the same single-key map shape [`from_yaml`] reads.
    ///
    /// [`from_yaml`]: ModuleDocument::from_yaml
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        let mut out = Vec::new();
        let mut serializer = serde_yaml::Serializer::new(&mut out);
        serde_yaml::with::singleton_map_recursive::serialize(self, &mut serializer)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

// ============================================================================
// LOWERING
// ============================================================================

impl Ast {
    /// Lowers a module document into the arena.
    pub fn load_document(
        &mut self,
        name: impl Into<String>,
        doc: &ModuleDocument,
    ) -> Result<ModuleId, InternalError> {
        let module = self.add_module(name, doc.package.clone());
        let mut pending_outer = Vec::new();
        for class_doc in &doc.classes {
            let class_name = qualify_in_package(doc.package.as_deref(), &class_doc.name);
            let mut node = ClassNode::new(class_name, resolve_modifiers(class_doc.modifiers));
            node.superclass = class_doc.superclass.clone();
            node.interfaces = class_doc.interfaces.clone();
            node.object_initializers = class_doc.initializers.clone();
            node.static_initializers = class_doc.static_initializers.clone();
            node.script = class_doc.script;
            node.pos = class_doc.pos;
            let class = self.add_class(module, node);
            if let Some(outer) = &class_doc.outer {
                pending_outer.push((class, qualify_in_package(doc.package.as_deref(), outer)));
            }

            for anno in &class_doc.annotations {
                self.annotate(NodeRef::Class(class), anno.clone())?;
            }
            for field_doc in &class_doc.fields {
                let field = self.add_field(
                    class,
                    FieldNode {
                        name: field_doc.name.clone(),
                        modifiers: field_doc.modifiers,
                        ty: field_doc.ty.clone(),
                        init: field_doc.init.clone(),
                        annotations: Vec::new(),
                        owner: class,
                        pos: field_doc.pos,
                    },
                );
                for anno in &field_doc.annotations {
                    self.annotate(NodeRef::Field(field), anno.clone())?;
                }
            }
            for prop_doc in &class_doc.properties {
                let prop_mods = resolve_modifiers(prop_doc.modifiers);
                let prop = self.add_property(
                    class,
                    prop_doc.name.clone(),
                    prop_mods,
                    prop_doc.ty.clone(),
                    prop_doc.init.clone(),
                );
                let field = self.property(prop).field;
                self.field_mut(field).pos = prop_doc.pos;
                let node = self.property_mut(prop);
                node.getter = prop_doc.getter.clone();
                node.setter = prop_doc.setter.clone();
                for anno in &prop_doc.annotations {
                    self.annotate(NodeRef::Property(prop), anno.clone())?;
                }
            }
            for ctor_doc in &class_doc.constructors {
                self.lower_method(class, ctor_doc, MethodKind::Constructor)?;
            }
            for method_doc in &class_doc.methods {
                self.lower_method(class, method_doc, MethodKind::Method)?;
            }
        }
        for (class, outer) in pending_outer {
            let outer_id = self.find_class(&outer);
            self.class_mut(class).outer = outer_id;
        }
        tracing::debug!(classes = doc.classes.len(), "loaded module document");
        Ok(module)
    }

    fn lower_method(
        &mut self,
        class: ClassId,
        doc: &MethodDoc,
        kind: MethodKind,
    ) -> Result<(), InternalError> {
        let params = doc
            .params
            .iter()
            .map(|p| Parameter {
                name: p.name.clone(),
                ty: p.ty.clone(),
                default: p.default.clone(),
                annotations: Vec::new(),
            })
            .collect();
        let mut node = match kind {
            MethodKind::Constructor => MethodNode::constructor(
                resolve_modifiers(doc.modifiers),
                params,
                doc.body.clone().unwrap_or(Stmt::Block(Vec::new())),
            ),
            MethodKind::Method => MethodNode {
                body: doc.body.clone(),
                ..MethodNode::method(
                    doc.name.clone(),
                    resolve_modifiers(doc.modifiers),
                    doc.return_type.clone(),
                    params,
                    Stmt::Empty,
                )
            },
        };
        node.generated = doc.generated;
        node.pos = doc.pos;
        let method = self.add_method(class, node);
        for anno in &doc.annotations {
            self.annotate(NodeRef::Method(method), anno.clone())?;
        }
        for (index, param) in doc.params.iter().enumerate() {
            for anno in &param.annotations {
                self.annotate(NodeRef::Parameter(method, index), anno.clone())?;
            }
        }
        Ok(())
    }
}

fn qualify_in_package(package: Option<&str>, name: &str) -> String {
    match package {
        Some(pkg) if !pkg.is_empty() && !name.contains('.') => format!("{}.{}", pkg, name),
        _ => name.to_string(),
    }
}

// ============================================================================
// RAISING
// ============================================================================

impl Ast {
    /// Raises a module back into document form, transformations included.
    pub fn to_document(&self, module: ModuleId) -> ModuleDocument {
        let node = self.module(module);
        let classes = node
            .classes
            .iter()
            .map(|c| self.class_document(*c))
            .collect();
        ModuleDocument {
            package: node.package.clone(),
            classes,
        }
    }

    fn annotation_docs(&self, node: NodeRef) -> Vec<AnnotationNode> {
        self.annotations_of(node)
            .iter()
            .map(|a| self.annotation(*a).clone())
            .collect()
    }

    fn class_document(&self, class: ClassId) -> ClassDoc {
        let node = self.class(class);
        let fields = self
            .plain_fields(class)
            .into_iter()
            .map(|f| {
                let field = self.field(f);
                FieldDoc {
                    name: field.name.clone(),
                    ty: field.ty.clone(),
                    modifiers: field.modifiers,
                    init: field.init.clone(),
                    annotations: self.annotation_docs(NodeRef::Field(f)),
                    pos: field.pos,
                }
            })
            .collect();
        let properties = node
            .properties
            .iter()
            .map(|p| {
                let prop = self.property(*p);
                let field = self.field(prop.field);
                PropertyDoc {
                    name: prop.name.clone(),
                    ty: field.ty.clone(),
                    modifiers: Some(prop.modifiers.into()),
                    init: field.init.clone(),
                    annotations: self.annotation_docs(NodeRef::Field(prop.field)),
                    getter: prop.getter.clone(),
                    setter: prop.setter.clone(),
                    pos: field.pos,
                }
            })
            .collect();
        ClassDoc {
            name: node.name.clone(),
            modifiers: Some(node.modifiers.into()),
            superclass: node.superclass.clone(),
            interfaces: node.interfaces.clone(),
            annotations: self.annotation_docs(NodeRef::Class(class)),
            fields,
            properties,
            constructors: node
                .constructors
                .iter()
                .map(|m| self.method_document(*m))
                .collect(),
            methods: node
                .methods
                .iter()
                .map(|m| self.method_document(*m))
                .collect(),
            initializers: node.object_initializers.clone(),
            static_initializers: node.static_initializers.clone(),
            outer: node.outer.map(|o| self.class(o).name.clone()),
            script: node.script,
            pos: node.pos,
        }
    }

    fn method_document(&self, method: MethodId) -> MethodDoc {
        let node = self.method(method);
        MethodDoc {
            name: if node.is_constructor() {
                String::new()
            } else {
                node.name.clone()
            },
            modifiers: Some(node.modifiers.into()),
            return_type: node.return_type.clone(),
            params: node
                .params
                .iter()
                .enumerate()
                .map(|(i, p)| ParamDoc {
                    name: p.name.clone(),
                    ty: p.ty.clone(),
                    default: p.default.clone(),
                    annotations: self.annotation_docs(NodeRef::Parameter(method, i)),
                })
                .collect(),
            body: node.body.clone(),
            annotations: self.annotation_docs(NodeRef::Method(method)),
            generated: node.generated,
            pos: node.pos,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERSON: &str = r#"{
        "package": "demo",
        "classes": [{
            "name": "Person",
            "annotations": [{"type": "ToString", "members": {"includeNames": true}}],
            "properties": [
                {"name": "name", "type": "String"},
                {"name": "age", "type": "int"}
            ],
            "fields": [{"name": "cache", "modifiers": ["private"], "type": "Map"}],
            "methods": [{
                "name": "greet",
                "returns": "String",
                "params": [{"name": "other", "type": "String", "annotations": [{"type": "NullCheck"}]}],
                "body": {"return": {"var": "other"}}
            }]
        }]
    }"#;

    #[test]
    fn load_qualifies_names_and_defaults_to_public() {
        let doc = ModuleDocument::from_json(PERSON).unwrap();
        let mut ast = Ast::new();
        let module = ast.load_document("Person.json", &doc).unwrap();
        let class = ast.module(module).classes[0];
        assert_eq!(ast.class(class).name, "demo.Person");
        assert!(ast.class(class).modifiers.is_public());
        assert_eq!(ast.class(class).properties.len(), 2);
        assert_eq!(ast.class(class).fields.len(), 3);
        let greet = ast.methods_named(class, "greet")[0];
        assert!(ast.method(greet).modifiers.is_public());
        assert_eq!(ast.annotations_of(NodeRef::Parameter(greet, 0)).len(), 1);
    }

    #[test]
    fn document_survives_a_round_trip() {
        let doc = ModuleDocument::from_json(PERSON).unwrap();
        let mut ast = Ast::new();
        let module = ast.load_document("Person.json", &doc).unwrap();
        let raised = ast.to_document(module);
        let mut again = Ast::new();
        let module2 = again.load_document("Person.json", &raised).unwrap();
        assert_eq!(again.to_document(module2), raised);
        assert_eq!(raised.classes[0].fields.len(), 1);
    }

    #[test]
    fn package_keyword_means_package_private() {
        let doc = ModuleDocument::from_json(
            r#"{"classes": [{"name": "A", "methods": [
                {"name": "m", "modifiers": ["package"], "body": {"block": []}}
            ]}]}"#,
        )
        .unwrap();
        let mut ast = Ast::new();
        let module = ast.load_document("A.json", &doc).unwrap();
        let class = ast.module(module).classes[0];
        let m = ast.methods_named(class, "m")[0];
        assert!(ast.method(m).modifiers.is_package_private());
    }

    #[test]
    fn yaml_bodies_read_as_single_key_maps() {
        let doc = ModuleDocument::from_yaml(
            "\
package: demo
classes:
  - name: Counter
    annotations:
      - type: TimedInterrupt
        members:
          value: 2
          unit: {owner: java.util.concurrent.TimeUnit, property: MINUTES}
    methods:
      - name: next
        returns: int
        params:
          - {name: n, type: int}
        body:
          return:
            binary: {op: add, left: {var: n}, right: {constant: 1}}
      - name: self
        body: {return: this}
",
        )
        .unwrap();
        let json = ModuleDocument::from_json(
            r#"{"package": "demo", "classes": [{
                "name": "Counter",
                "annotations": [{"type": "TimedInterrupt", "members": {
                    "value": 2,
                    "unit": {"owner": "java.util.concurrent.TimeUnit", "property": "MINUTES"}
                }}],
                "methods": [
                    {"name": "next", "returns": "int", "params": [{"name": "n", "type": "int"}],
                     "body": {"return": {"binary": {"op": "add", "left": {"var": "n"}, "right": {"constant": 1}}}}},
                    {"name": "self", "body": {"return": "this"}}
                ]
            }]}"#,
        )
        .unwrap();
        assert_eq!(doc, json);
    }

    #[test]
    fn transformed_module_writes_and_rereads_as_yaml() {
        let doc = ModuleDocument::from_json(PERSON).unwrap();
        let mut ast = Ast::new();
        let module = ast.load_document("Person.json", &doc).unwrap();
        let raised = ast.to_document(module);
        let text = raised.to_yaml().unwrap();
        assert!(text.contains("return:"));
        assert_eq!(ModuleDocument::from_yaml(&text).unwrap(), raised);
    }
}
