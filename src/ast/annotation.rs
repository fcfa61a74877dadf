//! Annotation uses and their member values.

use super::{Expr, NodeRef, SourcePos, TypeRef};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Constant {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Null => f.write_str("null"),
            Constant::Bool(b) => write!(f, "{}", b),
            Constant::Int(i) => write!(f, "{}", i),
            Constant::Float(x) => write!(f, "{:?}", x),
            Constant::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// An annotation member value. Only constant-folded shapes are meaningful to
/// transformations; arbitrary expressions are carried as [`AnnotationValue::Expr`]
/// and rejected by transformations that need constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnnotationValue {
    Constant(Constant),
    List(Vec<AnnotationValue>),
    ClassLiteral {
        class: TypeRef,
    },
    /// `Owner.NAME`, typically an enum constant.
    Property {
        owner: TypeRef,
        property: String,
    },
    Annotation {
        annotation: Box<AnnotationNode>,
    },
    Expr {
        expr: Expr,
    },
}

impl AnnotationValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self::Constant(Constant::Str(value.into()))
    }

    pub fn bool(value: bool) -> Self {
        Self::Constant(Constant::Bool(value))
    }

    pub fn class(ty: impl Into<TypeRef>) -> Self {
        Self::ClassLiteral { class: ty.into() }
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Self::Constant(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Constant(Constant::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Constant(Constant::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// A string, or a list of strings. Other shapes give `None`.
    pub fn as_strings(&self) -> Option<Vec<String>> {
        match self {
            Self::Constant(Constant::Str(s)) => Some(vec![s.clone()]),
            Self::List(items) => items
                .iter()
                .map(|i| i.as_str().map(str::to_string))
                .collect(),
            _ => None,
        }
    }

    /// A class literal, or a list of them. Other shapes give `None`.
    pub fn as_classes(&self) -> Option<Vec<TypeRef>> {
        match self {
            Self::ClassLiteral { class } => Some(vec![class.clone()]),
            Self::List(items) => items
                .iter()
                .map(|i| match i {
                    Self::ClassLiteral { class } => Some(class.clone()),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }

    /// The constant name of an enum-style `Owner.NAME` value, or a string.
    pub fn as_enum_constant(&self) -> Option<&str> {
        match self {
            Self::Property { property, .. } => Some(property),
            Self::Constant(Constant::Str(s)) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AnnotationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(c) => write!(f, "{}", c),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Self::ClassLiteral { class } => write!(f, "{}", class),
            Self::Property { owner, property } => write!(f, "{}.{}", owner, property),
            Self::Annotation { annotation } => write!(f, "{}", annotation),
            Self::Expr { .. } => f.write_str("{ ... }"),
        }
    }
}

/// One annotation use: the annotation type plus its members, in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationNode {
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub members: IndexMap<String, AnnotationValue>,
    #[serde(default)]
    pub pos: SourcePos,
    /// The node carrying this annotation; set when attached to the arena.
    #[serde(skip)]
    pub owner: Option<NodeRef>,
}

impl AnnotationNode {
    pub fn new(ty: impl Into<TypeRef>) -> Self {
        Self {
            ty: ty.into(),
            members: IndexMap::new(),
            pos: SourcePos::default(),
            owner: None,
        }
    }

    pub fn with_member(mut self, name: &str, value: AnnotationValue) -> Self {
        self.members.insert(name.to_string(), value);
        self
    }

    pub fn at(mut self, pos: SourcePos) -> Self {
        self.pos = pos;
        self
    }

    pub fn member(&self, name: &str) -> Option<&AnnotationValue> {
        self.members.get(name)
    }

    pub fn set_member(&mut self, name: &str, value: AnnotationValue) {
        self.members.insert(name.to_string(), value);
    }

    pub fn is_type(&self, qualified: &str) -> bool {
        self.ty.is_named(qualified)
    }
}

impl fmt::Display for AnnotationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.ty.simple_name())?;
        if self.members.is_empty() {
            return Ok(());
        }
        f.write_str("(")?;
        for (i, (name, value)) in self.members.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} = {}", name, value)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_values_deserialize_by_shape() {
        let anno: AnnotationNode = serde_json::from_str(
            r#"{
                "type": "ToString",
                "members": {
                    "includeNames": true,
                    "excludes": ["age", "id"],
                    "thrown": {"class": "java.lang.IllegalStateException"},
                    "unit": {"owner": "TimeUnit", "property": "SECONDS"}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(anno.member("includeNames"), Some(&AnnotationValue::bool(true)));
        assert!(matches!(anno.member("excludes"), Some(AnnotationValue::List(items)) if items.len() == 2));
        assert!(matches!(anno.member("thrown"), Some(AnnotationValue::ClassLiteral { .. })));
        assert!(matches!(
            anno.member("unit"),
            Some(AnnotationValue::Property { property, .. }) if property == "SECONDS"
        ));
    }

    #[test]
    fn display_uses_simple_name() {
        let anno = AnnotationNode::new("canopy.transform.ToString")
            .with_member("includeNames", AnnotationValue::bool(true));
        assert_eq!(anno.to_string(), "@ToString(includeNames = true)");
    }
}
