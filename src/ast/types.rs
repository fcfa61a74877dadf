//! Type references.
//!
//! A [`TypeRef`] names a type as written (`String`, `java.util.List<String>`,
//! `int[]`). Simple names are resolved against the language's default imports
//! when types are compared, so `String` and `java.lang.String` are the same
//! type.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Types visible by simple name without an import.
const DEFAULT_IMPORTED: &[&str] = &[
    "java.lang.Object",
    "java.lang.String",
    "java.lang.Integer",
    "java.lang.Long",
    "java.lang.Short",
    "java.lang.Byte",
    "java.lang.Character",
    "java.lang.Boolean",
    "java.lang.Double",
    "java.lang.Float",
    "java.lang.Number",
    "java.lang.Class",
    "java.lang.Cloneable",
    "java.lang.Comparable",
    "java.lang.Thread",
    "java.lang.System",
    "java.lang.Math",
    "java.lang.Iterable",
    "java.lang.Runnable",
    "java.lang.StringBuilder",
    "java.lang.Enum",
    "java.lang.RuntimeException",
    "java.lang.IllegalArgumentException",
    "java.lang.IllegalStateException",
    "java.lang.InterruptedException",
    "java.lang.IndexOutOfBoundsException",
    "java.lang.UnsupportedOperationException",
    "java.lang.CloneNotSupportedException",
    "java.util.List",
    "java.util.Map",
    "java.util.Set",
    "java.util.Collection",
    "java.util.ArrayList",
    "java.util.LinkedList",
    "java.util.HashMap",
    "java.util.LinkedHashMap",
    "java.util.HashSet",
    "java.util.LinkedHashSet",
    "java.util.SortedSet",
    "java.util.SortedMap",
    "java.util.Date",
    "java.util.UUID",
    "java.util.Collections",
    "java.util.Objects",
    "java.util.Comparator",
    "java.util.Arrays",
    "java.math.BigInteger",
    "java.math.BigDecimal",
    "java.net.URI",
    "java.util.concurrent.TimeUnit",
    "java.util.concurrent.TimeoutException",
    "java.util.logging.Logger",
    "canopy.runtime.HashCodeHelper",
    "canopy.runtime.InvokerHelper",
];

static DEFAULT_IMPORTS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    DEFAULT_IMPORTED
        .iter()
        .map(|qualified| (simple_name(qualified), *qualified))
        .collect()
});

/// Package whose annotation types resolve by simple name.
pub const TRANSFORM_PACKAGE: &str = "canopy.transform";

const PRIMITIVES: &[&str] = &[
    "boolean", "byte", "char", "short", "int", "long", "float", "double",
];

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeRef {
    pub name: String,
    pub generics: Vec<TypeRef>,
    pub dims: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParseError(pub String);

impl fmt::Display for TypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid type reference '{}'", self.0)
    }
}

impl std::error::Error for TypeParseError {}

// ============================================================================
// PUBLIC API IMPLEMENTATION
// ============================================================================

impl TypeRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generics: Vec::new(),
            dims: 0,
        }
    }

    pub fn generic(name: impl Into<String>, generics: Vec<TypeRef>) -> Self {
        Self {
            name: name.into(),
            generics,
            dims: 0,
        }
    }

    pub fn array_of(element: TypeRef) -> Self {
        Self {
            dims: element.dims + 1,
            ..element
        }
    }

    pub fn object() -> Self {
        Self::new("java.lang.Object")
    }
    pub fn string() -> Self {
        Self::new("java.lang.String")
    }
    pub fn int() -> Self {
        Self::new("int")
    }
    pub fn long() -> Self {
        Self::new("long")
    }
    pub fn boolean() -> Self {
        Self::new("boolean")
    }
    pub fn void() -> Self {
        Self::new("void")
    }
    pub fn map() -> Self {
        Self::new("java.util.Map")
    }
    pub fn list() -> Self {
        Self::new("java.util.List")
    }
    pub fn class_type() -> Self {
        Self::new("java.lang.Class")
    }

    /// The fully qualified name, with default imports applied.
    pub fn qualified_name(&self) -> &str {
        qualify(&self.name)
    }

    pub fn simple_name(&self) -> &str {
        simple_name(&self.name)
    }

    /// Same base type, ignoring generics.
    pub fn is(&self, other: &TypeRef) -> bool {
        self.dims == other.dims && same_name(&self.name, &other.name)
    }

    /// Whether this names `qualified` (without array dimensions).
    pub fn is_named(&self, qualified: &str) -> bool {
        self.dims == 0 && same_name(&self.name, qualified)
    }

    pub fn is_primitive(&self) -> bool {
        self.dims == 0 && PRIMITIVES.contains(&self.name.as_str())
    }

    pub fn is_void(&self) -> bool {
        self.dims == 0 && self.name == "void"
    }

    pub fn is_array(&self) -> bool {
        self.dims > 0
    }

    pub fn is_object(&self) -> bool {
        self.is_named("java.lang.Object") || self.name == "def"
    }

    pub fn element_type(&self) -> Option<TypeRef> {
        if self.dims == 0 {
            return None;
        }
        Some(TypeRef {
            name: self.name.clone(),
            generics: self.generics.clone(),
            dims: self.dims - 1,
        })
    }

    /// Boxed equivalent for primitives, otherwise a copy.
    pub fn boxed(&self) -> TypeRef {
        if !self.is_primitive() {
            return self.clone();
        }
        let name = match self.name.as_str() {
            "boolean" => "java.lang.Boolean",
            "byte" => "java.lang.Byte",
            "char" => "java.lang.Character",
            "short" => "java.lang.Short",
            "int" => "java.lang.Integer",
            "long" => "java.lang.Long",
            "float" => "java.lang.Float",
            _ => "java.lang.Double",
        };
        TypeRef::new(name)
    }

    /// Without generics or array dimensions.
    pub fn plain(&self) -> TypeRef {
        TypeRef::new(self.name.clone())
    }

    /// Getter name prefix for a property of this type.
    pub fn getter_prefix(&self) -> &'static str {
        if self.dims == 0 && self.name == "boolean" {
            "is"
        } else {
            "get"
        }
    }

    /// Display form with default-imported names shortened, as source would
    /// spell them.
    pub fn short(&self) -> String {
        let mut out = String::new();
        let simple = simple_name(&self.name);
        if qualify(simple) == self.name {
            out.push_str(simple);
        } else {
            out.push_str(&self.name);
        }
        if !self.generics.is_empty() {
            let inner: Vec<String> = self.generics.iter().map(TypeRef::short).collect();
            out.push('<');
            out.push_str(&inner.join(", "));
            out.push('>');
        }
        for _ in 0..self.dims {
            out.push_str("[]");
        }
        out
    }

    /// JVM-ish descriptor fragment used to sort synthesized methods.
    pub fn descriptor(&self) -> String {
        let mut out = self.qualified_name().to_string();
        for _ in 0..self.dims {
            out.push_str("[]");
        }
        out
    }
}

pub fn qualify(name: &str) -> &str {
    DEFAULT_IMPORTS.get(name).copied().unwrap_or(name)
}

pub fn simple_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Names match when equal after default-import qualification, or when one is
/// unqualified and matches the other's simple name.
pub fn same_name(a: &str, b: &str) -> bool {
    let (qa, qb) = (qualify(a), qualify(b));
    if qa == qb {
        return true;
    }
    let a_simple = !qa.contains('.');
    let b_simple = !qb.contains('.');
    (a_simple && simple_name(qb) == qa) || (b_simple && simple_name(qa) == qb)
}

/// Capitalizes the first character, as used by accessor names.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============================================================================
// PARSING AND FORMATTING
// ============================================================================

impl FromStr for TypeRef {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = TypeParser {
            chars: s.trim().char_indices().peekable(),
            input: s.trim(),
        };
        let parsed = parser
            .parse()
            .ok_or_else(|| TypeParseError(s.to_string()))?;
        if parser.chars.peek().is_some() {
            return Err(TypeParseError(s.to_string()));
        }
        Ok(parsed)
    }
}

struct TypeParser<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    input: &'a str,
}

impl TypeParser<'_> {
    fn parse(&mut self) -> Option<TypeRef> {
        self.skip_ws();
        let start = self.chars.peek()?.0;
        let mut end = start;
        while let Some(&(i, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' || c == '$' || c == '.' {
                end = i + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        if end == start {
            return None;
        }
        let mut ty = TypeRef::new(&self.input[start..end]);
        self.skip_ws();
        if self.eat('<') {
            loop {
                ty.generics.push(self.parse()?);
                self.skip_ws();
                if self.eat(',') {
                    continue;
                }
                if self.eat('>') {
                    break;
                }
                return None;
            }
        }
        self.skip_ws();
        while self.eat('[') {
            if !self.eat(']') {
                return None;
            }
            ty.dims += 1;
            self.skip_ws();
        }
        Some(ty)
    }

    fn eat(&mut self, expected: char) -> bool {
        if matches!(self.chars.peek(), Some(&(_, c)) if c == expected) {
            self.chars.next();
            return true;
        }
        false
    }

    fn skip_ws(&mut self) {
        while matches!(self.chars.peek(), Some(&(_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }
}

impl TryFrom<String> for TypeRef {
    type Error = TypeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TypeRef> for String {
    fn from(value: TypeRef) -> Self {
        value.to_string()
    }
}

impl From<&str> for TypeRef {
    fn from(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| TypeRef::new(value))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.generics.is_empty() {
            f.write_str("<")?;
            for (i, g) in self.generics.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", g)?;
            }
            f.write_str(">")?;
        }
        for _ in 0..self.dims {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRef({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_generics_and_arrays() {
        let ty: TypeRef = "Map<String, List<Integer>>[]".parse().unwrap();
        assert_eq!(ty.name, "Map");
        assert_eq!(ty.dims, 1);
        assert_eq!(ty.generics.len(), 2);
        assert_eq!(ty.generics[1].generics[0].name, "Integer");
        assert_eq!(ty.to_string(), "Map<String, List<Integer>>[]");
    }

    #[test]
    fn rejects_unbalanced_generics() {
        assert!("List<String".parse::<TypeRef>().is_err());
        assert!("int[".parse::<TypeRef>().is_err());
    }

    #[test]
    fn default_imports_make_names_equal() {
        assert!(TypeRef::new("String").is(&TypeRef::string()));
        assert!(TypeRef::new("Date").is_named("java.util.Date"));
        assert!(!TypeRef::new("Date").is_named("java.sql.Date"));
        assert!(same_name("Person", "com.acme.Person"));
    }

    #[test]
    fn boolean_getters_use_is_prefix() {
        assert_eq!(TypeRef::boolean().getter_prefix(), "is");
        assert_eq!(TypeRef::new("Boolean").getter_prefix(), "get");
        assert_eq!(capitalize("name"), "Name");
    }
}
