//! Class loading for transformations.
//!
//! Transformation classes are not loaded from bytecode. A [`TransformLoader`]
//! is a registry of named factories plus the annotation types that refer to
//! them, and it also serves resources from classpath directories and from
//! memory for global transformation discovery.

use super::AstTransformation;
use crate::ast::types::{same_name, TRANSFORM_PACKAGE};
use crate::ast::{AnnotationNode, TypeRef};
use crate::compiler::CompilePhase;
use indexmap::IndexMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Creates a fresh transformation instance, or explains why it cannot.
pub type TransformFactory =
    Arc<dyn Fn() -> Result<Box<dyn AstTransformation>, String> + Send + Sync>;

/// A resolved transformation class.
#[derive(Clone)]
pub struct TransformHandle {
    pub name: String,
    /// The phase the class declares, if any.
    pub phase: Option<CompilePhase>,
    factory: TransformFactory,
}

impl TransformHandle {
    pub fn instantiate(&self) -> Result<Box<dyn AstTransformation>, String> {
        (self.factory)()
    }
}

impl fmt::Debug for TransformHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformHandle")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("class not found: {0}")]
    NotFound(String),
    #[error("{0} does not implement the transformation capability")]
    NotATransformation(String),
}

/// How an alias merges its collected annotations with explicit ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AliasMode {
    #[default]
    Duplicate,
    PreferCollector,
    PreferCollectorMerged,
    PreferExplicit,
    PreferExplicitMerged,
}

impl FromStr for AliasMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DUPLICATE" => Ok(AliasMode::Duplicate),
            "PREFER_COLLECTOR" => Ok(AliasMode::PreferCollector),
            "PREFER_COLLECTOR_MERGED" => Ok(AliasMode::PreferCollectorMerged),
            "PREFER_EXPLICIT" => Ok(AliasMode::PreferExplicit),
            "PREFER_EXPLICIT_MERGED" => Ok(AliasMode::PreferExplicitMerged),
            other => Err(format!("unknown collector mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AliasDefinition {
    pub annotations: Vec<AnnotationNode>,
    pub mode: AliasMode,
}

/// What the compiler knows about an annotation type.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationType {
    pub name: String,
    /// Transformation classes named by string.
    pub transform_names: Vec<String>,
    /// Transformation classes named by class literal.
    pub transform_classes: Vec<TypeRef>,
    pub alias: Option<AliasDefinition>,
}

impl AnnotationType {
    pub fn transforming(name: impl Into<String>, transforms: &[&str]) -> Self {
        Self {
            name: name.into(),
            transform_names: transforms.iter().map(|t| t.to_string()).collect(),
            transform_classes: Vec::new(),
            alias: None,
        }
    }
}

/// Where a resource was found.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceLocation {
    File(PathBuf),
    Memory { root: String, path: String },
}

impl fmt::Display for ResourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceLocation::File(path) => write!(f, "file:{}", path.display()),
            ResourceLocation::Memory { root, path } => write!(f, "memory:{}!/{}", root, path),
        }
    }
}

/// The class-loading capability the engine depends on.
pub trait ClassLoader {
    fn resolve_transformation(&self, name: &str) -> Result<TransformHandle, LoadError>;

    /// A registered annotation type, by qualified or simple name.
    fn annotation_type(&self, name: &str) -> Option<AnnotationType>;

    /// Every location of a resource, in classpath order.
    fn resources(&self, path: &str) -> Vec<ResourceLocation>;

    /// The compile phase a loadable class declares, whether or not it is a
    /// transformation.
    fn declared_phase(&self, name: &str) -> Option<CompilePhase> {
        self.resolve_transformation(name).ok().and_then(|h| h.phase)
    }

    fn read_resource(&self, location: &ResourceLocation) -> std::io::Result<String>;
}

struct TransformEntry {
    phase: Option<CompilePhase>,
    factory: TransformFactory,
}

#[derive(Default)]
pub struct TransformLoader {
    transforms: IndexMap<String, TransformEntry>,
    plain_classes: IndexMap<String, Option<CompilePhase>>,
    annotation_types: IndexMap<String, AnnotationType>,
    classpath: Vec<PathBuf>,
    memory: Vec<(String, String, String)>,
}

impl fmt::Debug for TransformLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformLoader")
            .field("transforms", &self.transforms.keys().collect::<Vec<_>>())
            .field("annotation_types", &self.annotation_types.keys().collect::<Vec<_>>())
            .field("classpath", &self.classpath)
            .finish_non_exhaustive()
    }
}

impl TransformLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// A loader with every built-in transformation registered.
    pub fn with_builtins() -> Self {
        let mut loader = Self::new();
        super::builtin::register_builtin_transforms(&mut loader);
        loader
    }

    pub fn register_transform<F>(&mut self, name: &str, phase: Option<CompilePhase>, factory: F)
    where
        F: Fn() -> Result<Box<dyn AstTransformation>, String> + Send + Sync + 'static,
    {
        self.transforms.insert(
            name.to_string(),
            TransformEntry {
                phase,
                factory: Arc::new(factory),
            },
        );
    }

    /// Registers a transformation whose construction cannot fail.
    pub fn register<T>(&mut self, name: &str, phase: CompilePhase)
    where
        T: AstTransformation + Default + 'static,
    {
        self.register_transform(name, Some(phase), || {
            Ok(Box::new(T::default()) as Box<dyn AstTransformation>)
        });
    }

    /// Registers a loadable class that is not a transformation.
    pub fn register_plain_class(&mut self, name: &str) {
        self.plain_classes.insert(name.to_string(), None);
    }

    /// Registers a class that declares a phase without implementing
    /// [`AstTransformation`].
    pub fn register_phased_class(&mut self, name: &str, phase: CompilePhase) {
        self.plain_classes.insert(name.to_string(), Some(phase));
    }

    pub fn register_annotation_type(&mut self, ty: AnnotationType) {
        self.annotation_types.insert(ty.name.clone(), ty);
    }

    pub fn register_alias(&mut self, name: &str, annotations: Vec<AnnotationNode>, mode: AliasMode) {
        self.register_annotation_type(AnnotationType {
            name: name.to_string(),
            transform_names: Vec::new(),
            transform_classes: Vec::new(),
            alias: Some(AliasDefinition { annotations, mode }),
        });
    }

    pub fn add_classpath(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        if !self.classpath.contains(&dir) {
            self.classpath.push(dir);
        }
    }

    pub fn classpath(&self) -> &[PathBuf] {
        &self.classpath
    }

    /// Serves `content` at `path` from a named in-memory root.
    pub fn add_resource(&mut self, root: &str, path: &str, content: &str) {
        self.memory
            .push((root.to_string(), path.to_string(), content.to_string()));
    }

    /// Registered annotation types with the phase of their first
    /// transformation, in registration order.
    pub fn annotation_types(&self) -> Vec<(&AnnotationType, Option<CompilePhase>)> {
        self.annotation_types
            .values()
            .map(|ty| {
                let phase = ty
                    .transform_names
                    .first()
                    .and_then(|n| self.transforms.get(n))
                    .and_then(|e| e.phase);
                (ty, phase)
            })
            .collect()
    }
}

impl ClassLoader for TransformLoader {
    fn resolve_transformation(&self, name: &str) -> Result<TransformHandle, LoadError> {
        if let Some(entry) = self.transforms.get(name) {
            return Ok(TransformHandle {
                name: name.to_string(),
                phase: entry.phase,
                factory: Arc::clone(&entry.factory),
            });
        }
        if self.plain_classes.contains_key(name) || self.annotation_types.contains_key(name) {
            return Err(LoadError::NotATransformation(name.to_string()));
        }
        Err(LoadError::NotFound(name.to_string()))
    }

    fn annotation_type(&self, name: &str) -> Option<AnnotationType> {
        if let Some(ty) = self.annotation_types.get(name) {
            return Some(ty.clone());
        }
        if !name.contains('.') {
            let qualified = format!("{}.{}", TRANSFORM_PACKAGE, name);
            if let Some(ty) = self.annotation_types.get(&qualified) {
                return Some(ty.clone());
            }
        }
        self.annotation_types
            .values()
            .find(|ty| same_name(&ty.name, name))
            .cloned()
    }

    fn resources(&self, path: &str) -> Vec<ResourceLocation> {
        let mut found: Vec<ResourceLocation> = self
            .classpath
            .iter()
            .map(|dir| dir.join(path))
            .filter(|candidate| candidate.is_file())
            .map(ResourceLocation::File)
            .collect();
        found.extend(
            self.memory
                .iter()
                .filter(|(_, p, _)| p == path)
                .map(|(root, p, _)| ResourceLocation::Memory {
                    root: root.clone(),
                    path: p.clone(),
                }),
        );
        found
    }

    fn declared_phase(&self, name: &str) -> Option<CompilePhase> {
        match self.transforms.get(name) {
            Some(entry) => entry.phase,
            None => self.plain_classes.get(name).copied().flatten(),
        }
    }

    fn read_resource(&self, location: &ResourceLocation) -> std::io::Result<String> {
        match location {
            ResourceLocation::File(path) => std::fs::read_to_string(path),
            ResourceLocation::Memory { root, path } => self
                .memory
                .iter()
                .find(|(r, p, _)| r == root && p == path)
                .map(|(_, _, content)| content.clone())
                .ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::NotFound, location.to_string())
                }),
        }
    }
}
