//! One source file of a compilation.

use crate::ast::document::ModuleDocument;
use crate::ast::{ModuleId, SourcePos};
use crate::errors::{ErrorCollector, ErrorKind, WarningCategory};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A source's module plus the errors reported against it.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    name: String,
    module: ModuleId,
    errors: ErrorCollector,
}

impl SourceUnit {
    pub fn new(name: impl Into<String>, module: ModuleId, warning_level: WarningCategory) -> Self {
        let name = name.into();
        Self {
            errors: ErrorCollector::new(name.clone()).with_warning_level(warning_level),
            name,
            module,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> ModuleId {
        self.module
    }

    pub fn errors(&self) -> &ErrorCollector {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut ErrorCollector {
        &mut self.errors
    }

    pub fn add_error(&mut self, kind: ErrorKind, position: SourcePos) {
        self.errors.add_error(kind, position);
    }

    pub fn add_warning(&mut self, category: WarningCategory, kind: ErrorKind, position: SourcePos) {
        self.errors.add_warning(category, kind, position);
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON module document {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid YAML module document {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("unsupported module document extension: {0} (expected .json, .yaml or .yml)")]
    UnknownExtension(PathBuf),
}

/// Whether a path names a module document.
pub fn is_document_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json" | "yaml" | "yml")
    )
}

/// Reads a module document, choosing the format by extension.
pub fn read_document(path: &Path) -> Result<ModuleDocument, DocumentError> {
    let text = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => ModuleDocument::from_json(&text).map_err(|source| DocumentError::Json {
            path: path.to_path_buf(),
            source,
        }),
        Some("yaml" | "yml") => {
            ModuleDocument::from_yaml(&text).map_err(|source| DocumentError::Yaml {
                path: path.to_path_buf(),
                source,
            })
        }
        _ => Err(DocumentError::UnknownExtension(path.to_path_buf())),
    }
}
