//! Accumulates recoverable errors and warnings for one source unit or for the
//! compilation unit as a whole.

use super::{CompileError, CompileFailure, ErrorKind, Severity, WarningCategory};
use crate::compiler::CompilePhase;
use crate::ast::SourcePos;

#[derive(Debug, Clone)]
pub struct ErrorCollector {
    source_name: String,
    warning_level: WarningCategory,
    errors: Vec<CompileError>,
    warnings: Vec<CompileError>,
}

impl ErrorCollector {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            warning_level: WarningCategory::LikelyErrors,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_warning_level(mut self, level: WarningCategory) -> Self {
        self.warning_level = level;
        self
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Records an error and continues.
    pub fn add_error(&mut self, kind: ErrorKind, position: SourcePos) {
        tracing::debug!(source = %self.source_name, code = kind.code_suffix(), "{}", kind);
        self.errors.push(CompileError::new(
            kind,
            Severity::Error,
            self.source_name.clone(),
            position,
        ));
    }

    /// Records a warning unless its category is above the configured level.
    pub fn add_warning(&mut self, category: WarningCategory, kind: ErrorKind, position: SourcePos) {
        if category > self.warning_level || category == WarningCategory::None {
            return;
        }
        tracing::warn!(source = %self.source_name, "{}", kind);
        self.warnings.push(CompileError::new(
            kind,
            Severity::Warning(category),
            self.source_name.clone(),
            position,
        ));
    }

    pub fn errors(&self) -> &[CompileError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[CompileError] {
        &self.warnings
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Fails when any error was recorded.
    pub fn fail_if_errors(&self, phase: CompilePhase) -> Result<(), CompileFailure> {
        if self.has_errors() {
            return Err(CompileFailure::CompilationFailed {
                errors: self.errors.len(),
                phase,
            });
        }
        Ok(())
    }

    /// Errors followed by warnings.
    pub fn messages(&self) -> impl Iterator<Item = &CompileError> {
        self.errors.iter().chain(self.warnings.iter())
    }
}

impl Default for ErrorCollector {
    fn default() -> Self {
        Self::new("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(message: &str) -> ErrorKind {
        ErrorKind::TransformUsage {
            annotation: "@Test".into(),
            message: message.into(),
        }
    }

    #[test]
    fn warnings_above_level_are_dropped() {
        let mut errors = ErrorCollector::new("A.yaml");
        errors.add_warning(WarningCategory::PossibleErrors, usage("dropped"), SourcePos::default());
        errors.add_warning(WarningCategory::LikelyErrors, usage("kept"), SourcePos::default());
        assert_eq!(errors.warnings().len(), 1);
        assert!(!errors.has_errors());
    }

    #[test]
    fn errors_keep_source_name() {
        let mut errors = ErrorCollector::new("A.yaml");
        errors.add_error(usage("boom"), SourcePos::at(1, 2));
        assert_eq!(errors.error_count(), 1);
        assert_eq!(errors.errors()[0].source_info.source_name, "A.yaml");
    }
}
