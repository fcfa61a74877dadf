//! Canopy error handling.
//!
//! Two taxonomies live here:
//!
//! - [`CompileError`]: user-facing, recoverable problems (malformed annotation
//!   usage, unloadable transformation classes, conflicting members). These are
//!   accumulated in an [`ErrorCollector`] and compilation continues until the
//!   end of the current phase.
//! - [`InternalError`]: invariant violations inside the engine itself (a
//!   transformation handed the wrong node shape). These are returned up the
//!   stack and abort compilation immediately, so tooling can tell "the compiler
//!   has a bug" apart from "the user's code is wrong".

use crate::ast::SourcePos;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod collector;
pub mod internal;

pub use collector::ErrorCollector;
pub use internal::InternalError;

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// A single recoverable problem reported during compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Error or warning; warnings carry their category.
    pub severity: Severity,
    /// Where it happened.
    pub source_info: SourceInfo,
    /// How to help.
    pub diagnostic_info: DiagnosticInfo,
}

/// Source location of a reported problem.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInfo {
    pub source_name: String,
    pub position: SourcePos,
}

/// Diagnostic enhancement data.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticInfo {
    pub help: Option<String>,
    pub error_code: String,
}

/// Message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning(WarningCategory),
}

/// Warning categories, ordered from most to least severe. A collector only
/// keeps warnings whose category is at or below its configured level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCategory {
    None = 0,
    LikelyErrors = 1,
    PossibleErrors = 2,
    Paranoia = 3,
}

impl WarningCategory {
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Self::None,
            1 => Self::LikelyErrors,
            2 => Self::PossibleErrors,
            _ => Self::Paranoia,
        }
    }
}

/// Everything that can be reported through an [`ErrorCollector`].
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    // Local transformation registration (collector)
    TransformNotFound {
        transform: String,
        declared_by: String,
    },
    NotATransformation {
        transform: String,
        declared_by: String,
    },
    LocalPhaseTooEarly {
        annotation: String,
        phase: String,
    },
    NoTransformClasses {
        annotation: String,
    },
    AmbiguousTransformClasses {
        annotation: String,
    },
    InvalidAlias {
        alias: String,
        reason: String,
    },

    // Dispatch
    InstantiationFailed {
        transform: String,
        reason: String,
    },

    // Global transformation discovery
    ResourceIo {
        location: String,
        reason: String,
    },
    InvalidServiceEntry {
        entry: String,
        location: String,
    },
    GlobalDuplicate {
        transform: String,
        first: String,
        second: String,
    },
    GlobalMissingPhase {
        transform: String,
        location: String,
    },
    GlobalNotATransformation {
        transform: String,
        location: String,
    },
    GlobalInstantiationFailed {
        transform: String,
        location: String,
        reason: String,
    },

    // Built-in transformation usage
    IncludesAndExcludes {
        annotation: String,
    },
    UnknownProperty {
        annotation: String,
        list: String,
        property: String,
    },
    NotAllowedForInterface {
        annotation: String,
        class: String,
    },
    TransformUsage {
        annotation: String,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Registration,
    Dispatch,
    Discovery,
    Usage,
}

impl ErrorKind {
    /// Get the error category for test assertions.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::TransformNotFound { .. }
            | Self::NotATransformation { .. }
            | Self::LocalPhaseTooEarly { .. }
            | Self::NoTransformClasses { .. }
            | Self::AmbiguousTransformClasses { .. }
            | Self::InvalidAlias { .. } => ErrorCategory::Registration,

            Self::InstantiationFailed { .. } => ErrorCategory::Dispatch,

            Self::ResourceIo { .. }
            | Self::InvalidServiceEntry { .. }
            | Self::GlobalDuplicate { .. }
            | Self::GlobalMissingPhase { .. }
            | Self::GlobalNotATransformation { .. }
            | Self::GlobalInstantiationFailed { .. } => ErrorCategory::Discovery,

            Self::IncludesAndExcludes { .. }
            | Self::UnknownProperty { .. }
            | Self::NotAllowedForInterface { .. }
            | Self::TransformUsage { .. } => ErrorCategory::Usage,
        }
    }

    /// Get error code suffix for diagnostic codes.
    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::TransformNotFound { .. } => "transform_not_found",
            Self::NotATransformation { .. } => "not_a_transformation",
            Self::LocalPhaseTooEarly { .. } => "local_phase_too_early",
            Self::NoTransformClasses { .. } => "no_transform_classes",
            Self::AmbiguousTransformClasses { .. } => "ambiguous_transform_classes",
            Self::InvalidAlias { .. } => "invalid_alias",
            Self::InstantiationFailed { .. } => "instantiation_failed",
            Self::ResourceIo { .. } => "resource_io",
            Self::InvalidServiceEntry { .. } => "invalid_service_entry",
            Self::GlobalDuplicate { .. } => "global_duplicate",
            Self::GlobalMissingPhase { .. } => "global_missing_phase",
            Self::GlobalNotATransformation { .. } => "global_not_a_transformation",
            Self::GlobalInstantiationFailed { .. } => "global_instantiation_failed",
            Self::IncludesAndExcludes { .. } => "includes_and_excludes",
            Self::UnknownProperty { .. } => "unknown_property",
            Self::NotAllowedForInterface { .. } => "not_allowed_for_interface",
            Self::TransformUsage { .. } => "transform_usage",
        }
    }

    fn help(&self) -> Option<String> {
        match self {
            Self::TransformNotFound { .. } | Self::GlobalNotATransformation { .. } => {
                Some("Check that the transformation is registered with the class loader.".into())
            }
            Self::IncludesAndExcludes { .. } => {
                Some("Remove either the 'includes' or the 'excludes' member.".into())
            }
            Self::GlobalDuplicate { .. } => {
                Some("Remove one of the duplicate service registrations.".into())
            }
            _ => None,
        }
    }
}

impl ErrorCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Dispatch => "dispatch",
            Self::Discovery => "discovery",
            Self::Usage => "usage",
        }
    }
}

// ============================================================================
// PUBLIC API IMPLEMENTATION
// ============================================================================

impl CompileError {
    /// Builds an error or warning with an auto-populated code and help text.
    pub fn new(
        kind: ErrorKind,
        severity: Severity,
        source_name: impl Into<String>,
        position: SourcePos,
    ) -> Self {
        let error_code = format!("canopy::{}::{}", kind.category().as_str(), kind.code_suffix());
        let help = kind.help();
        Self {
            kind,
            severity,
            source_info: SourceInfo {
                source_name: source_name.into(),
                position,
            },
            diagnostic_info: DiagnosticInfo { help, error_code },
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self.severity, Severity::Warning(_))
    }

    /// The bare message, without position suffix.
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::TransformNotFound {
                transform,
                declared_by,
            } => write!(
                f,
                "Could not find class for Transformation Processor {} declared by {}",
                transform, declared_by
            ),
            ErrorKind::NotATransformation {
                transform,
                declared_by,
            } => write!(f, "Not an ASTTransformation: {} declared by {}", transform, declared_by),
            ErrorKind::LocalPhaseTooEarly { annotation, phase } => write!(
                f,
                "{} is defined to be run in compile phase {}. Local AST transformations must run in SEMANTIC_ANALYSIS or later!",
                annotation, phase
            ),
            ErrorKind::NoTransformClasses { annotation } => write!(
                f,
                "@AstTransformationClass in {} does not specify any transform class names/classes",
                annotation
            ),
            ErrorKind::AmbiguousTransformClasses { annotation } => write!(
                f,
                "@AstTransformationClass in {} should specify transforms only by class names or by classes and not by both",
                annotation
            ),
            ErrorKind::InvalidAlias { alias, reason } => {
                write!(f, "Invalid annotation collector {}: {}", alias, reason)
            }
            ErrorKind::InstantiationFailed { transform, reason } => write!(
                f,
                "Could not instantiate Transformation Processor {}: {}",
                transform, reason
            ),
            ErrorKind::ResourceIo { location, reason } => write!(
                f,
                "IOException reading the service definition at {} because of exception {}",
                location, reason
            ),
            ErrorKind::InvalidServiceEntry { entry, location } => write!(
                f,
                "Invalid transform class name '{}' in the service definition at {}",
                entry, location
            ),
            ErrorKind::GlobalDuplicate {
                transform,
                first,
                second,
            } => write!(
                f,
                "The global transform for class {} is defined in both {} and {} - the former definition will be used and the latter ignored.",
                transform, first, second
            ),
            ErrorKind::GlobalMissingPhase {
                transform,
                location,
            } => write!(
                f,
                "Transform Class {} is specified as a global transform in {} but it does not declare a compile phase",
                transform, location
            ),
            ErrorKind::GlobalNotATransformation {
                transform,
                location,
            } => write!(
                f,
                "Transform Class {} specified at {} is not an ASTTransformation.",
                transform, location
            ),
            ErrorKind::GlobalInstantiationFailed {
                transform,
                location,
                reason,
            } => write!(
                f,
                "Could not instantiate global transform class {} specified at {} because of exception {}",
                transform, location, reason
            ),
            ErrorKind::IncludesAndExcludes { annotation } => write!(
                f,
                "Error during {} processing: Only one of 'includes' and 'excludes' should be supplied not both.",
                annotation
            ),
            ErrorKind::UnknownProperty {
                annotation,
                list,
                property,
            } => write!(
                f,
                "Error during {} processing: '{}' property '{}' does not exist.",
                annotation, list, property
            ),
            ErrorKind::NotAllowedForInterface { annotation, class } => write!(
                f,
                "Error processing interface '{}'. {} not allowed for interfaces.",
                class, annotation
            ),
            ErrorKind::TransformUsage { message, .. } => f.write_str(message),
        }
    }
}

impl std::error::Error for CompileError {}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pos = self.source_info.position;
        if pos.is_known() {
            write!(
                f,
                "{}\n @ line {}, column {}.",
                self.kind, pos.line, pos.column
            )
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

impl Diagnostic for CompileError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(&self.diagnostic_info.error_code))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(match self.severity {
            Severity::Error => miette::Severity::Error,
            Severity::Warning(_) => miette::Severity::Warning,
        })
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diagnostic_info
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }
}

/// Why a compilation stopped.
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum CompileFailure {
    /// Recoverable errors were reported; compilation stopped at the end of
    /// the phase in which they appeared.
    #[error("Compilation failed with {errors} error(s) after phase {phase}")]
    #[diagnostic(code(canopy::compile::failed))]
    CompilationFailed {
        errors: usize,
        phase: crate::compiler::CompilePhase,
    },
    #[error(transparent)]
    #[diagnostic(transparent)]
    Internal(#[from] InternalError),
}

// ============================================================================
// ERROR FORMATTING UTILITIES
// ============================================================================

/// Prints a diagnostic with full miette formatting.
pub fn print_diagnostic<D>(diagnostic: D)
where
    D: Diagnostic + Send + Sync + 'static,
{
    let report = miette::Report::new(diagnostic);
    eprintln!("{report:?}");
}
