//! # Compiler Module
//!
//! ## Purpose
//! Owns a compilation: the sources, the shared AST, the class loader, the
//! configuration and the ordered list of phase operations.
//!
//! ## Invariants
//! - Operations run in phase order, and in registration order within a phase.
//! - Trait composition runs before the CANONICALIZATION dispatcher; the
//!   collector runs before the SEMANTIC_ANALYSIS dispatcher.
//! - Recoverable errors stop compilation at the end of the phase in which
//!   they were reported; internal errors stop it immediately.

use crate::ast::document::ModuleDocument;
use crate::ast::{Ast, ClassId, ModuleId, NodeRef};
use crate::config::CompilerConfiguration;
use crate::errors::{CompileError, CompileFailure, ErrorCollector, InternalError};
use crate::transform::builtin::trait_::compose_traits;
use crate::transform::global::{self, GlobalTransform};
use crate::transform::{collector, dispatch, AstTransformation, TransformContext, TransformLoader};
use indexmap::IndexSet;
use std::path::Path;

pub mod phase;
pub mod source;

pub use phase::CompilePhase;
pub use source::{is_document_path, read_document, DocumentError, SourceUnit};

// ============================================================================
// PHASE OPERATIONS
// ============================================================================

enum OperationKind {
    /// Registers local transformations from annotation uses.
    Collect,
    /// Adds trait forwarders and field helpers to implementing classes.
    ComposeTraits,
    /// Runs the pending local transformations of every class.
    Dispatch,
    /// Visits every module with a global transformation.
    Global {
        name: String,
        transform: Box<dyn AstTransformation>,
    },
}

struct PhaseOperation {
    phase: CompilePhase,
    kind: OperationKind,
}

impl PhaseOperation {
    fn label(&self) -> &str {
        match &self.kind {
            OperationKind::Collect => "collect",
            OperationKind::ComposeTraits => "compose-traits",
            OperationKind::Dispatch => "dispatch",
            OperationKind::Global { name, .. } => name,
        }
    }
}

// ============================================================================
// COMPILATION UNIT
// ============================================================================

pub struct CompilationUnit {
    config: CompilerConfiguration,
    ast: Ast,
    sources: Vec<SourceUnit>,
    loader: TransformLoader,
    errors: ErrorCollector,
    operations: Vec<PhaseOperation>,
    completed: Option<CompilePhase>,
    global_transform_names: IndexSet<String>,
    globals_loaded: bool,
}

impl CompilationUnit {
    pub fn new(config: CompilerConfiguration, mut loader: TransformLoader) -> Self {
        for dir in &config.classpath {
            loader.add_classpath(dir.clone());
        }
        let errors = ErrorCollector::new("").with_warning_level(config.warning_category());

        let mut operations = vec![
            PhaseOperation {
                phase: CompilePhase::Canonicalization,
                kind: OperationKind::ComposeTraits,
            },
            PhaseOperation {
                phase: CompilePhase::SemanticAnalysis,
                kind: OperationKind::Collect,
            },
        ];
        operations.extend(CompilePhase::transformable().map(|phase| PhaseOperation {
            phase,
            kind: OperationKind::Dispatch,
        }));

        Self {
            config,
            ast: Ast::new(),
            sources: Vec::new(),
            loader,
            errors,
            operations,
            completed: None,
            global_transform_names: IndexSet::new(),
            globals_loaded: false,
        }
    }

    /// A unit with the built-in transformations and default configuration.
    pub fn with_defaults() -> Self {
        Self::new(CompilerConfiguration::default(), TransformLoader::with_builtins())
    }

    // ------------------------------------------------------------------------
    // Sources
    // ------------------------------------------------------------------------

    pub fn add_document(
        &mut self,
        name: impl Into<String>,
        doc: &ModuleDocument,
    ) -> Result<ModuleId, InternalError> {
        let name = name.into();
        let module = self.ast.load_document(name.clone(), doc)?;
        self.sources
            .push(SourceUnit::new(name, module, self.config.warning_category()));
        Ok(module)
    }

    pub fn add_file(&mut self, path: &Path) -> Result<ModuleId, SourceError> {
        let doc = read_document(path)?;
        Ok(self.add_document(path.display().to_string(), &doc)?)
    }

    // ------------------------------------------------------------------------
    // Global transformations
    // ------------------------------------------------------------------------

    /// Scans the classpath for global transformations and registers an
    /// operation for each one not seen before.
    pub fn load_global_transforms(&mut self) {
        let found = global::discover(
            &self.loader,
            &self.config,
            &mut self.global_transform_names,
            &mut self.errors,
        );
        for GlobalTransform {
            name,
            phase,
            location,
            transform,
        } in found
        {
            tracing::debug!(transform = %name, %phase, %location, "registered global transform");
            self.operations.push(PhaseOperation {
                phase,
                kind: OperationKind::Global { name, transform },
            });
        }
        self.globals_loaded = true;
    }

    /// Adds a classpath root and rescans for global transformations.
    pub fn add_classpath(&mut self, dir: impl Into<std::path::PathBuf>) {
        self.loader.add_classpath(dir);
        if self.globals_loaded {
            self.load_global_transforms();
        }
    }

    // ------------------------------------------------------------------------
    // Compilation
    // ------------------------------------------------------------------------

    /// Runs every phase up to the configured target.
    pub fn compile(&mut self) -> Result<(), CompileFailure> {
        self.compile_to(self.config.target_phase)
    }

    /// Runs every phase not yet completed, up to and including `target`.
    pub fn compile_to(&mut self, target: CompilePhase) -> Result<(), CompileFailure> {
        if !self.globals_loaded {
            self.load_global_transforms();
        }
        for phase in CompilePhase::ALL {
            if phase > target {
                break;
            }
            if self.completed.is_some_and(|done| phase <= done) {
                continue;
            }
            tracing::debug!(%phase, "phase started");
            self.run_phase(phase)?;
            self.completed = Some(phase);
            self.fail_if_errors(phase)?;
            tracing::debug!(%phase, "phase finished");
        }
        Ok(())
    }

    fn run_phase(&mut self, phase: CompilePhase) -> Result<(), InternalError> {
        let Self {
            config,
            ast,
            sources,
            loader,
            operations,
            ..
        } = self;
        for op in operations.iter_mut().filter(|op| op.phase == phase) {
            tracing::trace!(%phase, operation = op.label(), "running operation");
            for source in sources.iter_mut() {
                let module = source.module();
                match &mut op.kind {
                    OperationKind::Global { transform, .. } => {
                        let mut cx = TransformContext {
                            ast: &mut *ast,
                            source: &mut *source,
                            loader: &*loader,
                            config: &*config,
                            phase,
                        };
                        transform.visit(&[NodeRef::Module(module)], &mut cx)?;
                    }
                    kind => {
                        // Classes added while the operation runs are picked up
                        // by later operations, not this one.
                        let classes: Vec<ClassId> = ast.module(module).classes.clone();
                        for class in classes {
                            match kind {
                                OperationKind::Collect => {
                                    collector::collect_class(ast, source, &*loader, class)?
                                }
                                OperationKind::ComposeTraits => {
                                    compose_traits(ast, source, class)?
                                }
                                OperationKind::Dispatch => dispatch::dispatch_class(
                                    ast, source, &*loader, config, phase, class,
                                )?,
                                OperationKind::Global { .. } => {}
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn fail_if_errors(&self, phase: CompilePhase) -> Result<(), CompileFailure> {
        let errors = self.errors.error_count()
            + self
                .sources
                .iter()
                .map(|s| s.errors().error_count())
                .sum::<usize>();
        if errors > 0 {
            return Err(CompileFailure::CompilationFailed { errors, phase });
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn ast_mut(&mut self) -> &mut Ast {
        &mut self.ast
    }

    pub fn config(&self) -> &CompilerConfiguration {
        &self.config
    }

    pub fn loader(&self) -> &TransformLoader {
        &self.loader
    }

    pub fn sources(&self) -> &[SourceUnit] {
        &self.sources
    }

    pub fn source(&self, module: ModuleId) -> Option<&SourceUnit> {
        self.sources.iter().find(|s| s.module() == module)
    }

    /// Unit-level errors, such as global discovery problems.
    pub fn errors(&self) -> &ErrorCollector {
        &self.errors
    }

    /// The last phase that ran to completion.
    pub fn completed_phase(&self) -> Option<CompilePhase> {
        self.completed
    }

    /// Global transformation names seen so far.
    pub fn global_transform_names(&self) -> &IndexSet<String> {
        &self.global_transform_names
    }

    /// Every error and warning, unit-level first.
    pub fn diagnostics(&self) -> Vec<&CompileError> {
        self.errors
            .messages()
            .chain(self.sources.iter().flat_map(|s| s.errors().messages()))
            .collect()
    }
}

impl std::fmt::Debug for CompilationUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilationUnit")
            .field("sources", &self.sources.len())
            .field(
                "operations",
                &self
                    .operations
                    .iter()
                    .map(|op| format!("{}:{}", op.phase, op.label()))
                    .collect::<Vec<_>>(),
            )
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_are_ordered_for_each_phase() {
        let unit = CompilationUnit::with_defaults();
        let labels: Vec<String> = unit
            .operations
            .iter()
            .filter(|op| op.phase == CompilePhase::Canonicalization)
            .map(|op| op.label().to_string())
            .collect();
        assert_eq!(labels, ["compose-traits", "dispatch"]);
    }

    #[test]
    fn empty_unit_compiles_to_the_target() {
        let mut unit = CompilationUnit::with_defaults();
        unit.compile_to(CompilePhase::Canonicalization).unwrap();
        assert_eq!(unit.completed_phase(), Some(CompilePhase::Canonicalization));
        unit.compile().unwrap();
        assert_eq!(unit.completed_phase(), Some(CompilePhase::Finalization));
    }
}
