//! The `canopyc` command-line interface.
//!
//! Every subcommand builds a [`CompilationUnit`] from the common options, feeds
//! it module documents and reports through [`output`] and [`diagnostics`].

use crate::ast::printer::print_module;
use crate::ast::ModuleId;
use crate::cli::args::{CanopyArgs, Command, CommonOptions, DocumentFormat};
use crate::cli::output::PhaseSnapshot;
use crate::compiler::{is_document_path, CompilationUnit, CompilePhase, SourceError};
use crate::config::{CompilerConfiguration, ConfigError};
use crate::errors::{print_diagnostic, CompileFailure};
use crate::transform::TransformLoader;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

pub mod args;
pub mod diagnostics;
pub mod output;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "CANOPY_LOG";

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("cannot read {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("no module documents found under {0}")]
    NoDocuments(PathBuf),
    #[error("cannot serialize the module: {0}")]
    Serialize(String),
    #[error(transparent)]
    Internal(#[from] crate::errors::InternalError),
}

/// The main entry point for the CLI.
pub fn run() {
    let args = CanopyArgs::parse();
    init_tracing(args.options.verbose);

    let result = match &args.command {
        Command::Compile { paths } => handle_compile(&args.options, paths),
        Command::Expand { file } => handle_expand(&args.options, file),
        Command::Trace { file } => handle_trace(&args.options, file),
        Command::Ast { file, format } => handle_ast(&args.options, file, *format),
        Command::ListTransforms => handle_list_transforms(&args.options),
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("canopy=debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("canopy=warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

// ============================================================================
// UNIT SETUP
// ============================================================================

fn configuration(options: &CommonOptions) -> Result<CompilerConfiguration, CliError> {
    let mut config = match &options.config {
        Some(path) => CompilerConfiguration::load(path)?,
        None => CompilerConfiguration::default(),
    };
    config.classpath.extend(options.classpath.iter().cloned());
    if let Some(phase) = options.phase {
        config.target_phase = phase;
    }
    Ok(config)
}

fn unit(options: &CommonOptions) -> Result<CompilationUnit, CliError> {
    let config = configuration(options)?;
    Ok(CompilationUnit::new(config, TransformLoader::with_builtins()))
}

/// Expands directories into the module documents beneath them, sorted for a
/// stable order.
pub fn collect_documents(paths: &[PathBuf]) -> Result<Vec<PathBuf>, CliError> {
    let mut out = Vec::new();
    for path in paths {
        if !path.is_dir() {
            out.push(path.clone());
            continue;
        }
        let mut found = Vec::new();
        for entry in WalkDir::new(path) {
            let entry = entry.map_err(|source| CliError::Walk {
                path: path.clone(),
                source,
            })?;
            if entry.file_type().is_file() && is_document_path(entry.path()) {
                found.push(entry.into_path());
            }
        }
        if found.is_empty() {
            return Err(CliError::NoDocuments(path.clone()));
        }
        found.sort();
        out.extend(found);
    }
    Ok(out)
}

/// Reports diagnostics and whether compilation got through.
fn finish(unit: &CompilationUnit, result: Result<(), CompileFailure>) -> Result<bool, CliError> {
    diagnostics::print_reports(&unit.diagnostics());
    match result {
        Ok(()) => Ok(true),
        Err(CompileFailure::Internal(e)) => Err(e.into()),
        Err(failure) => {
            print_diagnostic(failure);
            Ok(false)
        }
    }
}

fn single_module(options: &CommonOptions, file: &Path) -> Result<(CompilationUnit, ModuleId), CliError> {
    let mut unit = unit(options)?;
    let module = unit.add_file(file)?;
    Ok((unit, module))
}

// ============================================================================
// COMMAND HANDLERS
// ============================================================================

fn handle_compile(options: &CommonOptions, paths: &[PathBuf]) -> Result<bool, CliError> {
    let files = collect_documents(paths)?;
    let mut unit = unit(options)?;
    for file in &files {
        unit.add_file(file)?;
    }
    let result = unit.compile();
    let diagnostics = unit.diagnostics();
    let errors = diagnostics.iter().filter(|d| !d.is_warning()).count();
    let warnings = diagnostics.len() - errors;
    let ok = finish(&unit, result)?;
    output::print_summary(files.len(), errors, warnings);
    Ok(ok)
}

fn handle_expand(options: &CommonOptions, file: &Path) -> Result<bool, CliError> {
    let (mut unit, module) = single_module(options, file)?;
    let result = unit.compile();
    let ok = finish(&unit, result)?;
    if ok {
        println!("{}", print_module(unit.ast(), module).trim_end());
    }
    Ok(ok)
}

fn handle_trace(options: &CommonOptions, file: &Path) -> Result<bool, CliError> {
    let (mut unit, module) = single_module(options, file)?;
    let target = unit.config().target_phase;
    let mut snapshots = Vec::new();
    let mut result = Ok(());
    for phase in CompilePhase::ALL.into_iter().take_while(|p| *p <= target) {
        result = unit.compile_to(phase);
        snapshots.push(PhaseSnapshot {
            phase,
            source: print_module(unit.ast(), module),
        });
        if result.is_err() {
            break;
        }
    }
    output::print_trace(&snapshots);
    finish(&unit, result)
}

fn handle_ast(options: &CommonOptions, file: &Path, format: DocumentFormat) -> Result<bool, CliError> {
    let (mut unit, module) = single_module(options, file)?;
    let result = unit.compile();
    let ok = finish(&unit, result)?;
    if ok {
        let doc = unit.ast().to_document(module);
        let text = match format {
            DocumentFormat::Json => doc.to_json().map_err(|e| CliError::Serialize(e.to_string()))?,
            DocumentFormat::Yaml => doc.to_yaml().map_err(|e| CliError::Serialize(e.to_string()))?,
        };
        println!("{}", text.trim_end());
    }
    Ok(ok)
}

fn handle_list_transforms(options: &CommonOptions) -> Result<bool, CliError> {
    let unit = unit(options)?;
    let rows: Vec<(String, Option<CompilePhase>)> = unit
        .loader()
        .annotation_types()
        .into_iter()
        .map(|(ty, phase)| (ty.name.clone(), phase))
        .collect();
    output::print_transforms(&rows);
    Ok(true)
}
