//! Command-line arguments and subcommands for `canopyc`.

use crate::compiler::CompilePhase;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "canopyc",
    version,
    about = "Runs annotation-driven AST transformations over module documents."
)]
pub struct CanopyArgs {
    #[command(flatten)]
    pub options: CommonOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options accepted by every subcommand.
#[derive(Debug, Args)]
pub struct CommonOptions {
    /// YAML compiler configuration.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Extra classpath roots scanned for global transformation services.
    #[arg(long, global = true, value_name = "DIR", value_delimiter = ',')]
    pub classpath: Vec<PathBuf>,

    /// Last phase to run, by name (`canonicalization`) or number (`5`).
    #[arg(long, global = true)]
    pub phase: Option<CompilePhase>,

    /// Log engine activity at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile module documents and report diagnostics.
    Compile {
        /// Documents, or directories searched for `.json`/`.yaml`/`.yml` files.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Print the transformed module as source.
    Expand {
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Show how the module changes in each phase.
    Trace {
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Print the transformed module document.
    Ast {
        #[arg(required = true)]
        file: PathBuf,

        #[arg(long, value_enum, default_value_t = DocumentFormat::Json)]
        format: DocumentFormat,
    },
    /// List registered annotation types and the phase they run in.
    ListTransforms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DocumentFormat {
    Json,
    Yaml,
}
