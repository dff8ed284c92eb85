//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Slipway - a matrix-driven build and test orchestrator
#[derive(Parser)]
#[command(name = "slipway")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a starter Slipway.toml in the current directory
    Init(InitArgs),

    /// Expand the matrix and print the job set without executing it
    Plan(PlanArgs),

    /// Check the manifest for configuration errors
    Validate(ValidateArgs),

    /// Run the pipeline: expand, execute, verify, retain
    Run(RunArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Pipeline name (defaults to the directory name)
    #[arg(long)]
    pub name: Option<String>,

    /// Directory to initialize (defaults to the current directory)
    pub path: Option<PathBuf>,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Path to the manifest (defaults to Slipway.toml found upward)
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Output format: human or json
    #[arg(long, default_value = "human")]
    pub format: String,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Path to the manifest (defaults to Slipway.toml found upward)
    #[arg(long)]
    pub manifest: Option<PathBuf>,
}

#[derive(Args)]
pub struct RunArgs {
    /// Path to the manifest (defaults to Slipway.toml found upward)
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Trigger event: push or pull-request
    #[arg(long)]
    pub event: Option<String>,

    /// Ref the run is for (defaults to the current git branch)
    #[arg(long = "ref")]
    pub ref_name: Option<String>,

    /// Number of jobs to execute in parallel
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Directory for retained failure artifacts
    #[arg(long)]
    pub retain_dir: Option<PathBuf>,

    /// Suppress status output
    #[arg(short, long)]
    pub quiet: bool,

    /// Emit machine-readable JSON events instead of status lines
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
