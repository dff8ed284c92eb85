//! Slipway CLI - a matrix-driven build and test orchestrator

use anyhow::Result;
use clap::Parser;
use miette::Diagnostic;
use tracing_subscriber::EnvFilter;

use slipway::core::matrix::MatrixError;
use slipway::core::pipeline::PipelineError;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        if let Some(help) = diagnostic_help(&e) {
            eprintln!("help: {}", help);
        }
        std::process::exit(1);
    }
}

/// Configuration errors carry actionable help text; surface it.
fn diagnostic_help(e: &anyhow::Error) -> Option<Box<dyn std::fmt::Display + '_>> {
    e.downcast_ref::<MatrixError>()
        .and_then(Diagnostic::help)
        .or_else(|| e.downcast_ref::<PipelineError>().and_then(Diagnostic::help))
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; --verbose only raises the default.
    let default_filter = if cli.verbose {
        "slipway=debug"
    } else {
        "slipway=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        Commands::Init(args) => commands::init::execute(args),
        Commands::Plan(args) => commands::plan::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
        Commands::Run(args) => commands::run::execute(args, cli.verbose, cli.no_color),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
