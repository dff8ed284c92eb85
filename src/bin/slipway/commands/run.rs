//! `slipway run` command

use std::sync::Arc;

use anyhow::{bail, Result};

use crate::cli::RunArgs;
use slipway::core::pipeline::TriggerEvent;
use slipway::ops::{run, RunOptions};
use slipway::runner::gate::ConcurrencyGate;
use slipway::util::shell::{ColorChoice, Shell};

pub fn execute(args: RunArgs, verbose: bool, no_color: bool) -> Result<()> {
    let pipeline = super::load_pipeline(args.manifest)?;

    let color = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let shell = Arc::new(Shell::from_flags(args.quiet, verbose, color, args.json));

    let event = args
        .event
        .as_deref()
        .map(str::parse::<TriggerEvent>)
        .transpose()
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let opts = RunOptions {
        event,
        ref_name: args.ref_name,
        jobs: args.jobs,
        retain_dir: args.retain_dir,
    };

    let gate = ConcurrencyGate::new();
    let summary = run(&pipeline, &gate, &shell, &opts)?;

    if summary.failed() {
        bail!(
            "{} of {} job(s) failed",
            summary.failed_count(),
            summary.reports.len()
        );
    }

    Ok(())
}
