//! `slipway plan` command

use anyhow::Result;

use crate::cli::PlanArgs;
use slipway::ops::{format_plan, plan, OutputFormat};

pub fn execute(args: PlanArgs) -> Result<()> {
    let pipeline = super::load_pipeline(args.manifest)?;

    let format = args
        .format
        .parse::<OutputFormat>()
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let jobs = plan(&pipeline)?;
    print!("{}", format_plan(&jobs, format)?);

    Ok(())
}
