//! `slipway validate` command

use anyhow::Result;

use crate::cli::ValidateArgs;
use slipway::ops::validate;
use slipway::util::shell::{Shell, Status};

pub fn execute(args: ValidateArgs) -> Result<()> {
    let pipeline = super::load_pipeline(args.manifest)?;

    let report = validate(&pipeline)?;

    let shell = Shell::default();
    for warning in &report.warnings {
        shell.warn(warning);
    }
    shell.status(
        Status::Validated,
        format!(
            "pipeline `{}` expands to {} job(s)",
            pipeline.workflow(),
            report.jobs
        ),
    );

    Ok(())
}
