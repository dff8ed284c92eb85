//! Implementation of `slipway validate`.

use anyhow::Result;

use crate::core::matrix::expand;
use crate::core::pipeline::Pipeline;

/// Result of validating a manifest.
#[derive(Debug)]
pub struct ValidationReport {
    /// How many jobs the matrix expands to
    pub jobs: usize,

    /// Non-fatal observations about the configuration
    pub warnings: Vec<String>,
}

/// Check everything that can be checked without running a job.
pub fn validate(pipeline: &Pipeline) -> Result<ValidationReport> {
    pipeline.validate()?;
    let jobs = expand(&pipeline.axes, &pipeline.exclusions)?;

    let mut warnings = Vec::new();
    if jobs.is_empty() {
        warnings
            .push("exclusions remove every combination; the matrix expands to zero jobs".into());
    }
    if pipeline.expectations.is_empty() {
        warnings.push("no expectations declared; only step exit codes are checked".into());
    }

    Ok(ValidationReport {
        jobs: jobs.len(),
        warnings,
    })
}
