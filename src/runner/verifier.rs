//! Post-build output verification.
//!
//! Evaluates the pipeline's declared expectations against a job's
//! workspace after a successful build. Every failing check produces a
//! diagnostic naming the expected and actual values.

use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;

use crate::core::expectation::{CheckReport, Expectation};
use crate::core::job::StepReport;
use crate::util::fs::glob_files;

/// Evaluate every expectation against the job workspace.
///
/// Only I/O errors surface as `Err`; expectation mismatches are reported
/// as failing checks.
pub fn verify(
    workspace: &Path,
    expectations: &[Expectation],
    steps: &[StepReport],
) -> Result<Vec<CheckReport>> {
    let mut checks = Vec::with_capacity(expectations.len());

    for expectation in expectations {
        let check = match expectation {
            Expectation::ArtifactCount { pattern, count } => {
                check_artifact_count(workspace, pattern, *count)?
            }
            Expectation::Absent { file, token } => check_absent(workspace, file, token)?,
            Expectation::TestsPass => check_tests_pass(steps),
        };
        checks.push(check);
    }

    Ok(checks)
}

fn check_artifact_count(workspace: &Path, pattern: &str, expected: usize) -> Result<CheckReport> {
    let name = format!("artifact-count({})", pattern);
    let found = glob_files(workspace, pattern)?;

    if found.len() == expected {
        Ok(CheckReport::pass(
            name,
            format!("{} file(s) match `{}`", found.len(), pattern),
        ))
    } else {
        Ok(CheckReport::fail(
            name,
            format!(
                "expected {} file(s) matching `{}`, found {}",
                expected,
                pattern,
                found.len()
            ),
        ))
    }
}

fn check_absent(workspace: &Path, file: &str, token: &str) -> Result<CheckReport> {
    let name = format!("absent({} in {})", token, file);
    let path = workspace.join(file);

    if !path.is_file() {
        return Ok(CheckReport::fail(
            name,
            format!("generated file `{}` is missing", file),
        ));
    }

    // Token validity is checked at manifest load; a failure here means the
    // pipeline was built by hand.
    let re = Regex::new(token).with_context(|| format!("invalid forbidden token: {}", token))?;
    let contents = crate::util::fs::read_to_string(&path)?;

    match contents
        .lines()
        .enumerate()
        .find(|(_, line)| re.is_match(line))
    {
        Some((idx, _)) => Ok(CheckReport::fail(
            name,
            format!(
                "forbidden token `{}` present in `{}` (line {})",
                token,
                file,
                idx + 1
            ),
        )),
        None => Ok(CheckReport::pass(
            name,
            format!("token `{}` absent from `{}`", token, file),
        )),
    }
}

fn check_tests_pass(steps: &[StepReport]) -> CheckReport {
    let test_steps: Vec<&StepReport> = steps.iter().filter(|s| s.test).collect();

    if test_steps.is_empty() {
        return CheckReport::fail("tests-pass", "no test phase was executed");
    }

    for step in &test_steps {
        if step.code != Some(0) {
            let how = match step.code {
                Some(code) => format!("exited {}", code),
                None => "did not run to completion".to_string(),
            };
            return CheckReport::fail(
                "tests-pass",
                format!("test phase `{}` {}", step.name, how),
            );
        }
    }

    CheckReport::pass(
        "tests-pass",
        format!("{} test phase(s) exited zero", test_steps.len()),
    )
}
