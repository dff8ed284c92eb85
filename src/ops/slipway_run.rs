//! Implementation of `slipway run`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::core::job::{JobDescriptor, JobOutcome, JobReport};
use crate::core::matrix::expand;
use crate::core::pipeline::{Pipeline, TriggerEvent};
use crate::runner::context::RunContext;
use crate::runner::executor::{Halt, JobExecutor};
use crate::runner::gate::{self, Admission, ConcurrencyGate};
use crate::runner::{reporter, verifier};
use crate::util::fs::relative_path;
use crate::util::shell::{format_duration, Shell, Status};

/// Options for the run command.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Trigger event (default: push)
    pub event: Option<TriggerEvent>,

    /// Ref the run is for (default: detected from the enclosing git repo)
    pub ref_name: Option<String>,

    /// Job-level parallelism override
    pub jobs: Option<usize>,

    /// Retention root override
    pub retain_dir: Option<PathBuf>,
}

/// Outcome of a whole run.
#[derive(Debug)]
pub struct RunSummary {
    /// Whether the trigger gate admitted the run
    pub admission: Admission,

    /// Per-job reports, in job order (empty when rejected)
    pub reports: Vec<JobReport>,
}

impl RunSummary {
    /// Run status is the logical OR of all job statuses.
    pub fn failed(&self) -> bool {
        self.reports.iter().any(|r| r.outcome.is_failure())
    }

    /// Count of jobs that passed.
    pub fn passed_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| !r.outcome.is_failure())
            .count()
    }

    /// Count of jobs in a failed or canceled terminal state.
    pub fn failed_count(&self) -> usize {
        self.reports.len() - self.passed_count()
    }
}

/// Execute the pipeline once through the trigger gate.
///
/// The gate is shared by callers so a newer run for the same concurrency
/// group cancels this one's in-flight jobs.
pub fn run(
    pipeline: &Pipeline,
    gate: &ConcurrencyGate,
    shell: &Arc<Shell>,
    opts: &RunOptions,
) -> Result<RunSummary> {
    pipeline.validate()?;

    let detected = gate::detect_repository(&pipeline.manifest_dir);
    let event = opts.event.unwrap_or(TriggerEvent::Push);
    let ref_name = opts
        .ref_name
        .clone()
        .or_else(|| detected.as_ref().map(|r| r.ref_name.clone()))
        .with_context(|| {
            format!(
                "cannot determine ref: `{}` is not inside a git repository\n\
                 help: pass --ref <name>",
                pipeline.manifest_dir.display()
            )
        })?;
    let origin = detected.as_ref().and_then(|r| r.origin.clone());

    let admission = gate::evaluate(
        &pipeline.trigger,
        pipeline.workflow(),
        event,
        &ref_name,
        origin.as_deref(),
    )?;

    let group = match &admission {
        Admission::Rejected(reason) => {
            shell.status(Status::Skipped, format!("run not admitted: {}", reason));
            return Ok(RunSummary {
                admission,
                reports: Vec::new(),
            });
        }
        Admission::Admitted { group } => group.clone(),
    };

    let token = gate.admit(&group);

    let jobs = expand(&pipeline.axes, &pipeline.exclusions)?;
    shell.status(
        Status::Expanding,
        format!(
            "{} job(s) across {} axis(es) for group `{}`",
            jobs.len(),
            pipeline.axes.len(),
            group
        ),
    );

    let ctx = RunContext::new(pipeline.clone(), token.clone(), opts.retain_dir.clone())?;

    let width = ctx.job_parallelism(opts.jobs);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(width)
        .build()
        .context("failed to build worker pool")?;

    let progress = shell.progress(jobs.len() as u64, "running jobs");
    let reports: Vec<JobReport> = pool.install(|| {
        jobs.par_iter()
            .map(|job| {
                let report = run_job(&ctx, job);
                progress.inc();
                report
            })
            .collect()
    });
    progress.finish();

    gate.release(&group, &token);

    summarize(shell, &reports);

    Ok(RunSummary { admission, reports })
}

/// Execute a single job: steps, verification, retention.
///
/// Never fails the run; every problem lands in the job's terminal state.
fn run_job(ctx: &RunContext, job: &JobDescriptor) -> JobReport {
    let started = Instant::now();

    if ctx.cancel.is_canceled() {
        return JobReport {
            key: job.key.clone(),
            outcome: JobOutcome::Canceled,
            duration: started.elapsed(),
            steps: Vec::new(),
            checks: Vec::new(),
            retained: None,
        };
    }

    tracing::info!("job `{}` started", job.key);

    let workspace = ctx.job_workspace(job);
    let mut checks = Vec::new();

    let (outcome, steps) = match JobExecutor::new(ctx).execute(job) {
        Err(e) => (
            JobOutcome::BuildFailed {
                step: "setup".to_string(),
                code: None,
                reason: format!("{:#}", e),
            },
            Vec::new(),
        ),
        Ok(exec) => {
            let outcome = match exec.halt {
                Some(Halt::BuildFailed { step, code, reason }) => {
                    JobOutcome::BuildFailed { step, code, reason }
                }
                Some(Halt::TimedOut { step }) => JobOutcome::TimedOut { step },
                Some(Halt::Canceled) => JobOutcome::Canceled,
                None => {
                    match verifier::verify(&workspace, &ctx.pipeline.expectations, &exec.steps) {
                        Ok(results) => {
                            checks = results;
                            let failures: Vec<String> = checks
                                .iter()
                                .filter(|c| !c.passed)
                                .map(|c| c.message.clone())
                                .collect();
                            if failures.is_empty() {
                                JobOutcome::Passed
                            } else {
                                JobOutcome::VerifyFailed { failures }
                            }
                        }
                        Err(e) => JobOutcome::VerifyFailed {
                            failures: vec![format!("verification could not run: {:#}", e)],
                        },
                    }
                }
            };
            (outcome, exec.steps)
        }
    };

    let retained = if outcome.is_failure() && !outcome.is_canceled() {
        match reporter::retain(job, &workspace, &ctx.pipeline.report.retain, &ctx.retain_root) {
            Ok(artifacts) => {
                tracing::info!("retained {} file(s) for `{}`", artifacts.files, job.key);
                Some(artifacts.dir)
            }
            Err(e) => {
                tracing::warn!("failed to retain artifacts for `{}`: {:#}", job.key, e);
                None
            }
        }
    } else {
        None
    };

    JobReport {
        key: job.key.clone(),
        outcome,
        duration: started.elapsed(),
        steps,
        checks,
        retained,
    }
}

fn summarize(shell: &Arc<Shell>, reports: &[JobReport]) {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    for report in reports {
        let status = match report.outcome {
            JobOutcome::Passed => Status::Passed,
            JobOutcome::BuildFailed { .. } | JobOutcome::VerifyFailed { .. } => Status::Failed,
            JobOutcome::TimedOut { .. } => Status::TimedOut,
            JobOutcome::Canceled => Status::Canceled,
        };

        let mut line = format!("{} ({})", report.key, format_duration(report.duration));
        if report.outcome.is_failure() && !report.outcome.is_canceled() {
            line.push_str(&format!(": {}", report.outcome.describe()));
        }
        shell.status(status, line);

        if let Some(dir) = &report.retained {
            shell.status(
                Status::Retained,
                relative_path(&cwd, dir).display().to_string(),
            );
        }

        shell.json_event(&serde_json::json!({
            "reason": "job-finished",
            "report": report,
        }));
    }

    let failed = reports.iter().filter(|r| r.outcome.is_failure()).count();
    if failed == 0 {
        shell.status(
            Status::Finished,
            format!("{} job(s) passed", reports.len()),
        );
    } else {
        shell.error(format!("{} of {} job(s) failed", failed, reports.len()));
    }

    shell.json_event(&serde_json::json!({
        "reason": "run-finished",
        "total": reports.len(),
        "failed": failed,
    }));
}
