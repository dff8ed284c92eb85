//! Per-job step execution.
//!
//! Runs the pipeline's step sequence inside the job workspace, fail-fast,
//! under the job's wall-clock ceiling. Build steps that exit non-zero halt
//! the job; test phases record their status for the verifier instead.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;

use crate::core::job::{JobDescriptor, StepReport};
use crate::core::pipeline::StepConfig;
use crate::runner::context::RunContext;
use crate::util::fs;
use crate::util::process::{resolve_program, ProcessBuilder, WaitOutcome};

/// Why execution stopped before the end of the step sequence.
#[derive(Debug, Clone)]
pub enum Halt {
    /// A build step exited non-zero or could not be started.
    BuildFailed {
        step: String,
        code: Option<i32>,
        reason: String,
    },
    /// The job's wall-clock ceiling passed during a step.
    TimedOut { step: String },
    /// The run was canceled.
    Canceled,
}

/// Record of one job's step execution.
#[derive(Debug)]
pub struct ExecutionReport {
    /// Steps that ran, in order
    pub steps: Vec<StepReport>,

    /// Why execution halted early, if it did
    pub halt: Option<Halt>,
}

/// Executes one job's step sequence.
pub struct JobExecutor<'a> {
    ctx: &'a RunContext,
}

impl<'a> JobExecutor<'a> {
    /// Create an executor for this run.
    pub fn new(ctx: &'a RunContext) -> Self {
        JobExecutor { ctx }
    }

    /// Run the full step sequence for `job` in a fresh workspace.
    ///
    /// Only workspace setup errors surface as `Err`; anything that happens
    /// to a step is captured in the report.
    pub fn execute(&self, job: &JobDescriptor) -> Result<ExecutionReport> {
        let workspace = self.ctx.job_workspace(job);
        fs::remove_dir_all_if_exists(&workspace)?;
        let logs_dir = workspace.join("logs");
        fs::ensure_dir(&logs_dir)?;

        let deadline = Instant::now() + self.ctx.job_timeout;
        let mut steps = Vec::new();

        for (idx, step) in self.ctx.pipeline.steps.iter().enumerate() {
            if self.ctx.cancel.is_canceled() {
                return Ok(ExecutionReport {
                    steps,
                    halt: Some(Halt::Canceled),
                });
            }

            let log = logs_dir.join(format!("{:02}-{}.log", idx + 1, step.name));
            let started = Instant::now();

            let outcome = match self.run_step(job, step, &workspace, &log, deadline) {
                Ok(outcome) => outcome,
                Err(e) => {
                    return Ok(ExecutionReport {
                        steps,
                        halt: Some(Halt::BuildFailed {
                            step: step.name.clone(),
                            code: None,
                            reason: format!("{:#}", e),
                        }),
                    });
                }
            };

            match outcome {
                WaitOutcome::Exited(status) => {
                    let code = status.code();
                    steps.push(StepReport {
                        name: step.name.clone(),
                        code,
                        duration: started.elapsed(),
                        log: log.clone(),
                        test: step.test,
                    });

                    if !status.success() && !step.test {
                        let reason = match code {
                            Some(code) => format!("exit code {}", code),
                            None => "terminated by signal".to_string(),
                        };
                        return Ok(ExecutionReport {
                            steps,
                            halt: Some(Halt::BuildFailed {
                                step: step.name.clone(),
                                code,
                                reason,
                            }),
                        });
                    }

                    tracing::debug!(
                        "step `{}` for `{}` finished in {:.2}s",
                        step.name,
                        job.key,
                        started.elapsed().as_secs_f64()
                    );
                }
                WaitOutcome::TimedOut => {
                    steps.push(StepReport {
                        name: step.name.clone(),
                        code: None,
                        duration: started.elapsed(),
                        log,
                        test: step.test,
                    });
                    return Ok(ExecutionReport {
                        steps,
                        halt: Some(Halt::TimedOut {
                            step: step.name.clone(),
                        }),
                    });
                }
                WaitOutcome::Canceled => {
                    steps.push(StepReport {
                        name: step.name.clone(),
                        code: None,
                        duration: started.elapsed(),
                        log,
                        test: step.test,
                    });
                    return Ok(ExecutionReport {
                        steps,
                        halt: Some(Halt::Canceled),
                    });
                }
            }
        }

        Ok(ExecutionReport { steps, halt: None })
    }

    fn run_step(
        &self,
        job: &JobDescriptor,
        step: &StepConfig,
        workspace: &Path,
        log: &Path,
        deadline: Instant,
    ) -> Result<WaitOutcome> {
        let program = resolve_program(&step.program, &self.ctx.source_dir)?;

        let mut args: Vec<String> = step
            .args
            .iter()
            .map(|arg| self.substitute(arg, workspace))
            .collect();
        if step.use_flags {
            args.extend(job.flags.iter().cloned());
        }

        let mut builder = ProcessBuilder::new(&program)
            .args(&args)
            .cwd(workspace)
            .envs(step.env.iter())
            .env("SLIPWAY_JOB", &job.key)
            .env("SLIPWAY_SOURCE_DIR", self.ctx.source_dir.to_string_lossy())
            .env("SLIPWAY_WORKSPACE", workspace.to_string_lossy());

        for sel in &job.selections {
            let var = format!(
                "SLIPWAY_AXIS_{}",
                sel.axis.to_uppercase().replace('-', "_")
            );
            builder = builder.env(var, &sel.value);
        }

        tracing::debug!(
            "running step `{}` for `{}`: {}",
            step.name,
            job.key,
            builder.display_command()
        );

        builder.exec_logged(log, deadline, &self.ctx.cancel)
    }

    fn substitute(&self, arg: &str, workspace: &Path) -> String {
        arg.replace("{jobs}", &self.ctx.build_parallelism.to_string())
            .replace("{source}", &self.ctx.source_dir.to_string_lossy())
            .replace("{workspace}", &workspace.to_string_lossy())
    }
}
