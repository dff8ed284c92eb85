//! Slipway.toml pipeline manifest parsing and schema.
//!
//! The manifest is the single configuration surface: trigger rules, matrix
//! axes and exclusions, the step sequence, verification expectations, and
//! run limits.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::expectation::Expectation;
use crate::core::matrix::{Axis, Exclusion};

/// Manifest file name.
pub const MANIFEST_NAME: &str = "Slipway.toml";

/// Trigger event kind admitted by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerEvent {
    Push,
    PullRequest,
}

impl std::str::FromStr for TriggerEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "push" => Ok(TriggerEvent::Push),
            "pull-request" | "pull_request" | "pr" => Ok(TriggerEvent::PullRequest),
            _ => Err(format!(
                "invalid event '{}'; expected 'push' or 'pull-request'",
                s
            )),
        }
    }
}

impl std::fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerEvent::Push => write!(f, "push"),
            TriggerEvent::PullRequest => write!(f, "pull-request"),
        }
    }
}

/// The parsed Slipway.toml manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct Pipeline {
    /// Pipeline metadata from [pipeline]
    pub pipeline: PipelineMetadata,

    /// Trigger configuration
    #[serde(default)]
    pub trigger: TriggerConfig,

    /// Run limits
    #[serde(default)]
    pub limits: Limits,

    /// Matrix axes in declaration order
    #[serde(default, rename = "axis")]
    pub axes: Vec<Axis>,

    /// Combinations removed before job creation
    #[serde(default, rename = "exclude")]
    pub exclusions: Vec<Exclusion>,

    /// Step sequence executed per job
    #[serde(default, rename = "step")]
    pub steps: Vec<StepConfig>,

    /// Post-build expectations
    #[serde(default, rename = "expect")]
    pub expectations: Vec<Expectation>,

    /// Failure retention configuration
    #[serde(default)]
    pub report: ReportConfig,

    /// The directory containing this manifest
    #[serde(skip)]
    pub manifest_dir: PathBuf,
}

/// Pipeline metadata from [pipeline].
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineMetadata {
    /// Workflow name, also the default `{workflow}` concurrency component
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,
}

/// Trigger configuration from [trigger].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Event kinds admitted by the gate
    pub events: Vec<TriggerEvent>,

    /// Branch/ref glob patterns admitted by the gate
    pub branches: Vec<String>,

    /// Owning repository URL; runs from other origins are rejected
    pub repository: Option<String>,

    /// Concurrency group template; `{workflow}` and `{ref}` are expanded
    pub concurrency: String,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        TriggerConfig {
            events: vec![TriggerEvent::Push, TriggerEvent::PullRequest],
            branches: vec!["*".to_string()],
            repository: None,
            concurrency: "{workflow}-{ref}".to_string(),
        }
    }
}

/// Run limits from [limits].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Wall-clock ceiling per job, in seconds
    pub job_timeout_secs: u64,

    /// Parallel jobs (default: available parallelism)
    pub jobs: Option<usize>,

    /// Build-tool parallelism substituted for `{jobs}` in step args
    pub build_parallelism: Option<usize>,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            job_timeout_secs: 3600,
            jobs: None,
            build_parallelism: None,
        }
    }
}

impl Limits {
    /// The per-job wall-clock ceiling.
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

/// One step of the per-job build sequence.
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    /// Step name, used in logs and diagnostics
    pub name: String,

    /// Program to execute; bare names are resolved in PATH, paths with a
    /// separator are taken relative to the source directory
    pub program: String,

    /// Arguments. `{jobs}`, `{source}`, and `{workspace}` are substituted;
    /// everything else is passed through opaquely.
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment for this step
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Append the job's composed axis flags to this step's arguments
    #[serde(default)]
    pub use_flags: bool,

    /// Mark this step as a test phase: its exit status is recorded and
    /// asserted by the verifier instead of failing the build outright
    #[serde(default)]
    pub test: bool,
}

/// Failure retention configuration from [report].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Workspace-relative paths retained on failure, in addition to step
    /// logs
    pub retain: Vec<String>,

    /// Retention root override, relative to the project directory
    pub dir: Option<PathBuf>,
}

/// Configuration errors detected while validating a manifest.
#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error("pipeline has no steps")]
    #[diagnostic(
        code(slipway::pipeline::no_steps),
        help("declare at least one [[step]] table")
    )]
    NoSteps,

    #[error("step `{name}` is declared more than once")]
    #[diagnostic(code(slipway::pipeline::duplicate_step))]
    DuplicateStep { name: String },

    #[error("forbidden token `{token}` is not a valid regex: {message}")]
    #[diagnostic(code(slipway::pipeline::invalid_token))]
    InvalidToken { token: String, message: String },

    #[error("branch pattern `{pattern}` is not a valid glob: {message}")]
    #[diagnostic(code(slipway::pipeline::invalid_branch_pattern))]
    InvalidBranchPattern { pattern: String, message: String },

    #[error("a tests-pass expectation is declared but no step is marked `test = true`")]
    #[diagnostic(
        code(slipway::pipeline::no_test_step),
        help("mark the test phase with `test = true` or drop the expectation")
    )]
    TestsPassWithoutTestStep,
}

impl Pipeline {
    /// Load and normalize a manifest from a file.
    pub fn load(path: &Path) -> Result<Pipeline> {
        let contents = crate::util::fs::read_to_string(path)?;
        let mut pipeline: Pipeline = toml::from_str(&contents)
            .with_context(|| format!("failed to parse manifest: {}", path.display()))?;

        pipeline.manifest_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        pipeline.normalize();
        Ok(pipeline)
    }

    /// Parse a manifest from a string, rooted at `manifest_dir`.
    pub fn from_str(contents: &str, manifest_dir: &Path) -> Result<Pipeline> {
        let mut pipeline: Pipeline =
            toml::from_str(contents).context("failed to parse manifest")?;
        pipeline.manifest_dir = manifest_dir.to_path_buf();
        pipeline.normalize();
        Ok(pipeline)
    }

    /// Locate `Slipway.toml` in `dir` or any ancestor.
    pub fn find_manifest(dir: &Path) -> Result<PathBuf> {
        let mut current = Some(dir);
        while let Some(dir) = current {
            let candidate = dir.join(MANIFEST_NAME);
            if candidate.is_file() {
                return Ok(candidate);
            }
            current = dir.parent();
        }
        anyhow::bail!(
            "could not find `{}` in `{}` or any parent directory\n\
             help: run `slipway init` to create one",
            MANIFEST_NAME,
            dir.display()
        );
    }

    /// A test phase implies the exit-status expectation.
    fn normalize(&mut self) {
        let has_test_step = self.steps.iter().any(|s| s.test);
        let has_tests_pass = self
            .expectations
            .iter()
            .any(|e| matches!(e, Expectation::TestsPass));
        if has_test_step && !has_tests_pass {
            self.expectations.push(Expectation::TestsPass);
        }
    }

    /// Validate everything that can be checked without running a job.
    ///
    /// Matrix-level errors (empty axes, unknown exclusion keys) surface
    /// from [`crate::core::matrix::expand`]; this covers the rest.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.steps.is_empty() {
            return Err(PipelineError::NoSteps);
        }

        let mut seen = std::collections::HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.name.as_str()) {
                return Err(PipelineError::DuplicateStep {
                    name: step.name.clone(),
                });
            }
        }

        for expectation in &self.expectations {
            if let Expectation::Absent { token, .. } = expectation {
                if let Err(e) = regex::Regex::new(token) {
                    return Err(PipelineError::InvalidToken {
                        token: token.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        for pattern in &self.trigger.branches {
            if let Err(e) = glob::Pattern::new(pattern) {
                return Err(PipelineError::InvalidBranchPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                });
            }
        }

        let has_test_step = self.steps.iter().any(|s| s.test);
        let wants_tests_pass = self
            .expectations
            .iter()
            .any(|e| matches!(e, Expectation::TestsPass));
        if wants_tests_pass && !has_test_step {
            return Err(PipelineError::TestsPassWithoutTestStep);
        }

        Ok(())
    }

    /// Workflow name used for the `{workflow}` concurrency component.
    pub fn workflow(&self) -> &str {
        &self.pipeline.name
    }
}
