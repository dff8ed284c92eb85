//! Job descriptors and terminal states.
//!
//! A job is one concrete build/test execution instance for a single point
//! in the configuration matrix. Descriptors are immutable: they are created
//! at expansion time and never change; execution state lives in the report.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::core::expectation::CheckReport;
use crate::util::hash::Fingerprint;

/// One chosen value on one axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AxisSelection {
    /// Axis name
    pub axis: String,
    /// Selected value name
    pub value: String,
}

/// An immutable descriptor for one point of the configuration matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDescriptor {
    /// Axis values in axis declaration order
    pub selections: Vec<AxisSelection>,

    /// Composed command-line flags, concatenated in axis order
    pub flags: Vec<String>,

    /// Composite identifier: value names joined with `-`
    pub key: String,

    /// Short fingerprint of the full configuration, used to name the
    /// job workspace
    pub fingerprint: String,
}

impl JobDescriptor {
    /// Create a descriptor from ordered selections and their composed flags.
    pub fn new(selections: Vec<AxisSelection>, flags: Vec<String>) -> Self {
        let key = if selections.is_empty() {
            "default".to_string()
        } else {
            selections
                .iter()
                .map(|s| s.value.as_str())
                .collect::<Vec<_>>()
                .join("-")
        };

        let mut fp = Fingerprint::new();
        for sel in &selections {
            fp.update_str(&sel.axis).update_str(&sel.value);
        }
        fp.update_strs(flags.iter().map(String::as_str));

        JobDescriptor {
            selections,
            flags,
            key,
            fingerprint: fp.finish_short(),
        }
    }

    /// Look up the selected value for an axis.
    pub fn value_of(&self, axis: &str) -> Option<&str> {
        self.selections
            .iter()
            .find(|s| s.axis == axis)
            .map(|s| s.value.as_str())
    }
}

/// Terminal state of an executed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum JobOutcome {
    /// Build succeeded and every expectation held.
    Passed,
    /// A build step exited non-zero or could not be started.
    BuildFailed {
        step: String,
        code: Option<i32>,
        reason: String,
    },
    /// The build succeeded but an expectation did not hold.
    VerifyFailed { failures: Vec<String> },
    /// The job exceeded its wall-clock ceiling.
    TimedOut { step: String },
    /// The run was superseded while this job was pending or in flight.
    Canceled,
}

impl JobOutcome {
    /// Whether this outcome counts against the run status.
    pub fn is_failure(&self) -> bool {
        !matches!(self, JobOutcome::Passed)
    }

    /// Whether the job was canceled rather than executed to completion.
    pub fn is_canceled(&self) -> bool {
        matches!(self, JobOutcome::Canceled)
    }

    /// Short description for the run summary.
    pub fn describe(&self) -> String {
        match self {
            JobOutcome::Passed => "passed".to_string(),
            JobOutcome::BuildFailed { step, code, reason } => match code {
                Some(code) => format!("step `{}` exited {}", step, code),
                None => format!("step `{}` failed: {}", step, reason),
            },
            JobOutcome::VerifyFailed { failures } => {
                format!("verification failed: {}", failures.join("; "))
            }
            JobOutcome::TimedOut { step } => format!("timed out in step `{}`", step),
            JobOutcome::Canceled => "canceled by a newer run".to_string(),
        }
    }
}

/// Result of one executed step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// Step name from the manifest
    pub name: String,

    /// Exit code, if the process ran to completion
    pub code: Option<i32>,

    /// How long the step took (milliseconds in JSON)
    #[serde(serialize_with = "serialize_duration_ms")]
    pub duration: Duration,

    /// Log file capturing the step's stdout and stderr
    pub log: PathBuf,

    /// Whether this was a test phase
    pub test: bool,
}

/// Complete record of one executed job.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    /// Composite identifier of the job
    pub key: String,

    /// Terminal state
    pub outcome: JobOutcome,

    /// Total job time (milliseconds in JSON)
    #[serde(serialize_with = "serialize_duration_ms")]
    pub duration: Duration,

    /// Per-step results, in execution order
    pub steps: Vec<StepReport>,

    /// Verification check results (empty if the build never finished)
    pub checks: Vec<CheckReport>,

    /// Where failure artifacts were retained, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retained: Option<PathBuf>,
}

pub(crate) fn serialize_duration_ms<S>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(values: &[(&str, &str)]) -> JobDescriptor {
        JobDescriptor::new(
            values
                .iter()
                .map(|(a, v)| AxisSelection {
                    axis: a.to_string(),
                    value: v.to_string(),
                })
                .collect(),
            vec![],
        )
    }

    #[test]
    fn test_key_joins_values() {
        let job = descriptor(&[("platform", "linux"), ("threading", "multi")]);
        assert_eq!(job.key, "linux-multi");
    }

    #[test]
    fn test_empty_selection_keyed_default() {
        let job = descriptor(&[]);
        assert_eq!(job.key, "default");
    }

    #[test]
    fn test_fingerprint_depends_on_flags() {
        let a = JobDescriptor::new(vec![], vec!["--enable-debug".to_string()]);
        let b = JobDescriptor::new(vec![], vec!["--disable-debug".to_string()]);
        assert_ne!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn test_value_of() {
        let job = descriptor(&[("platform", "linux")]);
        assert_eq!(job.value_of("platform"), Some("linux"));
        assert_eq!(job.value_of("linkage"), None);
    }

    #[test]
    fn test_outcome_describe_names_step_and_code() {
        let outcome = JobOutcome::BuildFailed {
            step: "configure".to_string(),
            code: Some(2),
            reason: "exit code 2".to_string(),
        };
        assert!(outcome.is_failure());
        assert_eq!(outcome.describe(), "step `configure` exited 2");
    }

    #[test]
    fn test_passed_is_not_failure() {
        assert!(!JobOutcome::Passed.is_failure());
        assert!(JobOutcome::Canceled.is_failure());
        assert!(JobOutcome::Canceled.is_canceled());
    }
}
