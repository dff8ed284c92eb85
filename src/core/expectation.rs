//! Post-build verification expectations.

use serde::{Deserialize, Serialize};

/// A declarative assertion about a job's build output.
///
/// Expectations are declared once per pipeline and evaluated against every
/// job's workspace after a successful build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Expectation {
    /// Exactly `count` files matching `pattern` exist under the job
    /// workspace.
    ArtifactCount { pattern: String, count: usize },

    /// The forbidden token (a regex) must not appear in the named
    /// generated file.
    Absent { file: String, token: String },

    /// Every test phase in the step sequence exited zero.
    TestsPass,
}

impl Expectation {
    /// Display name used in check reports and diagnostics.
    pub fn name(&self) -> String {
        match self {
            Expectation::ArtifactCount { pattern, .. } => {
                format!("artifact-count({})", pattern)
            }
            Expectation::Absent { file, token } => format!("absent({} in {})", token, file),
            Expectation::TestsPass => "tests-pass".to_string(),
        }
    }
}

/// Result of evaluating one expectation.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    /// Expectation display name
    pub name: String,

    /// Whether the expectation held
    pub passed: bool,

    /// Diagnostic naming expected vs. actual on failure
    pub message: String,
}

impl CheckReport {
    /// Create a passing check.
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        CheckReport {
            name: name.into(),
            passed: true,
            message: message.into(),
        }
    }

    /// Create a failing check.
    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        CheckReport {
            name: name.into(),
            passed: false,
            message: message.into(),
        }
    }
}
