//! Implementation of `slipway plan`.
//!
//! Expands the matrix without executing anything, so the job set can be
//! inspected or fed to tooling.

use anyhow::Result;

use crate::core::job::JobDescriptor;
use crate::core::matrix::expand;
use crate::core::pipeline::Pipeline;

/// Output format for the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable table (default)
    #[default]
    Human,
    /// Machine-readable JSON
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = OutputFormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            _ => Err(OutputFormatParseError(s.to_string())),
        }
    }
}

/// Error parsing output format option.
#[derive(Debug, Clone)]
pub struct OutputFormatParseError(pub String);

impl std::fmt::Display for OutputFormatParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid output format '{}', valid values: human, json",
            self.0
        )
    }
}

impl std::error::Error for OutputFormatParseError {}

/// Validate the pipeline and expand its job set.
pub fn plan(pipeline: &Pipeline) -> Result<Vec<JobDescriptor>> {
    pipeline.validate()?;
    let jobs = expand(&pipeline.axes, &pipeline.exclusions)?;
    Ok(jobs)
}

/// Render the expanded job set.
pub fn format_plan(jobs: &[JobDescriptor], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Human => {
            let width = jobs.iter().map(|j| j.key.len()).max().unwrap_or(0);
            let mut out = String::new();
            for job in jobs {
                let flags = if job.flags.is_empty() {
                    "(no flags)".to_string()
                } else {
                    job.flags.join(" ")
                };
                out.push_str(&format!("{:<width$}  {}\n", job.key, flags, width = width));
            }
            out.push_str(&format!("{} job(s)\n", jobs.len()));
            Ok(out)
        }
        OutputFormat::Json => {
            let value = serde_json::json!({ "jobs": jobs });
            Ok(serde_json::to_string_pretty(&value)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn pipeline() -> Pipeline {
        Pipeline::from_str(
            r#"
            [pipeline]
            name = "plan"

            [[axis]]
            name = "platform"
            [[axis.value]]
            name = "linux"
            flags = ["--linux"]
            [[axis.value]]
            name = "windows"

            [[axis]]
            name = "linkage"
            [[axis.value]]
            name = "static"
            [[axis.value]]
            name = "dll"

            [[exclude]]
            platform = "linux"
            linkage = "dll"

            [[step]]
            name = "build"
            program = "make"
            "#,
            Path::new("/proj"),
        )
        .unwrap()
    }

    #[test]
    fn test_plan_expands_and_excludes() {
        let jobs = plan(&pipeline()).unwrap();
        let keys: Vec<_> = jobs.iter().map(|j| j.key.as_str()).collect();
        assert_eq!(keys, ["linux-static", "windows-static", "windows-dll"]);
    }

    #[test]
    fn test_format_human_lists_keys_and_flags() {
        let jobs = plan(&pipeline()).unwrap();
        let out = format_plan(&jobs, OutputFormat::Human).unwrap();
        assert!(out.contains("linux-static"));
        assert!(out.contains("--linux"));
        assert!(out.contains("3 job(s)"));
    }

    #[test]
    fn test_format_json_is_parseable() {
        let jobs = plan(&pipeline()).unwrap();
        let out = format_plan(&jobs, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["jobs"].as_array().unwrap().len(), 3);
        assert_eq!(value["jobs"][0]["key"], "linux-static");
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("human".parse::<OutputFormat>().unwrap(), OutputFormat::Human);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
