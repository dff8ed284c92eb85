//! Run context - directories, limits, and shared run state.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::core::job::JobDescriptor;
use crate::core::pipeline::Pipeline;
use crate::util::fs::ensure_dir;
use crate::util::process::CancelToken;

/// Shared state for one pipeline run.
///
/// Jobs never share mutable state; everything here is read-only during
/// execution apart from the cancellation flag.
pub struct RunContext {
    /// The loaded pipeline manifest
    pub pipeline: Pipeline,

    /// Project directory (the manifest's directory)
    pub source_dir: PathBuf,

    /// Root under which job workspaces are created
    pub work_dir: PathBuf,

    /// Root under which failure artifacts are retained
    pub retain_root: PathBuf,

    /// Cancellation flag for this run
    pub cancel: CancelToken,

    /// Wall-clock ceiling per job
    pub job_timeout: Duration,

    /// Build-tool parallelism substituted for `{jobs}` in step args
    pub build_parallelism: usize,
}

impl RunContext {
    /// Create a context for a run, creating the work and retention roots.
    pub fn new(
        pipeline: Pipeline,
        cancel: CancelToken,
        retain_override: Option<PathBuf>,
    ) -> Result<Self> {
        let source_dir = pipeline.manifest_dir.clone();
        let work_dir = source_dir.join(".slipway").join("work");

        let retain_root = retain_override
            .or_else(|| {
                pipeline.report.dir.as_ref().map(|dir| {
                    if dir.is_absolute() {
                        dir.clone()
                    } else {
                        source_dir.join(dir)
                    }
                })
            })
            .unwrap_or_else(|| source_dir.join(".slipway").join("retained"));

        ensure_dir(&work_dir)?;
        ensure_dir(&retain_root)?;

        let job_timeout = pipeline.limits.job_timeout();
        let build_parallelism = pipeline
            .limits
            .build_parallelism
            .unwrap_or_else(default_parallelism);

        Ok(RunContext {
            pipeline,
            source_dir,
            work_dir,
            retain_root,
            cancel,
            job_timeout,
            build_parallelism,
        })
    }

    /// Job-local workspace directory.
    ///
    /// The fingerprint suffix keeps two jobs distinct even when their
    /// sanitized keys collide.
    pub fn job_workspace(&self, job: &JobDescriptor) -> PathBuf {
        self.work_dir
            .join(format!("{}-{}", sanitize(&job.key), &job.fingerprint[..8]))
    }

    /// Worker-pool width for job-level parallelism.
    pub fn job_parallelism(&self, cli_override: Option<usize>) -> usize {
        cli_override
            .or(self.pipeline.limits.jobs)
            .unwrap_or_else(default_parallelism)
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Keep directory names portable: anything outside [A-Za-z0-9._-] becomes
/// a dash.
fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn pipeline(manifest_dir: &Path) -> Pipeline {
        Pipeline::from_str(
            r#"
            [pipeline]
            name = "ctx"

            [[step]]
            name = "build"
            program = "make"
            "#,
            manifest_dir,
        )
        .unwrap()
    }

    #[test]
    fn test_creates_work_and_retain_roots() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RunContext::new(pipeline(tmp.path()), CancelToken::new(), None).unwrap();

        assert!(ctx.work_dir.is_dir());
        assert!(ctx.retain_root.is_dir());
        assert_eq!(ctx.retain_root, tmp.path().join(".slipway/retained"));
    }

    #[test]
    fn test_retain_override_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let custom = tmp.path().join("kept");
        let ctx = RunContext::new(
            pipeline(tmp.path()),
            CancelToken::new(),
            Some(custom.clone()),
        )
        .unwrap();

        assert_eq!(ctx.retain_root, custom);
    }

    #[test]
    fn test_job_workspace_is_sanitized_and_unique() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RunContext::new(pipeline(tmp.path()), CancelToken::new(), None).unwrap();

        let job = JobDescriptor::new(vec![], vec!["--with-libz=/usr".to_string()]);
        let workspace = ctx.job_workspace(&job);
        let name = workspace.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("default-"));
        assert!(!name.contains('/'));
    }
}
