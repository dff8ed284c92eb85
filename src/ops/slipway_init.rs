//! Implementation of `slipway init`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::core::pipeline::MANIFEST_NAME;
use crate::util::fs::write_string;

/// Scaffold a starter manifest in `dir`.
///
/// Fails if the directory already has one.
pub fn init_pipeline(dir: &Path, name: &str) -> Result<PathBuf> {
    let manifest_path = dir.join(MANIFEST_NAME);
    if manifest_path.exists() {
        bail!(
            "`{}` already exists in {}",
            MANIFEST_NAME,
            dir.display()
        );
    }

    write_string(&manifest_path, &manifest_template(name))?;
    Ok(manifest_path)
}

fn manifest_template(name: &str) -> String {
    format!(
        r#"[pipeline]
name = "{name}"

[trigger]
events = ["push", "pull-request"]
branches = ["*"]
# Reject runs from forks by naming the owning repository:
# repository = "https://github.com/you/{name}"

[limits]
job_timeout_secs = 3600

# One job per combination of axis values; each value's flags are appended
# to the steps that opt in with `use_flags = true`.
[[axis]]
name = "profile"

[[axis.value]]
name = "debug"
flags = ["--enable-debug"]

[[axis.value]]
name = "release"

# Remove specific combinations before jobs are created:
# [[exclude]]
# profile = "debug"

[[step]]
name = "build"
program = "make"
args = ["-j{{jobs}}"]

# [[step]]
# name = "test"
# program = "make"
# args = ["check"]
# test = true

# [[expect]]
# kind = "artifact-count"
# pattern = "dist/*"
# count = 2

[report]
retain = []
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::Pipeline;

    #[test]
    fn test_init_writes_valid_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let path = init_pipeline(tmp.path(), "myproj").unwrap();

        let pipeline = Pipeline::load(&path).unwrap();
        assert_eq!(pipeline.workflow(), "myproj");
        pipeline.validate().unwrap();

        // The template build step carries the parallelism placeholder.
        assert_eq!(pipeline.steps[0].args, ["-j{jobs}"]);
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        init_pipeline(tmp.path(), "once").unwrap();

        let err = init_pipeline(tmp.path(), "twice").unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
