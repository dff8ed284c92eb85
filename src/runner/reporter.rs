//! Failure artifact retention.
//!
//! On job failure, step logs and any configured build-output paths are
//! copied under the retention root keyed by the job's composite identifier,
//! and bundled into a compressed tarball. Retention is best-effort: errors
//! are logged by the caller and never block sibling jobs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use walkdir::WalkDir;

use crate::core::job::JobDescriptor;
use crate::util::fs;

/// What was retained for a failed job.
#[derive(Debug)]
pub struct RetainedArtifacts {
    /// Directory holding the retained tree
    pub dir: PathBuf,

    /// Compressed bundle of the same content
    pub bundle: PathBuf,

    /// Number of files retained
    pub files: usize,
}

/// Retain a failed job's logs and configured output paths.
pub fn retain(
    job: &JobDescriptor,
    workspace: &Path,
    retain_paths: &[String],
    retain_root: &Path,
) -> Result<RetainedArtifacts> {
    let dest = retain_root.join(&job.key);
    fs::remove_dir_all_if_exists(&dest)?;
    fs::ensure_dir(&dest)?;

    let logs = workspace.join("logs");
    if logs.is_dir() {
        fs::copy_dir_all(&logs, &dest.join("logs"))?;
    }

    for path in retain_paths {
        let src = workspace.join(path);
        if src.is_dir() {
            fs::copy_dir_all(&src, &dest.join(path))?;
        } else if src.is_file() {
            let target = dest.join(path);
            if let Some(parent) = target.parent() {
                fs::ensure_dir(parent)?;
            }
            std::fs::copy(&src, &target)
                .with_context(|| format!("failed to retain {}", src.display()))?;
        } else {
            tracing::debug!("retain path not produced, skipped: {}", src.display());
        }
    }

    let bundle = write_bundle(&dest, retain_root, &job.key)?;

    let files = WalkDir::new(&dest)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count();

    Ok(RetainedArtifacts { dir: dest, bundle, files })
}

/// Write `<key>.tar.gz` next to the retained directory.
///
/// The bundle is written to a temp file first and renamed into place, so a
/// crash never leaves a truncated archive behind.
fn write_bundle(dest: &Path, retain_root: &Path, key: &str) -> Result<PathBuf> {
    let bundle_path = retain_root.join(format!("{}.tar.gz", key));

    let tmp = tempfile::NamedTempFile::new_in(retain_root)
        .context("failed to create temporary bundle file")?;

    let encoder = GzEncoder::new(tmp.as_file(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder
        .append_dir_all(key, dest)
        .with_context(|| format!("failed to bundle {}", dest.display()))?;
    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .context("failed to finish bundle")?;

    tmp.persist(&bundle_path)
        .with_context(|| format!("failed to write bundle: {}", bundle_path.display()))?;

    Ok(bundle_path)
}
