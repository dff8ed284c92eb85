//! Filesystem helpers used across the runner.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::glob;

/// Create a directory and any missing parents.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

/// Delete a directory tree; absent directories are fine.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Copy a directory tree into `dst`, creating it as needed.
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    ensure_dir(dst)?;

    let entries =
        fs::read_dir(src).with_context(|| format!("failed to read directory: {}", src.display()))?;
    for entry in entries {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());

        if entry.file_type()?.is_dir() {
            copy_dir_all(&from, &to)?;
        } else {
            fs::copy(&from, &to).with_context(|| {
                format!("failed to copy {} to {}", from.display(), to.display())
            })?;
        }
    }
    Ok(())
}

/// Read a file into a string, naming the file on failure.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// Write a string to a file, creating parent directories first.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents)
        .with_context(|| format!("failed to write file: {}", path.display()))
}

/// Files under `base` matching a glob pattern, sorted for deterministic
/// reporting. Directories never count as artifacts.
pub fn glob_files(base: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let rooted = base.join(pattern);
    let matches = glob(&rooted.to_string_lossy())
        .with_context(|| format!("invalid glob pattern: {}", pattern))?;

    let mut files = Vec::new();
    for entry in matches {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!("glob error: {}", e),
        }
    }

    files.sort();
    Ok(files)
}

/// Path from `base` to `path` for display; falls back to `path` itself.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_glob_files() {
        let tmp = TempDir::new().unwrap();
        let dist = tmp.path().join("dist");
        fs::create_dir_all(&dist).unwrap();
        fs::write(dist.join("pkg-1.rpm"), "a").unwrap();
        fs::write(dist.join("pkg-2.rpm"), "b").unwrap();
        fs::write(dist.join("notes.txt"), "c").unwrap();

        let files = glob_files(tmp.path(), "dist/*.rpm").unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_glob_files_invalid_pattern() {
        let tmp = TempDir::new().unwrap();
        assert!(glob_files(tmp.path(), "dist/[").is_err());
    }

    #[test]
    fn test_copy_dir_all() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");

        fs::create_dir_all(src.join("logs")).unwrap();
        fs::write(src.join("logs/build.log"), "output").unwrap();

        copy_dir_all(&src, &dst).unwrap();

        assert_eq!(
            fs::read_to_string(dst.join("logs/build.log")).unwrap(),
            "output"
        );
    }
}
