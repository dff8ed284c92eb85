//! Command implementations

pub mod completions;
pub mod init;
pub mod plan;
pub mod run;
pub mod validate;

use std::path::PathBuf;

use anyhow::Result;

use slipway::core::pipeline::Pipeline;

/// Load the manifest from --manifest or by walking up from the cwd.
pub(crate) fn load_pipeline(manifest: Option<PathBuf>) -> Result<Pipeline> {
    let path = match manifest {
        Some(path) => path,
        None => Pipeline::find_manifest(&std::env::current_dir()?)?,
    };
    Pipeline::load(&path)
}
