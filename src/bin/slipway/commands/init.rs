//! `slipway init` command

use anyhow::Result;

use crate::cli::InitArgs;
use slipway::ops::init_pipeline;
use slipway::util::shell::{Shell, Status};

pub fn execute(args: InitArgs) -> Result<()> {
    let dir = match args.path {
        Some(path) => {
            std::fs::create_dir_all(&path)?;
            path
        }
        None => std::env::current_dir()?,
    };

    let name = match args.name {
        Some(name) => name,
        None => dir
            .canonicalize()?
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "pipeline".to_string()),
    };

    let path = init_pipeline(&dir, &name)?;

    let shell = Shell::default();
    shell.status(Status::Created, format!("pipeline `{}` ({})", name, path.display()));

    Ok(())
}
