use anyhow::{Result, bail};
use clap::Args as ClapArgs;
use tracing::instrument;

use oxvfs_core::{FileSystem, VfsError};

use super::normalize_path;

#[derive(ClapArgs)]
pub struct Args {
    /// Path to remove
    pub path: String,

    /// Remove directories and their contents recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Ignore nonexistent paths
    #[arg(short, long)]
    pub force: bool,
}

#[instrument(level = "info", name = "cmd::rm", skip_all, fields(path = %args.path, recursive = args.recursive))]
pub fn execute(fs: &FileSystem, args: &Args) -> Result<()> {
    let path = normalize_path(&args.path);

    let info = match fs.stat(&path) {
        Ok(info) => info,
        Err(VfsError::NotFound { .. }) if args.force => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    if info.is_dir && info.child_count > 0 && !args.recursive {
        bail!("Directory not empty: {path} (use -r to remove it with its contents)");
    }

    fs.delete(&info.id)?;
    Ok(())
}
