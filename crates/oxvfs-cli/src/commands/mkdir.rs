use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use oxvfs_core::FileSystem;

use super::normalize_path;

#[derive(ClapArgs)]
pub struct Args {
    /// Directory path to create
    pub path: String,

    /// Create parent directories as needed
    #[arg(short, long)]
    pub parents: bool,
}

#[instrument(level = "info", name = "cmd::mkdir", skip_all, fields(path = %args.path))]
pub fn execute(fs: &FileSystem, args: &Args) -> Result<()> {
    let path = normalize_path(&args.path);

    if args.parents {
        fs.create_dir_all(&path)?;
    } else {
        fs.create_by_path(&path, true)?;
    }
    Ok(())
}
