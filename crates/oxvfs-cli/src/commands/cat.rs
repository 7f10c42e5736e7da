use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use oxvfs_core::FileSystem;

use super::normalize_path;

#[derive(ClapArgs)]
pub struct Args {
    /// File path within the store
    pub file: String,
}

#[instrument(level = "info", name = "cmd::cat", skip_all, fields(file = %args.file))]
pub fn execute(fs: &FileSystem, args: &Args) -> Result<()> {
    let path = normalize_path(&args.file);
    let mut handle = fs.open_by_path(&path, false)?;

    let mut stdout = io::stdout().lock();
    io::copy(&mut handle, &mut stdout).with_context(|| format!("Failed to read {path}"))?;
    stdout.flush()?;
    handle.close()?;
    Ok(())
}
