use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use oxvfs_core::{FileSystem, OpenFlags};

use super::normalize_path;

#[derive(ClapArgs)]
pub struct Args {
    /// Destination path in the store (created if missing, replaced otherwise)
    pub path: String,

    /// Attach a thumbnail read from a local file
    #[arg(long, value_name = "FILE")]
    pub thumbnail: Option<PathBuf>,
}

#[instrument(level = "info", name = "cmd::write", skip_all, fields(path = %args.path))]
pub fn execute(fs: &FileSystem, args: &Args) -> Result<()> {
    let path = normalize_path(&args.path);

    let thumbnail = args
        .thumbnail
        .as_ref()
        .map(|p| {
            std::fs::read(p).with_context(|| format!("Failed to read thumbnail: {}", p.display()))
        })
        .transpose()?;

    let mut handle = fs.open_with_flags(&path, OpenFlags::WRITE_ONLY | OpenFlags::CREATE)?;

    let written = io::copy(&mut io::stdin().lock(), &mut handle)
        .with_context(|| format!("Failed to write {path}"))?;
    if let Some(data) = thumbnail {
        handle.write_thumbnail(&data)?;
    }
    handle.close()?;

    tracing::info!(bytes = written, "File written");
    Ok(())
}
