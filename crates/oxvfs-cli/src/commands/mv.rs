use anyhow::{Context, Result, bail};
use clap::Args as ClapArgs;
use tracing::instrument;

use oxvfs_core::tree::split_parent;
use oxvfs_core::{FileSystem, VfsError};

use super::normalize_path;

#[derive(ClapArgs)]
pub struct Args {
    /// Source path
    pub source: String,

    /// Destination path, or an existing directory to move into
    pub dest: String,
}

#[instrument(level = "info", name = "cmd::mv", skip_all, fields(source = %args.source, dest = %args.dest))]
pub fn execute(fs: &FileSystem, args: &Args) -> Result<()> {
    let source = normalize_path(&args.source);
    let dest = normalize_path(&args.dest);
    let node = fs.stat(&source)?;

    match fs.stat(&dest) {
        Ok(target) if target.is_dir => {
            fs.move_node(&node.id, &target.id)?;
            return Ok(());
        }
        Ok(_) => bail!("Destination already exists: {dest}"),
        Err(VfsError::NotFound { .. }) => {}
        Err(e) => return Err(e.into()),
    }

    let Some((parent_segments, new_name)) = split_parent(&dest) else {
        bail!("Invalid destination: {dest}");
    };
    let parent_path = format!("/{}", parent_segments.join("/"));
    let parent = fs
        .stat(&parent_path)
        .with_context(|| format!("Destination directory missing: {parent_path}"))?;
    let same_parent = node.parent.as_ref() == Some(&parent.id);

    if new_name != node.name {
        fs.rename(&node.id, new_name)?;
    }
    if !same_parent
        && let Err(e) = fs.move_node(&node.id, &parent.id)
    {
        if new_name != node.name {
            if let Err(revert) = fs.rename(&node.id, &node.name) {
                tracing::warn!(error = %revert, "Failed to restore original name");
            }
        }
        return Err(e.into());
    }

    Ok(())
}
