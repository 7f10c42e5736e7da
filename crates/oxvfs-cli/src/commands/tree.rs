use anyhow::{Result, bail};
use clap::Args as ClapArgs;
use tracing::instrument;

use oxvfs_core::{FileSystem, NodeId};

use super::normalize_path;

#[derive(ClapArgs)]
pub struct Args {
    /// Starting path (default: root)
    #[arg(default_value = "/")]
    pub path: String,

    /// Maximum depth to display
    #[arg(short = 'd', long)]
    pub max_depth: Option<usize>,
}

#[instrument(level = "info", name = "cmd::tree", skip_all, fields(path = %args.path))]
pub fn execute(fs: &FileSystem, args: &Args) -> Result<()> {
    let path = normalize_path(&args.path);
    let info = fs.stat(&path)?;
    if !info.is_dir {
        bail!("Not a directory: {}", args.path);
    }

    let name = if path == "/" { "." } else { &args.path };
    println!("{name}");
    print_tree_recursive(fs, &info.id, "", 0, args.max_depth)
}

fn print_tree_recursive(
    fs: &FileSystem,
    dir: &NodeId,
    prefix: &str,
    depth: usize,
    max_depth: Option<usize>,
) -> Result<()> {
    if max_depth.is_some_and(|max| depth >= max) {
        return Ok(());
    }

    let mut entries = fs.list_id(dir)?;
    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));

    let total = entries.len();
    for (index, entry) in entries.iter().enumerate() {
        let is_last = index + 1 == total;
        let connector = if is_last { "└── " } else { "├── " };

        if entry.is_dir {
            println!("{prefix}{connector}{}/", entry.name);
            let new_prefix = if is_last {
                format!("{prefix}    ")
            } else {
                format!("{prefix}│   ")
            };
            print_tree_recursive(fs, &entry.id, &new_prefix, depth + 1, max_depth)?;
        } else {
            println!("{prefix}{connector}{}", entry.name);
        }
    }

    Ok(())
}
