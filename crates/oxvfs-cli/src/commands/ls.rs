//! List command - list directory contents in a store.
//!
//! # Examples
//!
//! ```bash
//! # List root directory
//! oxvfs ls ~/store
//!
//! # List with details
//! oxvfs ls ~/store -l /documents
//!
//! # Output as JSON for scripting
//! oxvfs ls ~/store --json / | jq '.entries[].name'
//! ```

use anyhow::Result;
use clap::Args as ClapArgs;
use serde::Serialize;
use tracing::instrument;

use oxvfs_core::{DirEntry, FileSystem};

use super::normalize_path;
use crate::output::{create_table, format_entry_type, format_size};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Path within the store (default: root)
    #[arg(default_value = "/")]
    pub path: String,

    /// Show detailed information
    #[arg(short, long)]
    pub long: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct LsOutput<'a> {
    path: &'a str,
    entries: &'a [DirEntry],
}

#[instrument(level = "info", name = "cmd::ls", skip_all, fields(path = %args.path))]
pub fn execute(fs: &FileSystem, args: &Args) -> Result<()> {
    let path = normalize_path(&args.path);
    let mut entries = fs.list(&path)?;
    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));

    if args.json {
        let output = LsOutput {
            path: &path,
            entries: &entries,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if args.long {
        print_long_format(&entries);
    } else {
        for entry in &entries {
            if entry.is_dir {
                println!("{}/", entry.name);
            } else {
                println!("{}", entry.name);
            }
        }
    }

    Ok(())
}

fn print_long_format(entries: &[DirEntry]) {
    let mut table = create_table();
    table.set_header(vec!["Type", "Size", "Content type", "Modified", "Name"]);

    for entry in entries {
        let size = if entry.is_dir {
            "-".to_string()
        } else {
            format_size(entry.size)
        };
        table.add_row(vec![
            format_entry_type(entry.is_dir).to_string(),
            size,
            entry.content_type.clone().unwrap_or_default(),
            entry.modified_at.format("%Y-%m-%d %H:%M").to_string(),
            entry.name.clone(),
        ]);
    }

    println!("{table}");
}
