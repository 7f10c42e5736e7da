use anyhow::Result;
use clap::Args as ClapArgs;
use serde::Serialize;
use tracing::instrument;

use oxvfs_core::tree::TreeStats;
use oxvfs_core::{FileSystem, NodeInfo};

use super::normalize_path;
use crate::output::{create_table, format_size};

#[derive(ClapArgs)]
pub struct Args {
    /// Show metadata for this path instead of the whole store
    pub path: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct StoreInfo {
    format: u32,
    page_size: usize,
    kdf: KdfInfo,
    stats: TreeStats,
}

#[derive(Serialize)]
struct KdfInfo {
    algorithm: &'static str,
    log2_n: u8,
    r: u32,
    p: u32,
}

#[instrument(level = "info", name = "cmd::info", skip_all)]
pub fn execute(fs: &FileSystem, args: &Args) -> Result<()> {
    if let Some(path) = &args.path {
        let info = fs.stat(&normalize_path(path))?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&info)?);
        } else {
            print_node(&info);
        }
        return Ok(());
    }

    let config = fs.config();
    let info = StoreInfo {
        format: config.format,
        page_size: config.page_size,
        kdf: KdfInfo {
            algorithm: "scrypt",
            log2_n: config.kdf.log2_n,
            r: config.kdf.r,
            p: config.kdf.p,
        },
        stats: fs.stats()?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let mut table = create_table();
    table.set_header(vec!["Property", "Value"]);
    table.add_row(vec!["Format".to_string(), info.format.to_string()]);
    table.add_row(vec!["Page size".to_string(), format_size(info.page_size as u64)]);
    table.add_row(vec![
        "KDF".to_string(),
        format!(
            "scrypt (N=2^{}, r={}, p={})",
            info.kdf.log2_n, info.kdf.r, info.kdf.p
        ),
    ]);
    table.add_row(vec!["Directories".to_string(), info.stats.directories.to_string()]);
    table.add_row(vec!["Files".to_string(), info.stats.files.to_string()]);
    table.add_row(vec!["Total size".to_string(), format_size(info.stats.total_size)]);
    table.add_row(vec!["Pages".to_string(), info.stats.pages.to_string()]);
    table.add_row(vec!["Thumbnails".to_string(), info.stats.thumbnails.to_string()]);
    println!("{table}");
    Ok(())
}

fn print_node(info: &NodeInfo) {
    let mut table = create_table();
    table.set_header(vec!["Property", "Value"]);
    table.add_row(vec!["Name".to_string(), info.name.clone()]);
    table.add_row(vec![
        "Type".to_string(),
        if info.is_dir { "directory" } else { "file" }.to_string(),
    ]);
    if info.is_dir {
        table.add_row(vec!["Entries".to_string(), info.child_count.to_string()]);
    } else {
        table.add_row(vec!["Size".to_string(), format_size(info.size)]);
        table.add_row(vec!["Pages".to_string(), info.page_count.to_string()]);
        table.add_row(vec![
            "Content type".to_string(),
            info.content_type.clone().unwrap_or_else(|| "unknown".to_string()),
        ]);
        table.add_row(vec!["Thumbnail".to_string(), info.has_thumbnail.to_string()]);
    }
    table.add_row(vec!["Created".to_string(), info.created_at.to_rfc3339()]);
    table.add_row(vec!["Modified".to_string(), info.modified_at.to_rfc3339()]);
    println!("{table}");
}
