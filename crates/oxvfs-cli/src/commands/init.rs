use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args as ClapArgs;
use tracing::instrument;

use oxvfs_core::vfs::{DEFAULT_PAGE_SIZE, KEY_CONFIG};
use oxvfs_core::{BlobStore, FileSystem, FileSystemOptions, LocalStore};

use crate::config::{self, Config};
use crate::output::format_size;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Directory for the new store (created if missing, or @alias)
    #[arg(value_name = "STORE")]
    pub store: PathBuf,

    /// Page size in bytes (default: config file, then 1 MiB)
    #[arg(long, value_name = "BYTES")]
    pub page_size: Option<usize>,
}

#[instrument(level = "info", name = "cmd::init", skip_all, fields(store = %args.store.display()))]
pub fn execute(args: &Args, password: &str) -> Result<()> {
    let path = config::resolve_store_alias(&args.store.to_string_lossy())?;

    let store = LocalStore::create(&path)
        .with_context(|| format!("Failed to create store directory: {}", path.display()))?;
    if store.contains(KEY_CONFIG)? {
        bail!("Store already initialized: {}", path.display());
    }

    let page_size = match args.page_size {
        Some(size) => size,
        None => Config::load()?.defaults.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    };
    let options = FileSystemOptions::new().with_page_size(page_size);

    FileSystem::open_with(store, password, options).context("Failed to initialize store")?;

    println!(
        "Initialized store at {} (page size {})",
        path.display(),
        format_size(page_size as u64)
    );
    Ok(())
}
