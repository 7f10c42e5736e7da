//! Configuration file support for the oxvfs CLI.
//!
//! The file is read from `$OXVFS_CONFIG` when set, otherwise from
//! `~/.config/oxvfs/config.toml` (or the platform equivalent).
//!
//! # Example configuration
//!
//! ```toml
//! [defaults]
//! page_size = 262144
//!
//! [stores.work]
//! path = "/home/user/work-store"
//! ```
//!
//! # Usage
//!
//! ```bash
//! oxvfs ls @work /
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

const CONFIG_ENV: &str = "OXVFS_CONFIG";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Default settings applied to all commands
    #[serde(default)]
    pub defaults: Defaults,

    /// Named store directories
    #[serde(default)]
    pub stores: BTreeMap<String, StoreConfig>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Defaults {
    /// Page size used by `init` when `--page-size` is not given
    pub page_size: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Path to the store directory
    pub path: PathBuf,
}

impl Config {
    /// Load configuration from the default path, or return an empty config
    /// if there is no file.
    pub fn load() -> Result<Self> {
        let path = config_path()?;

        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn get_store(&self, alias: &str) -> Option<&StoreConfig> {
        self.stores.get(alias)
    }
}

pub fn config_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    let base_dirs = directories::BaseDirs::new()
        .ok_or_else(|| anyhow!("Could not determine home directory"))?;
    Ok(base_dirs.config_dir().join("oxvfs").join("config.toml"))
}

/// Resolve a store path, handling `@alias` syntax.
///
/// Anything not starting with `@` is returned unchanged.
pub fn resolve_store_alias(path_or_alias: &str) -> Result<PathBuf> {
    let Some(alias) = path_or_alias.strip_prefix('@') else {
        return Ok(PathBuf::from(path_or_alias));
    };

    let config = Config::load()?;
    let Some(store) = config.get_store(alias) else {
        let available: Vec<String> = config.stores.keys().map(|a| format!("@{a}")).collect();
        let location = config_path()
            .map_or_else(|_| "the config file".to_string(), |p| p.display().to_string());
        if available.is_empty() {
            bail!(
                "Unknown store alias '@{alias}'.\n\
                 No store aliases are configured.\n\n\
                 Add to {location}:\n\n\
                 [stores.{alias}]\n\
                 path = \"/path/to/store\""
            );
        }
        bail!(
            "Unknown store alias '@{alias}'.\n\n\
             Available aliases: {}",
            available.join(", ")
        );
    };

    Ok(store.path.clone())
}
