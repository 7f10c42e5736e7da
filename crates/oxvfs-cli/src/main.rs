#![deny(unsafe_code)]

mod auth;
mod commands;
mod config;
mod exit_code;
mod output;

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use oxvfs_core::error::StoreError;
use oxvfs_core::vfs::KEY_CONFIG;
use oxvfs_core::{BlobStore, FileSystem, LocalStore, VfsError};

use crate::commands::{cat, info, init, ls, mkdir, mv, rm, tree, write};

/// Command-line interface for oxvfs encrypted stores
#[derive(Parser)]
#[command(name = "oxvfs")]
#[command(author, version)]
#[command(propagate_version = true)]
#[command(after_help = "EXAMPLES:
    # Create a store in a directory
    oxvfs init ~/store

    # Copy a local file in
    oxvfs write ~/store /notes.txt < notes.txt

    # Read it back (pipe password from secret manager)
    echo \"$SECRET\" | oxvfs --password-stdin cat ~/store /notes.txt

    # Use a store alias (from ~/.config/oxvfs/config.toml)
    oxvfs ls @work /
")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Store password (insecure, prefer --password-stdin or OXVFS_PASSWORD)
    #[arg(long, env = "OXVFS_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Read password from stdin (single line)
    #[arg(long, conflicts_with = "password", global = true)]
    password_stdin: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Password options extracted from CLI for store operations
#[derive(Clone, Default)]
pub struct PasswordOptions {
    pub password: Option<String>,
    pub password_stdin: bool,
}

impl From<&Cli> for PasswordOptions {
    fn from(cli: &Cli) -> Self {
        Self {
            password: cli.password.clone(),
            password_stdin: cli.password_stdin,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new store in a directory
    Init(init::Args),

    /// List directory contents
    Ls(StoreCommand<ls::Args>),

    /// Show directory tree
    Tree(StoreCommand<tree::Args>),

    /// Write file contents to stdout
    Cat(StoreCommand<cat::Args>),

    /// Write stdin to a file
    Write(StoreCommand<write::Args>),

    /// Create a directory
    Mkdir(StoreCommand<mkdir::Args>),

    /// Remove a file or directory
    Rm(StoreCommand<rm::Args>),

    /// Move or rename a file or directory
    Mv(StoreCommand<mv::Args>),

    /// Show store configuration and usage
    Info(StoreCommand<info::Args>),
}

/// Wrapper for commands that operate on an initialized store
#[derive(Parser, Clone)]
pub struct StoreCommand<T: clap::Args> {
    /// Store directory (or @alias from config)
    #[arg(value_name = "STORE")]
    pub store: PathBuf,

    #[command(flatten)]
    pub args: T,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::from(exit_code::SUCCESS),
        Err(e) => {
            let code = categorize_error(&e);

            // The parsed Cli is gone by now, so look at the raw args
            let is_quiet = std::env::args().any(|a| a == "-q" || a == "--quiet");
            if !is_quiet {
                eprintln!("Error: {e:#}");
            }

            ExitCode::from(code)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if !cli.quiet {
        setup_tracing(cli.verbose);
    }

    let password_opts = PasswordOptions::from(&cli);

    match cli.command {
        Commands::Init(args) => {
            let password = get_passphrase_or(&password_opts, auth::prompt_new_passphrase)?;
            init::execute(&args, &password)
        }
        Commands::Ls(cmd) => execute_store_command(&cmd, &password_opts, ls::execute),
        Commands::Tree(cmd) => execute_store_command(&cmd, &password_opts, tree::execute),
        Commands::Cat(cmd) => execute_store_command(&cmd, &password_opts, cat::execute),
        Commands::Write(cmd) => execute_store_command(&cmd, &password_opts, write::execute),
        Commands::Mkdir(cmd) => execute_store_command(&cmd, &password_opts, mkdir::execute),
        Commands::Rm(cmd) => execute_store_command(&cmd, &password_opts, rm::execute),
        Commands::Mv(cmd) => execute_store_command(&cmd, &password_opts, mv::execute),
        Commands::Info(cmd) => execute_store_command(&cmd, &password_opts, info::execute),
    }
}

/// Execute a command that requires an unlocked store
fn execute_store_command<T, F>(
    cmd: &StoreCommand<T>,
    password_opts: &PasswordOptions,
    f: F,
) -> Result<()>
where
    T: clap::Args,
    F: FnOnce(&FileSystem, &T) -> Result<()>,
{
    let store_path = resolve_store_path(&cmd.store)?;
    let fs = unlock_store(&store_path, password_opts)?;
    f(&fs, &cmd.args)
}

/// Resolve store path, handling @alias syntax
fn resolve_store_path(path: &Path) -> Result<PathBuf> {
    let resolved = config::resolve_store_alias(&path.to_string_lossy())?;

    if !resolved.exists() {
        bail!("Store path does not exist: {}", resolved.display());
    }
    if !resolved.is_dir() {
        bail!("Store path is not a directory: {}", resolved.display());
    }

    Ok(resolved)
}

/// Open an existing store. An empty directory is rejected rather than
/// silently initialized.
fn unlock_store(store_path: &Path, password_opts: &PasswordOptions) -> Result<FileSystem> {
    let store = LocalStore::open(store_path)
        .with_context(|| format!("Failed to open store directory: {}", store_path.display()))?;

    if !store.contains(KEY_CONFIG)? {
        bail!(
            "Not an oxvfs store: {} (run `oxvfs init` first)",
            store_path.display()
        );
    }

    let password = get_passphrase(password_opts)?;
    FileSystem::open(store, &password).context("Failed to unlock store - check your password")
}

/// Get passphrase using the priority chain:
/// 1. --password-stdin
/// 2. --password / OXVFS_PASSWORD
/// 3. Interactive prompt
fn get_passphrase(opts: &PasswordOptions) -> Result<String> {
    get_passphrase_or(opts, auth::prompt_passphrase)
}

fn get_passphrase_or(opts: &PasswordOptions, prompt: fn() -> Result<String>) -> Result<String> {
    if opts.password_stdin {
        read_password_from_stdin()
    } else if let Some(ref password) = opts.password {
        Ok(password.clone())
    } else {
        prompt()
    }
}

/// Read password from stdin (first line only)
fn read_password_from_stdin() -> Result<String> {
    if io::stdin().is_terminal() {
        bail!(
            "--password-stdin requires password to be piped in.\n\
             Example: echo \"$SECRET\" | oxvfs --password-stdin ls ~/store /"
        );
    }

    let mut password = String::new();
    io::stdin().read_line(&mut password)?;

    let password = password.trim_end_matches('\n').trim_end_matches('\r');

    if password.is_empty() {
        bail!("Password from stdin is empty");
    }

    Ok(password.to_string())
}

/// Set up tracing/logging based on verbosity level
fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}

/// Categorize an error into an exit code by walking the error chain
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(vfs_err) = cause.downcast_ref::<VfsError>() {
            return match vfs_err {
                VfsError::Auth => exit_code::AUTH_FAILED,
                VfsError::NotFound { .. } => exit_code::NOT_FOUND,
                VfsError::Busy { .. } => exit_code::BUSY,
                VfsError::Permission { .. } => exit_code::PERMISSION_DENIED,
                VfsError::CorruptSnapshot(_)
                | VfsError::Config(_)
                | VfsError::Crypto(_)
                | VfsError::Serialization(_) => exit_code::STORE_INVALID,
                VfsError::Storage { source, .. } if source.is_not_found() => {
                    exit_code::STORE_INVALID
                }
                _ => exit_code::GENERAL_ERROR,
            };
        }

        if let Some(StoreError::Io { source, .. }) = cause.downcast_ref::<StoreError>()
            && source.kind() == io::ErrorKind::PermissionDenied
        {
            return exit_code::PERMISSION_DENIED;
        }

        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::PermissionDenied => return exit_code::PERMISSION_DENIED,
                io::ErrorKind::NotFound => return exit_code::NOT_FOUND,
                io::ErrorKind::Interrupted => return exit_code::CANCELLED,
                _ => {}
            }
        }
    }

    let msg = format!("{e:#}").to_lowercase();
    if msg.contains("not an oxvfs store") || msg.contains("store path") {
        exit_code::STORE_INVALID
    } else {
        exit_code::GENERAL_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxvfs_core::NodeId;

    #[test]
    fn test_categorize_auth() {
        let err = anyhow::Error::new(VfsError::Auth).context("Failed to unlock store");
        assert_eq!(categorize_error(&err), exit_code::AUTH_FAILED);
    }

    #[test]
    fn test_categorize_not_found_and_busy() {
        let missing = anyhow::Error::new(VfsError::NotFound {
            target: "/nope".to_string(),
        });
        assert_eq!(categorize_error(&missing), exit_code::NOT_FOUND);

        let busy = anyhow::Error::new(VfsError::Busy {
            id: NodeId::from("abc"),
        });
        assert_eq!(categorize_error(&busy), exit_code::BUSY);
    }

    #[test]
    fn test_categorize_io_errors() {
        let denied = anyhow::Error::new(io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(categorize_error(&denied), exit_code::PERMISSION_DENIED);
    }

    #[test]
    fn test_categorize_fallback() {
        let err = anyhow::anyhow!("Not an oxvfs store: /tmp/x (run `oxvfs init` first)");
        assert_eq!(categorize_error(&err), exit_code::STORE_INVALID);
        assert_eq!(categorize_error(&anyhow::anyhow!("boom")), exit_code::GENERAL_ERROR);
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
