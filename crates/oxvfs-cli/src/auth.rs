use std::io::{self, Write};

use anyhow::{Result, bail};
use rpassword::read_password;

/// Prompt for the store password. Input is not echoed.
///
/// For non-interactive use, pass `--password`, `--password-stdin` or set
/// `OXVFS_PASSWORD`.
pub fn prompt_passphrase() -> Result<String> {
    eprint!("Store password: ");
    io::stderr().flush()?;

    let passphrase = read_password()?;

    if passphrase.is_empty() {
        bail!("Password cannot be empty");
    }

    Ok(passphrase)
}

/// Prompt twice for the password of a new store.
pub fn prompt_new_passphrase() -> Result<String> {
    eprint!("New store password: ");
    io::stderr().flush()?;
    let first = read_password()?;

    eprint!("Confirm password: ");
    io::stderr().flush()?;
    let second = read_password()?;

    if first != second {
        bail!("Passwords do not match");
    }
    if first.is_empty() {
        bail!("Password cannot be empty");
    }
    Ok(first)
}
