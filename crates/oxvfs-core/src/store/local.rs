//! Directory-backed blob store.
//!
//! Each key is one regular file directly under the store root. Writes go to a
//! temporary file in the same directory and are renamed into place, so a
//! crash never leaves a half-written blob behind a valid key.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{instrument, trace};

use super::{BlobStore, StoreError, StoreOp};

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Open an existing store directory.
    pub fn open(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref();
        let metadata = fs::metadata(root)?;
        if !metadata.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{} is not a directory", root.display()),
            ));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Open a store directory, creating it (and its parents) if needed.
    pub fn create(root: impl AsRef<Path>) -> io::Result<Self> {
        fs::create_dir_all(root.as_ref())?;
        Self::open(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

/// Keys become file names, so they are restricted to a portable subset.
/// A leading `.` is rejected to keep keys apart from temporary files.
fn validate_key(key: &str) -> Result<(), StoreError> {
    let invalid = |reason| StoreError::InvalidKey {
        key: key.to_string(),
        reason,
    };

    if key.is_empty() {
        return Err(invalid("key is empty"));
    }
    if key.starts_with('.') {
        return Err(invalid("key must not start with '.'"));
    }
    if !key
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
    {
        return Err(invalid("key may only contain [A-Za-z0-9._-]"));
    }
    Ok(())
}

impl BlobStore for LocalStore {
    #[instrument(level = "trace", skip(self))]
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound {
                key: key.to_string(),
            },
            _ => StoreError::Io {
                op: StoreOp::Get,
                key: key.to_string(),
                source: e,
            },
        })
    }

    #[instrument(level = "trace", skip(self, value), fields(size = value.len()))]
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let io_err = |source| StoreError::Io {
            op: StoreOp::Put,
            key: key.to_string(),
            source,
        };

        let mut temp = NamedTempFile::new_in(&self.root).map_err(io_err)?;
        temp.write_all(value).map_err(io_err)?;
        temp.as_file().sync_all().map_err(io_err)?;
        temp.persist(&path).map_err(|e| io_err(e.error))?;
        trace!(path = %path.display(), "Blob written");
        Ok(())
    }

    #[instrument(level = "trace", skip(self))]
    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io {
                op: StoreOp::Delete,
                key: key.to_string(),
                source: e,
            }),
        }
    }

    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.path_for(key)?.is_file())
    }
}
