//! Blob storage backends.
//!
//! The file system only needs a flat key-value namespace of opaque byte
//! strings. [`MemoryStore`] keeps everything in a concurrent map and
//! [`LocalStore`] maps each key to one file inside a directory.

pub mod local;
pub mod memory;

pub use local::LocalStore;
pub use memory::MemoryStore;

use std::fmt;
use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Which store operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Get,
    Put,
    Delete,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreOp::Get => "get",
            StoreOp::Put => "put",
            StoreOp::Delete => "delete",
        })
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Blob not found: '{key}'")]
    NotFound { key: String },

    #[error("IO error during {op} of '{key}': {source}")]
    Io {
        op: StoreOp,
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid blob key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn key(&self) -> &str {
        match self {
            StoreError::NotFound { key }
            | StoreError::Io { key, .. }
            | StoreError::InvalidKey { key, .. } => key,
        }
    }
}

/// A flat, synchronous key-value store of opaque byte strings.
///
/// Implementations must be safe to call from several threads at once.
/// `delete` of a key that does not exist succeeds.
pub trait BlobStore: fmt::Debug + Send + Sync {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    fn delete(&self, key: &str) -> Result<(), StoreError>;

    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl<S: BlobStore + ?Sized> BlobStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key)
    }

    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        (**self).contains(key)
    }
}

impl<S: BlobStore + ?Sized> BlobStore for Box<S> {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key)
    }

    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        (**self).contains(key)
    }
}
