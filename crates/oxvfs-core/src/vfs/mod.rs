//! The encrypted file system: open/initialize, tree operations and file
//! handles.

pub mod config;
pub mod filesystem;
pub mod flags;
pub mod handle;
pub(crate) mod lock;
pub mod sniff;

pub use config::{
    DEFAULT_PAGE_SIZE, FileSystemOptions, FsConfig, KEY_CONFIG, KEY_CREDENTIAL, KEY_TREE,
    MAX_PAGE_SIZE, MIN_PAGE_SIZE,
};
pub use filesystem::{Created, FileSystem};
pub use flags::{OpenFlags, OpenMode};
pub use handle::FileHandle;

use std::io;

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::store::{StoreError, StoreOp};
use crate::tree::{NodeId, TreeError};

/// Errors returned by [`FileSystem`] and [`FileHandle`].
#[derive(Error, Debug)]
pub enum VfsError {
    #[error("Not found: {target}")]
    NotFound { target: String },

    /// Wrong password, or the credential/snapshot blobs were tampered with.
    #[error("Authentication failed: wrong password or tampered store")]
    Auth,

    #[error("File {id} is already open for writing")]
    Busy { id: NodeId },

    #[error("{id} is a directory")]
    IsDirectory { id: NodeId },

    #[error("{id} is not a directory")]
    NotDirectory { id: NodeId },

    #[error("Invalid offset: {reason}")]
    InvalidOffset { reason: String },

    #[error("Cannot {op} through a handle opened in {mode} mode")]
    Permission { op: &'static str, mode: OpenMode },

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("'{name}' already exists")]
    AlreadyExists { name: String },

    #[error("Invalid move: {reason}")]
    InvalidMove { reason: String },

    #[error("Invalid open flags: {0}")]
    InvalidFlags(&'static str),

    #[error("Handle is closed")]
    Closed,

    #[error("Storage {op} of '{key}' failed: {source}")]
    Storage {
        op: StoreOp,
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("Crypto error: {0}")]
    Crypto(#[source] CryptoError),

    #[error("Corrupt store: {0}")]
    CorruptSnapshot(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Buffered input could not be sealed into pages. `pending` bytes stay
    /// buffered and are retried by the next write, flush or `close`. The
    /// input of the failing call, if any, was not accepted.
    #[error("Write partially failed with {pending} bytes pending: {source}")]
    PartialWrite {
        pending: usize,
        #[source]
        source: Box<VfsError>,
    },

    #[error("Internal lock poisoned")]
    LockPoisoned,
}

impl VfsError {
    pub(crate) fn storage(op: StoreOp, key: &str, source: StoreError) -> Self {
        VfsError::Storage {
            op,
            key: key.to_string(),
            source,
        }
    }

    /// Recover the `VfsError` carried by an `io::Error` produced from one.
    pub fn from_io(err: &io::Error) -> Option<&VfsError> {
        err.get_ref()?.downcast_ref::<VfsError>()
    }

    /// The error kind used when this error crosses the `std::io` traits.
    pub fn io_kind(&self) -> io::ErrorKind {
        match self {
            VfsError::NotFound { .. } => io::ErrorKind::NotFound,
            VfsError::Permission { .. } => io::ErrorKind::PermissionDenied,
            VfsError::Busy { .. } => io::ErrorKind::ResourceBusy,
            VfsError::IsDirectory { .. } => io::ErrorKind::IsADirectory,
            VfsError::NotDirectory { .. } => io::ErrorKind::NotADirectory,
            VfsError::InvalidOffset { .. }
            | VfsError::InvalidName { .. }
            | VfsError::InvalidMove { .. }
            | VfsError::InvalidFlags(_) => io::ErrorKind::InvalidInput,
            VfsError::AlreadyExists { .. } => io::ErrorKind::AlreadyExists,
            VfsError::Auth | VfsError::CorruptSnapshot(_) => io::ErrorKind::InvalidData,
            VfsError::Closed => io::ErrorKind::BrokenPipe,
            VfsError::PartialWrite { source, .. } => source.io_kind(),
            VfsError::Storage { .. }
            | VfsError::Crypto(_)
            | VfsError::Config(_)
            | VfsError::Serialization(_)
            | VfsError::LockPoisoned => io::ErrorKind::Other,
        }
    }
}

impl From<VfsError> for io::Error {
    fn from(err: VfsError) -> Self {
        io::Error::new(err.io_kind(), err)
    }
}

impl From<CryptoError> for VfsError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::AuthenticationFailed => VfsError::Auth,
            other => VfsError::Crypto(other),
        }
    }
}

impl From<TreeError> for VfsError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::NotFound { target } => VfsError::NotFound { target },
            TreeError::NotDirectory { id } => VfsError::NotDirectory { id },
            TreeError::InvalidName { name, reason } => VfsError::InvalidName { name, reason },
            TreeError::AlreadyExists { name, .. } => VfsError::AlreadyExists { name },
            TreeError::InvalidMove { reason } => VfsError::InvalidMove { reason },
            TreeError::CorruptSnapshot(msg) => VfsError::CorruptSnapshot(msg),
            TreeError::Serialization(e) => VfsError::Serialization(e),
        }
    }
}
