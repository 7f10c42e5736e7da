//! Encrypted virtual file system layered over a key-value blob store.
//!
//! File contents are split into fixed-size pages, each sealed with
//! AES-256-GCM under a key derived from the user's password, and stored as an
//! opaque blob. The directory tree is kept in memory and persisted as a single
//! encrypted snapshot after every mutation.
//!
//! ```no_run
//! use std::io::{Read, Write};
//! use oxvfs_core::{FileSystem, MemoryStore};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let fs = FileSystem::open(MemoryStore::new(), "correct horse")?;
//! let mut file = fs.create_file(&fs.root_id(), "notes.txt")?;
//! file.write_all(b"hello world")?;
//! file.close()?;
//!
//! let mut contents = String::new();
//! fs.open_by_path("/notes.txt", false)?.read_to_string(&mut contents)?;
//! assert_eq!(contents, "hello world");
//! # Ok(())
//! # }
//! ```

pub mod crypto;
pub mod error;
pub mod store;
pub mod tree;
pub mod vfs;

pub use store::{BlobStore, LocalStore, MemoryStore};
pub use tree::{BlobId, DirEntry, NodeId, NodeInfo};
pub use vfs::{
    Created, FileHandle, FileSystem, FileSystemOptions, OpenFlags, OpenMode, VfsError,
};
