//! Shared helpers for oxvfs-core integration tests.
#![allow(dead_code)]

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use oxvfs_core::error::{StoreError, StoreOp};
use oxvfs_core::{BlobStore, FileSystem, FileSystemOptions, MemoryStore, NodeId};

pub const TEST_PASSWORD: &str = "test-password-12345";

/// Install a test-friendly subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Cheap KDF and an arbitrary page size (no minimum).
pub fn test_options(page_size: usize) -> FileSystemOptions {
    FileSystemOptions::new()
        .with_page_size_unchecked(page_size)
        .with_fast_kdf()
}

/// A fresh file system over a shared in-memory store.
pub fn memory_fs(page_size: usize) -> (Arc<MemoryStore>, FileSystem) {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let fs = FileSystem::open_with(Arc::clone(&store), TEST_PASSWORD, test_options(page_size))
        .expect("Failed to initialize file system");
    (store, fs)
}

/// Create `path` (parent must exist), write `data` and close.
pub fn write_file(fs: &FileSystem, path: &str, data: &[u8]) -> NodeId {
    let mut handle = fs
        .create_by_path(path, false)
        .expect("Failed to create file")
        .into_file()
        .expect("Expected a file handle");
    handle.write_all(data).expect("Failed to write");
    handle.close().expect("Failed to close");
    handle.id().clone()
}

pub fn read_file(fs: &FileSystem, path: &str) -> Vec<u8> {
    let mut handle = fs.open_by_path(path, false).expect("Failed to open");
    let mut out = Vec::new();
    handle.read_to_end(&mut out).expect("Failed to read");
    out
}

/// Create content of exactly the specified size
pub fn sized_content(size: usize) -> Vec<u8> {
    let pattern = b"0123456789ABCDEF";
    (0..size).map(|i| pattern[i % pattern.len()]).collect()
}

/// In-memory store whose puts can be made to fail on demand.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_puts: AtomicBool,
    puts: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

impl BlobStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                op: StoreOp::Put,
                key: key.to_string(),
                source: io::Error::other("injected put failure"),
            });
        }
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key)
    }
}
