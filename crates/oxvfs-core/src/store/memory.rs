use dashmap::DashMap;

use super::{BlobStore, StoreError};

/// In-memory blob store backed by a [`DashMap`].
///
/// Cloning is not supported; share it behind an `Arc` to inspect its
/// contents while a file system is using it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: DashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// All keys currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }
}

impl BlobStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.blobs
            .get(key)
            .map(|value| value.clone())
            .ok_or_else(|| StoreError::NotFound { key: key.to_string() })
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.blobs.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.blobs.remove(key);
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.blobs.contains_key(key))
    }
}
