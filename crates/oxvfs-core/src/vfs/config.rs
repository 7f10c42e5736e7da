//! Store-level configuration and open options.
//!
//! The config blob is the only plaintext blob in a store. It records the page
//! size chosen at initialization and the KDF salt and cost, which are needed
//! before any key exists.

use serde::{Deserialize, Serialize};

use super::VfsError;
use crate::crypto::KdfParams;

/// Encrypted tree snapshot.
pub const KEY_TREE: &str = "filesystem.root";
/// Plaintext [`FsConfig`].
pub const KEY_CONFIG: &str = "filesystem.config";
/// Encrypted marker used to check the password before touching the tree.
pub const KEY_CREDENTIAL: &str = "filesystem.credential";

pub const DEFAULT_PAGE_SIZE: usize = 1024 * 1024;
pub const MIN_PAGE_SIZE: usize = 32 * 1024;
pub const MAX_PAGE_SIZE: usize = 64 * 1024 * 1024;

pub const CONFIG_FORMAT: u32 = 1;

pub(crate) const CREDENTIAL_MARKER: &[u8] = b"oxvfs-credential-v1";

/// Persisted as JSON under [`KEY_CONFIG`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsConfig {
    pub format: u32,
    pub page_size: usize,
    pub kdf: KdfParams,
}

impl FsConfig {
    pub fn to_bytes(&self) -> Result<Vec<u8>, VfsError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VfsError> {
        let config: Self = serde_json::from_slice(bytes)?;
        if config.format != CONFIG_FORMAT {
            return Err(VfsError::Config(format!(
                "unsupported store format {} (expected {CONFIG_FORMAT})",
                config.format
            )));
        }
        if config.page_size == 0 || config.page_size > MAX_PAGE_SIZE {
            return Err(VfsError::Config(format!(
                "stored page size {} is out of range",
                config.page_size
            )));
        }
        Ok(config)
    }
}

/// Options for [`FileSystem::open_with`](super::FileSystem::open_with).
///
/// They only take effect when the store is empty and gets initialized; an
/// existing store always uses the page size and KDF parameters it was created
/// with.
#[derive(Debug, Clone)]
pub struct FileSystemOptions {
    page_size: usize,
    kdf: Option<KdfParams>,
    enforce_min_page_size: bool,
}

impl Default for FileSystemOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            kdf: None,
            enforce_min_page_size: true,
        }
    }
}

impl FileSystemOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page size for a new store, between [`MIN_PAGE_SIZE`] and
    /// [`MAX_PAGE_SIZE`].
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self.enforce_min_page_size = true;
        self
    }

    /// Like [`with_page_size`](Self::with_page_size) but allows any non-zero
    /// size. Tiny pages make page boundaries easy to hit in tests.
    #[doc(hidden)]
    pub fn with_page_size_unchecked(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self.enforce_min_page_size = false;
        self
    }

    /// Use these KDF parameters instead of generating fresh ones.
    pub fn with_kdf_params(mut self, kdf: KdfParams) -> Self {
        self.kdf = Some(kdf);
        self
    }

    /// Shorthand for [`KdfParams::fast`].
    pub fn with_fast_kdf(self) -> Self {
        self.with_kdf_params(KdfParams::fast())
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub(crate) fn validate(&self) -> Result<(), VfsError> {
        let min = if self.enforce_min_page_size { MIN_PAGE_SIZE } else { 1 };
        if self.page_size < min || self.page_size > MAX_PAGE_SIZE {
            return Err(VfsError::Config(format!(
                "page size {} must be between {min} and {MAX_PAGE_SIZE}",
                self.page_size
            )));
        }
        Ok(())
    }

    pub(crate) fn into_config(self) -> FsConfig {
        FsConfig {
            format: CONFIG_FORMAT,
            page_size: self.page_size,
            kdf: self.kdf.unwrap_or_else(KdfParams::generate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = FileSystemOptions::default();
        assert_eq!(options.page_size(), DEFAULT_PAGE_SIZE);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_page_size_bounds() {
        assert!(FileSystemOptions::new().with_page_size(MIN_PAGE_SIZE).validate().is_ok());
        assert!(FileSystemOptions::new().with_page_size(MIN_PAGE_SIZE - 1).validate().is_err());
        assert!(FileSystemOptions::new().with_page_size(MAX_PAGE_SIZE + 1).validate().is_err());
        assert!(FileSystemOptions::new().with_page_size_unchecked(4).validate().is_ok());
        assert!(FileSystemOptions::new().with_page_size_unchecked(0).validate().is_err());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = FileSystemOptions::new().with_fast_kdf().into_config();
        let restored = FsConfig::from_bytes(&config.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_config_rejects_unknown_format() {
        let mut config = FileSystemOptions::new().with_fast_kdf().into_config();
        config.format = 99;
        let bytes = serde_json::to_vec(&config).unwrap();
        assert!(matches!(FsConfig::from_bytes(&bytes), Err(VfsError::Config(_))));
    }
}
