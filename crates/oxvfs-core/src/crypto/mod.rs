//! Cryptographic primitives: password-derived page keys and the page codec.
//!
//! Every blob written by the file system (content pages, thumbnails, the tree
//! snapshot and the credential marker) goes through [`encrypt_page`] and comes
//! back through [`decrypt_page`].

pub mod keys;
pub mod page;

pub use keys::{KdfParams, PageKey, is_fast_kdf_enabled};
pub use page::{NONCE_SIZE, PAGE_OVERHEAD, TAG_SIZE, decrypt_page, encrypt_page, encrypted_size};

use thiserror::Error;

/// Errors from key derivation and the page codec.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// The GCM tag did not verify. Either the key is wrong or the blob was
    /// modified.
    #[error("[INTEGRITY VIOLATION] Authentication failed - wrong password or tampered data")]
    AuthenticationFailed,

    #[error("Ciphertext too short: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Invalid scrypt parameters: {0}")]
    InvalidKdfParams(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),
}

impl CryptoError {
    /// True when the failure means "wrong key or tampered blob".
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, CryptoError::AuthenticationFailed)
    }
}
