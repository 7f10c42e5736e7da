//! Page codec.
//!
//! A sealed page is laid out as:
//!
//! ```text
//! nonce (12 bytes) || AES-256-GCM ciphertext || tag (16 bytes)
//! ```
//!
//! A fresh random nonce is drawn for every call, so sealing the same plaintext
//! twice yields different bytes.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use rand::RngCore;
use tracing::{instrument, trace};

use super::{CryptoError, PageKey};

pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;
/// Bytes added to every plaintext by [`encrypt_page`].
pub const PAGE_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

/// Size of the sealed blob for a plaintext of `plaintext_len` bytes.
pub const fn encrypted_size(plaintext_len: usize) -> usize {
    plaintext_len + PAGE_OVERHEAD
}

fn cipher(key: &PageKey) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.expose()))
}

/// Seal `plaintext` under `key`.
#[instrument(level = "trace", skip_all, fields(size = plaintext.len()))]
pub fn encrypt_page(plaintext: &[u8], key: &PageKey) -> Result<Vec<u8>, CryptoError> {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce);

    let ciphertext = cipher(key)
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    trace!(sealed_size = sealed.len(), "Page sealed");
    Ok(sealed)
}

/// Open a blob produced by [`encrypt_page`].
///
/// Returns [`CryptoError::Truncated`] for blobs shorter than nonce plus tag
/// and [`CryptoError::AuthenticationFailed`] when the tag does not verify.
#[instrument(level = "trace", skip_all, fields(size = sealed.len()))]
pub fn decrypt_page(sealed: &[u8], key: &PageKey) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < PAGE_OVERHEAD {
        return Err(CryptoError::Truncated {
            expected: PAGE_OVERHEAD,
            actual: sealed.len(),
        });
    }

    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
    cipher(key)
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let key = PageKey::random();
        let sealed = encrypt_page(b"hello world", &key).unwrap();
        assert_eq!(sealed.len(), encrypted_size(11));
        assert_eq!(decrypt_page(&sealed, &key).unwrap(), b"hello world");
    }

    #[test]
    fn test_empty_plaintext() {
        let key = PageKey::random();
        let sealed = encrypt_page(b"", &key).unwrap();
        assert_eq!(sealed.len(), PAGE_OVERHEAD);
        assert!(decrypt_page(&sealed, &key).unwrap().is_empty());
    }

    #[test]
    fn test_nonce_is_fresh_per_call() {
        let key = PageKey::random();
        let a = encrypt_page(b"same", &key).unwrap();
        let b = encrypt_page(b"same", &key).unwrap();
        assert_ne!(a[..NONCE_SIZE], b[..NONCE_SIZE]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let sealed = encrypt_page(b"secret", &PageKey::random()).unwrap();
        let err = decrypt_page(&sealed, &PageKey::random()).unwrap_err();
        assert!(err.is_authentication_failure());
    }

    #[test]
    fn test_tampered_ciphertext_fails_authentication() {
        let key = PageKey::random();
        let mut sealed = encrypt_page(b"secret", &key).unwrap();
        sealed[NONCE_SIZE] ^= 0x01;
        assert!(matches!(
            decrypt_page(&sealed, &key),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_tampered_tag_fails_authentication() {
        let key = PageKey::random();
        let mut sealed = encrypt_page(b"secret", &key).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x80;
        assert!(decrypt_page(&sealed, &key).unwrap_err().is_authentication_failure());
    }

    #[test]
    fn test_truncated_input() {
        let key = PageKey::random();
        let err = decrypt_page(&[0u8; PAGE_OVERHEAD - 1], &key).unwrap_err();
        assert!(matches!(
            err,
            CryptoError::Truncated { expected: PAGE_OVERHEAD, actual } if actual == PAGE_OVERHEAD - 1
        ));
    }
}
