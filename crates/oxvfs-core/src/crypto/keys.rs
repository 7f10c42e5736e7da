//! Password-based key derivation.
//!
//! The page key is derived with scrypt from the NFC-normalized password and a
//! random salt. The salt and cost parameters are stored in plaintext in the
//! store's config blob so the same key can be re-derived on open.

use std::fmt;

use rand::RngCore;
use secrecy::{ExposeSecret, SecretBox};
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use tracing::{debug, instrument};
use unicode_normalization::UnicodeNormalization;
use zeroize::Zeroizing;

use super::CryptoError;

/// AES-256 key length.
pub const KEY_SIZE: usize = 32;

pub const DEFAULT_SALT_LENGTH: usize = 16;
const DEFAULT_SCRYPT_COST_PARAM_LOG2: u8 = 15; // 2^15 = 32768
const DEFAULT_SCRYPT_BLOCK_SIZE: u32 = 8;
const DEFAULT_SCRYPT_PARALLELIZATION: u32 = 1;

/// Fast scrypt cost parameter for testing (N = 2^10 = 1024).
///
/// Enable by setting the `OXVFS_FAST_KDF` environment variable to `1`.
const FAST_SCRYPT_COST_PARAM_LOG2: u8 = 10;

/// Check if fast KDF mode is enabled via environment variable.
///
/// When `OXVFS_FAST_KDF=1` is set, newly initialized stores use N=1024
/// instead of N=32768. Existing stores keep whatever parameters they were
/// created with.
///
/// **WARNING**: This is for testing only. Never use in production!
#[inline]
pub fn is_fast_kdf_enabled() -> bool {
    std::env::var("OXVFS_FAST_KDF")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// The 256-bit key used to seal every page.
///
/// Held in a [`SecretBox`] so the bytes are zeroized on drop and never show up
/// in `Debug` output.
pub struct PageKey(SecretBox<[u8; KEY_SIZE]>);

impl PageKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(SecretBox::new(Box::new(bytes)))
    }

    /// A fresh random key. Useful when the codec is exercised without a
    /// password.
    pub fn random() -> Self {
        let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
        rand::rng().fill_bytes(&mut bytes[..]);
        Self::from_bytes(*bytes)
    }

    pub(crate) fn expose(&self) -> &[u8; KEY_SIZE] {
        self.0.expose_secret()
    }
}

impl fmt::Debug for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PageKey([REDACTED])")
    }
}

/// Salt and scrypt cost parameters.
///
/// Serialized into the plaintext config blob as
/// `{"salt": "<base64>", "log2_n": 15, "r": 8, "p": 1}`.
#[serde_as]
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    #[serde_as(as = "Base64")]
    pub salt: Vec<u8>,
    pub log2_n: u8,
    pub r: u32,
    pub p: u32,
}

impl KdfParams {
    /// Fresh salt with production cost, or the fast cost when
    /// `OXVFS_FAST_KDF=1` is set.
    pub fn generate() -> Self {
        let log2_n = if is_fast_kdf_enabled() {
            FAST_SCRYPT_COST_PARAM_LOG2
        } else {
            DEFAULT_SCRYPT_COST_PARAM_LOG2
        };
        Self::with_cost(log2_n, DEFAULT_SCRYPT_BLOCK_SIZE, DEFAULT_SCRYPT_PARALLELIZATION)
    }

    /// Fresh salt with the cheap testing cost (N = 2^10).
    pub fn fast() -> Self {
        Self::with_cost(
            FAST_SCRYPT_COST_PARAM_LOG2,
            DEFAULT_SCRYPT_BLOCK_SIZE,
            DEFAULT_SCRYPT_PARALLELIZATION,
        )
    }

    pub fn with_cost(log2_n: u8, r: u32, p: u32) -> Self {
        let mut salt = vec![0u8; DEFAULT_SALT_LENGTH];
        rand::rng().fill_bytes(&mut salt);
        Self { salt, log2_n, r, p }
    }

    /// Derive the page key for `password`.
    ///
    /// The password is NFC-normalized first so that visually identical
    /// passwords typed on different platforms produce the same key.
    #[instrument(level = "debug", skip(self, password), fields(log2_n = self.log2_n, r = self.r, p = self.p))]
    pub fn derive(&self, password: &str) -> Result<PageKey, CryptoError> {
        let normalized = Zeroizing::new(password.nfc().collect::<String>());

        let params = scrypt::Params::new(self.log2_n, self.r, self.p, KEY_SIZE).map_err(|e| {
            CryptoError::InvalidKdfParams(format!(
                "N=2^{}, r={}, p={}: {}",
                self.log2_n, self.r, self.p, e
            ))
        })?;

        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        scrypt::scrypt(normalized.as_bytes(), &self.salt, &params, &mut key[..])
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

        debug!("Page key derived");
        Ok(PageKey::from_bytes(*key))
    }
}

impl fmt::Debug for KdfParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KdfParams")
            .field("salt", &hex::encode(&self.salt))
            .field("log2_n", &self.log2_n)
            .field("r", &self.r)
            .field("p", &self.p)
            .finish()
    }
}
