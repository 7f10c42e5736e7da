//! Error types for the oxvfs crate
//!
//! Each layer owns its error enum; this module gathers them in one place.

pub use crate::crypto::CryptoError;
pub use crate::store::{StoreError, StoreOp};
pub use crate::tree::TreeError;
pub use crate::vfs::VfsError;
