//! Exit codes for the CLI.
//!
//! Scripts can tell a wrong password from a missing path without parsing
//! stderr.

/// Successful execution
pub const SUCCESS: u8 = 0;

/// General/unspecified error
pub const GENERAL_ERROR: u8 = 1;

/// Authentication failed (wrong password)
pub const AUTH_FAILED: u8 = 3;

/// Store missing, uninitialized or corrupt
pub const STORE_INVALID: u8 = 4;

/// Permission denied (host filesystem or handle mode)
pub const PERMISSION_DENIED: u8 = 5;

/// File or directory not found (within the store)
pub const NOT_FOUND: u8 = 7;

/// Operation cancelled or interrupted
pub const CANCELLED: u8 = 8;

/// Target is held by another writer
pub const BUSY: u8 = 9;
