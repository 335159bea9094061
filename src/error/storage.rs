// Storage error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Storage error code constants
///
/// Error code range: 3001-3004
pub struct StorageErrorCodes {}

impl StorageErrorCodes {
    /// Unrecognized scheme or malformed path
    pub const RESOLUTION: i32 = 3001;

    /// Storage-provider query failed
    pub const PERMISSION: i32 = 3002;

    /// Descriptor open/create/delete failed
    pub const IO: i32 = 3003;

    /// Grant cannot be honoured on this host version
    pub const STRUCTURAL: i32 = 3004;
}

/// Log a storage error with structured context
pub fn log_storage_error(err: &StorageError, context: &str) {
    error!(
        "Storage error in {}: code={}, component=Storage, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Storage-related errors
///
/// Only `Structural` is ever surfaced to a caller as a hard failure; every
/// other variant is logged and mapped to `-1`/`false` at the native boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    /// Virtual path could not be mapped to a locator
    Resolution { path: String, reason: String },

    /// Metadata provider query failed
    Permission { target: String, reason: String },

    /// Open, create or delete failed
    Io { target: String, reason: String },

    /// Content-scheme grant requested on a host without persisted tree permissions
    Structural { reason: String },
}

impl StorageError {
    pub fn resolution(path: impl Into<String>, reason: impl Into<String>) -> Self {
        StorageError::Resolution {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn permission(target: impl fmt::Display, reason: impl fmt::Display) -> Self {
        StorageError::Permission {
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn io(target: impl fmt::Display, reason: impl fmt::Display) -> Self {
        StorageError::Io {
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl ErrorCode for StorageError {
    fn code(&self) -> i32 {
        match self {
            StorageError::Resolution { .. } => StorageErrorCodes::RESOLUTION,
            StorageError::Permission { .. } => StorageErrorCodes::PERMISSION,
            StorageError::Io { .. } => StorageErrorCodes::IO,
            StorageError::Structural { .. } => StorageErrorCodes::STRUCTURAL,
        }
    }

    fn message(&self) -> String {
        match self {
            StorageError::Resolution { path, reason } => {
                format!("Cannot resolve '{}': {}", path, reason)
            }
            StorageError::Permission { target, reason } => {
                format!("Provider query failed for {}: {}", target, reason)
            }
            StorageError::Io { target, reason } => format!("I/O failed on {}: {}", target, reason),
            StorageError::Structural { reason } => format!("Unsupported grant: {}", reason),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for StorageError {}
