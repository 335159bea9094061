// Bridge lifecycle errors

use crate::error::{ErrorCode, StorageError};
use std::fmt;

/// Bridge error code constants
///
/// Error code range: 4001-4003
pub struct BridgeErrorCodes {}

impl BridgeErrorCodes {
    /// A bridge is already registered for this process
    pub const ALREADY_ACTIVE: i32 = 4001;

    /// Construction failed while setting up storage
    pub const STORAGE: i32 = 4002;

    /// No bridge is registered
    pub const NOT_ACTIVE: i32 = 4003;
}

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// Only one bridge may be active at a time
    AlreadyActive,

    /// Game root could not be turned into a grant
    Storage(StorageError),

    /// Native call arrived with no registered bridge
    NotActive,
}

impl ErrorCode for BridgeError {
    fn code(&self) -> i32 {
        match self {
            BridgeError::AlreadyActive => BridgeErrorCodes::ALREADY_ACTIVE,
            BridgeError::Storage(_) => BridgeErrorCodes::STORAGE,
            BridgeError::NotActive => BridgeErrorCodes::NOT_ACTIVE,
        }
    }

    fn message(&self) -> String {
        match self {
            BridgeError::AlreadyActive => {
                "A bridge is already active. Tear it down before creating another.".to_string()
            }
            BridgeError::Storage(err) => err.message(),
            BridgeError::NotActive => "No active bridge registered".to_string(),
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BridgeError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BridgeError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StorageError> for BridgeError {
    fn from(err: StorageError) -> Self {
        BridgeError::Storage(err)
    }
}
