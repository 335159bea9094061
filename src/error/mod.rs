// Error types for the ONScripter host bridge
//
// This module defines custom error types for audio, storage and bridge
// lifecycle operations, providing structured error handling with error
// codes that can be reported across the native boundary.

mod audio;
mod bridge;
mod storage;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use bridge::{BridgeError, BridgeErrorCodes};
pub use storage::{log_storage_error, StorageError, StorageErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the FFI boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
