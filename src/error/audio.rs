// Audio error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Single source of truth for the numeric codes reported to the engine
/// and to host diagnostics.
///
/// Error code range: 1001-1008
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// fillBuffer/getBuffer called without an active session
    pub const NOT_INITIALIZED: i32 = 1001;

    /// Sample rate, channel count or buffer size rejected
    pub const INVALID_FORMAT: i32 = 1002;

    /// No output device available on this host
    pub const DEVICE_UNAVAILABLE: i32 = 1003;

    /// Failed to open audio stream
    pub const STREAM_OPEN_FAILED: i32 = 1004;

    /// Stream stopped or disconnected while writing
    pub const STREAM_FAILURE: i32 = 1005;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 1006;

    /// JNI initialization failed on Android
    pub const JNI_INIT_FAILED: i32 = 1007;

    /// Android context was not initialized before the device was opened
    pub const CONTEXT_NOT_INITIALIZED: i32 = 1008;
}

/// Log an audio error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=AudioBridge, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio-related errors
///
/// These errors cover device session management and the blocking
/// buffer-fill contract.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// No session is active (initAudio not called, or torn down)
    NotInitialized,

    /// Requested PCM format cannot be played
    InvalidFormat { reason: String },

    /// No output device on this host
    DeviceUnavailable { details: String },

    /// Failed to open audio stream
    StreamOpenFailed { reason: String },

    /// Stream failed while the engine was writing into it
    StreamFailure { reason: String },

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },

    /// JNI initialization failed on Android
    JniInitFailed { reason: String },

    /// Android context was not initialized before the device was opened
    ContextNotInitialized,
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::NotInitialized => AudioErrorCodes::NOT_INITIALIZED,
            AudioError::InvalidFormat { .. } => AudioErrorCodes::INVALID_FORMAT,
            AudioError::DeviceUnavailable { .. } => AudioErrorCodes::DEVICE_UNAVAILABLE,
            AudioError::StreamOpenFailed { .. } => AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioError::StreamFailure { .. } => AudioErrorCodes::STREAM_FAILURE,
            AudioError::LockPoisoned { .. } => AudioErrorCodes::LOCK_POISONED,
            AudioError::JniInitFailed { .. } => AudioErrorCodes::JNI_INIT_FAILED,
            AudioError::ContextNotInitialized => AudioErrorCodes::CONTEXT_NOT_INITIALIZED,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::NotInitialized => {
                "Audio session not initialized. Call initAudio() first.".to_string()
            }
            AudioError::InvalidFormat { reason } => format!("Invalid audio format: {}", reason),
            AudioError::DeviceUnavailable { details } => {
                format!("Audio device unavailable: {}", details)
            }
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            AudioError::StreamFailure { reason } => format!("Audio stream failed: {}", reason),
            AudioError::LockPoisoned { component } => format!("Lock poisoned on {}", component),
            AudioError::JniInitFailed { reason } => {
                format!("JNI initialization failed: {}", reason)
            }
            AudioError::ContextNotInitialized => {
                "Android context not initialized. JNI_OnLoad must run first.".to_string()
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::StreamFailure {
            reason: err.to_string(),
        }
    }
}
