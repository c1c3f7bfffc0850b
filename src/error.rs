//! Error types for the audio playback layer
//!
//! Native failures are split in two: an invalid handle is a recoverable
//! condition handled inside the players (the channel silently becomes
//! stopped), everything else surfaces as [`AudioError::Backend`] carrying
//! the native error code.

use crate::backend::NativeError;

/// The main error type for sedulous-audio operations
#[derive(thiserror::Error, Debug)]
pub enum AudioError {
    /// A native backend call failed with an unexpected error code
    #[error("Audio backend error {code}: {source}")]
    Backend {
        /// Native error code reported by the backend
        code: i32,
        /// The native error
        source: NativeError,
    },

    /// The operation is not valid in the player's current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A value lies outside its permitted range
    #[error("{name} out of range: {value} (expected {min}..={max})")]
    OutOfRange {
        /// Name of the offending parameter
        name: &'static str,
        /// Value that was supplied
        value: f64,
        /// Lower bound
        min: f64,
        /// Upper bound
        max: f64,
    },

    /// An argument, or a combination of arguments, is invalid
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The audio resource has already been disposed
    #[error("Audio resource has been disposed")]
    Disposed,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Audio data could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Audio output device error
    #[error("Audio device error: {0}")]
    Device(String),

    /// IO error from filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed configuration document
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl AudioError {
    /// Creates an invalid operation error
    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        AudioError::InvalidOperation(reason.into())
    }

    /// Creates an invalid argument error
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        AudioError::InvalidArgument(reason.into())
    }

    /// Creates a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        AudioError::Config(reason.into())
    }

    /// Native error code, if this error came from the backend
    pub fn native_code(&self) -> Option<i32> {
        match self {
            AudioError::Backend { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<NativeError> for AudioError {
    fn from(source: NativeError) -> Self {
        AudioError::Backend {
            code: source.code(),
            source,
        }
    }
}

impl From<String> for AudioError {
    fn from(s: String) -> Self {
        AudioError::Other(s)
    }
}

impl From<&str> for AudioError {
    fn from(s: &str) -> Self {
        AudioError::Other(s.to_string())
    }
}

/// Result type for audio operations
pub type Result<T> = std::result::Result<T, AudioError>;
