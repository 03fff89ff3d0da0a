//! Error types for vox-speech
//!
//! Defines engine-specific error types using thiserror for clear error
//! propagation.

use thiserror::Error;

/// Main error type for the speech engine
#[derive(Error, Debug)]
pub enum Error {
    /// Audio chunk decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Sample rate conversion errors
    #[error("Resample error: {0}")]
    Resample(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    Output(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Convenience Result type using vox-speech Error
pub type Result<T> = std::result::Result<T, Error>;
