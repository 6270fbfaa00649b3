//! Error types for dashforge-mux.

use thiserror::Error;

/// Result type for dashforge-mux operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for malformed codec data handed to the muxer.
#[derive(Debug, Error)]
pub enum Error {
    /// ADTS header could not be parsed.
    #[error("Invalid ADTS header: {0}")]
    InvalidAdts(String),

    /// NAL unit data is malformed.
    #[error("Invalid NAL unit: {0}")]
    InvalidNal(String),

    /// Sample rate has no MPEG-4 sampling frequency index.
    #[error("Unsupported sample rate: {0} Hz")]
    UnsupportedSampleRate(u32),

    /// Buffer too small for operation.
    #[error("Buffer underflow: need {need} bytes, have {have}")]
    BufferUnderflow { need: usize, have: usize },
}

impl Error {
    /// Create an invalid ADTS error.
    pub fn invalid_adts(msg: impl Into<String>) -> Self {
        Self::InvalidAdts(msg.into())
    }

    /// Create an invalid NAL error.
    pub fn invalid_nal(msg: impl Into<String>) -> Self {
        Self::InvalidNal(msg.into())
    }
}
