//! Error types for the segmentation engine.
//!
//! "Not ready yet" is never an error: operations that can legitimately have
//! nothing to do return `Ok(false)`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::frame::{ReaderId, TrackKind};

/// Result type for segmentation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for segmentation operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A frame of the wrong track kind was handed to a segmenter.
    #[error("Track kind mismatch: segmenter handles {expected} frames, got {got}")]
    TrackKindMismatch { expected: TrackKind, got: TrackKind },

    /// No segmenter is registered for the reader.
    #[error("Unknown reader: {0}")]
    UnknownReader(ReaderId),

    /// A segmenter is already registered for the reader.
    #[error("Segmenter already registered for reader {0}")]
    DuplicateReader(ReaderId),

    /// The timestamp offset was already fixed by frame data.
    #[error("Timestamp offset already set")]
    OffsetAlreadySet,

    /// The segmenter no longer accepts frames.
    #[error("Segmenter is closed")]
    Closed,

    /// A segment would exceed the configured maximum size.
    #[error("Segment buffer capacity exceeded: need {needed} bytes, max {max}")]
    CapacityExceeded { needed: usize, max: usize },

    /// Writing a segment to disk failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Frame payload could not be framed by the codec policy.
    #[error(transparent)]
    Codec(#[from] dashforge_mux::Error),

    /// Configuration is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an I/O error bound to a path.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Caller bugs: surfaced immediately and never retried.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::TrackKindMismatch { .. }
                | Error::UnknownReader(_)
                | Error::DuplicateReader(_)
                | Error::OffsetAlreadySet
                | Error::Closed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::TrackKindMismatch {
            expected: TrackKind::Audio,
            got: TrackKind::Video,
        };
        assert_eq!(
            err.to_string(),
            "Track kind mismatch: segmenter handles audio frames, got video"
        );

        let err = Error::CapacityExceeded { needed: 10, max: 4 };
        assert_eq!(
            err.to_string(),
            "Segment buffer capacity exceeded: need 10 bytes, max 4"
        );

        let err = Error::io("/tmp/x.m4a", io::Error::other("disk full"));
        assert_eq!(err.to_string(), "I/O error on /tmp/x.m4a: disk full");
    }

    #[test]
    fn test_contract_violation_classification() {
        assert!(Error::UnknownReader(3).is_contract_violation());
        assert!(Error::Closed.is_contract_violation());
        assert!(!Error::CapacityExceeded { needed: 1, max: 0 }.is_contract_violation());
        assert!(!Error::invalid_config("x").is_contract_violation());
    }
}
