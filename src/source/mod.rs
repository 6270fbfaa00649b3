//! Elementary stream readers used by `dashforge package`.
//!
//! Raw streams carry no container timing; they are cut into access units
//! and AAC frames here and timestamped by the packager.

mod adts;
mod annexb;

pub use adts::{split_adts, AacFrame};
pub use annexb::{split_access_units, AccessUnit};

use std::path::{Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;

/// Result type for stream readers.
pub type Result<T> = std::result::Result<T, SourceError>;

/// Error type for stream readers.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The stream file could not be read.
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The stream holds nothing the reader recognizes.
    #[error("No {kind} frames found in {}", .path.display())]
    Empty { kind: &'static str, path: PathBuf },
}

fn read_stream(path: &Path) -> Result<Bytes> {
    std::fs::read(path)
        .map(Bytes::from)
        .map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Read an H.264 Annex-B file into access units.
pub fn read_annexb(path: &Path) -> Result<Vec<AccessUnit>> {
    let units = split_access_units(&read_stream(path)?);
    if units.is_empty() {
        return Err(SourceError::Empty {
            kind: "H.264",
            path: path.to_path_buf(),
        });
    }
    tracing::debug!(path = %path.display(), access_units = units.len(), "video stream read");
    Ok(units)
}

/// Read an ADTS file into AAC frames.
pub fn read_adts(path: &Path) -> Result<Vec<AacFrame>> {
    let frames = split_adts(&read_stream(path)?);
    if frames.is_empty() {
        return Err(SourceError::Empty {
            kind: "AAC",
            path: path.to_path_buf(),
        });
    }
    tracing::debug!(path = %path.display(), frames = frames.len(), "audio stream read");
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_matches!(
            read_adts(&dir.path().join("none.aac")),
            Err(SourceError::Io { .. })
        );
    }

    #[test]
    fn test_garbage_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.aac");
        std::fs::write(&path, [0x12u8; 64]).unwrap();
        assert_matches!(read_adts(&path), Err(SourceError::Empty { kind: "AAC", .. }));
    }
}
