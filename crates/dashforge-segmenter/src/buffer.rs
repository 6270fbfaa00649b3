//! Segment buffers.

use std::io::Write;
use std::path::Path;

use bytes::BytesMut;
use tempfile::NamedTempFile;

use crate::{Error, Result};

/// Initial allocation; buffers grow up to their maximum on demand.
const INITIAL_CAPACITY: usize = 256 * 1024;

/// One init or media segment pending (or ready for) a disk write.
///
/// Sequence number, timestamp and duration are metadata staged by the owning
/// segmenter; timestamp and duration are in that segmenter's time base.
#[derive(Debug)]
pub struct SegmentBuffer {
    data: BytesMut,
    max_size: usize,
    seq_number: u64,
    timestamp: u64,
    duration: u64,
}

impl SegmentBuffer {
    /// Create an empty buffer holding at most `max_size` bytes.
    pub fn new(max_size: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(max_size.min(INITIAL_CAPACITY)),
            max_size,
            seq_number: 0,
            timestamp: 0,
            duration: 0,
        }
    }

    /// Append bytes, failing without modification if the maximum would be
    /// exceeded.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        let needed = self.data.len() + bytes.len();
        if needed > self.max_size {
            return Err(Error::CapacityExceeded {
                needed,
                max: self.max_size,
            });
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Write `[0, len)` to `path`.
    ///
    /// The bytes go to a temporary file in the destination directory which is
    /// then renamed over `path`, so readers never observe a partial segment.
    /// The buffer is left untouched, whatever the outcome.
    pub fn write_to_disk(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::io(path, e))?;
        tmp.write_all(&self.data).map_err(|e| Error::io(path, e))?;
        tmp.as_file().sync_data().map_err(|e| Error::io(path, e))?;
        tmp.persist(path).map_err(|e| Error::io(path, e.error))?;

        tracing::trace!(path = %path.display(), bytes = self.data.len(), "segment written");
        Ok(())
    }

    /// Reset to the pristine state, keeping the allocation.
    pub fn clear(&mut self) {
        self.data.clear();
        self.seq_number = 0;
        self.timestamp = 0;
        self.duration = 0;
    }

    /// True only in the pristine state, not merely after draining.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.seq_number == 0 && self.timestamp == 0
    }

    /// Whether the buffer holds bytes waiting to be written.
    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn seq_number(&self) -> u64 {
        self.seq_number
    }

    pub fn set_seq_number(&mut self, seq: u64) {
        self.seq_number = seq;
    }

    pub fn incr_seq_number(&mut self) {
        self.seq_number += 1;
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, ts: u64) {
        self.timestamp = ts;
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn set_duration(&mut self, duration: u64) {
        self.duration = duration;
    }
}
