//! Frames delivered by the pipeline.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Pipeline handle of one input track; doubles as the representation id.
pub type ReaderId = u32;

/// Kind of track a segmenter packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

impl TrackKind {
    /// Media segment file extension.
    pub fn extension(self) -> &'static str {
        match self {
            TrackKind::Video => ".m4v",
            TrackKind::Audio => ".m4a",
        }
    }

    /// Init segment file suffix.
    pub fn init_extension(self) -> &'static str {
        match self {
            TrackKind::Video => "_init.m4v",
            TrackKind::Audio => "_init.m4a",
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Video => f.write_str("video"),
            TrackKind::Audio => f.write_str("audio"),
        }
    }
}

/// A chunk of H.264 Annex-B data.
///
/// One access unit may be delivered across several frames; only the first
/// carries `access_unit_start`.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Presentation time (wall clock, microsecond resolution).
    pub pts: SystemTime,
    pub payload: Bytes,
    pub access_unit_start: bool,
    pub width: u32,
    pub height: u32,
    /// Declared frame duration, if the source knows it.
    pub duration: Option<Duration>,
}

impl VideoFrame {
    pub fn new(pts: SystemTime, payload: impl Into<Bytes>) -> Self {
        Self {
            pts,
            payload: payload.into(),
            access_unit_start: true,
            width: 0,
            height: 0,
            duration: None,
        }
    }

    /// Mark this frame as continuing the current access unit.
    pub fn continuation(mut self) -> Self {
        self.access_unit_start = false;
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// One AAC frame, raw or ADTS-wrapped.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Presentation time (wall clock, microsecond resolution).
    pub pts: SystemTime,
    pub payload: Bytes,
    /// Samples per channel carried by the frame.
    pub samples: u32,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFrame {
    pub fn new(pts: SystemTime, payload: impl Into<Bytes>, samples: u32, sample_rate: u32, channels: u16) -> Self {
        Self {
            pts,
            payload: payload.into(),
            samples,
            sample_rate,
            channels,
        }
    }
}

/// A frame for either track kind.
#[derive(Debug, Clone)]
pub enum Frame {
    Video(VideoFrame),
    Audio(AudioFrame),
}

impl Frame {
    pub fn kind(&self) -> TrackKind {
        match self {
            Frame::Video(_) => TrackKind::Video,
            Frame::Audio(_) => TrackKind::Audio,
        }
    }

    pub fn pts(&self) -> SystemTime {
        match self {
            Frame::Video(v) => v.pts,
            Frame::Audio(a) => a.pts,
        }
    }

    pub fn payload(&self) -> &Bytes {
        match self {
            Frame::Video(v) => &v.payload,
            Frame::Audio(a) => &a.payload,
        }
    }

    /// Frames with an epoch-zero timestamp, an empty payload or (for audio)
    /// no samples carry no usable timing and are not accumulated.
    pub fn is_usable(&self) -> bool {
        if self.pts() == UNIX_EPOCH || self.payload().is_empty() {
            return false;
        }
        match self {
            Frame::Audio(a) => a.samples > 0,
            Frame::Video(_) => true,
        }
    }
}

impl From<VideoFrame> for Frame {
    fn from(frame: VideoFrame) -> Self {
        Frame::Video(frame)
    }
}

impl From<AudioFrame> for Frame {
    fn from(frame: AudioFrame) -> Self {
        Frame::Audio(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usability() {
        let now = SystemTime::now();
        assert!(Frame::from(AudioFrame::new(now, vec![1, 2], 1024, 48000, 2)).is_usable());
        assert!(!Frame::from(AudioFrame::new(UNIX_EPOCH, vec![1, 2], 1024, 48000, 2)).is_usable());
        assert!(!Frame::from(AudioFrame::new(now, vec![1, 2], 0, 48000, 2)).is_usable());
        assert!(!Frame::from(VideoFrame::new(now, Vec::new())).is_usable());
        assert!(Frame::from(VideoFrame::new(now, vec![0x65])).is_usable());
    }

    #[test]
    fn test_extensions() {
        assert_eq!(TrackKind::Video.extension(), ".m4v");
        assert_eq!(TrackKind::Audio.init_extension(), "_init.m4a");
        assert_eq!(TrackKind::Audio.to_string(), "audio");
    }
}
