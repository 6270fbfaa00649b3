//! Hooks for whatever maintains the MPD.
//!
//! The engine reports representation changes and written segments through
//! a [`ManifestSink`]; it never builds a manifest itself.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::frame::{ReaderId, TrackKind};

/// Description of one representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepresentationInfo {
    pub id: ReaderId,
    pub kind: TrackKind,
    /// RFC 6381 codec string, once the configuration is known.
    pub codec: Option<String>,
    /// Bits per second.
    pub bandwidth: u32,
    pub time_base: u32,
    pub width: u32,
    pub height: u32,
    pub sample_rate: u32,
    pub channels: u16,
    pub init_path: Option<PathBuf>,
}

/// A media segment that reached the disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentRecord {
    pub path: PathBuf,
    pub seq: u64,
    /// Start in the representation's time base.
    pub timestamp: u64,
    pub duration: u64,
    pub time_base: u32,
    /// Start in milliseconds since the global origin.
    pub timestamp_ms: u64,
}

/// Receiver of representation and segment events.
pub trait ManifestSink: Send {
    fn representation_added(&mut self, _info: &RepresentationInfo) {}

    fn representation_updated(&mut self, _info: &RepresentationInfo) {}

    fn segment_written(&mut self, _id: ReaderId, _segment: &SegmentRecord) {}

    fn representation_removed(&mut self, _id: ReaderId) {}
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullManifest;

impl ManifestSink for NullManifest {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestEvent {
    Added(RepresentationInfo),
    Updated(RepresentationInfo),
    Segment(ReaderId, SegmentRecord),
    Removed(ReaderId),
}

/// Keeps every event, readable through a cloned handle.
#[derive(Debug, Clone, Default)]
pub struct RecordingManifest {
    events: Arc<Mutex<Vec<ManifestEvent>>>,
}

impl RecordingManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Another handle onto the same event log.
    pub fn handle(&self) -> Self {
        self.clone()
    }

    pub fn events(&self) -> Vec<ManifestEvent> {
        self.events.lock().clone()
    }

    /// Segments written for one representation, in order.
    pub fn segments(&self, id: ReaderId) -> Vec<SegmentRecord> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ManifestEvent::Segment(r, s) if *r == id => Some(s.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ManifestSink for RecordingManifest {
    fn representation_added(&mut self, info: &RepresentationInfo) {
        self.events.lock().push(ManifestEvent::Added(info.clone()));
    }

    fn representation_updated(&mut self, info: &RepresentationInfo) {
        self.events.lock().push(ManifestEvent::Updated(info.clone()));
    }

    fn segment_written(&mut self, id: ReaderId, segment: &SegmentRecord) {
        self.events.lock().push(ManifestEvent::Segment(id, segment.clone()));
    }

    fn representation_removed(&mut self, id: ReaderId) {
        self.events.lock().push(ManifestEvent::Removed(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_handles_share_log() {
        let recorder = RecordingManifest::new();
        let mut sink: Box<dyn ManifestSink> = Box::new(recorder.handle());

        sink.representation_removed(4);
        sink.segment_written(
            1,
            &SegmentRecord {
                path: PathBuf::from("/d/s_1_0.m4a"),
                seq: 0,
                timestamp: 0,
                duration: 96256,
                time_base: 48000,
                timestamp_ms: 0,
            },
        );

        assert_eq!(recorder.events().len(), 2);
        assert_eq!(recorder.segments(1).len(), 1);
        assert!(recorder.segments(4).is_empty());
    }
}
