//! Live DASH segmentation engine.
//!
//! Frames from a live pipeline go in, fragmented MP4 init and media
//! segments come out on disk:
//!
//! - [`TrackSegmenter`] turns one track's frames into segments, with codec
//!   specifics supplied by a [`CodecPolicy`] ([`H264Policy`], [`AacPolicy`]).
//! - [`SegmentationManager`] owns a set of segmenters keyed by reader id,
//!   keeps their timelines aligned on a shared origin, and writes their
//!   output atomically, reporting each file to a [`ManifestSink`].
//!
//! # Example
//!
//! ```no_run
//! use std::time::SystemTime;
//! use dashforge_segmenter::{AudioFrame, DasherConfig, NullManifest, SegmentationManager, TrackKind};
//!
//! let mut manager = SegmentationManager::new(DasherConfig::default(), Box::new(NullManifest))?;
//! manager.add_segmenter(1, TrackKind::Audio)?;
//!
//! let frame = AudioFrame::new(SystemTime::now(), vec![0x21, 0x10], 1024, 48000, 2);
//! let report = manager.process_cycle([(1, frame.into())])?;
//! println!("{} segments written", report.segments.len());
//! manager.finish_all()?;
//! # Ok::<(), dashforge_segmenter::Error>(())
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod frame;
pub mod manager;
pub mod manifest;
pub mod naming;
pub mod policy;
pub mod segmenter;
pub mod timebase;

pub use buffer::SegmentBuffer;
pub use config::DasherConfig;
pub use error::{Error, Result};
pub use frame::{AudioFrame, Frame, ReaderId, TrackKind, VideoFrame};
pub use manager::{
    CycleReport, ManagerState, RepresentationState, SegmentationManager, SharedTimeline, WrittenSegment,
};
pub use manifest::{
    ManifestEvent, ManifestSink, NullManifest, RecordingManifest, RepresentationInfo, SegmentRecord,
};
pub use naming::{init_segment_name, segment_name};
pub use policy::{AacPolicy, CodecPolicy, FrameInfo, H264Policy};
pub use segmenter::{SegmenterState, TrackSegmenter};
