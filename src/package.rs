//! Offline driver: feeds elementary streams through the segmentation manager
//! as if they arrived live.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use dashforge_segmenter::{
    AudioFrame, CycleReport, Frame, ManagerState, NullManifest, ReaderId, SegmentationManager,
    TrackKind, VideoFrame, WrittenSegment,
};
use serde::Serialize;

use crate::config::Config;
use crate::source::{self, AacFrame, AccessUnit};

pub const VIDEO_READER: ReaderId = 1;
pub const AUDIO_READER: ReaderId = 2;

/// What a packaging run produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PackageSummary {
    pub video_frames: usize,
    pub audio_frames: usize,
    pub init_segments: Vec<PathBuf>,
    pub segments: Vec<WrittenSegment>,
    pub failed_writes: Vec<PathBuf>,
    pub dropped: usize,
    pub state: Option<ManagerState>,
}

impl PackageSummary {
    fn absorb(&mut self, report: CycleReport) {
        self.init_segments.extend(report.init_segments);
        self.segments.extend(report.segments);
        self.failed_writes.extend(report.failed_writes);
        self.dropped += report.dropped.len();
    }

    pub fn segments_of(&self, kind: TrackKind) -> impl Iterator<Item = &WrittenSegment> {
        self.segments.iter().filter(move |s| s.kind == kind)
    }
}

/// Timestamps synthesized for a stream without container timing.
struct Clock {
    start: SystemTime,
}

impl Clock {
    fn video_pts(&self, index: u64, fps: f64) -> SystemTime {
        self.start + Duration::from_secs_f64(index as f64 / fps)
    }

    fn audio_pts(&self, samples: u64, sample_rate: u32) -> SystemTime {
        let micros = samples * 1_000_000 / sample_rate.max(1) as u64;
        self.start + Duration::from_micros(micros)
    }
}

/// Segment the given streams with `config`.
pub fn package(config: &Config, video: Option<&Path>, audio: Option<&Path>) -> Result<PackageSummary> {
    if video.is_none() && audio.is_none() {
        anyhow::bail!("Nothing to package: pass --video and/or --audio");
    }

    let access_units = video
        .map(source::read_annexb)
        .transpose()
        .context("Failed to read video stream")?
        .unwrap_or_default();
    let aac_frames = audio
        .map(source::read_adts)
        .transpose()
        .context("Failed to read audio stream")?
        .unwrap_or_default();

    let mut manager = SegmentationManager::new(config.dasher.clone(), Box::new(NullManifest))
        .context("Failed to start segmentation")?;
    if !access_units.is_empty() {
        manager.add_segmenter(VIDEO_READER, TrackKind::Video)?;
        if config.package.video_bitrate_kbps > 0 {
            manager.set_bitrate(VIDEO_READER, config.package.video_bitrate_kbps)?;
        }
    }
    if !aac_frames.is_empty() {
        manager.add_segmenter(AUDIO_READER, TrackKind::Audio)?;
        if config.package.audio_bitrate_kbps > 0 {
            manager.set_bitrate(AUDIO_READER, config.package.audio_bitrate_kbps)?;
        }
    }

    let mut summary = PackageSummary {
        video_frames: access_units.len(),
        audio_frames: aac_frames.len(),
        ..Default::default()
    };
    let clock = Clock {
        start: SystemTime::now(),
    };

    for cycle in cycles(&clock, config, &access_units, &aac_frames) {
        let report = manager.process_cycle(cycle)?;
        if !report.failed_writes.is_empty() {
            tracing::warn!(count = report.failed_writes.len(), "segment writes failed, retrying");
        }
        summary.absorb(report);
    }

    summary.state = Some(manager.state());
    let last = manager.finish_all().context("Failed to flush final segments")?;
    summary.segments.extend(last);

    tracing::info!(
        init_segments = summary.init_segments.len(),
        segments = summary.segments.len(),
        output_dir = %config.dasher.output_dir.display(),
        "packaging complete"
    );
    Ok(summary)
}

/// Split both streams into pipeline cycles.
///
/// With video, each cycle carries one access unit plus the audio frames that
/// start before the next access unit. Audio alone runs one frame per cycle.
fn cycles(
    clock: &Clock,
    config: &Config,
    access_units: &[AccessUnit],
    aac_frames: &[AacFrame],
) -> Vec<Vec<(ReaderId, Frame)>> {
    let fps = config.package.fps;
    let frame_duration = Duration::from_secs_f64(1.0 / fps);

    let mut audio = aac_frames.iter().scan(0u64, |samples, frame| {
        let pts = clock.audio_pts(*samples, frame.sample_rate);
        *samples += frame.samples as u64;
        Some(AudioFrame::new(
            pts,
            frame.data.clone(),
            frame.samples,
            frame.sample_rate,
            frame.channels,
        ))
    });
    let mut pending_audio = audio.next();

    let mut cycles = Vec::with_capacity(access_units.len().max(aac_frames.len()));
    for (i, au) in access_units.iter().enumerate() {
        let pts = clock.video_pts(i as u64, fps);
        let frame = VideoFrame::new(pts, au.data.clone())
            .with_dimensions(config.package.width, config.package.height)
            .with_duration(frame_duration);
        let mut cycle = vec![(VIDEO_READER, Frame::from(frame))];

        let end = clock.video_pts(i as u64 + 1, fps);
        while pending_audio.as_ref().is_some_and(|f| f.pts < end) {
            if let Some(frame) = pending_audio.take() {
                cycle.push((AUDIO_READER, frame.into()));
            }
            pending_audio = audio.next();
        }
        cycles.push(cycle);
    }

    while let Some(frame) = pending_audio {
        cycles.push(vec![(AUDIO_READER, frame.into())]);
        pending_audio = audio.next();
    }
    cycles
}
