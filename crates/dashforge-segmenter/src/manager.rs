//! The segmentation manager.
//!
//! Owns one [`TrackSegmenter`] per registered reader, the timeline shared by
//! all of them, and the disk side: every segment a segmenter produces is
//! written here and reported to the [`ManifestSink`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::DasherConfig;
use crate::frame::{Frame, ReaderId, TrackKind};
use crate::manifest::{ManifestSink, RepresentationInfo, SegmentRecord};
use crate::naming::{init_segment_name, segment_name};
use crate::policy::{AacPolicy, CodecPolicy, H264Policy};
use crate::segmenter::{SegmenterState, TrackSegmenter};
use crate::timebase::ticks_to_millis;
use crate::{Error, Result};

/// State shared by every segmenter of one manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SharedTimeline {
    /// Timestamp every representation's timeline starts from.
    pub origin: Option<SystemTime>,
    /// A video media segment has been written.
    pub video_started: bool,
}

/// A media segment written during a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenSegment {
    pub reader: ReaderId,
    pub kind: TrackKind,
    pub path: PathBuf,
    pub seq: u64,
    pub timestamp_ms: u64,
    /// Duration in the representation's time base.
    pub duration: u64,
    pub time_base: u32,
    pub size: usize,
}

/// Outcome of one [`SegmentationManager::process_cycle`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub frames_accepted: usize,
    pub frames_skipped: usize,
    pub init_segments: Vec<PathBuf>,
    pub segments: Vec<WrittenSegment>,
    /// Writes that failed; their buffers are retried next cycle.
    pub failed_writes: Vec<PathBuf>,
    /// Readers whose accumulation was abandoned for exceeding capacity.
    pub dropped: Vec<ReaderId>,
}

/// Per-representation snapshot in [`ManagerState`].
#[derive(Debug, Clone, Serialize)]
pub struct RepresentationState {
    pub id: ReaderId,
    pub kind: TrackKind,
    pub state: SegmenterState,
    pub codec: Option<String>,
    pub time_base: u32,
    pub bitrate: u32,
    pub segments_written: u64,
    pub bytes_written: u64,
    pub last_timestamp_ms: Option<u64>,
}

/// Serializable view of the manager.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerState {
    pub output_dir: PathBuf,
    pub base_name: String,
    /// Global origin in microseconds since the Unix epoch.
    pub origin_unix_micros: Option<u64>,
    pub has_video: bool,
    pub video_started: bool,
    pub representations: Vec<RepresentationState>,
}

#[derive(Debug)]
struct Representation {
    segmenter: TrackSegmenter,
    init_path: Option<PathBuf>,
    segments_written: u64,
    bytes_written: u64,
    last_timestamp_ms: Option<u64>,
}

impl Representation {
    fn new(segmenter: TrackSegmenter) -> Self {
        Self {
            segmenter,
            init_path: None,
            segments_written: 0,
            bytes_written: 0,
            last_timestamp_ms: None,
        }
    }

    fn info(&self, id: ReaderId) -> RepresentationInfo {
        let seg = &self.segmenter;
        let track = seg.track_config();
        RepresentationInfo {
            id,
            kind: seg.kind(),
            codec: seg.codec_string(),
            bandwidth: seg.bitrate(),
            time_base: seg.time_base(),
            width: track.as_ref().map_or(0, |t| t.width),
            height: track.as_ref().map_or(0, |t| t.height),
            sample_rate: track.as_ref().map_or(0, |t| t.sample_rate),
            channels: track.as_ref().map_or(0, |t| t.channels),
            init_path: self.init_path.clone(),
        }
    }
}

/// Drives every registered segmenter and writes what they produce.
pub struct SegmentationManager {
    config: DasherConfig,
    segmenters: BTreeMap<ReaderId, Representation>,
    timeline: Arc<Mutex<SharedTimeline>>,
    has_video: bool,
    manifest: Box<dyn ManifestSink>,
}

impl std::fmt::Debug for SegmentationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentationManager")
            .field("config", &self.config)
            .field("segmenters", &self.segmenters.keys().collect::<Vec<_>>())
            .field("has_video", &self.has_video)
            .finish_non_exhaustive()
    }
}

impl SegmentationManager {
    /// Validate `config` and create its output directory.
    pub fn new(config: DasherConfig, manifest: Box<dyn ManifestSink>) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.output_dir).map_err(|e| Error::io(&config.output_dir, e))?;

        info!(
            output_dir = %config.output_dir.display(),
            segment_duration = config.segment_duration_secs,
            "segmentation manager ready"
        );
        Ok(Self {
            config,
            segmenters: BTreeMap::new(),
            timeline: Arc::new(Mutex::new(SharedTimeline::default())),
            has_video: false,
            manifest,
        })
    }

    pub fn config(&self) -> &DasherConfig {
        &self.config
    }

    /// Register a segmenter with the default policy for `kind`.
    pub fn add_segmenter(&mut self, id: ReaderId, kind: TrackKind) -> Result<()> {
        let policy: Box<dyn CodecPolicy> = match kind {
            TrackKind::Video => Box::new(H264Policy::with_time_base(self.config.video_time_base)),
            TrackKind::Audio => Box::new(AacPolicy::new(self.config.audio_sample_rate)),
        };
        self.add_segmenter_with_policy(id, policy)
    }

    /// Register a segmenter around a specific codec policy.
    pub fn add_segmenter_with_policy(&mut self, id: ReaderId, policy: Box<dyn CodecPolicy>) -> Result<()> {
        if self.segmenters.contains_key(&id) {
            return Err(Error::DuplicateReader(id));
        }

        let segmenter = TrackSegmenter::new(
            policy,
            self.config.segment_duration(),
            self.config.max_segment_size,
        );
        let kind = segmenter.kind();
        let rep = Representation::new(segmenter);
        self.manifest.representation_added(&rep.info(id));
        self.segmenters.insert(id, rep);

        if kind == TrackKind::Video {
            self.has_video = true;
        }
        info!(reader = id, kind = %kind, "segmenter registered");
        Ok(())
    }

    /// Flush and unregister a segmenter.
    ///
    /// Pending buffers are written, the open segment is finished regardless
    /// of its duration, and the final segment (if any) is returned.
    pub fn remove_segmenter(&mut self, id: ReaderId) -> Result<Option<WrittenSegment>> {
        let rep = self.segmenters.get_mut(&id).ok_or(Error::UnknownReader(id))?;
        let manifest = self.manifest.as_mut();

        if rep.segmenter.init_segment().has_data() {
            write_init(&self.config, manifest, id, rep)?;
        }
        if rep.segmenter.media_segment().has_data() {
            write_media(&self.config, manifest, &self.timeline, id, rep)?;
        }
        rep.segmenter.update_config();
        if rep.segmenter.generate_init_segment()? {
            write_init(&self.config, manifest, id, rep)?;
        }

        let last = if rep.segmenter.finish_segment()? {
            Some(write_media(&self.config, manifest, &self.timeline, id, rep)?)
        } else {
            None
        };

        if let Some(rep) = self.segmenters.remove(&id) {
            info!(
                reader = id,
                kind = %rep.segmenter.kind(),
                segments = rep.segments_written,
                "segmenter removed"
            );
        }
        self.manifest.representation_removed(id);

        self.has_video = self
            .segmenters
            .values()
            .any(|r| r.segmenter.kind() == TrackKind::Video);
        if !self.has_video {
            self.timeline.lock().video_started = false;
        }
        Ok(last)
    }

    /// Remove every segmenter, flushing each.
    ///
    /// Every segmenter is removed even if one fails; the first error is
    /// returned.
    pub fn finish_all(&mut self) -> Result<Vec<WrittenSegment>> {
        let ids: Vec<ReaderId> = self.segmenters.keys().copied().collect();
        let mut written = Vec::new();
        let mut first_err = None;

        for id in ids {
            match self.remove_segmenter(id) {
                Ok(Some(seg)) => written.push(seg),
                Ok(None) => {}
                Err(e) => {
                    warn!(reader = id, error = %e, "flush on removal failed");
                    self.segmenters.remove(&id);
                    first_err.get_or_insert(e);
                }
            }
        }
        self.has_video = false;
        self.timeline.lock().video_started = false;

        match first_err {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }

    /// Set a representation's average bitrate in kbit/s.
    pub fn set_bitrate(&mut self, id: ReaderId, kbps: u32) -> Result<()> {
        let rep = self.segmenters.get_mut(&id).ok_or(Error::UnknownReader(id))?;
        rep.segmenter.set_bitrate(kbps.saturating_mul(1000));
        self.manifest.representation_updated(&rep.info(id));
        Ok(())
    }

    /// Whether a segmenter of `kind` may cut segments right now.
    ///
    /// While a video representation exists but has not written its first
    /// segment, audio keeps accumulating so both start together.
    pub fn may_emit(&self, kind: TrackKind) -> bool {
        may_emit(kind, self.has_video, self.timeline.lock().video_started)
    }

    pub fn timeline(&self) -> SharedTimeline {
        *self.timeline.lock()
    }

    pub fn has_video(&self) -> bool {
        self.has_video
    }

    pub fn segmenter(&self, id: ReaderId) -> Option<&TrackSegmenter> {
        self.segmenters.get(&id).map(|r| &r.segmenter)
    }

    pub fn readers(&self) -> Vec<ReaderId> {
        self.segmenters.keys().copied().collect()
    }

    /// Feed one cycle's frames.
    ///
    /// Video frames are handled before audio, readers in id order, frames of
    /// one reader in arrival order. Contract violations abort the cycle;
    /// capacity and disk failures are reported and the cycle goes on.
    pub fn process_cycle<I>(&mut self, frames: I) -> Result<CycleReport>
    where
        I: IntoIterator<Item = (ReaderId, Frame)>,
    {
        let mut report = CycleReport::default();
        self.retry_pending(&mut report)?;

        let mut frames: Vec<(ReaderId, Frame)> = frames.into_iter().collect();
        frames.sort_by_key(|(id, frame)| (frame.kind(), *id));

        for (id, frame) in &frames {
            self.process_frame(*id, frame, &mut report)?;
        }
        Ok(report)
    }

    pub fn state(&self) -> ManagerState {
        let timeline = *self.timeline.lock();
        ManagerState {
            output_dir: self.config.output_dir.clone(),
            base_name: self.config.base_name.clone(),
            origin_unix_micros: timeline
                .origin
                .and_then(|o| o.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_micros() as u64),
            has_video: self.has_video,
            video_started: timeline.video_started,
            representations: self
                .segmenters
                .iter()
                .map(|(&id, rep)| RepresentationState {
                    id,
                    kind: rep.segmenter.kind(),
                    state: rep.segmenter.state(),
                    codec: rep.segmenter.codec_string(),
                    time_base: rep.segmenter.time_base(),
                    bitrate: rep.segmenter.bitrate(),
                    segments_written: rep.segments_written,
                    bytes_written: rep.bytes_written,
                    last_timestamp_ms: rep.last_timestamp_ms,
                })
                .collect(),
        }
    }

    fn process_frame(&mut self, id: ReaderId, frame: &Frame, report: &mut CycleReport) -> Result<()> {
        let Some(rep) = self.segmenters.get_mut(&id) else {
            debug!(reader = id, "frame for unknown reader skipped");
            report.frames_skipped += 1;
            return Ok(());
        };
        let manifest = self.manifest.as_mut();

        let origin = self.timeline.lock().origin;
        if rep.segmenter.state() == SegmenterState::Uninitialized {
            if let Some(origin) = origin {
                rep.segmenter.set_offset(origin)?;
            }
        }

        match rep.segmenter.manage_frame(frame) {
            Ok(_) => report.frames_accepted += 1,
            Err(e) if e.is_contract_violation() => return Err(e),
            Err(e @ Error::CapacityExceeded { .. }) => {
                warn!(reader = id, error = %e, "segment accumulation abandoned");
                report.dropped.push(id);
                return Ok(());
            }
            Err(e @ Error::Codec(_)) => {
                warn!(reader = id, error = %e, "frame skipped");
                report.frames_skipped += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        if origin.is_none() {
            if let Some(offset) = rep.segmenter.offset() {
                self.timeline.lock().origin = Some(offset);
                debug!(reader = id, "global origin fixed");
            }
        }

        if !rep.segmenter.update_config() {
            return Ok(());
        }

        match rep.segmenter.generate_init_segment() {
            Ok(true) => match write_init(&self.config, manifest, id, rep) {
                Ok(path) => report.init_segments.push(path),
                Err(e) => record_failure(id, e, report)?,
            },
            Ok(false) => {}
            Err(e) => record_failure(id, e, report)?,
        }

        // media must not overtake its init segment
        if rep.segmenter.init_segment().has_data() {
            return Ok(());
        }
        let video_started = self.timeline.lock().video_started;
        if !may_emit(rep.segmenter.kind(), self.has_video, video_started) {
            return Ok(());
        }
        match rep.segmenter.generate_segment() {
            Ok(true) => match write_media(&self.config, manifest, &self.timeline, id, rep) {
                Ok(seg) => report.segments.push(seg),
                Err(e) => record_failure(id, e, report)?,
            },
            Ok(false) => {}
            Err(e) => record_failure(id, e, report)?,
        }
        Ok(())
    }

    /// Write buffers left over from failed writes, oldest first.
    fn retry_pending(&mut self, report: &mut CycleReport) -> Result<()> {
        let manifest = self.manifest.as_mut();
        for (&id, rep) in self.segmenters.iter_mut() {
            if rep.segmenter.init_segment().has_data() {
                match write_init(&self.config, manifest, id, rep) {
                    Ok(path) => report.init_segments.push(path),
                    Err(e) => {
                        // media must not overtake its init segment
                        record_failure(id, e, report)?;
                        continue;
                    }
                }
            }
            if rep.segmenter.media_segment().has_data() {
                match write_media(&self.config, manifest, &self.timeline, id, rep) {
                    Ok(seg) => report.segments.push(seg),
                    Err(e) => record_failure(id, e, report)?,
                }
            }
        }
        Ok(())
    }
}

fn may_emit(kind: TrackKind, has_video: bool, video_started: bool) -> bool {
    kind == TrackKind::Video || !has_video || video_started
}

/// Record a recoverable failure in the report; anything else is returned.
fn record_failure(id: ReaderId, err: Error, report: &mut CycleReport) -> Result<()> {
    match err {
        Error::Io { path, source } => {
            warn!(reader = id, path = %path.display(), error = %source, "segment write failed, will retry");
            report.failed_writes.push(path);
            Ok(())
        }
        e @ Error::CapacityExceeded { .. } => {
            warn!(reader = id, error = %e, "segment dropped");
            report.dropped.push(id);
            Ok(())
        }
        e => Err(e),
    }
}

fn output_dir(config: &DasherConfig) -> String {
    config.output_dir.to_string_lossy().into_owned()
}

fn write_init(
    config: &DasherConfig,
    manifest: &mut dyn ManifestSink,
    id: ReaderId,
    rep: &mut Representation,
) -> Result<PathBuf> {
    let kind = rep.segmenter.kind();
    let path = PathBuf::from(init_segment_name(
        &output_dir(config),
        &config.base_name,
        id,
        kind.init_extension(),
    ));

    rep.segmenter.init_segment().write_to_disk(&path)?;
    rep.segmenter.init_segment_mut().clear();
    rep.init_path = Some(path.clone());

    info!(reader = id, kind = %kind, path = %path.display(), "init segment written");
    manifest.representation_updated(&rep.info(id));
    Ok(path)
}

fn write_media(
    config: &DasherConfig,
    manifest: &mut dyn ManifestSink,
    timeline: &Mutex<SharedTimeline>,
    id: ReaderId,
    rep: &mut Representation,
) -> Result<WrittenSegment> {
    let seg = &rep.segmenter;
    let kind = seg.kind();
    let media = seg.media_segment();

    let origin = timeline.lock().origin;
    let shift_ms = match (seg.offset(), origin) {
        (Some(offset), Some(origin)) => offset
            .duration_since(origin)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0),
        _ => 0,
    };
    let timestamp_ms = ticks_to_millis(media.timestamp(), seg.time_base()) + shift_ms;
    let path = PathBuf::from(segment_name(
        &output_dir(config),
        &config.base_name,
        id,
        timestamp_ms,
        kind.extension(),
    ));

    media.write_to_disk(Path::new(&path))?;

    let written = WrittenSegment {
        reader: id,
        kind,
        path: path.clone(),
        seq: media.seq_number(),
        timestamp_ms,
        duration: media.duration(),
        time_base: seg.time_base(),
        size: media.len(),
    };
    let record = SegmentRecord {
        path,
        seq: written.seq,
        timestamp: media.timestamp(),
        duration: written.duration,
        time_base: written.time_base,
        timestamp_ms,
    };

    rep.segmenter.media_segment_mut().clear();
    rep.segments_written += 1;
    rep.bytes_written += written.size as u64;
    rep.last_timestamp_ms = Some(timestamp_ms);
    if kind == TrackKind::Video {
        timeline.lock().video_started = true;
    }

    debug!(
        reader = id,
        kind = %kind,
        seq = written.seq,
        timestamp_ms,
        path = %written.path.display(),
        "segment written"
    );
    manifest.segment_written(id, &record);
    Ok(written)
}
