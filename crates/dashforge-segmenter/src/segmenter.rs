//! Per-track segmentation.
//!
//! A [`TrackSegmenter`] accumulates the samples of one representation,
//! assigns them decode times on a gapless theoretical timeline, and cuts
//! media segments once the target duration is reached. Codec specifics are
//! delegated to a [`CodecPolicy`].

use std::time::{Duration, SystemTime};

use bytes::BytesMut;
use dashforge_mux::{write_init_segment, write_media_segment, SampleMeta, TrackConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::buffer::SegmentBuffer;
use crate::frame::{Frame, TrackKind};
use crate::policy::{AacPolicy, CodecPolicy, H264Policy};
use crate::timebase::{duration_to_ticks, samples_to_ticks};
use crate::{Error, Result};

/// Frame rate assumed for video until real timestamps say otherwise.
const DEFAULT_VIDEO_FPS: u32 = 25;

/// moof overhead reserved per segment and per sample when checking capacity.
const SEGMENT_OVERHEAD: usize = 256;
const SAMPLE_OVERHEAD: usize = 16;

/// Lifecycle of a [`TrackSegmenter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmenterState {
    /// No usable frame seen yet.
    Uninitialized,
    /// Receiving frames, configuration not final.
    Configuring,
    /// Configuration final, no init segment produced yet.
    Ready,
    /// Init segment produced; media segments are being cut.
    Segmenting,
    /// Flushing the last partial segment.
    Finishing,
    /// Terminal.
    Closed,
}

/// Video access unit still receiving data.
#[derive(Debug)]
struct OpenAccessUnit {
    pts: u64,
    data: BytesMut,
    keyframe: bool,
    declared: Option<u64>,
}

/// Segmenter for one representation.
#[derive(Debug)]
pub struct TrackSegmenter {
    policy: Box<dyn CodecPolicy>,
    state: SegmenterState,
    segment_duration: Duration,
    time_base: u32,
    seg_dur_ticks: u64,
    offset: Option<SystemTime>,
    frame_duration: u64,
    theoretical_pts: u64,
    bitrate: u32,

    config: Option<Vec<u8>>,
    config_epoch: u64,
    init_epoch: Option<u64>,

    payload: BytesMut,
    samples: Vec<SampleMeta>,
    segment_start: u64,
    accumulated: u64,
    open_au: Option<OpenAccessUnit>,
    max_segment_size: usize,

    next_seq: u64,
    media: SegmentBuffer,
    init: SegmentBuffer,
}

impl TrackSegmenter {
    /// Create a segmenter around a codec policy.
    pub fn new(policy: Box<dyn CodecPolicy>, segment_duration: Duration, max_segment_size: usize) -> Self {
        let time_base = policy.time_base();
        let frame_duration = match policy.kind() {
            TrackKind::Video => (time_base / DEFAULT_VIDEO_FPS) as u64,
            TrackKind::Audio => 0,
        };

        Self {
            policy,
            state: SegmenterState::Uninitialized,
            segment_duration,
            time_base,
            seg_dur_ticks: duration_to_ticks(segment_duration, time_base),
            offset: None,
            frame_duration,
            theoretical_pts: 0,
            bitrate: 0,
            config: None,
            config_epoch: 0,
            init_epoch: None,
            payload: BytesMut::new(),
            samples: Vec::new(),
            segment_start: 0,
            accumulated: 0,
            open_au: None,
            max_segment_size,
            next_seq: 0,
            media: SegmentBuffer::new(max_segment_size),
            init: SegmentBuffer::new(max_segment_size),
        }
    }

    /// H.264 segmenter in the DASH video time base.
    pub fn h264(segment_duration: Duration, max_segment_size: usize) -> Self {
        Self::new(Box::new(H264Policy::new()), segment_duration, max_segment_size)
    }

    /// AAC segmenter whose time base is `sample_rate`.
    pub fn aac(sample_rate: u32, segment_duration: Duration, max_segment_size: usize) -> Self {
        Self::new(Box::new(AacPolicy::new(sample_rate)), segment_duration, max_segment_size)
    }

    /// Feed one frame.
    ///
    /// Returns whether the frame starts a new logical frame (always for
    /// audio, the access-unit-start flag for video). Frames without usable
    /// timing or payload are acknowledged and otherwise ignored.
    pub fn manage_frame(&mut self, frame: &Frame) -> Result<bool> {
        if matches!(self.state, SegmenterState::Finishing | SegmenterState::Closed) {
            return Err(Error::Closed);
        }
        let kind = self.policy.kind();
        if frame.kind() != kind {
            return Err(Error::TrackKindMismatch {
                expected: kind,
                got: frame.kind(),
            });
        }

        let new_frame = match frame {
            Frame::Video(v) => v.access_unit_start,
            Frame::Audio(_) => true,
        };
        if !frame.is_usable() {
            trace!(kind = %kind, "frame not usable yet");
            return Ok(new_frame);
        }

        let mut framed = BytesMut::new();
        let info = self.policy.frame_payload(frame, &mut framed)?;

        let offset = *self.offset.get_or_insert(frame.pts());
        if self.state == SegmenterState::Uninitialized {
            self.state = SegmenterState::Configuring;
        }
        let ts = frame
            .pts()
            .duration_since(offset)
            .map(|d| duration_to_ticks(d, self.time_base))
            .unwrap_or(0);

        match frame {
            Frame::Audio(_) => {
                let duration = samples_to_ticks(info.samples as u64, info.sample_rate, self.time_base);
                self.frame_duration = duration;
                self.resync(ts);
                if let Err(e) = self.check_capacity(framed.len()) {
                    self.theoretical_pts += duration;
                    self.abandon();
                    return Err(e);
                }
                self.push_sample(
                    &framed,
                    SampleMeta {
                        size: framed.len() as u32,
                        duration: duration as u32,
                        is_keyframe: true,
                        composition_offset: 0,
                    },
                );
            }
            Frame::Video(video) if !new_frame && self.open_au.is_some() => {
                if let Err(e) = self.check_capacity(framed.len()) {
                    self.open_au = None;
                    self.abandon();
                    return Err(e);
                }
                if let Some(au) = self.open_au.as_mut() {
                    au.data.extend_from_slice(&framed);
                    au.keyframe |= info.keyframe;
                    trace!(bytes = video.payload.len(), "access unit continued");
                }
            }
            Frame::Video(video) => {
                if let Some(prev) = self.open_au.take() {
                    let measured = ts.saturating_sub(prev.pts);
                    let duration = if measured > 0 {
                        self.frame_duration = measured;
                        measured
                    } else {
                        prev.declared.unwrap_or(self.frame_duration)
                    };
                    self.commit_access_unit(prev, duration)?;
                }

                let declared = video
                    .duration
                    .map(|d| duration_to_ticks(d, self.time_base))
                    .filter(|d| *d > 0);
                if let Some(d) = declared {
                    self.frame_duration = d;
                }
                self.resync(ts);
                self.open_au = Some(OpenAccessUnit {
                    pts: ts,
                    data: framed,
                    keyframe: info.keyframe,
                    declared,
                });
            }
        }

        Ok(new_frame)
    }

    /// Re-derive the configuration from the frames seen so far.
    ///
    /// Returns false while no configuration is available. A configuration
    /// that differs from the current one starts a new epoch, which needs its
    /// own init segment.
    pub fn update_config(&mut self) -> bool {
        if matches!(
            self.state,
            SegmenterState::Uninitialized | SegmenterState::Finishing | SegmenterState::Closed
        ) {
            return false;
        }
        let Some(config) = self.policy.config() else {
            return false;
        };

        if self.config.as_deref() != Some(config.as_slice()) {
            if self.config.is_some() {
                self.config_epoch += 1;
                info!(kind = %self.kind(), epoch = self.config_epoch, "configuration changed");
            }
            self.config = Some(config);
        }
        if self.state == SegmenterState::Configuring {
            self.state = SegmenterState::Ready;
        }
        true
    }

    /// Mux the init segment for the current configuration epoch.
    ///
    /// Returns true once per epoch.
    pub fn generate_init_segment(&mut self) -> Result<bool> {
        if !matches!(self.state, SegmenterState::Ready | SegmenterState::Segmenting) {
            return Ok(false);
        }
        if self.init_epoch == Some(self.config_epoch) || self.init.has_data() {
            return Ok(false);
        }
        let Some(track) = self.track_config() else {
            return Ok(false);
        };

        let bytes = write_init_segment(&track);
        self.init.clear();
        self.init.append(&bytes)?;
        self.init.set_seq_number(self.config_epoch);

        self.init_epoch = Some(self.config_epoch);
        self.state = SegmenterState::Segmenting;
        debug!(kind = %self.kind(), epoch = self.config_epoch, bytes = bytes.len(), "init segment ready");
        Ok(true)
    }

    /// Cut a media segment if the target duration has been reached.
    pub fn generate_segment(&mut self) -> Result<bool> {
        if !matches!(self.state, SegmenterState::Ready | SegmenterState::Segmenting) {
            return Ok(false);
        }
        if self.init_epoch != Some(self.config_epoch) || self.media.has_data() {
            return Ok(false);
        }
        if self.samples.is_empty() || self.accumulated < self.seg_dur_ticks {
            return Ok(false);
        }
        if self.kind() == TrackKind::Video && !self.open_au.as_ref().is_some_and(|au| au.keyframe) {
            return Ok(false);
        }

        self.emit()?;
        Ok(true)
    }

    /// Flush whatever is accumulated into a last segment and close.
    ///
    /// Returns false when there is nothing to emit, or when the previous
    /// segment is still waiting to be written (call again once it is).
    pub fn finish_segment(&mut self) -> Result<bool> {
        match self.state {
            SegmenterState::Closed => return Ok(false),
            SegmenterState::Uninitialized => {
                self.state = SegmenterState::Closed;
                return Ok(false);
            }
            _ => {}
        }
        self.state = SegmenterState::Finishing;

        if let Some(au) = self.open_au.take() {
            let duration = au.declared.unwrap_or(self.frame_duration);
            if let Err(e) = self.commit_access_unit(au, duration) {
                warn!(kind = %self.kind(), error = %e, "dropping last access unit");
            }
        }
        if self.media.has_data() {
            return Ok(false);
        }
        if self.samples.is_empty() || self.config.is_none() {
            self.abandon();
            self.state = SegmenterState::Closed;
            return Ok(false);
        }

        let result = self.emit();
        self.state = SegmenterState::Closed;
        result.map(|_| true)
    }

    /// Fix the timestamp origin before any frame does.
    pub fn set_offset(&mut self, offset: SystemTime) -> Result<()> {
        if self.state != SegmenterState::Uninitialized {
            return Err(Error::OffsetAlreadySet);
        }
        self.offset = Some(offset);
        Ok(())
    }

    pub fn state(&self) -> SegmenterState {
        self.state
    }

    pub fn kind(&self) -> TrackKind {
        self.policy.kind()
    }

    pub fn time_base(&self) -> u32 {
        self.time_base
    }

    pub fn frame_duration(&self) -> u64 {
        self.frame_duration
    }

    pub fn offset(&self) -> Option<SystemTime> {
        self.offset
    }

    pub fn segment_duration(&self) -> Duration {
        self.segment_duration
    }

    pub fn segment_duration_ticks(&self) -> u64 {
        self.seg_dur_ticks
    }

    /// Ticks accumulated towards the next segment.
    pub fn accumulated_ticks(&self) -> u64 {
        self.accumulated
    }

    /// Decode time the next sample will get.
    pub fn theoretical_pts(&self) -> u64 {
        self.theoretical_pts
    }

    pub fn bitrate(&self) -> u32 {
        self.bitrate
    }

    /// Average bitrate in bits per second, signalled in later init segments.
    pub fn set_bitrate(&mut self, bps: u32) {
        self.bitrate = bps;
    }

    pub fn config_epoch(&self) -> u64 {
        self.config_epoch
    }

    /// Segments muxed so far.
    pub fn segments_emitted(&self) -> u64 {
        self.next_seq
    }

    pub fn codec_string(&self) -> Option<String> {
        self.config.as_deref().map(|c| self.policy.codec_string(c))
    }

    /// Track description for the current configuration.
    pub fn track_config(&self) -> Option<TrackConfig> {
        self.config
            .as_deref()
            .map(|c| self.policy.track_config(c, self.bitrate))
    }

    pub fn media_segment(&self) -> &SegmentBuffer {
        &self.media
    }

    pub fn media_segment_mut(&mut self) -> &mut SegmentBuffer {
        &mut self.media
    }

    pub fn init_segment(&self) -> &SegmentBuffer {
        &self.init
    }

    pub fn init_segment_mut(&mut self) -> &mut SegmentBuffer {
        &mut self.init
    }

    /// Absorb drift between real and theoretical time.
    ///
    /// Gaps longer than one frame move the timeline forward: at a segment
    /// start the segment simply starts later, mid-segment the last sample is
    /// stretched. Overlaps keep the theoretical timeline.
    fn resync(&mut self, ts: u64) {
        if ts.abs_diff(self.theoretical_pts) <= self.frame_duration {
            return;
        }
        if ts < self.theoretical_pts {
            trace!(kind = %self.kind(), ts, theoretical = self.theoretical_pts, "overlapping timestamp");
            return;
        }

        let gap = ts - self.theoretical_pts;
        debug!(kind = %self.kind(), ts, theoretical = self.theoretical_pts, gap, "resynchronising timeline");
        if let Some(last) = self.samples.last_mut() {
            last.duration = last.duration.saturating_add(gap as u32);
            self.accumulated += gap;
        }
        self.theoretical_pts = ts;
    }

    fn check_capacity(&self, extra: usize) -> Result<()> {
        let open = self.open_au.as_ref().map_or(0, |au| au.data.len());
        let needed = self.payload.len()
            + open
            + extra
            + SEGMENT_OVERHEAD
            + SAMPLE_OVERHEAD * (self.samples.len() + 1);
        if needed > self.max_segment_size {
            return Err(Error::CapacityExceeded {
                needed,
                max: self.max_segment_size,
            });
        }
        Ok(())
    }

    fn push_sample(&mut self, data: &[u8], meta: SampleMeta) {
        if self.samples.is_empty() {
            self.segment_start = self.theoretical_pts;
        }
        self.payload.extend_from_slice(data);
        self.samples.push(meta);
        self.accumulated += meta.duration as u64;
        self.theoretical_pts += meta.duration as u64;
    }

    fn commit_access_unit(&mut self, au: OpenAccessUnit, duration: u64) -> Result<()> {
        if au.data.is_empty() {
            if let Some(last) = self.samples.last_mut() {
                last.duration = last.duration.saturating_add(duration as u32);
                self.accumulated += duration;
            }
            self.theoretical_pts += duration;
            return Ok(());
        }
        // A segment must open on a sync sample.
        if self.samples.is_empty() && !au.keyframe {
            trace!(kind = %self.kind(), pts = au.pts, "access unit before keyframe dropped");
            self.theoretical_pts += duration;
            return Ok(());
        }

        let needed = self.payload.len()
            + au.data.len()
            + SEGMENT_OVERHEAD
            + SAMPLE_OVERHEAD * (self.samples.len() + 1);
        if needed > self.max_segment_size {
            self.theoretical_pts += duration;
            self.abandon();
            return Err(Error::CapacityExceeded {
                needed,
                max: self.max_segment_size,
            });
        }

        self.push_sample(
            &au.data,
            SampleMeta {
                size: au.data.len() as u32,
                duration: duration as u32,
                is_keyframe: au.keyframe,
                composition_offset: 0,
            },
        );
        Ok(())
    }

    /// Drop the current accumulation. The theoretical timeline keeps the
    /// time the dropped samples covered.
    fn abandon(&mut self) {
        if !self.samples.is_empty() {
            warn!(
                kind = %self.kind(),
                samples = self.samples.len(),
                ticks = self.accumulated,
                "abandoning accumulated samples"
            );
        }
        self.payload.clear();
        self.samples.clear();
        self.accumulated = 0;
    }

    fn emit(&mut self) -> Result<()> {
        let seq = self.next_seq;
        let bytes = write_media_segment((seq + 1) as u32, self.segment_start, &self.samples, &self.payload);

        self.media.clear();
        if let Err(e) = self.media.append(&bytes) {
            self.media.clear();
            self.abandon();
            return Err(e);
        }
        self.media.set_seq_number(seq);
        self.media.set_timestamp(self.segment_start);
        self.media.set_duration(self.accumulated);

        debug!(
            kind = %self.kind(),
            seq,
            timestamp = self.segment_start,
            duration = self.accumulated,
            samples = self.samples.len(),
            bytes = bytes.len(),
            "segment ready"
        );

        self.next_seq += 1;
        self.payload.clear();
        self.samples.clear();
        self.accumulated = 0;
        Ok(())
    }
}
