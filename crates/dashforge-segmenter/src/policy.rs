//! Per-codec behaviour plugged into a [`TrackSegmenter`](crate::TrackSegmenter).
//!
//! A policy frames payloads into sample bytes and derives the configuration
//! record an init segment needs. The segmenter owns timing and buffering.

use std::fmt;

use bytes::{BufMut, BytesMut};
use dashforge_mux::codec::{self, aac, avc::nal, AdtsHeader};
use dashforge_mux::{Codec, TrackConfig};

use crate::frame::{Frame, TrackKind};
use crate::{Error, Result};

/// DASH video time base (ticks per second).
pub const VIDEO_TIME_BASE: u32 = 12800;

/// Audio time base used until the stream says otherwise.
pub const DEFAULT_AUDIO_SAMPLE_RATE: u32 = 48000;

/// What a policy learned while framing one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameInfo {
    /// The framed bytes belong to a sync sample.
    pub keyframe: bool,
    /// Samples per channel (audio only).
    pub samples: u32,
    /// Sample rate the samples are counted at (audio only).
    pub sample_rate: u32,
}

/// Codec-specific half of a track segmenter.
pub trait CodecPolicy: Send + fmt::Debug {
    fn kind(&self) -> TrackKind;

    /// Ticks per second of the track.
    fn time_base(&self) -> u32;

    /// Append the sample bytes carried by `frame` to `out`.
    fn frame_payload(&mut self, frame: &Frame, out: &mut BytesMut) -> Result<FrameInfo>;

    /// Configuration record derived from the frames framed so far.
    fn config(&self) -> Option<Vec<u8>>;

    /// Track description for the init segment.
    fn track_config(&self, config: &[u8], bitrate: u32) -> TrackConfig;

    /// RFC 6381 codec string for a configuration record.
    fn codec_string(&self, config: &[u8]) -> String;
}

/// H.264 in Annex-B, repackaged as 4-byte length-prefixed NAL units.
#[derive(Debug)]
pub struct H264Policy {
    time_base: u32,
    sps: Option<Vec<u8>>,
    pps: Option<Vec<u8>>,
    width: u32,
    height: u32,
}

impl H264Policy {
    pub fn new() -> Self {
        Self::with_time_base(VIDEO_TIME_BASE)
    }

    pub fn with_time_base(time_base: u32) -> Self {
        Self {
            time_base,
            sps: None,
            pps: None,
            width: 0,
            height: 0,
        }
    }
}

impl Default for H264Policy {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecPolicy for H264Policy {
    fn kind(&self) -> TrackKind {
        TrackKind::Video
    }

    fn time_base(&self) -> u32 {
        self.time_base
    }

    fn frame_payload(&mut self, frame: &Frame, out: &mut BytesMut) -> Result<FrameInfo> {
        let Frame::Video(video) = frame else {
            return Err(Error::TrackKindMismatch {
                expected: TrackKind::Video,
                got: frame.kind(),
            });
        };

        if video.width > 0 && video.height > 0 {
            self.width = video.width;
            self.height = video.height;
        }

        let mut info = FrameInfo::default();
        for unit in codec::split_annexb(&video.payload) {
            match codec::nal_type(unit) {
                Some(nal::SPS) => self.sps = Some(unit.to_vec()),
                Some(nal::PPS) => self.pps = Some(unit.to_vec()),
                Some(nal::AUD) | None => {}
                Some(kind) => {
                    if kind == nal::IDR {
                        info.keyframe = true;
                    }
                    out.put_u32(unit.len() as u32);
                    out.put_slice(unit);
                }
            }
        }
        Ok(info)
    }

    fn config(&self) -> Option<Vec<u8>> {
        let (sps, pps) = (self.sps.as_ref()?, self.pps.as_ref()?);
        match codec::build_avcc(sps, pps) {
            Ok(avcc) => Some(avcc),
            Err(e) => {
                tracing::debug!(error = %e, "parameter sets not usable yet");
                None
            }
        }
    }

    fn track_config(&self, config: &[u8], _bitrate: u32) -> TrackConfig {
        TrackConfig {
            timescale: self.time_base,
            codec: Codec::Avc,
            width: self.width,
            height: self.height,
            sample_rate: 0,
            channels: 0,
            codec_private: config.to_vec(),
        }
    }

    fn codec_string(&self, config: &[u8]) -> String {
        codec::avc_codec_string(config).unwrap_or_else(|| "avc1".to_string())
    }
}

/// AAC, raw or ADTS-wrapped. ADTS headers are stripped from samples.
#[derive(Debug)]
pub struct AacPolicy {
    time_base: u32,
    asc: Option<[u8; 2]>,
    sample_rate: u32,
    channels: u16,
}

impl AacPolicy {
    /// Policy whose time base is `sample_rate`.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            time_base: sample_rate,
            asc: None,
            sample_rate,
            channels: 0,
        }
    }
}

impl Default for AacPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIO_SAMPLE_RATE)
    }
}

impl CodecPolicy for AacPolicy {
    fn kind(&self) -> TrackKind {
        TrackKind::Audio
    }

    fn time_base(&self) -> u32 {
        self.time_base
    }

    fn frame_payload(&mut self, frame: &Frame, out: &mut BytesMut) -> Result<FrameInfo> {
        let Frame::Audio(audio) = frame else {
            return Err(Error::TrackKindMismatch {
                expected: TrackKind::Audio,
                got: frame.kind(),
            });
        };

        let payload = &audio.payload[..];
        if AdtsHeader::is_adts(payload) {
            let header = AdtsHeader::parse(payload)?;
            let end = header.frame_len.min(payload.len());
            out.put_slice(&payload[header.header_len..end]);

            self.asc = Some(header.audio_specific_config());
            self.sample_rate = header.sample_rate();
            self.channels = header.channel_config as u16;
            return Ok(FrameInfo {
                keyframe: true,
                samples: audio.samples,
                sample_rate: header.sample_rate(),
            });
        }

        out.put_slice(payload);
        if self.asc.is_none() {
            self.asc = Some(aac::lc_audio_specific_config(audio.sample_rate, audio.channels)?);
        }
        self.sample_rate = audio.sample_rate;
        self.channels = audio.channels;
        Ok(FrameInfo {
            keyframe: true,
            samples: audio.samples,
            sample_rate: audio.sample_rate,
        })
    }

    fn config(&self) -> Option<Vec<u8>> {
        self.asc.map(|asc| asc.to_vec())
    }

    fn track_config(&self, config: &[u8], bitrate: u32) -> TrackConfig {
        TrackConfig {
            timescale: self.time_base,
            codec: Codec::Aac,
            width: 0,
            height: 0,
            sample_rate: self.sample_rate,
            channels: self.channels,
            codec_private: codec::build_esds(config, bitrate),
        }
    }

    fn codec_string(&self, config: &[u8]) -> String {
        format!("mp4a.40.{}", aac::object_type(config).unwrap_or(2))
    }
}
