//! Frame generators shared by the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashforge_mux::codec::build_adts_header;
use dashforge_segmenter::{
    AudioFrame, DasherConfig, Frame, ManifestSink, ReaderId, SegmentationManager, VideoFrame,
};

pub const SPS: [u8; 6] = [0x67, 0x42, 0xC0, 0x1E, 0xDA, 0x02];
pub const PPS: [u8; 4] = [0x68, 0xCE, 0x3C, 0x80];

/// Spacing of 1024-sample frames at 48 kHz, truncated to microseconds.
pub const AUDIO_STEP_US: u64 = 21333;
pub const VIDEO_STEP_MS: u64 = 40;
pub const GOP: u64 = 25;

pub fn origin() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

pub fn audio_pts(n: u64) -> SystemTime {
    origin() + Duration::from_micros(AUDIO_STEP_US * n)
}

/// Raw AAC frame `n` at 48 kHz stereo.
pub fn audio_frame(n: u64) -> Frame {
    AudioFrame::new(audio_pts(n), vec![0x21, 0x10, n as u8, 0x00], 1024, 48000, 2).into()
}

/// ADTS-wrapped AAC frame `n` at the given rate.
pub fn adts_frame(n: u64, sample_rate: u32) -> Frame {
    let body = [0x21, 0x10, n as u8];
    let mut payload = build_adts_header(sample_rate, 2, body.len()).unwrap().to_vec();
    payload.extend_from_slice(&body);
    AudioFrame::new(audio_pts(n), payload, 1024, sample_rate, 2).into()
}

/// H.264 access unit `n`; every `GOP`th one is an IDR with parameter sets.
pub fn video_frame(n: u64) -> Frame {
    let pts = origin() + Duration::from_millis(VIDEO_STEP_MS * n);
    let mut payload = Vec::new();
    if n % GOP == 0 {
        for unit in [&[0x09, 0xF0][..], &SPS[..], &PPS[..], &[0x65, 0x88, 0x84, n as u8][..]] {
            payload.extend_from_slice(&[0, 0, 0, 1]);
            payload.extend_from_slice(unit);
        }
    } else {
        payload.extend_from_slice(&[0, 0, 0, 1, 0x41, 0x9A, n as u8]);
    }
    VideoFrame::new(pts, payload).with_dimensions(640, 360).into()
}

/// Frames of one 40 ms pipeline cycle: video frame `n` and every audio frame
/// whose timestamp falls before the end of the cycle.
pub fn av_cycle(n: u64, video: ReaderId, audio: ReaderId) -> Vec<(ReaderId, Frame)> {
    let end_us = (n + 1) * VIDEO_STEP_MS * 1000;
    let mut frames = vec![(video, video_frame(n))];
    let mut k = (n * VIDEO_STEP_MS * 1000).div_ceil(AUDIO_STEP_US);
    while k * AUDIO_STEP_US < end_us {
        frames.push((audio, audio_frame(k)));
        k += 1;
    }
    frames
}

pub fn config(dir: &Path) -> DasherConfig {
    DasherConfig {
        output_dir: dir.to_path_buf(),
        base_name: "live".to_string(),
        ..Default::default()
    }
}

pub fn manager(dir: &Path, sink: impl ManifestSink + 'static) -> SegmentationManager {
    SegmentationManager::new(config(dir), Box::new(sink)).unwrap()
}
