//! High-level fMP4 writers.
//!
//! [`write_init_segment`] and [`write_media_segment`] produce the exact bytes
//! of one DASH representation's init segment and media segments. Each
//! representation carries a single track.

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use super::boxes::{self, Codec, TrunEntry, SAMPLE_FLAGS_NON_SYNC, SAMPLE_FLAGS_SYNC};

/// Track ID used by every single-track representation.
pub const TRACK_ID: u32 = 1;

/// Configuration of the track described by an init segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackConfig {
    /// Media timescale (ticks per second).
    pub timescale: u32,
    /// Codec used by this track.
    pub codec: Codec,
    /// Video width in pixels (0 for audio tracks).
    pub width: u32,
    /// Video height in pixels (0 for audio tracks).
    pub height: u32,
    /// Audio sample rate in Hz (0 for video tracks).
    pub sample_rate: u32,
    /// Audio channel count (0 for video tracks).
    pub channels: u16,
    /// avcC record for video, esds content for audio.
    pub codec_private: Vec<u8>,
}

/// Timing and size of one sample in a media segment.
///
/// The sample bytes themselves live in the payload passed alongside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleMeta {
    /// Size in bytes within the payload.
    pub size: u32,
    /// Duration in timescale units.
    pub duration: u32,
    /// Sync sample.
    pub is_keyframe: bool,
    /// Composition time offset (signed, for B-frames).
    pub composition_offset: i32,
}

/// Generate an fMP4 initialization segment (ftyp + moov).
pub fn write_init_segment(config: &TrackConfig) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(1024 + config.codec_private.len());
    let is_video = config.codec.is_video();

    boxes::write_ftyp(&mut buf);

    let moov = boxes::open_box(&mut buf, b"moov");
    boxes::write_mvhd(&mut buf, config.timescale, TRACK_ID + 1);

    let trak = boxes::open_box(&mut buf, b"trak");
    boxes::write_tkhd(&mut buf, TRACK_ID, is_video, config.width, config.height);

    let mdia = boxes::open_box(&mut buf, b"mdia");
    boxes::write_mdhd(&mut buf, config.timescale);
    if is_video {
        boxes::write_hdlr(&mut buf, b"vide", b"VideoHandler");
    } else {
        boxes::write_hdlr(&mut buf, b"soun", b"SoundHandler");
    }

    let minf = boxes::open_box(&mut buf, b"minf");
    if is_video {
        boxes::write_vmhd(&mut buf);
    } else {
        boxes::write_smhd(&mut buf);
    }
    boxes::write_dinf(&mut buf);

    let stbl = boxes::open_box(&mut buf, b"stbl");
    let stsd = boxes::open_full_box(&mut buf, b"stsd", 0, 0);
    buf.put_u32(1); // entry count
    match config.codec {
        Codec::Avc => {
            boxes::write_avc1_entry(&mut buf, config.width, config.height, &config.codec_private)
        }
        Codec::Aac => boxes::write_mp4a_entry(
            &mut buf,
            config.sample_rate,
            config.channels,
            &config.codec_private,
        ),
    }
    boxes::close_box(&mut buf, stsd);
    boxes::write_empty_sample_tables(&mut buf);
    boxes::close_box(&mut buf, stbl);

    boxes::close_box(&mut buf, minf);
    boxes::close_box(&mut buf, mdia);
    boxes::close_box(&mut buf, trak);

    let mvex = boxes::open_box(&mut buf, b"mvex");
    boxes::write_trex(&mut buf, TRACK_ID);
    boxes::close_box(&mut buf, mvex);

    boxes::close_box(&mut buf, moov);
    buf.to_vec()
}

/// Generate an fMP4 media segment (styp + moof + mdat).
///
/// # Arguments
/// * `seq` - Fragment sequence number.
/// * `decode_time` - Base media decode time of the first sample.
/// * `samples` - Per-sample timing and sizes, in payload order.
/// * `payload` - Concatenated sample bytes.
pub fn write_media_segment(seq: u32, decode_time: u64, samples: &[SampleMeta], payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(256 + samples.len() * 16 + payload.len());

    boxes::write_styp(&mut buf);

    let moof = boxes::open_box(&mut buf, b"moof");
    boxes::write_mfhd(&mut buf, seq);

    let traf = boxes::open_box(&mut buf, b"traf");
    boxes::write_tfhd(&mut buf, TRACK_ID);
    boxes::write_tfdt(&mut buf, decode_time);

    let entries: Vec<TrunEntry> = samples
        .iter()
        .map(|s| TrunEntry {
            duration: s.duration,
            size: s.size,
            flags: if s.is_keyframe {
                SAMPLE_FLAGS_SYNC
            } else {
                SAMPLE_FLAGS_NON_SYNC
            },
            composition_time_offset: s.composition_offset,
        })
        .collect();
    let data_offset_pos = boxes::write_trun(&mut buf, &entries);

    boxes::close_box(&mut buf, traf);
    boxes::close_box(&mut buf, moof);

    // With default-base-is-moof the offset is measured from the moof start.
    let mdat_header_size = if payload.len() as u64 + 8 > u32::MAX as u64 {
        16
    } else {
        8
    };
    let data_offset = (buf.len() - moof + mdat_header_size) as i32;
    buf[data_offset_pos..data_offset_pos + 4].copy_from_slice(&data_offset.to_be_bytes());

    boxes::write_mdat_header(&mut buf, payload.len() as u64);
    buf.put_slice(payload);
    buf.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_u32(data: &[u8], offset: usize) -> u32 {
        u32::from_be_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
    }

    /// Walk top-level boxes and return their types.
    fn top_level_types(data: &[u8]) -> Vec<[u8; 4]> {
        let mut pos = 0;
        let mut types = Vec::new();
        while pos + 8 <= data.len() {
            let size = read_u32(data, pos) as usize;
            assert!(size >= 8, "Box size too small at offset {}", pos);
            assert!(pos + size <= data.len(), "Box at offset {} extends beyond data", pos);
            let mut t = [0u8; 4];
            t.copy_from_slice(&data[pos + 4..pos + 8]);
            types.push(t);
            pos += size;
        }
        assert_eq!(pos, data.len(), "Boxes do not span the whole buffer");
        types
    }

    fn video_config() -> TrackConfig {
        TrackConfig {
            timescale: 12800,
            codec: Codec::Avc,
            width: 1280,
            height: 720,
            sample_rate: 0,
            channels: 0,
            codec_private: vec![0x01, 0x42, 0xC0, 0x1E, 0xFF, 0xE0, 0x00],
        }
    }

    #[test]
    fn test_init_segment_is_ftyp_and_moov() {
        let init = write_init_segment(&video_config());
        assert_eq!(top_level_types(&init), vec![*b"ftyp", *b"moov"]);
        assert!(init.windows(4).any(|w| w == b"avcC"));
        assert!(init.windows(4).any(|w| w == b"mvex"));
    }

    #[test]
    fn test_init_segment_audio() {
        let config = TrackConfig {
            timescale: 48000,
            codec: Codec::Aac,
            width: 0,
            height: 0,
            sample_rate: 48000,
            channels: 2,
            codec_private: vec![0, 0, 0, 0],
        };

        let init = write_init_segment(&config);
        assert_eq!(top_level_types(&init), vec![*b"ftyp", *b"moov"]);
        assert!(init.windows(4).any(|w| w == b"mp4a"));
        assert!(init.windows(4).any(|w| w == b"smhd"));
    }

    #[test]
    fn test_media_segment_structure() {
        let samples = [
            SampleMeta {
                size: 100,
                duration: 512,
                is_keyframe: true,
                composition_offset: 0,
            },
            SampleMeta {
                size: 50,
                duration: 512,
                is_keyframe: false,
                composition_offset: 0,
            },
        ];
        let mut payload = vec![0xAA; 100];
        payload.extend_from_slice(&[0xBB; 50]);

        let segment = write_media_segment(1, 0, &samples, &payload);
        assert_eq!(top_level_types(&segment), vec![*b"styp", *b"moof", *b"mdat"]);

        let styp_size = read_u32(&segment, 0) as usize;
        let moof_size = read_u32(&segment, styp_size) as usize;
        let mdat_size = read_u32(&segment, styp_size + moof_size) as usize;
        assert_eq!(mdat_size, 8 + 150);
    }

    #[test]
    fn test_media_segment_data_offset_points_at_payload() {
        let samples = [SampleMeta {
            size: 200,
            duration: 1024,
            is_keyframe: true,
            composition_offset: 0,
        }];
        let payload = vec![0xFF; 200];

        let segment = write_media_segment(7, 2048, &samples, &payload);
        let styp_size = read_u32(&segment, 0) as usize;

        let trun_pos = segment
            .windows(4)
            .position(|w| w == b"trun")
            .expect("trun present")
            - 4;
        let data_offset = read_u32(&segment, trun_pos + 16) as usize;
        let data_start = styp_size + data_offset;
        assert_eq!(&segment[data_start..data_start + 200], &payload[..]);
    }

    #[test]
    fn test_media_segment_empty_samples() {
        let segment = write_media_segment(1, 0, &[], &[]);
        assert_eq!(top_level_types(&segment), vec![*b"styp", *b"moof", *b"mdat"]);
    }
}
