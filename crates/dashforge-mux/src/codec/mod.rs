//! Codec configuration records.
//!
//! Only what the segmenter needs to frame payloads and finalize a track's
//! configuration: Annex-B splitting and avcC for H.264, ADTS parsing and esds
//! for AAC. No bitstream decoding beyond headers.

pub mod aac;
pub mod avc;

pub use aac::{build_adts_header, build_esds, lc_audio_specific_config, AdtsHeader};
pub use avc::{avc_codec_string, build_avcc, nal_type, split_annexb};
