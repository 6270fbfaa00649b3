//! Fragmented MP4 (ISO BMFF) serialization.
//!
//! - Init segment: `ftyp` + `moov` describing one track
//! - Media segment: `styp` + `moof` + `mdat` carrying one run of samples

mod boxes;
mod writer;

pub use boxes::Codec;
pub use writer::{write_init_segment, write_media_segment, SampleMeta, TrackConfig, TRACK_ID};
