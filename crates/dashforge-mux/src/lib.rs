//! dashforge-mux: fragmented MP4 serialization for live DASH segments.
//!
//! This crate is the muxing collaborator of the segmentation engine. It turns
//! a finalized codec configuration into an initialization segment and an
//! accumulated run of samples into a media segment. It does not decide when a
//! segment starts or ends.
//!
//! # Modules
//!
//! - [`fmp4`] - ISO BMFF serialization: init segments (`ftyp` + `moov`) and
//!   media segments (`moof` + `mdat`)
//! - [`codec`] - Codec configuration records: H.264 Annex-B / avcC and
//!   AAC ADTS / AudioSpecificConfig / esds

pub mod codec;
pub mod error;
pub mod fmp4;

pub use error::{Error, Result};
pub use fmp4::{write_init_segment, write_media_segment, Codec, SampleMeta, TrackConfig};
