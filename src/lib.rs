//! dashforge - live MPEG-DASH segmenter
//!
//! The segmentation engine lives in `dashforge-segmenter`; this crate holds
//! the configuration loader, elementary stream readers and the offline
//! packaging driver behind the `dashforge` binary.

pub mod config;
pub mod package;
pub mod source;
