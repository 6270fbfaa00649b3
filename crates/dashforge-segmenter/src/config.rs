//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::policy::{DEFAULT_AUDIO_SAMPLE_RATE, VIDEO_TIME_BASE};
use crate::{Error, Result};

/// Where and how segments are produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DasherConfig {
    /// Directory segments are written to.
    pub output_dir: PathBuf,
    /// File name prefix shared by every representation.
    pub base_name: String,
    /// Target media segment duration in seconds.
    pub segment_duration_secs: f64,
    /// Upper bound for one segment buffer in bytes.
    pub max_segment_size: usize,
    /// Video time base (ticks per second).
    pub video_time_base: u32,
    /// Audio time base until the stream reports its own rate.
    pub audio_sample_rate: u32,
}

impl Default for DasherConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./dash"),
            base_name: "stream".to_string(),
            segment_duration_secs: 2.0,
            max_segment_size: 4 * 1024 * 1024,
            video_time_base: VIDEO_TIME_BASE,
            audio_sample_rate: DEFAULT_AUDIO_SAMPLE_RATE,
        }
    }
}

impl DasherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.base_name.is_empty() {
            return Err(Error::invalid_config("base_name must not be empty"));
        }
        if self.base_name.contains('/') {
            return Err(Error::invalid_config("base_name must not contain '/'"));
        }
        if !self.segment_duration_secs.is_finite() || self.segment_duration_secs <= 0.0 {
            return Err(Error::invalid_config(format!(
                "segment_duration_secs must be positive, got {}",
                self.segment_duration_secs
            )));
        }
        if self.max_segment_size == 0 {
            return Err(Error::invalid_config("max_segment_size must be non-zero"));
        }
        if self.video_time_base == 0 || self.audio_sample_rate == 0 {
            return Err(Error::invalid_config("time bases must be non-zero"));
        }
        Ok(())
    }

    pub fn segment_duration(&self) -> Duration {
        Duration::from_secs_f64(self.segment_duration_secs)
    }
}
