use dashforge_segmenter::DasherConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub dasher: DasherConfig,

    #[serde(default)]
    pub package: PackageConfig,
}

/// How `dashforge package` timestamps and describes elementary streams.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PackageConfig {
    /// Frame rate of the video stream; Annex-B carries no timing.
    #[serde(default = "default_fps")]
    pub fps: f64,

    /// Picture size signalled in the init segment (0 if unknown)
    #[serde(default)]
    pub width: u32,

    #[serde(default)]
    pub height: u32,

    /// Average video bitrate in kbit/s (0 to leave unset)
    #[serde(default)]
    pub video_bitrate_kbps: u32,

    /// Average audio bitrate in kbit/s (0 to leave unset)
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate_kbps: u32,
}

fn default_fps() -> f64 {
    25.0
}

fn default_audio_bitrate() -> u32 {
    128
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            width: 0,
            height: 0,
            video_bitrate_kbps: 0,
            audio_bitrate_kbps: default_audio_bitrate(),
        }
    }
}
