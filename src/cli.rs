use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dashforge")]
#[command(author, version, about = "Live MPEG-DASH segmenter for H.264 and AAC")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Segment elementary streams into DASH init and media segments
    Package {
        /// H.264 Annex-B elementary stream
        #[arg(long)]
        video: Option<PathBuf>,

        /// AAC ADTS elementary stream
        #[arg(long)]
        audio: Option<PathBuf>,

        /// Output directory (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Segment file name prefix (overrides config)
        #[arg(long)]
        name: Option<String>,

        /// Video frame rate used to timestamp access units
        #[arg(long)]
        fps: Option<f64>,

        /// Target segment duration in seconds (overrides config)
        #[arg(long)]
        segment_duration: Option<f64>,

        /// Output the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
