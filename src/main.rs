mod cli;

use dashforge::{config, package};
use dashforge_segmenter::TrackKind;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};

struct PackageArgs {
    video: Option<PathBuf>,
    audio: Option<PathBuf>,
    output: Option<PathBuf>,
    name: Option<String>,
    fps: Option<f64>,
    segment_duration: Option<f64>,
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "dashforge=debug,dashforge_segmenter=debug".to_string()
        } else {
            "dashforge=info,dashforge_segmenter=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Package {
            video,
            audio,
            output,
            name,
            fps,
            segment_duration,
            json,
        } => run_package(
            cli.config.as_deref(),
            PackageArgs {
                video,
                audio,
                output,
                name,
                fps,
                segment_duration,
                json,
            },
        ),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("dashforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_package(config_path: Option<&Path>, args: PackageArgs) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // CLI flags override the config file
    if let Some(output) = args.output {
        config.dasher.output_dir = output;
    }
    if let Some(name) = args.name {
        config.dasher.base_name = name;
    }
    if let Some(fps) = args.fps {
        config.package.fps = fps;
    }
    if let Some(secs) = args.segment_duration {
        config.dasher.segment_duration_secs = secs;
    }
    config::validate_config(&config)?;

    for input in [&args.video, &args.audio].into_iter().flatten() {
        if !input.exists() {
            anyhow::bail!("Input file does not exist: {:?}", input);
        }
    }

    let summary = package::package(&config, args.video.as_deref(), args.audio.as_deref())?;

    if args.json {
        let json_str = serde_json::to_string_pretty(&summary)?;
        println!("{}", json_str);
        return Ok(());
    }

    println!("Output: {}", config.dasher.output_dir.display());
    println!("Init segments: {}", summary.init_segments.len());
    for (kind, frames) in [
        (TrackKind::Video, summary.video_frames),
        (TrackKind::Audio, summary.audio_frames),
    ] {
        if frames == 0 {
            continue;
        }
        let segments: Vec<_> = summary.segments_of(kind).collect();
        println!("{}: {} frames in {} segments", kind, frames, segments.len());
        for seg in segments {
            println!(
                "  [{}] {} ({} bytes, {:.3}s)",
                seg.seq,
                seg.path.display(),
                seg.size,
                seg.duration as f64 / seg.time_base as f64
            );
        }
    }
    if !summary.failed_writes.is_empty() {
        println!("Failed writes: {}", summary.failed_writes.len());
    }
    if summary.dropped > 0 {
        println!("Dropped segments: {}", summary.dropped);
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            print_config(&config);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            print_config(&config);
        }
    }

    Ok(())
}

fn print_config(config: &config::Config) {
    println!("  Output dir: {}", config.dasher.output_dir.display());
    println!("  Base name: {}", config.dasher.base_name);
    println!("  Segment duration: {}s", config.dasher.segment_duration_secs);
    println!("  Max segment size: {} bytes", config.dasher.max_segment_size);
    println!("  Frame rate: {}", config.package.fps);
}
