mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./dashforge.toml",
        "~/.config/dashforge/config.toml",
        "/etc/dashforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    config
        .dasher
        .validate()
        .context("Invalid [dasher] section")?;

    if !config.package.fps.is_finite() || config.package.fps <= 0.0 {
        anyhow::bail!("Frame rate must be positive, got {}", config.package.fps);
    }

    if config.dasher.output_dir.exists() && !config.dasher.output_dir.is_dir() {
        anyhow::bail!(
            "Output path exists and is not a directory: {:?}",
            config.dasher.output_dir
        );
    }

    Ok(())
}
