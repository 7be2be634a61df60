//! Command-line arguments and configuration resolution for podwave-player

use std::path::PathBuf;

use clap::Parser;
use podwave_common::config::{resolve_config, ConfigOverrides, PlayerConfig};

use crate::error::Result;

/// Command-line arguments for podwave-player
#[derive(Parser, Debug, Default)]
#[command(name = "podwave-player")]
#[command(about = "Narration player service for Podwave")]
#[command(version)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PODWAVE_PORT")]
    pub port: Option<u16>,

    /// Base URL of the narration API
    #[arg(long, env = "PODWAVE_API_BASE_URL")]
    pub api_base_url: Option<String>,

    /// Config file (TOML)
    #[arg(short, long, env = "PODWAVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Initial playback rate
    #[arg(long)]
    pub rate: Option<f64>,

    /// Audio output device name
    #[arg(long)]
    pub device: Option<String>,
}

impl Args {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config_path: self.config.clone(),
            api_base_url: self.api_base_url.clone(),
            port: self.port,
            default_playback_rate: self.rate,
            audio_device: self.device.clone(),
        }
    }

    /// Resolve the effective configuration (CLI > env > file > default)
    pub fn resolve(&self) -> Result<PlayerConfig> {
        Ok(resolve_config(&self.overrides())?)
    }
}
