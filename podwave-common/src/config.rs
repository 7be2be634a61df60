//! Configuration loading and resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::events::DEFAULT_PLAYBACK_RATE;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable names
pub const ENV_API_BASE_URL: &str = "PODWAVE_API_BASE_URL";
pub const ENV_PORT: &str = "PODWAVE_PORT";
pub const ENV_PLAYBACK_RATE: &str = "PODWAVE_PLAYBACK_RATE";
pub const ENV_AUDIO_DEVICE: &str = "PODWAVE_AUDIO_DEVICE";
pub const ENV_CONFIG: &str = "PODWAVE_CONFIG";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
const DEFAULT_PORT: u16 = 5740;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 250;
const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Player service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Base URL of the narration API (no trailing slash needed)
    pub api_base_url: String,
    /// HTTP port for the control API
    pub port: u16,
    /// Rate applied to each newly played narration
    pub default_playback_rate: f64,
    /// Timeout for narration API requests
    pub request_timeout_secs: u64,
    /// Output device name (None = system default)
    pub audio_device: Option<String>,
    /// How often the audio resource reports position while playing
    pub progress_interval_ms: u64,
    /// Event bus buffer size
    pub event_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            port: DEFAULT_PORT,
            default_playback_rate: DEFAULT_PLAYBACK_RATE,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            audio_device: None,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl PlayerConfig {
    /// Load a TOML config file. Missing keys take compiled defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PlayerConfig = toml::from_str(&content)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Reject values the player cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(Error::Config("api_base_url must not be empty".to_string()));
        }
        let base = self.api_base_url.as_str();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(Error::Config(format!(
                "api_base_url must be an http(s) URL: {}",
                self.api_base_url
            )));
        }
        if !self.default_playback_rate.is_finite() || self.default_playback_rate <= 0.0 {
            return Err(Error::Config(format!(
                "default_playback_rate must be positive: {}",
                self.default_playback_rate
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be at least 1".to_string()));
        }
        if self.progress_interval_ms == 0 {
            return Err(Error::Config("progress_interval_ms must be at least 1".to_string()));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Explicit config file; a missing explicit file is an error
    pub config_path: Option<PathBuf>,
    pub api_base_url: Option<String>,
    pub port: Option<u16>,
    pub default_playback_rate: Option<f64>,
    pub audio_device: Option<String>,
}

/// Resolve the effective configuration
///
/// An explicit config path must exist and parse. When no path is given the
/// platform locations are searched; finding nothing is not an error and the
/// compiled defaults are used.
pub fn resolve_config(overrides: &ConfigOverrides) -> Result<PlayerConfig> {
    // Priority 3: TOML config file
    let mut config = match &overrides.config_path {
        Some(path) => PlayerConfig::load(path).map_err(|e| {
            Error::Config(format!("Failed to load {}: {}", path.display(), e))
        })?,
        None => match find_config_file() {
            Some(path) => {
                info!("Using config file {}", path.display());
                PlayerConfig::load(&path)?
            }
            None => {
                info!("No config file found, using defaults");
                PlayerConfig::default()
            }
        },
    };

    // Priority 2: Environment variables
    apply_env(&mut config);

    // Priority 1: Command-line arguments
    if let Some(url) = &overrides.api_base_url {
        config.api_base_url = url.clone();
    }
    if let Some(port) = overrides.port {
        config.port = port;
    }
    if let Some(rate) = overrides.default_playback_rate {
        config.default_playback_rate = rate;
    }
    if let Some(device) = &overrides.audio_device {
        config.audio_device = Some(device.clone());
    }

    config.validate()?;
    Ok(config)
}

fn apply_env(config: &mut PlayerConfig) {
    if let Ok(url) = std::env::var(ENV_API_BASE_URL) {
        config.api_base_url = url;
    }
    if let Ok(port) = std::env::var(ENV_PORT) {
        match port.parse() {
            Ok(port) => config.port = port,
            Err(_) => warn!("Ignoring {}={:?}: not a port number", ENV_PORT, port),
        }
    }
    if let Ok(rate) = std::env::var(ENV_PLAYBACK_RATE) {
        match rate.parse() {
            Ok(rate) => config.default_playback_rate = rate,
            Err(_) => warn!("Ignoring {}={:?}: not a number", ENV_PLAYBACK_RATE, rate),
        }
    }
    if let Ok(device) = std::env::var(ENV_AUDIO_DEVICE) {
        config.audio_device = Some(device);
    }
}

/// Locate the config file for the platform
///
/// Checks `$PODWAVE_CONFIG`, then the user config dir
/// (`~/.config/podwave/config.toml` on Linux), then `/etc/podwave/config.toml`
/// on Linux.
fn find_config_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(ENV_CONFIG) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        warn!("{} points to missing file {}", ENV_CONFIG, path.display());
    }

    let user_config = dirs::config_dir().map(|d| d.join("podwave").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/podwave/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}
