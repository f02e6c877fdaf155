//! Configuration loading for the radio play tracker
//!
//! TOML file resolved with priority: command-line argument >
//! `RPT_CONFIG_PATH` environment variable > platform config directory.
//! Secrets may be overridden per-field from the environment so the
//! TOML file can be committed without credentials.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One radio station to poll. Immutable per cycle; read-only to the
/// pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    /// Unique station key (e.g. "glglz")
    pub name: String,
    /// Live stream URL to sample
    pub stream_url: String,
    /// Leading seconds to trim from each sample (fixed jingle/intro)
    pub live_intro_seconds: Option<u32>,
}

/// Catalog (Spotify) API credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
}

/// Remote audio-fingerprint recognition service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecognizerConfig {
    /// Recognition endpoint accepting a base64 audio body
    pub url: String,
    pub api_key: String,
}

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database file; defaults to the platform data directory
    pub database_path: Option<PathBuf>,

    /// Directory for per-station sample temp files; defaults to the
    /// OS temp directory
    pub work_dir: Option<PathBuf>,

    /// Fixed sleep between polling cycles
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,

    /// Deadline for one station's full pipeline within a cycle
    #[serde(default = "default_station_timeout")]
    pub station_timeout_seconds: u64,

    /// Wall-clock duration of each captured sample
    #[serde(default = "default_sample_seconds")]
    pub sample_seconds: u64,

    /// Station civil-time offset from UTC, in hours. Play timestamps
    /// are recorded in station wall-clock time, not UTC.
    #[serde(default = "default_civil_offset")]
    pub civil_offset_hours: i32,

    /// Touched after every completed cycle; staleness signals failure
    pub heartbeat_path: Option<PathBuf>,

    pub spotify: SpotifyConfig,
    pub recognizer: RecognizerConfig,

    #[serde(default)]
    pub stations: Vec<StationConfig>,
}

fn default_poll_interval() -> u64 {
    40
}

fn default_station_timeout() -> u64 {
    100
}

fn default_sample_seconds() -> u64 {
    10
}

fn default_civil_offset() -> i32 {
    3
}

impl Config {
    /// Load configuration from the resolved path and apply
    /// environment overrides.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(cli_path)?;
        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let mut config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string (tests, embedded configs)
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(content).map_err(|e| Error::Config(format!("Parse failed: {}", e)))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Overlay secrets and paths from the environment
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("RPT_SPOTIFY_CLIENT_ID") {
            if !v.is_empty() {
                self.spotify.client_id = v;
            }
        }
        if let Ok(v) = std::env::var("RPT_SPOTIFY_CLIENT_SECRET") {
            if !v.is_empty() {
                self.spotify.client_secret = v;
            }
        }
        if let Ok(v) = std::env::var("RPT_RECOGNIZER_API_KEY") {
            if !v.is_empty() {
                self.recognizer.api_key = v;
            }
        }
        if let Ok(v) = std::env::var("RPT_DATABASE_PATH") {
            if !v.is_empty() {
                self.database_path = Some(PathBuf::from(v));
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.stations.is_empty() {
            return Err(Error::Config("No stations configured".to_string()));
        }
        for station in &self.stations {
            if station.name.trim().is_empty() {
                return Err(Error::Config("Station with empty name".to_string()));
            }
            let count = self
                .stations
                .iter()
                .filter(|s| s.name == station.name)
                .count();
            if count > 1 {
                return Err(Error::Config(format!(
                    "Duplicate station name: {}",
                    station.name
                )));
            }
        }
        Ok(())
    }

    /// Resolved database path (configured or platform default)
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| default_data_dir().join("rpt.db"))
    }

    /// Resolved temp directory for sample files
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Resolve the config file path following priority order:
/// 1. Command-line argument (highest priority)
/// 2. RPT_CONFIG_PATH environment variable
/// 3. Platform config directory (~/.config/rpt/config.toml)
/// 4. /etc/rpt/config.toml (Linux fallback)
fn resolve_config_path(cli_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = cli_path {
        return Ok(path.to_path_buf());
    }

    if let Ok(path) = std::env::var("RPT_CONFIG_PATH") {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    if let Some(user_config) = dirs::config_dir().map(|d| d.join("rpt").join("config.toml")) {
        if user_config.exists() {
            return Ok(user_config);
        }
    }

    let system_config = PathBuf::from("/etc/rpt/config.toml");
    if system_config.exists() {
        return Ok(system_config);
    }

    Err(Error::Config(
        "No config file found (try --config or RPT_CONFIG_PATH)".to_string(),
    ))
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("rpt"))
        .unwrap_or_else(|| PathBuf::from("./rpt_data"))
}
