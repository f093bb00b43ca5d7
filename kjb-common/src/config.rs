//! Configuration loading
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments
//! 2. Environment variables (`KJB_*`, handled by the binary's argument parser)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! A missing TOML file is not an error: a warning is logged and defaults are
//! used. A file that exists but cannot be parsed is a configuration error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Complete service configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct JukeboxConfig {
    /// HTTP server port
    pub port: u16,

    /// Address to bind the HTTP server to
    pub bind_address: String,

    /// Path of the persisted jukebox snapshot
    pub state_file: PathBuf,

    /// Optional directory of static browser assets served at `/`
    pub static_dir: Option<PathBuf>,

    pub kodi: KodiConfig,
    pub playback: PlaybackConfig,
    pub logging: LoggingConfig,
}

impl Default for JukeboxConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_address: "0.0.0.0".to_string(),
            state_file: PathBuf::from("jukebox.json"),
            static_dir: None,
            kodi: KodiConfig::default(),
            playback: PlaybackConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Connection settings for the Kodi instance being controlled
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct KodiConfig {
    pub host: String,
    /// JSON-RPC over HTTP
    pub http_port: u16,
    /// JSON-RPC notifications over WebSocket
    pub ws_port: u16,
    pub username: String,
    pub password: String,
    /// Directory on the Kodi host that makes up the library
    pub directory: String,
    /// Upper bound for every request/reply call
    pub request_timeout_secs: u64,
}

impl Default for KodiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            http_port: 8080,
            ws_port: 9090,
            username: "kodi".to_string(),
            password: "kodi".to_string(),
            directory: String::new(),
            request_timeout_secs: 10,
        }
    }
}

impl KodiConfig {
    pub fn rpc_url(&self) -> String {
        format!("http://{}:{}/jsonrpc", self.host, self.http_port)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}:{}/jsonrpc", self.host, self.ws_port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Reconciler and detection timing
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Delay before re-deciding after a failed play command
    pub retry_backoff_ms: u64,
    /// Attempts allowed for the random fallback within one decision
    pub random_retry_limit: u32,
    /// Delay between event feed reconnection attempts
    pub reconnect_delay_secs: u64,
    /// Delay between a "started" notification and asking what is playing
    pub event_settle_ms: u64,
    /// Delay before the first detection after startup
    pub initial_detect_delay_secs: u64,
    /// Periodic detection interval, 0 disables
    pub poll_interval_secs: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            retry_backoff_ms: 1000,
            random_retry_limit: 3,
            reconnect_delay_secs: 5,
            event_settle_ms: 500,
            initial_detect_delay_secs: 2,
            poll_interval_secs: 30,
        }
    }
}

impl PlaybackConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn event_settle(&self) -> Duration {
        Duration::from_millis(self.event_settle_ms)
    }

    pub fn initial_detect_delay(&self) -> Duration {
        Duration::from_secs(self.initial_detect_delay_secs)
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        (self.poll_interval_secs > 0).then(|| Duration::from_secs(self.poll_interval_secs))
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Default configuration file location, e.g. `~/.config/kodi-jukebox/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("kodi-jukebox").join("config.toml"))
}

/// Parse configuration from TOML text
pub fn parse_config(text: &str) -> Result<JukeboxConfig> {
    toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
}

/// Load configuration from `path`, or from [`default_config_path`] if `None`
///
/// Missing file -> warning + defaults. Unreadable or malformed file -> error.
pub fn load_config(path: Option<&Path>) -> Result<JukeboxConfig> {
    let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(path) => path,
        None => {
            warn!("Could not determine config directory, using built-in defaults");
            return Ok(JukeboxConfig::default());
        }
    };

    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(JukeboxConfig::default());
    }

    let text = std::fs::read_to_string(&path)?;
    let config = parse_config(&text)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}
