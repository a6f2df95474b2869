//! Configuration system for ferry.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $FERRY_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/ferry/config.toml
//!   3. ~/.config/ferry/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FerryConfig {
    pub network: NetworkConfig,
    pub channel: ChannelConfig,
    pub transfer: TransferConfig,
    pub offload: OffloadConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the HTTP surface binds to.
    pub listen_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Seconds between ping frames on each push channel.
    /// Two consecutive missed acks evict the session.
    pub keepalive_interval_s: u64,
    /// Outbound command queue depth per session.
    pub outbound_queue_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Default deadline for a request, overridable per request.
    pub request_timeout_s: u64,
    /// Upper bound on a single buffered (sync) upload.
    pub max_buffered_bytes: u64,
    /// Stream pipe depth in chunk records.
    pub stream_queue_depth: usize,
    /// Upper bound on a single stream chunk payload.
    pub max_chunk_size: u64,
    /// How long a chunk upload may wait on a full pipe before 503.
    pub chunk_enqueue_wait_ms: u64,
    /// How long terminal request records stay visible to the status endpoint.
    pub status_retention_s: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OffloadConfig {
    /// Object store base URL, forwarded to connectors in offload commands.
    /// Opaque to the router.
    pub object_store_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// "text" or "json".
    pub format: String,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for FerryConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            channel: ChannelConfig::default(),
            transfer: TransferConfig::default(),
            offload: OffloadConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8000".to_string(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            keepalive_interval_s: 15,
            outbound_queue_depth: 32,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            request_timeout_s: 60,
            max_buffered_bytes: 256 * 1024 * 1024,
            stream_queue_depth: 16,
            max_chunk_size: 4 * 1024 * 1024,
            chunk_enqueue_wait_ms: 2000,
            status_retention_s: 300,
        }
    }
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            object_store_url: String::new(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("ferry")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl FerryConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            FerryConfig::default()
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("FERRY_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Apply FERRY_* env var overrides.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = std::env::var("FERRY_LISTEN_ADDR") {
            self.network.listen_addr = v;
        }
        if let Ok(v) = std::env::var("FERRY_KEEPALIVE_INTERVAL_S") {
            self.channel.keepalive_interval_s = parse_env("FERRY_KEEPALIVE_INTERVAL_S", &v)?;
        }
        if let Ok(v) = std::env::var("FERRY_REQUEST_TIMEOUT_S") {
            self.transfer.request_timeout_s = parse_env("FERRY_REQUEST_TIMEOUT_S", &v)?;
        }
        if let Ok(v) = std::env::var("FERRY_MAX_BUFFERED_BYTES") {
            self.transfer.max_buffered_bytes = parse_env("FERRY_MAX_BUFFERED_BYTES", &v)?;
        }
        if let Ok(v) = std::env::var("FERRY_STREAM_QUEUE_DEPTH") {
            self.transfer.stream_queue_depth = parse_env("FERRY_STREAM_QUEUE_DEPTH", &v)?;
        }
        if let Ok(v) = std::env::var("FERRY_MAX_CHUNK_SIZE") {
            self.transfer.max_chunk_size = parse_env("FERRY_MAX_CHUNK_SIZE", &v)?;
        }
        if let Ok(v) = std::env::var("FERRY_OBJECT_STORE_URL") {
            self.offload.object_store_url = v;
        }
        if let Ok(v) = std::env::var("FERRY_LOG_FORMAT") {
            self.log.format = v;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.transfer.stream_queue_depth == 0 {
            return Err(ConfigError::InvalidValue(
                "transfer.stream_queue_depth",
                "must be at least 1".to_string(),
            ));
        }
        if self.log.format != "text" && self.log.format != "json" {
            return Err(ConfigError::InvalidValue(
                "log.format",
                format!("expected \"text\" or \"json\", got {:?}", self.log.format),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key, value.to_string()))
}
