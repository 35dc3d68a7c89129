//! Configuration module for teledrive.

use serde::Deserialize;
use std::path::Path;

use crate::{DriveError, Result};

/// Default chunk size for chunked uploads (1 GiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024 * 1024;

/// Default per-message size ceiling of the external store (2 GiB).
pub const DEFAULT_MAX_BLOB_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/teledrive.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Telegram Bot API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Base URL of the Bot API.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Bot credential.
    #[serde(default)]
    pub bot_token: String,
    /// Target channel identifier.
    #[serde(default)]
    pub channel_id: String,
    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    600 // large documents take a while
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            bot_token: String::new(),
            channel_id: String::new(),
            connect_timeout_secs: default_connect_timeout(),
            timeout_secs: default_request_timeout(),
        }
    }
}

/// Upload limits.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Chunk size used when splitting large files.
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: u64,
    /// Largest payload the external store accepts in one message.
    #[serde(default = "default_max_blob_size")]
    pub max_blob_size_bytes: u64,
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_max_blob_size() -> u64 {
    DEFAULT_MAX_BLOB_SIZE
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: default_chunk_size(),
            max_blob_size_bytes: default_max_blob_size(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/teledrive.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Telegram configuration.
    #[serde(default)]
    pub telegram: TelegramConfig,
    /// Upload limits.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(DriveError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| DriveError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `TELEDRIVE_BOT_TOKEN`: bot credential
    /// - `TELEDRIVE_CHANNEL_ID`: target channel identifier
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("TELEDRIVE_BOT_TOKEN") {
            if !token.is_empty() {
                self.telegram.bot_token = token;
            }
        }
        if let Ok(channel) = std::env::var("TELEDRIVE_CHANNEL_ID") {
            if !channel.is_empty() {
                self.telegram.channel_id = channel;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.is_empty() {
            return Err(DriveError::Config(
                "telegram.bot_token is not set. \
                 Set it in config.toml or via TELEDRIVE_BOT_TOKEN environment variable."
                    .to_string(),
            ));
        }
        if self.telegram.channel_id.is_empty() {
            return Err(DriveError::Config(
                "telegram.channel_id is not set. \
                 Set it in config.toml or via TELEDRIVE_CHANNEL_ID environment variable."
                    .to_string(),
            ));
        }
        if self.upload.chunk_size_bytes == 0 {
            return Err(DriveError::Config(
                "upload.chunk_size_bytes must be greater than zero".to_string(),
            ));
        }
        if self.upload.chunk_size_bytes > self.upload.max_blob_size_bytes {
            return Err(DriveError::Config(format!(
                "upload.chunk_size_bytes ({}) exceeds upload.max_blob_size_bytes ({})",
                self.upload.chunk_size_bytes, self.upload.max_blob_size_bytes
            )));
        }
        Ok(())
    }
}
