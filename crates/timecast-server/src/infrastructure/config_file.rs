//! TOML configuration file for the server.
//!
//! The file is optional.  Every field has a default, so a partial file (or an
//! empty one) is valid:
//!
//! ```toml
//! [server]
//! bind_address = "127.0.0.1"
//! port = 9000
//! outbound_buffer = 128
//! send_timeout_secs = 5
//! log_level = "debug"
//!
//! [ticker]
//! interval_secs = 1
//! message = "server time"
//! ```
//!
//! CLI flags and `TIMECAST_*` environment variables override file values;
//! see `main.rs`.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::ServerConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// `bind_address` is not an IP address.
    #[error("invalid bind_address '{0}'")]
    BindAddress(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub ticker: TickerSection,
}

/// Listener and per-connection settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerSection {
    /// IP address to bind to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Outbound queue capacity per connection, in frames.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Broadcast timer settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TickerSection {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_message")]
    pub message: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    ServerConfig::default().bind_addr.ip().to_string()
}
fn default_port() -> u16 {
    ServerConfig::default().bind_addr.port()
}
fn default_outbound_buffer() -> usize {
    ServerConfig::default().outbound_buffer
}
fn default_send_timeout_secs() -> u64 {
    ServerConfig::default().send_timeout.as_secs()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_interval_secs() -> u64 {
    ServerConfig::default().tick_interval.as_secs()
}
fn default_message() -> String {
    ServerConfig::default().tick_message
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            outbound_buffer: default_outbound_buffer(),
            send_timeout_secs: default_send_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

impl Default for TickerSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            message: default_message(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl FileConfig {
    /// Reads and parses the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFileError::Io`] if the file cannot be read, or
    /// [`ConfigFileError::Parse`] if it is not valid TOML for this schema.
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFileError::Parse`] on malformed TOML or wrongly typed fields.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigFileError> {
        Ok(toml::from_str(text)?)
    }

    /// Converts the file values into a [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFileError::BindAddress`] if `bind_address` is not an
    /// IP address.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigFileError> {
        let ip: IpAddr = self
            .server
            .bind_address
            .parse()
            .map_err(|_| ConfigFileError::BindAddress(self.server.bind_address.clone()))?;
        Ok(ServerConfig {
            bind_addr: SocketAddr::new(ip, self.server.port),
            tick_interval: Duration::from_secs(self.ticker.interval_secs),
            tick_message: self.ticker.message.clone(),
            outbound_buffer: self.server.outbound_buffer,
            send_timeout: Duration::from_secs(self.server.send_timeout_secs),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
