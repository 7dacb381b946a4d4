//! Server configuration types.
//!
//! [`ServerConfig`] is the single source of truth for all runtime settings.
//! It is built once at startup (defaults, then the TOML file, then CLI flags
//! and environment variables) and shared read-only with every session.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// A configuration value that would make the server misbehave.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// All runtime configuration for the broadcast server.
///
/// # Example
///
/// ```rust
/// use timecast_server::domain::ServerConfig;
///
/// let cfg = ServerConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 8080);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address and port the WebSocket listener binds to.
    pub bind_addr: SocketAddr,

    /// Period of the broadcast ticker.
    pub tick_interval: Duration,

    /// Text prefix of every tick; the tick number is appended.
    pub tick_message: String,

    /// Capacity of each connection's outbound queue, in frames.
    ///
    /// A broadcast to a connection whose queue is full fails for that
    /// connection only.
    pub outbound_buffer: usize,

    /// Upper bound on writing one frame to a peer.  A write that takes
    /// longer ends the session.
    pub send_timeout: Duration,
}

impl ServerConfig {
    /// Checks values that would otherwise panic deep inside tokio.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero tick interval, a zero
    /// outbound buffer or a zero send timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "tick_interval",
                reason: "must be greater than zero",
            });
        }
        if self.outbound_buffer == 0 {
            return Err(ConfigError::Invalid {
                field: "outbound_buffer",
                reason: "must hold at least one frame",
            });
        }
        if self.send_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "send_timeout",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    /// | Field           | Default          |
    /// |-----------------|------------------|
    /// | bind_addr       | `0.0.0.0:8080`   |
    /// | tick_interval   | 5 seconds        |
    /// | tick_message    | `tick`           |
    /// | outbound_buffer | 64 frames        |
    /// | send_timeout    | 10 seconds       |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            tick_interval: Duration::from_secs(5),
            tick_message: "tick".to_string(),
            outbound_buffer: 64,
            send_timeout: Duration::from_secs(10),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
