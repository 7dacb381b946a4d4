//! timecast WebSocket broadcast server: entry point.
//!
//! Accepts WebSocket connections, greets each new client with
//! `"Connection established."`, and broadcasts a numbered tick message to
//! every connected client on a fixed interval.
//!
//! # Usage
//!
//! ```text
//! timecast-server [OPTIONS]
//!
//! Options:
//!   --config          <PATH>  TOML configuration file
//!   --bind            <IP>    Listener address [default: 0.0.0.0]
//!   --port            <PORT>  Listener port [default: 8080]
//!   --tick-interval   <SECS>  Broadcast period [default: 5]
//!   --tick-message    <TEXT>  Broadcast prefix [default: tick]
//!   --outbound-buffer <N>     Per-connection queue capacity [default: 64]
//!   --send-timeout    <SECS>  Per-frame write timeout [default: 10]
//!   --log-level       <LEVEL> Log filter when RUST_LOG is unset [default: info]
//! ```
//!
//! # Precedence
//!
//! CLI flags, then `TIMECAST_*` environment variables, then the config file,
//! then built-in defaults.
//!
//! | Variable                    | Flag                |
//! |-----------------------------|---------------------|
//! | `TIMECAST_CONFIG`           | `--config`          |
//! | `TIMECAST_BIND`             | `--bind`            |
//! | `TIMECAST_PORT`             | `--port`            |
//! | `TIMECAST_TICK_INTERVAL`    | `--tick-interval`   |
//! | `TIMECAST_TICK_MESSAGE`     | `--tick-message`    |
//! | `TIMECAST_OUTBOUND_BUFFER`  | `--outbound-buffer` |
//! | `TIMECAST_SEND_TIMEOUT`     | `--send-timeout`    |
//! | `TIMECAST_LOG_LEVEL`        | `--log-level`       |

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use timecast_core::{Broadcaster, ConnectionLifecycle, ConnectionRegistry};
use timecast_server::application::TickBroadcast;
use timecast_server::domain::ServerConfig;
use timecast_server::infrastructure::{run_server, run_ticker, FileConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// timecast WebSocket broadcast server.
///
/// Every flag is optional; unset flags fall back to the config file and then
/// to built-in defaults.
#[derive(Debug, Default, Parser)]
#[command(
    name = "timecast-server",
    about = "Broadcasts periodic text messages to every connected WebSocket client",
    version
)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, env = "TIMECAST_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to bind the listener to.
    ///
    /// Use `0.0.0.0` to accept connections on every interface, or `127.0.0.1`
    /// to accept only local connections.
    #[arg(long, env = "TIMECAST_BIND")]
    bind: Option<String>,

    /// TCP port to listen on.
    #[arg(long, env = "TIMECAST_PORT")]
    port: Option<u16>,

    /// Seconds between broadcasts.
    #[arg(long, env = "TIMECAST_TICK_INTERVAL")]
    tick_interval: Option<u64>,

    /// Text prefix of every broadcast; the tick number is appended.
    #[arg(long, env = "TIMECAST_TICK_MESSAGE")]
    tick_message: Option<String>,

    /// Frames each client may have queued before broadcasts to it fail.
    #[arg(long, env = "TIMECAST_OUTBOUND_BUFFER")]
    outbound_buffer: Option<usize>,

    /// Seconds a single frame write may take before the session is dropped.
    #[arg(long, env = "TIMECAST_SEND_TIMEOUT")]
    send_timeout: Option<u64>,

    /// `tracing` filter used when `RUST_LOG` is not set (e.g. `debug`).
    #[arg(long, env = "TIMECAST_LOG_LEVEL")]
    log_level: Option<String>,
}

/// Everything `main` needs after flags, file and defaults are merged.
#[derive(Debug)]
struct Settings {
    server: ServerConfig,
    log_level: String,
}

impl Cli {
    /// Merges the CLI over `file` and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if `--bind` (or the file's `bind_address`) is not an
    /// IP address, or if a merged value fails [`ServerConfig::validate`].
    fn into_settings(self, mut file: FileConfig) -> anyhow::Result<Settings> {
        // Each flag (or its TIMECAST_* variable) replaces the file value, so
        // the file schema stays the single place that builds a ServerConfig.
        if let Some(bind) = self.bind {
            file.server.bind_address = bind;
        }
        if let Some(port) = self.port {
            file.server.port = port;
        }
        if let Some(secs) = self.tick_interval {
            file.ticker.interval_secs = secs;
        }
        if let Some(message) = self.tick_message {
            file.ticker.message = message;
        }
        if let Some(frames) = self.outbound_buffer {
            file.server.outbound_buffer = frames;
        }
        if let Some(secs) = self.send_timeout {
            file.server.send_timeout_secs = secs;
        }
        if let Some(level) = self.log_level {
            file.server.log_level = level;
        }

        let server = file
            .to_server_config()
            .context("invalid configuration")?;
        server.validate().context("invalid configuration")?;

        Ok(Settings {
            server,
            log_level: file.server.log_level,
        })
    }

    /// Loads the file named by `--config`, or the defaults when there is none.
    fn file_config(&self) -> anyhow::Result<FileConfig> {
        match &self.config {
            Some(path) => FileConfig::load(path)
                .with_context(|| format!("failed to load config file {}", path.display())),
            None => Ok(FileConfig::default()),
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. CLI arguments are parsed and merged with the optional config file.
/// 2. `tracing_subscriber` is initialised from `RUST_LOG`, falling back to
///    the configured log level.
/// 3. One [`ConnectionRegistry`] is created and shared by the lifecycle (used
///    by every session) and the broadcaster (used by the ticker).
/// 4. The ticker and a Ctrl+C handler are spawned; both can clear the shared
///    `running` flag.
/// 5. [`run_server`] accepts connections until the flag is cleared.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Configuration ─────────────────────────────────────────────────────────
    //
    // `Cli::parse()` exits with a usage message on malformed flags.  The file
    // is read before logging is set up because it may carry the log level.
    let cli = Cli::parse();
    let file = cli.file_config()?;
    let settings = cli.into_settings(file)?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    //
    // `RUST_LOG` wins when it is set and valid; otherwise the configured
    // level applies.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .init();

    let config = settings.server;
    info!(
        "timecast starting: listen={}, tick every {:?} as '{}'",
        config.bind_addr, config.tick_interval, config.tick_message
    );

    // ── Shared state ───────────────────────────────────────────────────────────
    //
    // Sessions add and remove through the lifecycle while the ticker reads
    // through the broadcaster; both must see the same registry.
    let registry = Arc::new(ConnectionRegistry::new());
    let lifecycle = ConnectionLifecycle::new(Arc::clone(&registry));
    let broadcaster = Broadcaster::new(Arc::clone(&registry));

    // Cleared by Ctrl+C or a fatal ticker error; the accept loop and the
    // ticker both poll it.
    let running = Arc::new(AtomicBool::new(true));

    // ── Broadcast timer ────────────────────────────────────────────────────────
    let ticker_running = Arc::clone(&running);
    let use_case = TickBroadcast::new(broadcaster, config.tick_message.clone());
    let period = config.tick_interval;
    let ticker = tokio::spawn(async move {
        let result = run_ticker(use_case, period, Arc::clone(&ticker_running)).await;
        if result.is_err() {
            // The registry is unusable; take the server down with it.
            ticker_running.store(false, Ordering::Relaxed);
        }
        result
    });

    // ── Graceful shutdown ──────────────────────────────────────────────────────
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    // ── Main server loop ───────────────────────────────────────────────────────
    run_server(config, lifecycle, Arc::clone(&running)).await?;

    // The server only returns once the flag is cleared, so the ticker is
    // already on its way out.
    match ticker.await {
        Ok(Ok(ticks)) => info!("timecast stopped after {ticks} broadcasts"),
        Ok(Err(e)) => return Err(e).context("broadcast ticker failed"),
        Err(e) => return Err(e).context("broadcast ticker task panicked"),
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use timecast_server::infrastructure::ConfigFileError;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("timecast-server").chain(args.iter().copied()))
    }

    #[test]
    fn test_cli_without_flags_uses_defaults() {
        // Arrange: no flags and no file
        let cli = Cli::default();

        // Act
        let settings = cli.into_settings(FileConfig::default()).unwrap();

        // Assert
        assert_eq!(settings.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(settings.server.tick_interval, Duration::from_secs(5));
        assert_eq!(settings.server.tick_message, "tick");
        assert_eq!(settings.server.outbound_buffer, 64);
        assert_eq!(settings.server.send_timeout, Duration::from_secs(10));
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_cli_port_override() {
        let cli = parse(&["--port", "9999"]);
        assert_eq!(cli.port, Some(9999));
    }

    #[test]
    fn test_cli_tick_message_override() {
        let cli = parse(&["--tick-message", "server time"]);
        assert_eq!(cli.tick_message.as_deref(), Some("server time"));
    }

    #[test]
    fn test_cli_config_path() {
        let cli = parse(&["--config", "/etc/timecast.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/timecast.toml")));
    }

    #[test]
    fn test_file_values_apply_when_flags_are_absent() {
        let file = FileConfig::from_toml_str(
            "[server]\nport = 7000\nlog_level = \"debug\"\n[ticker]\ninterval_secs = 2\n",
        )
        .unwrap();

        let settings = Cli::default().into_settings(file).unwrap();

        assert_eq!(settings.server.bind_addr.port(), 7000);
        assert_eq!(settings.server.tick_interval, Duration::from_secs(2));
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_flags_override_file_values() {
        let file = FileConfig::from_toml_str(
            "[server]\nport = 7000\n[ticker]\nmessage = \"from file\"\n",
        )
        .unwrap();
        let cli = Cli {
            port: Some(9100),
            tick_message: Some("from cli".to_string()),
            ..Cli::default()
        };

        let settings = cli.into_settings(file).unwrap();

        assert_eq!(settings.server.bind_addr.port(), 9100);
        assert_eq!(settings.server.tick_message, "from cli");
    }

    #[test]
    fn test_invalid_bind_returns_error() {
        // Arrange: provide an invalid IP address string
        let cli = Cli {
            bind: Some("not.an.ip".to_string()),
            ..Cli::default()
        };

        // Act
        let result = cli.into_settings(FileConfig::default());

        // Assert: must return an error, not panic
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_bind_is_reported_by_the_file_schema() {
        let cli = Cli {
            bind: Some("localhost".to_string()),
            ..Cli::default()
        };

        let err = cli.into_settings(FileConfig::default()).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ConfigFileError>(),
            Some(ConfigFileError::BindAddress(addr)) if addr == "localhost"
        ));
    }

    #[test]
    fn test_invalid_bind_in_file_is_rejected() {
        let file = FileConfig::from_toml_str("[server]\nbind_address = \"nowhere\"\n").unwrap();
        assert!(Cli::default().into_settings(file).is_err());
    }

    #[test]
    fn test_zero_tick_interval_is_rejected() {
        let cli = Cli {
            tick_interval: Some(0),
            ..Cli::default()
        };
        assert!(cli.into_settings(FileConfig::default()).is_err());
    }

    #[test]
    fn test_zero_outbound_buffer_is_rejected() {
        let cli = Cli {
            outbound_buffer: Some(0),
            ..Cli::default()
        };
        assert!(cli.into_settings(FileConfig::default()).is_err());
    }

    #[test]
    fn test_no_config_flag_yields_default_file() {
        let cli = Cli::default();
        assert_eq!(cli.file_config().unwrap(), FileConfig::default());
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli = Cli {
            config: Some(std::env::temp_dir().join("timecast-missing-config.toml")),
            ..Cli::default()
        };
        assert!(cli.file_config().is_err());
    }
}
