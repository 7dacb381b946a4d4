//! Domain layer for timecast-server.
//!
//! Plain configuration types with no dependencies on I/O, sockets or the
//! async runtime.  The infrastructure layer fills them in from the CLI,
//! environment variables and the TOML config file.

pub mod config;

pub use config::{ConfigError, ServerConfig};
