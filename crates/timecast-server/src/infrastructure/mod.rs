//! Infrastructure layer for timecast-server.
//!
//! Handles all I/O: accepting WebSocket connections, writing frames to peers,
//! running the tick timer and reading the configuration file.
//!
//! # Responsibilities
//!
//! - Binding a TCP listener and performing the WebSocket upgrade handshake
//! - Turning each session's open/close/error into lifecycle notifications
//! - Draining each connection's outbound queue into its WebSocket sink
//! - Firing the periodic broadcast
//! - Handling the graceful shutdown signal
//!
//! # What does NOT belong here?
//!
//! - Registry membership rules or the broadcast loop (that is `timecast-core`)
//! - Tick numbering (that is the application layer)

pub mod config_file;
pub mod ticker;
pub mod ws_connection;
pub mod ws_server;

pub use config_file::{ConfigFileError, FileConfig};
pub use ticker::run_ticker;
pub use ws_connection::WsConnection;
pub use ws_server::{run_server, serve};
