//! timecast-server library crate.
//!
//! Hosts the WebSocket endpoint that feeds connection lifecycle events into
//! `timecast-core` and drives the periodic broadcast.
//!
//! # Architecture
//!
//! ```text
//! WebSocket clients (plain text frames)
//!         ↕
//! [timecast-server]
//!   ├── domain/           ServerConfig and its validation rules
//!   ├── application/      TickBroadcast: numbered message → Broadcaster::send
//!   └── infrastructure/
//!         ├── ws_server/     accept loop + per-session lifecycle (tokio-tungstenite)
//!         ├── ws_connection/ Connection impl over a bounded outbound queue
//!         ├── ticker/        tokio interval driving TickBroadcast
//!         └── config_file/   TOML configuration file
//!         ↕
//! [timecast-core]  ConnectionRegistry, ConnectionLifecycle, Broadcaster
//! ```
//!
//! # Layer rules
//!
//! - `domain` does no I/O and has no async code.
//! - `application` depends on `domain` and `timecast-core` only.
//! - `infrastructure` depends on all other layers plus `tokio` and `tungstenite`.

/// Domain layer: configuration types (no I/O).
pub mod domain;

/// Application layer: the tick broadcast use case.
pub mod application;

/// Infrastructure layer: WebSocket server, outbound queues, timer, config file.
pub mod infrastructure;
