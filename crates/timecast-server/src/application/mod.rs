//! Application layer for timecast-server.
//!
//! Knows *what* a tick does (number it, broadcast it) but not *when*: the
//! timer that calls it lives in the infrastructure layer.
//!
//! # What does NOT belong here?
//!
//! - Sockets, WebSocket framing, Tokio timers or task spawning

pub mod ticker;

pub use ticker::TickBroadcast;
