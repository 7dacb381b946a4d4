//! Connection handles: the core's view of one live transport session.
//!
//! The hosting layer owns the transport (socket, WebSocket sink, session
//! task).  What it hands to the core is a [`Connection`]: a small capability
//! that can push a text frame towards the peer and that has a stable identity
//! for set membership.  Dropping a handle from the registry never tears the
//! transport down; only the hosting layer does that.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Unique identifier of one live connection.
///
/// Two handles with the same `ConnectionId` are the same connection as far
/// as the registry is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Why a single text delivery to one connection failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// The session behind the handle has already ended.
    #[error("connection is closed")]
    Closed,

    /// The connection's outbound queue is full; the peer is not keeping up.
    #[error("outbound queue full ({capacity} frames pending)")]
    Backlogged { capacity: usize },

    /// The transport rejected the write.
    #[error("transport error: {0}")]
    Transport(String),
}

/// A live session that can receive text frames.
///
/// Implementations must not block for long in [`send_text`](Connection::send_text):
/// the broadcaster calls it for every live connection in turn, so a slow
/// implementation delays everyone after it in the snapshot.  The WebSocket
/// implementation enqueues onto a bounded channel and returns immediately.
#[cfg_attr(test, mockall::automock)]
pub trait Connection: Send + Sync {
    /// Identity used for registry membership.
    fn id(&self) -> ConnectionId;

    /// Delivers one text frame to the peer.
    ///
    /// # Errors
    ///
    /// Returns a [`DeliveryFailure`] if the frame could not be handed to the
    /// transport.
    fn send_text(&self, text: &str) -> Result<(), DeliveryFailure>;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
