//! ConnectionLifecycle: maps hosting-layer notifications onto the registry.
//!
//! # Per-connection state machine
//!
//! ```text
//!            on_open                on_close / on_error
//!  ABSENT ─────────────►  LIVE  ─────────────────────────►  ABSENT
//!    │                                                        ▲
//!    └──────────── on_close / on_error (no-op) ───────────────┘
//! ```
//!
//! A transport may fire both an error and a close notification for the same
//! session, in either order.  Removal is idempotent, so the second one is a
//! no-op.  The registry keeps no history: a removed connection is simply gone.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::connection::{Connection, ConnectionId, DeliveryFailure};
use crate::registry::ConnectionRegistry;

/// Acknowledgment text sent directly to every newly opened connection.
pub const CONNECTION_ESTABLISHED: &str = "Connection established.";

/// Inbound open/close/error notifications from the hosting transport layer.
#[derive(Debug, Clone)]
pub struct ConnectionLifecycle {
    registry: Arc<ConnectionRegistry>,
}

impl ConnectionLifecycle {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this lifecycle updates.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Registers `handle` and sends it [`CONNECTION_ESTABLISHED`].
    ///
    /// The acknowledgment goes to `handle` only, not through the broadcaster.
    ///
    /// # Errors
    ///
    /// Returns the [`DeliveryFailure`] if the acknowledgment could not be
    /// delivered.  The handle stays registered either way; the hosting layer
    /// decides whether a failed acknowledgment warrants closing the session.
    pub fn on_open(&self, handle: Arc<dyn Connection>) -> Result<(), DeliveryFailure> {
        let id = handle.id();
        if self.registry.add(Arc::clone(&handle)) {
            info!("connection {id} opened");
        } else {
            debug!("connection {id} opened again; already registered");
        }
        handle.send_text(CONNECTION_ESTABLISHED)
    }

    /// Deregisters the connection after a normal close.
    pub fn on_close(&self, id: ConnectionId) {
        if self.registry.remove(id) {
            info!("connection {id} closed");
        } else {
            debug!("connection {id} closed; was not registered");
        }
    }

    /// Deregisters the connection after a transport fault.
    ///
    /// Treated exactly like a close as far as membership is concerned.
    pub fn on_error(&self, id: ConnectionId, cause: &dyn fmt::Display) {
        warn!("connection {id} error: {cause}");
        self.registry.remove(id);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
