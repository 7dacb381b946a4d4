//! Broadcaster: delivers one text message to every live connection.
//!
//! `send` takes a [`Snapshot`](crate::registry::Snapshot) of the registry and
//! calls [`Connection::send_text`] on each handle in turn.  A failure on one
//! handle is logged, recorded in the [`DeliveryReport`], and the loop moves on
//! to the next handle.
//!
//! The broadcaster never removes a failing handle.  Membership changes only
//! through the hosting layer's open/close/error notifications (see
//! [`ConnectionLifecycle`](crate::lifecycle::ConnectionLifecycle)); a session
//! whose transport has died ends its own task and reports the error there.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::connection::{ConnectionId, DeliveryFailure};
use crate::registry::{ConnectionRegistry, RegistryError};

/// Failure of the broadcast mechanism itself, as opposed to one connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BroadcastError {
    #[error("broadcast aborted: {0}")]
    Registry(#[from] RegistryError),
}

/// Per-recipient outcome of one broadcast.
///
/// Callers that treat the broadcast as fire-and-forget can ignore it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    delivered: usize,
    failures: Vec<(ConnectionId, DeliveryFailure)>,
}

impl DeliveryReport {
    /// Number of handles a delivery was attempted on.
    pub fn attempted(&self) -> usize {
        self.delivered + self.failures.len()
    }

    pub fn delivered(&self) -> usize {
        self.delivered
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// The connections that failed and why, in snapshot order.
    pub fn failures(&self) -> &[(ConnectionId, DeliveryFailure)] {
        &self.failures
    }

    /// `true` when every attempted delivery succeeded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fan-out sender over a shared [`ConnectionRegistry`].
///
/// Holds no state of its own; cloning it is cheap and every clone sends to
/// the same registry.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Sends `message` to every connection in the current registry snapshot.
    ///
    /// Individual delivery failures never abort the loop and never surface as
    /// `Err`; they are logged and listed in the returned report.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::Registry`] if the registry cannot be read at
    /// all.  Nothing has been sent in that case.
    pub fn send(&self, message: &str) -> Result<DeliveryReport, BroadcastError> {
        let snapshot = self.registry.snapshot()?;
        let mut report = DeliveryReport::default();

        for handle in &snapshot {
            let id = handle.id();
            match handle.send_text(message) {
                Ok(()) => {
                    trace!("sent {} bytes to connection {id}", message.len());
                    report.delivered += 1;
                }
                Err(failure) => {
                    warn!("delivery to connection {id} failed: {failure}");
                    report.failures.push((id, failure));
                }
            }
        }

        debug!(
            "broadcast complete: {} delivered, {} failed",
            report.delivered(),
            report.failed()
        );
        Ok(report)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
