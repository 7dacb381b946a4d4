//! In-memory connection for tests and benchmarks.
//!
//! [`RecordingConnection`] replaces a real transport with a `Mutex<Vec<String>>`
//! so that assertions can inspect exactly which texts a connection received
//! and in what order.
//!
//! # Usage in tests
//!
//! ```
//! use std::sync::Arc;
//! use timecast_core::mock::RecordingConnection;
//! use timecast_core::{Broadcaster, ConnectionRegistry, DeliveryFailure};
//!
//! let registry = Arc::new(ConnectionRegistry::new());
//! let healthy = Arc::new(RecordingConnection::new());
//! let broken = Arc::new(RecordingConnection::failing(DeliveryFailure::Closed));
//! registry.add(healthy.clone());
//! registry.add(broken.clone());
//!
//! let report = Broadcaster::new(registry).send("tick").unwrap();
//! assert_eq!(report.delivered(), 1);
//! assert_eq!(healthy.sent(), vec!["tick".to_string()]);
//! assert_eq!(broken.attempts(), 1);
//! ```
//!
//! # Failure injection
//!
//! A connection built with [`RecordingConnection::failing`] returns the given
//! [`DeliveryFailure`] from every `send_text` call.  The attempt is still
//! counted, so tests can prove that delivery was *tried*.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::connection::{Connection, ConnectionId, DeliveryFailure};

/// A connection that records every text it is sent.
#[derive(Debug, Default)]
pub struct RecordingConnection {
    id: ConnectionId,
    sent: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    failure: Option<DeliveryFailure>,
}

impl RecordingConnection {
    /// Creates a healthy connection with a fresh id.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a healthy connection with a caller-chosen id.
    pub fn with_id(id: ConnectionId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Creates a connection whose every delivery fails with `failure`.
    pub fn failing(failure: DeliveryFailure) -> Self {
        Self {
            failure: Some(failure),
            ..Self::default()
        }
    }

    /// Texts successfully delivered so far, oldest first.
    pub fn sent(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many times `text` was delivered.
    pub fn count_of(&self, text: &str) -> usize {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|t| t.as_str() == text)
            .count()
    }

    /// Number of `send_text` calls, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Connection for RecordingConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send_text(&self, text: &str) -> Result<(), DeliveryFailure> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_owned());
        Ok(())
    }
}
