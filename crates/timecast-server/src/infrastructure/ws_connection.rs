//! `Connection` implementation for one WebSocket session.
//!
//! The broadcaster calls `send_text` synchronously for every live connection
//! in turn, so it must never wait on a socket.  Instead each session owns a
//! bounded `mpsc` queue:
//!
//! ```text
//! Broadcaster ── send_text ──► WsConnection (mpsc::Sender, try_send)
//!                                    │
//!                                    ▼
//!                    session writer task (mpsc::Receiver)
//!                                    │  timeout(send_timeout, sink.send(..))
//!                                    ▼
//!                              WebSocket peer
//! ```
//!
//! A full queue means the peer is not keeping up; that delivery fails with
//! [`DeliveryFailure::Backlogged`] and the next broadcast tries again.  A
//! closed queue means the session task has ended.  Frames for one connection
//! are written in the order they were queued.

use tokio::sync::mpsc::{self, error::TrySendError};

use timecast_core::{Connection, ConnectionId, DeliveryFailure};

/// Sending half of one session's outbound queue.
#[derive(Debug)]
pub struct WsConnection {
    id: ConnectionId,
    outbound: mpsc::Sender<String>,
    capacity: usize,
}

impl WsConnection {
    /// Creates a handle with a fresh id and the receiver its writer drains.
    ///
    /// `capacity` must be non-zero; [`ServerConfig::validate`] enforces this
    /// for the configured value.
    ///
    /// [`ServerConfig::validate`]: crate::domain::ServerConfig::validate
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (outbound, rx) = mpsc::channel(capacity);
        let conn = Self {
            id: ConnectionId::new(),
            outbound,
            capacity,
        };
        (conn, rx)
    }
}

impl Connection for WsConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send_text(&self, text: &str) -> Result<(), DeliveryFailure> {
        self.outbound
            .try_send(text.to_owned())
            .map_err(|e| match e {
                TrySendError::Full(_) => DeliveryFailure::Backlogged {
                    capacity: self.capacity,
                },
                TrySendError::Closed(_) => DeliveryFailure::Closed,
            })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_text_enqueues_for_writer() {
        let (conn, mut rx) = WsConnection::channel(4);
        conn.send_text("hello").unwrap();
        assert_eq!(rx.try_recv().unwrap(), "hello");
    }

    #[test]
    fn test_frames_are_queued_in_order() {
        let (conn, mut rx) = WsConnection::channel(8);
        for n in 1..=3 {
            conn.send_text(&format!("tick {n}")).unwrap();
        }
        assert_eq!(rx.try_recv().unwrap(), "tick 1");
        assert_eq!(rx.try_recv().unwrap(), "tick 2");
        assert_eq!(rx.try_recv().unwrap(), "tick 3");
    }

    #[test]
    fn test_full_queue_is_backlogged() {
        let (conn, _rx) = WsConnection::channel(2);
        conn.send_text("a").unwrap();
        conn.send_text("b").unwrap();
        assert_eq!(
            conn.send_text("c"),
            Err(DeliveryFailure::Backlogged { capacity: 2 })
        );
    }

    #[test]
    fn test_dropped_receiver_is_closed() {
        let (conn, rx) = WsConnection::channel(2);
        drop(rx);
        assert_eq!(conn.send_text("late"), Err(DeliveryFailure::Closed));
    }

    #[test]
    fn test_each_channel_gets_its_own_id() {
        let (a, _rx_a) = WsConnection::channel(1);
        let (b, _rx_b) = WsConnection::channel(1);
        assert_ne!(a.id(), b.id());
    }
}
