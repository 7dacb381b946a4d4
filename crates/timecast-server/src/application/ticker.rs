//! TickBroadcast: turns one timer tick into one broadcast.
//!
//! Every tick produces the text `"{prefix} {n}"` where `n` counts from 1, and
//! hands it to [`Broadcaster::send`].  Per-connection failures are already
//! logged by the broadcaster; this use case only reports the totals.

use tracing::debug;

use timecast_core::{BroadcastError, Broadcaster, DeliveryReport};

/// The periodic broadcast use case.
#[derive(Debug, Clone)]
pub struct TickBroadcast {
    broadcaster: Broadcaster,
    prefix: String,
    ticks: u64,
}

impl TickBroadcast {
    pub fn new(broadcaster: Broadcaster, prefix: impl Into<String>) -> Self {
        Self {
            broadcaster,
            prefix: prefix.into(),
            ticks: 0,
        }
    }

    /// Number of ticks broadcast so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Text for tick number `n`.
    pub fn message_for(&self, n: u64) -> String {
        format!("{} {n}", self.prefix)
    }

    /// Broadcasts the next numbered tick.
    ///
    /// # Errors
    ///
    /// Propagates [`BroadcastError`] when the broadcast mechanism itself is
    /// unusable.  The tick counter is not advanced in that case.
    pub fn tick(&mut self) -> Result<DeliveryReport, BroadcastError> {
        let n = self.ticks + 1;
        let message = self.message_for(n);
        let report = self.broadcaster.send(&message)?;
        self.ticks = n;
        debug!(
            "tick {n}: {}/{} connections reached",
            report.delivered(),
            report.attempted()
        );
        Ok(report)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use timecast_core::mock::RecordingConnection;
    use timecast_core::{ConnectionRegistry, DeliveryFailure};

    use super::*;

    fn make_use_case(registry: &Arc<ConnectionRegistry>) -> TickBroadcast {
        TickBroadcast::new(Broadcaster::new(Arc::clone(registry)), "tick")
    }

    #[test]
    fn test_message_for_appends_number() {
        let registry = Arc::new(ConnectionRegistry::new());
        let use_case = make_use_case(&registry);
        assert_eq!(use_case.message_for(7), "tick 7");
    }

    #[test]
    fn test_ticks_are_numbered_from_one() {
        let registry = Arc::new(ConnectionRegistry::new());
        let conn = Arc::new(RecordingConnection::new());
        registry.add(conn.clone());
        let mut use_case = make_use_case(&registry);

        use_case.tick().unwrap();
        use_case.tick().unwrap();

        assert_eq!(conn.sent(), vec!["tick 1".to_string(), "tick 2".to_string()]);
        assert_eq!(use_case.ticks(), 2);
    }

    #[test]
    fn test_tick_with_no_connections_still_counts() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut use_case = make_use_case(&registry);

        let report = tokio_test::assert_ok!(use_case.tick());

        assert_eq!(report.attempted(), 0);
        assert_eq!(use_case.ticks(), 1);
    }

    #[test]
    fn test_tick_reports_failed_connections() {
        let registry = Arc::new(ConnectionRegistry::new());
        registry.add(Arc::new(RecordingConnection::new()));
        registry.add(Arc::new(RecordingConnection::failing(
            DeliveryFailure::Backlogged { capacity: 64 },
        )));
        let mut use_case = make_use_case(&registry);

        let report = use_case.tick().unwrap();

        assert_eq!(report.delivered(), 1);
        assert_eq!(report.failed(), 1);
    }

    #[test]
    fn test_custom_prefix() {
        let registry = Arc::new(ConnectionRegistry::new());
        let conn = Arc::new(RecordingConnection::new());
        registry.add(conn.clone());
        let mut use_case = TickBroadcast::new(Broadcaster::new(registry), "server time");

        use_case.tick().unwrap();

        assert_eq!(conn.sent(), vec!["server time 1".to_string()]);
    }
}
