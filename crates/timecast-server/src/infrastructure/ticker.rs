//! Periodic timer that drives [`TickBroadcast`].
//!
//! The timer skips the interval's immediate first tick, so the first
//! broadcast happens one full period after startup.  Like the accept loop, it
//! waits in short slices so it notices the shutdown flag promptly even with a
//! long tick interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{error, info};

use timecast_core::BroadcastError;

use crate::application::TickBroadcast;

/// How long to wait for the next tick before re-checking the shutdown flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// Broadcasts a tick every `period` until `running` is cleared.
///
/// Returns the number of ticks broadcast.
///
/// # Errors
///
/// Stops and returns the [`BroadcastError`] if a broadcast fails as a whole.
/// Failures of individual connections do not stop the timer.
///
/// # Panics
///
/// Panics if `period` is zero.  [`ServerConfig::validate`] rejects a zero
/// tick interval before the server starts.
///
/// [`ServerConfig::validate`]: crate::domain::ServerConfig::validate
pub async fn run_ticker(
    mut use_case: TickBroadcast,
    period: Duration,
    running: Arc<AtomicBool>,
) -> Result<u64, BroadcastError> {
    let mut ticks = interval(period);
    // A stalled runtime should not produce a burst of catch-up broadcasts.
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticks.tick().await;

    info!("ticker started; broadcasting every {period:?}");

    loop {
        if !running.load(Ordering::Relaxed) {
            break;
        }
        if timeout(SHUTDOWN_POLL, ticks.tick()).await.is_err() {
            continue;
        }
        if let Err(e) = use_case.tick() {
            error!("ticker stopping: {e}");
            return Err(e);
        }
    }

    info!("ticker stopped after {} ticks", use_case.ticks());
    Ok(use_case.ticks())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
