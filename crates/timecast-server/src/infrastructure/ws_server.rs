//! WebSocket server: accept loop and per-session lifecycle.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming TCP connections and upgrading each to a WebSocket.
//! 3. Creating a [`WsConnection`] for the session and reporting it to
//!    [`ConnectionLifecycle::on_open`], which registers it and queues the
//!    acknowledgment.
//! 4. Running two halves per session until either ends:
//!    - **Writer**: drains the outbound queue into the WebSocket sink, each
//!      write bounded by `send_timeout`.
//!    - **Reader**: consumes inbound frames until the peer closes or the
//!      transport fails.  Inbound text is logged and otherwise ignored.
//! 5. Reporting the end of the session as `on_close` (clean close) or
//!    `on_error` (transport fault, write timeout).
//! 6. Stopping the accept loop when the `running` flag is cleared.
//!
//! Each session runs in its own Tokio task, so one slow client never blocks
//! the accept loop or other sessions.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};

use timecast_core::{Connection, ConnectionId, ConnectionLifecycle};

use crate::domain::ServerConfig;
use crate::infrastructure::ws_connection::WsConnection;

/// How long one `accept()` waits before re-checking the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// Why a session ended abnormally.
#[derive(Debug, Error)]
pub enum SessionFault {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    #[error("write to peer timed out after {0:?}")]
    SendTimeout(Duration),
}

/// How a session ended, as reported to the lifecycle.
#[derive(Debug)]
enum SessionEnd {
    Closed,
    Faulted(SessionFault),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.bind_addr` and serves until `running` is set to `false`.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound (e.g., the port is
/// already in use or the process lacks permission to bind).
pub async fn run_server(
    config: ServerConfig,
    lifecycle: ConnectionLifecycle,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {}", config.bind_addr))?;

    info!("timecast listening on {}", config.bind_addr);

    serve(listener, config, lifecycle, running).await
}

/// Runs the accept loop on an already bound listener.
///
/// Split from [`run_server`] so tests can bind an ephemeral port first.
pub async fn serve(
    listener: TcpListener,
    config: ServerConfig,
    lifecycle: ConnectionLifecycle,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    // Sessions only read the config, so one shared copy is enough.
    let config = Arc::new(config);

    loop {
        // Checked between accepts; `Relaxed` is enough for a one-way flag.
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // A bounded wait on `accept()` lets the loop see the flag even when
        // nobody is connecting.
        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("new TCP connection from {peer_addr}");
                // Each session task owns its own handles to the shared
                // registry and config.
                let lifecycle = lifecycle.clone();
                let cfg = Arc::clone(&config);
                tokio::spawn(async move {
                    handle_session(stream, peer_addr, lifecycle, cfg).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g., too many open file descriptors).
                error!("accept error: {e}");
            }
            Err(_) => {
                // Timed out with no connection; loop back to check the flag.
            }
        }
    }

    Ok(())
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Entry point of each per-session task; logs the outcome of [`run_session`].
async fn handle_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    lifecycle: ConnectionLifecycle,
    config: Arc<ServerConfig>,
) {
    match run_session(raw_stream, peer_addr, lifecycle, config).await {
        Ok(()) => info!("session {peer_addr} closed normally"),
        Err(e) => warn!("session {peer_addr} closed with error: {e:#}"),
    }
}

/// Runs the complete lifecycle of one WebSocket session.
///
/// The connection is registered only after the handshake succeeds, and is
/// always deregistered before this returns.
///
/// # Errors
///
/// Returns an error if the handshake fails or the session ends with a
/// transport fault.
async fn run_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    lifecycle: ConnectionLifecycle,
    config: Arc<ServerConfig>,
) -> anyhow::Result<()> {
    // Upgrade the raw TCP stream to a WebSocket (RFC 6455 handshake).
    let ws_stream = accept_async(raw_stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    // Split so the writer and reader halves can run concurrently.
    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    // The broadcaster only ever touches the sending side of this queue.
    let (connection, mut outbound_rx) = WsConnection::channel(config.outbound_buffer);
    let id = connection.id();

    info!("session {peer_addr}: WebSocket established as connection {id}");

    // The acknowledgment is queued here and written once the writer starts.
    if let Err(e) = lifecycle.on_open(Arc::new(connection)) {
        warn!("session {peer_addr}: failed to queue acknowledgment: {e}");
    }

    // Whichever half finishes first decides how the session ended; the other
    // future is dropped with the select.
    let end = tokio::select! {
        end = write_outbound(&mut ws_tx, &mut outbound_rx, config.send_timeout) => end,
        end = read_inbound(&mut ws_rx, id) => end,
    };

    match end {
        SessionEnd::Closed => {
            lifecycle.on_close(id);
            // Flush tungstenite's queued Close reply, best effort.
            let _ = timeout(config.send_timeout, ws_tx.close()).await;
            Ok(())
        }
        SessionEnd::Faulted(fault) => {
            lifecycle.on_error(id, &fault);
            Err(fault).with_context(|| format!("connection {id}"))
        }
    }
}

/// Writes queued frames to the peer until the queue closes or a write fails.
async fn write_outbound<S>(
    ws_tx: &mut S,
    outbound_rx: &mut mpsc::Receiver<String>,
    send_timeout: Duration,
) -> SessionEnd
where
    S: Sink<WsMessage, Error = WsError> + Unpin,
{
    while let Some(text) = outbound_rx.recv().await {
        match timeout(send_timeout, ws_tx.send(WsMessage::Text(text))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return classify(e),
            Err(_) => return SessionEnd::Faulted(SessionFault::SendTimeout(send_timeout)),
        }
    }
    // Every sender is gone: the handle was deregistered elsewhere.
    SessionEnd::Closed
}

/// Consumes inbound frames until the peer closes or the transport fails.
async fn read_inbound<S>(ws_rx: &mut S, id: ConnectionId) -> SessionEnd
where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => {
                debug!("connection {id}: ignoring inbound text ({} bytes)", text.len());
            }
            Ok(WsMessage::Binary(data)) => {
                debug!("connection {id}: ignoring inbound binary ({} bytes)", data.len());
            }
            // tungstenite queues the Pong reply itself.
            Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) | Ok(WsMessage::Frame(_)) => {}
            Ok(WsMessage::Close(frame)) => {
                debug!("connection {id}: Close frame received ({frame:?})");
                return SessionEnd::Closed;
            }
            Err(e) => return classify(e),
        }
    }
    debug!("connection {id}: stream ended");
    SessionEnd::Closed
}

/// A clean WebSocket shutdown is a close; anything else is a fault.
fn classify(e: WsError) -> SessionEnd {
    match e {
        WsError::ConnectionClosed | WsError::AlreadyClosed => SessionEnd::Closed,
        other => SessionEnd::Faulted(SessionFault::WebSocket(other)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
