//! `WebSocket` endpoint: one reader and one writer per connection.
//!
//! Clients connect to `GET /ws`. After the upgrade the connection is
//! registered with the hub, then split:
//!
//! - the **reader** waits for frames under an idle deadline, decodes and
//!   validates them, and offers accepted updates to the ingress queue;
//! - the **writer** drains the connection's outbox, sends keepalive
//!   pings, and enforces the per-frame write deadline.
//!
//! Invalid updates are logged and dropped with the connection left open.
//! Transport failures, undecodable frames, and idle expiry end the
//! connection and unregister it from the hub.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use waypost_hub::{HubHandle, OutboxReceiver, Registration};
use waypost_types::{ConnectionId, InboundLocation};

use crate::config::ConnectionSettings;
use crate::error::TransportError;
use crate::state::AppState;

/// Upgrade an HTTP request to a location-sharing `WebSocket`.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let tracker = state.tracker.clone();
    ws.on_failed_upgrade(move |e| {
        warn!(remote = %remote_addr, error = %e, "WebSocket upgrade failed");
    })
    .on_upgrade(move |socket| tracker.track_future(handle_socket(socket, remote_addr, state)))
}

/// Drive one connection from registration to removal.
async fn handle_socket(mut socket: WebSocket, remote_addr: SocketAddr, state: Arc<AppState>) {
    let (outbox_tx, outbox_rx) = waypost_hub::outbox();
    let Registration { id, closed } = match state.hub.register(remote_addr, outbox_tx).await {
        Ok(registration) => registration,
        Err(e) => {
            debug!(remote = %remote_addr, error = %e, "Connection refused");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    info!(connection = %id, remote = %remote_addr, "New WebSocket connection");

    let settings = state.connection;
    let (sink, stream) = socket.split();
    let writer = state
        .tracker
        .spawn(run_writer(sink, outbox_rx, closed.clone(), settings));

    match run_reader(stream, id, &closed, &state.hub, settings.idle_timeout).await {
        Ok(()) => debug!(connection = %id, "Client disconnected"),
        Err(TransportError::IdleTimeout(idle)) => {
            info!(connection = %id, ?idle, "Client idle, disconnecting");
        }
        Err(e) => warn!(connection = %id, error = %e, "WebSocket error"),
    }

    state.hub.unregister(id);
    closed.cancel();

    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(connection = %id, error = %e, "Error writing to client"),
        Err(e) => warn!(connection = %id, error = %e, "Writer task failed"),
    }
}

/// Read frames until the peer leaves, the deadline expires, or the hub
/// closes the connection.
///
/// Every received frame, keepalive traffic included, restarts the idle
/// deadline.
async fn run_reader<S>(
    mut stream: S,
    id: ConnectionId,
    closed: &CancellationToken,
    hub: &HubHandle,
    idle_timeout: Duration,
) -> Result<(), TransportError>
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        let next = tokio::select! {
            () = closed.cancelled() => return Ok(()),
            next = time::timeout(idle_timeout, stream.next()) => next,
        };

        let message = match next {
            Err(_elapsed) => return Err(TransportError::IdleTimeout(idle_timeout)),
            Ok(None) => return Ok(()),
            Ok(Some(result)) => result?,
        };

        let raw: InboundLocation = match message {
            Message::Text(text) => serde_json::from_str(text.as_str())?,
            Message::Binary(bytes) => serde_json::from_slice(&bytes)?,
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => return Ok(()),
        };

        match waypost_hub::validate(raw) {
            Ok(update) => {
                if let Err(e) = hub.offer(update) {
                    warn!(connection = %id, error = %e, "Update dropped");
                }
            }
            Err(e) => warn!(connection = %id, error = %e, "Invalid location data"),
        }
    }
}

/// Forward outbox frames and keepalive pings to the peer.
///
/// Stops when the hub drops the outbox, when `closed` is cancelled, or on
/// the first failed write. Always attempts a Close frame on the way out
/// and cancels `closed` so the reader stops too.
async fn run_writer<W>(
    mut sink: W,
    mut outbox: OutboxReceiver,
    closed: CancellationToken,
    settings: ConnectionSettings,
) -> Result<(), TransportError>
where
    W: Sink<Message, Error = axum::Error> + Unpin,
{
    let mut ping = time::interval_at(
        Instant::now() + settings.ping_interval,
        settings.ping_interval,
    );
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let result = loop {
        let message = tokio::select! {
            () = closed.cancelled() => break Ok(()),
            frame = outbox.recv() => match frame {
                Some(frame) => Message::Text(frame.to_string().into()),
                None => break Ok(()),
            },
            _ = ping.tick() => Message::Ping(Bytes::new()),
        };

        if let Err(e) = write_frame(&mut sink, message, settings.write_timeout).await {
            break Err(e);
        }
    };

    // The peer may already be gone; a failed close changes nothing.
    let _ = write_frame(&mut sink, Message::Close(None), settings.write_timeout).await;
    closed.cancel();

    result
}

async fn write_frame<W>(
    sink: &mut W,
    message: Message,
    deadline: Duration,
) -> Result<(), TransportError>
where
    W: Sink<Message, Error = axum::Error> + Unpin,
{
    match time::timeout(deadline, sink.send(message)).await {
        Ok(result) => result.map_err(TransportError::from),
        Err(_elapsed) => Err(TransportError::WriteTimeout(deadline)),
    }
}
