//! WebSocket upgrade handler and per-connection event loop.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::time::{self, Instant};

use crate::AppState;

use super::events::{
    ClientMessage, GatewayMessage, CLOSE_SESSION_TIMEOUT, CLOSE_UNKNOWN_ERROR, CLOSE_UNKNOWN_SIGNAL,
};
use super::fanout::OutboxReceiver;
use super::handler::{handle_client_message, DispatchError};
use super::lifecycle::ConnectionHandle;

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

/// How long to wait for the client to answer our close frame.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (handle, outbox) = match state.presence.connect() {
        Ok(opened) => opened,
        Err(err) => {
            tracing::error!(%err, "failed to register gateway connection");
            let _ = send_close(&mut ws_tx, CLOSE_UNKNOWN_ERROR, "Internal error").await;
            finish_close(ws_tx, ws_rx).await;
            return;
        }
    };

    tracing::info!(connection_id = %handle.id(), "gateway connection opened");

    let reason = run_connection(
        &handle,
        &mut ws_tx,
        &mut ws_rx,
        outbox,
        state.config.heartbeat_interval,
        state.config.idle_timeout,
    )
    .await;

    tracing::info!(connection_id = %handle.id(), %reason, "gateway connection closed");
    // Dropping the handle leaves every joined event.
    drop(handle);
    finish_close(ws_tx, ws_rx).await;
}

/// Main connection loop: apply client signals, flush queued updates, enforce
/// liveness. Returns the reason the loop ended.
async fn run_connection(
    handle: &ConnectionHandle,
    ws_tx: &mut WsSink,
    ws_rx: &mut WsStream,
    mut outbox: OutboxReceiver,
    heartbeat_interval: Duration,
    idle_timeout: Duration,
) -> &'static str {
    let mut heartbeat_timer = time::interval(heartbeat_interval);
    heartbeat_timer.tick().await; // First tick fires immediately; skip it.
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            // Client sends us a message.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        last_seen = Instant::now();
                        let client_msg: ClientMessage = match serde_json::from_str(&text) {
                            Ok(m) => m,
                            Err(_) => {
                                let _ = send_close(ws_tx, CLOSE_UNKNOWN_ERROR, "Invalid JSON").await;
                                return "invalid json";
                            }
                        };

                        match handle_client_message(handle, client_msg) {
                            Ok(()) => {}
                            Err(DispatchError::UnknownSignal(signal)) => {
                                tracing::debug!(connection_id = %handle.id(), %signal, "unknown signal");
                                let _ = send_close(ws_tx, CLOSE_UNKNOWN_SIGNAL, "Unknown signal").await;
                                return "unknown signal";
                            }
                            Err(DispatchError::Presence(err)) => {
                                tracing::error!(connection_id = %handle.id(), %err, "presence invariant violated");
                                let _ = send_close(ws_tx, CLOSE_UNKNOWN_ERROR, "Internal error").await;
                                return "invariant violation";
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => last_seen = Instant::now(),
                    Some(Ok(Message::Binary(_))) => {
                        last_seen = Instant::now();
                        tracing::debug!(connection_id = %handle.id(), "binary frame ignored");
                    }
                    Some(Ok(Message::Close(_))) | None => return "client closed",
                    Some(Err(e)) => {
                        tracing::debug!(?e, connection_id = %handle.id(), "ws read error");
                        return "read error";
                    }
                }
            }

            // Attendee update queued by the broadcaster.
            update = outbox.recv() => {
                let Some(update) = update else {
                    return "outbox closed";
                };
                let msg = GatewayMessage::update_attendees(&update);
                let json = match serde_json::to_string(&msg) {
                    Ok(json) => json,
                    Err(err) => {
                        tracing::warn!(%err, connection_id = %handle.id(), "failed to encode attendee update");
                        continue;
                    }
                };
                if ws_tx.send(Message::Text(json.into())).await.is_err() {
                    return "write error";
                }
            }

            // Liveness: ping the client and close it if it has gone silent.
            _ = heartbeat_timer.tick() => {
                if last_seen.elapsed() >= idle_timeout {
                    tracing::debug!(connection_id = %handle.id(), "idle timeout, closing connection");
                    let _ = send_close(ws_tx, CLOSE_SESSION_TIMEOUT, "Idle timeout").await;
                    return "idle timeout";
                }
                if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                    return "write error";
                }
            }
        }
    }
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(ws_tx: &mut WsSink, code: u16, reason: &str) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}

/// Complete the close handshake before the socket is dropped.
///
/// The socket must stay open until the client has read our close frame,
/// otherwise a reset can discard it on the client side. Reads until the
/// client answers or the handshake times out.
async fn finish_close(mut ws_tx: WsSink, mut ws_rx: WsStream) {
    let _ = ws_tx.close().await;
    let drained = time::timeout(CLOSE_HANDSHAKE_TIMEOUT, async {
        while let Some(Ok(msg)) = ws_rx.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    })
    .await;
    if drained.is_err() {
        tracing::debug!("client did not complete the close handshake");
    }
}
