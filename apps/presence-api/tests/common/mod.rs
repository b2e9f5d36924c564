#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::time;
use tokio_tungstenite::tungstenite;

use presence_api::config::Config;
use presence_api::gateway::ids::EventId;
use presence_api::AppState;

pub type Client =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Config with a short heartbeat so liveness paths run quickly in tests.
pub fn test_config() -> Config {
    Config {
        heartbeat_interval: Duration::from_millis(200),
        idle_timeout: Duration::from_secs(5),
        ..Config::default()
    }
}

/// Build the full application router wired to a fresh state.
pub fn test_app() -> (Router, AppState) {
    let state = AppState::new(test_config());
    let app = presence_api::routes::router().with_state(state.clone());
    (app, state)
}

/// Start an actual TCP server for WebSocket testing.
/// The server runs in the background.
pub async fn start_ws_server_with(config: Config) -> (SocketAddr, AppState) {
    let state = AppState::new(config);
    let app = presence_api::routes::router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

pub async fn start_ws_server() -> (SocketAddr, AppState) {
    start_ws_server_with(test_config()).await
}

/// Open a gateway connection.
pub async fn connect(addr: SocketAddr) -> Client {
    let url = format!("ws://{addr}/gateway");
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws_stream
}

/// Send a `{"t", "d"}` signal frame.
pub async fn send_signal(ws: &mut Client, t: &str, d: serde_json::Value) {
    let frame = serde_json::json!({ "t": t, "d": d });
    ws.send(tungstenite::Message::Text(frame.to_string().into()))
        .await
        .expect("send signal");
}

/// Read the next non-control frame, failing after `wait`.
pub async fn next_frame(ws: &mut Client, wait: Duration) -> Option<tungstenite::Message> {
    let deadline = time::Instant::now() + wait;
    loop {
        let remaining = deadline.saturating_duration_since(time::Instant::now());
        let msg = match time::timeout(remaining, ws.next()).await {
            Ok(Some(Ok(msg))) => msg,
            Ok(Some(Err(_))) | Ok(None) | Err(_) => return None,
        };
        match msg {
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => continue,
            other => return Some(other),
        }
    }
}

/// Read the next `update_attendees` payload.
pub async fn next_update(ws: &mut Client) -> serde_json::Value {
    let msg = next_frame(ws, Duration::from_secs(5))
        .await
        .expect("timeout waiting for update_attendees");
    let text = msg.into_text().expect("not text");
    let frame: serde_json::Value = serde_json::from_str(&text).expect("parse frame");
    assert_eq!(frame["t"], "update_attendees");
    frame["d"].clone()
}

/// Assert no data frame arrives within `wait`.
pub async fn assert_no_update(ws: &mut Client, wait: Duration) {
    if let Some(msg) = next_frame(ws, wait).await {
        panic!("expected no update, got: {msg:?}");
    }
}

/// Poll until the server-side count for `event_id` reaches `expected`.
pub async fn wait_for_count(state: &AppState, event_id: &str, expected: usize) {
    let event_id = EventId::from(event_id);
    let result = time::timeout(Duration::from_secs(5), async {
        while state.presence.count_of(&event_id) != expected {
            time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(
        result.is_ok(),
        "count for {event_id} stuck at {}, expected {expected}",
        state.presence.count_of(&event_id)
    );
}
