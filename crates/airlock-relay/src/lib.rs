//! Stateless WebSocket relay for Airlock rooms.
//!
//! The relay knows rooms, members and who the host is. It never looks at
//! game state beyond checking that a write's author is its sender and that
//! room-scoped writes come from the host.

pub mod relay;

use std::sync::Arc;

use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::{RwLock, mpsc};

use airlock_core::net::messages::{ClientMessage, JoinFailure, JoinRoomResponseMsg, ServerMessage};
use airlock_core::net::protocol::{
    MAX_MESSAGE_SIZE, decode_client_message, encode_server_message,
};

use relay::{RateLimiter, RelayState, SharedRelayState, refusal};

/// Relay limits.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    pub max_rooms: usize,
    pub max_peers: usize,
    /// Token bucket size per connection.
    pub rate_burst: f64,
    /// Messages per second refilled per connection.
    pub rate_per_sec: f64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_rooms: 100,
            max_peers: 12,
            rate_burst: 120.0,
            rate_per_sec: 60.0,
        }
    }
}

#[derive(Clone)]
struct AppState {
    relay: SharedRelayState,
    config: Arc<RelayConfig>,
}

/// Build the relay router and its shared state.
pub fn build_app(config: RelayConfig) -> (Router<()>, SharedRelayState) {
    let relay: SharedRelayState = Arc::new(RwLock::new(RelayState::new(
        config.max_rooms,
        config.max_peers,
    )));
    let state = AppState {
        relay: relay.clone(),
        config: Arc::new(config),
    };
    let app = Router::new()
        .route("/relay", axum::routing::get(relay_ws_handler))
        .with_state(state);
    (app, relay)
}

async fn relay_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_relay_socket(socket, state))
}

async fn send_response(
    sender: &mut SplitSink<WebSocket, Message>,
    resp: JoinRoomResponseMsg,
) -> bool {
    match encode_server_message(&ServerMessage::JoinRoomResponse(resp)) {
        Ok(data) => sender.send(Message::Binary(Bytes::from(data))).await.is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode join response");
            false
        },
    }
}

async fn handle_relay_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let first = match receiver.next().await {
        Some(Ok(Message::Binary(data))) => data,
        _ => return,
    };
    let join = match decode_client_message(&first) {
        Ok(ClientMessage::JoinRoom(join)) => join,
        Ok(_) | Err(_) => {
            tracing::debug!("Connection did not start with a join");
            let _ = send_response(&mut sender, refusal(JoinFailure::NotJoined)).await;
            return;
        },
    };

    let (tx, rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let joined = state.relay.write().await.join(&join, tx);
    let joined = match joined {
        Ok(joined) => joined,
        Err(failure) => {
            tracing::debug!(room = %join.room_code, %failure, "Join refused");
            let _ = send_response(&mut sender, refusal(failure)).await;
            return;
        },
    };
    let code = joined.room_code.clone();
    let peer = joined.peer_id.clone();

    // The response goes out before anything queued for this peer.
    if !send_response(&mut sender, joined.response()).await {
        state.relay.write().await.leave(&code, &peer);
        return;
    }
    spawn_relay_writer(sender, rx);

    read_loop(&mut receiver, &state, &code, &peer).await;

    state.relay.write().await.leave(&code, &peer);
    tracing::info!(room = %code, %peer, "Peer left");
}

fn spawn_relay_writer(
    mut sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if sender.send(Message::Binary(Bytes::from(data))).await.is_err() {
                break;
            }
        }
    });
}

async fn read_loop(
    receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    code: &str,
    peer: &str,
) {
    let mut limiter = RateLimiter::new(state.config.rate_burst, state.config.rate_per_sec);

    while let Some(Ok(msg)) = receiver.next().await {
        let data = match msg {
            Message::Binary(d) => d,
            Message::Close(_) => break,
            _ => continue,
        };
        if data.is_empty() {
            continue;
        }
        if data.len() > MAX_MESSAGE_SIZE {
            tracing::warn!(room = code, peer, size = data.len(), "Oversized message dropped");
            continue;
        }
        if !limiter.allow() {
            tracing::warn!(room = code, peer, "Peer rate limited");
            continue;
        }

        match decode_client_message(&data) {
            Ok(ClientMessage::StateWrites(msg)) => {
                state.relay.read().await.relay_writes(code, peer, msg.writes);
            },
            Ok(ClientMessage::LeaveRoom(_)) => break,
            Ok(ClientMessage::JoinRoom(_)) => {
                tracing::debug!(room = code, peer, "Ignoring second join");
            },
            Err(e) => {
                tracing::warn!(room = code, peer, error = %e, "Malformed message dropped");
            },
        }
    }
}
