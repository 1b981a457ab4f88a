use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use airlock_core::net::messages::{
    ClientMessage, JoinRoomMsg, JoinRoomResponseMsg, ServerMessage, StateWritesMsg,
};
use airlock_core::net::protocol::{
    PROTOCOL_VERSION, decode_server_message, encode_client_message,
};
use airlock_core::store::StateWrite;

use airlock_relay::{RelayConfig, build_app};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestRelay {
    pub addr: SocketAddr,
    _server: tokio::task::JoinHandle<()>,
}

impl TestRelay {
    pub async fn new() -> Self {
        Self::with_config(RelayConfig::default()).await
    }

    pub async fn with_config(config: RelayConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (app, _state) = build_app(config);
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            addr,
            _server: server,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/relay", self.addr)
    }
}

pub async fn ws_connect(url: &str) -> WsStream {
    let (ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    ws
}

pub async fn ws_send(ws: &mut WsStream, msg: &ClientMessage) {
    let data = encode_client_message(msg).unwrap();
    ws.send(Message::Binary(data.into())).await.unwrap();
}

/// Read the next server message, failing the test after a second.
pub async fn ws_read(ws: &mut WsStream) -> ServerMessage {
    ws_try_read(ws, Duration::from_secs(1))
        .await
        .expect("expected a server message")
}

/// Read the next server message, or `None` if nothing arrives in `wait`.
pub async fn ws_try_read(ws: &mut WsStream, wait: Duration) -> Option<ServerMessage> {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        let next = tokio::time::timeout_at(deadline, ws.next()).await.ok()??;
        match next {
            Ok(Message::Binary(data)) => return Some(decode_server_message(&data).unwrap()),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
}

pub async fn ws_join(ws: &mut WsStream, room_code: &str, name: &str) -> JoinRoomResponseMsg {
    ws_send(
        ws,
        &ClientMessage::JoinRoom(JoinRoomMsg {
            room_code: room_code.to_string(),
            name: name.to_string(),
            protocol_version: PROTOCOL_VERSION,
        }),
    )
    .await;
    match ws_read(ws).await {
        ServerMessage::JoinRoomResponse(resp) => resp,
        other => panic!("Expected JoinRoomResponse, got: {other:?}"),
    }
}

pub async fn ws_send_writes(ws: &mut WsStream, writes: Vec<StateWrite>) {
    ws_send(ws, &ClientMessage::StateWrites(StateWritesMsg { writes })).await;
}
