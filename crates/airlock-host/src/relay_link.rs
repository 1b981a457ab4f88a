//! [`PeerLink`] over a WebSocket connection to an Airlock relay.
//!
//! The socket is split into a reader task and a writer task; the link
//! itself only touches the two channels, so `send`/`try_recv` never block
//! the tick.

use futures::{SinkExt, StreamExt};
use smallvec::SmallVec;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use airlock_core::directory::{ConnectionError, LinkEvent, PeerLink};
use airlock_core::net::messages::{
    ClientMessage, JoinFailure, JoinRoomMsg, JoinRoomResponseMsg, MessageType, ServerMessage,
    StateWritesMsg,
};
use airlock_core::net::protocol::{
    PROTOCOL_VERSION, ProtocolError, decode_server_message, encode_client_message, encode_message,
};
use airlock_core::peer::{PeerId, PeerProfile};
use airlock_core::store::StateWrite;

/// Encoded frames for one `send` call. Almost always a single frame.
type Frames = SmallVec<[Vec<u8>; 2]>;

pub struct RelayLink {
    peer_id: PeerId,
    room_code: String,
    outgoing: mpsc::UnboundedSender<Vec<u8>>,
    incoming: mpsc::UnboundedReceiver<LinkEvent>,
    reader: JoinHandle<()>,
    closed: bool,
}

impl RelayLink {
    /// Connect to `url` and join `room_code` (empty creates a room).
    pub async fn connect(
        url: &str,
        room_code: &str,
        profile: &PeerProfile,
    ) -> Result<Self, ConnectionError> {
        let (ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| ConnectionError::Unreachable(e.to_string()))?;
        let (mut sink, mut stream) = ws.split();

        let join = encode_client_message(&ClientMessage::JoinRoom(JoinRoomMsg {
            room_code: room_code.to_string(),
            name: profile.name.clone(),
            protocol_version: PROTOCOL_VERSION,
        }))?;
        sink.send(Message::Binary(join.into()))
            .await
            .map_err(|e| ConnectionError::Unreachable(e.to_string()))?;

        let response = loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    if let ServerMessage::JoinRoomResponse(resp) = decode_server_message(&data)? {
                        break resp;
                    }
                },
                Some(Ok(Message::Close(_))) | None => return Err(ConnectionError::Closed),
                Some(Ok(_)) => {},
                Some(Err(e)) => return Err(ConnectionError::Unreachable(e.to_string())),
            }
        };
        let (peer_id, room_code) = accepted(response.clone(), room_code)?;
        tracing::info!(peer = %peer_id, room = %room_code, "Joined relay room");

        let (event_tx, incoming) = mpsc::unbounded_channel();
        let _ = event_tx.send(LinkEvent::Roster {
            peers: response.roster,
            host: response.host_id,
        });

        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let data = match frame {
                    Ok(Message::Binary(data)) => data,
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };
                let event = match decode_server_message(&data) {
                    Ok(ServerMessage::Roster(r)) => LinkEvent::Roster {
                        peers: r.peers,
                        host: r.host_id,
                    },
                    Ok(ServerMessage::RelayedWrites(w)) => LinkEvent::Writes {
                        from: w.from,
                        writes: w.writes,
                    },
                    Ok(ServerMessage::JoinRoomResponse(_)) => continue,
                    Err(e) => {
                        tracing::warn!(error = %e, "Malformed relay frame");
                        continue;
                    },
                };
                if event_tx.send(event).is_err() {
                    return;
                }
            }
            let _ = event_tx.send(LinkEvent::Closed);
        });

        let (outgoing, mut frames) = mpsc::unbounded_channel::<Vec<u8>>();
        tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                if sink.send(Message::Binary(frame.into())).await.is_err() {
                    return;
                }
            }
            let _ = sink.close().await;
        });

        Ok(Self {
            peer_id,
            room_code,
            outgoing,
            incoming,
            reader,
            closed: false,
        })
    }

    pub fn room_code(&self) -> &str {
        &self.room_code
    }
}

fn accepted(
    resp: JoinRoomResponseMsg,
    requested: &str,
) -> Result<(PeerId, String), ConnectionError> {
    if !resp.success {
        return Err(match resp.error {
            Some(JoinFailure::RoomFull) => ConnectionError::RoomFull,
            Some(JoinFailure::RoomNotFound) => ConnectionError::RoomNotFound(requested.to_string()),
            Some(JoinFailure::VersionMismatch { expected }) => ConnectionError::ProtocolMismatch {
                expected,
                got: PROTOCOL_VERSION,
            },
            Some(other) => ConnectionError::Rejected(other.to_string()),
            None => ConnectionError::Rejected("no reason given".to_string()),
        });
    }
    match (resp.peer_id, resp.room_code) {
        (Some(id), Some(code)) => Ok((id, code)),
        _ => Err(ConnectionError::Rejected(
            "join accepted without a peer id".to_string(),
        )),
    }
}

/// Encode `writes` as one or more `StateWrites` frames under the size cap.
fn encode_writes(writes: Vec<StateWrite>) -> Result<Frames, ProtocolError> {
    let mut frames = Frames::new();
    let mut pending = vec![writes];
    while let Some(batch) = pending.pop() {
        let msg = StateWritesMsg { writes: batch };
        match encode_message(MessageType::StateWrites, &msg) {
            Ok(frame) => frames.push(frame),
            Err(ProtocolError::PayloadTooLarge(size)) => {
                let mut writes = msg.writes;
                if writes.len() < 2 {
                    return Err(ProtocolError::PayloadTooLarge(size));
                }
                let back = writes.split_off(writes.len() / 2);
                pending.push(back);
                pending.push(writes);
            },
            Err(e) => return Err(e),
        }
    }
    Ok(frames)
}

impl PeerLink for RelayLink {
    fn local_peer_id(&self) -> &str {
        &self.peer_id
    }

    fn send(&mut self, writes: Vec<StateWrite>) -> Result<(), ConnectionError> {
        if self.closed {
            return Err(ConnectionError::Closed);
        }
        for frame in encode_writes(writes)? {
            self.outgoing
                .send(frame)
                .map_err(|_| ConnectionError::Closed)?;
        }
        Ok(())
    }

    fn try_recv(&mut self) -> Option<LinkEvent> {
        match self.incoming.try_recv() {
            Ok(event) => Some(event),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) if !self.closed => {
                self.closed = true;
                Some(LinkEvent::Closed)
            },
            Err(mpsc::error::TryRecvError::Disconnected) => None,
        }
    }
}

impl Drop for RelayLink {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
