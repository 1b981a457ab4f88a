use serde::{Deserialize, Serialize};

use super::messages::{
    ClientMessage, JoinRoomMsg, JoinRoomResponseMsg, LeaveRoomMsg, MessageType,
    RelayedWritesMsg, RosterMsg, ServerMessage, StateWritesMsg,
};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `ClientMessage` to wire format.
pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ClientMessage::JoinRoom(m) => encode_message(MessageType::JoinRoom, m),
        ClientMessage::LeaveRoom(m) => encode_message(MessageType::LeaveRoom, m),
        ClientMessage::StateWrites(m) => encode_message(MessageType::StateWrites, m),
    }
}

/// Encode a `ServerMessage` to wire format.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ServerMessage::JoinRoomResponse(m) => encode_message(MessageType::JoinRoomResponse, m),
        ServerMessage::Roster(m) => encode_message(MessageType::Roster, m),
        ServerMessage::RelayedWrites(m) => encode_message(MessageType::RelayedWrites, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    MessageType::from_byte(data[0]).ok_or(ProtocolError::UnknownMessageType(data[0]))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `ClientMessage`.
pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    match decode_message_type(data)? {
        MessageType::JoinRoom => Ok(ClientMessage::JoinRoom(decode_payload::<JoinRoomMsg>(
            data,
        )?)),
        MessageType::LeaveRoom => Ok(ClientMessage::LeaveRoom(decode_payload::<LeaveRoomMsg>(
            data,
        )?)),
        MessageType::StateWrites => Ok(ClientMessage::StateWrites(decode_payload::<
            StateWritesMsg,
        >(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

/// Decode raw wire data into a `ServerMessage`.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    match decode_message_type(data)? {
        MessageType::JoinRoomResponse => Ok(ServerMessage::JoinRoomResponse(decode_payload::<
            JoinRoomResponseMsg,
        >(data)?)),
        MessageType::Roster => Ok(ServerMessage::Roster(decode_payload::<RosterMsg>(data)?)),
        MessageType::RelayedWrites => Ok(ServerMessage::RelayedWrites(decode_payload::<
            RelayedWritesMsg,
        >(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::messages::RosterEntry;
    use crate::store::{Scope, StateWrite};
    use serde_json::json;

    #[test]
    fn roundtrip_join_room() {
        let msg = ClientMessage::JoinRoom(JoinRoomMsg {
            room_code: "ABCD-1234".to_string(),
            name: "Ada".to_string(),
            protocol_version: PROTOCOL_VERSION,
        });
        let encoded = encode_client_message(&msg).unwrap();
        assert_eq!(encoded[0], MessageType::JoinRoom as u8);
        assert_eq!(decode_client_message(&encoded).unwrap(), msg);
    }

    #[test]
    fn state_writes_carry_json_values() {
        let msg = ClientMessage::StateWrites(StateWritesMsg {
            writes: vec![
                StateWrite {
                    scope: Scope::Room,
                    key: "events".to_string(),
                    value: json!(["Meeting started."]),
                    version: 3,
                    writer: "h".to_string(),
                },
                StateWrite {
                    scope: Scope::Peer("g".to_string()),
                    key: "summon_to".to_string(),
                    value: json!({"x": 1.5, "room": "brig", "lock": true}),
                    version: 1,
                    writer: "h".to_string(),
                },
            ],
        });
        let encoded = encode_client_message(&msg).unwrap();
        assert_eq!(decode_client_message(&encoded).unwrap(), msg);
    }

    #[test]
    fn roundtrip_roster() {
        let msg = ServerMessage::Roster(RosterMsg {
            peers: vec![RosterEntry {
                peer_id: "a".to_string(),
                name: "Ada".to_string(),
            }],
            host_id: Some("a".to_string()),
        });
        let encoded = encode_server_message(&msg).unwrap();
        assert_eq!(decode_server_message(&encoded).unwrap(), msg);
    }

    #[test]
    fn empty_message_rejected() {
        assert_eq!(
            decode_client_message(&[]).unwrap_err(),
            ProtocolError::EmptyMessage
        );
    }

    #[test]
    fn unknown_type_rejected() {
        assert_eq!(
            decode_server_message(&[0x7F, 0x90]).unwrap_err(),
            ProtocolError::UnknownMessageType(0x7F)
        );
    }

    #[test]
    fn server_type_is_not_a_client_message() {
        let msg = ServerMessage::Roster(RosterMsg {
            peers: vec![],
            host_id: None,
        });
        let encoded = encode_server_message(&msg).unwrap();
        assert!(matches!(
            decode_client_message(&encoded),
            Err(ProtocolError::UnknownMessageType(0x11))
        ));
    }

    #[test]
    fn oversized_payload_rejected() {
        let blob = "x".repeat(MAX_MESSAGE_SIZE);
        let msg = ClientMessage::StateWrites(StateWritesMsg {
            writes: vec![StateWrite {
                scope: Scope::Room,
                key: "itemsJsonV1".to_string(),
                value: json!(blob),
                version: 1,
                writer: "h".to_string(),
            }],
        });
        assert!(matches!(
            encode_client_message(&msg),
            Err(ProtocolError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn truncated_payload_is_deserialize_error() {
        let msg = ClientMessage::JoinRoom(JoinRoomMsg {
            room_code: String::new(),
            name: "Ada".to_string(),
            protocol_version: PROTOCOL_VERSION,
        });
        let encoded = encode_client_message(&msg).unwrap();
        let cut = &encoded[..encoded.len() - 2];
        assert!(matches!(
            decode_client_message(cut),
            Err(ProtocolError::DeserializeError(_))
        ));
    }
}
