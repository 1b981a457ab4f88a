use serde::{Deserialize, Serialize};

use crate::peer::PeerId;
use crate::store::StateWrite;

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Peer -> Relay
    JoinRoom = 0x01,
    LeaveRoom = 0x02,
    StateWrites = 0x03,

    // Relay -> Peer
    JoinRoomResponse = 0x10,
    Roster = 0x11,
    RelayedWrites = 0x12,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<MessageType> {
        match b {
            0x01 => Some(Self::JoinRoom),
            0x02 => Some(Self::LeaveRoom),
            0x03 => Some(Self::StateWrites),
            0x10 => Some(Self::JoinRoomResponse),
            0x11 => Some(Self::Roster),
            0x12 => Some(Self::RelayedWrites),
            _ => None,
        }
    }
}

/// One roster line: a connected peer and its display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub peer_id: PeerId,
    pub name: String,
}

// --- Peer -> Relay messages ---

/// First message on a new connection. An empty room code creates a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRoomMsg {
    pub room_code: String,
    pub name: String,
    pub protocol_version: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveRoomMsg {
    pub peer_id: PeerId,
}

/// A batch of replicated key writes authored by the sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateWritesMsg {
    pub writes: Vec<StateWrite>,
}

// --- Relay -> Peer messages ---

/// Why the relay refused a join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinFailure {
    RoomFull,
    RoomNotFound,
    /// The relay speaks `expected`.
    VersionMismatch { expected: u8 },
    InvalidName,
    /// The relay is at its room limit.
    RelayFull,
    /// The first message on the connection was not a join.
    NotJoined,
}

impl std::fmt::Display for JoinFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoomFull => write!(f, "room is full"),
            Self::RoomNotFound => write!(f, "room not found"),
            Self::VersionMismatch { expected } => {
                write!(f, "protocol version mismatch (relay speaks {expected})")
            },
            Self::InvalidName => write!(f, "invalid display name"),
            Self::RelayFull => write!(f, "relay has no free rooms"),
            Self::NotJoined => write!(f, "expected a join request"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRoomResponseMsg {
    pub success: bool,
    pub peer_id: Option<PeerId>,
    pub room_code: Option<String>,
    pub host_id: Option<PeerId>,
    pub roster: Vec<RosterEntry>,
    pub error: Option<JoinFailure>,
}

/// Current membership and the elected host, in join order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterMsg {
    pub peers: Vec<RosterEntry>,
    pub host_id: Option<PeerId>,
}

/// Writes from another peer, forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayedWritesMsg {
    pub from: PeerId,
    pub writes: Vec<StateWrite>,
}

/// All messages a peer sends to the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    JoinRoom(JoinRoomMsg),
    LeaveRoom(LeaveRoomMsg),
    StateWrites(StateWritesMsg),
}

/// All messages the relay sends to a peer.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    JoinRoomResponse(JoinRoomResponseMsg),
    Roster(RosterMsg),
    RelayedWrites(RelayedWritesMsg),
}
