use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};

use airlock_core::net::messages::{
    JoinFailure, JoinRoomMsg, JoinRoomResponseMsg, RelayedWritesMsg, RosterEntry, RosterMsg,
    ServerMessage,
};
use airlock_core::net::protocol::{PROTOCOL_VERSION, encode_server_message};
use airlock_core::peer::{PeerId, new_peer_id};
use airlock_core::room::generate_room_code;
use airlock_core::store::{Scope, StateWrite};

/// Longest display name accepted on join.
pub const MAX_NAME_LEN: usize = 32;

/// A connected peer in a relay room.
struct RelayPeer {
    id: PeerId,
    name: String,
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

/// A relay room. Members are kept in join order; the host is always one
/// of them, and the oldest survivor inherits the role.
struct RelayRoom {
    members: Vec<RelayPeer>,
    host: Option<PeerId>,
}

impl RelayRoom {
    fn new() -> Self {
        Self {
            members: Vec::new(),
            host: None,
        }
    }

    fn roster(&self) -> Vec<RosterEntry> {
        self.members
            .iter()
            .map(|m| RosterEntry {
                peer_id: m.id.clone(),
                name: m.name.clone(),
            })
            .collect()
    }

    fn is_host(&self, id: &str) -> bool {
        self.host.as_deref() == Some(id)
    }

    /// Send `data` to every member except `skip`.
    fn fan_out(&self, data: &[u8], skip: Option<&str>) {
        for m in self.members.iter().filter(|m| Some(m.id.as_str()) != skip) {
            let _ = m.tx.send(data.to_vec());
        }
    }

    fn broadcast_roster(&self, skip: Option<&str>) {
        let msg = ServerMessage::Roster(RosterMsg {
            peers: self.roster(),
            host_id: self.host.clone(),
        });
        match encode_server_message(&msg) {
            Ok(data) => self.fan_out(&data, skip),
            Err(e) => tracing::error!(error = %e, "Failed to encode roster"),
        }
    }
}

/// What a successful join hands back to the connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Joined {
    pub room_code: String,
    pub peer_id: PeerId,
    pub host_id: PeerId,
    pub roster: Vec<RosterEntry>,
}

impl Joined {
    pub fn response(&self) -> JoinRoomResponseMsg {
        JoinRoomResponseMsg {
            success: true,
            peer_id: Some(self.peer_id.clone()),
            room_code: Some(self.room_code.clone()),
            host_id: Some(self.host_id.clone()),
            roster: self.roster.clone(),
            error: None,
        }
    }
}

/// Refusal sent back on a failed join.
pub fn refusal(failure: JoinFailure) -> JoinRoomResponseMsg {
    JoinRoomResponseMsg {
        success: false,
        peer_id: None,
        room_code: None,
        host_id: None,
        roster: Vec::new(),
        error: Some(failure),
    }
}

/// Manages all relay rooms.
pub struct RelayState {
    rooms: HashMap<String, RelayRoom>,
    max_rooms: usize,
    max_peers: usize,
}

impl RelayState {
    pub fn new(max_rooms: usize, max_peers: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            max_rooms,
            max_peers,
        }
    }

    /// Admit a peer. An empty room code creates a room with the peer as
    /// host. Everyone already in the room receives the new roster.
    pub fn join(
        &mut self,
        join: &JoinRoomMsg,
        tx: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Result<Joined, JoinFailure> {
        if join.protocol_version != PROTOCOL_VERSION {
            return Err(JoinFailure::VersionMismatch {
                expected: PROTOCOL_VERSION,
            });
        }
        let name = join.name.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(JoinFailure::InvalidName);
        }

        let code = if join.room_code.is_empty() {
            if self.rooms.len() >= self.max_rooms {
                return Err(JoinFailure::RelayFull);
            }
            let mut code = generate_room_code();
            while self.rooms.contains_key(&code) {
                code = generate_room_code();
            }
            self.rooms.insert(code.clone(), RelayRoom::new());
            code
        } else {
            join.room_code.clone()
        };

        let max_peers = self.max_peers;
        let room = self.rooms.get_mut(&code).ok_or(JoinFailure::RoomNotFound)?;
        if room.members.len() >= max_peers {
            return Err(JoinFailure::RoomFull);
        }

        let id = new_peer_id();
        room.members.push(RelayPeer {
            id: id.clone(),
            name: name.to_string(),
            tx,
        });
        let host_id = room.host.get_or_insert_with(|| id.clone()).clone();
        room.broadcast_roster(Some(&id));
        tracing::info!(room = %code, peer = %id, host = %host_id, "Peer joined");

        Ok(Joined {
            roster: room.roster(),
            room_code: code,
            peer_id: id,
            host_id,
        })
    }

    /// Remove a peer. Promotes the oldest remaining member when the host
    /// leaves and drops the room once it is empty.
    pub fn leave(&mut self, code: &str, id: &str) {
        let Some(room) = self.rooms.get_mut(code) else {
            return;
        };
        let before = room.members.len();
        room.members.retain(|m| m.id != id);
        if room.members.len() == before {
            return;
        }
        if room.members.is_empty() {
            self.rooms.remove(code);
            tracing::info!(room = %code, "Room closed");
            return;
        }
        if room.is_host(id) {
            room.host = room.members.first().map(|m| m.id.clone());
            tracing::info!(room = %code, host = ?room.host, "Host left, promoted oldest peer");
        }
        room.broadcast_roster(None);
    }

    /// Forward writes from `from` to everyone else in the room. Writes not
    /// authored by the sender, and room writes from a non-host, are dropped.
    /// Returns how many writes were forwarded.
    pub fn relay_writes(&self, code: &str, from: &str, writes: Vec<StateWrite>) -> usize {
        let Some(room) = self.rooms.get(code) else {
            return 0;
        };
        let is_host = room.is_host(from);
        let total = writes.len();
        let writes: Vec<StateWrite> = writes
            .into_iter()
            .filter(|w| w.writer == from && (is_host || w.scope != Scope::Room))
            .collect();
        if writes.len() < total {
            tracing::warn!(
                room = %code,
                peer = %from,
                dropped = total - writes.len(),
                "Unauthorized writes dropped"
            );
        }
        if writes.is_empty() {
            return 0;
        }
        let n = writes.len();
        let msg = ServerMessage::RelayedWrites(RelayedWritesMsg {
            from: from.to_string(),
            writes,
        });
        match encode_server_message(&msg) {
            Ok(data) => room.fan_out(&data, Some(from)),
            Err(e) => {
                tracing::warn!(room = %code, peer = %from, error = %e, "Failed to relay writes");
                return 0;
            },
        }
        n
    }

    pub fn host_of(&self, code: &str) -> Option<&str> {
        self.rooms.get(code)?.host.as_deref()
    }

    pub fn room_exists(&self, code: &str) -> bool {
        self.rooms.contains_key(code)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

/// Shared relay state behind an async RwLock.
pub type SharedRelayState = Arc<RwLock<RelayState>>;

/// Per-connection rate limiter (token bucket).
pub struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64,
}

impl RateLimiter {
    pub fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    pub fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}
