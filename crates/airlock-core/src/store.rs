//! Replicated key/value space with room and peer scopes.
//!
//! Every key carries a `(version, writer)` stamp. A writer stamps a new value
//! one above the highest version it has seen for that key, and a replica only
//! applies a write whose stamp is strictly newer, so redelivery is a no-op
//! and each key converges on the same value everywhere. There is no ordering
//! across keys.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::peer::{PeerId, PeerProfile, PeerSession, PeerState};
use crate::room::{RoomConfig, RoomState};
use crate::schema::{Schema, SchemaError, diff_fields};

/// Which bag a key lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    Room,
    Peer(PeerId),
}

/// One replicated key write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateWrite {
    pub scope: Scope,
    pub key: String,
    pub value: Value,
    pub version: u64,
    pub writer: PeerId,
}

impl StateWrite {
    fn stamp(&self) -> (u64, &str) {
        (self.version, self.writer.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteError {
    Schema(SchemaError),
    /// The writer is not allowed to touch this key.
    Unauthorized {
        writer: PeerId,
        scope: Scope,
        key: String,
    },
    UnknownPeer(PeerId),
}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Schema(e) => write!(f, "{e}"),
            Self::Unauthorized { writer, scope, key } => {
                write!(f, "{writer} may not write {key} in {scope:?}")
            },
            Self::UnknownPeer(id) => write!(f, "unknown peer: {id}"),
        }
    }
}

impl std::error::Error for WriteError {}

impl From<SchemaError> for WriteError {
    fn from(e: SchemaError) -> Self {
        Self::Schema(e)
    }
}

/// Outcome of applying a remote write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Updated,
    /// Already seen this stamp or a newer one.
    Stale,
}

/// Local replica of the shared room.
#[derive(Debug)]
pub struct SharedStateStore {
    local: PeerId,
    host: Option<PeerId>,
    room: RoomState,
    peers: BTreeMap<PeerId, PeerSession>,
    peer_defaults: PeerState,
    versions: HashMap<(Scope, String), (u64, PeerId)>,
    outbox: Vec<StateWrite>,
}

impl SharedStateStore {
    pub fn new(local: PeerId, profile: PeerProfile, config: &RoomConfig) -> Self {
        let peer_defaults = config.peer_defaults();
        let mut peers = BTreeMap::new();
        peers.insert(
            local.clone(),
            PeerSession::new(local.clone(), profile, &peer_defaults),
        );
        Self {
            local,
            host: None,
            room: config.room_defaults(),
            peers,
            peer_defaults,
            versions: HashMap::new(),
            outbox: Vec::new(),
        }
    }

    pub fn local_id(&self) -> &str {
        &self.local
    }

    pub fn host_id(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn is_host(&self) -> bool {
        self.host.as_deref() == Some(self.local.as_str())
    }

    pub fn set_host(&mut self, host: Option<PeerId>) {
        self.host = host;
    }

    pub fn room(&self) -> &RoomState {
        &self.room
    }

    pub fn peer(&self, id: &str) -> Option<&PeerSession> {
        self.peers.get(id)
    }

    pub fn local_peer(&self) -> Option<&PeerSession> {
        self.peers.get(&self.local)
    }

    pub fn peers(&self) -> impl Iterator<Item = &PeerSession> {
        self.peers.values()
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.peers.keys().cloned().collect()
    }

    /// Read a room key as JSON.
    pub fn room_field(&self, key: &str) -> Option<Value> {
        self.room.field(key)
    }

    /// Read a peer key as JSON.
    pub fn peer_field(&self, id: &str, key: &str) -> Option<Value> {
        self.peers.get(id)?.state.field(key)
    }

    /// Latest `(version, writer)` stamp seen for a key.
    pub fn version_of(&self, scope: &Scope, key: &str) -> Option<(u64, &str)> {
        self.versions
            .get(&(scope.clone(), key.to_string()))
            .map(|(v, w)| (*v, w.as_str()))
    }

    /// Register a peer with default state. Returns false if already known.
    pub fn add_peer(&mut self, id: PeerId, profile: PeerProfile) -> bool {
        if self.peers.contains_key(&id) {
            return false;
        }
        let session = PeerSession::new(id.clone(), profile, &self.peer_defaults);
        self.peers.insert(id, session);
        true
    }

    /// Forget a departed peer and all version stamps of its bag.
    pub fn remove_peer(&mut self, id: &str) -> bool {
        if id == self.local || self.peers.remove(id).is_none() {
            return false;
        }
        self.versions
            .retain(|(scope, _), _| !matches!(scope, Scope::Peer(p) if p == id));
        true
    }

    /// Whether `writer` may write `key` in `scope`.
    pub fn may_write(&self, writer: &str, scope: &Scope, key: &str) -> bool {
        let writer_is_host = self.host.as_deref() == Some(writer);
        match scope {
            Scope::Room => writer_is_host,
            Scope::Peer(owner) => {
                owner == writer || (writer_is_host && PeerState::is_host_trusted(key))
            },
        }
    }

    /// Write a single room key.
    pub fn set_room(&mut self, key: &str, value: Value) -> Result<(), WriteError> {
        self.authorize(&Scope::Room, key)?;
        self.room.apply_field(key, value.clone())?;
        self.stamp_local(Scope::Room, key, value);
        Ok(())
    }

    /// Write a single peer key. With `broadcast == false` the value stays local.
    pub fn set_peer(
        &mut self,
        id: &str,
        key: &str,
        value: Value,
        broadcast: bool,
    ) -> Result<(), WriteError> {
        let scope = Scope::Peer(id.to_string());
        self.authorize(&scope, key)?;
        let session = self
            .peers
            .get_mut(id)
            .ok_or_else(|| WriteError::UnknownPeer(id.to_string()))?;
        session.state.apply_field(key, value.clone())?;
        if broadcast {
            self.stamp_local(scope, key, value);
        }
        Ok(())
    }

    /// Mutate room state through a closure and write every changed key.
    /// Returns the number of keys written.
    pub fn update_room(&mut self, f: impl FnOnce(&mut RoomState)) -> Result<usize, WriteError> {
        let mut next = self.room.clone();
        f(&mut next);
        self.commit_room(next)
    }

    /// Replace room state with `next`, writing only the keys that differ.
    pub fn commit_room(&mut self, next: RoomState) -> Result<usize, WriteError> {
        let changed = diff_fields(&self.room, &next)?;
        if changed.is_empty() {
            return Ok(0);
        }
        for (key, _) in &changed {
            self.authorize(&Scope::Room, key)?;
        }
        self.room = next;
        let n = changed.len();
        for (key, value) in changed {
            self.stamp_local(Scope::Room, &key, value);
        }
        Ok(n)
    }

    /// Mutate a peer's state through a closure and write every changed key.
    pub fn update_peer(
        &mut self,
        id: &str,
        broadcast: bool,
        f: impl FnOnce(&mut PeerState),
    ) -> Result<usize, WriteError> {
        let mut next = self
            .peers
            .get(id)
            .ok_or_else(|| WriteError::UnknownPeer(id.to_string()))?
            .state
            .clone();
        f(&mut next);
        self.commit_peer(id, next, broadcast)
    }

    /// Replace a peer's state with `next`, writing only the keys that differ.
    pub fn commit_peer(
        &mut self,
        id: &str,
        next: PeerState,
        broadcast: bool,
    ) -> Result<usize, WriteError> {
        let scope = Scope::Peer(id.to_string());
        let current = &self
            .peers
            .get(id)
            .ok_or_else(|| WriteError::UnknownPeer(id.to_string()))?
            .state;
        let changed = diff_fields(current, &next)?;
        if changed.is_empty() {
            return Ok(0);
        }
        for (key, _) in &changed {
            self.authorize(&scope, key)?;
        }
        if let Some(session) = self.peers.get_mut(id) {
            session.state = next;
        }
        let n = changed.len();
        if broadcast {
            for (key, value) in changed {
                self.stamp_local(scope.clone(), &key, value);
            }
        }
        Ok(n)
    }

    /// Apply a write received from another replica.
    pub fn apply_remote(&mut self, write: StateWrite) -> Result<Applied, WriteError> {
        if !self.may_write(&write.writer, &write.scope, &write.key) {
            return Err(WriteError::Unauthorized {
                writer: write.writer,
                scope: write.scope,
                key: write.key,
            });
        }
        let slot = (write.scope.clone(), write.key.clone());
        if let Some((version, writer)) = self.versions.get(&slot)
            && write.stamp() <= (*version, writer.as_str())
        {
            return Ok(Applied::Stale);
        }
        match &write.scope {
            Scope::Room => self.room.apply_field(&write.key, write.value)?,
            Scope::Peer(owner) => {
                let session = self
                    .peers
                    .get_mut(owner)
                    .ok_or_else(|| WriteError::UnknownPeer(owner.clone()))?;
                session.state.apply_field(&write.key, write.value)?;
            },
        }
        self.versions.insert(slot, (write.version, write.writer));
        Ok(Applied::Updated)
    }

    /// Queue every key this replica is responsible for, at its current stamp,
    /// so a newly joined peer converges without a stateful relay.
    pub fn rebroadcast_owned(&mut self) -> Result<usize, WriteError> {
        let mut queued = Vec::new();
        if self.is_host() {
            for (key, value) in self.room.to_fields()? {
                queued.push((Scope::Room, key, value));
            }
        }
        if let Some(me) = self.peers.get(&self.local) {
            for (key, value) in me.state.to_fields()? {
                queued.push((Scope::Peer(self.local.clone()), key, value));
            }
        }
        for ((scope, key), (_, writer)) in &self.versions {
            if let Scope::Peer(owner) = scope
                && owner != &self.local
                && writer == &self.local
                && let Some(value) = self.peer_field(owner, key)
            {
                queued.push((scope.clone(), key.clone(), value));
            }
        }
        let n = queued.len();
        for (scope, key, value) in queued {
            let version = self
                .versions
                .get(&(scope.clone(), key.clone()))
                .map_or(0, |(v, _)| *v);
            self.outbox.push(StateWrite {
                scope,
                key,
                value,
                version,
                writer: self.local.clone(),
            });
        }
        Ok(n)
    }

    /// Take all writes queued for the transport.
    pub fn drain_outbox(&mut self) -> Vec<StateWrite> {
        std::mem::take(&mut self.outbox)
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.outbox.is_empty()
    }

    fn authorize(&self, scope: &Scope, key: &str) -> Result<(), WriteError> {
        if self.may_write(&self.local, scope, key) {
            Ok(())
        } else {
            Err(WriteError::Unauthorized {
                writer: self.local.clone(),
                scope: scope.clone(),
                key: key.to_string(),
            })
        }
    }

    fn stamp_local(&mut self, scope: Scope, key: &str, value: Value) {
        let slot = (scope.clone(), key.to_string());
        let version = self.versions.get(&slot).map_or(0, |(v, _)| *v) + 1;
        self.versions.insert(slot, (version, self.local.clone()));
        self.outbox.push(StateWrite {
            scope,
            key: key.to_string(),
            value,
            version,
            writer: self.local.clone(),
        });
    }
}
