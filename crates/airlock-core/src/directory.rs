//! Room membership, host election status, and the replica that ties a
//! transport link to a local [`SharedStateStore`].
//!
//! Election itself belongs to the transport (first joiner, oldest survivor
//! on leave). This module only consumes its verdict through roster updates,
//! and the simulation layer only asks [`RoomDirectory::is_host`].

use std::time::Duration;

use crate::net::messages::RosterEntry;
use crate::net::protocol::ProtocolError;
use crate::peer::{PeerId, PeerProfile};
use crate::room::{Phase, RoomConfig};
use crate::store::{Applied, SharedStateStore, StateWrite};
use crate::time::EpochMs;

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionError {
    /// The transport is shut down or the link was closed.
    Closed,
    RoomFull,
    RoomNotFound(String),
    Unreachable(String),
    ProtocolMismatch { expected: u8, got: u8 },
    Rejected(String),
    Protocol(ProtocolError),
}

impl std::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "connection closed"),
            Self::RoomFull => write!(f, "room is full"),
            Self::RoomNotFound(code) => write!(f, "room not found: {code}"),
            Self::Unreachable(e) => write!(f, "transport unreachable: {e}"),
            Self::ProtocolMismatch { expected, got } => {
                write!(f, "protocol version mismatch: expected {expected}, got {got}")
            },
            Self::Rejected(e) => write!(f, "join rejected: {e}"),
            Self::Protocol(e) => write!(f, "protocol error: {e}"),
        }
    }
}

impl std::error::Error for ConnectionError {}

impl From<ProtocolError> for ConnectionError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WaitError {
    Exhausted { attempts: u32 },
    Connection(ConnectionError),
}

impl std::fmt::Display for WaitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exhausted { attempts } => write!(f, "gave up after {attempts} attempts"),
            Self::Connection(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for WaitError {}

impl From<ConnectionError> for WaitError {
    fn from(e: ConnectionError) -> Self {
        Self::Connection(e)
    }
}

/// Something that arrived over a link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Roster {
        peers: Vec<RosterEntry>,
        host: Option<PeerId>,
    },
    Writes {
        from: PeerId,
        writes: Vec<StateWrite>,
    },
    Closed,
}

/// A joined transport session. Non-blocking on both ends.
pub trait PeerLink: Send {
    fn local_peer_id(&self) -> &str;
    fn send(&mut self, writes: Vec<StateWrite>) -> Result<(), ConnectionError>;
    fn try_recv(&mut self) -> Option<LinkEvent>;
}

/// Lobby view: who is here and whether this process is the host.
pub trait RoomDirectory {
    fn local_peer_id(&self) -> &str;
    fn host_id(&self) -> Option<&str>;
    fn roster(&self) -> &[RosterEntry];

    fn is_host(&self) -> bool {
        self.host_id() == Some(self.local_peer_id())
    }
}

/// What one [`Replica::pump`] call observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub applied: usize,
    pub rejected: usize,
    pub sent: usize,
    pub roster_changed: bool,
}

/// A local replica of the room bound to one transport link.
pub struct Replica<L: PeerLink> {
    store: SharedStateStore,
    link: L,
    roster: Vec<RosterEntry>,
    last_phase: Phase,
    last_summon_at: EpochMs,
    closed: bool,
}

impl<L: PeerLink> Replica<L> {
    pub fn new(link: L, profile: PeerProfile, config: &RoomConfig) -> Self {
        let local = link.local_peer_id().to_string();
        let store = SharedStateStore::new(local, profile, config);
        Self {
            last_phase: store.room().phase,
            store,
            link,
            roster: Vec::new(),
            last_summon_at: 0,
            closed: false,
        }
    }

    pub fn store(&self) -> &SharedStateStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SharedStateStore {
        &mut self.store
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Drain incoming events into the store, then flush queued writes.
    pub fn pump(&mut self) -> Result<PumpStats, ConnectionError> {
        if self.closed {
            return Err(ConnectionError::Closed);
        }
        let mut stats = PumpStats::default();
        while let Some(event) = self.link.try_recv() {
            match event {
                LinkEvent::Roster { peers, host } => {
                    self.apply_roster(peers, host);
                    stats.roster_changed = true;
                },
                LinkEvent::Writes { from, writes } => {
                    for write in writes {
                        if write.writer != from {
                            tracing::warn!(%from, writer = %write.writer, "Write author does not match sender");
                            stats.rejected += 1;
                            continue;
                        }
                        match self.store.apply_remote(write) {
                            Ok(Applied::Updated) => stats.applied += 1,
                            Ok(Applied::Stale) => {},
                            Err(e) => {
                                tracing::warn!(%from, error = %e, "Dropped replicated write");
                                stats.rejected += 1;
                            },
                        }
                    }
                },
                LinkEvent::Closed => {
                    self.closed = true;
                    return Err(ConnectionError::Closed);
                },
            }
        }
        stats.sent = self.flush()?;
        Ok(stats)
    }

    /// Send everything in the store's outbox.
    pub fn flush(&mut self) -> Result<usize, ConnectionError> {
        let writes = self.store.drain_outbox();
        let n = writes.len();
        if n > 0 {
            self.link.send(writes)?;
        }
        Ok(n)
    }

    /// Clear this peer's own vote once the room has left a meeting.
    /// Returns true when a vote was cleared.
    pub fn clear_vote_after_meeting(&mut self) -> bool {
        let phase = self.store.room().phase;
        let left_meeting = self.last_phase == Phase::Meeting && phase != Phase::Meeting;
        self.last_phase = phase;
        if !left_meeting {
            return false;
        }
        let local = self.store.local_id().to_string();
        let has_vote = self
            .store
            .local_peer()
            .is_some_and(|p| !p.state.vote.is_empty());
        if !has_vote {
            return false;
        }
        self.store
            .update_peer(&local, true, |p| p.vote.clear())
            .is_ok_and(|n| n > 0)
    }

    /// Execute a lockdown order the host wrote on this peer: move into the
    /// cell. Each order (by its `at` stamp) is followed once.
    pub fn follow_summon(&mut self) -> bool {
        let Some(order) = self
            .store
            .local_peer()
            .and_then(|p| p.state.summon_to.clone())
        else {
            return false;
        };
        if order.at <= self.last_summon_at {
            return false;
        }
        self.last_summon_at = order.at;
        let local = self.store.local_id().to_string();
        tracing::info!(room = %order.room, reason = %order.reason, "Following summon");
        self.store
            .update_peer(&local, true, |p| {
                p.x = order.x;
                p.y = order.y;
                p.z = order.z;
            })
            .is_ok()
    }

    fn apply_roster(&mut self, peers: Vec<RosterEntry>, host: Option<PeerId>) {
        let host_changed = self.store.host_id() != host.as_deref();
        let mut joined = false;
        for entry in &peers {
            let profile = PeerProfile {
                name: entry.name.clone(),
            };
            if self.store.add_peer(entry.peer_id.clone(), profile) {
                tracing::info!(peer = %entry.peer_id, name = %entry.name, "Peer joined");
                joined = true;
            }
        }
        for id in self.store.peer_ids() {
            if !peers.iter().any(|e| e.peer_id == id) && self.store.remove_peer(&id) {
                tracing::info!(peer = %id, "Peer left");
            }
        }
        if host_changed {
            tracing::info!(host = ?host, local = %self.store.local_id(), "Host elected");
        }
        self.store.set_host(host);
        self.roster = peers;
        if (joined || host_changed)
            && let Err(e) = self.store.rebroadcast_owned()
        {
            tracing::warn!(error = %e, "Failed to queue resync");
        }
    }
}

impl<L: PeerLink> RoomDirectory for Replica<L> {
    fn local_peer_id(&self) -> &str {
        self.store.local_id()
    }

    fn host_id(&self) -> Option<&str> {
        self.store.host_id()
    }

    fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }
}

/// Retry-poll a replica until `peer` is visible, pumping between attempts.
pub async fn wait_for_peer<L: PeerLink>(
    replica: &mut Replica<L>,
    peer: &str,
    attempts: u32,
    delay: Duration,
) -> Result<(), WaitError> {
    for attempt in 0..attempts {
        replica.pump()?;
        if replica.store().peer(peer).is_some() {
            return Ok(());
        }
        if attempt + 1 < attempts {
            tokio::time::sleep(delay).await;
        }
    }
    Err(WaitError::Exhausted { attempts })
}
