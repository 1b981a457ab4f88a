//! In-process transport: several peers in one process sharing a hub.
//!
//! Used by tests and single-machine sessions. It follows the same election
//! rules as the relay: the first joiner is host, and when the host leaves the
//! oldest remaining peer takes over.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::directory::{ConnectionError, LinkEvent, PeerLink};
use crate::net::messages::RosterEntry;
use crate::peer::{PeerId, PeerProfile, new_peer_id};
use crate::store::{Scope, StateWrite};

struct Member {
    id: PeerId,
    name: String,
    inbox: VecDeque<LinkEvent>,
}

struct HubInner {
    max_peers: usize,
    closed: bool,
    /// Join order; index 0 is the host.
    members: Vec<Member>,
}

impl HubInner {
    fn host_id(&self) -> Option<PeerId> {
        self.members.first().map(|m| m.id.clone())
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

    fn broadcast_roster(&mut self) {
        let peers = self.roster();
        let host = self.host_id();
        for m in &mut self.members {
            m.inbox.push_back(LinkEvent::Roster {
                peers: peers.clone(),
                host: host.clone(),
            });
        }
    }
}

/// Shared in-process room.
#[derive(Clone)]
pub struct LocalHub {
    inner: Arc<Mutex<HubInner>>,
}

impl LocalHub {
    pub fn new(max_peers: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner {
                max_peers,
                closed: false,
                members: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new peer. Every member, including the new one, receives
    /// the updated roster.
    pub fn join(&self, profile: PeerProfile) -> Result<LocalLink, ConnectionError> {
        let mut hub = self.lock();
        if hub.closed {
            return Err(ConnectionError::Closed);
        }
        if hub.members.len() >= hub.max_peers {
            return Err(ConnectionError::RoomFull);
        }
        let id = new_peer_id();
        hub.members.push(Member {
            id: id.clone(),
            name: profile.name,
            inbox: VecDeque::new(),
        });
        hub.broadcast_roster();
        tracing::debug!(peer = %id, "Joined local hub");
        Ok(LocalLink {
            id,
            hub: Arc::clone(&self.inner),
            left: false,
        })
    }

    /// Refuse further joins and close every link.
    pub fn close(&self) {
        let mut hub = self.lock();
        hub.closed = true;
        for m in &mut hub.members {
            m.inbox.push_back(LinkEvent::Closed);
        }
    }

    pub fn host_id(&self) -> Option<PeerId> {
        self.lock().host_id()
    }

    pub fn peer_count(&self) -> usize {
        self.lock().members.len()
    }
}

/// One peer's handle on a [`LocalHub`]. Dropping it leaves the room.
pub struct LocalLink {
    id: PeerId,
    hub: Arc<Mutex<HubInner>>,
    left: bool,
}

impl LocalLink {
    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.hub.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Leave the room; the next oldest peer becomes host if this one was.
    pub fn leave(&mut self) {
        if self.left {
            return;
        }
        self.left = true;
        let id = self.id.clone();
        let mut hub = self.lock();
        let before = hub.members.len();
        hub.members.retain(|m| m.id != id);
        if hub.members.len() != before {
            hub.broadcast_roster();
        }
    }
}

impl Drop for LocalLink {
    fn drop(&mut self) {
        self.leave();
    }
}

impl PeerLink for LocalLink {
    fn local_peer_id(&self) -> &str {
        &self.id
    }

    fn send(&mut self, writes: Vec<StateWrite>) -> Result<(), ConnectionError> {
        if self.left {
            return Err(ConnectionError::Closed);
        }
        let id = self.id.clone();
        let mut hub = self.lock();
        if hub.closed {
            return Err(ConnectionError::Closed);
        }
        let is_host = hub.host_id().as_deref() == Some(id.as_str());
        let writes: Vec<StateWrite> = writes
            .into_iter()
            .filter(|w| w.writer == id && (is_host || w.scope != Scope::Room))
            .collect();
        if writes.is_empty() {
            return Ok(());
        }
        for m in hub.members.iter_mut().filter(|m| m.id != id) {
            m.inbox.push_back(LinkEvent::Writes {
                from: id.clone(),
                writes: writes.clone(),
            });
        }
        Ok(())
    }

    fn try_recv(&mut self) -> Option<LinkEvent> {
        if self.left {
            return None;
        }
        let id = self.id.clone();
        let mut hub = self.lock();
        hub.members
            .iter_mut()
            .find(|m| m.id == id)
            .and_then(|m| m.inbox.pop_front())
    }
}
