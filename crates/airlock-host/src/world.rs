//! One consistent read of replicated state per tick.
//!
//! Sub-loops mutate a [`World`] taken at the top of the tick and never read
//! the store mid-tick, so a tick never mixes fresh and stale fields. The
//! changed keys are written back in one commit at the end.

use std::collections::BTreeMap;

use airlock_core::items::{ItemEntity, read_items, write_items};
use airlock_core::peer::{PeerId, PeerState};
use airlock_core::pets::{PetEntity, read_pets, write_pets};
use airlock_core::room::RoomState;
use airlock_core::store::{SharedStateStore, WriteError};
use airlock_core::time::EpochMs;

pub struct World {
    pub now: EpochMs,
    pub host: PeerId,
    pub room: RoomState,
    pub peers: BTreeMap<PeerId, PeerState>,
    pub items: Vec<ItemEntity>,
    pub pets: Vec<PetEntity>,
    items_at_read: Vec<ItemEntity>,
    pets_at_read: Vec<PetEntity>,
}

impl World {
    pub fn snapshot(store: &SharedStateStore, now: EpochMs) -> Self {
        let room = store.room().clone();
        let peers = store
            .peers()
            .map(|s| (s.id.clone(), s.state.clone()))
            .collect();
        let items = read_items(&room);
        let pets = read_pets(&room);
        Self {
            now,
            host: store.local_id().to_string(),
            items_at_read: items.clone(),
            pets_at_read: pets.clone(),
            room,
            peers,
            items,
            pets,
        }
    }

    pub fn peer(&self, id: &str) -> Option<&PeerState> {
        self.peers.get(id)
    }

    pub fn peer_mut(&mut self, id: &str) -> Option<&mut PeerState> {
        self.peers.get_mut(id)
    }

    /// Peer ids that are alive, in id order.
    pub fn alive_ids(&self) -> Vec<PeerId> {
        self.peers
            .iter()
            .filter(|(id, p)| p.is_alive() && !self.room.is_dead(id))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn is_alive(&self, id: &str) -> bool {
        self.peers
            .get(id)
            .is_some_and(|p| p.is_alive() && !self.room.is_dead(id))
    }

    /// Display name for event lines, falling back to the id.
    pub fn name_of(&self, id: &str) -> String {
        match self.peers.get(id) {
            Some(p) if !p.name.is_empty() => p.name.clone(),
            _ => id.to_string(),
        }
    }

    pub fn item(&self, id: &str) -> Option<&ItemEntity> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn item_mut(&mut self, id: &str) -> Option<&mut ItemEntity> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    /// Mark a peer dead in both its own bag and the room's dead set.
    pub fn kill(&mut self, id: &str, reason: &str) -> bool {
        let now = self.now;
        let Some(p) = self.peers.get_mut(id) else {
            return false;
        };
        if p.dead {
            return false;
        }
        p.dead = true;
        p.dead_ts = now;
        p.death_reason = Some(reason.to_string());
        self.room.mark_dead(id);
        true
    }

    /// Write back every changed key. Returns the number of keys written.
    pub fn commit(mut self, store: &mut SharedStateStore) -> Result<usize, WriteError> {
        if self.items != self.items_at_read {
            write_items(&mut self.room, &self.items);
        }
        if self.pets != self.pets_at_read {
            write_pets(&mut self.room, &self.pets);
        }
        let mut written = store.commit_room(self.room)?;
        for (id, state) in self.peers {
            if store.peer(&id).is_none() {
                continue;
            }
            match store.commit_peer(&id, state, true) {
                Ok(n) => written += n,
                Err(e) => tracing::warn!(peer = %id, error = %e, "Dropped host write"),
            }
        }
        Ok(written)
    }
}
