use serde_json::Value;

use airlock_core::geometry::Vec3;
use airlock_core::items::{ItemEntity, read_items, write_items};
use airlock_core::peer::PeerState;
use airlock_core::request::{RequestKind, issue};
use airlock_core::room::{Phase, RoomConfig, RoomState};
use airlock_core::store::SharedStateStore;
use airlock_core::test_helpers::{host_store, owner_writes, place};

use airlock_host::config::HostConfig;
use airlock_host::simulation::{HostSimulation, TickReport};

/// A room as the host `p0` sees it, with a seeded simulation and a manual clock.
pub struct TestRoom {
    pub store: SharedStateStore,
    pub sim: HostSimulation,
    pub config: HostConfig,
    pub now: u64,
}

impl TestRoom {
    pub fn lobby(n: usize) -> Self {
        Self::with_room(n, RoomConfig::default())
    }

    pub fn with_room(n: usize, room: RoomConfig) -> Self {
        let config = HostConfig {
            room,
            ..HostConfig::default()
        };
        let (store, _) = host_store(n, &config.room);
        let sim = HostSimulation::with_seed(&config, 42);
        Self {
            store,
            sim,
            config,
            now: 1_000_000,
        }
    }

    /// Launch from the host and tick until day 1 has started.
    pub fn started(n: usize) -> Self {
        let mut room = Self::lobby(n);
        room.start();
        room
    }

    pub fn start(&mut self) {
        self.request("p0", RequestKind::Launch, "", None);
        self.tick();
        let reveal_until = self.room().reveal_until;
        self.tick_at(reveal_until);
        assert_eq!(self.room().phase, Phase::Day);
    }

    pub fn tick(&mut self) -> TickReport {
        let next = self.now + self.config.tuning.tick_ms;
        self.tick_at(next)
    }

    pub fn tick_at(&mut self, now: u64) -> TickReport {
        self.now = now;
        self.sim
            .tick(&mut self.store, now)
            .expect("host commit must succeed")
    }

    /// Tick at the normal rate until `until` has passed.
    pub fn run_until(&mut self, until: u64) {
        while self.now < until {
            self.tick();
        }
    }

    /// Issue a request as the owning peer would. Returns its `reqId`.
    pub fn request(
        &mut self,
        peer: &str,
        kind: RequestKind,
        target: &str,
        payload: Option<Value>,
    ) -> u64 {
        let mut id = 0;
        owner_writes(&mut self.store, peer, |p| {
            id = issue(p, kind, target, 0.0, payload);
        });
        id
    }

    pub fn place(&mut self, peer: &str, x: f32, z: f32) {
        place(&mut self.store, peer, Vec3::new(x, 0.0, z));
    }

    pub fn vote(&mut self, peer: &str, vote: &str) {
        owner_writes(&mut self.store, peer, |p| p.vote = vote.to_string());
    }

    pub fn peer(&self, id: &str) -> &PeerState {
        &self.store.peer(id).expect("peer exists").state
    }

    pub fn room(&self) -> &RoomState {
        self.store.room()
    }

    pub fn items(&self) -> Vec<ItemEntity> {
        read_items(self.store.room())
    }

    pub fn item(&self, id: &str) -> ItemEntity {
        self.items()
            .into_iter()
            .find(|i| i.id == id)
            .expect("item exists")
    }

    /// Replace the replicated item list, as the host.
    pub fn set_items(&mut self, items: &[ItemEntity]) {
        self.store
            .update_room(|room| write_items(room, items))
            .expect("host may write items");
    }

    pub fn events(&self) -> &[String] {
        &self.room().events
    }
}
