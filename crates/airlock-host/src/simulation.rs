//! The host's authoritative tick.
//!
//! One tick reads a [`World`] snapshot, runs every sub-loop in a fixed
//! order against it, and commits the changed keys in one batch:
//!
//! 1. drain requests (exactly once per `(peer, reqId)`)
//! 2. leave the lobby when the reveal window closes
//! 3. first-day role assignment
//! 4. phase machine and vote resolution
//! 5. incubation
//! 6. station meters
//! 7. item physics
//! 8. pet spawning and steering
//!
//! Everything that must survive host handover lives in replicated state.
//! What this struct holds (the request watermark, the pet spawn guard, the
//! phase guard) is allowed to start empty on a new host.

use rand::SeedableRng;
use rand::rngs::StdRng;

use airlock_core::request::{Request, RequestKind, RequestWatermark};
use airlock_core::room::{Phase, RoomConfig};
use airlock_core::station::StationLayout;
use airlock_core::store::{SharedStateStore, WriteError};
use airlock_core::time::EpochMs;

use crate::abilities;
use crate::config::{HostConfig, SimTuning};
use crate::devices;
use crate::dispatch::{self, Outcome, Rejected};
use crate::incubation;
use crate::pet_ai::{self, PetSpawner};
use crate::phases::{self, PhaseGuard};
use crate::physics;
use crate::roles;
use crate::world::World;

/// What one tick did, for logging and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub applied: usize,
    pub rejected: usize,
    pub entered: Option<Phase>,
    pub written: usize,
}

pub struct HostSimulation {
    room: RoomConfig,
    tuning: SimTuning,
    layout: StationLayout,
    watermark: RequestWatermark,
    spawner: PetSpawner,
    phase_guard: PhaseGuard,
    rng: StdRng,
}

impl HostSimulation {
    pub fn new(config: &HostConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Deterministic simulation for tests.
    pub fn with_seed(config: &HostConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &HostConfig, rng: StdRng) -> Self {
        Self {
            room: config.room.clone(),
            tuning: config.tuning.clone(),
            layout: config.layout.clone(),
            watermark: RequestWatermark::new(),
            spawner: PetSpawner::new(),
            phase_guard: PhaseGuard::default(),
            rng,
        }
    }

    pub fn watermark(&self) -> &RequestWatermark {
        &self.watermark
    }

    /// Run one tick at `now` and commit the result to `store`.
    pub fn tick(&mut self, store: &mut SharedStateStore, now: EpochMs) -> Result<TickReport, WriteError> {
        let mut world = World::snapshot(store, now);
        let mut report = TickReport::default();

        self.drain_requests(&mut world, &mut report);
        if world.room.phase == Phase::End {
            report.written = world.commit(store)?;
            return Ok(report);
        }

        roles::start_after_reveal(&mut world, &self.room, &self.layout);
        roles::assign_roles(&mut world);
        report.entered = phases::step(
            &mut world,
            self.room.schedule,
            &self.layout,
            self.room.vote_outcome,
            &mut self.phase_guard,
        );
        incubation::step(&mut world);
        devices::drain_at_night(&mut world.room, now, self.tuning.night_drain_per_min);

        let dt = self.tuning.dt();
        physics::step_items(&mut world.items, &self.tuning, dt);
        self.spawner.step(&mut world, &self.tuning);
        pet_ai::step_pets(&mut world, &self.tuning, dt, &mut self.rng);

        report.written = world.commit(store)?;
        Ok(report)
    }

    fn drain_requests(&mut self, world: &mut World, report: &mut TickReport) {
        self.watermark.retain(|peer| world.peers.contains_key(peer));

        let pending: Vec<Request> = world
            .peers
            .iter()
            .filter_map(|(id, state)| Request::from_state(id, state))
            .collect();
        for req in pending {
            if !self.watermark.accept(&req.peer, req.id) {
                continue;
            }
            match self.apply(world, &req) {
                Ok(()) => {
                    report.applied += 1;
                    tracing::debug!(peer = %req.peer, req_id = req.id, kind = ?req.kind, "Request applied");
                },
                Err(reason) => {
                    report.rejected += 1;
                    tracing::debug!(peer = %req.peer, req_id = req.id, kind = ?req.kind, %reason, "Request rejected");
                },
            }
        }
    }

    fn apply(&mut self, world: &mut World, req: &Request) -> Outcome {
        if !world.is_alive(&req.peer) {
            return Err(Rejected("requester is dead"));
        }
        if world.room.phase == Phase::End {
            return Err(Rejected("game over"));
        }
        match req.kind {
            RequestKind::Pickup => dispatch::pickup(world, req, &self.tuning),
            RequestKind::Drop => dispatch::drop_item(world, req, &self.tuning),
            RequestKind::Throw => dispatch::throw_item(world, req, &self.tuning),
            RequestKind::Use => dispatch::use_item(world, req, &self.layout),
            RequestKind::PetMode => dispatch::pet_mode(world, req),
            RequestKind::Ability => abilities::resolve(world, req, &self.tuning),
            RequestKind::Launch => roles::launch(world, &req.peer, &mut self.rng, &self.room),
        }
    }
}
