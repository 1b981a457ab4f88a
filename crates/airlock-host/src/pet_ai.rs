//! Host-side pet simulation: spawning for handlers and per-mode steering.
//!
//! Motion is an exponential approach toward a per-mode target point, so the
//! result depends on elapsed time rather than on the tick count.

use std::collections::HashSet;

use rand::Rng;

use airlock_core::geometry::{Vec3, forward_xz, right_xz, wrap_angle};
use airlock_core::items::ItemEntity;
use airlock_core::peer::{PeerId, PeerState, Role};
use airlock_core::pets::{PetEntity, PetMode, pet_of, pets_seeded};

use crate::config::SimTuning;
use crate::world::World;

/// Yaw that faces from `from` toward `to` on the floor plane.
fn yaw_toward(from: Vec3, to: Vec3) -> Option<f32> {
    let dx = to.x - from.x;
    let dz = to.z - from.z;
    (dx * dx + dz * dz > 1e-6).then(|| dx.atan2(dz))
}

/// Point behind and beside the owner at hover height.
fn follow_point(owner: &PeerState, tuning: &SimTuning) -> Vec3 {
    let (fx, fz) = forward_xz(owner.yaw);
    let (rx, rz) = right_xz(owner.yaw);
    Vec3::new(
        owner.x - fx * tuning.pet_follow_back + rx * tuning.pet_follow_side,
        owner.y + tuning.pet_hover,
        owner.z - fz * tuning.pet_follow_back + rz * tuning.pet_follow_side,
    )
}

fn approach(pet: &mut PetEntity, target: Vec3, face: f32, k: f32) {
    pet.x += (target.x - pet.x) * k;
    pet.y += (target.y - pet.y) * k;
    pet.z += (target.z - pet.z) * k;
    pet.yaw = wrap_angle(pet.yaw + wrap_angle(face - pet.yaw) * k);
}

fn is_cure_candidate(item: &ItemEntity) -> bool {
    item.is_free() && item.kind.is_cure()
}

/// Keep the current cure target while it stays valid, otherwise pick the
/// nearest one in sensing range.
fn acquire<'a>(
    pet: &mut PetEntity,
    items: &'a [ItemEntity],
    tuning: &SimTuning,
) -> Option<&'a ItemEntity> {
    let here = pet.pos();
    if let Some(id) = pet.seek_target_id.as_deref() {
        let kept = items.iter().find(|i| {
            i.id == id && is_cure_candidate(i) && here.distance_xz(i.pos()) <= tuning.pet_lost_radius
        });
        if kept.is_some() {
            return kept;
        }
        pet.seek_target_id = None;
    }
    let found = items
        .iter()
        .filter(|i| is_cure_candidate(i))
        .map(|i| (here.distance_xz(i.pos()), i))
        .filter(|(d, _)| *d <= tuning.pet_sense_radius)
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, i)| i)?;
    pet.seek_target_id = Some(found.id.clone());
    pet.seek_wp_ttl = 0.0;
    Some(found)
}

/// Target point and facing for `seekCure`.
fn seek<R: Rng + ?Sized>(
    pet: &mut PetEntity,
    owner: &PeerState,
    items: &[ItemEntity],
    tuning: &SimTuning,
    dt: f32,
    rng: &mut R,
) -> (Vec3, f32) {
    let here = pet.pos();
    if let Some(item) = acquire(pet, items, tuning) {
        let at = item.pos();
        let (dx, dz) = (here.x - at.x, here.z - at.z);
        let len = (dx * dx + dz * dz).sqrt();
        let (ux, uz) = if len > 1e-3 { (dx / len, dz / len) } else { (0.0, 1.0) };
        let target = Vec3::new(
            at.x + ux * tuning.pet_standoff,
            at.y + tuning.pet_hover,
            at.z + uz * tuning.pet_standoff,
        );
        let face = yaw_toward(here, at).unwrap_or(pet.yaw);
        return (target, face);
    }

    pet.seek_wp_ttl -= dt;
    let wp = Vec3::new(pet.seek_wp_x, here.y, pet.seek_wp_z);
    if pet.seek_wp_ttl <= 0.0 || here.distance_xz(wp) < tuning.pet_waypoint_reach {
        let angle = rng.random_range(0.0..std::f32::consts::TAU);
        let radius = rng.random_range(0.0..=tuning.pet_wander_radius);
        pet.seek_wp_x = owner.x + angle.sin() * radius;
        pet.seek_wp_z = owner.z + angle.cos() * radius;
        pet.seek_wp_ttl = tuning.pet_waypoint_ttl_secs;
    }
    let target = Vec3::new(pet.seek_wp_x, owner.y + tuning.pet_hover, pet.seek_wp_z);
    let face = yaw_toward(here, target).unwrap_or(pet.yaw);
    (target, face)
}

/// Advance every pet by `dt` seconds.
pub fn step_pets<R: Rng + ?Sized>(world: &mut World, tuning: &SimTuning, dt: f32, rng: &mut R) {
    let k = 1.0 - (-tuning.pet_response * dt).exp();
    for pet in world.pets.iter_mut() {
        let Some(owner) = world.peers.get(&pet.owner) else {
            continue;
        };
        let (target, face) = match pet.mode {
            PetMode::Follow => (follow_point(owner, tuning), owner.yaw),
            PetMode::Stay => {
                let here = pet.pos();
                (here, yaw_toward(here, owner.pos()).unwrap_or(pet.yaw))
            },
            PetMode::SeekCure => seek(pet, owner, &world.items, tuning, dt, rng),
        };
        approach(pet, target, face, k);
    }
}

/// Spawns one pet per handler, once.
///
/// The guard is host memory only. Spawning also checks the replicated pet
/// list, so a new host or a returning handler never duplicates a pet.
#[derive(Debug, Default)]
pub struct PetSpawner {
    spawned: HashSet<PeerId>,
}

impl PetSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_spawned(&self, owner: &str) -> bool {
        self.spawned.contains(owner)
    }

    /// Returns the owners that received a pet this tick.
    pub fn step(&mut self, world: &mut World, tuning: &SimTuning) -> Vec<PeerId> {
        if !pets_seeded(&world.room) {
            return Vec::new();
        }
        let mut fresh = Vec::new();
        for (id, p) in &world.peers {
            if !p.role.is_some_and(Role::grants_pet) {
                self.spawned.remove(id);
                continue;
            }
            if !p.is_alive() || self.spawned.contains(id) {
                continue;
            }
            self.spawned.insert(id.clone());
            if pet_of(&world.pets, id).is_some() {
                continue;
            }
            world
                .pets
                .push(PetEntity::new(id, follow_point(p, tuning), p.yaw));
            tracing::info!(owner = %id, "Pet spawned");
            fresh.push(id.clone());
        }
        fresh
    }
}
