//! One-shot assignments: teams and infected at launch, roles on the first
//! day. Each is latched by a replicated room flag so a new host never
//! repeats them.

use rand::Rng;
use rand::seq::IndexedRandom;

use airlock_core::event_log::append_event;
use airlock_core::items::{items_seeded, seed_items};
use airlock_core::peer::{PeerId, Role, Team};
use airlock_core::pets::{pets_seeded, write_pets};
use airlock_core::room::{Phase, RoomConfig};
use airlock_core::station::StationLayout;

use crate::dispatch::{Outcome, Rejected};
use crate::world::World;

/// Peer ids ordered by lobby slot, then id.
fn by_slot(world: &World) -> Vec<PeerId> {
    let mut ids: Vec<(u8, PeerId)> = world
        .peers
        .iter()
        .map(|(id, p)| (p.slot, id.clone()))
        .collect();
    ids.sort();
    ids.into_iter().map(|(_, id)| id).collect()
}

/// Handle a `launch` request: teams, one infected per team, reveal window.
pub fn launch<R: Rng + ?Sized>(
    world: &mut World,
    requester: &str,
    rng: &mut R,
    config: &RoomConfig,
) -> Outcome {
    if requester != world.host {
        return Err(Rejected("only the host may launch"));
    }
    if world.room.phase != Phase::Lobby || world.room.infected_assigned {
        return Err(Rejected("already launched"));
    }

    for (index, id) in by_slot(world).iter().enumerate() {
        if let Some(p) = world.peer_mut(id)
            && p.team.is_none()
        {
            p.team = Some(Team::for_slot((index % 2) as u8));
        }
    }

    for team in Team::ALL {
        let members: Vec<PeerId> = world
            .peers
            .iter()
            .filter(|(_, p)| p.team == Some(team) && p.is_alive())
            .map(|(id, _)| id.clone())
            .collect();
        if let Some(pick) = members.choose(rng)
            && let Some(p) = world.peer_mut(pick)
        {
            p.infected = true;
            tracing::debug!(peer = %pick, ?team, "Infected assigned");
        }
    }

    world.room.infected_assigned = true;
    world.room.reveal_until = world.now + config.reveal_window_ms;
    append_event(&mut world.room, "Launch! Crews are assembling.");
    tracing::info!(reveal_until = world.room.reveal_until, "Launched");
    Ok(())
}

/// Leave the lobby once the reveal window has closed. Seeds the item and
/// pet blobs if this room never had them.
pub fn start_after_reveal(world: &mut World, config: &RoomConfig, layout: &StationLayout) -> bool {
    let room = &world.room;
    if room.phase != Phase::Lobby || !room.infected_assigned || world.now < room.reveal_until {
        return false;
    }
    let now = world.now;
    let room = &mut world.room;
    room.phase = Phase::Day;
    room.day = 1;
    room.phase_ends_at = 0;
    room.meters_updated_at = now;
    room.clock_anchor_ms = now;
    room.clock_anchor_minutes = config.clock_start_minutes;
    room.clock_scale = config.clock_scale;
    if !items_seeded(room) {
        world.items = seed_items(&layout.item_seeds);
    }
    if !pets_seeded(&world.room) {
        write_pets(&mut world.room, &[]);
        world.pets.clear();
    }
    append_event(&mut world.room, "DAY 1 begins.");
    tracing::info!("Day 1 started");
    true
}

/// Give every peer without a role one from the rotation, on the first day.
/// Latches `rolesAssigned` even when nobody needed a role.
pub fn assign_roles(world: &mut World) -> usize {
    if world.room.phase != Phase::Day || world.room.roles_assigned {
        return 0;
    }
    let mut assigned = 0;
    for (index, id) in by_slot(world).iter().enumerate() {
        if let Some(p) = world.peer_mut(id)
            && p.role.is_none()
        {
            p.role = Some(Role::ROTATION[index % Role::ROTATION.len()]);
            assigned += 1;
        }
    }
    world.room.roles_assigned = true;
    tracing::info!(assigned, "Roles assigned");
    assigned
}
