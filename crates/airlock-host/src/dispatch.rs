//! Item and pet request handlers.
//!
//! Every handler validates against the tick's [`World`] and either applies
//! its whole effect or returns [`Rejected`] without touching anything. A
//! rejected request still counts as processed.

use airlock_core::event_log::append_event;
use airlock_core::geometry::{Vec3, forward_xz};
use airlock_core::items::{HOLDER_GONE, HOLDER_USED};
use airlock_core::peer::{MAX_ENERGY, PeerState};
use airlock_core::pets::PetMode;
use airlock_core::request::{Request, UseTarget};
use airlock_core::station::StationLayout;

use crate::config::SimTuning;
use crate::devices::effect_for;
use crate::world::World;

/// Height above the thrower's feet at which a thrown item leaves the hand.
const THROW_RELEASE_HEIGHT: f32 = 1.0;

/// Why a request had no effect. Only ever logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected(pub &'static str);

impl std::fmt::Display for Rejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

pub type Outcome = Result<(), Rejected>;

fn stow(peer: &mut PeerState, item: &str) {
    let carried = peer.carry.as_deref() == Some(item);
    if !carried && !peer.backpack.iter().any(|i| i == item) {
        peer.backpack.push(item.to_string());
    }
}

fn unstow(peer: &mut PeerState, item: &str) {
    peer.backpack.retain(|i| i != item);
    if peer.carry.as_deref() == Some(item) {
        peer.carry = None;
    }
}

pub fn pickup(world: &mut World, req: &Request, tuning: &SimTuning) -> Outcome {
    let now = world.now;
    let peer = world
        .peers
        .get_mut(&req.peer)
        .ok_or(Rejected("unknown peer"))?;
    if now < peer.pickup_until {
        return Err(Rejected("pickup cooldown"));
    }
    let item = world
        .items
        .iter_mut()
        .find(|i| i.id == req.target)
        .ok_or(Rejected("no such item"))?;
    if !item.is_free() {
        return Err(Rejected("item not free"));
    }
    if peer.backpack.len() >= tuning.bag_capacity {
        return Err(Rejected("bag full"));
    }
    if peer.pos().distance_xz(item.pos()) > tuning.pickup_radius {
        return Err(Rejected("out of reach"));
    }

    item.holder = Some(req.peer.clone());
    item.zero_velocity();
    stow(peer, &item.id);
    peer.pickup_until = now + tuning.pickup_cooldown_ms;
    Ok(())
}

pub fn drop_item(world: &mut World, req: &Request, tuning: &SimTuning) -> Outcome {
    let peer = world
        .peers
        .get_mut(&req.peer)
        .ok_or(Rejected("unknown peer"))?;
    let item = world
        .items
        .iter_mut()
        .find(|i| i.id == req.target && i.is_held_by(&req.peer))
        .ok_or(Rejected("not holding item"))?;

    item.holder = None;
    item.zero_velocity();
    item.set_pos(Vec3::new(peer.x, tuning.floor_y + tuning.drop_height, peer.z));
    unstow(peer, &req.target);
    Ok(())
}

pub fn throw_item(world: &mut World, req: &Request, tuning: &SimTuning) -> Outcome {
    let peer = world
        .peers
        .get_mut(&req.peer)
        .ok_or(Rejected("unknown peer"))?;
    let item = world
        .items
        .iter_mut()
        .find(|i| i.id == req.target && i.is_held_by(&req.peer))
        .ok_or(Rejected("not holding item"))?;

    let yaw = req.yaw_override().unwrap_or(peer.yaw);
    let (fx, fz) = forward_xz(yaw);
    item.holder = None;
    item.set_pos(peer.pos().add(Vec3::new(0.0, THROW_RELEASE_HEIGHT, 0.0)));
    item.vx = fx * tuning.throw_speed;
    item.vy = tuning.throw_up_speed;
    item.vz = fz * tuning.throw_speed;
    unstow(peer, &req.target);
    Ok(())
}

/// `use` with a target of `eat|<item>` or `<device>|<item>`.
pub fn use_item(
    world: &mut World,
    req: &Request,
    layout: &StationLayout,
) -> Outcome {
    let target = UseTarget::parse(&req.target).ok_or(Rejected("bad use target"))?;
    let name = world.name_of(&req.peer);
    let peer = world
        .peers
        .get_mut(&req.peer)
        .ok_or(Rejected("unknown peer"))?;
    let item = world
        .items
        .iter_mut()
        .find(|i| i.id == target.item() && i.is_held_by(&req.peer))
        .ok_or(Rejected("not holding item"))?;

    match &target {
        UseTarget::Eat { .. } => {
            if !item.kind.is_edible() {
                return Err(Rejected("not edible"));
            }
            if !peer.infected {
                peer.energy = MAX_ENERGY;
            }
            item.holder = Some(HOLDER_GONE.to_string());
            unstow(peer, target.item());
            Ok(())
        },
        UseTarget::Device { device, .. } => {
            let station = layout.device(device).ok_or(Rejected("no such device"))?;
            if peer.pos().distance_xz(station.pos) > station.radius {
                return Err(Rejected("too far from device"));
            }
            let effect = effect_for(item.kind, device).ok_or(Rejected("no effect"))?;
            item.holder = Some(HOLDER_USED.to_string());
            unstow(peer, target.item());
            let level = effect.meter.add(&mut world.room, effect.delta);
            append_event(
                &mut world.room,
                format!(
                    "{name} serviced the {device}. {} at {}%.",
                    effect.meter.label(),
                    level.round()
                ),
            );
            Ok(())
        },
    }
}

/// Switch the requester's pet between `follow`, `stay` and `seekCure`.
pub fn pet_mode(world: &mut World, req: &Request) -> Outcome {
    let mode: PetMode = serde_json::from_value(serde_json::Value::String(req.target.clone()))
        .map_err(|_| Rejected("unknown pet mode"))?;
    let pet = world
        .pets
        .iter_mut()
        .find(|p| p.owner == req.peer)
        .ok_or(Rejected("no pet"))?;
    if pet.mode != mode {
        pet.mode = mode;
        pet.clear_seek();
    }
    Ok(())
}
