//! Role abilities requested with `reqType = ability`.
//!
//! Cooldowns are absolute unlock timestamps on the actor's own state
//! (`cd_*_until`), checked against the tick time like the pickup cooldown.

use airlock_core::event_log::append_event;
use airlock_core::geometry::{Vec3, forward_xz, ray_circle_xz, right_xz};
use airlock_core::peer::{PeerId, PeerState, Role, ScanResult};
use airlock_core::request::{AbilityKind, Request};

use crate::config::SimTuning;
use crate::dispatch::{Outcome, Rejected};
use crate::world::World;

/// Muzzle offset from the shooter's feet: up, to the right hand, forward.
const MUZZLE_UP: f32 = 1.4;
const MUZZLE_RIGHT: f32 = 0.3;
const MUZZLE_FORWARD: f32 = 0.4;

/// Cooldown and reach of one ability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbilitySpec {
    /// Lock shown by the client right after pressing the key.
    pub client_ms: u64,
    /// Lock the host enforces.
    pub server_ms: u64,
    pub range: f32,
}

impl AbilitySpec {
    pub fn for_kind(kind: AbilityKind, tuning: &SimTuning) -> Self {
        match kind {
            AbilityKind::Shoot => Self {
                client_ms: tuning.shoot_client_cooldown_ms,
                server_ms: tuning.shoot_cooldown_ms,
                range: tuning.shoot_range,
            },
            AbilityKind::Bite => Self {
                client_ms: tuning.bite_client_cooldown_ms,
                server_ms: tuning.bite_cooldown_ms,
                range: tuning.bite_radius,
            },
            AbilityKind::Scan => Self {
                client_ms: tuning.scan_client_cooldown_ms,
                server_ms: tuning.scan_cooldown_ms,
                range: tuning.scan_range,
            },
        }
    }
}

pub fn resolve(world: &mut World, req: &Request, tuning: &SimTuning) -> Outcome {
    let kind = AbilityKind::parse(&req.target).ok_or(Rejected("unknown ability"))?;
    let spec = AbilitySpec::for_kind(kind, tuning);
    match kind {
        AbilityKind::Shoot => shoot(world, req, spec, tuning),
        AbilityKind::Bite => bite(world, req, spec, tuning),
        AbilityKind::Scan => scan(world, req, spec),
    }
}

/// The closest other living peer within `range` that passes `eligible`.
fn nearest(
    world: &World,
    from: &str,
    range: f32,
    eligible: impl Fn(&PeerState) -> bool,
) -> Option<PeerId> {
    let origin = world.peer(from)?.pos();
    world
        .alive_ids()
        .into_iter()
        .filter(|id| id != from)
        .filter_map(|id| {
            let p = world.peer(&id)?;
            let d = origin.distance_xz(p.pos());
            (d <= range && eligible(p)).then_some((d, id))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, id)| id)
}

/// Validate an explicitly named target, or fall back to the nearest one.
fn pick_target(
    world: &World,
    req: &Request,
    range: f32,
    eligible: impl Fn(&PeerState) -> bool,
) -> Result<PeerId, Rejected> {
    let Some(named) = req.payload_target() else {
        return nearest(world, &req.peer, range, eligible).ok_or(Rejected("no target in range"));
    };
    if named == req.peer || !world.is_alive(named) {
        return Err(Rejected("invalid target"));
    }
    let (Some(me), Some(them)) = (world.peer(&req.peer), world.peer(named)) else {
        return Err(Rejected("invalid target"));
    };
    if me.pos().distance_xz(them.pos()) > range {
        return Err(Rejected("target out of range"));
    }
    if !eligible(them) {
        return Err(Rejected("target not eligible"));
    }
    Ok(named.to_string())
}

fn shoot(world: &mut World, req: &Request, spec: AbilitySpec, tuning: &SimTuning) -> Outcome {
    let now = world.now;
    let shooter = world.peer(&req.peer).ok_or(Rejected("unknown peer"))?;
    if shooter.role != Some(Role::Security) {
        return Err(Rejected("only security can shoot"));
    }
    if now < shooter.cd_shoot_until {
        return Err(Rejected("shoot cooldown"));
    }

    let yaw = req.yaw_override().unwrap_or(shooter.yaw);
    let (fx, fz) = forward_xz(yaw);
    let (rx, rz) = right_xz(yaw);
    let muzzle = shooter.pos().add(Vec3::new(
        rx * MUZZLE_RIGHT + fx * MUZZLE_FORWARD,
        MUZZLE_UP,
        rz * MUZZLE_RIGHT + fz * MUZZLE_FORWARD,
    ));

    let hit = world
        .alive_ids()
        .into_iter()
        .filter(|id| id != &req.peer)
        .filter_map(|id| {
            let p = world.peer(&id)?;
            let t = ray_circle_xz(muzzle.x, muzzle.z, fx, fz, p.x, p.z, tuning.shoot_hit_radius)?;
            (t <= spec.range).then_some((t, id))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0));

    let reach = hit.as_ref().map_or(spec.range, |(t, _)| *t);
    let tracer_end = muzzle.add(Vec3::new(fx * reach, 0.0, fz * reach));

    let shooter_name = world.name_of(&req.peer);
    if let Some(shooter) = world.peer_mut(&req.peer) {
        shooter.shot_fx_a = Some(muzzle);
        shooter.shot_fx_b = Some(tracer_end);
        shooter.shot_fx_id += 1;
        shooter.shooting_until = now + tuning.shoot_fx_ms;
        shooter.cd_shoot_until = now + spec.server_ms;
    }

    let Some((_, target)) = hit else {
        return Ok(());
    };
    let Some(victim) = world.peer_mut(&target) else {
        return Ok(());
    };
    victim.life = (victim.life - tuning.shoot_damage).max(0.0);
    if victim.life <= 0.0 && world.kill(&target, "shot") {
        let victim_name = world.name_of(&target);
        tracing::info!(shooter = %req.peer, victim = %target, "Peer shot dead");
        append_event(
            &mut world.room,
            format!("{victim_name} was shot by {shooter_name}."),
        );
    }
    Ok(())
}

fn bite(world: &mut World, req: &Request, spec: AbilitySpec, tuning: &SimTuning) -> Outcome {
    let now = world.now;
    let biter = world.peer(&req.peer).ok_or(Rejected("unknown peer"))?;
    if !biter.infected {
        return Err(Rejected("only the infected can bite"));
    }
    if now < biter.cd_bite_until {
        return Err(Rejected("bite cooldown"));
    }
    let target = pick_target(world, req, spec.range, |p| !p.is_compromised())?;

    if let Some(victim) = world.peer_mut(&target) {
        victim.infection_pending = true;
        victim.infection_seed_at = now;
        victim.infection_reveal_until = now + tuning.incubation_ms;
        victim.infection_ratio = 0.0;
    }
    if let Some(biter) = world.peer_mut(&req.peer) {
        biter.cd_bite_until = now + spec.server_ms;
    }
    tracing::debug!(biter = %req.peer, victim = %target, "Infection seeded");
    Ok(())
}

fn scan(world: &mut World, req: &Request, spec: AbilitySpec) -> Outcome {
    let now = world.now;
    let scanner = world.peer(&req.peer).ok_or(Rejected("unknown peer"))?;
    if scanner.role != Some(Role::Doctor) {
        return Err(Rejected("only doctors can scan"));
    }
    if now < scanner.cd_scan_until {
        return Err(Rejected("scan cooldown"));
    }
    let target = pick_target(world, req, spec.range, |_| true)?;
    let infected = world.peer(&target).is_some_and(PeerState::is_compromised);

    if let Some(scanner) = world.peer_mut(&req.peer) {
        scanner.scan_result = Some(ScanResult {
            target,
            infected,
            at: now,
        });
        scanner.cd_scan_until = now + spec.server_ms;
    }
    Ok(())
}
