//! Pull-based promotion of incubating infections.
//!
//! A bite only stores a deadline on the victim. Whichever peer is host when
//! the deadline passes promotes it, so handover mid-incubation loses nothing.

use airlock_core::event_log::append_event;

use crate::world::World;

/// Promote every pending infection whose reveal deadline has passed, and
/// refresh the progress ratio of the rest. Returns the promoted peer ids.
pub fn step(world: &mut World) -> Vec<String> {
    let now = world.now;
    let mut promoted = Vec::new();
    for (id, p) in world.peers.iter_mut() {
        if !p.infection_pending {
            continue;
        }
        if p.infected {
            p.infection_pending = false;
            continue;
        }
        if now >= p.infection_reveal_until {
            p.infected = true;
            p.infection_pending = false;
            p.infection_seed_at = 0;
            p.infection_reveal_until = 0;
            p.infection_ratio = 0.0;
            if p.cd_bite_until <= now {
                p.cd_bite_until = 0;
            }
            promoted.push(id.clone());
            continue;
        }
        let span = p.infection_reveal_until.saturating_sub(p.infection_seed_at).max(1);
        let done = now.saturating_sub(p.infection_seed_at) as f32 / span as f32;
        p.infection_ratio = ((done * 10.0).floor() / 10.0).clamp(0.0, 1.0);
    }
    for id in &promoted {
        tracing::info!(peer = %id, "Infection revealed");
        append_event(&mut world.room, "A crew member has turned.");
    }
    promoted
}
