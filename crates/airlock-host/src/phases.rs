//! Day, meeting and night cycle.
//!
//! The deadline of the current phase is the replicated `phaseEndsAt`;
//! `timer` is derived from it every tick. In clock mode the deadline is the
//! next boundary minute on the shared [`GameClock`].

use airlock_core::clock::GameClock;
use airlock_core::event_log::append_event;
use airlock_core::room::{Phase, PhaseSchedule, VoteOutcome};
use airlock_core::station::StationLayout;

use crate::votes;
use crate::world::World;

/// Remembers the last transition this host fired so that observing an
/// expired deadline on consecutive ticks cannot advance twice.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PhaseGuard {
    last: Option<(Phase, u32)>,
}

impl PhaseGuard {
    fn claim(&mut self, from: Phase, day: u32) -> bool {
        if self.last == Some((from, day)) {
            return false;
        }
        self.last = Some((from, day));
        true
    }
}

/// Which phase the clock says it should be.
pub fn clock_phase(clock: &GameClock, now: u64, schedule: PhaseSchedule) -> Option<Phase> {
    let PhaseSchedule::Clock {
        dusk_minute,
        resolve_minute,
        dawn_minute,
    } = schedule
    else {
        return None;
    };
    let (dawn, dusk, resolve) = (dawn_minute as f64, dusk_minute as f64, resolve_minute as f64);
    Some(if clock.within(now, dawn, dusk) {
        Phase::Day
    } else if clock.within(now, dusk, resolve) {
        Phase::Meeting
    } else {
        Phase::Night
    })
}

fn next_boundary(schedule: PhaseSchedule, phase: Phase) -> Option<f64> {
    let PhaseSchedule::Clock {
        dusk_minute,
        resolve_minute,
        dawn_minute,
    } = schedule
    else {
        return None;
    };
    match phase {
        Phase::Day => Some(dusk_minute as f64),
        Phase::Meeting => Some(resolve_minute as f64),
        Phase::Night => Some(dawn_minute as f64),
        Phase::Lobby | Phase::End => None,
    }
}

fn end_game(world: &mut World, line: &str) {
    world.room.phase = Phase::End;
    world.room.phase_ends_at = 0;
    world.room.timer = 0;
    append_event(&mut world.room, line);
    tracing::info!(day = world.room.day, "Game over: {line}");
}

/// Fire the transition out of the current phase.
fn advance(
    world: &mut World,
    schedule: PhaseSchedule,
    layout: &StationLayout,
    outcome: VoteOutcome,
) -> Phase {
    let now = world.now;
    let next = match world.room.phase {
        Phase::Day => {
            append_event(&mut world.room, "Meeting started.");
            Phase::Meeting
        },
        Phase::Meeting => {
            votes::resolve(world, layout, outcome);
            world.room.meters_updated_at = now;
            append_event(&mut world.room, "Night falls…");
            Phase::Night
        },
        Phase::Night => {
            if world.room.end_after_last_day && world.room.day >= world.room.max_days {
                end_game(world, "The station survived.");
                return Phase::End;
            }
            world.room.day = (world.room.day + 1).min(world.room.max_days);
            let line = format!("DAY {} begins.", world.room.day);
            append_event(&mut world.room, line);
            Phase::Day
        },
        other => return other,
    };
    world.room.phase = next;
    world.room.phase_ends_at = match schedule {
        PhaseSchedule::Timer => now + u64::from(world.room.length_of(next)) * 1000,
        PhaseSchedule::Clock { .. } => 0,
    };
    tracing::info!(phase = ?next, day = world.room.day, "Phase transition");
    next
}

/// Run one tick of the phase machine. Returns the phase entered, if any.
pub fn step(
    world: &mut World,
    schedule: PhaseSchedule,
    layout: &StationLayout,
    outcome: VoteOutcome,
    guard: &mut PhaseGuard,
) -> Option<Phase> {
    if !world.room.phase.is_simulated() {
        return None;
    }
    if world.alive_ids().is_empty() {
        end_game(world, "No one is left aboard.");
        return Some(Phase::End);
    }

    let now = world.now;
    let mut entered = None;
    match schedule {
        PhaseSchedule::Timer => {
            if world.room.phase_ends_at == 0 {
                let len = world.room.length_of(world.room.phase);
                world.room.phase_ends_at = now + u64::from(len) * 1000;
            }
            if now >= world.room.phase_ends_at
                && guard.claim(world.room.phase, world.room.day)
            {
                entered = Some(advance(world, schedule, layout, outcome));
            }
        },
        PhaseSchedule::Clock { .. } => {
            let clock = GameClock::from_room(&world.room);
            if let Some(desired) = clock_phase(&clock, now, schedule)
                && desired != world.room.phase
                && guard.claim(world.room.phase, world.room.day)
            {
                entered = Some(advance(world, schedule, layout, outcome));
            }
            if let Some(minute) = next_boundary(schedule, world.room.phase)
                && let Some(ms) = clock.ms_until_minute(now, minute)
            {
                world.room.phase_ends_at = now + ms;
            }
        },
    }

    if world.room.phase.is_simulated() {
        let remaining = world.room.phase_ends_at.saturating_sub(now);
        world.room.timer = remaining.div_ceil(1000) as i64;
    }
    entered
}
