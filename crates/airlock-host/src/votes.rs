use std::collections::BTreeMap;

use airlock_core::event_log::append_event;
use airlock_core::peer::{PeerId, SummonOrder};
use airlock_core::room::VoteOutcome;
use airlock_core::station::StationLayout;

use crate::world::World;

/// Vote value meaning "no one".
pub const SKIP_VOTE: &str = "skip";

/// Counted ballots from one meeting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    /// Votes per candidate. Every living peer in the meeting room appears,
    /// with zero if nobody voted for them.
    pub counts: BTreeMap<PeerId, u32>,
    pub skips: u32,
    /// Non-skip ballots cast for a living candidate.
    pub valid: u32,
}

impl Tally {
    /// The unique top candidate holding at least half of the valid votes.
    pub fn winner(&self) -> Option<&str> {
        let top = self.counts.values().copied().max().filter(|c| *c > 0)?;
        let mut leaders = self.counts.iter().filter(|(_, c)| **c == top);
        let (leader, _) = leaders.next()?;
        if leaders.next().is_some() || top * 2 < self.valid {
            return None;
        }
        Some(leader.as_str())
    }
}

/// Count ballots from living peers standing inside the meeting room.
pub fn tally(world: &World, layout: &StationLayout) -> Tally {
    let mut tally = Tally::default();
    let voters: Vec<PeerId> = world
        .alive_ids()
        .into_iter()
        .filter(|id| {
            world
                .peer(id)
                .is_some_and(|p| layout.in_meeting_room(p.pos()))
        })
        .collect();
    for id in &voters {
        tally.counts.insert(id.clone(), 0);
    }
    for id in &voters {
        let Some(vote) = world.peer(id).map(|p| p.vote.as_str()) else {
            continue;
        };
        if vote.is_empty() {
            continue;
        }
        if vote == SKIP_VOTE {
            tally.skips += 1;
            continue;
        }
        if !world.is_alive(vote) {
            continue;
        }
        *tally.counts.entry(vote.to_string()).or_insert(0) += 1;
        tally.valid += 1;
    }
    tally
}

fn summary(world: &World, tally: &Tally) -> String {
    let parts: Vec<String> = tally
        .counts
        .iter()
        .map(|(id, n)| format!("{}={n}", world.name_of(id)))
        .collect();
    format!("Votes: {}; skip={}", parts.join(", "), tally.skips)
}

/// Resolve the meeting's votes and apply the outcome. Returns the winner.
pub fn resolve(world: &mut World, layout: &StationLayout, outcome: VoteOutcome) -> Option<PeerId> {
    let tally = tally(world, layout);
    let line = summary(world, &tally);
    append_event(&mut world.room, line);

    let Some(target) = tally.winner().map(str::to_string) else {
        append_event(&mut world.room, "No one was ejected.");
        return None;
    };
    let name = world.name_of(&target);
    match outcome {
        VoteOutcome::Eject => {
            world.kill(&target, "ejected");
            append_event(&mut world.room, format!("{name} was ejected."));
        },
        VoteOutcome::Lockdown => {
            let now = world.now;
            if let Some(p) = world.peer_mut(&target) {
                p.summon_to = Some(SummonOrder {
                    x: layout.lockdown.pos.x,
                    y: layout.lockdown.pos.y,
                    z: layout.lockdown.pos.z,
                    room: layout.lockdown.room.clone(),
                    lock: true,
                    reason: "vote".to_string(),
                    at: now,
                });
            }
            append_event(
                &mut world.room,
                format!("{name} was sent to the {}.", layout.lockdown.room),
            );
        },
    }
    tracing::info!(peer = %target, ?outcome, "Vote resolved");
    Some(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use airlock_core::room::RoomConfig;
    use airlock_core::test_helpers::host_store;

    fn world(n: usize) -> World {
        let (store, _) = host_store(n, &RoomConfig::default());
        World::snapshot(&store, 50_000)
    }

    fn vote(w: &mut World, voter: &str, target: &str) {
        w.peer_mut(voter).unwrap().vote = target.to_string();
    }

    #[test]
    fn three_for_one_skip_ejects() {
        let layout = StationLayout::default();
        let mut w = world(4);
        vote(&mut w, "p0", "p3");
        vote(&mut w, "p1", "p3");
        vote(&mut w, "p2", "p3");
        vote(&mut w, "p3", SKIP_VOTE);

        let winner = resolve(&mut w, &layout, VoteOutcome::Eject);
        assert_eq!(winner.as_deref(), Some("p3"));
        assert!(w.room.is_dead("p3"));
        assert_eq!(w.peer("p3").unwrap().death_reason.as_deref(), Some("ejected"));
        let events = &w.room.events;
        assert_eq!(
            events[events.len() - 2],
            "Votes: Player1=0, Player2=0, Player3=0, Player4=3; skip=1"
        );
        assert_eq!(events[events.len() - 1], "Player4 was ejected.");
    }

    #[test]
    fn tie_ejects_nobody() {
        let layout = StationLayout::default();
        let mut w = world(4);
        vote(&mut w, "p0", "p2");
        vote(&mut w, "p1", "p2");
        vote(&mut w, "p2", "p3");
        vote(&mut w, "p3", "p3");

        assert_eq!(resolve(&mut w, &layout, VoteOutcome::Eject), None);
        assert!(w.room.dead.is_empty());
        let events = &w.room.events;
        assert_eq!(
            events[events.len() - 2],
            "Votes: Player1=0, Player2=0, Player3=2, Player4=2; skip=0"
        );
    }

    #[test]
    fn plurality_under_half_ejects_nobody() {
        let tally = Tally {
            counts: BTreeMap::from([
                ("a".to_string(), 2),
                ("b".to_string(), 1),
                ("c".to_string(), 1),
                ("d".to_string(), 1),
            ]),
            skips: 0,
            valid: 5,
        };
        assert_eq!(tally.winner(), None);
    }

    #[test]
    fn outsiders_and_dead_do_not_vote() {
        let layout = StationLayout::default();
        let mut w = world(4);
        w.peer_mut("p0").unwrap().x = 50.0;
        vote(&mut w, "p0", "p3");
        w.kill("p1", "shot");
        vote(&mut w, "p1", "p3");
        vote(&mut w, "p2", "p1");
        let t = tally(&w, &layout);
        assert_eq!(t.valid, 0);
        assert!(!t.counts.contains_key("p0"));
        assert!(!t.counts.contains_key("p1"));
    }

    #[test]
    fn lockdown_summons_instead_of_killing() {
        let layout = StationLayout::default();
        let mut w = world(3);
        vote(&mut w, "p0", "p1");
        vote(&mut w, "p2", "p1");
        resolve(&mut w, &layout, VoteOutcome::Lockdown);
        let p1 = w.peer("p1").unwrap();
        assert!(!p1.dead);
        let order = p1.summon_to.clone().unwrap();
        assert!(order.lock);
        assert_eq!(order.room, "brig");
        assert_eq!(order.at, 50_000);
        assert_eq!(order.x, layout.lockdown.pos.x);
    }
}
