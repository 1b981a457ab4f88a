#[allow(dead_code)]
mod common;

use serde_json::json;

use airlock_core::geometry::Vec3;
use airlock_core::items::{ItemEntity, ItemKind};
use airlock_core::peer::{Role, Team};
use airlock_core::request::RequestKind;
use airlock_core::room::{Phase, RoomConfig, VoteOutcome};
use airlock_core::store::{Applied, Scope, StateWrite};
use common::TestRoom;

fn short_room() -> RoomConfig {
    RoomConfig {
        day_length_secs: 2,
        meeting_length_secs: 2,
        night_length_secs: 2,
        max_days: 2,
        ..RoomConfig::default()
    }
}

#[test]
fn launch_leads_to_day_one() {
    let room = TestRoom::started(4);

    assert_eq!(room.room().day, 1);
    assert!(room.room().roles_assigned);
    assert_eq!(room.items().len(), room.config.layout.item_seeds.len());
    assert_eq!(room.peer("p0").role, Some(Role::Security));
    assert_eq!(room.peer("p3").role, Some(Role::Handler));
    for team in Team::ALL {
        let infected = ["p0", "p1", "p2", "p3"]
            .iter()
            .filter(|id| room.peer(id).team == Some(team) && room.peer(id).infected)
            .count();
        assert_eq!(infected, 1);
    }
    assert!(room.events().iter().any(|e| e == "DAY 1 begins."));
}

#[test]
fn launch_from_guest_is_ignored() {
    let mut room = TestRoom::lobby(3);
    room.request("p1", RequestKind::Launch, "", None);
    let report = room.tick();
    assert_eq!(report.rejected, 1);
    assert!(!room.room().infected_assigned);
    assert_eq!(room.room().phase, Phase::Lobby);
}

#[test]
fn redelivered_shot_applies_once() {
    let mut room = TestRoom::started(4);
    room.place("p1", 0.0, 5.0);
    room.place("p2", 10.0, -10.0);
    room.place("p3", -10.0, -10.0);

    let req_id = room.request("p0", RequestKind::Ability, "shoot", None);
    room.tick();
    assert_eq!(room.peer("p1").life, 66.0);
    assert_eq!(room.peer("p0").shot_fx_id, 1);

    // The same write arriving again is stale at the store.
    let again = StateWrite {
        scope: Scope::Peer("p0".to_string()),
        key: "reqId".to_string(),
        value: json!(req_id),
        version: room
            .store
            .version_of(&Scope::Peer("p0".to_string()), "reqId")
            .map(|(v, _)| v)
            .unwrap(),
        writer: "p0".to_string(),
    };
    assert_eq!(room.store.apply_remote(again), Ok(Applied::Stale));

    // And the host keeps seeing the same reqId long after the cooldown.
    let later = room.now + 5_000;
    room.run_until(later);
    assert_eq!(room.peer("p1").life, 66.0);
    assert_eq!(room.peer("p0").shot_fx_id, 1);
    assert_eq!(room.sim.watermark().last_seen("p0"), Some(req_id));
}

#[test]
fn racing_pickups_have_one_winner() {
    let mut room = TestRoom::started(4);
    room.place("p1", -8.0, 3.0);
    room.place("p2", -8.0, 3.0);
    room.request("p1", RequestKind::Pickup, "food1", None);
    room.request("p2", RequestKind::Pickup, "food1", None);

    let report = room.tick();
    assert_eq!(report.applied, 1);
    assert_eq!(report.rejected, 1);

    let holder = room.item("food1").holder.expect("someone holds it");
    let loser = if holder == "p1" { "p2" } else { "p1" };
    assert!(room.peer(&holder).backpack.contains(&"food1".to_string()));
    assert!(room.peer(loser).backpack.is_empty());
    assert_eq!(room.peer(loser).pickup_until, 0);
}

#[test]
fn pickup_cooldown_holds_then_releases() {
    let mut room = TestRoom::started(4);
    let cooldown = room.config.tuning.pickup_cooldown_ms;
    room.place("p1", -8.0, 3.0);
    room.request("p1", RequestKind::Pickup, "food1", None);
    room.tick();
    let first_until = room.peer("p1").pickup_until;
    assert_eq!(first_until, room.now + cooldown);

    room.place("p1", 8.0, -3.0);
    room.request("p1", RequestKind::Pickup, "food2", None);
    room.tick();
    assert!(room.now < first_until);
    assert!(room.item("food2").holder.is_none());
    assert_eq!(room.peer("p1").pickup_until, first_until);

    room.run_until(first_until);
    assert!(room.item("food2").holder.is_none());

    room.request("p1", RequestKind::Pickup, "food2", None);
    room.tick();
    assert_eq!(room.item("food2").holder.as_deref(), Some("p1"));
    assert_eq!(room.peer("p1").pickup_until, room.now + cooldown);
}

#[test]
fn bag_never_exceeds_capacity() {
    let mut room = TestRoom::started(2);
    let capacity = room.config.tuning.bag_capacity;
    let kinds = [
        ItemKind::Food,
        ItemKind::Fuel,
        ItemKind::Cctv,
        ItemKind::OxygenTank,
        ItemKind::CureRed,
    ];
    let items: Vec<ItemEntity> = kinds
        .iter()
        .enumerate()
        .map(|(i, kind)| ItemEntity::new(format!("i{i}"), *kind, Vec3::ZERO))
        .collect();
    room.set_items(&items);

    for item in &items {
        room.request("p1", RequestKind::Pickup, &item.id, None);
        room.tick();
        assert!(room.peer("p1").backpack.len() <= capacity);
        let until = room.peer("p1").pickup_until;
        room.run_until(until);
    }
    assert_eq!(room.peer("p1").backpack.len(), capacity);
    assert!(room.item("i3").is_free());
    assert!(room.item("i4").is_free());
}

#[test]
fn device_use_feeds_the_meter() {
    let mut room = TestRoom::started(4);
    room.store.update_room(|r| r.power = 50.0).unwrap();
    room.place("p2", -16.0, 8.0);
    room.request("p2", RequestKind::Pickup, "fuel1", None);
    room.tick();
    assert_eq!(room.item("fuel1").holder.as_deref(), Some("p2"));

    room.place("p2", -18.0, 12.0);
    room.request("p2", RequestKind::Use, "reactor|fuel1", None);
    room.tick();
    assert_eq!(room.room().power, 75.0);
    assert!(room.peer("p2").backpack.is_empty());
    assert_eq!(
        room.events().last().map(String::as_str),
        Some("Player3 serviced the reactor. Power at 75%.")
    );
}

/// Drive a short room to the meeting phase with everyone at the origin,
/// which is inside the meeting room.
fn in_meeting(outcome: VoteOutcome) -> TestRoom {
    let mut room = TestRoom::with_room(
        4,
        RoomConfig {
            vote_outcome: outcome,
            ..short_room()
        },
    );
    room.start();
    let day_end = room.room().phase_ends_at;
    room.run_until(day_end);
    assert_eq!(room.room().phase, Phase::Meeting);
    room
}

fn end_meeting(room: &mut TestRoom) {
    let end = room.room().phase_ends_at;
    room.run_until(end);
    assert_eq!(room.room().phase, Phase::Night);
}

#[test]
fn majority_vote_ejects() {
    let mut room = in_meeting(VoteOutcome::Eject);
    for voter in ["p0", "p1", "p2"] {
        room.vote(voter, "p3");
    }
    room.vote("p3", "skip");
    end_meeting(&mut room);

    assert!(room.peer("p3").dead);
    assert_eq!(room.peer("p3").death_reason.as_deref(), Some("ejected"));
    assert!(room.room().dead.contains(&"p3".to_string()));
    let events = room.events();
    assert!(events.contains(&"Votes: Player1=0, Player2=0, Player3=0, Player4=3; skip=1".to_string()));
    assert!(events.contains(&"Player4 was ejected.".to_string()));
}

#[test]
fn tied_vote_ejects_no_one() {
    let mut room = in_meeting(VoteOutcome::Eject);
    room.vote("p0", "p2");
    room.vote("p1", "p2");
    room.vote("p2", "p0");
    room.vote("p3", "p0");
    end_meeting(&mut room);

    for id in ["p0", "p1", "p2", "p3"] {
        assert!(!room.peer(id).dead);
    }
    let events = room.events();
    assert!(events.contains(&"Votes: Player1=2, Player2=0, Player3=2, Player4=0; skip=0".to_string()));
    assert!(events.contains(&"No one was ejected.".to_string()));
}

#[test]
fn lockdown_vote_summons_instead_of_killing() {
    let mut room = in_meeting(VoteOutcome::Lockdown);
    for voter in ["p0", "p1", "p2"] {
        room.vote(voter, "p3");
    }
    end_meeting(&mut room);

    assert!(!room.peer("p3").dead);
    let order = room.peer("p3").summon_to.clone().expect("summoned");
    assert_eq!(order.room, room.config.layout.lockdown.room);
    assert!(order.lock);
    assert_eq!(order.reason, "vote");
}

#[test]
fn phases_cycle_and_day_count_holds_at_max() {
    let mut room = TestRoom::with_room(3, short_room());
    room.start();
    assert_eq!(room.room().timer, 2);

    let mut seen = Vec::new();
    for _ in 0..8 {
        let end = room.room().phase_ends_at;
        room.run_until(end);
        seen.push((room.room().phase, room.room().day, room.room().timer));
    }
    assert_eq!(
        seen,
        vec![
            (Phase::Meeting, 1, 2),
            (Phase::Night, 1, 2),
            (Phase::Day, 2, 2),
            (Phase::Meeting, 2, 2),
            (Phase::Night, 2, 2),
            (Phase::Day, 2, 2),
            (Phase::Meeting, 2, 2),
            (Phase::Night, 2, 2),
        ]
    );
}

#[test]
fn last_night_ends_the_game_when_enabled() {
    let mut room = TestRoom::with_room(
        3,
        RoomConfig {
            end_after_last_day: true,
            ..short_room()
        },
    );
    room.start();
    for _ in 0..6 {
        let end = room.room().phase_ends_at;
        room.run_until(end);
    }
    assert_eq!(room.room().phase, Phase::End);
    assert_eq!(room.room().day, 2);
    assert_eq!(
        room.events().last().map(String::as_str),
        Some("The station survived.")
    );

    // Requests after the end are drained but never applied.
    room.request("p1", RequestKind::Pickup, "food1", None);
    let report = room.tick();
    assert_eq!(report.applied, 0);
}

#[test]
fn quiet_day_ticks_replicate_nothing() {
    let mut room = TestRoom::started(3);
    room.store.drain_outbox();
    let stamped = room.room().meters_updated_at;

    for _ in 0..10 {
        room.tick();
        let writes = room.store.drain_outbox();
        assert!(writes.is_empty(), "unexpected writes: {writes:?}");
    }
    assert_eq!(room.room().meters_updated_at, stamped);
}

#[test]
fn bite_incubates_then_turns_once() {
    let mut room = TestRoom::started(4);
    let (biter, victim) = if room.peer("p0").infected {
        ("p0", "p2")
    } else {
        ("p2", "p0")
    };
    assert!(!room.peer(victim).infected);

    room.request(
        biter,
        RequestKind::Ability,
        "bite",
        Some(json!({ "target": victim })),
    );
    room.tick();
    let reveal_at = room.peer(victim).infection_reveal_until;
    assert!(room.peer(victim).infection_pending);
    assert_eq!(reveal_at, room.now + room.config.tuning.incubation_ms);

    room.tick_at(reveal_at - room.config.tuning.incubation_ms / 2);
    assert_eq!(room.peer(victim).infection_ratio, 0.5);
    assert!(!room.peer(victim).infected);

    room.tick_at(reveal_at);
    let p = room.peer(victim);
    assert!(p.infected);
    assert!(!p.infection_pending);
    assert_eq!(p.infection_seed_at, 0);
    assert_eq!(p.infection_reveal_until, 0);
    assert_eq!(p.infection_ratio, 0.0);

    room.tick();
    room.tick();
    let turned = room
        .events()
        .iter()
        .filter(|e| *e == "A crew member has turned.")
        .count();
    assert_eq!(turned, 1);
}

#[test]
fn handler_gets_one_pet() {
    let mut room = TestRoom::started(4);
    room.tick();
    room.tick();
    let pets = airlock_core::pets::read_pets(room.room());
    assert_eq!(pets.len(), 1);
    assert_eq!(pets[0].owner, "p3");
}
