use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::peer::{PeerId, PeerState};
use crate::time::EpochMs;

/// Room lifecycle phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Lobby,
    Day,
    Meeting,
    Night,
    End,
}

impl Phase {
    /// Phases driven by the host's timer/clock.
    pub fn is_simulated(self) -> bool {
        matches!(self, Phase::Day | Phase::Meeting | Phase::Night)
    }
}

/// How phase boundaries are decided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PhaseSchedule {
    /// Each phase lasts its configured length in real seconds.
    #[default]
    Timer,
    /// Boundaries follow the in-game clock (minutes after midnight).
    Clock {
        dusk_minute: u32,
        resolve_minute: u32,
        dawn_minute: u32,
    },
}

impl PhaseSchedule {
    /// The usual clock schedule: meeting at 18:00, night at 21:00, day at 06:00.
    pub const STANDARD_CLOCK: PhaseSchedule = PhaseSchedule::Clock {
        dusk_minute: 18 * 60,
        resolve_minute: 21 * 60,
        dawn_minute: 6 * 60,
    };
}

/// What happens to the winner of a vote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteOutcome {
    /// Winner is added to the room's dead set.
    #[default]
    Eject,
    /// Winner is told to walk itself into the lockdown cell.
    Lockdown,
}

/// Configuration for an Airlock room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    pub max_peers: u8,
    pub day_length_secs: u32,
    pub meeting_length_secs: u32,
    pub night_length_secs: u32,
    pub max_days: u32,
    /// End the game when the night of the last day expires instead of
    /// holding the day counter at `max_days`.
    pub end_after_last_day: bool,
    /// How long teammates may see the infected pick in the lobby.
    pub reveal_window_ms: u64,
    /// In-game minute of day at the clock anchor.
    pub clock_start_minutes: f64,
    /// Game seconds per real second.
    pub clock_scale: f64,
    pub schedule: PhaseSchedule,
    pub vote_outcome: VoteOutcome,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_peers: 12,
            day_length_secs: 180,
            meeting_length_secs: 60,
            night_length_secs: 90,
            max_days: 5,
            end_after_last_day: false,
            reveal_window_ms: 8_000,
            clock_start_minutes: 6.0 * 60.0,
            clock_scale: 60.0,
            schedule: PhaseSchedule::Timer,
            vote_outcome: VoteOutcome::Eject,
        }
    }
}

impl RoomConfig {
    /// Room-scoped defaults for a freshly created room.
    pub fn room_defaults(&self) -> RoomState {
        RoomState {
            day_length: self.day_length_secs,
            meeting_length: self.meeting_length_secs,
            night_length: self.night_length_secs,
            max_days: self.max_days,
            end_after_last_day: self.end_after_last_day,
            clock_anchor_minutes: self.clock_start_minutes,
            clock_scale: self.clock_scale,
            ..RoomState::default()
        }
    }

    /// Peer-scoped defaults applied to every joining peer.
    pub fn peer_defaults(&self) -> PeerState {
        PeerState::default()
    }
}

/// Room-scoped replicated state. One value per key, host-writable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoomState {
    pub phase: Phase,
    /// Whole seconds remaining in the current phase.
    pub timer: i64,
    /// Epoch ms at which the current phase ends; `timer` is derived from it.
    pub phase_ends_at: EpochMs,
    pub day: u32,
    pub max_days: u32,
    pub end_after_last_day: bool,
    pub day_length: u32,
    pub meeting_length: u32,
    pub night_length: u32,

    pub oxygen: f32,
    pub power: f32,
    pub cctv: f32,
    pub meters_updated_at: EpochMs,

    pub dead: Vec<PeerId>,
    pub events: Vec<String>,

    pub roles_assigned: bool,
    pub infected_assigned: bool,
    pub reveal_until: EpochMs,

    #[serde(rename = "itemsJsonV1")]
    pub items_json_v1: String,
    pub pets: String,

    pub clock_anchor_ms: EpochMs,
    pub clock_anchor_minutes: f64,
    pub clock_scale: f64,

    /// Minigame sub-namespaces (`wire:*`, `engine:*`).
    #[serde(flatten)]
    pub minigames: BTreeMap<String, serde_json::Value>,
}

impl Default for RoomState {
    fn default() -> Self {
        Self {
            phase: Phase::Lobby,
            timer: 0,
            phase_ends_at: 0,
            day: 0,
            max_days: 5,
            end_after_last_day: false,
            day_length: 180,
            meeting_length: 60,
            night_length: 90,
            oxygen: 100.0,
            power: 100.0,
            cctv: 100.0,
            meters_updated_at: 0,
            dead: Vec::new(),
            events: Vec::new(),
            roles_assigned: false,
            infected_assigned: false,
            reveal_until: 0,
            items_json_v1: String::new(),
            pets: String::new(),
            clock_anchor_ms: 0,
            clock_anchor_minutes: 6.0 * 60.0,
            clock_scale: 60.0,
            minigames: BTreeMap::new(),
        }
    }
}

impl RoomState {
    /// Open sub-namespaces accepted in addition to the declared keys.
    pub const OPEN_PREFIXES: &[&str] = &["wire:", "engine:"];

    pub fn is_open_key(key: &str) -> bool {
        Self::OPEN_PREFIXES.iter().any(|p| key.starts_with(p))
    }

    pub fn is_dead(&self, id: &str) -> bool {
        self.dead.iter().any(|d| d == id)
    }

    /// Add to the dead set, keeping it free of duplicates.
    pub fn mark_dead(&mut self, id: &str) -> bool {
        if self.is_dead(id) {
            return false;
        }
        self.dead.push(id.to_string());
        true
    }

    /// Phase length in seconds for a simulated phase.
    pub fn length_of(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Day => self.day_length,
            Phase::Meeting => self.meeting_length,
            Phase::Night => self.night_length,
            Phase::Lobby | Phase::End => 0,
        }
    }
}

/// Generate a room code in the form `ABCD-1234`.
pub fn generate_room_code() -> String {
    const LETTERS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
    let mut rng = rand::rng();
    let letters: String = (0..4)
        .map(|_| LETTERS[rng.random_range(0..LETTERS.len())] as char)
        .collect();
    let digits: u16 = rng.random_range(0..10_000);
    format!("{letters}-{digits:04}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_config_lengths() {
        let cfg = RoomConfig {
            day_length_secs: 30,
            meeting_length_secs: 10,
            night_length_secs: 20,
            ..RoomConfig::default()
        };
        let room = cfg.room_defaults();
        assert_eq!(room.phase, Phase::Lobby);
        assert_eq!(room.length_of(Phase::Day), 30);
        assert_eq!(room.length_of(Phase::Meeting), 10);
        assert_eq!(room.length_of(Phase::Night), 20);
        assert!(!room.roles_assigned);
    }

    #[test]
    fn room_wire_names() {
        let json = serde_json::to_value(RoomState::default()).unwrap();
        let obj = json.as_object().unwrap();
        for key in [
            "phase",
            "timer",
            "dayLength",
            "meetingLength",
            "nightLength",
            "oxygen",
            "power",
            "cctv",
            "dead",
            "events",
            "rolesAssigned",
            "infectedAssigned",
            "revealUntil",
            "itemsJsonV1",
            "pets",
        ] {
            assert!(obj.contains_key(key), "missing key {key}");
        }
        assert_eq!(obj["phase"], serde_json::json!("lobby"));
    }

    #[test]
    fn minigame_keys_flatten_to_top_level() {
        let mut room = RoomState::default();
        room.minigames
            .insert("wire:panel3".to_string(), serde_json::json!([1, 0, 1]));
        let json = serde_json::to_value(&room).unwrap();
        assert_eq!(json["wire:panel3"], serde_json::json!([1, 0, 1]));
        assert!(RoomState::is_open_key("engine:core"));
        assert!(!RoomState::is_open_key("phase"));
    }

    #[test]
    fn mark_dead_is_a_set() {
        let mut room = RoomState::default();
        assert!(room.mark_dead("a"));
        assert!(!room.mark_dead("a"));
        assert_eq!(room.dead.len(), 1);
    }

    #[test]
    fn schedule_parses_from_toml() {
        let cfg: RoomConfig = toml::from_str(
            r#"
schedule = { mode = "clock", dusk_minute = 1080, resolve_minute = 1260, dawn_minute = 360 }
vote_outcome = "lockdown"
"#,
        )
        .unwrap();
        assert_eq!(cfg.schedule, PhaseSchedule::STANDARD_CLOCK);
        assert_eq!(cfg.vote_outcome, VoteOutcome::Lockdown);
    }

    #[test]
    fn room_codes_have_expected_shape() {
        let code = generate_room_code();
        assert_eq!(code.len(), 9);
        assert_eq!(&code[4..5], "-");
    }
}
