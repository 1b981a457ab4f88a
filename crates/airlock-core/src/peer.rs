use serde::{Deserialize, Serialize};

use crate::geometry::Vec3;
use crate::request::RequestKind;
use crate::time::EpochMs;

/// Stable opaque identifier for a peer, unique for the session lifetime.
pub type PeerId = String;

/// Full life meter value.
pub const MAX_LIFE: f32 = 100.0;
/// Full energy meter value.
pub const MAX_ENERGY: f32 = 100.0;

/// Generate a fresh peer id.
pub fn new_peer_id() -> PeerId {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Crew roles handed out on the first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Security,
    Doctor,
    Engineer,
    Handler,
}

impl Role {
    /// Fixed rotation used when assigning roles to peers that have none.
    pub const ROTATION: [Role; 4] = [Role::Security, Role::Doctor, Role::Engineer, Role::Handler];

    /// Whether holding this role grants a pet.
    pub fn grants_pet(self) -> bool {
        self == Role::Handler
    }
}

/// Crew team. Each team gets exactly one infected peer at launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    pub const ALL: [Team; 2] = [Team::Red, Team::Blue];

    /// Alternating team pick by lobby slot.
    pub fn for_slot(slot: u8) -> Team {
        if slot % 2 == 0 { Team::Red } else { Team::Blue }
    }
}

/// Host instruction to a peer to teleport itself into lockdown.
/// The target's own controller executes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummonOrder {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub room: String,
    pub lock: bool,
    pub reason: String,
    pub at: EpochMs,
}

/// Outcome of a doctor's scan, written to the scanner's own state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub target: PeerId,
    pub infected: bool,
    pub at: EpochMs,
}

/// Display profile supplied on join.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerProfile {
    pub name: String,
}

/// Peer-scoped replicated state. Every field is one replicated key; the
/// serialized (camelCase) field names are the closed key set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PeerState {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub yaw: f32,
    pub name: String,
    pub role: Option<Role>,
    pub team: Option<Team>,
    pub slot: u8,
    pub vote: String,

    pub req_id: u64,
    pub req_type: Option<RequestKind>,
    pub req_target: String,
    pub req_value: f64,
    pub req_payload: Option<serde_json::Value>,

    pub backpack: Vec<String>,
    pub carry: Option<String>,
    pub pickup_until: EpochMs,

    pub life: f32,
    pub energy: f32,

    pub infected: bool,
    pub infection_pending: bool,
    pub infection_seed_at: EpochMs,
    pub infection_reveal_until: EpochMs,
    pub infection_ratio: f32,

    pub dead: bool,
    pub dead_ts: EpochMs,
    pub death_reason: Option<String>,

    pub shot_fx_a: Option<Vec3>,
    pub shot_fx_b: Option<Vec3>,
    pub shot_fx_id: u64,
    pub shooting_until: EpochMs,

    pub is_talking: bool,
    pub is_muted: bool,

    #[serde(rename = "summon_to")]
    pub summon_to: Option<SummonOrder>,
    #[serde(rename = "cd_bite_until")]
    pub cd_bite_until: EpochMs,
    #[serde(rename = "cd_scan_until")]
    pub cd_scan_until: EpochMs,
    #[serde(rename = "cd_shoot_until")]
    pub cd_shoot_until: EpochMs,
    pub scan_result: Option<ScanResult>,
}

impl Default for PeerState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            yaw: 0.0,
            name: String::new(),
            role: None,
            team: None,
            slot: 0,
            vote: String::new(),
            req_id: 0,
            req_type: None,
            req_target: String::new(),
            req_value: 0.0,
            req_payload: None,
            backpack: Vec::new(),
            carry: None,
            pickup_until: 0,
            life: MAX_LIFE,
            energy: MAX_ENERGY,
            infected: false,
            infection_pending: false,
            infection_seed_at: 0,
            infection_reveal_until: 0,
            infection_ratio: 0.0,
            dead: false,
            dead_ts: 0,
            death_reason: None,
            shot_fx_a: None,
            shot_fx_b: None,
            shot_fx_id: 0,
            shooting_until: 0,
            is_talking: false,
            is_muted: false,
            summon_to: None,
            cd_bite_until: 0,
            cd_scan_until: 0,
            cd_shoot_until: 0,
            scan_result: None,
        }
    }
}

impl PeerState {
    /// Peer keys the host may write on another peer's bag.
    pub const HOST_TRUSTED_KEYS: &[&str] = &[
        "role",
        "team",
        "infected",
        "infectionPending",
        "infectionSeedAt",
        "infectionRevealUntil",
        "infectionRatio",
        "dead",
        "deadTs",
        "deathReason",
        "summon_to",
        "backpack",
        "carry",
        "pickupUntil",
        "life",
        "energy",
        "shotFxA",
        "shotFxB",
        "shotFxId",
        "shootingUntil",
        "cd_bite_until",
        "cd_scan_until",
        "cd_shoot_until",
        "scanResult",
    ];

    pub fn is_host_trusted(key: &str) -> bool {
        Self::HOST_TRUSTED_KEYS.contains(&key)
    }

    pub fn pos(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    pub fn is_alive(&self) -> bool {
        !self.dead
    }

    /// Infected or incubating.
    pub fn is_compromised(&self) -> bool {
        self.infected || self.infection_pending
    }
}

/// A single network participant: stable id, profile, and its state bag.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerSession {
    pub id: PeerId,
    pub profile: PeerProfile,
    pub state: PeerState,
}

impl PeerSession {
    pub fn new(id: PeerId, profile: PeerProfile, defaults: &PeerState) -> Self {
        let mut state = defaults.clone();
        state.name = profile.name.clone();
        Self { id, profile, state }
    }
}
