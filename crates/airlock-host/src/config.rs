use serde::Deserialize;

use airlock_core::room::{PhaseSchedule, RoomConfig};
use airlock_core::station::StationLayout;

use crate::error::ConfigError;

/// Default config file name, overridable with `AIRLOCK_CONFIG`.
pub const DEFAULT_CONFIG_PATH: &str = "airlock.toml";

/// Top-level host configuration, loaded from `airlock.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// WebSocket URL of the relay's `/relay` endpoint.
    pub relay_url: String,
    /// Room to join. Empty creates a new room.
    pub room_code: String,
    pub name: String,
    pub room: RoomConfig,
    pub tuning: SimTuning,
    pub layout: StationLayout,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://127.0.0.1:8081/relay".to_string(),
            room_code: String::new(),
            name: "station-host".to_string(),
            room: RoomConfig::default(),
            tuning: SimTuning::default(),
            layout: StationLayout::default(),
        }
    }
}

/// Host simulation constants.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimTuning {
    /// Fixed simulation tick in milliseconds (50 ms is 20 Hz).
    pub tick_ms: u64,

    pub pickup_radius: f32,
    pub bag_capacity: usize,
    pub pickup_cooldown_ms: u64,
    /// Height above the floor at which dropped items are placed.
    pub drop_height: f32,
    pub throw_speed: f32,
    pub throw_up_speed: f32,

    pub gravity: f32,
    pub floor_y: f32,
    /// Horizontal velocity multiplier applied on each floor-contact step.
    pub ground_damping: f32,
    /// Horizontal speed below which a grounded item is snapped to rest.
    pub rest_speed: f32,

    pub shoot_range: f32,
    pub shoot_damage: f32,
    pub shoot_hit_radius: f32,
    pub shoot_cooldown_ms: u64,
    pub shoot_client_cooldown_ms: u64,
    /// How long the tracer stays visible.
    pub shoot_fx_ms: u64,
    pub bite_radius: f32,
    pub bite_cooldown_ms: u64,
    pub bite_client_cooldown_ms: u64,
    pub incubation_ms: u64,
    pub scan_range: f32,
    pub scan_cooldown_ms: u64,
    pub scan_client_cooldown_ms: u64,

    /// Oxygen and power lost per real minute at night.
    pub night_drain_per_min: f32,

    pub pet_follow_back: f32,
    pub pet_follow_side: f32,
    pub pet_hover: f32,
    /// Exponential approach rate in 1/s.
    pub pet_response: f32,
    pub pet_sense_radius: f32,
    pub pet_lost_radius: f32,
    pub pet_standoff: f32,
    pub pet_wander_radius: f32,
    pub pet_waypoint_ttl_secs: f32,
    pub pet_waypoint_reach: f32,
}

impl Default for SimTuning {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            pickup_radius: 1.8,
            bag_capacity: 3,
            pickup_cooldown_ms: 400,
            drop_height: 0.15,
            throw_speed: 8.0,
            throw_up_speed: 4.0,
            gravity: -18.0,
            floor_y: 0.0,
            ground_damping: 0.6,
            rest_speed: 0.05,
            shoot_range: 20.0,
            shoot_damage: 34.0,
            shoot_hit_radius: 0.6,
            shoot_cooldown_ms: 1_200,
            shoot_client_cooldown_ms: 1_000,
            shoot_fx_ms: 180,
            bite_radius: 1.6,
            bite_cooldown_ms: 25_000,
            bite_client_cooldown_ms: 24_000,
            incubation_ms: 30_000,
            scan_range: 3.0,
            scan_cooldown_ms: 15_000,
            scan_client_cooldown_ms: 14_000,
            night_drain_per_min: 3.0,
            pet_follow_back: 1.2,
            pet_follow_side: 0.8,
            pet_hover: 0.6,
            pet_response: 6.0,
            pet_sense_radius: 8.0,
            pet_lost_radius: 12.0,
            pet_standoff: 0.8,
            pet_wander_radius: 4.0,
            pet_waypoint_ttl_secs: 4.0,
            pet_waypoint_reach: 0.5,
        }
    }
}

impl SimTuning {
    /// Fixed step in seconds.
    pub fn dt(&self) -> f32 {
        self.tick_ms as f32 / 1000.0
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

impl HostConfig {
    /// Report the first unusable value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.relay_url.starts_with("ws://") || self.relay_url.starts_with("wss://")) {
            return Err(invalid("relay_url", "must be a ws:// or wss:// URL"));
        }
        let room = &self.room;
        if room.max_peers == 0 {
            return Err(invalid("room.max_peers", "must be > 0"));
        }
        if room.day_length_secs == 0 || room.meeting_length_secs == 0 || room.night_length_secs == 0 {
            return Err(invalid("room", "phase lengths must be > 0"));
        }
        if room.max_days == 0 {
            return Err(invalid("room.max_days", "must be > 0"));
        }
        if !(room.clock_scale.is_finite() && room.clock_scale > 0.0) {
            return Err(invalid("room.clock_scale", "must be a positive number"));
        }
        if let PhaseSchedule::Clock {
            dusk_minute,
            resolve_minute,
            dawn_minute,
        } = room.schedule
        {
            if dusk_minute >= 1440 || resolve_minute >= 1440 || dawn_minute >= 1440 {
                return Err(invalid("room.schedule", "minutes must be below 1440"));
            }
            if !(dawn_minute < dusk_minute && dusk_minute < resolve_minute) {
                return Err(invalid(
                    "room.schedule",
                    "expected dawn < dusk < resolve within one day",
                ));
            }
        }

        let t = &self.tuning;
        if t.tick_ms == 0 {
            return Err(invalid("tuning.tick_ms", "must be > 0"));
        }
        if t.bag_capacity == 0 {
            return Err(invalid("tuning.bag_capacity", "must be > 0"));
        }
        if t.gravity >= 0.0 {
            return Err(invalid("tuning.gravity", "must be negative"));
        }
        if !(0.0..1.0).contains(&t.ground_damping) {
            return Err(invalid("tuning.ground_damping", "must be in [0, 1)"));
        }
        if t.rest_speed <= 0.0 {
            return Err(invalid("tuning.rest_speed", "must be > 0"));
        }
        if t.pet_lost_radius < t.pet_sense_radius {
            return Err(invalid(
                "tuning.pet_lost_radius",
                "must not be smaller than pet_sense_radius",
            ));
        }

        if self.layout.spawn_points.is_empty() {
            return Err(invalid("layout.spawn_points", "need at least one"));
        }
        if let Some(d) = self.layout.devices.iter().find(|d| d.radius <= 0.0) {
            return Err(invalid(
                "layout.devices",
                format!("device {} has no usable radius", d.name),
            ));
        }
        Ok(())
    }

    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load config from `AIRLOCK_CONFIG` (or `airlock.toml`) if it exists, then
    /// apply env var overrides.
    pub fn load() -> Self {
        let path =
            std::env::var("AIRLOCK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = match std::fs::read_to_string(&path) {
            Ok(content) => match Self::from_toml(&content) {
                Ok(cfg) => {
                    tracing::info!(%path, "Loaded configuration");
                    cfg
                },
                Err(e) => {
                    tracing::warn!(%path, "Failed to parse config: {e}, using defaults");
                    HostConfig::default()
                },
            },
            Err(_) => {
                tracing::info!(%path, "No config file found, using defaults");
                HostConfig::default()
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Apply `AIRLOCK_*` overrides from a variable lookup.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("AIRLOCK_RELAY_URL")
            && !url.is_empty()
        {
            self.relay_url = url;
        }
        if let Some(code) = var("AIRLOCK_ROOM") {
            self.room_code = code;
        }
        if let Some(name) = var("AIRLOCK_NAME")
            && !name.is_empty()
        {
            self.name = name;
        }
        if let Some(val) = var("AIRLOCK_TICK_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            self.tuning.tick_ms = ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airlock_core::room::VoteOutcome;

    #[test]
    fn default_config_is_valid() {
        let cfg = HostConfig::default();
        assert_eq!(cfg.tuning.tick_ms, 50);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parse_sections() {
        let cfg = HostConfig::from_toml(
            r#"
relay_url = "wss://relay.example:443/relay"
name = "bot"

[room]
max_peers = 6
day_length_secs = 30
vote_outcome = "lockdown"
schedule = { mode = "clock", dusk_minute = 1080, resolve_minute = 1260, dawn_minute = 360 }

[tuning]
bag_capacity = 5
pickup_radius = 2.5

[layout]
spawn_points = [{ x = 1.0, y = 0.0, z = 1.0 }]
"#,
        )
        .unwrap();
        assert_eq!(cfg.room.max_peers, 6);
        assert_eq!(cfg.room.day_length_secs, 30);
        assert_eq!(cfg.room.meeting_length_secs, 60);
        assert_eq!(cfg.room.vote_outcome, VoteOutcome::Lockdown);
        assert_eq!(cfg.tuning.bag_capacity, 5);
        assert_eq!(cfg.tuning.tick_ms, 50);
        assert_eq!(cfg.layout.spawn_points.len(), 1);
        assert!(cfg.layout.device("reactor").is_some());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parse_error_reported() {
        assert!(matches!(
            HostConfig::from_toml("room = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_tick() {
        let mut cfg = HostConfig::default();
        cfg.tuning.tick_ms = 0;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::Invalid {
                field: "tuning.tick_ms",
                reason: "must be > 0".to_string()
            })
        );
    }

    #[test]
    fn validate_rejects_bad_relay_url() {
        let cfg = HostConfig {
            relay_url: "http://nope".to_string(),
            ..HostConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_unordered_clock() {
        let mut cfg = HostConfig::default();
        cfg.room.schedule = PhaseSchedule::Clock {
            dusk_minute: 300,
            resolve_minute: 1260,
            dawn_minute: 360,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_overrides() {
        let mut cfg = HostConfig::default();
        cfg.apply_env(|key| match key {
            "AIRLOCK_RELAY_URL" => Some("ws://10.0.0.2:9000/relay".to_string()),
            "AIRLOCK_ROOM" => Some("ABCD-1234".to_string()),
            "AIRLOCK_TICK_MS" => Some("not-a-number".to_string()),
            _ => None,
        });
        assert_eq!(cfg.relay_url, "ws://10.0.0.2:9000/relay");
        assert_eq!(cfg.room_code, "ABCD-1234");
        assert_eq!(cfg.name, "station-host");
        assert_eq!(cfg.tuning.tick_ms, 50);
    }
}
