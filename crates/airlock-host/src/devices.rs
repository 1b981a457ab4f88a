use airlock_core::items::ItemKind;
use airlock_core::room::{Phase, RoomState};
use airlock_core::time::EpochMs;

/// A station meter a device feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Meter {
    Oxygen,
    Power,
    Cctv,
}

impl Meter {
    pub fn label(self) -> &'static str {
        match self {
            Meter::Oxygen => "Oxygen",
            Meter::Power => "Power",
            Meter::Cctv => "CCTV",
        }
    }

    pub fn get(self, room: &RoomState) -> f32 {
        match self {
            Meter::Oxygen => room.oxygen,
            Meter::Power => room.power,
            Meter::Cctv => room.cctv,
        }
    }

    /// Add `delta`, clamped to 0..=100. Returns the new value.
    pub fn add(self, room: &mut RoomState, delta: f32) -> f32 {
        let slot = match self {
            Meter::Oxygen => &mut room.oxygen,
            Meter::Power => &mut room.power,
            Meter::Cctv => &mut room.cctv,
        };
        *slot = (*slot + delta).clamp(0.0, 100.0);
        *slot
    }
}

/// What using an item on a device does.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UseEffect {
    pub item: ItemKind,
    pub device: &'static str,
    pub meter: Meter,
    pub delta: f32,
}

/// Item type by device effect table.
pub const USE_EFFECTS: &[UseEffect] = &[
    UseEffect {
        item: ItemKind::Fuel,
        device: "reactor",
        meter: Meter::Power,
        delta: 25.0,
    },
    UseEffect {
        item: ItemKind::CoolantTank,
        device: "reactor",
        meter: Meter::Power,
        delta: 15.0,
    },
    UseEffect {
        item: ItemKind::OxygenTank,
        device: "oxygen_station",
        meter: Meter::Oxygen,
        delta: 30.0,
    },
    UseEffect {
        item: ItemKind::Cctv,
        device: "security_console",
        meter: Meter::Cctv,
        delta: 40.0,
    },
    UseEffect {
        item: ItemKind::Protection,
        device: "security_console",
        meter: Meter::Cctv,
        delta: 10.0,
    },
];

pub fn effect_for(item: ItemKind, device: &str) -> Option<&'static UseEffect> {
    USE_EFFECTS
        .iter()
        .find(|e| e.item == item && e.device == device)
}

/// Night-time life support drain. Applies whole elapsed seconds since
/// `metersUpdatedAt` and advances the stamp by the same amount.
pub fn drain_at_night(room: &mut RoomState, now: EpochMs, per_minute: f32) {
    if room.phase != Phase::Night {
        return;
    }
    if room.meters_updated_at == 0 {
        room.meters_updated_at = now;
        return;
    }
    let elapsed_secs = now.saturating_sub(room.meters_updated_at) / 1000;
    if elapsed_secs == 0 {
        return;
    }
    let loss = per_minute * elapsed_secs as f32 / 60.0;
    Meter::Oxygen.add(room, -loss);
    Meter::Power.add(room, -loss);
    room.meters_updated_at += elapsed_secs * 1000;
}
