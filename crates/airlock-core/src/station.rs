use serde::{Deserialize, Serialize};

use crate::geometry::{Aabb, Vec3};
use crate::items::{ItemKind, ItemSeed};

/// A fixed station device items can be used on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    pub pos: Vec3,
    /// XZ distance within which a peer may use the device.
    pub radius: f32,
}

/// Where a locked-down peer is summoned to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockdownCell {
    pub room: String,
    pub pos: Vec3,
}

/// Static station geometry shared by every peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationLayout {
    pub meeting_room: Aabb,
    pub lockdown: LockdownCell,
    pub devices: Vec<Device>,
    pub spawn_points: Vec<Vec3>,
    pub item_seeds: Vec<ItemSeed>,
}

fn device(name: &str, x: f32, z: f32, radius: f32) -> Device {
    Device {
        name: name.to_string(),
        pos: Vec3::new(x, 0.0, z),
        radius,
    }
}

fn seed(id: &str, kind: ItemKind, x: f32, z: f32) -> ItemSeed {
    ItemSeed {
        id: id.to_string(),
        kind,
        x,
        y: 0.0,
        z,
    }
}

impl Default for StationLayout {
    fn default() -> Self {
        Self {
            meeting_room: Aabb::new(Vec3::new(-6.0, -1.0, -6.0), Vec3::new(6.0, 4.0, 6.0)),
            lockdown: LockdownCell {
                room: "brig".to_string(),
                pos: Vec3::new(20.0, 0.0, -14.0),
            },
            devices: vec![
                device("reactor", -18.0, 12.0, 2.5),
                device("oxygen_station", 16.0, 10.0, 2.5),
                device("security_console", 18.0, -8.0, 2.0),
                device("medbay", -14.0, -10.0, 2.5),
            ],
            spawn_points: (0..12)
                .map(|i| {
                    let a = i as f32 / 12.0 * std::f32::consts::TAU;
                    Vec3::new(a.cos() * 4.0, 0.0, a.sin() * 4.0)
                })
                .collect(),
            item_seeds: vec![
                seed("food1", ItemKind::Food, -8.0, 3.0),
                seed("food2", ItemKind::Food, 8.0, -3.0),
                seed("food3", ItemKind::Food, 0.0, 10.0),
                seed("fuel1", ItemKind::Fuel, -16.0, 8.0),
                seed("fuel2", ItemKind::Fuel, -20.0, 14.0),
                seed("prot1", ItemKind::Protection, 12.0, -12.0),
                seed("cureR", ItemKind::CureRed, -12.0, -14.0),
                seed("cureB", ItemKind::CureBlue, 14.0, 14.0),
                seed("o2tank1", ItemKind::OxygenTank, 14.0, 6.0),
                seed("cool1", ItemKind::CoolantTank, -10.0, 16.0),
                seed("cctv1", ItemKind::Cctv, 16.0, -4.0),
            ],
        }
    }
}

impl StationLayout {
    pub fn device(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.name == name)
    }

    pub fn in_meeting_room(&self, p: Vec3) -> bool {
        self.meeting_room.contains(p)
    }

    /// Spawn point for a lobby slot, wrapping when there are more slots.
    pub fn spawn_for(&self, slot: u8) -> Vec3 {
        if self.spawn_points.is_empty() {
            return Vec3::ZERO;
        }
        self.spawn_points[slot as usize % self.spawn_points.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_has_named_devices() {
        let layout = StationLayout::default();
        for name in ["reactor", "oxygen_station", "security_console", "medbay"] {
            assert!(layout.device(name).is_some(), "missing {name}");
        }
        assert!(layout.device("toaster").is_none());
    }

    #[test]
    fn meeting_room_contains_origin_only() {
        let layout = StationLayout::default();
        assert!(layout.in_meeting_room(Vec3::ZERO));
        assert!(!layout.in_meeting_room(layout.lockdown.pos));
    }

    #[test]
    fn spawn_wraps() {
        let layout = StationLayout::default();
        assert_eq!(layout.spawn_for(0), layout.spawn_for(12));
    }

    #[test]
    fn seed_ids_unique() {
        let layout = StationLayout::default();
        let mut ids: Vec<&str> = layout.item_seeds.iter().map(|s| s.id.as_str()).collect();
        ids.sort_unstable();
        let before = ids.len();
        ids.dedup();
        assert_eq!(before, ids.len());
    }
}
