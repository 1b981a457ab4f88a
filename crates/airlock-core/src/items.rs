use serde::{Deserialize, Serialize};

use crate::geometry::Vec3;
use crate::room::RoomState;
use crate::schema::{decode_blob, encode_blob};

/// Room key carrying the item list blob.
pub const ITEMS_KEY: &str = "itemsJsonV1";

/// Holder sentinel for an eaten item.
pub const HOLDER_GONE: &str = "_gone_";
/// Holder sentinel for an item consumed by a device.
pub const HOLDER_USED: &str = "_used_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Food,
    Fuel,
    Protection,
    CureRed,
    CureBlue,
    OxygenTank,
    CoolantTank,
    Cctv,
}

impl ItemKind {
    pub fn is_cure(self) -> bool {
        matches!(self, ItemKind::CureRed | ItemKind::CureBlue)
    }

    pub fn is_edible(self) -> bool {
        self == ItemKind::Food
    }
}

/// A pickup-able object in the station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemEntity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    #[serde(default)]
    pub vx: f32,
    #[serde(default)]
    pub vy: f32,
    #[serde(default)]
    pub vz: f32,
    /// Peer id of the carrier, a consumed sentinel, or `None` when on the floor.
    #[serde(default)]
    pub holder: Option<String>,
}

impl ItemEntity {
    pub fn new(id: impl Into<String>, kind: ItemKind, pos: Vec3) -> Self {
        Self {
            id: id.into(),
            kind,
            x: pos.x,
            y: pos.y,
            z: pos.z,
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            holder: None,
        }
    }

    pub fn pos(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    pub fn set_pos(&mut self, p: Vec3) {
        self.x = p.x;
        self.y = p.y;
        self.z = p.z;
    }

    pub fn zero_velocity(&mut self) {
        self.vx = 0.0;
        self.vy = 0.0;
        self.vz = 0.0;
    }

    pub fn is_moving(&self) -> bool {
        self.vx != 0.0 || self.vy != 0.0 || self.vz != 0.0
    }

    /// Eaten or used up. Never picked up again.
    pub fn is_consumed(&self) -> bool {
        matches!(self.holder.as_deref(), Some(HOLDER_GONE) | Some(HOLDER_USED))
    }

    /// Lying in the world with no carrier.
    pub fn is_free(&self) -> bool {
        self.holder.is_none()
    }

    pub fn is_held_by(&self, peer: &str) -> bool {
        self.holder.as_deref() == Some(peer)
    }
}

/// Entry in the station's static seed catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSeed {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Build the initial item list from a catalog.
pub fn seed_items(catalog: &[ItemSeed]) -> Vec<ItemEntity> {
    catalog
        .iter()
        .map(|s| ItemEntity::new(s.id.clone(), s.kind, Vec3::new(s.x, s.y, s.z)))
        .collect()
}

/// Read the replicated item list. Unseeded or malformed reads as empty.
pub fn read_items(room: &RoomState) -> Vec<ItemEntity> {
    decode_blob(ITEMS_KEY, &room.items_json_v1)
}

pub fn write_items(room: &mut RoomState, items: &[ItemEntity]) {
    room.items_json_v1 = encode_blob(ITEMS_KEY, items);
}

/// Whether the item list has been seeded at least once.
pub fn items_seeded(room: &RoomState) -> bool {
    !room.items_json_v1.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape() {
        let item = ItemEntity::new("f1", ItemKind::CureRed, Vec3::new(1.0, 0.0, 2.0));
        let v = serde_json::to_value(&item).unwrap();
        assert_eq!(v["type"], "cure_red");
        assert!(v["holder"].is_null());
    }

    #[test]
    fn sentinels_are_consumed() {
        let mut item = ItemEntity::new("f1", ItemKind::Food, Vec3::ZERO);
        assert!(item.is_free());
        item.holder = Some(HOLDER_GONE.to_string());
        assert!(item.is_consumed());
        assert!(!item.is_free());
        item.holder = Some("peer".to_string());
        assert!(!item.is_consumed());
        assert!(item.is_held_by("peer"));
    }

    #[test]
    fn unseeded_room_has_no_items() {
        let room = RoomState::default();
        assert!(!items_seeded(&room));
        assert!(read_items(&room).is_empty());
    }

    #[test]
    fn seeding_and_reading_back() {
        let catalog = vec![ItemSeed {
            id: "fuel1".to_string(),
            kind: ItemKind::Fuel,
            x: 1.0,
            y: 0.0,
            z: -3.0,
        }];
        let mut room = RoomState::default();
        write_items(&mut room, &seed_items(&catalog));
        assert!(items_seeded(&room));
        let items = read_items(&room);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, ItemKind::Fuel);
    }

    #[test]
    fn garbage_blob_reads_as_empty_but_seeded() {
        let room = RoomState {
            items_json_v1: "[{\"id\":".to_string(),
            ..RoomState::default()
        };
        assert!(read_items(&room).is_empty());
        assert!(items_seeded(&room));
    }

    #[test]
    fn missing_velocity_defaults_to_zero() {
        let item: ItemEntity =
            serde_json::from_str(r#"{"id":"a","type":"food","x":0,"y":1,"z":0,"holder":null}"#)
                .unwrap();
        assert!(!item.is_moving());
    }
}
