use serde::{Deserialize, Serialize};

use crate::geometry::Vec3;
use crate::peer::PeerId;
use crate::room::RoomState;
use crate::schema::{decode_blob, encode_blob};

/// Room key carrying the pet list blob.
pub const PETS_KEY: &str = "pets";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PetMode {
    #[default]
    Follow,
    Stay,
    SeekCure,
}

/// A companion that follows its handler around. Simulated by the host only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetEntity {
    pub id: String,
    pub owner: PeerId,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub yaw: f32,
    #[serde(default)]
    pub mode: PetMode,
    #[serde(default)]
    pub seek_target_id: Option<String>,
    #[serde(default)]
    pub seek_wp_x: f32,
    #[serde(default)]
    pub seek_wp_z: f32,
    /// Seconds left before the current search waypoint is replaced.
    #[serde(default)]
    pub seek_wp_ttl: f32,
}

impl PetEntity {
    pub fn new(owner: &str, pos: Vec3, yaw: f32) -> Self {
        Self {
            id: format!("pet-{owner}"),
            owner: owner.to_string(),
            x: pos.x,
            y: pos.y,
            z: pos.z,
            yaw,
            mode: PetMode::Follow,
            seek_target_id: None,
            seek_wp_x: pos.x,
            seek_wp_z: pos.z,
            seek_wp_ttl: 0.0,
        }
    }

    pub fn pos(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Forget search/approach scratch state.
    pub fn clear_seek(&mut self) {
        self.seek_target_id = None;
        self.seek_wp_ttl = 0.0;
    }
}

pub fn read_pets(room: &RoomState) -> Vec<PetEntity> {
    decode_blob(PETS_KEY, &room.pets)
}

pub fn write_pets(room: &mut RoomState, pets: &[PetEntity]) {
    room.pets = encode_blob(PETS_KEY, pets);
}

pub fn pets_seeded(room: &RoomState) -> bool {
    !room.pets.is_empty()
}

/// The pet belonging to `owner`, if one exists.
pub fn pet_of<'a>(pets: &'a [PetEntity], owner: &str) -> Option<&'a PetEntity> {
    pets.iter().find(|p| p.owner == owner)
}
