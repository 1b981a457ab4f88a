//! Typed key/value boundary for replicated state.
//!
//! Room and peer state are plain serde structs; their serialized field names
//! form the closed key set. A replicated write names one key and carries one
//! JSON value. Applying it re-validates the whole struct, so an unknown key or
//! a value of the wrong type is rejected here instead of deep inside the
//! simulation.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::peer::PeerState;
use crate::room::RoomState;

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaError {
    NotAnObject,
    UnknownKey(String),
    Malformed { key: String, reason: String },
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "state does not serialize to an object"),
            Self::UnknownKey(k) => write!(f, "unknown key: {k}"),
            Self::Malformed { key, reason } => write!(f, "malformed value for {key}: {reason}"),
        }
    }
}

impl std::error::Error for SchemaError {}

/// A replicated state struct with a closed key set.
pub trait Schema: Serialize + DeserializeOwned + Clone {
    /// Keys outside the declared fields that are still accepted.
    fn is_open_key(_key: &str) -> bool {
        false
    }

    /// Serialize into the key map.
    fn to_fields(&self) -> Result<Map<String, Value>, SchemaError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err(SchemaError::NotAnObject),
        }
    }

    /// Read a single key.
    fn field(&self, key: &str) -> Option<Value> {
        self.to_fields().ok()?.remove(key)
    }

    /// Whether `key` belongs to this schema.
    fn has_key(&self, key: &str) -> bool {
        Self::is_open_key(key) || self.to_fields().is_ok_and(|f| f.contains_key(key))
    }

    /// Apply one key, validating both the key and the value's type.
    fn apply_field(&mut self, key: &str, value: Value) -> Result<(), SchemaError> {
        let mut fields = self.to_fields()?;
        if !fields.contains_key(key) && !Self::is_open_key(key) {
            return Err(SchemaError::UnknownKey(key.to_string()));
        }
        fields.insert(key.to_string(), value);
        let next: Self =
            serde_json::from_value(Value::Object(fields)).map_err(|e| SchemaError::Malformed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        *self = next;
        Ok(())
    }
}

impl Schema for RoomState {
    fn is_open_key(key: &str) -> bool {
        RoomState::is_open_key(key)
    }
}

impl Schema for PeerState {}

/// Keys whose values differ between two snapshots, with their new values.
/// Keys that disappeared are reported as `null`.
pub fn diff_fields<T: Schema>(before: &T, after: &T) -> Result<Vec<(String, Value)>, SchemaError> {
    let old = before.to_fields()?;
    let new = after.to_fields()?;
    let mut changed = Vec::new();
    for (key, value) in &new {
        if old.get(key) != Some(value) {
            changed.push((key.clone(), value.clone()));
        }
    }
    for key in old.keys() {
        if !new.contains_key(key) {
            changed.push((key.clone(), Value::Null));
        }
    }
    Ok(changed)
}

/// Decode a composite JSON blob (item list, pet list).
///
/// An empty string means "never seeded" and reads as empty. A blob that
/// fails to parse is logged and also reads as empty.
pub fn decode_blob<T: DeserializeOwned>(key: &str, blob: &str) -> Vec<T> {
    if blob.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str(blob) {
        Ok(list) => list,
        Err(e) => {
            tracing::warn!(key, error = %e, "Malformed replicated blob, treating as empty");
            Vec::new()
        },
    }
}

/// Encode a composite list into its blob form.
pub fn encode_blob<T: Serialize>(key: &str, list: &[T]) -> String {
    serde_json::to_string(list).unwrap_or_else(|e| {
        tracing::warn!(key, error = %e, "Failed to encode blob");
        "[]".to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::Phase;
    use serde_json::json;

    #[test]
    fn blob_empty_and_malformed_read_as_empty() {
        assert!(decode_blob::<u32>("pets", "").is_empty());
        assert!(decode_blob::<u32>("pets", "{not json").is_empty());
        assert_eq!(decode_blob::<u32>("pets", "[1,2]"), vec![1, 2]);
        assert_eq!(encode_blob("pets", &[3u32]), "[3]");
    }

    #[test]
    fn apply_known_key() {
        let mut room = RoomState::default();
        room.apply_field("phase", json!("night")).unwrap();
        assert_eq!(room.phase, Phase::Night);
    }

    #[test]
    fn unknown_key_rejected() {
        let mut room = RoomState::default();
        let err = room.apply_field("bogus", json!(1)).unwrap_err();
        assert_eq!(err, SchemaError::UnknownKey("bogus".to_string()));
    }

    #[test]
    fn wrong_type_rejected_and_state_untouched() {
        let mut peer = PeerState::default();
        peer.x = 4.0;
        let err = peer.apply_field("x", json!("far away")).unwrap_err();
        assert!(matches!(err, SchemaError::Malformed { .. }));
        assert_eq!(peer.x, 4.0);
    }

    #[test]
    fn bad_enum_value_rejected() {
        let mut room = RoomState::default();
        assert!(room.apply_field("phase", json!("brunch")).is_err());
        assert_eq!(room.phase, Phase::Lobby);
    }

    #[test]
    fn open_namespace_accepted() {
        let mut room = RoomState::default();
        room.apply_field("wire:panel1", json!({"cut": [1, 2]})).unwrap();
        assert_eq!(room.minigames["wire:panel1"], json!({"cut": [1, 2]}));
    }

    #[test]
    fn diff_reports_only_changed_keys() {
        let before = PeerState::default();
        let mut after = before.clone();
        after.x = 2.0;
        after.infected = true;
        let mut keys: Vec<String> = diff_fields(&before, &after)
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["infected".to_string(), "x".to_string()]);
    }

    #[test]
    fn diff_of_identical_is_empty() {
        let room = RoomState::default();
        assert!(diff_fields(&room, &room.clone()).unwrap().is_empty());
    }
}
