//! Client-to-host intent channel.
//!
//! A peer issues a request by bumping its own `reqId` and filling in
//! `reqType`/`reqTarget`/`reqValue` (plus an optional structured payload).
//! The host reads these fields once per tick and uses a [`RequestWatermark`]
//! to apply each `(peer, reqId)` exactly once.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::peer::{PeerId, PeerState};

/// Kind of intent carried in `reqType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Pickup,
    Drop,
    Throw,
    Use,
    Ability,
    /// Handler switches its pet between `follow`, `stay` and `seekCure`.
    PetMode,
    /// Lobby to game transition; only honored from the host's own peer.
    Launch,
}

/// One pending request read from a peer's state.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub peer: PeerId,
    pub id: u64,
    pub kind: RequestKind,
    pub target: String,
    pub value: f64,
    pub payload: Option<Value>,
}

impl Request {
    /// Read the pending request from a peer's state, if any.
    /// `reqId == 0` means nothing is pending.
    pub fn from_state(peer: &str, state: &PeerState) -> Option<Request> {
        if state.req_id == 0 {
            return None;
        }
        let kind = state.req_type?;
        Some(Request {
            peer: peer.to_string(),
            id: state.req_id,
            kind,
            target: state.req_target.clone(),
            value: state.req_value,
            payload: state.req_payload.clone(),
        })
    }

    /// Optional yaw override carried by a throw request.
    pub fn yaw_override(&self) -> Option<f32> {
        if let Some(Value::Object(map)) = &self.payload
            && let Some(yaw) = map.get("yaw").and_then(Value::as_f64)
        {
            return Some(yaw as f32);
        }
        self.value.is_finite().then_some(self.value as f32).filter(|v| *v != 0.0)
    }

    /// Target peer named in the payload (`{"target": "<peer id>"}`), if present.
    pub fn payload_target(&self) -> Option<&str> {
        match &self.payload {
            Some(Value::Object(map)) => map.get("target").and_then(Value::as_str),
            _ => None,
        }
    }
}

/// Write a new request into a peer's own state. Returns the new `reqId`.
pub fn issue(
    state: &mut PeerState,
    kind: RequestKind,
    target: impl Into<String>,
    value: f64,
    payload: Option<Value>,
) -> u64 {
    state.req_id += 1;
    state.req_type = Some(kind);
    state.req_target = target.into();
    state.req_value = value;
    state.req_payload = payload;
    state.req_id
}

/// Parsed `use` target: `"eat|<itemId>"` or `"<device>|<itemId>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UseTarget {
    Eat { item: String },
    Device { device: String, item: String },
}

impl UseTarget {
    pub fn parse(target: &str) -> Option<UseTarget> {
        let (kind, item) = target.split_once('|')?;
        if kind.is_empty() || item.is_empty() {
            return None;
        }
        if kind == "eat" {
            Some(UseTarget::Eat {
                item: item.to_string(),
            })
        } else {
            Some(UseTarget::Device {
                device: kind.to_string(),
                item: item.to_string(),
            })
        }
    }

    pub fn item(&self) -> &str {
        match self {
            UseTarget::Eat { item } | UseTarget::Device { item, .. } => item,
        }
    }
}

/// Role ability named in an `ability` request target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityKind {
    Shoot,
    Bite,
    Scan,
}

impl AbilityKind {
    pub const ALL: [AbilityKind; 3] = [AbilityKind::Shoot, AbilityKind::Bite, AbilityKind::Scan];

    pub fn parse(target: &str) -> Option<AbilityKind> {
        match target {
            "shoot" => Some(AbilityKind::Shoot),
            "bite" => Some(AbilityKind::Bite),
            "scan" => Some(AbilityKind::Scan),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AbilityKind::Shoot => "shoot",
            AbilityKind::Bite => "bite",
            AbilityKind::Scan => "scan",
        }
    }
}

/// Host-local record of the highest applied `reqId` per peer.
///
/// Not replicated: a new host starts empty and may re-apply the single most
/// recent in-flight request of each peer.
#[derive(Debug, Default)]
pub struct RequestWatermark {
    last: HashMap<PeerId, u64>,
}

impl RequestWatermark {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `req_id` for `peer` and return whether it is new.
    /// Zero and anything not strictly above the last seen id are refused.
    pub fn accept(&mut self, peer: &str, req_id: u64) -> bool {
        if req_id == 0 {
            return false;
        }
        match self.last.get_mut(peer) {
            Some(last) if req_id <= *last => false,
            Some(last) => {
                *last = req_id;
                true
            },
            None => {
                self.last.insert(peer.to_string(), req_id);
                true
            },
        }
    }

    pub fn last_seen(&self, peer: &str) -> Option<u64> {
        self.last.get(peer).copied()
    }

    /// Drop the entry for a departed peer.
    pub fn forget(&mut self, peer: &str) {
        self.last.remove(peer);
    }

    /// Drop entries for peers that fail `keep`.
    pub fn retain(&mut self, keep: impl Fn(&str) -> bool) {
        self.last.retain(|peer, _| keep(peer));
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}
