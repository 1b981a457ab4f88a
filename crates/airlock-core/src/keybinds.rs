//! Deterministic trigger-key assignment for role and infected abilities.
//!
//! A role's base ability and the infected overlay abilities may ask for the
//! same key. Reserved keys are granted first come first served in request
//! order; anything left over drafts from [`FALLBACK_KEYS`] in fixed order.
//! Two abilities never end up on the same key.

use crate::peer::Role;
use crate::request::AbilityKind;

/// Keys drafted, in order, by abilities whose reserved key was taken.
pub const FALLBACK_KEYS: [char; 6] = ['q', 'e', 'r', 'g', 'z', 'x'];

/// The key every primary ability asks for.
pub const PRIMARY_KEY: char = 'f';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingRequest {
    pub ability: AbilityKind,
    pub reserved: Option<char>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub ability: AbilityKind,
    /// `None` once the fallback pool is exhausted.
    pub key: Option<char>,
}

/// Abilities available to a peer, base role ability first.
pub fn ability_requests(role: Option<Role>, infected: bool) -> Vec<BindingRequest> {
    let mut out = Vec::new();
    let base = match role {
        Some(Role::Security) => Some(AbilityKind::Shoot),
        Some(Role::Doctor) => Some(AbilityKind::Scan),
        _ => None,
    };
    if let Some(ability) = base {
        out.push(BindingRequest {
            ability,
            reserved: Some(PRIMARY_KEY),
        });
    }
    if infected {
        out.push(BindingRequest {
            ability: AbilityKind::Bite,
            reserved: Some(PRIMARY_KEY),
        });
    }
    out
}

/// Resolve keys for `requests`, preserving their order in the result.
pub fn assign_keys(requests: &[BindingRequest]) -> Vec<Binding> {
    let mut taken: Vec<char> = Vec::new();
    let mut keys: Vec<Option<char>> = vec![None; requests.len()];

    for (slot, req) in requests.iter().enumerate() {
        if let Some(k) = req.reserved
            && !taken.contains(&k)
        {
            taken.push(k);
            keys[slot] = Some(k);
        }
    }

    let mut pool = FALLBACK_KEYS.iter().copied().filter(|k| !taken.contains(k));
    for key in keys.iter_mut() {
        if key.is_none() {
            *key = pool.next();
        }
    }

    requests
        .iter()
        .zip(keys)
        .map(|(req, key)| Binding {
            ability: req.ability,
            key,
        })
        .collect()
}
