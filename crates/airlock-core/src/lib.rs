pub mod clock;
pub mod directory;
pub mod event_log;
pub mod geometry;
pub mod items;
pub mod keybinds;
pub mod local;
pub mod net;
pub mod peer;
pub mod pets;
pub mod request;
pub mod room;
pub mod schema;
pub mod station;
pub mod store;
pub mod time;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::geometry::Vec3;
    use crate::peer::{PeerId, PeerProfile, PeerState};
    use crate::room::RoomConfig;
    use crate::schema::diff_fields;
    use crate::store::{Scope, SharedStateStore, StateWrite};

    /// Build a store as seen by the host `p0`, with peers `p0..p{n-1}`.
    pub fn host_store(n: usize, config: &RoomConfig) -> (SharedStateStore, Vec<PeerId>) {
        let ids: Vec<PeerId> = (0..n).map(|i| format!("p{i}")).collect();
        let mut store = SharedStateStore::new(
            ids[0].clone(),
            PeerProfile {
                name: "Player1".to_string(),
            },
            config,
        );
        for (i, id) in ids.iter().enumerate().skip(1) {
            store.add_peer(
                id.clone(),
                PeerProfile {
                    name: format!("Player{}", i + 1),
                },
            );
        }
        store.set_host(Some(ids[0].clone()));
        (store, ids)
    }

    /// Apply a change to a peer's bag as if the owner had written and
    /// replicated it. Bypasses nothing: the writes go through `apply_remote`.
    pub fn owner_writes(store: &mut SharedStateStore, id: &str, f: impl FnOnce(&mut PeerState)) {
        let Some(current) = store.peer(id).map(|p| p.state.clone()) else {
            panic!("unknown peer {id}");
        };
        let mut next = current.clone();
        f(&mut next);
        let scope = Scope::Peer(id.to_string());
        for (key, value) in diff_fields(&current, &next).unwrap() {
            let version = store.version_of(&scope, &key).map_or(0, |(v, _)| v) + 1;
            store
                .apply_remote(StateWrite {
                    scope: scope.clone(),
                    key,
                    value,
                    version,
                    writer: id.to_string(),
                })
                .unwrap();
        }
    }

    /// Move a peer, as its owner.
    pub fn place(store: &mut SharedStateStore, id: &str, pos: Vec3) {
        owner_writes(store, id, |p| {
            p.x = pos.x;
            p.y = pos.y;
            p.z = pos.z;
        });
    }
}
