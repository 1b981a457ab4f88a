#[allow(dead_code)]
mod common;

use std::time::Duration;

use serde_json::json;

use airlock_core::net::messages::{ClientMessage, JoinFailure, JoinRoomMsg, ServerMessage};
use airlock_core::net::protocol::PROTOCOL_VERSION;
use airlock_core::store::{Scope, StateWrite};
use airlock_relay::RelayConfig;
use common::{TestRelay, ws_connect, ws_join, ws_read, ws_send, ws_send_writes, ws_try_read};

const QUIET: Duration = Duration::from_millis(150);

fn write(scope: Scope, key: &str, writer: &str) -> StateWrite {
    StateWrite {
        scope,
        key: key.to_string(),
        value: json!(1),
        version: 1,
        writer: writer.to_string(),
    }
}

#[tokio::test]
async fn create_room_makes_creator_host() {
    let relay = TestRelay::new().await;
    let mut ws = ws_connect(&relay.url()).await;
    let resp = ws_join(&mut ws, "", "Alice").await;

    assert!(resp.success);
    let id = resp.peer_id.unwrap();
    assert_eq!(resp.host_id.as_deref(), Some(id.as_str()));
    let code = resp.room_code.unwrap();
    assert_eq!(code.len(), 9);
    assert_eq!(&code[4..5], "-");
    assert_eq!(resp.roster.len(), 1);
}

#[tokio::test]
async fn joiner_sees_host_and_host_sees_roster() {
    let relay = TestRelay::new().await;
    let mut host = ws_connect(&relay.url()).await;
    let created = ws_join(&mut host, "", "Alice").await;
    let code = created.room_code.unwrap();
    let host_id = created.peer_id.unwrap();

    let mut guest = ws_connect(&relay.url()).await;
    let joined = ws_join(&mut guest, &code, "Bob").await;
    assert!(joined.success);
    assert_eq!(joined.host_id.as_deref(), Some(host_id.as_str()));
    assert_eq!(joined.roster.len(), 2);

    match ws_read(&mut host).await {
        ServerMessage::Roster(r) => {
            assert_eq!(r.peers.len(), 2);
            assert_eq!(r.peers[1].name, "Bob");
            assert_eq!(r.host_id.as_deref(), Some(host_id.as_str()));
        },
        other => panic!("Expected Roster, got: {other:?}"),
    }
}

#[tokio::test]
async fn join_refusals() {
    let relay = TestRelay::with_config(RelayConfig {
        max_peers: 1,
        ..RelayConfig::default()
    })
    .await;

    let mut ws = ws_connect(&relay.url()).await;
    let resp = ws_join(&mut ws, "ZZZZ-0000", "Alice").await;
    assert!(!resp.success);
    assert_eq!(resp.error, Some(JoinFailure::RoomNotFound));

    let mut host = ws_connect(&relay.url()).await;
    let code = ws_join(&mut host, "", "Alice").await.room_code.unwrap();
    let mut late = ws_connect(&relay.url()).await;
    let resp = ws_join(&mut late, &code, "Bob").await;
    assert_eq!(resp.error, Some(JoinFailure::RoomFull));

    let mut old = ws_connect(&relay.url()).await;
    ws_send(
        &mut old,
        &ClientMessage::JoinRoom(JoinRoomMsg {
            room_code: String::new(),
            name: "Old".to_string(),
            protocol_version: PROTOCOL_VERSION + 1,
        }),
    )
    .await;
    match ws_read(&mut old).await {
        ServerMessage::JoinRoomResponse(r) => assert_eq!(
            r.error,
            Some(JoinFailure::VersionMismatch {
                expected: PROTOCOL_VERSION
            })
        ),
        other => panic!("Expected JoinRoomResponse, got: {other:?}"),
    }
}

#[tokio::test]
async fn writes_fan_out_with_authority() {
    let relay = TestRelay::new().await;
    let mut host = ws_connect(&relay.url()).await;
    let created = ws_join(&mut host, "", "Alice").await;
    let code = created.room_code.unwrap();
    let host_id = created.peer_id.unwrap();

    let mut guest = ws_connect(&relay.url()).await;
    let guest_id = ws_join(&mut guest, &code, "Bob").await.peer_id.unwrap();
    let _ = ws_read(&mut host).await; // roster

    ws_send_writes(&mut host, vec![write(Scope::Room, "day", &host_id)]).await;
    match ws_read(&mut guest).await {
        ServerMessage::RelayedWrites(w) => {
            assert_eq!(w.from, host_id);
            assert_eq!(w.writes[0].key, "day");
        },
        other => panic!("Expected RelayedWrites, got: {other:?}"),
    }
    assert!(ws_try_read(&mut host, QUIET).await.is_none());

    // A guest cannot write room keys or pose as someone else.
    ws_send_writes(
        &mut guest,
        vec![
            write(Scope::Room, "day", &guest_id),
            write(Scope::Peer(host_id.clone()), "x", &host_id),
        ],
    )
    .await;
    assert!(ws_try_read(&mut host, QUIET).await.is_none());

    ws_send_writes(
        &mut guest,
        vec![write(Scope::Peer(guest_id.clone()), "x", &guest_id)],
    )
    .await;
    match ws_read(&mut host).await {
        ServerMessage::RelayedWrites(w) => {
            assert_eq!(w.from, guest_id);
            assert_eq!(w.writes.len(), 1);
        },
        other => panic!("Expected RelayedWrites, got: {other:?}"),
    }
}

#[tokio::test]
async fn host_leaving_promotes_oldest_guest() {
    let relay = TestRelay::new().await;
    let mut host = ws_connect(&relay.url()).await;
    let code = ws_join(&mut host, "", "Alice").await.room_code.unwrap();

    let mut second = ws_connect(&relay.url()).await;
    let second_id = ws_join(&mut second, &code, "Bob").await.peer_id.unwrap();
    let mut third = ws_connect(&relay.url()).await;
    ws_join(&mut third, &code, "Carol").await;
    let _ = ws_read(&mut second).await; // Carol joined

    host.close(None).await.unwrap();

    for ws in [&mut second, &mut third] {
        match ws_read(ws).await {
            ServerMessage::Roster(r) => {
                assert_eq!(r.peers.len(), 2);
                assert_eq!(r.host_id.as_deref(), Some(second_id.as_str()));
            },
            other => panic!("Expected Roster, got: {other:?}"),
        }
    }
}

#[tokio::test]
async fn first_message_must_be_a_join() {
    let relay = TestRelay::new().await;
    let mut ws = ws_connect(&relay.url()).await;
    ws_send_writes(&mut ws, vec![]).await;
    match ws_read(&mut ws).await {
        ServerMessage::JoinRoomResponse(r) => {
            assert!(!r.success);
            assert_eq!(r.error, Some(JoinFailure::NotJoined));
        },
        other => panic!("Expected JoinRoomResponse, got: {other:?}"),
    }
}
