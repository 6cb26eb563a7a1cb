//! Integration tests for the async messenger.
//!
//! Two messengers are wired together with a `MemoryTransport` pair (and
//! one test over real UDP sockets), then driven through their handles.

use std::time::Duration;

use emberlink::prelude::*;
use tokio::time::timeout;

// =========================================================================
// Helpers
// =========================================================================

const WAIT: Duration = Duration::from_secs(5);

fn linked() -> (MessengerHandle, MessengerHandle) {
    let (a, b) = MemoryTransport::pair(64);
    let client = Messenger::spawn(a, ConnectionConfig::default()).expect("should spawn");
    let server = Messenger::spawn(b, ConnectionConfig::default()).expect("should spawn");
    (client, server)
}

async fn next(handle: &mut MessengerHandle) -> Message {
    timeout(WAIT, handle.recv())
        .await
        .expect("timed out waiting for message")
        .expect("messenger stopped")
}

fn snapshot(entities: u32) -> GameMasterFrame {
    GameMasterFrame {
        tick_id: 12,
        entities: (0..entities)
            .map(|id| Entity {
                id,
                health_percent: 100,
                ..Entity::default()
            })
            .collect(),
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_request_and_response() {
    emberlink::init_tracing();
    let (mut client, mut server) = linked();

    client
        .send(Login {
            name: "alice".into(),
            password: "secret".into(),
        })
        .await
        .expect("send should succeed");

    let Message::Login(login) = next(&mut server).await else {
        panic!("expected Login");
    };
    assert_eq!(login.name, "alice");

    server
        .send(LoginResponse {
            success: 1,
            name: login.name,
            account_id: 7,
            characters: vec![Character {
                id: 1,
                name: "Ash".into(),
            }],
        })
        .await
        .unwrap();

    match next(&mut client).await {
        Message::LoginResponse(response) => {
            assert_eq!(response.account_id, 7);
            assert_eq!(response.characters.len(), 1);
        }
        other => panic!("expected LoginResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn test_large_snapshot_crosses_as_fragments() {
    let (client, mut server) = linked();
    let frame = snapshot(500);
    assert!(Message::from(frame.clone()).encoded_len() > 10_000);

    client.send(frame.clone()).await.unwrap();
    assert_eq!(next(&mut server).await, Message::from(frame));
}

#[tokio::test]
async fn test_messages_arrive_in_send_order() {
    let (client, mut server) = linked();
    for tick_id in 0..20 {
        client
            .send(MovePlayer {
                entity_id: 1,
                tick_id,
                direction: 1,
            })
            .await
            .unwrap();
    }

    for expected in 0..20 {
        match next(&mut server).await {
            Message::MovePlayer(m) => assert_eq!(m.tick_id, expected),
            other => panic!("expected MovePlayer, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_close_sends_disconnected_and_stops_peer() {
    let (client, mut server) = linked();
    client.close().await.expect("clean close");

    assert_eq!(next(&mut server).await, Message::from(Disconnected {}));
    // The peer's task ends after delivering Disconnected.
    let after = timeout(WAIT, server.recv()).await.expect("timed out");
    assert!(after.is_none());
    assert!(matches!(
        server.send(Heartbeat { time: 0 }).await,
        Err(EmberlinkError::Closed)
    ));
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let (a, _b) = MemoryTransport::pair(1);
    let config = ConnectionConfig {
        queue_capacity: 0,
        ..ConnectionConfig::default()
    };
    assert!(matches!(
        Messenger::spawn(a, config),
        Err(EmberlinkError::Config(_))
    ));
}

#[tokio::test]
async fn test_over_udp() {
    let a = UdpTransport::bind("127.0.0.1:0").await.unwrap();
    let b = UdpTransport::bind("127.0.0.1:0").await.unwrap();
    a.connect(b.local_addr().unwrap()).await.unwrap();
    b.connect(a.local_addr().unwrap()).await.unwrap();

    let client = Messenger::spawn(a, ConnectionConfig::default()).unwrap();
    let mut server = Messenger::spawn(b, ConnectionConfig::default()).unwrap();

    let frame = snapshot(100);
    client.send(frame.clone()).await.unwrap();
    assert_eq!(next(&mut server).await, Message::from(frame));

    client.close().await.unwrap();
    server.close().await.unwrap();
}
