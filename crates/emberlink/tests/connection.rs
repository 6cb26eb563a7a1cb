//! Integration tests for the synchronous connection pipeline.
//!
//! Two `Connection`s stand in for client and server; the "network" is
//! just passing `Bytes` from one to the other, which lets us drop,
//! reorder, and re-chunk datagrams at will.

use std::time::{Duration, Instant};

use bytes::Bytes;
use emberlink::prelude::*;
use emberlink::wire::{MULTIPART_TAG, PartFrame, WireError, WireLimits, encode_frame};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

// =========================================================================
// Helpers
// =========================================================================

fn pair() -> (Connection, Connection) {
    let config = ConnectionConfig::default();
    (Connection::new(&config), Connection::new(&config))
}

fn big_game(entities: u32) -> Message {
    CreateGameResponse {
        name: "big".into(),
        id: 1,
        seed: 99,
        entities: (0..entities)
            .map(|id| Entity {
                id,
                etype: 1,
                seed: u64::from(id),
                x: id,
                y: id * 2,
                height: 10,
                width: 10,
                health_percent: 50,
            })
            .collect(),
    }
    .into()
}

fn deliver(to: &mut Connection, datagrams: &[Bytes]) -> Vec<Message> {
    let mut out = Vec::new();
    for datagram in datagrams {
        out.extend(to.on_bytes(datagram).unwrap());
    }
    out
}

// =========================================================================
// Plain messages
// =========================================================================

#[test]
fn test_login_frame_is_25_bytes_and_decodes() {
    let (mut client, mut server) = pair();
    let login = Message::from(Login {
        name: "alice".into(),
        password: "secret".into(),
    });

    let datagrams = client.send(&login).unwrap();
    assert_eq!(datagrams.len(), 1);
    let frame = &datagrams[0];
    assert_eq!(frame.len(), 25);
    // type_tag = 7, sequence = 1, length = 19
    assert_eq!(&frame[..6], &[7, 0, 1, 0, 19, 0]);

    let received = server.on_bytes(frame).unwrap();
    assert_eq!(received, vec![login]);
}

#[test]
fn test_coalesced_and_split_datagrams() {
    let (mut client, mut server) = pair();
    let messages: Vec<Message> = vec![
        Heartbeat { time: 1 }.into(),
        ListGames {}.into(),
        JoinGame { id: 3, char_id: 4 }.into(),
    ];

    let mut stream = Vec::new();
    for message in &messages {
        for datagram in client.send(message).unwrap() {
            stream.extend_from_slice(&datagram);
        }
    }

    // Deliver in awkward 7-byte slices.
    let mut received = Vec::new();
    for chunk in stream.chunks(7) {
        received.extend(server.on_bytes(chunk).unwrap());
    }
    assert_eq!(received, messages);
    assert_eq!(server.buffered_len(), 0);
}

// =========================================================================
// Fragmentation
// =========================================================================

#[test]
fn test_large_message_is_fragmented_and_restored() {
    let (mut client, mut server) = pair();
    let message = big_game(100);
    assert!(message.encoded_len() > 512);

    let datagrams = client.send(&message).unwrap();
    assert!(datagrams.len() > 1);
    for datagram in &datagrams {
        assert!(datagram.len() <= 512);
        assert_eq!(u16::from_le_bytes([datagram[0], datagram[1]]), MULTIPART_TAG);
    }

    let received = deliver(&mut server, &datagrams);
    assert_eq!(received, vec![message]);
    assert_eq!(server.pending_groups(), 0);
}

#[test]
fn test_shuffled_parts_still_reassemble() {
    let (mut client, mut server) = pair();
    let message = big_game(300);
    let mut datagrams = client.send(&message).unwrap();
    datagrams.shuffle(&mut StdRng::seed_from_u64(11));

    assert_eq!(deliver(&mut server, &datagrams), vec![message]);
}

#[test]
fn test_interleaved_fragmented_messages() {
    let (mut client, mut server) = pair();
    let first = big_game(40);
    let second = big_game(60);
    let a = client.send(&first).unwrap();
    let b = client.send(&second).unwrap();

    // a0 b0 a1 b1 ...
    let mut interleaved = Vec::new();
    for i in 0..a.len().max(b.len()) {
        interleaved.extend(a.get(i).cloned());
        interleaved.extend(b.get(i).cloned());
    }

    let received = deliver(&mut server, &interleaved);
    assert_eq!(received.len(), 2);
    assert!(received.contains(&first));
    assert!(received.contains(&second));
}

#[test]
fn test_lost_part_never_completes_and_is_evicted() {
    let (mut client, mut server) = pair();
    let datagrams = client.send(&big_game(100)).unwrap();

    let received = deliver(&mut server, &datagrams[1..]);
    assert!(received.is_empty());
    assert_eq!(server.pending_groups(), 1);

    // Not idle long enough yet.
    assert!(server.evict_idle(Instant::now()).is_empty());

    let later = Instant::now() + Duration::from_secs(6);
    assert_eq!(server.evict_idle(later), vec![1]);
    assert_eq!(server.pending_groups(), 0);
}

#[test]
fn test_max_length_field_survives_reverse_order_delivery() {
    let (mut client, mut server) = pair();
    // 4-byte length prefix + 65 531 bytes fills a 65 535-byte payload.
    let message = Message::from(CreateGame {
        name: "z".repeat(65_531),
    });
    assert_eq!(message.encoded_len(), 65_535);

    let mut datagrams = client.send(&message).unwrap();
    assert_eq!(datagrams.len(), 133);
    datagrams.reverse();

    assert_eq!(deliver(&mut server, &datagrams), vec![message]);
    assert_eq!(server.pending_groups(), 0);

    let too_long = Message::from(CreateGame {
        name: "z".repeat(65_532),
    });
    assert!(matches!(
        client.send(&too_long),
        Err(EmberlinkError::Wire(WireError::FrameTooLarge { .. }))
    ));
}

#[test]
fn test_oversized_payload_fails_send_only() {
    let (mut client, mut server) = pair();
    // 70 000 bytes of names can't fit one 16-bit inner frame.
    let huge = ListGamesResponse {
        ids: Vec::new(),
        names: vec!["x".repeat(70_000)],
    };
    let err = client.send(&huge.into()).unwrap_err();
    assert!(matches!(err, EmberlinkError::Wire(WireError::FrameTooLarge { .. })));
    assert!(!err.is_fatal());

    // The connection still works afterwards.
    let datagrams = client.send(&Heartbeat { time: 2 }.into()).unwrap();
    assert_eq!(
        deliver(&mut server, &datagrams),
        vec![Message::from(Heartbeat { time: 2 })]
    );
}

// =========================================================================
// Bad input is dropped, the stream survives
// =========================================================================

#[test]
fn test_unknown_and_malformed_frames_are_skipped() {
    let (mut client, mut server) = pair();
    let mut stream = Vec::new();
    // Unknown tag.
    stream.extend_from_slice(&encode_frame(999, 1, b"??").unwrap());
    // Heartbeat with a 3-byte payload instead of 8.
    stream.extend_from_slice(&encode_frame(2, 2, &[1, 2, 3]).unwrap());
    // Reserved tag 0.
    stream.extend_from_slice(&encode_frame(0, 3, &[]).unwrap());
    // A good one.
    for datagram in client.send(&Heartbeat { time: 5 }.into()).unwrap() {
        stream.extend_from_slice(&datagram);
    }

    let received = server.on_bytes(&stream).unwrap();
    assert_eq!(received, vec![Message::from(Heartbeat { time: 5 })]);
}

#[test]
fn test_inconsistent_group_is_dropped() {
    let (_, mut server) = pair();
    let part = |index: u16, total: u16| {
        let part = PartFrame {
            part_index: index,
            group_id: 77,
            total_parts: total,
            chunk: Bytes::from_static(b"zz"),
        };
        encode_frame(MULTIPART_TAG, 1, &part.to_bytes()).unwrap()
    };

    assert!(server.on_bytes(&part(0, 3)).unwrap().is_empty());
    assert_eq!(server.pending_groups(), 1);
    // Same group, different total: the group goes away, nothing surfaces.
    assert!(server.on_bytes(&part(1, 4)).unwrap().is_empty());
    assert_eq!(server.pending_groups(), 0);
    // Out-of-range index into a group that is still open.
    assert!(server.on_bytes(&part(0, 2)).unwrap().is_empty());
    assert_eq!(server.pending_groups(), 1);
    assert!(server.on_bytes(&part(5, 2)).unwrap().is_empty());
    assert_eq!(server.pending_groups(), 0);
}

#[test]
fn test_completed_group_with_garbage_is_dropped() {
    let (_, mut server) = pair();
    let part = PartFrame {
        part_index: 0,
        group_id: 1,
        total_parts: 1,
        chunk: Bytes::from_static(b"not a frame"),
    };
    let frame = encode_frame(MULTIPART_TAG, 1, &part.to_bytes()).unwrap();
    assert!(server.on_bytes(&frame).unwrap().is_empty());
    assert_eq!(server.pending_groups(), 0);
}

#[test]
fn test_buffer_overflow_is_fatal() {
    let config = ConnectionConfig::builder()
        .limits(WireLimits::for_testing())
        .build()
        .unwrap();
    let mut server = Connection::new(&config);

    // A header promising 65 535 bytes, then more junk than the cap allows.
    server.on_bytes(&[7, 0, 1, 0, 0xFF, 0xFF]).unwrap();
    server.on_bytes(&vec![0; 65_000]).unwrap();
    let err = server.on_bytes(&vec![0; 1_000]).unwrap_err();
    assert!(err.is_fatal());

    server.reset();
    assert_eq!(server.buffered_len(), 0);
}
