//! Quantified invariants, exercised across multiple
//! inputs rather than one hard-coded scenario.

use std::sync::atomic::Ordering;
use std::time::Duration;

use btcmesh_core::chunker::{self, CHUNK_SIZE};
use btcmesh_core::wire::WireMessage;
use btcmesh_core::SessionId;
use btcmesh_services::janitor::Janitor;

use crate::infra::{recv_text, Harness, ScriptedRpc};

/// Invariant 1: for every valid hex input and chunk size, concatenating
/// the chunker's output in order reproduces the input exactly, and every
/// fragment is non-empty and at most `chunk_size` long.
#[test]
fn chunker_concatenation_round_trips_across_sizes_and_lengths() {
    for chunk_size in [1usize, 2, 7, 64, CHUNK_SIZE, 237] {
        for pairs in [1usize, 2, 3, 85, 170, 171, 500] {
            let hex = "ab".repeat(pairs);
            let fragments = chunker::chunk(&hex, chunk_size).unwrap();
            assert_eq!(fragments.concat(), hex);
            assert!(fragments
                .iter()
                .all(|f| !f.is_empty() && f.len() <= chunk_size));
        }
    }
}

/// Invariant 2 & 3: across duplicates and reorderings, the server
/// broadcasts exactly once and emits exactly one terminal message, and
/// the broadcast input is the fragments concatenated in ascending order
/// regardless of arrival order.
#[tokio::test]
async fn reordered_and_duplicated_chunks_broadcast_exactly_once_in_order() {
    let harness = Harness::new(ScriptedRpc::ok("cafe"));
    let (_peer, mut peer_rx) = harness.join("peer");

    let sid = SessionId::generate();
    let fragments = ["aa", "bb", "cc", "dd"];
    // Deliberately out of order, with a duplicate of chunk 2 thrown in.
    let arrival_order = [3u32, 1, 2, 2, 4];

    for n in arrival_order {
        harness
            .server_engine
            .on_message(
                "peer",
                &WireMessage::Chunk {
                    sid,
                    n,
                    total: 4,
                    payload: fragments[(n - 1) as usize].to_string(),
                }
                .to_wire(),
            )
            .await;
    }

    // Drain every reply; exactly one of them is a terminal ACK.
    let mut terminal_count = 0;
    let mut acks_seen = 0;
    loop {
        let Some(reply) = tokio::time::timeout(Duration::from_millis(200), peer_rx.recv())
            .await
            .ok()
            .flatten()
        else {
            break;
        };
        match WireMessage::parse(&reply.text).unwrap() {
            WireMessage::Ack { sid: rsid, .. } => {
                assert_eq!(rsid, sid);
                terminal_count += 1;
            }
            WireMessage::Nack { .. } => terminal_count += 1,
            WireMessage::ChunkAck { .. } => acks_seen += 1,
            other => panic!("unexpected message: {other:?}"),
        }
    }

    assert_eq!(terminal_count, 1, "exactly one terminal message");
    assert_eq!(acks_seen, 5, "one chunk ack per inbound chunk message");
    assert_eq!(harness.rpc.calls.load(Ordering::SeqCst), 1, "broadcast exactly once");
}

/// Invariant 4: the server never requests a chunk number outside
/// `[1, total_chunks + 1]`.
#[tokio::test]
async fn per_chunk_ack_never_requests_outside_valid_range() {
    let harness = Harness::new(ScriptedRpc::ok("cafe"));
    let (_peer, mut peer_rx) = harness.join("peer");

    let sid = SessionId::generate();
    let total = 5u32;
    for n in [3u32, 1, 5, 2, 4] {
        harness
            .server_engine
            .on_message(
                "peer",
                &WireMessage::Chunk {
                    sid,
                    n,
                    total,
                    payload: "aa".into(),
                }
                .to_wire(),
            )
            .await;
        let reply = recv_text(&mut peer_rx).await;
        if let WireMessage::ChunkAck { next, .. } = WireMessage::parse(&reply).unwrap() {
            assert!((1..=total + 1).contains(&next));
        }
    }
}

/// Invariant 6: timeout eviction frees the session table within one
/// janitor period of reaching the deadline.
#[tokio::test(start_paused = true)]
async fn timeout_eviction_frees_the_table_within_one_janitor_period() {
    let harness = Harness::new(ScriptedRpc::ok("cafe"));
    let (_peer, mut peer_rx) = harness.join("peer");

    let sid = SessionId::generate();
    harness
        .server_engine
        .on_message(
            "peer",
            &WireMessage::Chunk {
                sid,
                n: 1,
                total: 2,
                payload: "aa".into(),
            }
            .to_wire(),
        )
        .await;
    let _ack = recv_text(&mut peer_rx).await;
    assert!(harness.server_engine.session_table().contains_key(&sid));

    let janitor = Janitor::new(harness.server_engine.clone(), Duration::from_millis(50))
        .with_tick_interval(Duration::from_millis(10));
    let handle = janitor.spawn();

    tokio::time::advance(Duration::from_millis(80)).await;
    tokio::task::yield_now().await;

    assert!(!harness.server_engine.session_table().contains_key(&sid));
    handle.abort();
}
