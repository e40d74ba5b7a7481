//! Property-based tests for idempotent message storage and delivery chunking
//!
//! These tests verify that the store keeps exactly one record per id no matter
//! how inserts are ordered or repeated, and that delivery frames never exceed
//! the negotiated payload size.

use std::collections::HashSet;
use std::sync::Arc;

use gbdesk_core::protocol::{
    FileMessageStore, MemoryMessageStore, MessageId, MessageStore, SyncCursorProtocol,
};
use proptest::prelude::*;
use serde_json::json;

/// Generate ids drawn from a small alphabet so repeats are common
fn arb_ids() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-e][0-9]?", 0..40)
}

proptest! {
    /// Property: the store retains exactly one record per distinct id
    #[test]
    fn one_record_per_distinct_id(ids in arb_ids()) {
        let store = MemoryMessageStore::new();
        let distinct: HashSet<_> = ids.iter().cloned().collect();

        let inserted = tokio_test::block_on(async {
            let mut inserted = 0usize;
            for (n, id) in ids.iter().enumerate() {
                let id = MessageId::new(id.as_str()).unwrap();
                if store.insert_if_absent(id, json!({ "n": n })).await.unwrap().inserted {
                    inserted += 1;
                }
            }
            inserted
        });

        prop_assert_eq!(inserted, distinct.len());
        let count = tokio_test::block_on(store.message_count()).unwrap();
        prop_assert_eq!(count, distinct.len());

        let recent = tokio_test::block_on(store.most_recent(usize::MAX)).unwrap();
        let recent_ids: HashSet<_> = recent.iter().map(|m| m.id.as_str().to_string()).collect();
        prop_assert_eq!(recent_ids, distinct);
    }

    /// Property: the first payload written for an id is the one kept
    #[test]
    fn first_write_wins(ids in arb_ids()) {
        let store = MemoryMessageStore::new();
        tokio_test::block_on(async {
            for (n, id) in ids.iter().enumerate() {
                let id = MessageId::new(id.as_str()).unwrap();
                store.insert_if_absent(id, json!({ "n": n })).await.unwrap();
            }
        });

        let recent = tokio_test::block_on(store.most_recent(usize::MAX)).unwrap();
        for message in recent {
            let first = ids.iter().position(|id| id == message.id.as_str()).unwrap();
            prop_assert_eq!(&message.payload["n"], &json!(first));
        }
    }

    /// Property: most_recent never returns more than asked for, newest first
    #[test]
    fn most_recent_is_bounded_and_ordered(ids in arb_ids(), n in 0usize..10) {
        let store = MemoryMessageStore::new();
        tokio_test::block_on(async {
            for id in &ids {
                store
                    .insert_if_absent(MessageId::new(id.as_str()).unwrap(), json!({}))
                    .await
                    .unwrap();
            }
        });

        let recent = tokio_test::block_on(store.most_recent(n)).unwrap();
        let count = tokio_test::block_on(store.message_count()).unwrap();
        prop_assert_eq!(recent.len(), n.min(count));
        for pair in recent.windows(2) {
            prop_assert!(
                (pair[0].received_at, pair[0].sequence) > (pair[1].received_at, pair[1].sequence)
            );
        }
    }

    /// Property: delivery frames are bounded and reassemble to the input
    #[test]
    fn delivery_frames_are_bounded(
        data in prop::collection::vec(any::<u8>(), 0..600),
        max_payload_size in 1usize..64,
    ) {
        let frames = SyncCursorProtocol::plan_delivery(&data, max_payload_size);

        prop_assert!(!frames.is_empty());
        prop_assert!(frames.iter().all(|f| f.len() <= max_payload_size));
        prop_assert_eq!(frames.concat(), data.clone());
        prop_assert_eq!(frames.len(), data.len().div_ceil(max_payload_size).max(1));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_id_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(
        FileMessageStore::open(dir.path().join("messages.jsonl"))
            .await
            .unwrap(),
    );

    let tasks: Vec<_> = (0..16)
        .map(|n| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .insert_if_absent(MessageId::new("shared").unwrap(), json!({ "n": n }))
                    .await
                    .unwrap()
                    .inserted
            })
        })
        .collect();

    let mut inserted = 0;
    for task in tasks {
        if task.await.unwrap() {
            inserted += 1;
        }
    }
    assert_eq!(inserted, 1);
    assert_eq!(store.message_count().await.unwrap(), 1);

    // The log holds exactly the one record
    drop(store);
    let reopened = FileMessageStore::open(dir.path().join("messages.jsonl"))
        .await
        .unwrap();
    assert_eq!(reopened.message_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_file_store_replay_matches() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("messages.jsonl");

    let before = {
        let store = FileMessageStore::open(&path).await.unwrap();
        for id in ["1", "2", "2", "3"] {
            store
                .insert_if_absent(MessageId::new(id).unwrap(), json!({ "id": id }))
                .await
                .unwrap();
        }
        store.most_recent(10).await.unwrap()
    };

    let reopened = FileMessageStore::open(&path).await.unwrap();
    assert_eq!(reopened.message_count().await.unwrap(), 3);
    assert_eq!(reopened.most_recent(10).await.unwrap(), before);
}
