//! Event pump behaviour under concurrent transport callbacks
//!
//! BlueZ can fire callbacks from many tasks at once; these tests play that role
//! with plain tokio tasks.

use std::sync::Arc;

use gbdesk_ble::{BleError, EventPump};
use gbdesk_core::{
    GattConfig, GattError, GattEvent, GattResponse, MemoryMessageStore, MessageStore,
    NotifyChannel, PeripheralService, RecordingNotifier,
};

fn bridge(store: Arc<MemoryMessageStore>, notifier: RecordingNotifier) -> PeripheralService {
    PeripheralService::bridge(&GattConfig::default(), store, Arc::new(notifier)).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_writes_store_once() {
    let store = Arc::new(MemoryMessageStore::new());
    let (sender, pump) = EventPump::spawn(bridge(store.clone(), RecordingNotifier::new()), 8);
    let uuid = GattConfig::default().message_sync_uuid;

    let writers: Vec<_> = (0..32)
        .map(|n| {
            let sender = sender.clone();
            tokio::spawn(async move {
                let value = format!(r#"{{"id":"{}","n":{}}}"#, n % 4, n).into_bytes();
                sender
                    .request(GattEvent::Write {
                        uuid,
                        value,
                        offset: 0,
                        ack_required: false,
                    })
                    .await
            })
        })
        .collect();

    for writer in writers {
        assert_eq!(writer.await.unwrap().unwrap(), GattResponse::Ack);
    }
    assert_eq!(store.message_count().await.unwrap(), 4);

    drop(sender);
    pump.await.unwrap();
}

#[tokio::test]
async fn test_phone_session() {
    let store = Arc::new(MemoryMessageStore::new());
    let notifier = RecordingNotifier::new();
    let config = GattConfig::default();
    let (sender, pump) = EventPump::spawn(bridge(store.clone(), notifier.clone()), 8);

    // Phone connects and subscribes to both characteristics
    let (sync_channel, mut sync_rx) = NotifyChannel::new();
    sender
        .request(GattEvent::Subscribe {
            uuid: config.message_sync_uuid,
            max_payload_size: 20,
            channel: sync_channel,
        })
        .await
        .unwrap();
    let (intake_channel, _intake_rx) = NotifyChannel::new();
    sender
        .request(GattEvent::Subscribe {
            uuid: config.notification_uuid,
            max_payload_size: 20,
            channel: intake_channel,
        })
        .await
        .unwrap();
    assert_eq!(sync_rx.recv().await.unwrap(), br#"{"sync":0}"#.to_vec());

    // Backlog and a notification arrive
    for id in ["m1", "m2"] {
        sender
            .request(GattEvent::Write {
                uuid: config.message_sync_uuid,
                value: format!(r#"{{"id":"{}"}}"#, id).into_bytes(),
                offset: 0,
                ack_required: true,
            })
            .await
            .unwrap();
    }
    sender
        .request(GattEvent::Write {
            uuid: config.notification_uuid,
            value: br#"{"title":"Chat","body":"Lunch?"}"#.to_vec(),
            offset: 0,
            ack_required: true,
        })
        .await
        .unwrap();

    // Link drops, subscriptions go with it
    sender.disconnected().await.unwrap();
    let err = sender
        .request(GattEvent::Unsubscribe {
            uuid: config.message_sync_uuid,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BleError::Gatt(GattError::NotSubscribed { .. })));

    let messages: Vec<_> = notifier
        .records()
        .await
        .into_iter()
        .map(|r| r.message)
        .collect();
    assert_eq!(
        messages,
        vec!["GadgetBridge Connected", "Lunch?", "GadgetBridge Disconnected"]
    );
    assert_eq!(store.message_count().await.unwrap(), 2);

    sender.shutdown().await.unwrap();
    pump.await.unwrap();
}
