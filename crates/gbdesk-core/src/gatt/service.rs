//! Peripheral service
//!
//! Owns the characteristics of the bridge service and routes transport events to
//! them by UUID. The composition is fixed at construction.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::GattConfig;
use crate::errors::{GattError, Result};
use crate::gatt::characteristic::{CharacteristicStateMachine, NotifyChannel};
use crate::gatt::roles::{CharacteristicRole, MessageSync, NotificationIntake, RoleContext};
use crate::notifier::Notifier;
use crate::protocol::message_store::MessageStore;
use crate::protocol::sync_cursor::SyncCursorProtocol;

// ----------------------------------------------------------------------------
// Events
// ----------------------------------------------------------------------------

/// Connection-scoped event delivered by the transport
#[derive(Debug)]
pub enum GattEvent {
    Read {
        uuid: Uuid,
        offset: usize,
    },
    Write {
        uuid: Uuid,
        value: Vec<u8>,
        offset: usize,
        ack_required: bool,
    },
    Subscribe {
        uuid: Uuid,
        max_payload_size: usize,
        channel: NotifyChannel,
    },
    Unsubscribe {
        uuid: Uuid,
    },
}

impl GattEvent {
    /// Characteristic the event is addressed to
    pub fn uuid(&self) -> Uuid {
        match self {
            Self::Read { uuid, .. }
            | Self::Write { uuid, .. }
            | Self::Subscribe { uuid, .. }
            | Self::Unsubscribe { uuid } => *uuid,
        }
    }
}

/// Outcome reported back to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GattResponse {
    Read(Vec<u8>),
    Ack,
    Subscribed,
    Unsubscribed,
}

// ----------------------------------------------------------------------------
// Characteristic
// ----------------------------------------------------------------------------

/// A state machine paired with the role that gives its events meaning
pub struct Characteristic {
    machine: CharacteristicStateMachine,
    role: Arc<dyn CharacteristicRole>,
}

impl Characteristic {
    pub fn new(machine: CharacteristicStateMachine, role: Arc<dyn CharacteristicRole>) -> Self {
        Self { machine, role }
    }

    pub fn machine(&self) -> &CharacteristicStateMachine {
        &self.machine
    }

    pub fn role_name(&self) -> &'static str {
        self.role.name()
    }
}

impl fmt::Debug for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Characteristic")
            .field("machine", &self.machine)
            .field("role", &self.role.name())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Service
// ----------------------------------------------------------------------------

/// The GATT service exposed to the phone
#[derive(Debug)]
pub struct PeripheralService {
    uuid: Uuid,
    characteristics: Vec<Characteristic>,
}

impl PeripheralService {
    /// Compose a service; characteristic UUIDs must be unique
    pub fn new(uuid: Uuid, characteristics: Vec<Characteristic>) -> Result<Self> {
        let mut seen = HashSet::new();
        for characteristic in &characteristics {
            let id = characteristic.machine.uuid();
            if !seen.insert(id) {
                return Err(GattError::DuplicateCharacteristicUuid { uuid: id });
            }
        }
        Ok(Self {
            uuid,
            characteristics,
        })
    }

    /// The bridge service: message sync plus notification intake
    pub fn bridge(
        config: &GattConfig,
        store: Arc<dyn MessageStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let message_sync = MessageSync::new(store, SyncCursorProtocol::new(config.cursor_window));
        let intake = NotificationIntake::new(notifier)
            .with_icon(config.notification_icon.clone())
            .with_connection_title(config.connection_title.clone())
            .with_echo_writes(config.echo_notifications);

        Self::new(
            config.service_uuid,
            vec![
                Characteristic::new(
                    CharacteristicStateMachine::new(
                        config.message_sync_uuid,
                        config.message_sync_capacity,
                    ),
                    Arc::new(message_sync),
                ),
                Characteristic::new(
                    CharacteristicStateMachine::new(
                        config.notification_uuid,
                        config.notification_capacity,
                    ),
                    Arc::new(intake),
                ),
            ],
        )
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn characteristics(&self) -> &[Characteristic] {
        &self.characteristics
    }

    /// State machine for `uuid`, if this service has one
    pub fn characteristic(&self, uuid: Uuid) -> Option<&CharacteristicStateMachine> {
        self.characteristics
            .iter()
            .map(|c| &c.machine)
            .find(|m| m.uuid() == uuid)
    }

    fn index_of(&self, uuid: Uuid) -> Result<usize> {
        self.characteristics
            .iter()
            .position(|c| c.machine.uuid() == uuid)
            .ok_or(GattError::UnknownCharacteristic { uuid })
    }

    /// Process one transport event
    pub async fn handle(&mut self, event: GattEvent) -> Result<GattResponse> {
        let index = self.index_of(event.uuid())?;
        let characteristic = &mut self.characteristics[index];
        let role = Arc::clone(&characteristic.role);
        let machine = &mut characteristic.machine;

        match event {
            GattEvent::Read { uuid, offset } => {
                let value = machine.read(offset)?.to_vec();
                let ctx = RoleContext {
                    uuid,
                    handle: machine.notify_handle().await,
                };
                role.on_read(&ctx, offset, &value).await;
                Ok(GattResponse::Read(value))
            }
            GattEvent::Write {
                uuid,
                value,
                offset,
                ack_required,
            } => {
                machine.write(&value, offset, ack_required)?;
                let current = machine.value().to_vec();
                let ctx = RoleContext {
                    uuid,
                    handle: machine.notify_handle().await,
                };
                if let Err(e) = role.on_write(&ctx, &current).await {
                    log_role_error(role.name(), "write", &e);
                }
                Ok(GattResponse::Ack)
            }
            GattEvent::Subscribe {
                uuid,
                max_payload_size,
                channel,
            } => {
                let handle = machine.subscribe(max_payload_size, channel).await?;
                info!("Central subscribed to {} ({})", uuid, role.name());
                if let Err(e) = role.on_subscribe(&handle).await {
                    log_role_error(role.name(), "subscribe", &e);
                }
                Ok(GattResponse::Subscribed)
            }
            GattEvent::Unsubscribe { uuid } => {
                machine.unsubscribe().await?;
                info!("Central unsubscribed from {} ({})", uuid, role.name());
                let ctx = RoleContext { uuid, handle: None };
                if let Err(e) = role.on_unsubscribe(&ctx).await {
                    log_role_error(role.name(), "unsubscribe", &e);
                }
                Ok(GattResponse::Unsubscribed)
            }
        }
    }

    /// Unsubscribe every subscribed characteristic; returns how many were live
    pub async fn disconnect_all(&mut self) -> usize {
        let mut dropped = 0;
        for characteristic in &self.characteristics {
            let machine = &characteristic.machine;
            if machine.unsubscribe().await.is_err() {
                continue;
            }
            dropped += 1;
            let ctx = RoleContext {
                uuid: machine.uuid(),
                handle: None,
            };
            if let Err(e) = characteristic.role.on_unsubscribe(&ctx).await {
                log_role_error(characteristic.role.name(), "unsubscribe", &e);
            }
        }
        if dropped > 0 {
            info!("Central disconnected, dropped {} subscription(s)", dropped);
        }
        dropped
    }
}

fn log_role_error(role: &str, event: &str, err: &GattError) {
    if err.is_per_message() {
        warn!("Dropped {} on {}: {}", event, role, err);
    } else if matches!(err, GattError::NotSubscribed { .. }) {
        debug!("{} on {} outlived its subscription: {}", event, role, err);
    } else {
        error!("Failed to handle {} on {}: {}", event, role, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::RecordingNotifier;
    use crate::protocol::message_store::MemoryMessageStore;

    fn bridge() -> (PeripheralService, Arc<MemoryMessageStore>, RecordingNotifier) {
        let store = Arc::new(MemoryMessageStore::new());
        let notifier = RecordingNotifier::new();
        let service = PeripheralService::bridge(
            &GattConfig::default().with_echo_notifications(false),
            store.clone(),
            Arc::new(notifier.clone()),
        )
        .unwrap();
        (service, store, notifier)
    }

    #[test]
    fn test_duplicate_uuid_rejected() {
        let uuid = Uuid::from_u128(7);
        let role: Arc<dyn CharacteristicRole> =
            Arc::new(NotificationIntake::new(Arc::new(RecordingNotifier::new())));
        let err = PeripheralService::new(
            Uuid::from_u128(1),
            vec![
                Characteristic::new(CharacteristicStateMachine::new(uuid, 8), role.clone()),
                Characteristic::new(CharacteristicStateMachine::new(uuid, 8), role),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, GattError::DuplicateCharacteristicUuid { .. }));
    }

    #[test]
    fn test_duplicate_config_uuids_rejected() {
        let uuid = Uuid::from_u128(9);
        let config = GattConfig::default().with_uuids(Uuid::from_u128(1), uuid, uuid);
        let result = PeripheralService::bridge(
            &config,
            Arc::new(MemoryMessageStore::new()),
            Arc::new(RecordingNotifier::new()),
        );
        assert!(matches!(
            result,
            Err(GattError::DuplicateCharacteristicUuid { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_characteristic() {
        let (mut service, _, _) = bridge();
        let err = service
            .handle(GattEvent::Read {
                uuid: Uuid::from_u128(0xdead),
                offset: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GattError::UnknownCharacteristic { .. }));
    }

    #[tokio::test]
    async fn test_malformed_write_still_acked() {
        let (mut service, store, notifier) = bridge();
        let config = GattConfig::default();

        for uuid in [config.message_sync_uuid, config.notification_uuid] {
            let response = service
                .handle(GattEvent::Write {
                    uuid,
                    value: b"not json".to_vec(),
                    offset: 0,
                    ack_required: true,
                })
                .await
                .unwrap();
            assert_eq!(response, GattResponse::Ack);
        }
        assert_eq!(store.message_count().await.unwrap(), 0);
        assert!(notifier.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_read_returns_last_write() {
        let (mut service, _, _) = bridge();
        let uuid = GattConfig::default().notification_uuid;
        let body = br#"{"title":"T","body":"B"}"#.to_vec();

        service
            .handle(GattEvent::Write {
                uuid,
                value: body.clone(),
                offset: 0,
                ack_required: false,
            })
            .await
            .unwrap();
        let response = service
            .handle(GattEvent::Read { uuid, offset: 0 })
            .await
            .unwrap();
        assert_eq!(response, GattResponse::Read(body));
    }

    #[tokio::test]
    async fn test_disconnect_all() {
        let (mut service, _, notifier) = bridge();
        let config = GattConfig::default();
        let (sync_channel, _sync_rx) = NotifyChannel::new();
        let (intake_channel, _intake_rx) = NotifyChannel::new();

        service
            .handle(GattEvent::Subscribe {
                uuid: config.message_sync_uuid,
                max_payload_size: 20,
                channel: sync_channel,
            })
            .await
            .unwrap();
        service
            .handle(GattEvent::Subscribe {
                uuid: config.notification_uuid,
                max_payload_size: 20,
                channel: intake_channel,
            })
            .await
            .unwrap();

        assert_eq!(service.disconnect_all().await, 2);
        assert_eq!(service.disconnect_all().await, 0);
        for c in service.characteristics() {
            assert!(!c.machine().is_subscribed().await);
        }

        let messages: Vec<_> = notifier
            .records()
            .await
            .into_iter()
            .map(|r| r.message)
            .collect();
        assert_eq!(
            messages,
            vec!["GadgetBridge Connected", "GadgetBridge Disconnected"]
        );
    }
}
