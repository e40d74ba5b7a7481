//! BlueZ GATT application for the bridge service
//!
//! Every BlueZ callback is translated into a [`GattEvent`] and handed to the
//! event pump. Notify sessions get a forwarder task that drains the
//! characteristic's notify channel into the BlueZ notifier and reports the
//! unsubscribe once BlueZ stops the session.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bluer::gatt::local::{
    Application, ApplicationHandle, Characteristic, CharacteristicNotifier, CharacteristicNotify,
    CharacteristicNotifyMethod, CharacteristicRead, CharacteristicWrite,
    CharacteristicWriteMethod, ReqError, Service,
};
use bluer::gatt::WriteOp;
use futures::FutureExt;
use gbdesk_core::{GattConfig, GattError, GattEvent, GattResponse, NotifyChannel};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BleConfig;
use crate::error::{BleError, Result};
use crate::peripheral::EventSender;
use crate::protocol::payload_size_for_mtu;

// ----------------------------------------------------------------------------
// BlueZ Session
// ----------------------------------------------------------------------------

/// An open BlueZ session and the powered adapter the bridge runs on
pub struct BluezSession {
    _session: bluer::Session,
    adapter: bluer::Adapter,
}

impl BluezSession {
    pub async fn open(config: &BleConfig) -> Result<Self> {
        let session = bluer::Session::new()
            .await
            .map_err(|e| BleError::AdapterNotAvailable(format!("BlueZ session: {}", e)))?;

        let adapter = match &config.adapter_name {
            Some(name) => session.adapter(name),
            None => session.default_adapter().await,
        }
        .map_err(|e| BleError::AdapterNotAvailable(format!("BLE adapter: {}", e)))?;

        // Enable adapter if needed
        if !adapter.is_powered().await.unwrap_or(false) {
            adapter.set_powered(true).await.map_err(|e| {
                BleError::AdapterNotAvailable(format!("Failed to power on adapter: {}", e))
            })?;
        }

        info!("BlueZ adapter {} initialized", adapter.name());
        Ok(Self {
            _session: session,
            adapter,
        })
    }

    pub fn adapter(&self) -> &bluer::Adapter {
        &self.adapter
    }
}

// ----------------------------------------------------------------------------
// Application
// ----------------------------------------------------------------------------

/// Register the bridge service with BlueZ. Dropping the handle unregisters it.
pub async fn serve(
    adapter: &bluer::Adapter,
    config: &GattConfig,
    events: EventSender,
) -> Result<ApplicationHandle> {
    let payload_size = Arc::new(AtomicUsize::new(config.default_max_payload_size));
    let app = Application {
        services: vec![Service {
            uuid: config.service_uuid,
            primary: true,
            characteristics: vec![
                characteristic(config.message_sync_uuid, &events, &payload_size),
                characteristic(config.notification_uuid, &events, &payload_size),
            ],
            ..Default::default()
        }],
        ..Default::default()
    };

    let handle = adapter
        .serve_gatt_application(app)
        .await
        .map_err(|e| BleError::GattRegistrationFailed(e.to_string()))?;
    info!("Registered GATT service {}", config.service_uuid);
    Ok(handle)
}

/// Read, write and notify wiring for one characteristic.
///
/// `payload_size` tracks the notify ceiling derived from the last MTU BlueZ
/// reported on a read or write; notify sessions start with that value.
fn characteristic(
    uuid: Uuid,
    events: &EventSender,
    payload_size: &Arc<AtomicUsize>,
) -> Characteristic {
    let read_events = events.clone();
    let read_payload = Arc::clone(payload_size);
    let write_events = events.clone();
    let write_payload = Arc::clone(payload_size);
    let notify_events = events.clone();
    let notify_payload = Arc::clone(payload_size);

    Characteristic {
        uuid,
        read: Some(CharacteristicRead {
            read: true,
            fun: Box::new(move |req| {
                let events = read_events.clone();
                observe_mtu(&read_payload, req.mtu);
                async move {
                    let event = GattEvent::Read {
                        uuid,
                        offset: req.offset as usize,
                    };
                    match events.request(event).await {
                        Ok(GattResponse::Read(value)) => Ok(value),
                        Ok(other) => {
                            warn!("Unexpected response to read on {}: {:?}", uuid, other);
                            Err(ReqError::Failed)
                        }
                        Err(e) => Err(req_error(e)),
                    }
                }
                .boxed()
            }),
            ..Default::default()
        }),
        write: Some(CharacteristicWrite {
            write: true,
            write_without_response: true,
            method: CharacteristicWriteMethod::Fun(Box::new(move |value, req| {
                let events = write_events.clone();
                observe_mtu(&write_payload, req.mtu);
                async move {
                    let event = GattEvent::Write {
                        uuid,
                        value,
                        offset: req.offset as usize,
                        ack_required: !matches!(req.op_type, WriteOp::Command),
                    };
                    events.request(event).await.map(|_| ()).map_err(req_error)
                }
                .boxed()
            })),
            ..Default::default()
        }),
        notify: Some(CharacteristicNotify {
            notify: true,
            method: CharacteristicNotifyMethod::Fun(Box::new(move |notifier| {
                let events = notify_events.clone();
                let max_payload_size = notify_payload.load(Ordering::Relaxed);
                tokio::spawn(forward_notifications(uuid, events, notifier, max_payload_size));
                async {}.boxed()
            })),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn observe_mtu(payload_size: &AtomicUsize, mtu: u16) {
    let current = payload_size.load(Ordering::Relaxed);
    payload_size.store(payload_size_for_mtu(mtu, current), Ordering::Relaxed);
}

/// Subscribe, pump the notify channel into BlueZ, then unsubscribe
async fn forward_notifications(
    uuid: Uuid,
    events: EventSender,
    mut notifier: CharacteristicNotifier,
    max_payload_size: usize,
) {
    let (channel, mut rx) = NotifyChannel::new();
    let subscribe = GattEvent::Subscribe {
        uuid,
        max_payload_size,
        channel,
    };
    if let Err(e) = events.request(subscribe).await {
        warn!("Subscribe on {} failed: {}", uuid, e);
        return;
    }

    loop {
        let frame = tokio::select! {
            frame = rx.recv() => frame,
            _ = notifier.stopped() => None,
        };
        let Some(frame) = frame else { break };
        if let Err(e) = notifier.notify(frame).await {
            warn!("Notification on {} failed: {}", uuid, e);
            break;
        }
    }

    match events.request(GattEvent::Unsubscribe { uuid }).await {
        Ok(_) => debug!("Notify session on {} ended", uuid),
        // Already dropped by a disconnect or shutdown
        Err(BleError::Gatt(GattError::NotSubscribed { .. })) | Err(BleError::PumpClosed) => {}
        Err(e) => warn!("Unsubscribe on {} failed: {}", uuid, e),
    }
}

fn req_error(err: BleError) -> ReqError {
    match err {
        BleError::Gatt(GattError::OffsetOutOfRange { .. }) => ReqError::InvalidOffset,
        BleError::Gatt(GattError::PayloadTooLarge { .. }) => ReqError::InvalidValueLength,
        _ => ReqError::Failed,
    }
}
