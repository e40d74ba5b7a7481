//! Event pump between transport callbacks and the peripheral service
//!
//! BlueZ invokes read, write and notify callbacks from arbitrary tasks. They all
//! funnel into one bounded channel; a single task owns the [`PeripheralService`]
//! and processes one event at a time, answering each caller through a oneshot.

use gbdesk_core::{GattEvent, GattResponse, PeripheralService};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{BleError, Result};

// ----------------------------------------------------------------------------
// Events
// ----------------------------------------------------------------------------

/// Work item for the event pump
#[derive(Debug)]
pub enum PeripheralEvent {
    /// A GATT request, answered on `reply`
    Gatt {
        event: GattEvent,
        reply: oneshot::Sender<gbdesk_core::Result<GattResponse>>,
    },
    /// The central dropped the link
    Disconnected,
    /// Drop live subscriptions and stop the pump
    Shutdown,
}

// ----------------------------------------------------------------------------
// Event Sender
// ----------------------------------------------------------------------------

/// Cloneable handle used by transport callbacks to reach the service
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<PeripheralEvent>,
}

impl EventSender {
    /// Submit `event` and wait for the service's answer
    pub async fn request(&self, event: GattEvent) -> Result<GattResponse> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(PeripheralEvent::Gatt { event, reply })
            .await
            .map_err(|_| BleError::PumpClosed)?;
        let result = response.await.map_err(|_| BleError::PumpClosed)?;
        Ok(result?)
    }

    /// Report that the central disconnected
    pub async fn disconnected(&self) -> Result<()> {
        self.tx
            .send(PeripheralEvent::Disconnected)
            .await
            .map_err(|_| BleError::PumpClosed)
    }

    /// Ask the pump to stop after the events already queued
    pub async fn shutdown(&self) -> Result<()> {
        self.tx
            .send(PeripheralEvent::Shutdown)
            .await
            .map_err(|_| BleError::PumpClosed)
    }
}

// ----------------------------------------------------------------------------
// Event Pump
// ----------------------------------------------------------------------------

/// Single owner of the service; drains events in arrival order
pub struct EventPump {
    service: PeripheralService,
    rx: mpsc::Receiver<PeripheralEvent>,
}

impl EventPump {
    /// Create a pump and the sender feeding it
    pub fn new(service: PeripheralService, queue_size: usize) -> (Self, EventSender) {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        (Self { service, rx }, EventSender { tx })
    }

    /// Spawn the pump on the current runtime
    pub fn spawn(
        service: PeripheralService,
        queue_size: usize,
    ) -> (EventSender, JoinHandle<PeripheralService>) {
        let (pump, sender) = Self::new(service, queue_size);
        (sender, tokio::spawn(pump.run()))
    }

    /// Process events until shutdown or until every sender is gone, then drop
    /// live subscriptions
    pub async fn run(mut self) -> PeripheralService {
        info!("Event pump started for service {}", self.service.uuid());

        while let Some(event) = self.rx.recv().await {
            match event {
                PeripheralEvent::Gatt { event, reply } => {
                    let uuid = event.uuid();
                    let result = self.service.handle(event).await;
                    if let Err(e) = &result {
                        warn!("GATT request on {} rejected: {}", uuid, e);
                    }
                    if reply.send(result).is_err() {
                        debug!("Requester for {} went away before the reply", uuid);
                    }
                }
                PeripheralEvent::Disconnected => {
                    self.service.disconnect_all().await;
                }
                PeripheralEvent::Shutdown => break,
            }
        }

        self.service.disconnect_all().await;
        info!("Event pump stopped");
        self.service
    }
}
