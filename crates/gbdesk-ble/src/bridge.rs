//! Bridge peripheral lifecycle
//!
//! Brings up the BlueZ side of the bridge around a [`PeripheralService`]:
//! event pump, GATT application, advertisement. Runs until `shutdown` resolves
//! and then tears everything down in reverse order.

use std::future::Future;

use gbdesk_core::{GattConfig, PeripheralService};
#[cfg(all(target_os = "linux", feature = "bluez"))]
use tracing::info;

use crate::advertising::{AdvertisingManager, PlatformAdvertiser};
use crate::config::BleConfig;
use crate::error::{BleError, Result};

// ----------------------------------------------------------------------------
// BLE Bridge
// ----------------------------------------------------------------------------

/// BLE peripheral hosting the bridge service
pub struct BleBridge {
    ble: BleConfig,
    gatt: GattConfig,
}

impl BleBridge {
    pub fn new(ble: BleConfig, gatt: GattConfig) -> Self {
        Self { ble, gatt }
    }

    pub fn ble_config(&self) -> &BleConfig {
        &self.ble
    }

    /// Serve `service` until `shutdown` resolves, then return it
    #[cfg(all(target_os = "linux", feature = "bluez"))]
    pub async fn run<F>(&self, service: PeripheralService, shutdown: F) -> Result<PeripheralService>
    where
        F: Future<Output = ()> + Send,
    {
        use crate::gatt_server::{self, BluezSession};
        use crate::peripheral::EventPump;

        let session = BluezSession::open(&self.ble).await?;
        let (events, pump) = EventPump::spawn(service, self.ble.event_queue_size);
        let application = gatt_server::serve(session.adapter(), &self.gatt, events.clone()).await?;

        let mut advertising =
            AdvertisingManager::new(PlatformAdvertiser::bluez(session.adapter().clone()));
        advertising.start(self.gatt.service_uuid, &self.ble).await?;
        info!("Bridge is up, waiting for the phone to connect");

        shutdown.await;

        info!("Shutting down bridge");
        advertising.stop().await?;
        drop(application);
        events.shutdown().await?;
        pump.await.map_err(|e| BleError::PumpFailed(e.to_string()))
    }

    /// Without a peripheral backend there is nothing to serve on
    #[cfg(not(all(target_os = "linux", feature = "bluez")))]
    pub async fn run<F>(&self, service: PeripheralService, shutdown: F) -> Result<PeripheralService>
    where
        F: Future<Output = ()> + Send,
    {
        let _ = (service, shutdown);
        let mut advertising = AdvertisingManager::new(PlatformAdvertiser::fallback());
        advertising.start(self.gatt.service_uuid, &self.ble).await?;
        Err(BleError::Unsupported)
    }
}
