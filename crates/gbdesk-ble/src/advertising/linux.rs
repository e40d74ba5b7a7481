//! Linux BLE advertising implementation using bluer (BlueZ)

use std::collections::BTreeSet;

use tracing::info;
use uuid::Uuid;

use crate::config::BleConfig;
use crate::error::{BleError, Result};

use super::BleAdvertiser;

// ----------------------------------------------------------------------------
// Linux Implementation
// ----------------------------------------------------------------------------

pub struct LinuxAdvertiser {
    adapter: bluer::Adapter,
    handle: Option<bluer::adv::AdvertisementHandle>,
}

impl LinuxAdvertiser {
    pub fn new(adapter: bluer::Adapter) -> Self {
        Self {
            adapter,
            handle: None,
        }
    }
}

#[async_trait::async_trait]
impl BleAdvertiser for LinuxAdvertiser {
    async fn start_advertising(&mut self, service_uuid: Uuid, config: &BleConfig) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }

        let advertisement = bluer::adv::Advertisement {
            advertisement_type: bluer::adv::Type::Peripheral,
            local_name: Some(config.local_name.clone()),
            service_uuids: BTreeSet::from([service_uuid]),
            discoverable: Some(config.discoverable),
            ..Default::default()
        };

        let handle = self
            .adapter
            .advertise(advertisement)
            .await
            .map_err(|e| BleError::AdvertisingFailed(e.to_string()))?;

        self.handle = Some(handle);
        info!(
            "Started BLE advertising as '{}' on {}",
            config.local_name,
            self.adapter.name()
        );
        Ok(())
    }

    async fn stop_advertising(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            drop(handle); // Dropping the handle unregisters the advertisement
            info!("Stopped BLE advertising");
        }
        Ok(())
    }

    fn is_advertising(&self) -> bool {
        self.handle.is_some()
    }
}
