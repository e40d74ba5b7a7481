//! High-level advertising manager

use tracing::info;
use uuid::Uuid;

use crate::config::BleConfig;
use crate::error::Result;

use super::{BleAdvertiser, PlatformAdvertiser};

// ----------------------------------------------------------------------------
// Advertising Manager
// ----------------------------------------------------------------------------

/// Tracks what is being advertised on top of a platform advertiser
pub struct AdvertisingManager {
    advertiser: PlatformAdvertiser,
    current_service: Option<Uuid>,
}

impl AdvertisingManager {
    pub fn new(advertiser: PlatformAdvertiser) -> Self {
        Self {
            advertiser,
            current_service: None,
        }
    }

    /// Start advertising `service_uuid`
    pub async fn start(&mut self, service_uuid: Uuid, config: &BleConfig) -> Result<()> {
        self.advertiser
            .start_advertising(service_uuid, config)
            .await?;
        self.current_service = Some(service_uuid);
        info!("Advertising service {} as '{}'", service_uuid, config.local_name);
        Ok(())
    }

    /// Stop advertising
    pub async fn stop(&mut self) -> Result<()> {
        if self.current_service.take().is_some() {
            self.advertiser.stop_advertising().await?;
            info!("BLE advertising stopped");
        }
        Ok(())
    }

    /// Check if currently advertising
    pub fn is_advertising(&self) -> bool {
        self.advertiser.is_advertising()
    }

    /// Service passed to the last successful `start`
    pub fn current_service(&self) -> Option<Uuid> {
        self.current_service
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fallback_manager() {
        let mut manager = AdvertisingManager::new(PlatformAdvertiser::fallback());
        let service = Uuid::from_u128(42);

        manager.start(service, &BleConfig::default()).await.unwrap();
        assert_eq!(manager.current_service(), Some(service));
        assert!(!manager.is_advertising());

        manager.stop().await.unwrap();
        assert_eq!(manager.current_service(), None);
    }
}
