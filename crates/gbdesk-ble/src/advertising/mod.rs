//! Advertising trait and platform selection

pub mod fallback;
#[cfg(all(target_os = "linux", feature = "bluez"))]
pub mod linux;
pub mod manager;

pub use manager::AdvertisingManager;

use uuid::Uuid;

use crate::config::BleConfig;
use crate::error::Result;

// ----------------------------------------------------------------------------
// Advertising Trait
// ----------------------------------------------------------------------------

/// Makes the bridge service discoverable to the phone
#[async_trait::async_trait]
pub trait BleAdvertiser: Send + Sync {
    /// Start advertising `service_uuid` under the configured local name
    async fn start_advertising(&mut self, service_uuid: Uuid, config: &BleConfig) -> Result<()>;

    /// Stop advertising
    async fn stop_advertising(&mut self) -> Result<()>;

    /// Check if currently advertising
    fn is_advertising(&self) -> bool;
}

// ----------------------------------------------------------------------------
// Platform Advertiser
// ----------------------------------------------------------------------------

/// Platform-specific advertiser enum
pub enum PlatformAdvertiser {
    #[cfg(all(target_os = "linux", feature = "bluez"))]
    Linux(linux::LinuxAdvertiser),
    Fallback(fallback::FallbackAdvertiser),
}

impl PlatformAdvertiser {
    /// Advertiser backed by a BlueZ adapter
    #[cfg(all(target_os = "linux", feature = "bluez"))]
    pub fn bluez(adapter: bluer::Adapter) -> Self {
        Self::Linux(linux::LinuxAdvertiser::new(adapter))
    }

    /// Advertiser that only logs
    pub fn fallback() -> Self {
        Self::Fallback(fallback::FallbackAdvertiser::new())
    }
}

#[async_trait::async_trait]
impl BleAdvertiser for PlatformAdvertiser {
    async fn start_advertising(&mut self, service_uuid: Uuid, config: &BleConfig) -> Result<()> {
        match self {
            #[cfg(all(target_os = "linux", feature = "bluez"))]
            Self::Linux(ref mut advertiser) => {
                advertiser.start_advertising(service_uuid, config).await
            }
            Self::Fallback(ref mut advertiser) => {
                advertiser.start_advertising(service_uuid, config).await
            }
        }
    }

    async fn stop_advertising(&mut self) -> Result<()> {
        match self {
            #[cfg(all(target_os = "linux", feature = "bluez"))]
            Self::Linux(ref mut advertiser) => advertiser.stop_advertising().await,
            Self::Fallback(ref mut advertiser) => advertiser.stop_advertising().await,
        }
    }

    fn is_advertising(&self) -> bool {
        match self {
            #[cfg(all(target_os = "linux", feature = "bluez"))]
            Self::Linux(ref advertiser) => advertiser.is_advertising(),
            Self::Fallback(ref advertiser) => advertiser.is_advertising(),
        }
    }
}
