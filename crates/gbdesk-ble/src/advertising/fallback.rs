//! Fallback advertising for builds without a peripheral backend

use tracing::warn;
use uuid::Uuid;

use crate::config::BleConfig;
use crate::error::Result;

use super::BleAdvertiser;

// ----------------------------------------------------------------------------
// Fallback Implementation
// ----------------------------------------------------------------------------

/// Advertiser that never advertises
pub struct FallbackAdvertiser;

impl FallbackAdvertiser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FallbackAdvertiser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl BleAdvertiser for FallbackAdvertiser {
    async fn start_advertising(&mut self, service_uuid: Uuid, config: &BleConfig) -> Result<()> {
        warn!(
            "BLE advertising not supported in this build. '{}' (service {}) will not be discoverable. \
            Build with the `bluez` feature on Linux for peripheral support.",
            config.local_name, service_uuid
        );
        Ok(())
    }

    async fn stop_advertising(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_advertising(&self) -> bool {
        false
    }
}
