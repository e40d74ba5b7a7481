//! BLE peripheral configuration

use serde::{Deserialize, Serialize};

use crate::protocol::DEFAULT_LOCAL_NAME;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the BLE peripheral
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// Name the desktop advertises under
    pub local_name: String,
    /// BlueZ adapter to use (`hci0`, ...); the default adapter when unset
    pub adapter_name: Option<String>,
    /// Whether the advertisement is discoverable
    pub discoverable: bool,
    /// Capacity of the event queue between BlueZ callbacks and the service
    pub event_queue_size: usize,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            local_name: DEFAULT_LOCAL_NAME.to_string(),
            adapter_name: None,
            discoverable: true,
            event_queue_size: 64,
        }
    }
}

impl BleConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the advertised local name
    pub fn with_local_name(mut self, name: impl Into<String>) -> Self {
        self.local_name = name.into();
        self
    }

    /// Pin a specific adapter
    pub fn with_adapter_name(mut self, adapter: Option<String>) -> Self {
        self.adapter_name = adapter;
        self
    }

    /// Enable or disable discoverable advertising
    pub fn with_discoverable(mut self, enabled: bool) -> Self {
        self.discoverable = enabled;
        self
    }

    /// Set the event queue capacity
    pub fn with_event_queue_size(mut self, size: usize) -> Self {
        self.event_queue_size = size;
        self
    }
}
