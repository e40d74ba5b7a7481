//! GATT service configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::sync_cursor::DEFAULT_CURSOR_WINDOW;
use crate::protocol::{
    BRIDGE_SERVICE_UUID, DEFAULT_MAX_PAYLOAD_SIZE, MESSAGE_SYNC_CAPACITY,
    MESSAGE_SYNC_CHARACTERISTIC_UUID, NOTIFICATION_CAPACITY, NOTIFICATION_CHARACTERISTIC_UUID,
};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Identifiers and limits of the bridge service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GattConfig {
    /// Primary service UUID
    pub service_uuid: Uuid,
    /// Message-sync characteristic UUID
    pub message_sync_uuid: Uuid,
    /// Notification-intake characteristic UUID
    pub notification_uuid: Uuid,
    /// Declared value capacity of the message-sync characteristic
    pub message_sync_capacity: usize,
    /// Declared value capacity of the notification-intake characteristic
    pub notification_capacity: usize,
    /// Notify payload ceiling when the transport reports no MTU
    pub default_max_payload_size: usize,
    /// Recent ids captured in each sync cursor
    pub cursor_window: usize,
    /// Echo accepted notification writes back to the subscriber
    pub echo_notifications: bool,
    /// Title used for connect/disconnect toasts
    pub connection_title: String,
    /// Icon attached to every toast
    pub notification_icon: Option<PathBuf>,
}

impl Default for GattConfig {
    fn default() -> Self {
        Self {
            service_uuid: BRIDGE_SERVICE_UUID,
            message_sync_uuid: MESSAGE_SYNC_CHARACTERISTIC_UUID,
            notification_uuid: NOTIFICATION_CHARACTERISTIC_UUID,
            message_sync_capacity: MESSAGE_SYNC_CAPACITY,
            notification_capacity: NOTIFICATION_CAPACITY,
            default_max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            cursor_window: DEFAULT_CURSOR_WINDOW,
            echo_notifications: true,
            connection_title: "GadgetBridge".to_string(),
            notification_icon: None,
        }
    }
}

impl GattConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the service and characteristic UUIDs
    pub fn with_uuids(mut self, service: Uuid, message_sync: Uuid, notification: Uuid) -> Self {
        self.service_uuid = service;
        self.message_sync_uuid = message_sync;
        self.notification_uuid = notification;
        self
    }

    /// Set the fallback notify payload ceiling
    pub fn with_default_max_payload_size(mut self, size: usize) -> Self {
        self.default_max_payload_size = size;
        self
    }

    /// Set the cursor id window
    pub fn with_cursor_window(mut self, window: usize) -> Self {
        self.cursor_window = window;
        self
    }

    /// Enable or disable echoing notification writes
    pub fn with_echo_notifications(mut self, enabled: bool) -> Self {
        self.echo_notifications = enabled;
        self
    }

    /// Set the toast icon
    pub fn with_notification_icon(mut self, icon: Option<PathBuf>) -> Self {
        self.notification_icon = icon;
        self
    }
}
