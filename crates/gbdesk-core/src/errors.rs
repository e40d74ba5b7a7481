//! Error types for the desktop bridge core
//!
//! Two families live here: [`StoreError`] for the message store backends and
//! [`GattError`], which covers everything a characteristic, its role or the
//! peripheral service can report. Per-message errors are local; none of them
//! tear down the connection.

use std::path::PathBuf;

use uuid::Uuid;

// ----------------------------------------------------------------------------
// Store Errors
// ----------------------------------------------------------------------------

/// Failures of a message store backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Message store I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Message store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ----------------------------------------------------------------------------
// GATT Errors
// ----------------------------------------------------------------------------

/// Errors raised by characteristics, roles and the peripheral service
#[derive(Debug, thiserror::Error)]
pub enum GattError {
    /// Notification-intake payload could not be decoded or matched no known shape
    #[error("Malformed notification payload: {reason}")]
    MalformedPayload { reason: String },

    /// Message-sync envelope could not be decoded or carried no usable id
    #[error("Malformed message envelope: {reason}")]
    MalformedMessage { reason: String },

    /// A write would grow the characteristic value past its declared capacity
    #[error("Payload too large: {size} bytes (capacity: {capacity})")]
    PayloadTooLarge { size: usize, capacity: usize },

    /// A notify exceeded the payload size negotiated at subscribe time
    #[error("Notify payload exceeds limit: {size} bytes (max: {max_payload_size})")]
    PayloadExceedsLimit { size: usize, max_payload_size: usize },

    #[error("Read or write offset {offset} out of range (value length: {len})")]
    OffsetOutOfRange { offset: usize, len: usize },

    #[error("Characteristic {uuid} has no active subscription")]
    NotSubscribed { uuid: Uuid },

    #[error("Characteristic {uuid} is already subscribed")]
    AlreadySubscribed { uuid: Uuid },

    #[error("Maximum payload size must be greater than zero")]
    InvalidPayloadLimit,

    #[error("Notify channel for characteristic {uuid} is closed")]
    NotifyChannelClosed { uuid: Uuid },

    #[error("Duplicate characteristic UUID: {uuid}")]
    DuplicateCharacteristicUuid { uuid: Uuid },

    #[error("Unknown characteristic: {uuid}")]
    UnknownCharacteristic { uuid: Uuid },

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Desktop notifier failed: {reason}")]
    Notifier { reason: String },
}

impl GattError {
    /// Create a malformed-payload error
    pub fn malformed_payload(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }

    /// Create a malformed-message error
    pub fn malformed_message(reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
        }
    }

    /// Whether this error concerns a single inbound message only.
    ///
    /// Such errors are logged and acknowledged at the transport level; they never
    /// fail the write request or the connection.
    pub fn is_per_message(&self) -> bool {
        matches!(
            self,
            Self::MalformedPayload { .. } | Self::MalformedMessage { .. }
        )
    }
}

/// Result type for core operations
pub type Result<T> = core::result::Result<T, GattError>;
