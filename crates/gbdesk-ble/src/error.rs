//! Error types for the BLE peripheral transport

use gbdesk_core::GattError;
use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors specific to the BLE peripheral transport
#[derive(Error, Debug)]
pub enum BleError {
    #[error("BLE adapter not available: {0}")]
    AdapterNotAvailable(String),

    #[error("Failed to register GATT application: {0}")]
    GattRegistrationFailed(String),

    #[error("Failed to start advertising: {0}")]
    AdvertisingFailed(String),

    #[error("BLE peripheral mode is not supported in this build")]
    Unsupported,

    #[error("Event pump stopped")]
    PumpClosed,

    #[error("Event pump task failed: {0}")]
    PumpFailed(String),

    #[error("GATT error: {0}")]
    Gatt(#[from] GattError),
}

/// Result type for BLE transport operations
pub type Result<T> = core::result::Result<T, BleError>;
