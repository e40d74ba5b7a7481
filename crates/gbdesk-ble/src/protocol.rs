//! BLE protocol constants and utilities for the bridge

pub use gbdesk_core::protocol::{
    BRIDGE_SERVICE_UUID, DEFAULT_LOCAL_NAME, DEFAULT_MAX_PAYLOAD_SIZE,
    MESSAGE_SYNC_CHARACTERISTIC_UUID, NOTIFICATION_CHARACTERISTIC_UUID,
};

/// ATT notification header (opcode plus handle)
pub const ATT_HEADER_SIZE: usize = 3;

/// Notify payload ceiling for a negotiated ATT MTU.
///
/// Falls back to `default` when the MTU is unknown or too small to carry data.
pub fn payload_size_for_mtu(mtu: u16, default: usize) -> usize {
    match (mtu as usize).checked_sub(ATT_HEADER_SIZE) {
        Some(size) if size > 0 => size,
        _ => default,
    }
}
