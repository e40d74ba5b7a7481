//! Wire-level protocol for the desktop bridge
//!
//! - [`notification`] - normalization of notification-intake writes
//! - [`message_store`] - idempotent message storage
//! - [`sync_cursor`] - backlog cursor negotiation and delivery chunking

pub mod message_store;
pub mod notification;
pub mod sync_cursor;

use uuid::Uuid;

// ----------------------------------------------------------------------------
// GATT Service and Characteristic UUIDs
// ----------------------------------------------------------------------------

/// Bridge GATT service UUID expected by the mobile client
pub const BRIDGE_SERVICE_UUID: Uuid = Uuid::from_u128(0x13333333_3333_3333_3333_800000000000);

/// Message-sync characteristic: envelope writes in, cursor notifications out
pub const MESSAGE_SYNC_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x13333333_3333_3333_3333_800000000001);

/// Notification-intake characteristic: notification and call payload writes
pub const NOTIFICATION_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x13333333_3333_3333_3333_800000000002);

// ----------------------------------------------------------------------------
// Protocol Limits
// ----------------------------------------------------------------------------

/// Declared value capacity of the message-sync characteristic
pub const MESSAGE_SYNC_CAPACITY: usize = 2000;

/// Declared value capacity of the notification-intake characteristic (ATT maximum)
pub const NOTIFICATION_CAPACITY: usize = 512;

/// Notify payload size assumed when the transport does not report an MTU (23 - 3)
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 20;

/// Local name advertised to the phone
pub const DEFAULT_LOCAL_NAME: &str = "GadgetBridgeDesktop";

pub use message_store::{
    FileMessageStore, InsertOutcome, MemoryMessageStore, MessageId, MessageStore, StoredMessage,
};
pub use notification::{normalize, NotificationRecord};
pub use sync_cursor::{SyncCursor, SyncCursorProtocol, SyncWrite};
