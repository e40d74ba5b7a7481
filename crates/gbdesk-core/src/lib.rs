//! Gadgetbridge Desktop Bridge Core
//!
//! Transport-independent pieces of the desktop side of the bridge: the GATT
//! characteristic state machine, notification payload normalization, the
//! idempotent message store and the backlog sync cursor protocol. The BlueZ
//! binding lives in `gbdesk-ble`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod errors;
pub mod gatt;
pub mod notifier;
pub mod protocol;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::GattConfig;
pub use errors::{GattError, Result, StoreError};
pub use gatt::{
    CharacteristicStateMachine, GattEvent, GattResponse, NotifyChannel, NotifyHandle,
    PeripheralService,
};
pub use notifier::{LogNotifier, Notifier, RecordingNotifier};
pub use protocol::{
    normalize, FileMessageStore, InsertOutcome, MemoryMessageStore, MessageId, MessageStore,
    NotificationRecord, StoredMessage, SyncCursor, SyncCursorProtocol,
};
