//! GATT peripheral model
//!
//! Transport-independent characteristic lifecycle, the roles that interpret
//! characteristic events, and the service that routes events between them.

pub mod characteristic;
pub mod roles;
pub mod service;

pub use characteristic::{
    Capabilities, CharacteristicStateMachine, NotifyChannel, NotifyHandle, SubscriptionState,
};
pub use roles::{CharacteristicRole, MessageSync, NotificationIntake, RoleContext};
pub use service::{Characteristic, GattEvent, GattResponse, PeripheralService};
