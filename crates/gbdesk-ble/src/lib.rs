//! BlueZ GATT peripheral transport for the Gadgetbridge desktop bridge
//!
//! The phone acts as BLE central; the desktop exposes the bridge service as a
//! peripheral. This crate connects `gbdesk-core`'s transport-independent
//! [`PeripheralService`](gbdesk_core::PeripheralService) to BlueZ.
//!
//! ## Architecture
//!
//! - [`config`] - Peripheral configuration
//! - [`error`] - Error types specific to the BLE transport
//! - [`protocol`] - BLE constants and MTU arithmetic
//! - [`peripheral`] - Event pump serializing transport callbacks into the service
//! - [`advertising`] - Platform advertisers and the advertising manager
//! - `gatt_server` - BlueZ GATT application (Linux, `bluez` feature)
//! - [`bridge`] - Lifecycle of the whole peripheral
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use gbdesk_ble::{BleBridge, BleConfig};
//! use gbdesk_core::{GattConfig, LogNotifier, MemoryMessageStore, PeripheralService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gatt = GattConfig::default();
//! let service = PeripheralService::bridge(
//!     &gatt,
//!     Arc::new(MemoryMessageStore::new()),
//!     Arc::new(LogNotifier),
//! )?;
//!
//! let bridge = BleBridge::new(BleConfig::new().with_local_name("MyDesktop"), gatt);
//! bridge.run(service, async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Support
//!
//! - **Linux** with the `bluez` feature: GATT application and advertising via `bluer`
//! - **Everything else**: the event pump and advertising manager are available,
//!   but [`BleBridge::run`] reports [`BleError::Unsupported`]

pub mod advertising;
pub mod bridge;
pub mod config;
pub mod error;
#[cfg(all(target_os = "linux", feature = "bluez"))]
pub mod gatt_server;
pub mod peripheral;
pub mod protocol;

// Public API exports
pub use advertising::{AdvertisingManager, BleAdvertiser, PlatformAdvertiser};
pub use bridge::BleBridge;
pub use config::BleConfig;
pub use error::{BleError, Result};
pub use peripheral::{EventPump, EventSender, PeripheralEvent};
pub use protocol::{payload_size_for_mtu, ATT_HEADER_SIZE};
