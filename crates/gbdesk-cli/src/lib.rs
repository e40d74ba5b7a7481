//! Gadgetbridge desktop bridge CLI library
//!
//! Configuration, desktop notifier and application wiring for the `gbdesk`
//! binary.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod notifier;

pub use app::BridgeApp;
pub use cli::{Cli, Commands};
pub use config::AppConfig;
pub use error::{CliError, Result};
