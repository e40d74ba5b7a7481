//! Desktop bridge configuration
//!
//! Configuration is read from an optional TOML file layered over defaults:
//! every section and every field may be omitted. Sections:
//!
//! - `[gatt]` service and characteristic identifiers, capacities, cursor window
//! - `[ble]` advertised name and adapter
//! - `[store]` where messages are persisted
//! - `[notifier]` how toasts are shown

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use gbdesk_ble::BleConfig;
use gbdesk_core::GattConfig;
use serde::{Deserialize, Serialize};

use crate::error::{CliError, Result};

/// File name of the message log inside the data directory
pub const MESSAGE_LOG_FILE: &str = "messages.jsonl";

/// How long a notification tool may run before the toast is only logged
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 5_000;

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the desktop bridge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gatt: GattConfig,
    pub ble: BleConfig,
    pub store: StoreConfig,
    pub notifier: NotifierConfig,
}

/// Message store location
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the message log; the platform data directory when unset
    pub data_dir: Option<PathBuf>,
    /// Keep messages in memory only
    pub in_memory: bool,
}

/// Desktop notification backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierBackend {
    /// `notify-send` on Linux, `osascript` on macOS
    Command,
    /// Log only
    Log,
}

/// How toasts are shown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub backend: NotifierBackend,
    /// Application name reported to the notification daemon
    pub app_name: String,
    /// Icon attached to every toast
    pub icon: Option<PathBuf>,
    /// Milliseconds before a hung notification tool is abandoned
    pub command_timeout_ms: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            backend: NotifierBackend::Command,
            app_name: "Gadgetbridge Desktop".to_string(),
            icon: None,
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
        }
    }
}

// ----------------------------------------------------------------------------
// Loading and Saving
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration from a TOML file, filling gaps with defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CliError::Config(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path.as_ref(), self.to_toml()?)?;
        Ok(())
    }

    /// Render as pretty TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        let gatt = &self.gatt;
        let uuids: HashSet<_> = [
            gatt.service_uuid,
            gatt.message_sync_uuid,
            gatt.notification_uuid,
        ]
        .into_iter()
        .collect();
        if uuids.len() != 3 {
            return Err(CliError::Config(
                "Service and characteristic UUIDs must be distinct".to_string(),
            ));
        }

        if gatt.message_sync_capacity == 0 || gatt.notification_capacity == 0 {
            return Err(CliError::Config(
                "Characteristic capacities must be greater than 0".to_string(),
            ));
        }

        if gatt.default_max_payload_size == 0 {
            return Err(CliError::Config(
                "Default notify payload size must be greater than 0".to_string(),
            ));
        }

        if self.notifier.command_timeout_ms == 0 {
            return Err(CliError::Config(
                "Notifier command timeout must be greater than 0".to_string(),
            ));
        }

        if self.ble.local_name.trim().is_empty() {
            return Err(CliError::Config("BLE local name must not be empty".to_string()));
        }

        if self.ble.event_queue_size == 0 {
            return Err(CliError::Config(
                "BLE event queue size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// GATT settings with the notifier icon applied
    pub fn effective_gatt(&self) -> GattConfig {
        let mut gatt = self.gatt.clone();
        if self.notifier.icon.is_some() {
            gatt.notification_icon = self.notifier.icon.clone();
        }
        gatt
    }

    /// Location of the message log
    pub fn message_log_path(&self) -> Result<PathBuf> {
        let data_dir = match &self.store.data_dir {
            Some(dir) => dir.clone(),
            None => default_data_dir()?,
        };
        Ok(data_dir.join(MESSAGE_LOG_FILE))
    }
}

/// Platform data directory for the bridge (`~/.local/share/gbdesk` on Linux)
pub fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join("gbdesk"))
        .ok_or_else(|| CliError::Config("No data directory available on this platform".to_string()))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use gbdesk_core::protocol::{BRIDGE_SERVICE_UUID, MESSAGE_SYNC_CHARACTERISTIC_UUID};

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ble.local_name, "GadgetBridgeDesktop");
        assert_eq!(config.notifier.backend, NotifierBackend::Command);
    }

    #[test]
    fn test_partial_file_layers_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gbdesk.toml");
        std::fs::write(
            &path,
            r#"
[ble]
local_name = "Workstation"

[gatt]
cursor_window = 4

[notifier]
backend = "log"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(config.ble.local_name, "Workstation");
        assert_eq!(config.gatt.cursor_window, 4);
        assert_eq!(config.gatt.service_uuid, BRIDGE_SERVICE_UUID);
        assert_eq!(config.notifier.backend, NotifierBackend::Log);
        assert!(!config.store.in_memory);
        assert_eq!(config.notifier.command_timeout_ms, DEFAULT_COMMAND_TIMEOUT_MS);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("gbdesk.toml");

        let mut config = AppConfig::default();
        config.store.data_dir = Some(dir.path().join("data"));
        config.notifier.icon = Some(PathBuf::from("/usr/share/icons/phone.png"));
        config.save_to_file(&path).unwrap();

        assert_eq!(AppConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.gatt.notification_uuid = MESSAGE_SYNC_CHARACTERISTIC_UUID;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.gatt.default_max_payload_size = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.ble.local_name = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.notifier.command_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[gatt\ncursor_window = ").unwrap();

        assert!(matches!(
            AppConfig::load_from_file(&path),
            Err(CliError::TomlParsing(_))
        ));
    }

    #[test]
    fn test_paths_and_icon() {
        let mut config = AppConfig::default();
        config.store.data_dir = Some(PathBuf::from("/var/lib/gbdesk"));
        config.notifier.icon = Some(PathBuf::from("icon.png"));

        assert_eq!(
            config.message_log_path().unwrap(),
            PathBuf::from("/var/lib/gbdesk/messages.jsonl")
        );
        assert_eq!(
            config.effective_gatt().notification_icon,
            Some(PathBuf::from("icon.png"))
        );
    }
}
