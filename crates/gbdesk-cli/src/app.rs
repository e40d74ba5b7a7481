//! Desktop bridge application
//!
//! Wires configuration into the store, the notifier, the GATT service and the
//! BLE peripheral.

use std::sync::Arc;

use gbdesk_ble::BleBridge;
use gbdesk_core::{
    FileMessageStore, MemoryMessageStore, MessageStore, PeripheralService, StoredMessage,
};
use serde_json::json;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::Result;
use crate::notifier::build_notifier;

/// The desktop side of the bridge
pub struct BridgeApp {
    config: AppConfig,
}

impl BridgeApp {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Open the configured message store
    pub async fn open_store(&self) -> Result<Arc<dyn MessageStore>> {
        if self.config.store.in_memory {
            info!("Keeping messages in memory only");
            return Ok(Arc::new(MemoryMessageStore::new()));
        }
        let path = self.config.message_log_path()?;
        Ok(Arc::new(FileMessageStore::open(path).await?))
    }

    /// Build the GATT service around `store`
    pub fn build_service(&self, store: Arc<dyn MessageStore>) -> Result<PeripheralService> {
        let notifier = build_notifier(&self.config.notifier);
        Ok(PeripheralService::bridge(
            &self.config.effective_gatt(),
            store,
            notifier,
        )?)
    }

    /// Run the bridge until Ctrl-C
    pub async fn serve(&self) -> Result<()> {
        let store = self.open_store().await?;
        let service = self.build_service(Arc::clone(&store))?;
        let bridge = BleBridge::new(self.config.ble.clone(), self.config.effective_gatt());

        bridge.run(service, shutdown_signal()).await?;

        info!(
            "Bridge stopped with {} stored message(s)",
            store.message_count().await?
        );
        Ok(())
    }

    /// Most recent stored messages, newest first
    pub async fn recent_messages(&self, limit: usize) -> Result<Vec<StoredMessage>> {
        if self.config.store.in_memory {
            warn!("In-memory store selected; there are no persisted messages");
            return Ok(Vec::new());
        }
        let path = self.config.message_log_path()?;
        if !tokio::fs::try_exists(&path).await? {
            info!("No message log at {}", path.display());
            return Ok(Vec::new());
        }
        let store = FileMessageStore::open(path).await?;
        Ok(store.most_recent(limit).await?)
    }
}

/// One output line for a stored message
pub fn render_message(message: &StoredMessage) -> Result<String> {
    Ok(serde_json::to_string(&json!({
        "id": message.id,
        "received_at": message.received_at,
        "payload": message.payload,
    }))?)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gbdesk_core::MessageId;

    use crate::config::NotifierBackend;

    fn config_in(dir: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.store.data_dir = Some(dir.to_path_buf());
        config.notifier.backend = NotifierBackend::Log;
        config
    }

    #[tokio::test]
    async fn test_recent_messages_from_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let app = BridgeApp::new(config_in(dir.path()));

        {
            let store = app.open_store().await.unwrap();
            for id in ["a", "b", "c"] {
                store
                    .insert_if_absent(MessageId::new(id).unwrap(), json!({ "snippet": id }))
                    .await
                    .unwrap();
            }
        }

        let recent = app.recent_messages(2).await.unwrap();
        let ids: Vec<_> = recent.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);

        let line = render_message(&recent[0]).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["id"], "c");
        assert_eq!(parsed["payload"]["snippet"], "c");
    }

    #[tokio::test]
    async fn test_build_service_uses_configured_uuids() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.store.in_memory = true;
        let app = BridgeApp::new(config);

        let store = app.open_store().await.unwrap();
        let service = app.build_service(store).unwrap();
        assert_eq!(service.uuid(), app.config().gatt.service_uuid);
        assert!(service
            .characteristic(app.config().gatt.message_sync_uuid)
            .is_some());
        assert!(!dir.path().join("messages.jsonl").exists());
    }

    #[tokio::test]
    async fn test_recent_messages_without_log_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("never-served");
        let app = BridgeApp::new(config_in(&data_dir));

        assert!(app.recent_messages(10).await.unwrap().is_empty());
        assert!(!data_dir.exists());
    }
}
