//! Desktop notifier seam
//!
//! Showing a toast is an external concern. The core only needs something that
//! accepts a [`NotificationRecord`]; the CLI supplies an OS-backed implementation.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use crate::errors::Result;
use crate::protocol::NotificationRecord;

/// Displays notifications on the desktop
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, record: &NotificationRecord) -> Result<()>;
}

/// Notifier that only writes to the log
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, record: &NotificationRecord) -> Result<()> {
        info!("Notification: {} - {}", record.title, record.message);
        Ok(())
    }
}

/// Notifier that keeps every record, for tests and headless runs
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    records: Arc<Mutex<Vec<NotificationRecord>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records received so far
    pub async fn records(&self) -> Vec<NotificationRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, record: &NotificationRecord) -> Result<()> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}
