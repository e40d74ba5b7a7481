//! Characteristic roles
//!
//! The state machine is the same for every characteristic; what a write or a
//! subscribe *means* depends on the role attached to it.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::Result;
use crate::gatt::characteristic::NotifyHandle;
use crate::notifier::Notifier;
use crate::protocol::message_store::MessageStore;
use crate::protocol::notification::{normalize, NotificationRecord};
use crate::protocol::sync_cursor::{SyncCursorProtocol, SyncWrite};

// ----------------------------------------------------------------------------
// Role Trait
// ----------------------------------------------------------------------------

/// Per-event context handed to a role
#[derive(Debug, Clone)]
pub struct RoleContext {
    /// Characteristic the event addressed
    pub uuid: Uuid,
    /// Notify handle when the characteristic is subscribed
    pub handle: Option<NotifyHandle>,
}

/// Behaviour attached to a characteristic
#[async_trait]
pub trait CharacteristicRole: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// A read was served from `value`
    async fn on_read(&self, ctx: &RoleContext, offset: usize, value: &[u8]) {
        debug!(
            "{} read at offset {}: {} bytes from {}",
            self.name(),
            offset,
            value.len(),
            ctx.uuid
        );
    }

    /// The characteristic value changed to `value`
    async fn on_write(&self, ctx: &RoleContext, value: &[u8]) -> Result<()>;

    /// A central subscribed; `handle` is scoped to that subscription
    async fn on_subscribe(&self, handle: &NotifyHandle) -> Result<()>;

    /// The central unsubscribed
    async fn on_unsubscribe(&self, ctx: &RoleContext) -> Result<()>;
}

// ----------------------------------------------------------------------------
// Notification Intake
// ----------------------------------------------------------------------------

/// Turns phone notification and call payloads into desktop toasts
pub struct NotificationIntake {
    notifier: Arc<dyn Notifier>,
    protocol: SyncCursorProtocol,
    icon: Option<PathBuf>,
    connection_title: String,
    echo_writes: bool,
}

impl NotificationIntake {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            protocol: SyncCursorProtocol::default(),
            icon: None,
            connection_title: "GadgetBridge".to_string(),
            echo_writes: false,
        }
    }

    pub fn with_icon(mut self, icon: Option<PathBuf>) -> Self {
        self.icon = icon;
        self
    }

    pub fn with_connection_title(mut self, title: impl Into<String>) -> Self {
        self.connection_title = title.into();
        self
    }

    pub fn with_echo_writes(mut self, enabled: bool) -> Self {
        self.echo_writes = enabled;
        self
    }

    async fn toast(&self, record: NotificationRecord) -> Result<()> {
        self.notifier
            .notify(&record.with_icon(self.icon.clone()))
            .await
    }
}

#[async_trait]
impl CharacteristicRole for NotificationIntake {
    fn name(&self) -> &'static str {
        "notification"
    }

    async fn on_write(&self, ctx: &RoleContext, value: &[u8]) -> Result<()> {
        debug!("Notification write: {}", String::from_utf8_lossy(value));
        let record = normalize(value)?;
        info!("Showing notification, title: {}", record.title);
        self.toast(record).await?;

        if self.echo_writes {
            if let Some(handle) = &ctx.handle {
                self.protocol.push(value, handle).await?;
            }
        }
        Ok(())
    }

    async fn on_subscribe(&self, _handle: &NotifyHandle) -> Result<()> {
        self.toast(NotificationRecord::new(
            self.connection_title.as_str(),
            "GadgetBridge Connected",
        ))
        .await
    }

    async fn on_unsubscribe(&self, _ctx: &RoleContext) -> Result<()> {
        self.toast(NotificationRecord::new(
            self.connection_title.as_str(),
            "GadgetBridge Disconnected",
        ))
        .await
    }
}

// ----------------------------------------------------------------------------
// Message Sync
// ----------------------------------------------------------------------------

/// Ingests message envelopes and announces the backlog cursor
pub struct MessageSync {
    store: Arc<dyn MessageStore>,
    protocol: SyncCursorProtocol,
}

impl MessageSync {
    pub fn new(store: Arc<dyn MessageStore>, protocol: SyncCursorProtocol) -> Self {
        Self { store, protocol }
    }
}

#[async_trait]
impl CharacteristicRole for MessageSync {
    fn name(&self) -> &'static str {
        "message-sync"
    }

    async fn on_write(&self, ctx: &RoleContext, value: &[u8]) -> Result<()> {
        match SyncCursorProtocol::parse_write(value)? {
            SyncWrite::Envelope { id, payload } => {
                self.protocol
                    .store_envelope(self.store.as_ref(), id, payload)
                    .await?;
            }
            SyncWrite::SyncRequest { last_seen } => {
                debug!("Client requested sync (last seen: {:?})", last_seen);
                match &ctx.handle {
                    Some(handle) => {
                        self.protocol.announce(self.store.as_ref(), handle).await?;
                    }
                    None => warn!("Sync request on {} without a subscription", ctx.uuid),
                }
            }
        }
        Ok(())
    }

    async fn on_subscribe(&self, handle: &NotifyHandle) -> Result<()> {
        self.protocol.announce(self.store.as_ref(), handle).await?;
        Ok(())
    }

    async fn on_unsubscribe(&self, ctx: &RoleContext) -> Result<()> {
        debug!("Message sync on {} ended", ctx.uuid);
        Ok(())
    }
}
