//! Characteristic state machine
//!
//! A characteristic is either `Unsubscribed` or `Subscribed`; the notify channel
//! only exists inside the `Subscribed` arm, so there is no callback to invoke
//! once the central goes away. Every subscription gets a fresh generation and
//! [`NotifyHandle`]s are pinned to the generation they were created for.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::{GattError, Result};

// ----------------------------------------------------------------------------
// Capabilities
// ----------------------------------------------------------------------------

/// Operations a characteristic advertises
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub read: bool,
    pub write: bool,
    pub notify: bool,
}

impl Capabilities {
    /// Read, write and notify
    pub const ALL: Self = Self {
        read: true,
        write: true,
        notify: true,
    };
}

// ----------------------------------------------------------------------------
// Notify Channel
// ----------------------------------------------------------------------------

/// Write-capable handle to the transport's notification path
///
/// The transport keeps the receiving end and forwards each value to the
/// central. Sending never blocks.
#[derive(Clone)]
pub struct NotifyChannel {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl NotifyChannel {
    /// Create a channel and the receiver the transport drains
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn from_sender(tx: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self { tx }
    }

    fn send(&self, value: Vec<u8>) -> bool {
        self.tx.send(value).is_ok()
    }
}

impl fmt::Debug for NotifyChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifyChannel")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Subscription State
// ----------------------------------------------------------------------------

/// Per-characteristic subscription state
#[derive(Debug)]
pub enum SubscriptionState {
    Unsubscribed,
    Subscribed {
        generation: u64,
        max_payload_size: usize,
        channel: NotifyChannel,
    },
}

#[derive(Debug)]
struct Subscription {
    state: SubscriptionState,
    next_generation: u64,
}

impl Subscription {
    /// Send `value` if subscribed (and, when given, only for that generation)
    fn emit(&self, uuid: Uuid, generation: Option<u64>, value: Vec<u8>) -> Result<()> {
        match &self.state {
            SubscriptionState::Subscribed {
                generation: current,
                max_payload_size,
                channel,
            } if generation.map_or(true, |g| g == *current) => {
                if value.len() > *max_payload_size {
                    return Err(GattError::PayloadExceedsLimit {
                        size: value.len(),
                        max_payload_size: *max_payload_size,
                    });
                }
                let size = value.len();
                if !channel.send(value) {
                    return Err(GattError::NotifyChannelClosed { uuid });
                }
                debug!("Notified {} bytes on {}", size, uuid);
                Ok(())
            }
            _ => Err(GattError::NotSubscribed { uuid }),
        }
    }
}

// ----------------------------------------------------------------------------
// Notify Handle
// ----------------------------------------------------------------------------

/// Notify capability scoped to one subscription
///
/// Handed to in-flight work (such as a backlog push). Every call re-checks the
/// live state, so nothing is delivered once the subscription it belongs to ends,
/// even if the central has since subscribed again.
#[derive(Debug, Clone)]
pub struct NotifyHandle {
    uuid: Uuid,
    generation: u64,
    subscription: Arc<Mutex<Subscription>>,
}

impl NotifyHandle {
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Notify the central; fails once this subscription has ended
    pub async fn notify(&self, value: Vec<u8>) -> Result<()> {
        self.subscription
            .lock()
            .await
            .emit(self.uuid, Some(self.generation), value)
    }

    /// Payload ceiling negotiated for this subscription
    pub async fn max_payload_size(&self) -> Result<usize> {
        match &self.subscription.lock().await.state {
            SubscriptionState::Subscribed {
                generation,
                max_payload_size,
                ..
            } if *generation == self.generation => Ok(*max_payload_size),
            _ => Err(GattError::NotSubscribed { uuid: self.uuid }),
        }
    }

    /// Whether the subscription this handle belongs to is still live
    pub async fn is_active(&self) -> bool {
        self.max_payload_size().await.is_ok()
    }
}

// ----------------------------------------------------------------------------
// State Machine
// ----------------------------------------------------------------------------

/// Subscribe/unsubscribe/read/write lifecycle of one characteristic
#[derive(Debug)]
pub struct CharacteristicStateMachine {
    uuid: Uuid,
    capabilities: Capabilities,
    capacity: usize,
    value: Vec<u8>,
    subscription: Arc<Mutex<Subscription>>,
}

impl CharacteristicStateMachine {
    /// Create an unsubscribed characteristic with an empty value
    pub fn new(uuid: Uuid, capacity: usize) -> Self {
        Self {
            uuid,
            capabilities: Capabilities::ALL,
            capacity,
            value: Vec::new(),
            subscription: Arc::new(Mutex::new(Subscription {
                state: SubscriptionState::Unsubscribed,
                next_generation: 0,
            })),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Declared maximum value size
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current value buffer
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub async fn is_subscribed(&self) -> bool {
        matches!(
            self.subscription.lock().await.state,
            SubscriptionState::Subscribed { .. }
        )
    }

    /// Enter `Subscribed`; only valid from `Unsubscribed`
    pub async fn subscribe(
        &self,
        max_payload_size: usize,
        channel: NotifyChannel,
    ) -> Result<NotifyHandle> {
        if max_payload_size == 0 {
            return Err(GattError::InvalidPayloadLimit);
        }

        let mut subscription = self.subscription.lock().await;
        if matches!(subscription.state, SubscriptionState::Subscribed { .. }) {
            return Err(GattError::AlreadySubscribed { uuid: self.uuid });
        }

        let generation = subscription.next_generation;
        subscription.next_generation += 1;
        subscription.state = SubscriptionState::Subscribed {
            generation,
            max_payload_size,
            channel,
        };
        info!(
            "Characteristic {} subscribed (max payload {} bytes)",
            self.uuid, max_payload_size
        );

        Ok(NotifyHandle {
            uuid: self.uuid,
            generation,
            subscription: Arc::clone(&self.subscription),
        })
    }

    /// Enter `Unsubscribed`, dropping the notify channel; only valid from `Subscribed`
    pub async fn unsubscribe(&self) -> Result<()> {
        let mut subscription = self.subscription.lock().await;
        match std::mem::replace(&mut subscription.state, SubscriptionState::Unsubscribed) {
            SubscriptionState::Subscribed { .. } => {
                info!("Characteristic {} unsubscribed", self.uuid);
                Ok(())
            }
            SubscriptionState::Unsubscribed => Err(GattError::NotSubscribed { uuid: self.uuid }),
        }
    }

    /// Handle for the live subscription
    pub async fn notify_handle(&self) -> Option<NotifyHandle> {
        match &self.subscription.lock().await.state {
            SubscriptionState::Subscribed { generation, .. } => Some(NotifyHandle {
                uuid: self.uuid,
                generation: *generation,
                subscription: Arc::clone(&self.subscription),
            }),
            SubscriptionState::Unsubscribed => None,
        }
    }

    /// Value from `offset` on; `offset == len` yields an empty slice
    pub fn read(&self, offset: usize) -> Result<&[u8]> {
        self.value
            .get(offset..)
            .ok_or(GattError::OffsetOutOfRange {
                offset,
                len: self.value.len(),
            })
    }

    /// Replace the value (offset 0) or splice a long-write fragment at `offset`.
    ///
    /// Fails without touching the value when the result would exceed capacity.
    pub fn write(&mut self, bytes: &[u8], offset: usize, ack_required: bool) -> Result<()> {
        if offset > self.value.len() {
            return Err(GattError::OffsetOutOfRange {
                offset,
                len: self.value.len(),
            });
        }

        let size = offset + bytes.len();
        if size > self.capacity {
            return Err(GattError::PayloadTooLarge {
                size,
                capacity: self.capacity,
            });
        }

        self.value.truncate(offset);
        self.value.extend_from_slice(bytes);
        debug!(
            "Characteristic {} written: {} bytes at offset {} (ack: {})",
            self.uuid,
            bytes.len(),
            offset,
            ack_required
        );
        Ok(())
    }

    /// Notify through the live subscription. Never chunks.
    pub async fn notify(&self, value: Vec<u8>) -> Result<()> {
        self.subscription.lock().await.emit(self.uuid, None, value)
    }
}
