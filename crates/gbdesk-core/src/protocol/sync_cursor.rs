//! Backlog cursor negotiation for the message-sync characteristic
//!
//! On every subscribe the desktop announces how much it already holds as a
//! compact `{"sync": <count>}` cursor. The phone answers by writing message
//! envelopes (one per write) which are ingested idempotently. Bulk content never
//! travels on the notify path.

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::errors::{GattError, Result, StoreError};
use crate::gatt::NotifyHandle;
use crate::protocol::message_store::{InsertOutcome, MessageId, MessageStore};

/// Default number of recent ids captured in a cursor
pub const DEFAULT_CURSOR_WINDOW: usize = 16;

// ----------------------------------------------------------------------------
// Cursor Types
// ----------------------------------------------------------------------------

/// Backlog state announced to a newly subscribed central
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncCursor {
    /// Number of messages the desktop already holds
    pub requested_count: u64,
    /// Most recent ids, newest first
    pub delivered_ids: Vec<MessageId>,
}

/// A decoded write to the message-sync characteristic
#[derive(Debug, Clone, PartialEq)]
pub enum SyncWrite {
    /// A message envelope to store
    Envelope { id: MessageId, payload: Value },
    /// The client asks for a fresh cursor, optionally echoing the one it saw
    SyncRequest { last_seen: Option<u64> },
}

// ----------------------------------------------------------------------------
// Protocol
// ----------------------------------------------------------------------------

/// Cursor computation, encoding, ingestion and delivery chunking
#[derive(Debug, Clone)]
pub struct SyncCursorProtocol {
    cursor_window: usize,
}

impl Default for SyncCursorProtocol {
    fn default() -> Self {
        Self::new(DEFAULT_CURSOR_WINDOW)
    }
}

impl SyncCursorProtocol {
    pub fn new(cursor_window: usize) -> Self {
        Self { cursor_window }
    }

    /// Read the store's backlog state. Two store operations, never blocks on empty.
    pub async fn compute_cursor(
        &self,
        store: &dyn MessageStore,
    ) -> core::result::Result<SyncCursor, StoreError> {
        let count = store.message_count().await?;
        let recent = store.most_recent(self.cursor_window).await?;
        Ok(SyncCursor {
            requested_count: count as u64,
            delivered_ids: recent.into_iter().map(|m| m.id).collect(),
        })
    }

    /// Encode the cursor for the notify path: `{"sync":<count>}`
    pub fn encode_cursor(cursor: &SyncCursor) -> Vec<u8> {
        json!({ "sync": cursor.requested_count })
            .to_string()
            .into_bytes()
    }

    /// Decode a message-sync write, unwrapping one level of string encoding
    pub fn parse_write(raw: &[u8]) -> Result<SyncWrite> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| GattError::malformed_message(format!("not UTF-8: {}", e)))?;
        let mut value: Value = serde_json::from_str(text)
            .map_err(|e| GattError::malformed_message(format!("not JSON: {}", e)))?;

        // The phone serializes the envelope to a string, then serializes that string
        if let Value::String(inner) = &value {
            value = serde_json::from_str(inner)
                .map_err(|e| GattError::malformed_message(format!("inner envelope: {}", e)))?;
        }

        let object = value
            .as_object()
            .ok_or_else(|| GattError::malformed_message("envelope is not a JSON object"))?;
        let raw_id = object.get("id").cloned();
        let sync = object.get("sync").cloned();

        match (raw_id, sync) {
            (Some(raw_id), _) => {
                let id = MessageId::from_json(&raw_id).ok_or_else(|| {
                    GattError::malformed_message(format!("unusable id: {}", raw_id))
                })?;
                Ok(SyncWrite::Envelope { id, payload: value })
            }
            (None, Some(sync)) => {
                let last_seen = match sync {
                    Value::Number(n) => n.as_u64(),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                };
                Ok(SyncWrite::SyncRequest { last_seen })
            }
            (None, None) => Err(GattError::malformed_message("missing field `id`")),
        }
    }

    /// Parse an envelope and store it if its id is new
    ///
    /// Succeeds whether or not the id was already present; only the returned
    /// outcome (and the log) tells the two apart.
    pub async fn ingest(&self, store: &dyn MessageStore, raw: &[u8]) -> Result<InsertOutcome> {
        match Self::parse_write(raw)? {
            SyncWrite::Envelope { id, payload } => self.store_envelope(store, id, payload).await,
            SyncWrite::SyncRequest { .. } => {
                Err(GattError::malformed_message("missing field `id`"))
            }
        }
    }

    /// Store an already-parsed envelope
    pub async fn store_envelope(
        &self,
        store: &dyn MessageStore,
        id: MessageId,
        payload: Value,
    ) -> Result<InsertOutcome> {
        let outcome = store.insert_if_absent(id.clone(), payload).await?;
        if outcome.inserted {
            info!("Stored message {}", id);
        } else {
            debug!("Duplicate message {} ignored", id);
        }
        Ok(outcome)
    }

    /// Split `bytes` into frames no larger than `max_payload_size`.
    ///
    /// Always yields at least one frame so an empty value is still delivered.
    pub fn plan_delivery(bytes: &[u8], max_payload_size: usize) -> Vec<&[u8]> {
        if bytes.is_empty() {
            return vec![bytes];
        }
        bytes.chunks(max_payload_size.max(1)).collect()
    }

    /// Deliver `bytes` through `handle`, frame by frame.
    ///
    /// Subscription state is re-checked before every frame; the first failure
    /// (typically an unsubscribe that landed mid-push) stops the delivery.
    pub async fn push(&self, bytes: &[u8], handle: &NotifyHandle) -> Result<usize> {
        let max_payload_size = handle.max_payload_size().await?;
        let frames = Self::plan_delivery(bytes, max_payload_size);
        let total = frames.len();
        for frame in frames {
            handle.notify(frame.to_vec()).await?;
        }
        debug!(
            "Pushed {} bytes in {} frame(s) (max payload {})",
            bytes.len(),
            total,
            max_payload_size
        );
        Ok(total)
    }

    /// Compute, encode and push the cursor for a fresh subscription
    pub async fn announce(&self, store: &dyn MessageStore, handle: &NotifyHandle) -> Result<SyncCursor> {
        let cursor = self.compute_cursor(store).await?;
        let encoded = Self::encode_cursor(&cursor);
        self.push(&encoded, handle).await?;
        info!("Announced sync cursor: {} stored messages", cursor.requested_count);
        Ok(cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message_store::MemoryMessageStore;

    #[tokio::test]
    async fn test_empty_store_cursor() {
        let store = MemoryMessageStore::new();
        let protocol = SyncCursorProtocol::default();

        let cursor = protocol.compute_cursor(&store).await.unwrap();
        assert_eq!(cursor, SyncCursor::default());
        assert_eq!(SyncCursorProtocol::encode_cursor(&cursor), br#"{"sync":0}"#.to_vec());
    }

    #[tokio::test]
    async fn test_cursor_counts_and_windows() {
        let store = MemoryMessageStore::new();
        let protocol = SyncCursorProtocol::new(2);
        for n in 0..5 {
            protocol
                .ingest(&store, format!(r#"{{"id":{}}}"#, n).as_bytes())
                .await
                .unwrap();
        }

        let cursor = protocol.compute_cursor(&store).await.unwrap();
        assert_eq!(cursor.requested_count, 5);
        let ids: Vec<_> = cursor.delivered_ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["4", "3"]);
        assert_eq!(SyncCursorProtocol::encode_cursor(&cursor), br#"{"sync":5}"#.to_vec());
    }

    #[tokio::test]
    async fn test_ingest_double_encoded_envelope() {
        let store = MemoryMessageStore::new();
        let protocol = SyncCursorProtocol::default();
        let raw = br#""{\"id\":\"42\",\"snippet\":\"hey\",\"count\":3}""#;

        let first = protocol.ingest(&store, raw).await.unwrap();
        let second = protocol.ingest(&store, raw).await.unwrap();

        assert!(first.inserted);
        assert!(!second.inserted);
        let stored = store.most_recent(1).await.unwrap();
        assert_eq!(stored[0].id.as_str(), "42");
        assert_eq!(stored[0].payload["snippet"], "hey");
    }

    #[tokio::test]
    async fn test_ingest_rejects_malformed() {
        let store = MemoryMessageStore::new();
        let protocol = SyncCursorProtocol::default();

        for raw in [
            &b"garbage"[..],
            &br#"{"snippet":"no id"}"#[..],
            &br#"{"id":""}"#[..],
            &br#"{"id":null}"#[..],
            &br#"["id"]"#[..],
            &br#"{"sync":3}"#[..],
        ] {
            let err = protocol.ingest(&store, raw).await.unwrap_err();
            assert!(matches!(err, GattError::MalformedMessage { .. }), "{:?}", raw);
        }
        assert_eq!(store.message_count().await.unwrap(), 0);
    }

    #[test]
    fn test_parse_sync_request() {
        assert_eq!(
            SyncCursorProtocol::parse_write(br#"{"sync":"608"}"#).unwrap(),
            SyncWrite::SyncRequest {
                last_seen: Some(608)
            }
        );
        assert_eq!(
            SyncCursorProtocol::parse_write(br#"{"sync":null}"#).unwrap(),
            SyncWrite::SyncRequest { last_seen: None }
        );
    }

    #[test]
    fn test_plan_delivery_bounds() {
        let data = vec![7u8; 45];
        let frames = SyncCursorProtocol::plan_delivery(&data, 20);
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.len() <= 20));
        assert_eq!(frames.concat(), data);

        let frames = SyncCursorProtocol::plan_delivery(&[], 20);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_empty());
    }
}
