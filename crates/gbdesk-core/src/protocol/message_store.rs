//! Idempotent message storage
//!
//! Messages are keyed by the client-assigned [`MessageId`]. The only write
//! primitive is [`MessageStore::insert_if_absent`]: the lookup and the write
//! happen under one lock, so two writes carrying the same id can never both
//! insert. A stored record is never overwritten or deleted by this crate.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::errors::StoreError;

// ----------------------------------------------------------------------------
// Message Types
// ----------------------------------------------------------------------------

/// Client-assigned message identifier
///
/// The phone sends ids as JSON strings or integers; both normalize to the same
/// textual form so `12` and `"12"` address one message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Create an id from text; empty or whitespace-only text is not an id
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    /// Extract an id from a JSON value (string or integer)
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Self::new(text.as_str()),
            Value::Number(number) if number.is_i64() || number.is_u64() => {
                Self::new(number.to_string())
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message as retained by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: MessageId,
    /// Opaque envelope as received from the phone
    pub payload: Value,
    /// Milliseconds since the Unix epoch at ingestion
    pub received_at: u64,
    /// Store-assigned insertion order, breaks `received_at` ties
    pub sequence: u64,
}

/// Result of [`MessageStore::insert_if_absent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted: bool,
}

impl InsertOutcome {
    pub const INSERTED: Self = Self { inserted: true };
    pub const DUPLICATE: Self = Self { inserted: false };
}

// ----------------------------------------------------------------------------
// Store Trait
// ----------------------------------------------------------------------------

/// Durable, append-mostly message log keyed by message id
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert `payload` under `id` unless a record with that id already exists.
    ///
    /// Atomic from the caller's point of view: concurrent calls with one id
    /// result in exactly one retained record and exactly one `inserted: true`.
    async fn insert_if_absent(
        &self,
        id: MessageId,
        payload: Value,
    ) -> Result<InsertOutcome, StoreError>;

    /// Up to `n` messages, newest `received_at` first. Empty store yields empty.
    async fn most_recent(&self, n: usize) -> Result<Vec<StoredMessage>, StoreError>;

    /// Number of retained messages
    async fn message_count(&self) -> Result<usize, StoreError>;
}

// ----------------------------------------------------------------------------
// In-Memory Index
// ----------------------------------------------------------------------------

/// Id and recency indices shared by every backend
#[derive(Debug, Default)]
struct MessageIndex {
    messages: HashMap<MessageId, StoredMessage>,
    /// (received_at, sequence) -> id, iterated in reverse for recency queries
    time_index: BTreeMap<(u64, u64), MessageId>,
    next_sequence: u64,
}

impl MessageIndex {
    fn contains(&self, id: &MessageId) -> bool {
        self.messages.contains_key(id)
    }

    fn prepare(&self, id: MessageId, payload: Value, received_at: u64) -> StoredMessage {
        StoredMessage {
            id,
            payload,
            received_at,
            sequence: self.next_sequence,
        }
    }

    /// Add a record; the first record for an id wins
    fn insert(&mut self, message: StoredMessage) -> bool {
        if self.contains(&message.id) {
            return false;
        }
        self.next_sequence = self.next_sequence.max(message.sequence + 1);
        self.time_index
            .insert((message.received_at, message.sequence), message.id.clone());
        self.messages.insert(message.id.clone(), message);
        true
    }

    fn most_recent(&self, n: usize) -> Vec<StoredMessage> {
        self.time_index
            .values()
            .rev()
            .take(n)
            .filter_map(|id| self.messages.get(id).cloned())
            .collect()
    }

    fn len(&self) -> usize {
        self.messages.len()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ----------------------------------------------------------------------------
// Memory Store
// ----------------------------------------------------------------------------

/// Volatile store for tests and runs without a data directory
#[derive(Debug, Default)]
pub struct MemoryMessageStore {
    index: Mutex<MessageIndex>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn insert_if_absent(
        &self,
        id: MessageId,
        payload: Value,
    ) -> Result<InsertOutcome, StoreError> {
        let mut index = self.index.lock().await;
        if index.contains(&id) {
            debug!("Message {} already stored", id);
            return Ok(InsertOutcome::DUPLICATE);
        }
        let message = index.prepare(id, payload, now_millis());
        index.insert(message);
        Ok(InsertOutcome::INSERTED)
    }

    async fn most_recent(&self, n: usize) -> Result<Vec<StoredMessage>, StoreError> {
        Ok(self.index.lock().await.most_recent(n))
    }

    async fn message_count(&self) -> Result<usize, StoreError> {
        Ok(self.index.lock().await.len())
    }
}

// ----------------------------------------------------------------------------
// File Store
// ----------------------------------------------------------------------------

struct FileState {
    index: MessageIndex,
    log: File,
    /// Length of the log up to the last complete record
    committed_len: u64,
    /// A failed append may have left a partial record past `committed_len`
    dirty: bool,
}

impl FileState {
    /// Cut a partial record left by a failed append
    async fn repair(&mut self) -> std::io::Result<()> {
        if self.dirty {
            self.log.set_len(self.committed_len).await?;
            self.dirty = false;
            warn!("Truncated partial record after a failed append");
        }
        Ok(())
    }

    async fn append(&mut self, line: &[u8]) -> std::io::Result<()> {
        self.repair().await?;
        let written = async {
            self.log.write_all(line).await?;
            self.log.flush().await
        }
        .await;
        match written {
            Ok(()) => {
                self.committed_len += line.len() as u64;
                Ok(())
            }
            Err(e) => {
                self.dirty = true;
                Err(e)
            }
        }
    }
}

/// JSON-lines append log replayed into memory on open
pub struct FileMessageStore {
    path: PathBuf,
    state: Mutex<FileState>,
}

impl fmt::Debug for FileMessageStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileMessageStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl FileMessageStore {
    /// Open (or create) the log at `path` and replay it
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let existing = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(io_err(e)),
        };

        let mut index = MessageIndex::default();
        let mut skipped = 0usize;
        for (line_no, line) in existing.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoredMessage>(line) {
                Ok(message) => {
                    if !index.insert(message) {
                        debug!("Ignoring repeated id on line {} of {}", line_no + 1, path.display());
                    }
                }
                Err(e) => {
                    skipped += 1;
                    warn!(
                        "Skipping corrupt line {} of {}: {}",
                        line_no + 1,
                        path.display(),
                        e
                    );
                }
            }
        }

        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_err)?;

        // Terminate a torn final line so the next record starts cleanly
        if !existing.is_empty() && !existing.ends_with('\n') {
            log.write_all(b"\n").await.map_err(io_err)?;
            log.flush().await.map_err(io_err)?;
        }
        let committed_len = log.metadata().await.map_err(io_err)?.len();

        info!(
            "Opened message store {} ({} messages, {} corrupt lines skipped)",
            path.display(),
            index.len(),
            skipped
        );

        Ok(Self {
            path,
            state: Mutex::new(FileState {
                index,
                log,
                committed_len,
                dirty: false,
            }),
        })
    }

    /// Location of the backing log
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MessageStore for FileMessageStore {
    async fn insert_if_absent(
        &self,
        id: MessageId,
        payload: Value,
    ) -> Result<InsertOutcome, StoreError> {
        // Held across the append: lookup and write are one step for callers
        let mut state = self.state.lock().await;
        if state.index.contains(&id) {
            debug!("Message {} already stored", id);
            return Ok(InsertOutcome::DUPLICATE);
        }

        let message = state.index.prepare(id, payload, now_millis());
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');

        state.append(&line).await.map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;

        state.index.insert(message);
        Ok(InsertOutcome::INSERTED)
    }

    async fn most_recent(&self, n: usize) -> Result<Vec<StoredMessage>, StoreError> {
        Ok(self.state.lock().await.index.most_recent(n))
    }

    async fn message_count(&self) -> Result<usize, StoreError> {
        Ok(self.state.lock().await.index.len())
    }
}
