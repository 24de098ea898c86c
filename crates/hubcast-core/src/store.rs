//! Store client seam.
//!
//! The hub treats durable storage as an external collaborator: one `save`
//! call per message, no retries or backoff. Store failures never stop the
//! live delivery path; callers log the gap and move on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Atomic counter for ensuring unique IDs even within the same nanosecond.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique message ID.
#[must_use]
pub fn generate_message_id() -> String {
    // Combine timestamp with atomic counter for guaranteed uniqueness
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64;
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("msg_{:x}", timestamp.wrapping_add(counter))
}

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store rejected or could not accept the message.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// I/O error while writing the message.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The message could not be serialized into a record.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Receipt for a persisted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Store-assigned message identifier.
    pub id: String,
    /// Unix timestamp (milliseconds) when the message was stored.
    pub stored_at: u64,
}

impl StoredMessage {
    /// Create a receipt with a fresh id stamped now.
    #[must_use]
    pub fn stamped() -> Self {
        Self {
            id: generate_message_id(),
            stored_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_millis() as u64,
        }
    }
}

/// Durable message log.
///
/// Implementations persist the raw frame exactly as received.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist one raw frame.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] when the message could not be persisted.
    async fn save(&self, raw: &Bytes) -> Result<StoredMessage, StorageError>;
}

/// In-memory store, used when no durable log is configured and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    messages: Mutex<Vec<Bytes>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Copy of every stored frame, in save order.
    #[must_use]
    pub fn messages(&self) -> Vec<Bytes> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn save(&self, raw: &Bytes) -> Result<StoredMessage, StorageError> {
        self.messages.lock().push(raw.clone());
        Ok(StoredMessage::stamped())
    }
}
