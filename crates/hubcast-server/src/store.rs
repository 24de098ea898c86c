//! Append-only JSON-lines message log.
//!
//! The durable store collaborator used when `[store].log_path` is set.
//! One record per line: the store-assigned id, the timestamp, and the
//! client's frame.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use hubcast_core::{MessageStore, StorageError, StoredMessage};
use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Serialize)]
struct LogRecord<'a> {
    id: &'a str,
    stored_at: u64,
    frame: &'a serde_json::Value,
}

/// Append-only JSON-lines store.
///
/// Writes are serialized through a mutex on the file handle, so records
/// never interleave.
pub struct JsonLogStore {
    file: Mutex<File>,
}

impl JsonLogStore {
    /// Open (or create) the log file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened for appending.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        info!(path = %path.display(), "Message log opened");

        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

#[async_trait]
impl MessageStore for JsonLogStore {
    async fn save(&self, raw: &Bytes) -> Result<StoredMessage, StorageError> {
        let frame: serde_json::Value = serde_json::from_slice(raw)?;
        let receipt = StoredMessage::stamped();

        let mut line = serde_json::to_vec(&LogRecord {
            id: &receipt.id,
            stored_at: receipt.stored_at,
            frame: &frame,
        })?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;

        debug!(id = %receipt.id, "Message appended to log");
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_store_appends_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.jsonl");

        let store = JsonLogStore::open(&path).await.unwrap();
        let first = store
            .save(&Bytes::from_static(b"{\"type\":\"MESSAGE\",\"body\":\"one\"}"))
            .await
            .unwrap();
        let second = store
            .save(&Bytes::from_static(b"{\"type\":\"MESSAGE\",\"body\":\"two\"}"))
            .await
            .unwrap();
        assert_ne!(first.id, second.id);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(record["id"], first.id.as_str());
        assert_eq!(record["frame"]["body"], "one");

        let record: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(record["frame"]["body"], "two");
    }

    #[tokio::test]
    async fn test_log_store_rejects_non_json_payload() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonLogStore::open(dir.path().join("messages.jsonl"))
            .await
            .unwrap();

        let result = store.save(&Bytes::from_static(b"not json")).await;
        assert!(matches!(result, Err(StorageError::Serialize(_))));
    }

    #[tokio::test]
    async fn test_log_store_reopens_existing_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.jsonl");

        {
            let store = JsonLogStore::open(&path).await.unwrap();
            store
                .save(&Bytes::from_static(b"{\"type\":\"MESSAGE\"}"))
                .await
                .unwrap();
        }

        // Reopening must append, not truncate
        let store = JsonLogStore::open(&path).await.unwrap();
        store
            .save(&Bytes::from_static(b"{\"type\":\"MESSAGE\"}"))
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
