//! Per-connection send path.
//!
//! Each accepted socket gets a bounded outbound queue. The hub shares only
//! the cloneable [`ConnectionHandle`]; the receiving half stays with the
//! connection's writer task, which drains it into the socket.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// Atomic counter for ensuring unique IDs even within the same nanosecond.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a connection, stable for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Create a connection ID from an existing token.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh connection ID.
    #[must_use]
    pub fn generate() -> Self {
        // Combine timestamp with atomic counter for guaranteed uniqueness
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos() as u64;
        let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("conn_{:x}", timestamp.wrapping_add(counter)))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Send-path errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The connection is closed; the payload was not delivered.
    #[error("Connection closed")]
    Closed,

    /// The outbound queue is full; the payload was dropped for this peer.
    #[error("Outbound queue full")]
    Backpressure,
}

/// Receiving half of a connection's outbound queue.
///
/// Owned by the connection's writer task, never by the hub.
pub type OutboundReceiver = mpsc::Receiver<Bytes>;

/// Non-blocking send handle for one connection.
///
/// Cloneable; all clones observe the same open/closed state. Sending to a
/// closed connection reports [`SendError::Closed`] rather than panicking,
/// and a full queue reports [`SendError::Backpressure`] without blocking.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: mpsc::Sender<Bytes>,
    open: Arc<AtomicBool>,
}

impl ConnectionHandle {
    /// Get the connection's identifier.
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Queue a payload for delivery to this connection.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Closed`] if the connection is closed, or
    /// [`SendError::Backpressure`] if its outbound queue is full. Either way
    /// the payload is dropped for this peer only.
    pub fn send(&self, payload: Bytes) -> Result<(), SendError> {
        if !self.is_open() {
            return Err(SendError::Closed);
        }

        match self.sender.try_send(payload) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(SendError::Backpressure),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                // Writer task is gone; reflect that in the open flag.
                self.open.store(false, Ordering::SeqCst);
                Err(SendError::Closed)
            }
        }
    }

    /// Check if the connection is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Mark the connection closed. Idempotent.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            debug!(connection = %self.id, "Connection marked closed");
        }
    }
}

/// Create the outbound queue for a new connection.
///
/// Returns the hub-facing [`ConnectionHandle`] and the writer-task half.
#[must_use]
pub fn outbound(id: ConnectionId, capacity: usize) -> (ConnectionHandle, OutboundReceiver) {
    let (sender, receiver) = mpsc::channel(capacity);
    let handle = ConnectionHandle {
        id,
        sender,
        open: Arc::new(AtomicBool::new(true)),
    };
    (handle, receiver)
}
