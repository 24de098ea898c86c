//! Fan-out of payloads to connected peers.
//!
//! The engine snapshots its targets under the registry lock and performs
//! every per-connection send after the lock is released. Sends are
//! non-blocking: a failing or saturated peer loses that one payload and the
//! round continues.

use std::sync::Arc;

use bytes::Bytes;
use hubcast_protocol::{codec, PresenceKind, ServerFrame};
use hubcast_transport::{ConnectionId, SendError};
use tracing::{debug, trace, warn};

use crate::registry::SessionRegistry;

/// Delivers an outbound payload to one, many, or all active connections.
#[derive(Clone)]
pub struct BroadcastEngine {
    registry: Arc<SessionRegistry>,
}

impl BroadcastEngine {
    /// Create an engine over the given registry.
    #[must_use]
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver a payload to every open connection.
    ///
    /// Targets that error mid-broadcast are skipped for this round; removing
    /// them belongs to the close-detection path, not the engine. Returns the
    /// number of successful deliveries.
    pub fn broadcast_all(&self, payload: &Bytes) -> usize {
        let handles = self.registry.handles();
        let mut delivered = 0;

        for handle in &handles {
            match handle.send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(SendError::Closed) => {
                    debug!(connection = %handle.id(), "Skipping closed connection");
                }
                Err(SendError::Backpressure) => {
                    warn!(connection = %handle.id(), "Outbound queue full, dropping frame");
                }
            }
        }

        trace!(targets = handles.len(), delivered, "Broadcast round complete");
        delivered
    }

    /// Deliver a payload to a single connection.
    ///
    /// Returns `false`, with a logged outcome, when the target is absent or
    /// closed.
    pub fn deliver_to(&self, id: &ConnectionId, payload: &Bytes) -> bool {
        let Some(handle) = self.registry.resolve(id) else {
            debug!(connection = %id, "Delivery target not found");
            return false;
        };

        match handle.send(payload.clone()) {
            Ok(()) => true,
            Err(e) => {
                debug!(connection = %id, error = %e, "Targeted delivery failed");
                false
            }
        }
    }

    /// Broadcast a `USERS` frame announcing a presence change.
    ///
    /// The roster is snapshotted once; every open connection, joined or not,
    /// receives the frame. Returns the number of deliveries.
    pub fn notify_presence(&self, kind: PresenceKind, username: &str) -> usize {
        let roster = self.registry.snapshot();
        let frame = ServerFrame::users(roster, kind, username);

        match codec::encode(&frame) {
            Ok(payload) => self.broadcast_all(&payload),
            Err(e) => {
                warn!(error = %e, "Failed to encode presence frame");
                0
            }
        }
    }
}
