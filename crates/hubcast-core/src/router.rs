//! Inbound frame routing.
//!
//! The router decodes raw frames, validates them, and dispatches to the
//! store and the broadcast engine. Every failure is contained to the frame
//! that caused it: malformed input is dropped and logged, storage failures
//! degrade to best-effort delivery, and nothing in here ever terminates a
//! connection.

use std::sync::Arc;

use bytes::Bytes;
use hubcast_protocol::{codec, ChatEvent, PresenceKind};
use hubcast_transport::ConnectionId;
use tracing::{debug, warn};

use crate::broadcast::BroadcastEngine;
use crate::registry::SessionRegistry;
use crate::store::MessageStore;

/// Routes one connection's inbound frames to the store and the engine.
#[derive(Clone)]
pub struct MessageRouter {
    registry: Arc<SessionRegistry>,
    engine: BroadcastEngine,
    store: Arc<dyn MessageStore>,
}

impl MessageRouter {
    /// Create a router over the shared registry, engine, and store.
    #[must_use]
    pub fn new(
        registry: Arc<SessionRegistry>,
        engine: BroadcastEngine,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            registry,
            engine,
            store,
        }
    }

    /// Handle one raw inbound frame from a connection.
    pub async fn handle(&self, connection_id: &ConnectionId, raw: Bytes) {
        let event = match codec::decode(&raw) {
            Ok(event) => event,
            Err(e) => {
                debug!(connection = %connection_id, error = %e, "Dropping undecodable frame");
                return;
            }
        };

        match event {
            ChatEvent::Join { username } => {
                if self.registry.join(connection_id, username.as_str()) {
                    debug!(connection = %connection_id, username = %username, "User joined");
                    self.engine.notify_presence(PresenceKind::Joined, &username);
                }
            }

            ChatEvent::Chat { raw } => {
                // Live delivery outranks durability: broadcast proceeds even
                // when the save fails.
                if let Err(e) = self.store.save(&raw).await {
                    warn!(connection = %connection_id, error = %e, "Failed to persist chat message");
                }

                let delivered = self.engine.broadcast_all(&raw);
                debug!(connection = %connection_id, delivered, "Chat message broadcast");
            }

            ChatEvent::Private { to_session, raw } => {
                let target = ConnectionId::new(to_session);
                if self.registry.resolve(&target).is_none() {
                    debug!(
                        connection = %connection_id,
                        target = %target,
                        "Private message recipient not found"
                    );
                    return;
                }

                // Same trade-off as public chat: a persistence gap is logged,
                // delivery is still attempted.
                if let Err(e) = self.store.save(&raw).await {
                    warn!(connection = %connection_id, error = %e, "Failed to persist private message");
                }

                if self.engine.deliver_to(&target, &raw) {
                    debug!(connection = %connection_id, target = %target, "Private message delivered");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StorageError, StoredMessage};
    use async_trait::async_trait;
    use hubcast_transport::{outbound, ConnectionHandle, OutboundReceiver};

    struct Hub {
        registry: Arc<SessionRegistry>,
        engine: BroadcastEngine,
        store: Arc<MemoryStore>,
        router: MessageRouter,
    }

    fn hub() -> Hub {
        let registry = Arc::new(SessionRegistry::new());
        let engine = BroadcastEngine::new(registry.clone());
        let store = Arc::new(MemoryStore::new());
        let router = MessageRouter::new(registry.clone(), engine.clone(), store.clone());
        Hub {
            registry,
            engine,
            store,
            router,
        }
    }

    fn connect(hub: &Hub, id: &str) -> (ConnectionHandle, OutboundReceiver) {
        let (handle, rx) = outbound(ConnectionId::new(id), 64);
        hub.registry.register(handle.clone());
        (handle, rx)
    }

    fn drain(rx: &mut OutboundReceiver) -> Vec<Bytes> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    #[tokio::test]
    async fn test_chat_is_persisted_and_broadcast_verbatim() {
        let hub = hub();
        let (_h1, mut rx1) = connect(&hub, "conn_1");
        let (_h2, mut rx2) = connect(&hub, "conn_2");

        let raw = Bytes::from_static(b"{\"type\":\"MESSAGE\",\"from\":\"alice\",\"body\":\"hi\"}");
        hub.router.handle(&ConnectionId::new("conn_1"), raw.clone()).await;

        assert_eq!(hub.store.len(), 1);
        assert_eq!(hub.store.messages()[0], raw);

        // Every open connection, sender included, gets the exact bytes once
        assert_eq!(drain(&mut rx1), vec![raw.clone()]);
        assert_eq!(drain(&mut rx2), vec![raw]);
    }

    #[tokio::test]
    async fn test_join_broadcasts_presence_with_roster() {
        let hub = hub();
        let (_h1, mut rx1) = connect(&hub, "conn_1");
        let (_h2, mut rx2) = connect(&hub, "conn_2");

        hub.router
            .handle(
                &ConnectionId::new("conn_1"),
                Bytes::from_static(b"{\"type\":\"JOIN\",\"username\":\"alice\"}"),
            )
            .await;

        for rx in [&mut rx1, &mut rx2] {
            let frames = drain(rx);
            assert_eq!(frames.len(), 1);

            let value: serde_json::Value = serde_json::from_slice(&frames[0]).unwrap();
            assert_eq!(value["type"], "USERS");
            assert_eq!(value["users"][0]["session"], "conn_1");
            assert_eq!(value["users"][0]["username"], "alice");
        }

        // Join frames are presence, not chat: nothing is persisted
        assert!(hub.store.is_empty());
    }

    #[tokio::test]
    async fn test_roster_lists_user_once_regardless_of_chat_volume() {
        let hub = hub();
        let (_h1, _rx1) = connect(&hub, "conn_1");

        hub.router
            .handle(
                &ConnectionId::new("conn_1"),
                Bytes::from_static(b"{\"type\":\"JOIN\",\"username\":\"alice\"}"),
            )
            .await;

        for _ in 0..5 {
            hub.router
                .handle(
                    &ConnectionId::new("conn_1"),
                    Bytes::from_static(b"{\"type\":\"MESSAGE\",\"body\":\"spam\"}"),
                )
                .await;
        }

        let roster = hub.registry.snapshot();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].username, "alice");
    }

    #[tokio::test]
    async fn test_empty_username_join_is_dropped() {
        let hub = hub();
        let (_h1, mut rx1) = connect(&hub, "conn_1");

        hub.router
            .handle(
                &ConnectionId::new("conn_1"),
                Bytes::from_static(b"{\"type\":\"JOIN\",\"username\":\"\"}"),
            )
            .await;

        assert!(drain(&mut rx1).is_empty());
        assert!(hub.registry.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_bogus_frame_changes_nothing() {
        let hub = hub();
        let (_h1, mut rx1) = connect(&hub, "conn_1");
        hub.registry.join(&ConnectionId::new("conn_1"), "alice");
        let roster_before = hub.registry.snapshot();

        hub.router
            .handle(
                &ConnectionId::new("conn_1"),
                Bytes::from_static(b"{\"type\":\"BOGUS\"}"),
            )
            .await;

        assert!(hub.store.is_empty());
        assert!(drain(&mut rx1).is_empty());
        assert_eq!(hub.registry.snapshot(), roster_before);
    }

    #[tokio::test]
    async fn test_private_message_reaches_only_target() {
        let hub = hub();
        let (_h1, mut rx1) = connect(&hub, "conn_1");
        let (_h2, mut rx2) = connect(&hub, "conn_2");
        let (_h3, mut rx3) = connect(&hub, "conn_3");

        let raw =
            Bytes::from_static(b"{\"type\":\"PRIVATE_MESSAGE\",\"toSession\":\"conn_2\",\"body\":\"psst\"}");
        hub.router.handle(&ConnectionId::new("conn_1"), raw.clone()).await;

        assert_eq!(hub.store.len(), 1);
        assert!(drain(&mut rx1).is_empty());
        assert_eq!(drain(&mut rx2), vec![raw]);
        assert!(drain(&mut rx3).is_empty());
    }

    #[tokio::test]
    async fn test_private_message_to_unknown_recipient() {
        let hub = hub();
        let (_h1, mut rx1) = connect(&hub, "conn_1");

        hub.router
            .handle(
                &ConnectionId::new("conn_1"),
                Bytes::from_static(
                    b"{\"type\":\"PRIVATE_MESSAGE\",\"toSession\":\"ghost\",\"body\":\"psst\"}",
                ),
            )
            .await;

        // Unresolved recipient: no delivery and no persistence
        assert!(hub.store.is_empty());
        assert!(drain(&mut rx1).is_empty());
    }

    struct FailingStore;

    #[async_trait]
    impl MessageStore for FailingStore {
        async fn save(&self, _raw: &Bytes) -> Result<StoredMessage, StorageError> {
            Err(StorageError::Unavailable("store offline".into()))
        }
    }

    #[tokio::test]
    async fn test_chat_is_broadcast_even_when_store_fails() {
        let registry = Arc::new(SessionRegistry::new());
        let engine = BroadcastEngine::new(registry.clone());
        let router = MessageRouter::new(registry.clone(), engine, Arc::new(FailingStore));

        let (handle, mut rx) = outbound(ConnectionId::new("conn_1"), 16);
        registry.register(handle);

        let raw = Bytes::from_static(b"{\"type\":\"MESSAGE\",\"body\":\"still here\"}");
        router.handle(&ConnectionId::new("conn_1"), raw.clone()).await;

        assert_eq!(drain(&mut rx), vec![raw]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_senders_exact_counts() {
        const SENDERS: usize = 8;

        let hub = hub();
        let mut receivers = Vec::new();
        for i in 0..SENDERS {
            let (_handle, rx) = connect(&hub, &format!("conn_{i}"));
            receivers.push(rx);
        }

        let mut tasks = Vec::new();
        for i in 0..SENDERS {
            let router = hub.router.clone();
            let id = ConnectionId::new(format!("conn_{i}"));
            let raw = Bytes::from(format!("{{\"type\":\"MESSAGE\",\"body\":\"from {i}\"}}"));
            tasks.push(tokio::spawn(async move {
                router.handle(&id, raw).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // Exactly one save per sender, exactly one delivery per sender per peer
        assert_eq!(hub.store.len(), SENDERS);
        for rx in &mut receivers {
            assert_eq!(drain(rx).len(), SENDERS);
        }
    }
}
