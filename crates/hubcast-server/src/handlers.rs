//! Connection handlers for the hubcast server.
//!
//! This module owns the connection lifecycle: accept and register the
//! socket, pump inbound frames through the router, drain the outbound queue
//! into the socket from a writer task, and clean up (with a departure
//! notification) on close.

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use hubcast_core::{BroadcastEngine, MemoryStore, MessageRouter, MessageStore, SessionRegistry};
use hubcast_protocol::PresenceKind;
use hubcast_transport::{outbound, ConnectionId};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use crate::store::JsonLogStore;

/// Shared server state.
pub struct AppState {
    /// Sessions of currently open connections.
    pub registry: Arc<SessionRegistry>,
    /// Fan-out engine over the registry.
    pub engine: BroadcastEngine,
    /// Inbound frame router.
    pub router: MessageRouter,
    /// Durable message log.
    pub store: Arc<dyn MessageStore>,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state, opening the configured message store.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured message log cannot be opened.
    pub async fn new(config: Config) -> Result<Self> {
        let registry = Arc::new(SessionRegistry::new());
        let engine = BroadcastEngine::new(registry.clone());

        let store: Arc<dyn MessageStore> = match &config.store.log_path {
            Some(path) => Arc::new(JsonLogStore::open(path).await?),
            None => Arc::new(MemoryStore::new()),
        };

        let router = MessageRouter::new(registry.clone(), engine.clone(), store.clone());

        Ok(Self {
            registry,
            engine,
            router,
            store,
            config,
        })
    }
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()).await?);

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    // Build router
    let app = Router::new()
        .route(&config.transport.websocket_path, get(ws_handler))
        .route("/health", get(health_handler))
        .route("/send", post(send_handler))
        .with_state(state);

    // Bind and serve
    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr).await?;

    info!("Hubcast server listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Persist a message submitted over HTTP and return the receipt.
async fn send_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let raw = match serde_json::to_vec(&body) {
        Ok(data) => Bytes::from(data),
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    match state.store.save(&raw).await {
        Ok(receipt) => Json(receipt).into_response(),
        Err(e) => {
            metrics::record_store_failure();
            warn!(error = %e, "HTTP send failed to persist message");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}

/// Check an Origin header against the configured allowlist.
///
/// An empty allowlist allows everything. A missing Origin header means a
/// non-browser client; only browser origins are filtered.
fn origin_allowed(allowed: &[String], origin: Option<&str>) -> bool {
    if allowed.is_empty() {
        return true;
    }
    match origin {
        Some(origin) => allowed.iter().any(|allowed| allowed == origin),
        None => true,
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok());
    if !origin_allowed(&state.config.transport.allowed_origins, origin) {
        warn!(origin = ?origin, "Rejected WebSocket upgrade from disallowed origin");
        return StatusCode::FORBIDDEN.into_response();
    }

    if state.registry.len() >= state.config.limits.max_connections {
        warn!("Rejected WebSocket upgrade: connection limit reached");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    ws.max_message_size(state.config.limits.max_message_size)
        .on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    // Record connection metrics
    let _metrics_guard = ConnectionMetricsGuard::new();

    let connection_id = ConnectionId::generate();
    debug!(connection = %connection_id, "WebSocket connected");

    let (mut sink, mut stream) = socket.split();

    let (handle, mut outbound_rx) = outbound(
        connection_id.clone(),
        state.config.limits.send_queue_capacity,
    );
    state.registry.register(handle);

    // Writer task: drains the outbound queue into the socket. Ends when the
    // registry entry (the last sender) is removed.
    let writer_id = connection_id.clone();
    let writer = tokio::spawn(async move {
        while let Some(payload) = outbound_rx.recv().await {
            metrics::record_message(payload.len(), "outbound");

            let text = match String::from_utf8(payload.to_vec()) {
                Ok(text) => text,
                Err(e) => {
                    warn!(connection = %writer_id, error = %e, "Dropping non-UTF-8 outbound frame");
                    continue;
                }
            };

            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }

        let _ = sink.close().await;
    });

    // Read loop: frames from this connection, handled in arrival order.
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                metrics::record_message(text.len(), "inbound");
                state.router.handle(&connection_id, Bytes::from(text)).await;
            }
            Ok(Message::Binary(data)) => {
                metrics::record_message(data.len(), "inbound");
                state.router.handle(&connection_id, Bytes::from(data)).await;
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {
                // Keepalives are answered by the socket layer
            }
            Ok(Message::Close(_)) => {
                debug!(connection = %connection_id, "Received close frame");
                break;
            }
            Err(e) => {
                warn!(connection = %connection_id, error = %e, "WebSocket error");
                metrics::record_error("websocket");
                break;
            }
        }
    }

    // Cleanup: drop the session and, if it had joined, announce the departure
    if let Some(username) = state.registry.remove(&connection_id) {
        state.engine.notify_presence(PresenceKind::Left, &username);
    }

    writer.abort();
    debug!(connection = %connection_id, "WebSocket disconnected");
}
