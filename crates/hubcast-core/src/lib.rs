//! # hubcast-core
//!
//! Session tracking, message routing, and fan-out for the hubcast
//! broadcast hub.
//!
//! This crate provides the four components with genuine concurrency or
//! state-consistency concerns:
//!
//! - **SessionRegistry** - serialized-access map of connection to presence
//! - **MessageRouter** - classifies inbound frames and dispatches them
//! - **BroadcastEngine** - delivers payloads to one, many, or all peers
//! - **MessageStore** - the seam to the durable message log
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────────┐
//! │  Connection │────▶│   Router    │────▶│ Broadcast Engine │
//! └─────────────┘     └─────────────┘     └──────────────────┘
//!                            │                      │
//!                            ▼                      ▼
//!                     ┌─────────────┐       ┌──────────────┐
//!                     │    Store    │       │   Registry   │
//!                     └─────────────┘       └──────────────┘
//! ```
//!
//! Everything outside these components (socket acceptance, HTTP, config)
//! lives in the host layer.

pub mod broadcast;
pub mod registry;
pub mod router;
pub mod store;

pub use broadcast::BroadcastEngine;
pub use registry::SessionRegistry;
pub use router::MessageRouter;
pub use store::{MemoryStore, MessageStore, StorageError, StoredMessage};
