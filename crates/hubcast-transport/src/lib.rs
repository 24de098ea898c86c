//! # hubcast-transport
//!
//! The connection abstraction for the hubcast broadcast hub.
//!
//! The host layer owns each socket; the hub only ever holds a
//! [`ConnectionHandle`] - a cloneable, non-blocking send handle over a
//! bounded per-connection outbound queue. A writer task on the host side
//! drains the queue into the socket, so fan-out to one slow peer can never
//! stall dispatch to another.
//!
//! ```rust
//! use bytes::Bytes;
//! use hubcast_transport::{outbound, ConnectionId};
//!
//! let (handle, mut rx) = outbound(ConnectionId::generate(), 16);
//! handle.send(Bytes::from_static(b"hello")).unwrap();
//! assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"hello"));
//! ```

pub mod connection;

pub use connection::{outbound, ConnectionHandle, ConnectionId, OutboundReceiver, SendError};
