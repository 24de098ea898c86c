//! # hubcast-protocol
//!
//! Wire protocol definitions for the hubcast broadcast hub.
//!
//! Every frame on the wire is a JSON object with a required `type`
//! discriminator. Clients send three frame kinds, the server generates one:
//!
//! - `JOIN` - bind a username to the sending connection
//! - `MESSAGE` - public chat, fanned out to every open connection
//! - `PRIVATE_MESSAGE` - chat delivered to a single target connection
//! - `USERS` - server-generated roster snapshot announcing a presence change
//!
//! Chat frames are never re-serialized: the bytes a client sends are the
//! bytes every recipient gets.
//!
//! ## Example
//!
//! ```rust
//! use bytes::Bytes;
//! use hubcast_protocol::{codec, ChatEvent};
//!
//! let raw = Bytes::from(r#"{"type":"JOIN","username":"alice"}"#);
//! let event = codec::decode(&raw).unwrap();
//! assert_eq!(event, ChatEvent::Join { username: "alice".into() });
//! ```

pub mod codec;
pub mod frames;

pub use codec::{decode, encode, FrameError, MAX_FRAME_SIZE};
pub use frames::{ChatEvent, PresenceKind, RosterEntry, ServerFrame};
