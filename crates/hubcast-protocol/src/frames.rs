//! Frame types for the hubcast protocol.
//!
//! Inbound frames are classified into [`ChatEvent`]s; the server's only
//! outbound frame kind is the `USERS` roster notification.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Discriminator value for join frames.
pub const TYPE_JOIN: &str = "JOIN";
/// Discriminator value for public chat frames.
pub const TYPE_MESSAGE: &str = "MESSAGE";
/// Discriminator value for private chat frames.
pub const TYPE_PRIVATE_MESSAGE: &str = "PRIVATE_MESSAGE";

/// A classified inbound event.
///
/// `Chat` and `Private` carry the exact bytes received, so persistence and
/// re-broadcast stay byte-for-byte identical to what the sender wrote.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A client binding a username to its connection.
    Join {
        /// Username announced by the client; validated non-empty.
        username: String,
    },

    /// Public chat, fanned out to every open connection.
    Chat {
        /// The raw frame as received.
        raw: Bytes,
    },

    /// Private chat, delivered to one target connection only.
    Private {
        /// Connection identifier of the recipient.
        to_session: String,
        /// The raw frame as received.
        raw: Bytes,
    },
}

/// One entry in a `USERS` roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Connection identifier the username is bound to.
    pub session: String,
    /// Username announced via `JOIN`.
    pub username: String,
}

impl RosterEntry {
    /// Create a new roster entry.
    #[must_use]
    pub fn new(session: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            username: username.into(),
        }
    }
}

/// Presence change kinds announced by `USERS` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresenceKind {
    /// A user joined the chat.
    Joined,
    /// A user left the chat.
    Left,
}

impl PresenceKind {
    /// Human-readable change description for the `message` field.
    #[must_use]
    pub fn describe(&self, username: &str) -> String {
        match self {
            PresenceKind::Joined => format!("{username} joined the chat."),
            PresenceKind::Left => format!("{username} left the chat."),
        }
    }
}

/// A server-generated frame. Never received from clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    /// Roster snapshot plus a description of the presence change.
    #[serde(rename = "USERS")]
    Users {
        /// All currently joined sessions, in join order.
        users: Vec<RosterEntry>,
        /// Human-readable description of the change.
        message: String,
    },
}

impl ServerFrame {
    /// Build a `USERS` frame for a presence change.
    #[must_use]
    pub fn users(users: Vec<RosterEntry>, kind: PresenceKind, username: &str) -> Self {
        ServerFrame::Users {
            users,
            message: kind.describe(username),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_descriptions() {
        assert_eq!(
            PresenceKind::Joined.describe("alice"),
            "alice joined the chat."
        );
        assert_eq!(PresenceKind::Left.describe("bob"), "bob left the chat.");
    }

    #[test]
    fn test_users_frame_construction() {
        let frame = ServerFrame::users(
            vec![RosterEntry::new("conn_1", "alice")],
            PresenceKind::Joined,
            "alice",
        );

        let ServerFrame::Users { users, message } = frame;
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "alice");
        assert_eq!(message, "alice joined the chat.");
    }

    #[test]
    fn test_users_frame_wire_shape() {
        let frame = ServerFrame::users(
            vec![RosterEntry::new("conn_1", "alice")],
            PresenceKind::Joined,
            "alice",
        );

        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "USERS");
        assert_eq!(json["users"][0]["session"], "conn_1");
        assert_eq!(json["users"][0]["username"], "alice");
        assert!(json["message"].is_string());
    }
}
