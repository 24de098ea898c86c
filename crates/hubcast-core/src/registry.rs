//! Session registry for the hubcast hub.
//!
//! Owns the mapping of connection identifier to presence info. All mutation
//! and every snapshot go through one mutex, so roster notifications are
//! never built from a torn intermediate state.

use std::time::{SystemTime, UNIX_EPOCH};

use hubcast_protocol::RosterEntry;
use hubcast_transport::{ConnectionHandle, ConnectionId};
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

/// One tracked session.
#[derive(Debug, Clone)]
struct Session {
    handle: ConnectionHandle,
    username: Option<String>,
    joined_at: Option<u64>,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// Registry of currently open connections and their presence info.
///
/// Entries keep insertion order. A session without a username is
/// unauthenticated and never appears in roster snapshots, but it still
/// receives broadcasts.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<IndexMap<ConnectionId, Session>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an unauthenticated session for a newly accepted connection.
    ///
    /// Idempotent: re-registering an id leaves the existing session,
    /// including any username already set, untouched.
    pub fn register(&self, handle: ConnectionHandle) {
        let id = handle.id().clone();
        let mut sessions = self.sessions.lock();

        sessions.entry(id.clone()).or_insert_with(|| {
            debug!(connection = %id, "Session registered");
            Session {
                handle,
                username: None,
                joined_at: None,
            }
        });
    }

    /// Set or overwrite the username for a registered session.
    ///
    /// Returns `true` if the session exists. The host registers every
    /// connection before reading frames from it, so a miss here means the
    /// connection already closed; the join is logged and ignored.
    pub fn join(&self, id: &ConnectionId, username: impl Into<String>) -> bool {
        let mut sessions = self.sessions.lock();

        match sessions.get_mut(id) {
            Some(session) => {
                session.username = Some(username.into());
                session.joined_at = Some(now_millis());
                true
            }
            None => {
                warn!(connection = %id, "Join for unknown connection ignored");
                false
            }
        }
    }

    /// Remove a session, returning its username if one was set.
    ///
    /// The caller uses the returned username to decide whether a "left"
    /// notification is warranted.
    pub fn remove(&self, id: &ConnectionId) -> Option<String> {
        let mut sessions = self.sessions.lock();
        let session = sessions.shift_remove(id)?;

        session.handle.close();
        debug!(
            connection = %id,
            username = session.username.as_deref().unwrap_or("<unauthenticated>"),
            joined_at = ?session.joined_at,
            "Session removed"
        );

        session.username
    }

    /// Roster snapshot of all joined sessions, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<RosterEntry> {
        let sessions = self.sessions.lock();
        sessions
            .iter()
            .filter_map(|(id, session)| {
                session
                    .username
                    .clone()
                    .map(|username| RosterEntry::new(id.as_str(), username))
            })
            .collect()
    }

    /// Look up the live send handle for a connection.
    #[must_use]
    pub fn resolve(&self, id: &ConnectionId) -> Option<ConnectionHandle> {
        let sessions = self.sessions.lock();
        sessions
            .get(id)
            .filter(|session| session.handle.is_open())
            .map(|session| session.handle.clone())
    }

    /// Send handles of every open connection, taken under the lock.
    ///
    /// Fan-out happens on the returned clones after the lock is released.
    #[must_use]
    pub fn handles(&self) -> Vec<ConnectionHandle> {
        let sessions = self.sessions.lock();
        sessions
            .values()
            .filter(|session| session.handle.is_open())
            .map(|session| session.handle.clone())
            .collect()
    }

    /// Number of tracked sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
