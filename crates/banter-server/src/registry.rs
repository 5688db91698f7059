//! In-memory session directory — the single source of truth for "who is
//! online".
//!
//! Mutating operations take the write lock only for the map change plus
//! a snapshot of the affected handles; actual delivery happens after the
//! lock is released, so a slow peer can never stall logins or logouts.
//! Delivery itself is a non-blocking queue send into the connection
//! task's outbound channel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use banter_shared::Envelope;

/// Command sent to a connection task's outbound queue.
#[derive(Debug)]
pub enum Outbound {
    /// Write this envelope to the client socket.
    Deliver(Envelope),
    /// Stop reading, drop the socket.
    Close,
}

/// Handle to send messages to one connected client.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    username: String,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl SessionHandle {
    pub fn new(username: impl Into<String>, tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            username: username.into(),
            tx,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Queue an envelope for delivery. Sends to an already-closed
    /// connection are silently dropped.
    pub fn deliver(&self, envelope: Envelope) {
        let _ = self.tx.send(Outbound::Deliver(envelope));
    }

    /// Ask the connection task to shut down after flushing its queue.
    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }

    /// Whether this handle feeds the connection behind `tx`.
    pub fn is_connection(&self, tx: &mpsc::UnboundedSender<Outbound>) -> bool {
        self.tx.same_channel(tx)
    }
}

/// Concurrency-safe map from username to live session handle.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) the session for a username, then push the
    /// refreshed online list to every session.
    ///
    /// A second login for the same username replaces the previous entry;
    /// the replaced connection keeps its socket until it closes on its
    /// own (see `remove_connection`).
    pub async fn add(&self, handle: SessionHandle) {
        let notify = {
            let mut sessions = self.sessions.write().await;
            sessions.insert(handle.username().to_string(), handle);
            snapshot(&sessions)
        };
        push_online_list(notify);
    }

    /// Remove the session for a username, if present, broadcasting the
    /// refreshed online list only when something was actually removed.
    pub async fn remove(&self, username: &str) -> bool {
        let notify = {
            let mut sessions = self.sessions.write().await;
            if sessions.remove(username).is_none() {
                return false;
            }
            snapshot(&sessions)
        };
        push_online_list(notify);
        true
    }

    /// Remove the session for a username only while it still belongs to
    /// the connection behind `tx`.
    ///
    /// This is the disconnect-cleanup path: when a duplicate login has
    /// already replaced the entry, the stale connection's cleanup must
    /// not evict the newer session.
    pub async fn remove_connection(
        &self,
        username: &str,
        tx: &mpsc::UnboundedSender<Outbound>,
    ) -> bool {
        let notify = {
            let mut sessions = self.sessions.write().await;
            match sessions.get(username) {
                Some(handle) if handle.is_connection(tx) => {
                    sessions.remove(username);
                }
                _ => return false,
            }
            snapshot(&sessions)
        };
        push_online_list(notify);
        true
    }

    /// Point lookup.
    pub async fn get(&self, username: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(username).cloned()
    }

    pub async fn is_online(&self, username: &str) -> bool {
        self.sessions.read().await.contains_key(username)
    }

    /// Currently online usernames, alphabetically.
    pub async fn online_users(&self) -> Vec<String> {
        let sessions = self.sessions.read().await;
        let mut users: Vec<String> = sessions.keys().cloned().collect();
        users.sort();
        users
    }

    /// Deliver an envelope to every registered session.
    ///
    /// The registered set is snapshotted before delivery: sessions
    /// joining or leaving concurrently may or may not be included.
    pub async fn broadcast(&self, envelope: Envelope) {
        let targets: Vec<SessionHandle> =
            self.sessions.read().await.values().cloned().collect();
        for target in &targets {
            target.deliver(envelope.clone());
        }
    }

    /// Forcibly terminate a session: notice first, then close, then
    /// remove (which refreshes everyone's online list).
    pub async fn kick(&self, username: &str, reason: &str) {
        let Some(handle) = self.get(username).await else {
            return;
        };
        debug!(user = %username, "kicking session");
        handle.deliver(Envelope::ForceLogout {
            reason: reason.to_string(),
        });
        handle.close();
        self.remove(username).await;
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Sorted usernames plus the handles to notify, captured under the lock.
fn snapshot(sessions: &HashMap<String, SessionHandle>) -> (Vec<String>, Vec<SessionHandle>) {
    let mut users: Vec<String> = sessions.keys().cloned().collect();
    users.sort();
    (users, sessions.values().cloned().collect())
}

/// Deliver the online-user list to every snapshotted handle.
fn push_online_list((users, targets): (Vec<String>, Vec<SessionHandle>)) {
    for target in &targets {
        target.deliver(Envelope::OnlineUsers {
            users: users.clone(),
        });
    }
}
