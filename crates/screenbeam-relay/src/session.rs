//! Session store: maps session IDs to one broadcaster and its viewers.
//!
//! Every operation takes the store lock once and releases it before
//! returning, so callers fan out on a snapshot of handles. The only frame
//! queued under the lock is a viewer's own `joined` reply, which never waits.

use std::collections::HashMap;
use std::sync::Arc;

use screenbeam_common::{ConnectionId, RelayError, Role, SessionId};
use tokio::sync::RwLock;

use crate::connection::ConnectionHandle;
use crate::protocol::Outbound;

/// A broadcaster and the viewers that joined it.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub broadcaster: ConnectionHandle,
    pub viewers: HashMap<ConnectionId, ConnectionHandle>,
}

impl Session {
    pub fn viewers(&self) -> Vec<ConnectionHandle> {
        self.viewers.values().cloned().collect()
    }

    /// The targeted viewer if `target` is set, otherwise every viewer.
    pub fn viewers_or_target(&self, target: Option<&ConnectionId>) -> Vec<ConnectionHandle> {
        match target {
            Some(id) => self.viewers.get(id).cloned().into_iter().collect(),
            None => self.viewers(),
        }
    }

    /// Resolve any member (broadcaster or viewer) by identity.
    pub fn member(&self, id: &ConnectionId) -> Option<ConnectionHandle> {
        if self.broadcaster.id() == id {
            return Some(self.broadcaster.clone());
        }
        self.viewers.get(id).cloned()
    }
}

/// Thread-safe session store.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session with `conn` as its broadcaster.
    ///
    /// Fails only if `conn` already has a role.
    pub async fn create_session(&self, conn: &ConnectionHandle) -> Result<SessionId, RelayError> {
        let mut map = self.sessions.write().await;
        let mut session_id = SessionId::new();
        while map.contains_key(&session_id) {
            session_id = SessionId::new();
        }

        conn.assign(Role::Broadcaster, session_id.clone())?;
        map.insert(
            session_id.clone(),
            Session {
                id: session_id.clone(),
                broadcaster: conn.clone(),
                viewers: HashMap::new(),
            },
        );
        Ok(session_id)
    }

    pub async fn lookup_session(&self, session_id: &SessionId) -> Result<Session, RelayError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or(RelayError::SessionNotFound)
    }

    /// Add `conn` as a viewer and queue its `joined` reply. Returns the
    /// session's broadcaster.
    ///
    /// Nothing is mutated unless the session exists and `conn` is unassigned.
    /// The reply is enqueued before the lock is released, so a concurrent
    /// destroy can only queue `session-closed` behind it.
    pub async fn add_viewer(
        &self,
        session_id: &SessionId,
        conn: &ConnectionHandle,
    ) -> Result<ConnectionHandle, RelayError> {
        let mut map = self.sessions.write().await;
        let session = map.get_mut(session_id).ok_or(RelayError::SessionNotFound)?;

        conn.assign(Role::Viewer, session_id.clone())?;
        session.viewers.insert(conn.id().clone(), conn.clone());

        let joined = Outbound::Joined {
            session_id: session_id.clone(),
        };
        if let Err(e) = conn.deliver(&joined) {
            tracing::debug!(session = %session_id, error = %e, "joined not delivered");
        }
        Ok(session.broadcaster.clone())
    }

    /// Remove a viewer. Returns the broadcaster if a viewer was actually removed.
    pub async fn remove_viewer(
        &self,
        session_id: &SessionId,
        viewer_id: &ConnectionId,
    ) -> Option<ConnectionHandle> {
        let mut map = self.sessions.write().await;
        let session = map.get_mut(session_id)?;
        session
            .viewers
            .remove(viewer_id)
            .map(|_| session.broadcaster.clone())
    }

    /// Remove a session and hand back its former viewers.
    pub async fn destroy_session(&self, session_id: &SessionId) -> Vec<ConnectionHandle> {
        self.sessions
            .write()
            .await
            .remove(session_id)
            .map(|session| session.viewers.into_values().collect())
            .unwrap_or_default()
    }

    pub async fn viewer_count(&self, session_id: &SessionId) -> Option<usize> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|s| s.viewers.len())
    }

    /// Number of live sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
