//! Session teardown on explicit close and on transport loss.

use screenbeam_common::{RelayError, Role, SessionId};

use crate::connection::ConnectionHandle;
use crate::protocol::Outbound;
use crate::session::SessionStore;

#[derive(Clone)]
pub struct Lifecycle {
    store: SessionStore,
}

impl Lifecycle {
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }

    /// Clean up after a connection's transport closed. Runs at most once per
    /// connection; later calls are no-ops.
    pub async fn disconnect(&self, conn: &ConnectionHandle) {
        if !conn.begin_teardown() {
            return;
        }

        let Some(session_id) = conn.session_id() else {
            return;
        };

        match conn.role() {
            Role::Broadcaster => {
                let dismissed = self.end_session(session_id).await;
                let sessions = self.store.count().await;
                tracing::info!(
                    session = %session_id,
                    viewers = dismissed,
                    sessions,
                    "Broadcaster disconnected"
                );
            }
            Role::Viewer => {
                let Some(broadcaster) = self.store.remove_viewer(session_id, conn.id()).await
                else {
                    return;
                };
                tracing::info!(session = %session_id, viewer = %conn.id(), "Viewer left");
                if broadcaster.is_open() {
                    let left = Outbound::ViewerLeft {
                        viewer_id: conn.id().clone(),
                    };
                    if let Err(e) = broadcaster.deliver(&left) {
                        tracing::debug!(session = %session_id, error = %e, "viewer-left not delivered");
                    }
                }
            }
            Role::Unassigned => {}
        }
    }

    /// Broadcaster-requested close. Viewers are dismissed, then the
    /// broadcaster gets a `closed` ack.
    pub async fn close_session(
        &self,
        broadcaster: &ConnectionHandle,
        session_id: &SessionId,
    ) -> Result<(), RelayError> {
        let dismissed = self.end_session(session_id).await;
        let sessions = self.store.count().await;
        tracing::info!(
            session = %session_id,
            viewers = dismissed,
            sessions,
            "Session closed by broadcaster"
        );
        broadcaster.deliver(&Outbound::Closed)
    }

    /// Destroy the session, tell each former viewer, then close them.
    /// Returns how many viewers were dismissed.
    async fn end_session(&self, session_id: &SessionId) -> usize {
        let viewers = self.store.destroy_session(session_id).await;
        for viewer in &viewers {
            if let Err(e) = viewer.deliver(&Outbound::SessionClosed) {
                tracing::debug!(session = %session_id, error = %e, "session-closed not delivered");
            }
            viewer.close();
        }
        viewers.len()
    }
}
