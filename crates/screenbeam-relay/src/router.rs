//! Role-aware routing of inbound envelopes.
//!
//! | type               | sender      | recipients                                   |
//! |--------------------|-------------|----------------------------------------------|
//! | create-session     | unassigned  | sender (`session-created`)                   |
//! | join-session       | unassigned  | sender (`joined`), broadcaster               |
//! | offer              | broadcaster | `target` viewer, else all viewers            |
//! | answer             | viewer      | broadcaster                                  |
//! | ice-candidate      | any member  | `target` member, else the other side         |
//! | request-screenshot | viewer      | broadcaster                                  |
//! | screenshot         | broadcaster | `target` viewer, else all viewers            |
//! | close-session      | broadcaster | viewers (`session-closed`), sender (`closed`)|

use screenbeam_common::{ConnectionId, RelayError, Role, SessionId};

use crate::connection::ConnectionHandle;
use crate::lifecycle::Lifecycle;
use crate::protocol::{
    CandidatePayload, Inbound, JoinPayload, Outbound, ScreenshotPayload, SdpPayload,
};
use crate::session::{Session, SessionStore};

#[derive(Clone)]
pub struct Router {
    store: SessionStore,
    lifecycle: Lifecycle,
}

impl Router {
    pub fn new(store: SessionStore) -> Self {
        Self {
            lifecycle: Lifecycle::new(store.clone()),
            store,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Decode one text frame from `sender` and route it.
    ///
    /// Malformed envelopes are logged and dropped. Session and role errors
    /// are answered with an `error` message to the sender only.
    pub async fn dispatch(&self, sender: &ConnectionHandle, text: &str) {
        let inbound = match Inbound::parse(text) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(conn = %sender.id(), error = %e, "Dropping malformed envelope");
                return;
            }
        };

        let kind = inbound.kind();
        if let Err(e) = self.route(sender, inbound).await {
            if e.is_client_visible() {
                tracing::debug!(conn = %sender.id(), kind, error = %e, "Rejected");
                if let Err(e) = sender.deliver(&Outbound::error(&e)) {
                    tracing::debug!(conn = %sender.id(), error = %e, "Error reply not delivered");
                }
            } else {
                tracing::warn!(conn = %sender.id(), kind, error = %e, "Routing failed");
            }
        }
    }

    pub async fn route(&self, sender: &ConnectionHandle, inbound: Inbound) -> Result<(), RelayError> {
        match inbound {
            Inbound::CreateSession {} => self.create_session(sender).await,
            Inbound::JoinSession {
                session_id,
                payload,
            } => {
                self.join_session(sender, session_id, payload.unwrap_or_default())
                    .await
            }
            Inbound::Offer {
                session_id,
                payload,
            } => {
                let SdpPayload {
                    target,
                    sdp,
                    sdp_type,
                } = payload.unwrap_or_default();
                let session = self
                    .member_session(sender, &session_id, Some(Role::Broadcaster), "offer")
                    .await?;
                let recipients = session.viewers_or_target(target.as_ref());
                let msg = Outbound::Offer {
                    sdp,
                    sdp_type,
                    from: sender.id().clone(),
                };
                fan_out(sender, "offer", target.as_ref(), &recipients, &msg);
                Ok(())
            }
            Inbound::Answer {
                session_id,
                payload,
            } => {
                let SdpPayload { sdp, sdp_type, .. } = payload.unwrap_or_default();
                let session = self
                    .member_session(sender, &session_id, Some(Role::Viewer), "answer")
                    .await?;
                let msg = Outbound::Answer {
                    sdp,
                    sdp_type,
                    from: sender.id().clone(),
                };
                fan_out(sender, "answer", None, &[session.broadcaster], &msg);
                Ok(())
            }
            Inbound::IceCandidate {
                session_id,
                payload,
            } => {
                let CandidatePayload { target, candidate } = payload.unwrap_or_default();
                let session = self
                    .member_session(sender, &session_id, None, "ice-candidate")
                    .await?;
                let recipients = match (&target, sender.role()) {
                    (Some(id), _) => session.member(id).into_iter().collect(),
                    (None, Role::Broadcaster) => session.viewers(),
                    (None, _) => vec![session.broadcaster.clone()],
                };
                let msg = Outbound::IceCandidate {
                    candidate,
                    from: sender.id().clone(),
                };
                fan_out(sender, "ice-candidate", target.as_ref(), &recipients, &msg);
                Ok(())
            }
            Inbound::RequestScreenshot { session_id } => {
                let session = self
                    .member_session(sender, &session_id, Some(Role::Viewer), "request-screenshot")
                    .await?;
                let msg = Outbound::RequestScreenshot {
                    from: sender.id().clone(),
                };
                fan_out(sender, "request-screenshot", None, &[session.broadcaster], &msg);
                Ok(())
            }
            Inbound::Screenshot {
                session_id,
                payload,
            } => {
                let ScreenshotPayload {
                    target,
                    data_url,
                    meta,
                } = payload.unwrap_or_default();
                let session = self
                    .member_session(sender, &session_id, Some(Role::Broadcaster), "screenshot")
                    .await?;
                let recipients = session.viewers_or_target(target.as_ref());
                let msg = Outbound::Screenshot {
                    data_url,
                    meta,
                    from: sender.id().clone(),
                };
                fan_out(sender, "screenshot", target.as_ref(), &recipients, &msg);
                Ok(())
            }
            Inbound::CloseSession { session_id } => {
                self.member_session(sender, &session_id, Some(Role::Broadcaster), "close-session")
                    .await?;
                self.lifecycle.close_session(sender, &session_id).await
            }
        }
    }

    async fn create_session(&self, sender: &ConnectionHandle) -> Result<(), RelayError> {
        let role = sender.role();
        if role != Role::Unassigned {
            return Err(RelayError::RoleViolation {
                kind: "create-session",
                role,
            });
        }

        let session_id = self.store.create_session(sender).await?;
        let sessions = self.store.count().await;
        tracing::info!(
            session = %session_id,
            broadcaster = %sender.id(),
            sessions,
            "Session created"
        );
        sender.deliver(&Outbound::SessionCreated { session_id })
    }

    async fn join_session(
        &self,
        sender: &ConnectionHandle,
        session_id: SessionId,
        payload: JoinPayload,
    ) -> Result<(), RelayError> {
        self.store.lookup_session(&session_id).await?;

        let role = sender.role();
        if role != Role::Unassigned {
            return Err(RelayError::RoleViolation {
                kind: "join-session",
                role,
            });
        }

        // `joined` is queued by the store before the lock is released.
        let broadcaster = self.store.add_viewer(&session_id, sender).await?;
        tracing::info!(session = %session_id, viewer = %sender.id(), "Viewer joined");

        let joined = Outbound::ViewerJoined {
            viewer_id: sender.id().clone(),
            is_mobile: payload.is_mobile,
        };
        fan_out(sender, "viewer-joined", None, &[broadcaster], &joined);
        Ok(())
    }

    /// Resolve the session and check that `sender` may act in it.
    ///
    /// `required` of `None` accepts either member role.
    async fn member_session(
        &self,
        sender: &ConnectionHandle,
        session_id: &SessionId,
        required: Option<Role>,
        kind: &'static str,
    ) -> Result<Session, RelayError> {
        let session = self.store.lookup_session(session_id).await?;

        let role = sender.role();
        let permitted = match required {
            Some(required) => role == required,
            None => role != Role::Unassigned,
        };
        if !permitted {
            return Err(RelayError::RoleViolation { kind, role });
        }
        if sender.session_id() != Some(session_id) {
            return Err(RelayError::NotAMember { kind });
        }
        Ok(session)
    }
}

/// Send `msg` to each recipient. A failed send is logged and does not stop
/// delivery to the rest.
fn fan_out(
    sender: &ConnectionHandle,
    kind: &'static str,
    target: Option<&ConnectionId>,
    recipients: &[ConnectionHandle],
    msg: &Outbound,
) {
    if recipients.is_empty() {
        match target {
            Some(id) => tracing::warn!(from = %sender.id(), kind, wanted = %id, "Target not in session"),
            None => tracing::debug!(from = %sender.id(), kind, "No recipients"),
        }
        return;
    }

    let json = match msg.to_json() {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(from = %sender.id(), kind, error = %e, "Failed to serialize");
            return;
        }
    };

    for recipient in recipients {
        match recipient.send_text(json.clone()) {
            Ok(()) => tracing::debug!(from = %sender.id(), to = %recipient.id(), kind, "Forwarded"),
            Err(e) => tracing::warn!(from = %sender.id(), kind, error = %e, "Send failed"),
        }
    }
}
