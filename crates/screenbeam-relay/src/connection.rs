//! Per-connection state and the WebSocket task that drives it.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use screenbeam_common::{ConnectionId, RelayError, Role, SessionId};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::protocol::Outbound;
use crate::router::Router;

/// Non-owning reference to a live connection.
///
/// The transport task owns the socket; everything else (the session store,
/// other connections' routers) only holds this handle, which can queue
/// frames and request a close.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    id: ConnectionId,
    tx: mpsc::Sender<String>,
    close: CancellationToken,
    /// Role and session, set once by the session store.
    assignment: OnceLock<(Role, SessionId)>,
    torn_down: AtomicBool,
}

/// Receiving half of a connection's outbound queue, owned by its transport task.
#[derive(Debug)]
pub struct Outbox {
    pub rx: mpsc::Receiver<String>,
    pub closed: CancellationToken,
}

impl ConnectionHandle {
    /// Open a connection with a freshly minted identity.
    pub fn open(queue_depth: usize) -> (Self, Outbox) {
        Self::with_id(ConnectionId::new(), queue_depth)
    }

    pub fn with_id(id: ConnectionId, queue_depth: usize) -> (Self, Outbox) {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let close = CancellationToken::new();
        let handle = Self {
            inner: Arc::new(Inner {
                id,
                tx,
                close: close.clone(),
                assignment: OnceLock::new(),
                torn_down: AtomicBool::new(false),
            }),
        };
        (handle, Outbox { rx, closed: close })
    }

    pub fn id(&self) -> &ConnectionId {
        &self.inner.id
    }

    pub fn role(&self) -> Role {
        self.inner
            .assignment
            .get()
            .map(|(role, _)| *role)
            .unwrap_or_default()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.inner.assignment.get().map(|(_, sid)| sid)
    }

    /// Record the connection's role and session. Write-once.
    pub fn assign(&self, role: Role, session_id: SessionId) -> Result<(), RelayError> {
        let kind = match role {
            Role::Broadcaster => "create-session",
            _ => "join-session",
        };
        let current = self.role();
        if role == Role::Unassigned {
            return Err(RelayError::RoleViolation {
                kind,
                role: current,
            });
        }
        self.inner
            .assignment
            .set((role, session_id))
            .map_err(|_| RelayError::RoleViolation {
                kind,
                role: current,
            })
    }

    /// Serialize and queue a message without waiting.
    pub fn deliver(&self, msg: &Outbound) -> Result<(), RelayError> {
        let json = msg.to_json().map_err(|e| RelayError::Transport {
            to: self.id().clone(),
            reason: e.to_string(),
        })?;
        self.send_text(json)
    }

    /// Queue an already serialized frame without waiting.
    pub fn send_text(&self, json: String) -> Result<(), RelayError> {
        self.inner.tx.try_send(json).map_err(|e| {
            let reason = match e {
                TrySendError::Full(_) => "outbound queue full",
                TrySendError::Closed(_) => "connection closed",
            };
            RelayError::Transport {
                to: self.id().clone(),
                reason: reason.into(),
            }
        })
    }

    /// Ask the transport task to flush queued frames and close the socket.
    pub fn close(&self) {
        self.inner.close.cancel();
    }

    pub fn is_open(&self) -> bool {
        !self.inner.tx.is_closed() && !self.inner.close.is_cancelled()
    }

    /// Returns true the first time only; guards disconnect cleanup.
    pub fn begin_teardown(&self) -> bool {
        !self.inner.torn_down.swap(true, Ordering::AcqRel)
    }
}

/// Handle a single upgraded WebSocket until either side closes it.
pub async fn handle_connection(
    socket: WebSocket,
    addr: SocketAddr,
    router: Router,
    queue_depth: usize,
) {
    let (conn, outbox) = ConnectionHandle::open(queue_depth);
    let Outbox { mut rx, closed } = outbox;
    let (mut sink, mut stream) = socket.split();

    tracing::info!(peer = %addr, conn = %conn.id(), "Client connected");

    loop {
        tokio::select! {
            biased;

            // Queued frames for this client → its WebSocket
            Some(frame) = rx.recv() => {
                if sink.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }

            // Relay-initiated close: flush, then send a Close frame.
            _ = closed.cancelled() => {
                while let Ok(frame) = rx.try_recv() {
                    if sink.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                let _ = sink.send(Message::Close(None)).await;
                tracing::debug!(conn = %conn.id(), "Closed by relay");
                break;
            }

            // Frames from this client → router
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        router.dispatch(&conn, text.as_str()).await;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        tracing::warn!(conn = %conn.id(), "Dropping binary frame");
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %addr, error = %e, "WS error");
                        break;
                    }
                    // Pings are answered by the WebSocket layer.
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                }
            }
        }
    }

    tracing::info!(
        peer = %addr,
        conn = %conn.id(),
        role = %conn.role(),
        "Client disconnected"
    );

    router.lifecycle().disconnect(&conn).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_connection_is_unassigned() {
        let (conn, _outbox) = ConnectionHandle::open(8);
        assert_eq!(conn.role(), Role::Unassigned);
        assert!(conn.session_id().is_none());
        assert!(conn.is_open());
    }

    #[test]
    fn assignment_is_write_once() {
        let (conn, _outbox) = ConnectionHandle::open(8);
        let sid = SessionId::new();
        conn.assign(Role::Viewer, sid.clone()).unwrap();
        assert_eq!(conn.role(), Role::Viewer);
        assert_eq!(conn.session_id(), Some(&sid));

        let err = conn.assign(Role::Broadcaster, SessionId::new()).unwrap_err();
        assert!(matches!(
            err,
            RelayError::RoleViolation {
                kind: "create-session",
                role: Role::Viewer
            }
        ));
        assert_eq!(conn.role(), Role::Viewer);
        assert_eq!(conn.session_id(), Some(&sid));
    }

    #[test]
    fn cannot_assign_unassigned() {
        let (conn, _outbox) = ConnectionHandle::open(8);
        assert!(conn.assign(Role::Unassigned, SessionId::new()).is_err());
        assert_eq!(conn.role(), Role::Unassigned);
    }

    #[tokio::test]
    async fn deliver_queues_serialized_frame() {
        let (conn, mut outbox) = ConnectionHandle::with_id(ConnectionId::from("A"), 8);
        conn.deliver(&Outbound::Closed).unwrap();
        let frame = outbox.rx.recv().await.unwrap();
        assert_eq!(frame, r#"{"type":"closed"}"#);
    }

    #[test]
    fn full_queue_is_a_transport_error() {
        let (conn, _outbox) = ConnectionHandle::open(1);
        conn.deliver(&Outbound::Closed).unwrap();
        let err = conn.deliver(&Outbound::Closed).unwrap_err();
        assert!(matches!(err, RelayError::Transport { .. }));
        assert!(err.to_string().contains("outbound queue full"));
    }

    #[test]
    fn dropped_outbox_is_a_transport_error() {
        let (conn, outbox) = ConnectionHandle::open(4);
        drop(outbox);
        assert!(!conn.is_open());
        let err = conn.deliver(&Outbound::SessionClosed).unwrap_err();
        assert!(err.to_string().contains("connection closed"));
    }

    #[test]
    fn close_signals_outbox() {
        let (conn, outbox) = ConnectionHandle::open(4);
        assert!(!outbox.closed.is_cancelled());
        conn.close();
        assert!(outbox.closed.is_cancelled());
        assert!(!conn.is_open());
    }

    #[test]
    fn teardown_runs_once() {
        let (conn, _outbox) = ConnectionHandle::open(4);
        let clone = conn.clone();
        assert!(conn.begin_teardown());
        assert!(!clone.begin_teardown());
        assert!(!conn.begin_teardown());
    }
}
