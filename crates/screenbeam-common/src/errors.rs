use crate::id::ConnectionId;
use crate::types::Role;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Envelope could not be parsed or names an unknown `type`.
    #[error("malformed envelope: {0}")]
    Protocol(String),

    #[error("Session not found")]
    SessionNotFound,

    #[error("{kind} is not permitted for a {role} connection")]
    RoleViolation { kind: &'static str, role: Role },

    #[error("{kind} rejected: not a member of this session")]
    NotAMember { kind: &'static str },

    #[error("send to {to} failed: {reason}")]
    Transport { to: ConnectionId, reason: String },
}

impl RelayError {
    /// Whether the error is reported back to the sending connection.
    ///
    /// Protocol errors are dropped silently and transport errors concern a
    /// recipient, not the sender.
    pub fn is_client_visible(&self) -> bool {
        matches!(
            self,
            Self::SessionNotFound | Self::RoleViolation { .. } | Self::NotAMember { .. }
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config validation error: {0}")]
    ValidationError(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
