//! Signaling wire protocol.
//!
//! Every frame is a JSON envelope `{type, sessionId?, payload?}`. Inbound
//! envelopes are validated once, here; anything that does not match one of
//! the known shapes is a protocol error and never reaches the router.
//! Negotiation blobs (`sdp`, `candidate`, `dataUrl`, `meta`) stay opaque
//! `serde_json::Value`s and are forwarded untouched.

use screenbeam_common::{ConnectionId, RelayError, SessionId};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Messages clients send to the relay.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Inbound {
    CreateSession {},

    #[serde(rename_all = "camelCase")]
    JoinSession {
        session_id: SessionId,
        #[serde(default)]
        payload: Option<JoinPayload>,
    },

    #[serde(rename_all = "camelCase")]
    Offer {
        session_id: SessionId,
        #[serde(default)]
        payload: Option<SdpPayload>,
    },

    #[serde(rename_all = "camelCase")]
    Answer {
        session_id: SessionId,
        #[serde(default)]
        payload: Option<SdpPayload>,
    },

    #[serde(rename_all = "camelCase")]
    IceCandidate {
        session_id: SessionId,
        #[serde(default)]
        payload: Option<CandidatePayload>,
    },

    #[serde(rename_all = "camelCase")]
    RequestScreenshot { session_id: SessionId },

    #[serde(rename_all = "camelCase")]
    Screenshot {
        session_id: SessionId,
        #[serde(default)]
        payload: Option<ScreenshotPayload>,
    },

    #[serde(rename_all = "camelCase")]
    CloseSession { session_id: SessionId },
}

impl Inbound {
    pub fn parse(text: &str) -> Result<Self, RelayError> {
        serde_json::from_str(text).map_err(|e| RelayError::Protocol(e.to_string()))
    }

    /// Wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateSession {} => "create-session",
            Self::JoinSession { .. } => "join-session",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
            Self::RequestScreenshot { .. } => "request-screenshot",
            Self::Screenshot { .. } => "screenshot",
            Self::CloseSession { .. } => "close-session",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub is_mobile: Option<bool>,
}

/// Payload of `offer` and `answer`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdpPayload {
    #[serde(default, deserialize_with = "non_empty_target")]
    pub target: Option<ConnectionId>,
    pub sdp: Option<Value>,
    pub sdp_type: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatePayload {
    #[serde(default, deserialize_with = "non_empty_target")]
    pub target: Option<ConnectionId>,
    pub candidate: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotPayload {
    #[serde(default, deserialize_with = "non_empty_target")]
    pub target: Option<ConnectionId>,
    pub data_url: Option<Value>,
    pub meta: Option<Value>,
}

/// An empty `target` addresses nobody in particular: treat it as absent.
fn non_empty_target<'de, D>(deserializer: D) -> Result<Option<ConnectionId>, D::Error>
where
    D: Deserializer<'de>,
{
    let target = Option::<ConnectionId>::deserialize(deserializer)?;
    Ok(target.filter(|id| !id.as_str().is_empty()))
}

/// Messages the relay sends to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Outbound {
    #[serde(rename_all = "camelCase")]
    SessionCreated { session_id: SessionId },

    #[serde(rename_all = "camelCase")]
    Joined { session_id: SessionId },

    #[serde(rename_all = "camelCase")]
    ViewerJoined {
        viewer_id: ConnectionId,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_mobile: Option<bool>,
    },

    #[serde(rename_all = "camelCase")]
    ViewerLeft { viewer_id: ConnectionId },

    #[serde(rename_all = "camelCase")]
    Offer {
        #[serde(skip_serializing_if = "Option::is_none")]
        sdp: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        sdp_type: Option<Value>,
        from: ConnectionId,
    },

    #[serde(rename_all = "camelCase")]
    Answer {
        #[serde(skip_serializing_if = "Option::is_none")]
        sdp: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        sdp_type: Option<Value>,
        from: ConnectionId,
    },

    IceCandidate {
        #[serde(skip_serializing_if = "Option::is_none")]
        candidate: Option<Value>,
        from: ConnectionId,
    },

    RequestScreenshot { from: ConnectionId },

    #[serde(rename_all = "camelCase")]
    Screenshot {
        #[serde(skip_serializing_if = "Option::is_none")]
        data_url: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        meta: Option<Value>,
        from: ConnectionId,
    },

    SessionClosed,

    Closed,

    Error { message: String },
}

impl Outbound {
    pub fn error(err: &RelayError) -> Self {
        Self::Error {
            message: err.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
