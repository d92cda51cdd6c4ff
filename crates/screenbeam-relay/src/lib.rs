//! screenbeam-relay: WebSocket signaling relay for browser screen sharing.
//!
//! One broadcaster creates a session; any number of viewers join it. The
//! relay forwards offers, answers, ICE candidates and screenshot fallbacks
//! between them so that a WebRTC peer connection can be set up directly.
//! Negotiation payloads are never inspected and no media passes through.

pub mod config;
pub mod connection;
pub mod http;
pub mod lifecycle;
pub mod protocol;
pub mod router;
pub mod server;
pub mod session;

pub use config::RelayConfig;
pub use connection::{handle_connection, ConnectionHandle, Outbox};
pub use lifecycle::Lifecycle;
pub use router::Router;
pub use session::{Session, SessionStore};
