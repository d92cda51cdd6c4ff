//! Command-line and environment configuration.

use clap::Parser;
use screenbeam_common::ConfigError;

use crate::http::IceServer;

pub const DEFAULT_STUN_URL: &str = "stun:stun.l.google.com:19302";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "screenbeam-relay",
    version,
    about = "WebRTC signaling relay for screen sharing sessions"
)]
pub struct RelayConfig {
    /// Interface to bind.
    #[arg(long, default_value = "0.0.0.0", env = "RELAY_HOST")]
    pub host: String,

    /// Port serving the signaling WebSocket, /health and /iceServers.
    #[arg(short, long, default_value_t = 3000, env = "PORT")]
    pub port: u16,

    /// STUN servers (comma-separated)
    #[arg(
        long,
        value_delimiter = ',',
        default_value = DEFAULT_STUN_URL,
        env = "STUN_URLS"
    )]
    pub stun_urls: Vec<String>,

    #[arg(long, env = "TURN_URL")]
    pub turn_url: Option<String>,

    #[arg(long, env = "TURN_USER")]
    pub turn_user: Option<String>,

    #[arg(long, env = "TURN_PASS", hide_env_values = true)]
    pub turn_pass: Option<String>,

    /// Frames buffered per connection before sends to it start failing.
    #[arg(long, default_value_t = 256)]
    pub outbound_queue: usize,
}

impl RelayConfig {
    /// Check the whole configuration, reporting every problem at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.outbound_queue == 0 {
            problems.push("outbound-queue must be at least 1".to_string());
        }
        if self.stun_list().is_empty() {
            problems.push("at least one STUN url is required".to_string());
        }
        if self.host.trim().is_empty() {
            problems.push("host must not be empty".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationError(problems.join("; ")))
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn stun_list(&self) -> Vec<&str> {
        self.stun_urls
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .collect()
    }

    /// ICE servers handed to clients: every STUN url, then TURN if fully configured.
    pub fn ice_servers(&self) -> Vec<IceServer> {
        let mut servers: Vec<IceServer> = self
            .stun_list()
            .into_iter()
            .map(|url| IceServer::stun(url.to_string()))
            .collect();

        match (
            non_empty(&self.turn_url),
            non_empty(&self.turn_user),
            non_empty(&self.turn_pass),
        ) {
            (Some(url), Some(user), Some(pass)) => {
                servers.push(IceServer::turn(url.into(), user.into(), pass.into()));
            }
            (None, None, None) => {}
            (url, user, pass) => {
                tracing::warn!(
                    turn_url = url.is_some(),
                    turn_user = user.is_some(),
                    turn_pass = pass.is_some(),
                    "Incomplete TURN configuration; TURN server not advertised"
                );
            }
        }

        servers
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}
