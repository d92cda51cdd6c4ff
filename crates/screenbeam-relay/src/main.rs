//! screenbeam-relay: signaling relay for browser screen sharing.
//!
//! Pairs one broadcaster with any number of viewers per session and
//! forwards WebRTC negotiation and screenshot messages between them. Media
//! never passes through the relay.

use std::process::ExitCode;

use clap::Parser;
use screenbeam_common::ConfigError;
use screenbeam_relay::http::{self, AppState};
use screenbeam_relay::{server, RelayConfig, Router, SessionStore};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "screenbeam_relay=info".into()),
        )
        .init();

    let config = RelayConfig::parse();
    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "screenbeam-relay failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: RelayConfig) -> Result<(), ConfigError> {
    config.validate()?;

    let addr = config.listen_addr();
    let listener = server::bind(&addr).await?;

    let ice_servers = config.ice_servers();
    tracing::info!(
        addr = %addr,
        ice_servers = ice_servers.len(),
        "screenbeam-relay listening"
    );

    let state = AppState::new(
        Router::new(SessionStore::new()),
        ice_servers,
        config.outbound_queue,
    );
    let app = http::build_router(state);

    tokio::select! {
        result = server::serve(listener, app) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Server stopped");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
