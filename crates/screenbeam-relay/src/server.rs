//! Listener setup.

use std::net::SocketAddr;

use screenbeam_common::ConfigError;
use tokio::net::TcpListener;

pub async fn bind(addr: &str) -> Result<TcpListener, ConfigError> {
    TcpListener::bind(addr).await.map_err(|source| ConfigError::Bind {
        addr: addr.to_string(),
        source,
    })
}

/// Serve `app` on `listener` until the listener fails. Each request sees
/// its peer address through `ConnectInfo`.
pub async fn serve(listener: TcpListener, app: axum::Router) -> std::io::Result<()> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}
