//! The relay's single HTTP surface: WebSocket signaling on `/`, plus
//! `GET /health` and `GET /iceServers`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::connection::handle_connection;
use crate::router;

/// One entry of the browser's `RTCConfiguration.iceServers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IceServer {
    pub urls: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(urls: String) -> Self {
        Self {
            urls,
            username: None,
            credential: None,
        }
    }

    pub fn turn(urls: String, username: String, credential: String) -> Self {
        Self {
            urls,
            username: Some(username),
            credential: Some(credential),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IceServersResponse {
    pub ice_servers: Vec<IceServer>,
}

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub signaling: router::Router,
    pub ice: Arc<IceServersResponse>,
    pub queue_depth: usize,
}

impl AppState {
    pub fn new(signaling: router::Router, ice_servers: Vec<IceServer>, queue_depth: usize) -> Self {
        Self {
            signaling,
            ice: Arc::new(IceServersResponse { ice_servers }),
            queue_depth,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(ws_handler))
        .route("/health", get(health_check))
        .route("/iceServers", get(ice_servers_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Upgrade to a signaling connection.
async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_failed_upgrade(move |e| {
        tracing::warn!(peer = %addr, error = %e, "WS upgrade failed");
    })
    .on_upgrade(move |socket| {
        handle_connection(socket, addr, state.signaling, state.queue_depth)
    })
}

async fn health_check() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn ice_servers_handler(State(state): State<AppState>) -> Json<IceServersResponse> {
    Json(state.ice.as_ref().clone())
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::session::SessionStore;

    fn app(ice_servers: Vec<IceServer>) -> Router {
        build_router(AppState::new(
            router::Router::new(SessionStore::new()),
            ice_servers,
            16,
        ))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, body) = get_json(app(Vec::new()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));
    }

    #[tokio::test]
    async fn ice_servers_stun_only() {
        let app = app(vec![IceServer::stun(
            "stun:stun.l.google.com:19302".into(),
        )]);
        let (status, body) = get_json(app, "/iceServers").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"iceServers":[{"urls":"stun:stun.l.google.com:19302"}]})
        );
    }

    #[tokio::test]
    async fn ice_servers_with_turn() {
        let app = app(vec![
            IceServer::stun("stun:stun.l.google.com:19302".into()),
            IceServer::turn(
                "turn:turn.example:3478".into(),
                "alice".into(),
                "s3cret".into(),
            ),
        ]);
        let (_, body) = get_json(app, "/iceServers").await;
        assert_eq!(
            body,
            json!({"iceServers":[
                {"urls":"stun:stun.l.google.com:19302"},
                {"urls":"turn:turn.example:3478","username":"alice","credential":"s3cret"}
            ]})
        );
    }

    #[tokio::test]
    async fn cross_origin_requests_are_allowed() {
        let response = app(Vec::new())
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "https://viewer.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&header::HeaderValue::from_static("*"))
        );
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let response = app(Vec::new())
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
