//! HTTP surface for the relay.
//!
//! Endpoints:
//! - POST /submit  - Lead intake (JSON object body)
//! - GET  /health  - Liveness probe

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::IntakeCoordinator;
use crate::domain::{IntakeError, TransportHints};

/// Bind `addr` and serve until the process stops
pub async fn serve(addr: &str, coordinator: IntakeCoordinator) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    serve_on(listener, coordinator).await
}

/// Serve on an already bound listener
pub async fn serve_on(listener: TcpListener, coordinator: IntakeCoordinator) -> Result<()> {
    let local = listener.local_addr().context("Listener has no local address")?;
    info!(%local, "Lead relay listening");

    axum::serve(
        listener,
        router(coordinator).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("HTTP server failed")
}

pub fn router(coordinator: IntakeCoordinator) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/submit", post(submit))
        .with_state(coordinator)
}

#[derive(Serialize)]
struct ApiErrorResponse {
    error: String,
}

impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorResponse {
            error: self.to_string(),
        });
        (StatusCode::BAD_REQUEST, body).into_response()
    }
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn submit(
    State(coordinator): State<IntakeCoordinator>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let raw: Value = match serde_json::from_slice(&body) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Rejected unparseable submission");
            return IntakeError::InvalidPayload(e.to_string()).into_response();
        }
    };

    let hints = transport_hints(&headers, peer);
    match coordinator.handle(raw, &hints).await {
        // The replication task is detached; dropping its handle does not stop it
        Ok(accepted) => (StatusCode::OK, Json(accepted.ack)).into_response(),
        Err(e) => e.into_response(),
    }
}

fn transport_hints(headers: &HeaderMap, peer: SocketAddr) -> TransportHints {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    TransportHints {
        forwarded_for: header("x-forwarded-for"),
        real_ip: header("x-real-ip"),
        cf_connecting_ip: header("cf-connecting-ip"),
        peer: Some(peer.ip()),
    }
}
