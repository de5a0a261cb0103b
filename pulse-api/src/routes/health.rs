//! Health check endpoints

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use pulse_core::{ConnectionState, ConnectionStatus};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    connection: ConnectionStatus,
    transport: pulse_services::TransportHealth,
}

/// Health check handler
///
/// Degraded while the transport reports an error or a class has gone stale.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let transport = state.hub.health().await;
    let connection = state.hub.connection_status();

    let stale = transport.stocks.is_stale || transport.crypto.is_stale;
    let healthy = transport.running && !stale && connection.state != ConnectionState::Error;

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        connection,
        transport,
    };

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(response))
}

/// Simple liveness check (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
}
