//! Snapshot and configuration endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use pulse_core::{ApiProvider, ConnectionMethod, PulseError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::AppState;

/// Default number of points in a price history series
const DEFAULT_HISTORY_POINTS: usize = 30;

/// Upper bound on requested history points
const MAX_HISTORY_POINTS: usize = 500;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetProviderRequest {
    pub api_provider: ApiProvider,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetConnectionMethodRequest {
    pub connection_method: ConnectionMethod,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDummyDataRequest {
    pub use_dummy_data: bool,
}

/// Query parameters for price history
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Number of points (default 30)
    pub points: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub symbol: String,
    pub prices: Vec<Decimal>,
}

/// Create market routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/snapshot", get(get_snapshot))
        .route("/config", get(get_config))
        .route("/status", get(get_status))
        .route("/config/provider", post(set_provider))
        .route("/config/connection-method", post(set_connection_method))
        .route("/config/dummy-data", post(set_dummy_data))
        .route("/refresh", post(refresh))
        .route("/history/{symbol}", get(get_history))
}

async fn get_snapshot(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.hub.snapshot().as_ref().clone())
}

async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.hub.configuration())
}

async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.hub.connection_status())
}

async fn set_provider(
    State(state): State<AppState>,
    Json(body): Json<SetProviderRequest>,
) -> impl IntoResponse {
    info!("Setting API provider to {}", body.api_provider);
    let result = state.hub.set_api_provider(body.api_provider).await;
    config_response(&state, result)
}

async fn set_connection_method(
    State(state): State<AppState>,
    Json(body): Json<SetConnectionMethodRequest>,
) -> impl IntoResponse {
    info!("Setting connection method to {}", body.connection_method);
    let result = state.hub.set_connection_method(body.connection_method).await;
    config_response(&state, result)
}

async fn set_dummy_data(
    State(state): State<AppState>,
    Json(body): Json<SetDummyDataRequest>,
) -> impl IntoResponse {
    info!("Setting dummy data to {}", body.use_dummy_data);
    let result = state.hub.set_use_dummy_data(body.use_dummy_data).await;
    config_response(&state, result)
}

async fn refresh(State(state): State<AppState>) -> impl IntoResponse {
    state.hub.refresh_data().await;
    StatusCode::ACCEPTED
}

async fn get_history(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> impl IntoResponse {
    let points = params
        .points
        .unwrap_or(DEFAULT_HISTORY_POINTS)
        .clamp(1, MAX_HISTORY_POINTS);

    match state.hub.price_history(&symbol, points) {
        Some(prices) => (
            StatusCode::OK,
            Json(HistoryResponse {
                symbol: symbol.to_uppercase(),
                prices,
            }),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Unknown symbol: {}", symbol),
            }),
        )
            .into_response(),
    }
}

/// Current configuration on success, the rejection reason otherwise
fn config_response(state: &AppState, result: Result<(), PulseError>) -> axum::response::Response {
    match result {
        Ok(()) => (StatusCode::OK, Json(state.hub.configuration())).into_response(),
        Err(e) => {
            warn!("Configuration change rejected: {}", e);
            (
                error_status(&e),
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

fn error_status(error: &PulseError) -> StatusCode {
    match error {
        PulseError::Config(_) | PulseError::Unsupported(_) => StatusCode::CONFLICT,
        PulseError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        PulseError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        PulseError::Network(_) | PulseError::Api(_) | PulseError::Parse(_) => {
            StatusCode::BAD_GATEWAY
        }
        PulseError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicts_map_to_409() {
        assert_eq!(
            error_status(&PulseError::config("FINNHUB_API_KEY is not set")),
            StatusCode::CONFLICT
        );
        assert_eq!(
            error_status(&PulseError::internal("boom")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_setter_bodies_use_wire_names() {
        let body: SetProviderRequest =
            serde_json::from_str(r#"{"apiProvider":"BINANCE"}"#).unwrap();
        assert_eq!(body.api_provider, ApiProvider::Binance);

        let body: SetConnectionMethodRequest =
            serde_json::from_str(r#"{"connectionMethod":"WEBSOCKET"}"#).unwrap();
        assert_eq!(body.connection_method, ConnectionMethod::WebSocket);

        let body: SetDummyDataRequest =
            serde_json::from_str(r#"{"useDummyData":false}"#).unwrap();
        assert!(!body.use_dummy_data);
    }
}
