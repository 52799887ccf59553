use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "gateway-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness probe: verifies the provider is configured and reachable.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.provider.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
