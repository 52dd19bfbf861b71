//! Liveness/readiness endpoints (§6.7).

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use super::AppState;

/// `GET /health` -- always returns 200 once the process is up.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `GET /ready` -- 200 only once the store answers a real query.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    match state.signals.list_active().await {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({ "status": "ready" }))),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "not ready", "error": e.to_string() })),
        ),
    }
}
