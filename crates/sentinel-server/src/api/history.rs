//! Per-signal notification and run-log history (§6.5).

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use super::AppState;
use crate::error::ApiError;

fn default_limit() -> usize {
    50
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn parse_signal_id(raw: &str) -> Result<sentinel_core::SignalId, ApiError> {
    let uuid = uuid::Uuid::parse_str(raw).map_err(|_| ApiError::NotFound)?;
    Ok(sentinel_core::SignalId(uuid))
}

/// `GET /v1/signals/{id}/notifications`
pub async fn list_notifications(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_signal_id(&id)?;
    let records = state.notifications.list_by_signal(id, params.limit).await?;
    Ok(Json(records))
}

/// `GET /v1/signals/{id}/runs`
pub async fn list_runs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_signal_id(&id)?;
    let records = state.run_logs.list_by_signal(id, params.limit).await?;
    Ok(Json(records))
}
