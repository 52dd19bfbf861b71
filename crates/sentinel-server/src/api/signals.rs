//! Signal CRUD endpoints (§6.1).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use sentinel_core::{Logic, Scope, Signal, SignalId, UserId};

use super::AppState;
use crate::error::ApiError;
use crate::validation::{compile_definition, validate_name, validate_webhook_url};

fn default_logic() -> Logic {
    Logic::And
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct SignalRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub scope: Scope,
    #[serde(default)]
    pub window: Option<String>,
    #[serde(default = "default_logic")]
    pub logic: Logic,
    pub dsl: Vec<sentinel_core::Condition>,
    #[serde(rename = "webhookUrl")]
    pub webhook_url: String,
    #[serde(rename = "cooldownMinutes")]
    pub cooldown_minutes: u32,
    #[serde(rename = "isActive", default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListSignalsParams {
    #[serde(rename = "userId")]
    pub user_id: String,
}

fn parse_signal_id(raw: &str) -> Result<SignalId, ApiError> {
    let uuid = uuid::Uuid::parse_str(raw).map_err(|_| ApiError::NotFound)?;
    Ok(SignalId(uuid))
}

/// `POST /v1/signals`
pub async fn create_signal(State(state): State<AppState>, Json(req): Json<SignalRequest>) -> Result<impl IntoResponse, ApiError> {
    validate_name(&req.name)?;
    validate_webhook_url(&req.webhook_url)?;
    let definition = compile_definition(&req.scope, req.window.as_deref(), req.logic, &req.dsl)?;

    let now = Utc::now();
    let signal = Signal {
        id: SignalId::new(),
        user_id: UserId::from(req.user_id),
        name: req.name,
        description: req.description,
        definition,
        webhook_url: req.webhook_url,
        cooldown_minutes: req.cooldown_minutes,
        is_active: req.is_active,
        created_at: now,
        updated_at: now,
        last_evaluated_at: None,
        last_triggered_at: None,
    };

    let created = state.signals.create(signal).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /v1/signals/{id}`
pub async fn get_signal(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let id = parse_signal_id(&id)?;
    let signal = state.signals.get(id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(signal))
}

/// `GET /v1/signals?userId=...`
pub async fn list_signals(
    State(state): State<AppState>,
    Query(params): Query<ListSignalsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = UserId::from(params.user_id);
    let signals = state.signals.list_by_user(&user_id).await?;
    Ok(Json(signals))
}

/// `PUT /v1/signals/{id}` -- full replace of the mutable fields (§3 Signal).
/// Identity fields (`id`, `userId`, `createdAt`) and the trigger/evaluation
/// timestamps are preserved from the stored signal.
pub async fn update_signal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SignalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_signal_id(&id)?;
    let existing = state.signals.get(id).await?.ok_or(ApiError::NotFound)?;

    validate_name(&req.name)?;
    validate_webhook_url(&req.webhook_url)?;
    let definition = compile_definition(&req.scope, req.window.as_deref(), req.logic, &req.dsl)?;

    let updated = Signal {
        id: existing.id,
        user_id: existing.user_id,
        name: req.name,
        description: req.description,
        definition,
        webhook_url: req.webhook_url,
        cooldown_minutes: req.cooldown_minutes,
        is_active: req.is_active,
        created_at: existing.created_at,
        updated_at: Utc::now(),
        last_evaluated_at: existing.last_evaluated_at,
        last_triggered_at: existing.last_triggered_at,
    };

    let saved = state.signals.update(updated).await?;
    Ok(Json(saved))
}

/// `DELETE /v1/signals/{id}`
pub async fn delete_signal(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let id = parse_signal_id(&id)?;
    if state.signals.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}
