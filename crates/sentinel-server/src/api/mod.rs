//! HTTP surface for signal CRUD and history (§6.1, §6.5).

pub mod health;
pub mod history;
pub mod signals;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use sentinel_store::{NotificationStore, RunLogStore, SignalStore};
use tower_http::trace::TraceLayer;

/// Shared application state passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub signals: Arc<dyn SignalStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub run_logs: Arc<dyn RunLogStore>,
}

/// Build the Axum router with all API routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route(
            "/v1/signals",
            get(signals::list_signals).post(signals::create_signal),
        )
        .route(
            "/v1/signals/{id}",
            get(signals::get_signal)
                .put(signals::update_signal)
                .delete(signals::delete_signal),
        )
        .route("/v1/signals/{id}/notifications", get(history::list_notifications))
        .route("/v1/signals/{id}/runs", get(history::list_runs))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
