//! HTTP API and background worker process for Sentinel (§6.7).

pub mod api;
pub mod config;
pub mod error;
pub mod validation;

pub use api::{router, AppState};
pub use config::{QueueBackend, ServerConfig, WorkerProcessConfig};
pub use error::ApiError;
