//! Environment-derived configuration for both binaries in this crate
//! (§6.7 "one process each for scheduler+worker and, separately, HTTP API").

use std::time::Duration;

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Which durable queue backend the worker/scheduler process should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueBackend {
    Memory,
    Redis,
}

/// Bind address, database path, and dispatch tuning for `sentinel-server`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub database_path: String,
}

impl ServerConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_var("SENTINEL_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_owned()),
            database_path: env_var("SENTINEL_DATABASE_PATH").unwrap_or_else(|| "sentinel.db".to_owned()),
        }
    }
}

/// Configuration for the `sentinel-worker` process (scheduler + worker pool).
#[derive(Debug, Clone)]
pub struct WorkerProcessConfig {
    pub database_path: String,
    pub queue_backend: QueueBackend,
    pub redis_url: String,
    pub event_index_url: String,
    pub tick_interval: Duration,
    pub poll_interval: Duration,
    pub dispatch_timeout: Duration,
    pub dispatch_max_retries: u32,
    pub webhook_secret: Option<String>,
}

impl WorkerProcessConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let queue_backend = match env_var("SENTINEL_QUEUE_BACKEND").as_deref() {
            Some("redis") => QueueBackend::Redis,
            _ => QueueBackend::Memory,
        };

        Self {
            database_path: env_var("SENTINEL_DATABASE_PATH").unwrap_or_else(|| "sentinel.db".to_owned()),
            queue_backend,
            redis_url: env_var("SENTINEL_REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_owned()),
            event_index_url: env_var("SENTINEL_EVENT_INDEX_URL")
                .unwrap_or_else(|| "http://127.0.0.1:8090/v1/graphql".to_owned()),
            tick_interval: Duration::from_secs(env_parse("SENTINEL_TICK_INTERVAL_SECS", 30)),
            poll_interval: Duration::from_millis(env_parse("SENTINEL_POLL_INTERVAL_MS", 250)),
            dispatch_timeout: Duration::from_secs(env_parse("SENTINEL_DISPATCH_TIMEOUT_SECS", 10)),
            dispatch_max_retries: env_parse("SENTINEL_DISPATCH_MAX_RETRIES", 2),
            webhook_secret: env_var("SENTINEL_WEBHOOK_SECRET"),
        }
    }
}
