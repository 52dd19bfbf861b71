//! Redis-backed [`Queue`] for the durable multi-worker deployment (§9
//! "Durable queue"). Jobs live in a plain list per queue name; `dequeue`
//! reserves a job into a per-queue in-flight list via `RPOPLPUSH` before
//! handing it to the caller. The abstract [`Queue`] trait has no separate
//! completion step, so the reservation is removed from the in-flight list
//! the moment it is handed back — a worker crash between reservation and
//! processing loses the in-flight marker, which only exists so a future
//! sweep could recover it; recovery itself is out of scope here.

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::error::{QueueError, Result};
use crate::job::{JobEnvelope, Job, QueueName};
use crate::queue::{Queue, FAILURE_RETENTION};

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::from("redis://127.0.0.1:6379"),
            prefix: String::from("sentinel"),
        }
    }
}

pub struct RedisQueue {
    conn: redis::aio::ConnectionManager,
    prefix: String,
}

impl RedisQueue {
    /// # Errors
    /// Returns [`QueueError::Connection`] if the client or connection
    /// manager cannot be built.
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        Ok(Self {
            conn,
            prefix: config.prefix.clone(),
        })
    }

    fn queue_key(&self, queue: QueueName) -> String {
        format!("{}:queue:{}", self.prefix, queue.as_str())
    }

    fn inflight_key(&self, queue: QueueName) -> String {
        format!("{}:inflight:{}", self.prefix, queue.as_str())
    }

    fn failures_key(&self, queue: QueueName) -> String {
        format!("{}:failures:{}", self.prefix, queue.as_str())
    }

    fn repeatable_key(name: &str, prefix: &str) -> String {
        format!("{prefix}:repeatable:{name}")
    }
}

#[async_trait]
impl Queue for RedisQueue {
    async fn enqueue(&self, queue: QueueName, job: Job) -> Result<()> {
        let envelope = JobEnvelope::new(job);
        let payload = serde_json::to_string(&envelope).map_err(|e| QueueError::Serialization(e.to_string()))?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .lpush(self.queue_key(queue), payload)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn dequeue(&self, queue: QueueName) -> Result<Option<JobEnvelope>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn
            .rpoplpush(self.queue_key(queue), self.inflight_key(queue))
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        let envelope: JobEnvelope =
            serde_json::from_str(&payload).map_err(|e| QueueError::Serialization(e.to_string()))?;

        let _: () = conn
            .lrem(self.inflight_key(queue), 1, &payload)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;

        Ok(Some(envelope))
    }

    async fn retain_failure(&self, queue: QueueName, envelope: JobEnvelope, error: String) -> Result<()> {
        let record = serde_json::to_string(&(envelope, error)).map_err(|e| QueueError::Serialization(e.to_string()))?;
        let mut conn = self.conn.clone();
        let key = self.failures_key(queue);
        let _: () = conn.lpush(&key, record).await.map_err(|e| QueueError::Backend(e.to_string()))?;
        let cap = i64::try_from(FAILURE_RETENTION).unwrap_or(i64::MAX) - 1;
        let _: () = conn.ltrim(&key, 0, cap).await.map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn failure_count(&self, queue: QueueName) -> Result<usize> {
        let mut conn = self.conn.clone();
        let len: i64 = conn
            .llen(self.failures_key(queue))
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(usize::try_from(len).unwrap_or(0))
    }

    async fn register_repeatable(&self, name: &str, interval_seconds: u64) -> Result<()> {
        let key = Self::repeatable_key(name, &self.prefix);
        let mut conn = self.conn.clone();
        // Remove-by-key + re-add: guarantees exactly one registration survives,
        // even if a previous process crashed mid-registration (§9).
        let _: () = conn.del(&key).await.map_err(|e| QueueError::Backend(e.to_string()))?;
        let _: () = conn
            .set(&key, interval_seconds)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use super::*;

    fn test_config() -> RedisConfig {
        RedisConfig {
            url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            prefix: format!("sentinel-test-{}", uuid::Uuid::new_v4()),
        }
    }

    #[tokio::test]
    async fn enqueue_then_dequeue_round_trips() {
        let queue = RedisQueue::new(&test_config()).await.expect("connect");
        queue
            .enqueue(QueueName::Evaluation, Job::Evaluate { signal_id: sentinel_core::SignalId::new() })
            .await
            .unwrap();
        let job = queue.dequeue(QueueName::Evaluation).await.unwrap();
        assert!(job.is_some());
    }
}
