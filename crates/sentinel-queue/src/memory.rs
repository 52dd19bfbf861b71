//! In-process queue backed by `tokio::sync::Mutex<VecDeque<_>>`, for tests
//! and for running the whole service single-process without Redis.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::job::{Job, JobEnvelope, QueueName};
use crate::queue::{Queue, FAILURE_RETENTION};

#[derive(Default)]
pub struct MemoryQueue {
    evaluation: Mutex<VecDeque<JobEnvelope>>,
    scheduler: Mutex<VecDeque<JobEnvelope>>,
    failures: Mutex<HashMap<&'static str, VecDeque<(JobEnvelope, String)>>>,
    repeatable: Mutex<HashMap<String, u64>>,
}

impl MemoryQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lane(&self, queue: QueueName) -> &Mutex<VecDeque<JobEnvelope>> {
        match queue {
            QueueName::Evaluation => &self.evaluation,
            QueueName::Scheduler => &self.scheduler,
        }
    }
}

#[async_trait]
impl Queue for MemoryQueue {
    async fn enqueue(&self, queue: QueueName, job: Job) -> Result<()> {
        self.lane(queue).lock().await.push_back(JobEnvelope::new(job));
        Ok(())
    }

    async fn dequeue(&self, queue: QueueName) -> Result<Option<JobEnvelope>> {
        Ok(self.lane(queue).lock().await.pop_front())
    }

    async fn retain_failure(&self, queue: QueueName, envelope: JobEnvelope, error: String) -> Result<()> {
        let mut failures = self.failures.lock().await;
        let entries = failures.entry(queue.as_str()).or_default();
        entries.push_back((envelope, error));
        while entries.len() > FAILURE_RETENTION {
            entries.pop_front();
        }
        Ok(())
    }

    async fn failure_count(&self, queue: QueueName) -> Result<usize> {
        Ok(self
            .failures
            .lock()
            .await
            .get(queue.as_str())
            .map_or(0, VecDeque::len))
    }

    async fn register_repeatable(&self, name: &str, interval_seconds: u64) -> Result<()> {
        let mut repeatable = self.repeatable.lock().await;
        repeatable.remove(name);
        repeatable.insert(name.to_owned(), interval_seconds);
        Ok(())
    }
}
