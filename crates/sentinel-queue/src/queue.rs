//! The abstract queue behaviors §9 calls out: enqueue, dequeue,
//! retain-on-failure, repeatable tick (§6.2, §9 "Durable queue").

use async_trait::async_trait;

use crate::error::Result;
use crate::job::{Job, JobEnvelope, QueueName};

/// Failed jobs are kept for inspection up to this many entries per queue
/// (§6.2: "retention 1000 failures").
pub const FAILURE_RETENTION: usize = 1000;

#[async_trait]
pub trait Queue: Send + Sync {
    /// Place a job on the tail of `queue`.
    async fn enqueue(&self, queue: QueueName, job: Job) -> Result<()>;

    /// Reserve and remove the next job from the head of `queue`, if any
    /// (§6.2: "completed jobs are removed" — there is no separate ack step,
    /// a job is consumed the moment it is dequeued).
    async fn dequeue(&self, queue: QueueName) -> Result<Option<JobEnvelope>>;

    /// Record a job that failed processing, bounded to [`FAILURE_RETENTION`]
    /// entries per queue; the oldest failure is dropped once the bound is
    /// exceeded.
    async fn retain_failure(&self, queue: QueueName, envelope: JobEnvelope, error: String) -> Result<()>;

    /// Number of retained failures for `queue`, for tests and operators.
    async fn failure_count(&self, queue: QueueName) -> Result<usize>;

    /// Idempotently (re-)register a single repeatable job under `name`,
    /// firing every `interval_seconds`. Implementations remove any prior
    /// registration under the same name before adding the new one (§9:
    /// "remove by key + re-add"), so calling this twice leaves exactly one
    /// registration in effect.
    async fn register_repeatable(&self, name: &str, interval_seconds: u64) -> Result<()>;
}
