//! Durable job queue abstraction (§6.2, §9 "Durable queue"): an in-memory
//! implementation for tests and single-process deployments, and a
//! Redis-backed implementation for durable multi-worker deployments.

pub mod error;
pub mod job;
pub mod memory;
pub mod queue;
pub mod redis;

pub use error::{QueueError, Result};
pub use job::{Job, JobEnvelope, QueueName};
pub use memory::MemoryQueue;
pub use queue::{Queue, FAILURE_RETENTION};
pub use redis::{RedisConfig, RedisQueue};
