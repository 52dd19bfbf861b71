//! The scheduler/worker loop (C7/C8, §4.7-4.8): periodic enumeration of
//! active signals, and the per-job evaluate-cooldown-dispatch-audit pipeline.

pub mod describe;
pub mod error;
pub mod scheduler;
pub mod worker;

pub use describe::describe_conditions;
pub use error::WorkerError;
pub use scheduler::{Scheduler, SchedulerConfig};
pub use worker::{Worker, WorkerConfig};
