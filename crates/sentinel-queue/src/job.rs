//! The job envelope placed on a queue (§6.2).

use chrono::{DateTime, Utc};
use sentinel_core::SignalId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two named queues the scheduler and workers exchange jobs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueName {
    Evaluation,
    Scheduler,
}

impl QueueName {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Evaluation => "evaluation",
            Self::Scheduler => "scheduler",
        }
    }
}

/// A unit of work. `Evaluate` carries the signal to re-check; `SchedulerTick`
/// is the empty payload the scheduler's own repeatable job carries (§6.2:
/// "Scheduler job payload is empty").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
    Evaluate { signal_id: SignalId },
    SchedulerTick,
}

/// A job plus the bookkeeping a queue backend attaches to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub id: Uuid,
    pub job: Job,
    pub enqueued_at: DateTime<Utc>,
    pub attempts: u32,
}

impl JobEnvelope {
    #[must_use]
    pub fn new(job: Job) -> Self {
        Self {
            id: Uuid::new_v4(),
            job,
            enqueued_at: Utc::now(),
            attempts: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_serializes_with_type_tag() {
        let job = Job::Evaluate { signal_id: SignalId::new() };
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["type"], "evaluate");

        let tick = Job::SchedulerTick;
        let json = serde_json::to_value(&tick).unwrap();
        assert_eq!(json["type"], "scheduler_tick");
    }

    #[test]
    fn new_envelope_starts_at_zero_attempts() {
        let envelope = JobEnvelope::new(Job::SchedulerTick);
        assert_eq!(envelope.attempts, 0);
    }
}
