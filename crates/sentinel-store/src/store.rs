use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentinel_core::{NotificationRecord, RunLogRecord, Signal, SignalId, UserId};

use crate::error::Result;

/// Result of an optimistic compare-and-set on a signal's trigger stamp.
///
/// Mitigates the cooldown race named in the concurrency model: two
/// concurrently running workers for the same signal could both observe
/// `cooldown_elapsed() == true` and both dispatch. `compare_and_set_triggered`
/// lets a store serialize the stamp write so only one worker wins; callers
/// that ignore the result fall back to the "approximately once" behavior the
/// design accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasResult {
    Ok,
    Conflict {
        current_last_triggered_at: Option<DateTime<Utc>>,
    },
}

/// Persistence for signal definitions.
#[async_trait]
pub trait SignalStore: Send + Sync {
    async fn create(&self, signal: Signal) -> Result<Signal>;

    async fn get(&self, id: SignalId) -> Result<Option<Signal>>;

    /// Full replace of a signal's mutable fields (definition, webhook,
    /// cooldown, active flag). Identity fields (`id`, `user_id`,
    /// `created_at`) are preserved by the implementation.
    async fn update(&self, signal: Signal) -> Result<Signal>;

    async fn delete(&self, id: SignalId) -> Result<bool>;

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Signal>>;

    /// Signals the scheduler should enqueue this tick (§4.7: `is_active = true`).
    async fn list_active(&self) -> Result<Vec<Signal>>;

    /// Always stamped by the worker after an evaluation attempt, win or lose
    /// (§4.8 step 6: `last_evaluated_at` is unconditional).
    async fn stamp_evaluated(&self, id: SignalId, at: DateTime<Utc>) -> Result<()>;

    /// Stamp `last_triggered_at` only if it still matches `expected`,
    /// otherwise report the value that won the race.
    async fn compare_and_set_triggered(
        &self,
        id: SignalId,
        expected_last_triggered_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<CasResult>;
}

/// Persistence for webhook delivery attempts (§6.5).
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, record: NotificationRecord) -> Result<()>;

    async fn list_by_signal(&self, signal_id: SignalId, limit: usize) -> Result<Vec<NotificationRecord>>;
}

/// Persistence for every evaluation attempt, triggered or not (§4.8 step 6:
/// a run-log row is inserted unconditionally).
#[async_trait]
pub trait RunLogStore: Send + Sync {
    async fn insert(&self, record: RunLogRecord) -> Result<()>;

    async fn list_by_signal(&self, signal_id: SignalId, limit: usize) -> Result<Vec<RunLogRecord>>;
}
