//! C7 Scheduler (§4.7): enumerates active signals on a fixed cadence and
//! enqueues one evaluation job per signal.

use std::sync::Arc;
use std::time::Duration;

use sentinel_queue::{Job, Queue, QueueName};
use sentinel_store::SignalStore;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

/// Name the repeatable tick job is registered under (§9 "Durable queue").
const SCHEDULER_JOB_NAME: &str = "scheduler-tick";

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(30),
        }
    }
}

/// Process-wide periodic driver (§4.7). One instance per cluster; the
/// repeatable-tick registration is idempotent so a restart never produces a
/// second registration.
pub struct Scheduler<St, Qu> {
    store: Arc<St>,
    queue: Arc<Qu>,
    config: SchedulerConfig,
}

impl<St, Qu> Scheduler<St, Qu>
where
    St: SignalStore,
    Qu: Queue,
{
    pub fn new(store: Arc<St>, queue: Arc<Qu>, config: SchedulerConfig) -> Self {
        Self { store, queue, config }
    }

    /// Register the repeatable tick and drive it until `shutdown` fires.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        if let Err(e) = self
            .queue
            .register_repeatable(SCHEDULER_JOB_NAME, self.config.tick_interval.as_secs())
            .await
        {
            error!(error = %e, "failed to register scheduler tick");
        }

        info!(interval_secs = self.config.tick_interval.as_secs(), "scheduler starting");
        let mut ticker = tokio::time::interval(self.config.tick_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler received shutdown signal");
                        break;
                    }
                }
            }
        }
    }

    /// Enumerate every `is_active = true` signal and enqueue one evaluation
    /// job per signal (§4.7).
    #[instrument(skip(self))]
    async fn tick(&self) {
        let signals = match self.store.list_active().await {
            Ok(signals) => signals,
            Err(e) => {
                error!(error = %e, "failed to list active signals");
                return;
            }
        };

        debug!(count = signals.len(), "scheduler tick enqueuing evaluation jobs");
        for signal in signals {
            let job = Job::Evaluate { signal_id: signal.id };
            if let Err(e) = self.queue.enqueue(QueueName::Evaluation, job).await {
                error!(signal_id = %signal.id, error = %e, "failed to enqueue evaluation job");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sentinel_core::ast::CompiledAst;
    use sentinel_core::condition::Logic;
    use sentinel_core::scope::Scope;
    use sentinel_core::signal::StoredDefinition;
    use sentinel_core::{ChainId, Signal, SignalId, UserId};
    use sentinel_queue::MemoryQueue;
    use sentinel_store::MemorySignalStore;

    fn signal(is_active: bool) -> Signal {
        let now = Utc::now();
        Signal {
            id: SignalId::new(),
            user_id: UserId::from("u1"),
            name: "test".into(),
            description: None,
            definition: StoredDefinition {
                version: 1,
                scope: Scope {
                    chain_ids: vec![ChainId(1)],
                    market_ids: None,
                    addresses: None,
                    protocol_tag: None,
                },
                window: None,
                logic: Logic::And,
                dsl: vec![],
                ast: CompiledAst { logic: Logic::And, conditions: vec![] },
            },
            webhook_url: "https://example.com/hook".into(),
            cooldown_minutes: 10,
            is_active,
            created_at: now,
            updated_at: now,
            last_evaluated_at: None,
            last_triggered_at: None,
        }
    }

    #[tokio::test]
    async fn tick_enqueues_one_job_per_active_signal() {
        let store = Arc::new(MemorySignalStore::new());
        let queue = Arc::new(MemoryQueue::new());
        store.create(signal(true)).await.unwrap();
        store.create(signal(true)).await.unwrap();
        store.create(signal(false)).await.unwrap();

        let scheduler = Scheduler::new(store, queue.clone(), SchedulerConfig::default());
        scheduler.tick().await;

        assert!(queue.dequeue(QueueName::Evaluation).await.unwrap().is_some());
        assert!(queue.dequeue(QueueName::Evaluation).await.unwrap().is_some());
        assert!(queue.dequeue(QueueName::Evaluation).await.unwrap().is_none());
    }
}
