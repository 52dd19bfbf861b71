//! C8 Worker (§4.8): dequeues evaluation jobs, loads the signal, runs the
//! evaluator, applies cooldown, dispatches the webhook, and records the
//! audit rows.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sentinel_core::{ChainId, NotificationRecord, NotificationStatus, RunLogRecord, Signal, SignalId};
use sentinel_queue::{Job, Queue, QueueName};
use sentinel_rules::{evaluate_signal, DataFetcher, EvaluationContext, SignalEvalResult};
use sentinel_store::{CasResult, NotificationStore, RunLogStore, SignalStore};
use sentinel_webhook::{DispatchConfig, PayloadContext, PayloadScope, WebhookDispatcher, WebhookPayload};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::describe::describe_conditions;
use crate::error::WorkerError;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How long to sleep after finding an empty queue before polling again.
    pub poll_interval: Duration,
    pub dispatch: DispatchConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            dispatch: DispatchConfig::default(),
        }
    }
}

/// One worker in the pool (§4.8 "a Worker pool consuming the queue
/// concurrently with bounded parallelism"). A single job runs to
/// completion within one worker.
pub struct Worker {
    signals: Arc<dyn SignalStore>,
    notifications: Arc<dyn NotificationStore>,
    run_logs: Arc<dyn RunLogStore>,
    queue: Arc<dyn Queue>,
    fetcher: Arc<dyn DataFetcher>,
    dispatcher: WebhookDispatcher,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(
        signals: Arc<dyn SignalStore>,
        notifications: Arc<dyn NotificationStore>,
        run_logs: Arc<dyn RunLogStore>,
        queue: Arc<dyn Queue>,
        fetcher: Arc<dyn DataFetcher>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            signals,
            notifications,
            run_logs,
            queue,
            fetcher,
            dispatcher: WebhookDispatcher::new(),
            config,
        }
    }

    /// Poll the evaluation queue until `shutdown` fires.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("worker starting");
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("worker received shutdown signal");
                        break;
                    }
                }
                dequeued = self.queue.dequeue(QueueName::Evaluation) => {
                    match dequeued {
                        Ok(Some(envelope)) => self.process(envelope).await,
                        Ok(None) => tokio::time::sleep(self.config.poll_interval).await,
                        Err(e) => {
                            error!(error = %e, "failed to dequeue evaluation job");
                            tokio::time::sleep(self.config.poll_interval).await;
                        }
                    }
                }
            }
        }
    }

    async fn process(&self, envelope: sentinel_queue::JobEnvelope) {
        let Job::Evaluate { signal_id } = envelope.job else {
            return;
        };

        if let Err(e) = self.process_evaluate(signal_id).await {
            warn!(signal_id = %signal_id, error = %e, "evaluation job failed, retaining for inspection");
            if let Err(qe) = self.queue.retain_failure(QueueName::Evaluation, envelope, e.to_string()).await {
                error!(error = %qe, "failed to retain failed evaluation job");
            }
        }
    }

    #[instrument(skip(self), fields(signal_id = %signal_id))]
    async fn process_evaluate(&self, signal_id: SignalId) -> Result<(), WorkerError> {
        let Some(signal) = self.signals.get(signal_id).await? else {
            debug!("signal no longer exists, skipping");
            return Ok(());
        };
        if !signal.is_active {
            debug!("signal is inactive, skipping");
            return Ok(());
        }

        let now = Utc::now();
        let ctx = build_context(&signal, now)?;
        let result = evaluate_signal(&signal.definition.ast, &ctx, self.fetcher.as_ref(), now).await;

        if result.conclusive && result.triggered && signal.cooldown_elapsed(now) {
            self.dispatch_and_record(&signal, &result, now).await?;
        }

        self.signals.stamp_evaluated(signal.id, now).await?;
        self.run_logs
            .insert(RunLogRecord {
                id: Uuid::new_v4(),
                signal_id: signal.id,
                triggered: result.triggered,
                conclusive: result.conclusive,
                error: result.error.clone(),
                evaluated_at: now,
            })
            .await?;

        Ok(())
    }

    /// Dispatch the webhook and write the notification row. `last_triggered_at`
    /// only advances on a successful dispatch (§4.8 step 4); the notification
    /// row is written regardless of dispatch outcome.
    async fn dispatch_and_record(&self, signal: &Signal, result: &SignalEvalResult, now: DateTime<Utc>) -> Result<(), WorkerError> {
        let conditions_met = describe_conditions(&signal.definition.ast.conditions, result.triggered);
        let chain_id = signal.definition.scope.chain_ids.first().copied();
        let payload = WebhookPayload {
            signal_id: signal.id,
            signal_name: signal.name.clone(),
            triggered_at: now,
            scope: PayloadScope::from(&signal.definition.scope),
            conditions_met: conditions_met.clone(),
            context: PayloadContext {
                app_user_id: signal.user_id.to_string(),
                address: None,
                market_id: None,
                chain_id,
            },
        };

        let outcome = self.dispatcher.dispatch(&signal.webhook_url, &payload, &self.config.dispatch).await;

        if outcome.success {
            match self.signals.compare_and_set_triggered(signal.id, signal.last_triggered_at, now).await? {
                CasResult::Ok => {}
                CasResult::Conflict { .. } => {
                    debug!("last_triggered_at already advanced by a concurrent worker");
                }
            }
        }

        let status = if outcome.success { NotificationStatus::Delivered } else { NotificationStatus::Failed };
        self.notifications
            .insert(NotificationRecord {
                id: Uuid::new_v4(),
                signal_id: signal.id,
                status,
                webhook_status: outcome.status,
                error: outcome.error,
                retry_count: outcome.attempts.saturating_sub(1),
                duration_ms: outcome.duration_ms,
                conditions_met,
                created_at: now,
            })
            .await?;

        Ok(())
    }
}

fn build_context(signal: &Signal, now: DateTime<Utc>) -> Result<EvaluationContext, WorkerError> {
    let chain_id: ChainId = signal
        .definition
        .scope
        .chain_ids
        .first()
        .copied()
        .ok_or_else(|| WorkerError::Eval("signal scope declares no chain id".into()))?;
    let now_ms = now.timestamp_millis();
    let window_ms = match &signal.definition.window {
        Some(w) => sentinel_core::parse_duration(w).map_err(|e| WorkerError::Eval(e.to_string()))?,
        None => 0,
    };
    Ok(EvaluationContext {
        chain_id,
        now_ms,
        window_start_ms: now_ms - window_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sentinel_core::ast::CompiledAst;
    use sentinel_core::condition::{ComparisonOperator, Logic};
    use sentinel_core::expr::{EventAggregation, ExpressionNode, StateEntity};
    use sentinel_core::filter::Filter;
    use sentinel_core::scope::Scope;
    use sentinel_core::signal::StoredDefinition;
    use sentinel_core::{CompiledCondition, SentinelError, Simple, UserId};
    use sentinel_queue::MemoryQueue;
    use sentinel_store::{MemoryNotificationStore, MemoryRunLogStore, MemorySignalStore};

    struct ConstantFetcher(f64);

    #[async_trait]
    impl DataFetcher for ConstantFetcher {
        async fn fetch_state(
            &self,
            _entity: StateEntity,
            _filters: &[Filter],
            _field: &str,
            _timestamp: Option<i64>,
        ) -> Result<f64, SentinelError> {
            Ok(self.0)
        }

        async fn fetch_events(
            &self,
            _event_type: &str,
            _filters: &[Filter],
            _field: &str,
            _aggregation: EventAggregation,
            _start_ms: i64,
            _end_ms: i64,
        ) -> Result<f64, SentinelError> {
            Ok(self.0)
        }
    }

    fn signal_with(threshold: f64, cooldown_minutes: u32, last_triggered_at: Option<DateTime<Utc>>) -> Signal {
        let now = Utc::now();
        Signal {
            id: SignalId::new(),
            user_id: UserId::from("u1"),
            name: "whale watch".into(),
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
                ast: CompiledAst {
                    logic: Logic::And,
                    conditions: vec![CompiledCondition::Simple(Simple {
                        left: ExpressionNode::StateRef {
                            entity: StateEntity::Market,
                            filters: vec![],
                            field: "totalBorrowAssets".into(),
                            snapshot: "current".into(),
                        },
                        operator: ComparisonOperator::Gt,
                        right: ExpressionNode::constant(threshold),
                        window: None,
                    })],
                },
            },
            webhook_url: "http://127.0.0.1:1/unreachable".into(),
            cooldown_minutes,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_evaluated_at: None,
            last_triggered_at,
        }
    }

    fn worker_with(fetcher_value: f64) -> (Worker, Arc<MemorySignalStore>, Arc<MemoryNotificationStore>) {
        let signals = Arc::new(MemorySignalStore::new());
        let notifications = Arc::new(MemoryNotificationStore::new());
        let run_logs = Arc::new(MemoryRunLogStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let fetcher: Arc<dyn DataFetcher> = Arc::new(ConstantFetcher(fetcher_value));
        let worker = Worker::new(
            signals.clone(),
            notifications.clone(),
            run_logs,
            queue,
            fetcher,
            WorkerConfig {
                poll_interval: Duration::from_millis(1),
                dispatch: DispatchConfig { max_retries: 0, ..DispatchConfig::default() },
            },
        );
        (worker, signals, notifications)
    }

    #[tokio::test]
    async fn missing_signal_is_skipped_quietly() {
        let (worker, ..) = worker_with(0.0);
        worker.process_evaluate(SignalId::new()).await.unwrap();
    }

    #[tokio::test]
    async fn inactive_signal_is_not_evaluated() {
        let (worker, signals, notifications) = worker_with(2_000_000.0);
        let mut s = signal_with(1_000_000.0, 10, None);
        s.is_active = false;
        signals.create(s.clone()).await.unwrap();
        worker.process_evaluate(s.id).await.unwrap();
        assert!(notifications.list_by_signal(s.id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn triggered_signal_writes_failed_notification_on_unreachable_webhook() {
        let (worker, signals, notifications) = worker_with(2_000_000.0);
        let s = signal_with(1_000_000.0, 10, None);
        signals.create(s.clone()).await.unwrap();

        worker.process_evaluate(s.id).await.unwrap();

        let records = notifications.list_by_signal(s.id, 10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, NotificationStatus::Failed);

        // Dispatch failed, so last_triggered_at must not have advanced.
        let reloaded = signals.get(s.id).await.unwrap().unwrap();
        assert!(reloaded.last_triggered_at.is_none());
    }

    #[tokio::test]
    async fn cooldown_active_suppresses_dispatch() {
        let (worker, signals, notifications) = worker_with(2_000_000.0);
        let s = signal_with(1_000_000.0, 60, Some(Utc::now()));
        signals.create(s.clone()).await.unwrap();

        worker.process_evaluate(s.id).await.unwrap();

        assert!(notifications.list_by_signal(s.id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stamp_evaluated_always_advances() {
        let (worker, signals, _notifications) = worker_with(0.0);
        let s = signal_with(1_000_000.0, 10, None);
        signals.create(s.clone()).await.unwrap();

        worker.process_evaluate(s.id).await.unwrap();

        let reloaded = signals.get(s.id).await.unwrap().unwrap();
        assert!(reloaded.last_evaluated_at.is_some());
    }
}
