//! Offline re-evaluation of a signal at an arbitrary timestamp (C10,
//! §4.10): point evaluation, a stepped sweep, and binary-search
//! first-trigger discovery. `now` is pinned to the requested timestamp
//! rather than read from the wall clock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sentinel_chain::BlockResolver;
use sentinel_chain::RpcClient;
use sentinel_core::{CompiledAst, CompiledCondition, Scope, SentinelError};
use sentinel_rules::{evaluate_condition, evaluate_signal, DataFetcher, EvalClock, EvaluationContext};

use crate::types::{Diagnostic, PointResult, SweepConfig, SweepResult};

pub struct Simulator<R: RpcClient> {
    resolver: Arc<BlockResolver<R>>,
    fetcher: Arc<dyn DataFetcher>,
}

impl<R: RpcClient> Simulator<R> {
    pub fn new(resolver: Arc<BlockResolver<R>>, fetcher: Arc<dyn DataFetcher>) -> Self {
        Self { resolver, fetcher }
    }

    /// Evaluate `ast` as if `at` were the current wall-clock time. Resolves
    /// the current and window-start blocks up front for diagnostic
    /// reporting (§4.10) even though the fetcher resolves them again
    /// internally for any historical reads the AST triggers.
    pub async fn evaluate_point(&self, ast: &CompiledAst, scope: &Scope, window: Option<&str>, at: DateTime<Utc>) -> PointResult {
        let Some(chain_id) = scope.chain_ids.first().copied() else {
            return PointResult {
                triggered: false,
                conclusive: false,
                error: Some("scope declares no chain id".into()),
                evaluated_at: at,
                current_block: 0,
                window_start_block: 0,
                diagnostic: None,
            };
        };

        let now_ms = at.timestamp_millis();
        let window_start_ms = match window.map(sentinel_core::parse_duration) {
            Some(Ok(window_ms)) => now_ms - window_ms,
            Some(Err(e)) => {
                return PointResult {
                    triggered: false,
                    conclusive: false,
                    error: Some(e.to_string()),
                    evaluated_at: at,
                    current_block: 0,
                    window_start_block: 0,
                    diagnostic: None,
                };
            }
            None => now_ms,
        };

        let current_block = self.resolver.resolve(chain_id, now_ms).await;
        let window_start_block = self.resolver.resolve(chain_id, window_start_ms).await;

        let ctx = EvaluationContext { chain_id, now_ms, window_start_ms };
        let result = evaluate_signal(ast, &ctx, self.fetcher.as_ref(), at).await;
        let diagnostic = self.diagnostic_for(ast, &ctx).await;

        PointResult {
            triggered: result.triggered,
            conclusive: result.conclusive,
            error: result.error,
            evaluated_at: at,
            current_block,
            window_start_block,
            diagnostic,
        }
    }

    /// For a signal with exactly one top-level `Simple` condition, resolve
    /// the left/right values again for display (§4.10). Silently omitted
    /// for any other shape or on fetch failure.
    async fn diagnostic_for(&self, ast: &CompiledAst, ctx: &EvaluationContext) -> Option<Diagnostic> {
        let [CompiledCondition::Simple(simple)] = ast.conditions.as_slice() else {
            return None;
        };
        let window_start_ms = match &simple.window {
            Some(w) => ctx.now_ms - sentinel_core::parse_duration(w).ok()?,
            None => ctx.window_start_ms,
        };
        let clock = EvalClock { now_ms: ctx.now_ms, window_start_ms };
        let (_, left, right) = evaluate_condition(&simple.left, simple.operator, &simple.right, clock, self.fetcher.as_ref())
            .await
            .ok()?;
        Some(Diagnostic { left, right })
    }

    /// Iterate `[start, end]` by `step_ms`, capped at `config.max_steps`
    /// points (§4.10 "Sweep").
    pub async fn sweep(
        &self,
        ast: &CompiledAst,
        scope: &Scope,
        window: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step_ms: i64,
        config: SweepConfig,
    ) -> SweepResult {
        let mut points = Vec::new();
        let mut truncated = false;
        let mut t = start;

        while t <= end {
            if points.len() >= config.max_steps {
                truncated = true;
                break;
            }
            points.push(self.evaluate_point(ast, scope, window, t).await);
            t += chrono::Duration::milliseconds(step_ms);
        }

        SweepResult { points, truncated }
    }

    /// Binary-search `[start, end]` for the earliest point that
    /// conclusively triggers, to within `precision_ms` (§4.10
    /// "First-trigger binary search", scenario S6).
    pub async fn first_trigger(
        &self,
        ast: &CompiledAst,
        scope: &Scope,
        window: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        precision_ms: i64,
    ) -> Result<Option<DateTime<Utc>>, SentinelError> {
        let end_result = self.evaluate_point(ast, scope, window, end).await;
        if !conclusively_triggered(&end_result) {
            return Ok(None);
        }

        let start_result = self.evaluate_point(ast, scope, window, start).await;
        if conclusively_triggered(&start_result) {
            return Ok(Some(start));
        }

        let mut low = start;
        let mut high = end;
        while (high - low).num_milliseconds() > precision_ms {
            let mid_ms = low.timestamp_millis() + (high.timestamp_millis() - low.timestamp_millis()) / 2;
            let mid = DateTime::<Utc>::from_timestamp_millis(mid_ms).unwrap_or(high);
            let mid_result = self.evaluate_point(ast, scope, window, mid).await;
            if conclusively_triggered(&mid_result) {
                high = mid;
            } else {
                low = mid;
            }
        }

        Ok(Some(high))
    }
}

fn conclusively_triggered(result: &PointResult) -> bool {
    result.conclusive && result.triggered
}
