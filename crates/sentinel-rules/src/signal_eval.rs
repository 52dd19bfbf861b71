//! Signal-level evaluator (C6, §4.6): drives C5 over every condition shape
//! and combines the results.

use chrono::{DateTime, Utc};
use sentinel_core::{
    Aggregation, ChainId, CompiledAggregate, CompiledAst, CompiledCondition, CompiledGroup, Logic,
    SentinelError, Simple,
};

use crate::evaluator::{evaluate_condition, EvalClock};
use crate::fetch::DataFetcher;

/// Timing context shared by every condition in one signal evaluation.
/// `now` is fixed at the start of evaluation; `window_start` derives from
/// the signal's default window. A per-condition window override produces a
/// shadowed clock (§4.6).
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext {
    pub chain_id: ChainId,
    pub now_ms: i64,
    pub window_start_ms: i64,
}

impl EvaluationContext {
    fn clock(&self) -> EvalClock {
        EvalClock {
            now_ms: self.now_ms,
            window_start_ms: self.window_start_ms,
        }
    }

    /// A clock shadowed by a per-condition window override, if present.
    fn clock_for_window(&self, window: Option<&str>) -> Result<EvalClock, SentinelError> {
        match window {
            Some(w) => {
                let window_ms = sentinel_core::parse_duration(w)?;
                Ok(EvalClock {
                    now_ms: self.now_ms,
                    window_start_ms: self.now_ms - window_ms,
                })
            }
            None => Ok(self.clock()),
        }
    }
}

/// Outcome of evaluating one signal's full AST (§4.6 Result).
#[derive(Debug, Clone)]
pub struct SignalEvalResult {
    pub triggered: bool,
    pub conclusive: bool,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
}

/// Evaluate every top-level condition and combine by the AST's logic,
/// short-circuiting as spec'd. Any fetch failure turns the whole result
/// inconclusive rather than propagating as a hard error (§7).
pub async fn evaluate_signal(
    ast: &CompiledAst,
    ctx: &EvaluationContext,
    fetcher: &dyn DataFetcher,
    now: DateTime<Utc>,
) -> SignalEvalResult {
    match evaluate_conditions(&ast.conditions, ast.logic, ctx, fetcher).await {
        Ok(triggered) => SignalEvalResult {
            triggered,
            conclusive: true,
            timestamp: now,
            error: None,
        },
        Err(e) => SignalEvalResult {
            triggered: false,
            conclusive: false,
            timestamp: now,
            error: Some(e.to_string()),
        },
    }
}

async fn evaluate_conditions(
    conditions: &[CompiledCondition],
    logic: Logic,
    ctx: &EvaluationContext,
    fetcher: &dyn DataFetcher,
) -> Result<bool, SentinelError> {
    match logic {
        Logic::And => {
            for condition in conditions {
                if !evaluate_one(condition, ctx, fetcher).await? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Logic::Or => {
            for condition in conditions {
                if evaluate_one(condition, ctx, fetcher).await? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

async fn evaluate_one(
    condition: &CompiledCondition,
    ctx: &EvaluationContext,
    fetcher: &dyn DataFetcher,
) -> Result<bool, SentinelError> {
    match condition {
        CompiledCondition::Simple(simple) => evaluate_simple(simple, ctx, fetcher).await,
        CompiledCondition::CompiledGroup(group) => evaluate_group(group, ctx, fetcher).await,
        CompiledCondition::CompiledAggregate(aggregate) => evaluate_aggregate(aggregate, ctx, fetcher).await,
    }
}

async fn evaluate_simple(
    simple: &Simple,
    ctx: &EvaluationContext,
    fetcher: &dyn DataFetcher,
) -> Result<bool, SentinelError> {
    let clock = ctx.clock_for_window(simple.window.as_deref())?;
    let (triggered, _left, _right) =
        evaluate_condition(&simple.left, simple.operator, &simple.right, clock, fetcher).await?;
    Ok(triggered)
}

/// For each address: substitute `user = address` into every inner
/// condition, combine those by the group's inner logic, and count how many
/// addresses pass. Short-circuits per §8 invariant 4: stop fetching once the
/// requirement is already decided either way.
async fn evaluate_group(
    group: &CompiledGroup,
    ctx: &EvaluationContext,
    fetcher: &dyn DataFetcher,
) -> Result<bool, SentinelError> {
    let mut triggered_count = 0usize;
    let remaining_total = group.addresses.len();

    for (i, address) in group.addresses.iter().enumerate() {
        let remaining_after_this = remaining_total - i - 1;
        let passed = evaluate_group_member(group, address.as_str(), ctx, fetcher).await?;
        if passed {
            triggered_count += 1;
        }
        if triggered_count >= group.requirement.count {
            return Ok(true);
        }
        if triggered_count + remaining_after_this < group.requirement.count {
            return Ok(false);
        }
    }

    Ok(triggered_count >= group.requirement.count)
}

async fn evaluate_group_member(
    group: &CompiledGroup,
    address: &str,
    ctx: &EvaluationContext,
    fetcher: &dyn DataFetcher,
) -> Result<bool, SentinelError> {
    match group.logic {
        Logic::And => {
            for inner in &group.per_address_conditions {
                if !evaluate_simple_for_address(inner, address, ctx, fetcher).await? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Logic::Or => {
            for inner in &group.per_address_conditions {
                if evaluate_simple_for_address(inner, address, ctx, fetcher).await? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

async fn evaluate_simple_for_address(
    inner: &Simple,
    address: &str,
    ctx: &EvaluationContext,
    fetcher: &dyn DataFetcher,
) -> Result<bool, SentinelError> {
    let left = inner.left.with_user_filter(address);
    let right = inner.right.with_user_filter(address);
    let clock = ctx.clock_for_window(inner.window.as_deref())?;
    let (triggered, ..) = evaluate_condition(&left, inner.operator, &right, clock, fetcher).await?;
    Ok(triggered)
}

/// Enumerate an aggregate's targets by its metric's entity kind, evaluate
/// each target's metric expression, reduce by `aggregation`, then compare
/// against `value` (§4.6 Aggregate).
async fn evaluate_aggregate(
    aggregate: &CompiledAggregate,
    ctx: &EvaluationContext,
    fetcher: &dyn DataFetcher,
) -> Result<bool, SentinelError> {
    let descriptor = sentinel_core::METRIC_REGISTRY
        .get(&aggregate.metric)
        .ok_or_else(|| SentinelError::unknown_metric("metric", &aggregate.metric))?;
    let clock = ctx.clock_for_window(aggregate.window.as_deref())?;

    let market_targets: Vec<Option<&sentinel_core::MarketId>> = match &aggregate.market_ids {
        Some(markets) if !markets.is_empty() => markets.iter().map(Some).collect(),
        _ => vec![None],
    };
    let address_targets: Vec<Option<&sentinel_core::Address>> = match &aggregate.addresses {
        Some(addresses) if !addresses.is_empty() => addresses.iter().map(Some).collect(),
        _ => vec![None],
    };

    let entity = descriptor.entity(&sentinel_core::METRIC_REGISTRY);
    let mut values = Vec::new();

    match entity {
        Some(sentinel_core::StateEntity::Market) => {
            for market in &market_targets {
                let node = aggregate_target_node(descriptor, aggregate, ctx.chain_id, *market, None, clock.now_ms)?;
                values.push(crate::evaluator::evaluate_node(&node, clock, fetcher).await?);
            }
        }
        Some(sentinel_core::StateEntity::Position) => {
            for market in &market_targets {
                for address in &address_targets {
                    let node =
                        aggregate_target_node(descriptor, aggregate, ctx.chain_id, *market, *address, clock.now_ms)?;
                    values.push(crate::evaluator::evaluate_node(&node, clock, fetcher).await?);
                }
            }
        }
        None => {
            for market in &market_targets {
                for address in &address_targets {
                    let node =
                        aggregate_target_node(descriptor, aggregate, ctx.chain_id, *market, *address, clock.now_ms)?;
                    values.push(crate::evaluator::evaluate_node(&node, clock, fetcher).await?);
                }
            }
        }
    }

    let reduced = reduce(aggregate.aggregation, &values);
    Ok(apply_comparison(aggregate.operator, reduced, aggregate.value))
}

fn aggregate_target_node(
    descriptor: &sentinel_core::MetricDescriptor,
    aggregate: &CompiledAggregate,
    chain_id: ChainId,
    market_id: Option<&sentinel_core::MarketId>,
    address: Option<&sentinel_core::Address>,
    _now_ms: i64,
) -> Result<sentinel_core::ExpressionNode, SentinelError> {
    let mut filters = vec![sentinel_core::Filter::new(
        "chainId",
        sentinel_core::FilterOp::Eq,
        serde_json::json!(chain_id.0),
    )];
    if let Some(m) = market_id {
        filters.push(sentinel_core::Filter::new(
            "marketId",
            sentinel_core::FilterOp::Eq,
            serde_json::json!(m.as_str()),
        ));
    }
    if let Some(a) = address {
        filters.push(sentinel_core::Filter::new(
            "user",
            sentinel_core::FilterOp::Eq,
            serde_json::json!(a.as_str()),
        ));
    }
    if let Some(extra) = &aggregate.filters {
        filters.extend(extra.iter().cloned());
    }

    match descriptor {
        sentinel_core::MetricDescriptor::State(state) => Ok(sentinel_core::ExpressionNode::StateRef {
            entity: state.entity,
            filters,
            field: state.field.clone(),
            snapshot: "current".to_owned(),
        }),
        sentinel_core::MetricDescriptor::Event(event) => Ok(sentinel_core::ExpressionNode::EventRef {
            event_type: event.event_type.clone(),
            filters,
            field: event.field.clone(),
            aggregation: event.aggregation,
            window: aggregate.window.clone(),
        }),
        sentinel_core::MetricDescriptor::Computed { .. } | sentinel_core::MetricDescriptor::ChainedEvent { .. } => {
            Err(SentinelError::validation(
                "metric",
                "computed and chained_event metrics are not supported in aggregates",
            ))
        }
    }
}

fn reduce(aggregation: Aggregation, values: &[f64]) -> f64 {
    match aggregation {
        Aggregation::Sum => values.iter().sum(),
        Aggregation::Avg => {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        }
        Aggregation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        Aggregation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        Aggregation::Count => values.len() as f64,
    }
}

fn apply_comparison(operator: sentinel_core::ComparisonOperator, l: f64, r: f64) -> bool {
    use sentinel_core::ComparisonOperator as Op;
    match operator {
        Op::Gt => l > r,
        Op::Gte => l >= r,
        Op::Lt => l < r,
        Op::Lte => l <= r,
        Op::Eq => l == r,
        Op::Neq => l != r,
    }
}
