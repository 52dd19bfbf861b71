//! Tree-walking expression evaluator (C5, §4.5).

use sentinel_core::{BinaryOp, ComparisonOperator, ExpressionNode, SentinelError};

use crate::fetch::DataFetcher;

/// The timing inputs a node needs to resolve a snapshot-relative read.
/// Built fresh per top-level evaluation, shadowed per per-condition window
/// override (§4.6).
#[derive(Debug, Clone, Copy)]
pub struct EvalClock {
    pub now_ms: i64,
    pub window_start_ms: i64,
}

/// Evaluate one `ExpressionNode` to a number (§4.5 `evaluateNode`).
pub async fn evaluate_node(
    node: &ExpressionNode,
    clock: EvalClock,
    fetcher: &dyn DataFetcher,
) -> Result<f64, SentinelError> {
    match node {
        ExpressionNode::Constant { value } => Ok(*value),
        ExpressionNode::StateRef {
            entity,
            filters,
            field,
            snapshot,
        } => {
            let timestamp = match snapshot.as_str() {
                "current" => None,
                "window_start" => Some(clock.window_start_ms),
                other => {
                    let offset_ms = sentinel_core::parse_duration(other)?;
                    Some(clock.now_ms - offset_ms)
                }
            };
            fetcher.fetch_state(*entity, filters, field, timestamp).await
        }
        ExpressionNode::EventRef {
            event_type,
            filters,
            field,
            aggregation,
            window,
        } => {
            let start_ms = match window {
                Some(duration) => clock.now_ms - sentinel_core::parse_duration(duration)?,
                None => clock.window_start_ms,
            };
            fetcher
                .fetch_events(event_type, filters, field, *aggregation, start_ms, clock.now_ms)
                .await
        }
        ExpressionNode::BinaryExpression {
            operator,
            left,
            right,
        } => {
            let l = Box::pin(evaluate_node(left, clock, fetcher)).await?;
            let r = Box::pin(evaluate_node(right, clock, fetcher)).await?;
            Ok(apply_binary_op(*operator, l, r))
        }
    }
}

/// Combine two already-evaluated operands. Division by zero yields 0 rather
/// than erroring: a missing-data artifact must never fabricate a trigger.
fn apply_binary_op(op: BinaryOp, l: f64, r: f64) -> f64 {
    match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::Div => {
            if r == 0.0 {
                0.0
            } else {
                l / r
            }
        }
    }
}

/// Evaluate both sides of a comparison and apply the operator (§4.5
/// `evaluateCondition`). IEEE-754 double semantics throughout: NaN compares
/// false against everything, including itself.
pub async fn evaluate_condition(
    left: &ExpressionNode,
    operator: ComparisonOperator,
    right: &ExpressionNode,
    clock: EvalClock,
    fetcher: &dyn DataFetcher,
) -> Result<(bool, f64, f64), SentinelError> {
    let l = evaluate_node(left, clock, fetcher).await?;
    let r = evaluate_node(right, clock, fetcher).await?;
    Ok((apply_comparison(operator, l, r), l, r))
}

fn apply_comparison(operator: ComparisonOperator, l: f64, r: f64) -> bool {
    match operator {
        ComparisonOperator::Gt => l > r,
        ComparisonOperator::Gte => l >= r,
        ComparisonOperator::Lt => l < r,
        ComparisonOperator::Lte => l <= r,
        ComparisonOperator::Eq => l == r,
        ComparisonOperator::Neq => l != r,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sentinel_core::{EventAggregation, Filter, StateEntity};
    use std::collections::HashMap;

    struct StubFetcher {
        state: HashMap<&'static str, f64>,
        events: HashMap<&'static str, f64>,
    }

    #[async_trait]
    impl DataFetcher for StubFetcher {
        async fn fetch_state(
            &self,
            _entity: StateEntity,
            _filters: &[Filter],
            field: &str,
            _timestamp: Option<i64>,
        ) -> Result<f64, SentinelError> {
            self.state
                .get(field)
                .copied()
                .ok_or_else(|| SentinelError::FetchConfig(field.to_owned()))
        }

        async fn fetch_events(
            &self,
            event_type: &str,
            _filters: &[Filter],
            _field: &str,
            _aggregation: EventAggregation,
            _start_ms: i64,
            _end_ms: i64,
        ) -> Result<f64, SentinelError> {
            self.events
                .get(event_type)
                .copied()
                .ok_or_else(|| SentinelError::IndexQuery(event_type.to_owned()))
        }
    }

    fn clock() -> EvalClock {
        EvalClock {
            now_ms: 2_000_000,
            window_start_ms: 1_000_000,
        }
    }

    #[tokio::test]
    async fn constant_evaluates_to_itself() {
        let fetcher = StubFetcher {
            state: HashMap::new(),
            events: HashMap::new(),
        };
        let node = ExpressionNode::constant(42.0);
        assert_eq!(evaluate_node(&node, clock(), &fetcher).await.unwrap(), 42.0);
    }

    #[tokio::test]
    async fn division_by_zero_yields_zero() {
        let fetcher = StubFetcher {
            state: HashMap::new(),
            events: HashMap::new(),
        };
        let node = ExpressionNode::binary(
            BinaryOp::Div,
            ExpressionNode::constant(10.0),
            ExpressionNode::constant(0.0),
        );
        assert_eq!(evaluate_node(&node, clock(), &fetcher).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn threshold_comparison_true() {
        let mut state = HashMap::new();
        state.insert("totalBorrowAssets", 2_000_000.0);
        let fetcher = StubFetcher {
            state,
            events: HashMap::new(),
        };
        let left = ExpressionNode::StateRef {
            entity: StateEntity::Market,
            filters: vec![],
            field: "totalBorrowAssets".into(),
            snapshot: "current".into(),
        };
        let right = ExpressionNode::constant(1_000_000.0);
        let (triggered, l, r) =
            evaluate_condition(&left, ComparisonOperator::Gt, &right, clock(), &fetcher)
                .await
                .unwrap();
        assert!(triggered);
        assert_eq!(l, 2_000_000.0);
        assert_eq!(r, 1_000_000.0);
    }

    #[tokio::test]
    async fn nan_is_never_ordered_or_equal() {
        let fetcher = StubFetcher {
            state: HashMap::new(),
            events: HashMap::new(),
        };
        let left = ExpressionNode::constant(f64::NAN);
        let right = ExpressionNode::constant(f64::NAN);
        let (eq, ..) = evaluate_condition(&left, ComparisonOperator::Eq, &right, clock(), &fetcher)
            .await
            .unwrap();
        assert!(!eq);
        let (gt, ..) = evaluate_condition(&left, ComparisonOperator::Gt, &right, clock(), &fetcher)
            .await
            .unwrap();
        assert!(!gt);
    }

    #[tokio::test]
    async fn fetch_failure_propagates() {
        let fetcher = StubFetcher {
            state: HashMap::new(),
            events: HashMap::new(),
        };
        let node = ExpressionNode::StateRef {
            entity: StateEntity::Market,
            filters: vec![],
            field: "missingField".into(),
            snapshot: "current".into(),
        };
        let err = evaluate_node(&node, clock(), &fetcher).await.unwrap_err();
        assert!(err.is_fetch_failure());
    }

    #[tokio::test]
    async fn window_start_snapshot_uses_clock() {
        let mut state = HashMap::new();
        state.insert("supplyShares", 700.0);
        let fetcher = StubFetcher {
            state,
            events: HashMap::new(),
        };
        let node = ExpressionNode::StateRef {
            entity: StateEntity::Position,
            filters: vec![],
            field: "supplyShares".into(),
            snapshot: "window_start".into(),
        };
        assert_eq!(evaluate_node(&node, clock(), &fetcher).await.unwrap(), 700.0);
    }
}
