//! Renders a compiled AST's top-level conditions into the `conditions_met`
//! array a webhook payload and notification row carry (§6.5).
//!
//! The evaluator only returns a signal-wide verdict, not a per-condition
//! trace (short-circuiting `evaluate_conditions` stops at the first
//! decisive clause). Every entry here therefore mirrors the overall
//! `triggered` verdict rather than replaying which specific clause passed —
//! a deliberate simplification, not a precise per-condition audit.

use sentinel_core::{Aggregation, ComparisonOperator, CompiledAggregate, CompiledCondition, CompiledGroup, ConditionOutcome, ExpressionNode, Simple};

fn describe_node(node: &ExpressionNode) -> String {
    match node {
        ExpressionNode::Constant { value } => value.to_string(),
        ExpressionNode::StateRef { entity, field, .. } => format!("{entity:?}.{field}"),
        ExpressionNode::EventRef { event_type, field, aggregation, .. } => {
            format!("{aggregation:?}({event_type}.{field})")
        }
        ExpressionNode::BinaryExpression { operator, left, right } => {
            format!("({} {:?} {})", describe_node(left), operator, describe_node(right))
        }
    }
}

fn describe_operator(op: ComparisonOperator) -> &'static str {
    match op {
        ComparisonOperator::Gt => ">",
        ComparisonOperator::Gte => ">=",
        ComparisonOperator::Lt => "<",
        ComparisonOperator::Lte => "<=",
        ComparisonOperator::Eq => "==",
        ComparisonOperator::Neq => "!=",
    }
}

fn constant_of(node: &ExpressionNode) -> Option<f64> {
    match node {
        ExpressionNode::Constant { value } => Some(*value),
        _ => None,
    }
}

fn describe_simple(simple: &Simple) -> ConditionOutcome {
    ConditionOutcome {
        condition_type: "simple".into(),
        triggered: false,
        description: format!(
            "{} {} {}",
            describe_node(&simple.left),
            describe_operator(simple.operator),
            describe_node(&simple.right)
        ),
        actual_value: None,
        threshold: constant_of(&simple.right),
        details: None,
    }
}

fn describe_group(group: &CompiledGroup) -> ConditionOutcome {
    ConditionOutcome {
        condition_type: "group".into(),
        triggered: false,
        description: format!(
            "{} of {} addresses satisfy: {}",
            group.requirement.count,
            group.requirement.of,
            group
                .per_address_conditions
                .iter()
                .map(describe_simple)
                .map(|o| o.description)
                .collect::<Vec<_>>()
                .join(&format!(" {:?} ", group.logic))
        ),
        actual_value: None,
        threshold: None,
        details: None,
    }
}

fn describe_aggregate(aggregate: &CompiledAggregate) -> ConditionOutcome {
    ConditionOutcome {
        condition_type: "aggregate".into(),
        triggered: false,
        description: format!(
            "{} {} {} {}",
            describe_aggregation(aggregate.aggregation),
            aggregate.metric,
            describe_operator(aggregate.operator),
            aggregate.value
        ),
        actual_value: None,
        threshold: Some(aggregate.value),
        details: None,
    }
}

fn describe_aggregation(aggregation: Aggregation) -> &'static str {
    match aggregation {
        Aggregation::Sum => "sum",
        Aggregation::Avg => "avg",
        Aggregation::Min => "min",
        Aggregation::Max => "max",
        Aggregation::Count => "count",
    }
}

/// Describe every top-level condition, stamping `triggered` with the
/// signal's overall verdict.
pub fn describe_conditions(conditions: &[CompiledCondition], triggered: bool) -> Vec<ConditionOutcome> {
    conditions
        .iter()
        .map(|c| {
            let mut outcome = match c {
                CompiledCondition::Simple(s) => describe_simple(s),
                CompiledCondition::CompiledGroup(g) => describe_group(g),
                CompiledCondition::CompiledAggregate(a) => describe_aggregate(a),
            };
            outcome.triggered = triggered;
            outcome
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::StateEntity;

    #[test]
    fn describes_simple_condition_with_threshold() {
        let simple = Simple {
            left: ExpressionNode::StateRef {
                entity: StateEntity::Market,
                filters: vec![],
                field: "totalBorrowAssets".into(),
                snapshot: "current".into(),
            },
            operator: ComparisonOperator::Gt,
            right: ExpressionNode::constant(1_000_000.0),
            window: None,
        };
        let outcomes = describe_conditions(&[CompiledCondition::Simple(simple)], true);
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].triggered);
        assert_eq!(outcomes[0].threshold, Some(1_000_000.0));
        assert!(outcomes[0].description.contains("totalBorrowAssets"));
    }
}
