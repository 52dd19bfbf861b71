//! DSL → AST compiler (C4, §4.4).

use sentinel_core::{
    BinaryOp, ChangeBy, ChangeDirection, CompiledAggregate, CompiledAst, CompiledCondition,
    CompiledGroup, ComparisonOperator, Condition, ExpressionNode, Filter, Logic, MetricDescriptor,
    MetricRegistry, Scope, SentinelError, Simple, StateEntity, StoredDefinition, METRIC_REGISTRY,
};

/// Compile a signal's DSL into its stored definition (DSL + AST), validating
/// scope, metrics, and structural constraints along the way.
pub fn compile(
    scope: &Scope,
    window: Option<&str>,
    logic: Logic,
    dsl: &[Condition],
) -> Result<StoredDefinition, SentinelError> {
    compile_with_registry(scope, window, logic, dsl, &METRIC_REGISTRY)
}

/// Same as [`compile`] but takes an explicit registry, for testing against a
/// smaller fixture set.
pub fn compile_with_registry(
    scope: &Scope,
    window: Option<&str>,
    logic: Logic,
    dsl: &[Condition],
    registry: &MetricRegistry,
) -> Result<StoredDefinition, SentinelError> {
    scope.validate("scope")?;
    if let Some(w) = window {
        sentinel_core::parse_duration_at(w, "window")?;
    }

    let compiled: Vec<CompiledCondition> = dsl
        .iter()
        .enumerate()
        .map(|(i, condition)| compile_condition(condition, scope, registry, &format!("conditions[{i}]"), false))
        .collect::<Result<_, _>>()?;

    Ok(StoredDefinition {
        version: sentinel_core::CURRENT_DEFINITION_VERSION,
        scope: scope.clone(),
        window: window.map(str::to_owned),
        logic,
        dsl: dsl.to_vec(),
        ast: CompiledAst {
            logic,
            conditions: compiled,
        },
    })
}

fn compile_condition(
    condition: &Condition,
    scope: &Scope,
    registry: &MetricRegistry,
    field_path: &str,
    is_group_inner: bool,
) -> Result<CompiledCondition, SentinelError> {
    match condition {
        Condition::Threshold {
            metric,
            operator,
            value,
            chain_id,
            market_id,
            address,
            window,
            filters,
        } => {
            let descriptor = lookup_metric(registry, metric, field_path)?;
            let identity = resolve_identity(
                descriptor,
                registry,
                scope,
                *chain_id,
                market_id.clone(),
                address.clone(),
                field_path,
                is_group_inner,
            )?;
            check_filter_safety(filters.as_deref(), field_path)?;
            let left = build_metric_node(descriptor, registry, &identity, "current", filters.as_deref(), window.as_deref())?;
            Ok(CompiledCondition::Simple(Simple {
                left,
                operator: *operator,
                right: ExpressionNode::constant(*value),
                window: window.clone(),
            }))
        }
        Condition::Change {
            metric,
            direction,
            by,
            chain_id,
            market_id,
            address,
            window,
        } => {
            if matches!(direction, ChangeDirection::Any) {
                return Err(SentinelError::validation(
                    format!("{field_path}.direction"),
                    "change direction `any` is not supported",
                ));
            }
            let descriptor = lookup_metric(registry, metric, field_path)?;
            if matches!(descriptor, MetricDescriptor::Event(_) | MetricDescriptor::ChainedEvent { .. }) {
                return Err(SentinelError::validation(
                    format!("{field_path}.metric"),
                    "change conditions require a state or computed metric",
                ));
            }
            let identity = resolve_identity(
                descriptor,
                registry,
                scope,
                *chain_id,
                market_id.clone(),
                address.clone(),
                field_path,
                is_group_inner,
            )?;
            let current = build_metric_node(descriptor, registry, &identity, "current", None, None)?;
            let past = build_metric_node(descriptor, registry, &identity, "window_start", None, None)?;
            let (left, operator, right) = translate_change(*direction, *by, current, past);
            Ok(CompiledCondition::Simple(Simple {
                left,
                operator,
                right,
                window: window.clone(),
            }))
        }
        Condition::Group {
            addresses,
            requirement,
            logic,
            conditions,
        } => {
            if is_group_inner {
                return Err(SentinelError::validation(
                    field_path,
                    "nested groups are not supported",
                ));
            }
            if requirement.of != addresses.len() {
                return Err(SentinelError::validation(
                    format!("{field_path}.requirement.of"),
                    "requirement.of must equal the number of addresses",
                ));
            }
            if requirement.count < 1 || requirement.count > requirement.of {
                return Err(SentinelError::validation(
                    format!("{field_path}.requirement.count"),
                    "requirement.count must be between 1 and requirement.of",
                ));
            }
            let per_address_conditions = conditions
                .iter()
                .enumerate()
                .map(|(i, inner)| {
                    let inner_path = format!("{field_path}.conditions[{i}]");
                    if condition_has_address(inner) {
                        return Err(SentinelError::validation(
                            format!("{inner_path}.address"),
                            "group inner conditions must not carry an address",
                        ));
                    }
                    match compile_condition(inner, scope, registry, &inner_path, true)? {
                        CompiledCondition::Simple(simple) => Ok(simple),
                        _ => Err(SentinelError::validation(
                            inner_path,
                            "group inner conditions must be threshold or change",
                        )),
                    }
                })
                .collect::<Result<_, _>>()?;
            Ok(CompiledCondition::CompiledGroup(CompiledGroup {
                addresses: addresses.clone(),
                requirement: *requirement,
                logic: *logic,
                window: None,
                per_address_conditions,
            }))
        }
        Condition::Aggregate {
            aggregation,
            metric,
            operator,
            value,
            chain_id,
            market_id,
            window,
            filters,
        } => {
            if is_group_inner {
                return Err(SentinelError::validation(
                    field_path,
                    "nested aggregates are not supported",
                ));
            }
            let descriptor = lookup_metric(registry, metric, field_path)?;
            check_filter_safety(filters.as_deref(), field_path)?;
            let resolved_chain = resolve_chain(scope, *chain_id, field_path)?;

            let market_ids = match market_id {
                Some(m) => {
                    scope.require_markets(&format!("{field_path}.marketId"), std::slice::from_ref(m))?;
                    Some(vec![m.clone()])
                }
                None => scope.market_ids.clone(),
            };
            let addresses = scope.addresses.clone();

            match descriptor.entity(registry) {
                Some(StateEntity::Market) => {
                    if market_ids.as_ref().is_none_or(Vec::is_empty) {
                        return Err(SentinelError::validation(
                            format!("{field_path}.marketId"),
                            "aggregate over a market metric requires at least one market",
                        ));
                    }
                }
                Some(StateEntity::Position) => {
                    if market_ids.as_ref().is_none_or(Vec::is_empty) {
                        return Err(SentinelError::validation(
                            format!("{field_path}.marketId"),
                            "aggregate over a position metric requires at least one market",
                        ));
                    }
                    if addresses.as_ref().is_none_or(Vec::is_empty) {
                        return Err(SentinelError::validation(
                            format!("{field_path}.addresses"),
                            "aggregate over a position metric requires scope.addresses",
                        ));
                    }
                }
                None => {}
            }

            Ok(CompiledCondition::CompiledAggregate(CompiledAggregate {
                aggregation: *aggregation,
                metric: metric.clone(),
                operator: *operator,
                value: *value,
                chain_id: resolved_chain,
                market_ids,
                addresses,
                filters: filters.clone(),
                window: window.clone(),
            }))
        }
    }
}

fn condition_has_address(condition: &Condition) -> bool {
    match condition {
        Condition::Threshold { address, .. } | Condition::Change { address, .. } => address.is_some(),
        Condition::Group { .. } | Condition::Aggregate { .. } => false,
    }
}

fn lookup_metric<'r>(
    registry: &'r MetricRegistry,
    metric: &str,
    field_path: &str,
) -> Result<&'r MetricDescriptor, SentinelError> {
    registry
        .get(metric)
        .ok_or_else(|| SentinelError::unknown_metric(format!("{field_path}.metric"), metric))
}

/// Resolved scope identity used to build an expression node: the chain is
/// always known; market/address are known only when the scope or the
/// condition pins them down (or, for address, deferred to group expansion).
struct Identity {
    chain_id: sentinel_core::ChainId,
    market_id: Option<sentinel_core::MarketId>,
    address: Option<sentinel_core::Address>,
}

fn resolve_chain(
    scope: &Scope,
    supplied: Option<sentinel_core::ChainId>,
    field_path: &str,
) -> Result<sentinel_core::ChainId, SentinelError> {
    match supplied {
        Some(c) => {
            scope.require_chain(&format!("{field_path}.chainId"), c)?;
            Ok(c)
        }
        None => match scope.chain_ids.as_slice() {
            [only] => Ok(*only),
            _ => Err(SentinelError::validation(
                format!("{field_path}.chainId"),
                "chainId is required when scope declares more than one chain",
            )),
        },
    }
}

#[allow(clippy::too_many_arguments)]
fn resolve_identity(
    descriptor: &MetricDescriptor,
    registry: &MetricRegistry,
    scope: &Scope,
    chain_id: Option<sentinel_core::ChainId>,
    market_id: Option<sentinel_core::MarketId>,
    address: Option<sentinel_core::Address>,
    field_path: &str,
    is_group_inner: bool,
) -> Result<Identity, SentinelError> {
    let resolved_chain = resolve_chain(scope, chain_id, field_path)?;

    let resolved_market = match market_id {
        Some(m) => {
            scope.require_markets(&format!("{field_path}.marketId"), std::slice::from_ref(&m))?;
            Some(m)
        }
        None => match scope.market_ids.as_deref() {
            Some([only]) => Some(only.clone()),
            _ => None,
        },
    };

    let resolved_address = match address {
        Some(a) => {
            scope.require_addresses(&format!("{field_path}.address"), std::slice::from_ref(&a))?;
            Some(a)
        }
        None => match scope.addresses.as_deref() {
            Some([only]) => Some(only.clone()),
            _ => None,
        },
    };

    if let Some(entity) = descriptor.entity(registry) {
        match entity {
            StateEntity::Market => {
                if resolved_market.is_none() {
                    return Err(SentinelError::validation(
                        format!("{field_path}.marketId"),
                        "a market metric requires marketId",
                    ));
                }
            }
            StateEntity::Position => {
                if resolved_market.is_none() {
                    return Err(SentinelError::validation(
                        format!("{field_path}.marketId"),
                        "a position metric requires marketId",
                    ));
                }
                if resolved_address.is_none() && !is_group_inner {
                    return Err(SentinelError::validation(
                        format!("{field_path}.address"),
                        "a position metric requires address outside of a group",
                    ));
                }
            }
        }
    }

    Ok(Identity {
        chain_id: resolved_chain,
        market_id: resolved_market,
        address: resolved_address,
    })
}

fn identity_filters(identity: &Identity) -> Vec<Filter> {
    let mut filters = vec![Filter::new(
        "chainId",
        sentinel_core::FilterOp::Eq,
        serde_json::json!(identity.chain_id.0),
    )];
    if let Some(market_id) = &identity.market_id {
        filters.push(Filter::new(
            "marketId",
            sentinel_core::FilterOp::Eq,
            serde_json::json!(market_id.as_str()),
        ));
    }
    if let Some(address) = &identity.address {
        filters.push(Filter::new(
            "user",
            sentinel_core::FilterOp::Eq,
            serde_json::json!(address.as_str()),
        ));
    }
    filters
}

fn check_filter_safety(filters: Option<&[Filter]>, field_path: &str) -> Result<(), SentinelError> {
    let Some(filters) = filters else {
        return Ok(());
    };
    let mut seen = std::collections::HashSet::new();
    for filter in filters {
        if filter.is_reserved() {
            return Err(SentinelError::validation(
                format!("{field_path}.filters"),
                format!("filter field `{}` is reserved", filter.field),
            ));
        }
        if !seen.insert(&filter.field) {
            return Err(SentinelError::validation(
                format!("{field_path}.filters"),
                format!("filter field `{}` is repeated", filter.field),
            ));
        }
    }
    Ok(())
}

fn build_metric_node(
    descriptor: &MetricDescriptor,
    registry: &MetricRegistry,
    identity: &Identity,
    snapshot: &str,
    user_filters: Option<&[Filter]>,
    event_window: Option<&str>,
) -> Result<ExpressionNode, SentinelError> {
    let mut filters = identity_filters(identity);
    if let Some(extra) = user_filters {
        filters.extend(extra.iter().cloned());
    }

    match descriptor {
        MetricDescriptor::State(state) => Ok(ExpressionNode::StateRef {
            entity: state.entity,
            filters,
            field: state.field.clone(),
            snapshot: snapshot.to_owned(),
        }),
        MetricDescriptor::Computed { computation, operands } => {
            let left_descriptor = registry
                .get(&operands[0])
                .ok_or_else(|| SentinelError::unknown_metric("metric", &operands[0]))?;
            let right_descriptor = registry
                .get(&operands[1])
                .ok_or_else(|| SentinelError::unknown_metric("metric", &operands[1]))?;
            let left = build_metric_node(left_descriptor, registry, identity, snapshot, None, None)?;
            let right = build_metric_node(right_descriptor, registry, identity, snapshot, None, None)?;
            let op = match computation {
                sentinel_core::metric::Computation::Ratio => BinaryOp::Div,
                sentinel_core::metric::Computation::Difference => BinaryOp::Sub,
            };
            Ok(ExpressionNode::binary(op, left, right))
        }
        MetricDescriptor::Event(event) => Ok(ExpressionNode::EventRef {
            event_type: event.event_type.clone(),
            filters,
            field: event.field.clone(),
            aggregation: event.aggregation,
            window: event_window.map(str::to_owned),
        }),
        MetricDescriptor::ChainedEvent { operation, operands } => {
            let left_descriptor = registry
                .get(&operands[0])
                .ok_or_else(|| SentinelError::unknown_metric("metric", &operands[0]))?;
            let right_descriptor = registry
                .get(&operands[1])
                .ok_or_else(|| SentinelError::unknown_metric("metric", &operands[1]))?;
            let left = build_metric_node(left_descriptor, registry, identity, snapshot, None, event_window)?;
            let right = build_metric_node(right_descriptor, registry, identity, snapshot, None, event_window)?;
            let op = match operation {
                sentinel_core::metric::ChainedOperation::Add => BinaryOp::Add,
                sentinel_core::metric::ChainedOperation::Sub => BinaryOp::Sub,
            };
            Ok(ExpressionNode::binary(op, left, right))
        }
    }
}

fn translate_change(
    direction: ChangeDirection,
    by: ChangeBy,
    current: ExpressionNode,
    past: ExpressionNode,
) -> (ExpressionNode, ComparisonOperator, ExpressionNode) {
    match (direction, by) {
        (ChangeDirection::Decrease, ChangeBy::Percent(p)) => (
            current,
            ComparisonOperator::Lt,
            ExpressionNode::binary(BinaryOp::Mul, past, ExpressionNode::constant(1.0 - p / 100.0)),
        ),
        (ChangeDirection::Increase, ChangeBy::Percent(p)) => (
            current,
            ComparisonOperator::Gt,
            ExpressionNode::binary(BinaryOp::Mul, past, ExpressionNode::constant(1.0 + p / 100.0)),
        ),
        (ChangeDirection::Decrease, ChangeBy::Absolute(a)) => (
            ExpressionNode::binary(BinaryOp::Sub, past, current),
            ComparisonOperator::Gt,
            ExpressionNode::constant(a),
        ),
        (ChangeDirection::Increase, ChangeBy::Absolute(a)) => (
            ExpressionNode::binary(BinaryOp::Sub, current, past),
            ComparisonOperator::Gt,
            ExpressionNode::constant(a),
        ),
        (ChangeDirection::Any, _) => unreachable!("rejected before translate_change is called"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::{Address, Aggregation, ChainId, GroupRequirement, MarketId};

    fn scope_one_chain_one_market_one_address() -> Scope {
        Scope {
            chain_ids: vec![ChainId(1)],
            market_ids: Some(vec![MarketId::from("m1")]),
            addresses: Some(vec![Address::from("0xabc")]),
            protocol_tag: None,
        }
    }

    #[test]
    fn s1_threshold_true_shape() {
        let scope = scope_one_chain_one_market_one_address();
        let dsl = vec![Condition::Threshold {
            metric: "Morpho.Market.totalBorrowAssets".into(),
            operator: ComparisonOperator::Gt,
            value: 1_000_000.0,
            chain_id: Some(ChainId(1)),
            market_id: Some(MarketId::from("m1")),
            address: None,
            window: Some("1d".into()),
            filters: None,
        }];
        let stored = compile(&scope, None, Logic::And, &dsl).unwrap();
        assert_eq!(stored.ast.conditions.len(), 1);
        match &stored.ast.conditions[0] {
            CompiledCondition::Simple(s) => {
                assert_eq!(s.operator, ComparisonOperator::Gt);
                assert!(matches!(s.left, ExpressionNode::StateRef { .. }));
            }
            _ => panic!("expected Simple"),
        }
    }

    #[test]
    fn s8a_group_of_mismatch_rejected() {
        let scope = scope_one_chain_one_market_one_address();
        let dsl = vec![Condition::Group {
            addresses: vec![Address::from("0x1"), Address::from("0x2")],
            requirement: GroupRequirement { count: 1, of: 3 },
            logic: Logic::And,
            conditions: vec![],
        }];
        let err = compile(&scope, None, Logic::And, &dsl).unwrap_err();
        assert_eq!(err.field_path(), Some("conditions[0].requirement.of"));
    }

    #[test]
    fn s8b_group_inner_with_address_rejected() {
        let scope = Scope {
            chain_ids: vec![ChainId(1)],
            market_ids: Some(vec![MarketId::from("m1")]),
            addresses: None,
            protocol_tag: None,
        };
        let inner = Condition::Threshold {
            metric: "Morpho.Position.supplyShares".into(),
            operator: ComparisonOperator::Gt,
            value: 100.0,
            chain_id: Some(ChainId(1)),
            market_id: Some(MarketId::from("m1")),
            address: Some(Address::from("0x1")),
            window: None,
            filters: None,
        };
        let dsl = vec![Condition::Group {
            addresses: vec![Address::from("0x1")],
            requirement: GroupRequirement { count: 1, of: 1 },
            logic: Logic::And,
            conditions: vec![inner],
        }];
        let err = compile(&scope, None, Logic::And, &dsl).unwrap_err();
        assert_eq!(err.field_path(), Some("conditions[0].conditions[0].address"));
    }

    #[test]
    fn s8c_aggregate_position_without_scope_addresses_rejected() {
        let scope = Scope {
            chain_ids: vec![ChainId(1)],
            market_ids: Some(vec![MarketId::from("m1")]),
            addresses: None,
            protocol_tag: None,
        };
        let dsl = vec![Condition::Aggregate {
            aggregation: Aggregation::Sum,
            metric: "Morpho.Position.supplyShares".into(),
            operator: ComparisonOperator::Gt,
            value: 100.0,
            chain_id: Some(ChainId(1)),
            market_id: None,
            window: Some("1d".into()),
            filters: None,
        }];
        let err = compile(&scope, None, Logic::And, &dsl).unwrap_err();
        assert_eq!(err.field_path(), Some("conditions[0].addresses"));
    }

    #[test]
    fn s8d_change_direction_any_rejected() {
        let scope = scope_one_chain_one_market_one_address();
        let dsl = vec![Condition::Change {
            metric: "Morpho.Position.supplyShares".into(),
            direction: ChangeDirection::Any,
            by: ChangeBy::Percent(10.0),
            chain_id: Some(ChainId(1)),
            market_id: Some(MarketId::from("m1")),
            address: Some(Address::from("0xabc")),
            window: Some("1d".into()),
        }];
        let err = compile(&scope, None, Logic::And, &dsl).unwrap_err();
        assert_eq!(err.field_path(), Some("conditions[0].direction"));
    }

    #[test]
    fn percent_decrease_translates_correctly() {
        let scope = scope_one_chain_one_market_one_address();
        let dsl = vec![Condition::Change {
            metric: "Morpho.Position.supplyShares".into(),
            direction: ChangeDirection::Decrease,
            by: ChangeBy::Percent(20.0),
            chain_id: Some(ChainId(1)),
            market_id: Some(MarketId::from("m1")),
            address: Some(Address::from("0xabc")),
            window: Some("1d".into()),
        }];
        let stored = compile(&scope, None, Logic::And, &dsl).unwrap();
        match &stored.ast.conditions[0] {
            CompiledCondition::Simple(s) => assert_eq!(s.operator, ComparisonOperator::Lt),
            _ => panic!("expected Simple"),
        }
    }

    #[test]
    fn unknown_metric_rejected() {
        let scope = scope_one_chain_one_market_one_address();
        let dsl = vec![Condition::Threshold {
            metric: "Morpho.Market.doesNotExist".into(),
            operator: ComparisonOperator::Gt,
            value: 1.0,
            chain_id: Some(ChainId(1)),
            market_id: Some(MarketId::from("m1")),
            address: None,
            window: None,
            filters: None,
        }];
        let err = compile(&scope, None, Logic::And, &dsl).unwrap_err();
        assert!(matches!(err, SentinelError::UnknownMetric { .. }));
    }

    #[test]
    fn scope_violation_on_out_of_scope_chain() {
        let scope = scope_one_chain_one_market_one_address();
        let dsl = vec![Condition::Threshold {
            metric: "Morpho.Market.totalBorrowAssets".into(),
            operator: ComparisonOperator::Gt,
            value: 1.0,
            chain_id: Some(ChainId(999)),
            market_id: Some(MarketId::from("m1")),
            address: None,
            window: None,
            filters: None,
        }];
        let err = compile(&scope, None, Logic::And, &dsl).unwrap_err();
        assert!(matches!(err, SentinelError::ScopeViolation { .. }));
    }

    #[test]
    fn stored_definition_round_trips_through_serde() {
        let scope = scope_one_chain_one_market_one_address();
        let dsl = vec![Condition::Threshold {
            metric: "Morpho.Market.totalBorrowAssets".into(),
            operator: ComparisonOperator::Gt,
            value: 1_000_000.0,
            chain_id: Some(ChainId(1)),
            market_id: Some(MarketId::from("m1")),
            address: None,
            window: Some("1d".into()),
            filters: None,
        }];
        let stored = compile(&scope, None, Logic::And, &dsl).unwrap();
        let json = serde_json::to_string(&stored).unwrap();
        let back: StoredDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(back.ast, stored.ast);
    }
}
