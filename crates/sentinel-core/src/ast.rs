//! The compiled condition AST, emitted by the compiler and walked by the
//! evaluator (§3 Compiled Condition).

use serde::{Deserialize, Serialize};

use crate::condition::{Aggregation, ComparisonOperator, GroupRequirement, Logic};
use crate::expr::ExpressionNode;
use crate::filter::Filter;
use crate::types::{Address, ChainId, MarketId};

/// A single left/operator/right comparison, the leaf unit the evaluator
/// ultimately reduces every condition shape to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Simple {
    pub left: ExpressionNode,
    pub operator: ComparisonOperator,
    pub right: ExpressionNode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
}

/// A compiled `Group` condition: one `Simple`-per-inner-condition template,
/// specialized per address at evaluation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledGroup {
    pub addresses: Vec<Address>,
    pub requirement: GroupRequirement,
    pub logic: Logic,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
    #[serde(rename = "perAddressConditions")]
    pub per_address_conditions: Vec<Simple>,
}

/// A compiled `Aggregate` condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledAggregate {
    pub aggregation: Aggregation,
    pub metric: String,
    pub operator: ComparisonOperator,
    pub value: f64,
    #[serde(rename = "chainId")]
    pub chain_id: ChainId,
    #[serde(rename = "marketIds", skip_serializing_if = "Option::is_none")]
    pub market_ids: Option<Vec<MarketId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<Address>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<Filter>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
}

/// One compiled clause, ready for evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CompiledCondition {
    Simple(Simple),
    CompiledGroup(CompiledGroup),
    CompiledAggregate(CompiledAggregate),
}

/// A compiled signal definition: top-level conditions combined by `logic`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledAst {
    pub logic: Logic,
    pub conditions: Vec<CompiledCondition>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{BinaryOp, EventAggregation, StateEntity};

    #[test]
    fn simple_condition_roundtrips() {
        let s = CompiledCondition::Simple(Simple {
            left: ExpressionNode::StateRef {
                entity: StateEntity::Market,
                filters: vec![],
                field: "totalBorrowAssets".into(),
                snapshot: "current".into(),
            },
            operator: ComparisonOperator::Gt,
            right: ExpressionNode::constant(1_000_000.0),
            window: Some("1d".into()),
        });
        let json = serde_json::to_string(&s).unwrap();
        let back: CompiledCondition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn compiled_ast_roundtrips() {
        let ast = CompiledAst {
            logic: Logic::And,
            conditions: vec![CompiledCondition::CompiledAggregate(CompiledAggregate {
                aggregation: Aggregation::Sum,
                metric: "Morpho.Market.totalBorrowAssets".into(),
                operator: ComparisonOperator::Gt,
                value: 1000.0,
                chain_id: ChainId(1),
                market_ids: Some(vec![MarketId::from("m1"), MarketId::from("m2")]),
                addresses: None,
                filters: None,
                window: Some("1d".into()),
            })],
        };
        let json = serde_json::to_string(&ast).unwrap();
        let back: CompiledAst = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ast);
    }

    #[test]
    fn event_ref_with_chained_binary_roundtrips() {
        let node = ExpressionNode::binary(
            BinaryOp::Sub,
            ExpressionNode::EventRef {
                event_type: "Supply".into(),
                filters: vec![],
                field: "assets".into(),
                aggregation: EventAggregation::Sum,
                window: None,
            },
            ExpressionNode::EventRef {
                event_type: "Withdraw".into(),
                filters: vec![],
                field: "assets".into(),
                aggregation: EventAggregation::Sum,
                window: None,
            },
        );
        let json = serde_json::to_string(&node).unwrap();
        let back: ExpressionNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }
}
