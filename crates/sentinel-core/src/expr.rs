//! The compiled expression tree the evaluator walks (§3 ExpressionNode).

use serde::{Deserialize, Serialize};

use crate::filter::Filter;

/// Entity a `StateRef` reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum StateEntity {
    Position,
    Market,
}

/// Aggregation applied to the rows an `EventRef` matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAggregation {
    Sum,
    Count,
    Avg,
    Min,
    Max,
}

/// Arithmetic operator combining two expression nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// A leaf or internal node of the compiled arithmetic tree.
///
/// The tree is owned and acyclic: a parent holds its children by value, so
/// group expansion clones a subtree once per address rather than sharing
/// references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ExpressionNode {
    Constant {
        value: f64,
    },
    StateRef {
        entity: StateEntity,
        #[serde(default)]
        filters: Vec<Filter>,
        field: String,
        /// `"current"`, `"window_start"`, or an arbitrary duration string
        /// (§9 open question: the evaluator accepts this; the compiler
        /// only ever emits `current`/`window_start`).
        snapshot: String,
    },
    EventRef {
        #[serde(rename = "eventType")]
        event_type: String,
        #[serde(default)]
        filters: Vec<Filter>,
        field: String,
        aggregation: EventAggregation,
        #[serde(skip_serializing_if = "Option::is_none")]
        window: Option<String>,
    },
    BinaryExpression {
        operator: BinaryOp,
        left: Box<ExpressionNode>,
        right: Box<ExpressionNode>,
    },
}

impl ExpressionNode {
    #[must_use]
    pub fn constant(value: f64) -> Self {
        Self::Constant { value }
    }

    #[must_use]
    pub fn binary(operator: BinaryOp, left: ExpressionNode, right: ExpressionNode) -> Self {
        Self::BinaryExpression {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Overlay a `user = address` filter onto every `StateRef`/`EventRef`
    /// this tree contains, replacing any existing `user` filter. Used by
    /// group evaluation to specialize a shared inner condition per address.
    #[must_use]
    pub fn with_user_filter(&self, address: &str) -> Self {
        match self {
            Self::Constant { value } => Self::Constant { value: *value },
            Self::StateRef {
                entity,
                filters,
                field,
                snapshot,
            } => Self::StateRef {
                entity: *entity,
                filters: overlay_user(filters, address),
                field: field.clone(),
                snapshot: snapshot.clone(),
            },
            Self::EventRef {
                event_type,
                filters,
                field,
                aggregation,
                window,
            } => Self::EventRef {
                event_type: event_type.clone(),
                filters: overlay_user(filters, address),
                field: field.clone(),
                aggregation: *aggregation,
                window: window.clone(),
            },
            Self::BinaryExpression {
                operator,
                left,
                right,
            } => Self::BinaryExpression {
                operator: *operator,
                left: Box::new(left.with_user_filter(address)),
                right: Box::new(right.with_user_filter(address)),
            },
        }
    }
}

fn overlay_user(filters: &[Filter], address: &str) -> Vec<Filter> {
    let mut out: Vec<Filter> = filters.iter().filter(|f| f.field != "user").cloned().collect();
    out.push(Filter::new(
        "user",
        crate::filter::FilterOp::Eq,
        serde_json::json!(address),
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_expression_roundtrips() {
        let node = ExpressionNode::binary(
            BinaryOp::Div,
            ExpressionNode::StateRef {
                entity: StateEntity::Market,
                filters: vec![],
                field: "totalBorrowAssets".into(),
                snapshot: "current".into(),
            },
            ExpressionNode::constant(1_000_000.0),
        );
        let json = serde_json::to_string(&node).unwrap();
        let back: ExpressionNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn with_user_filter_replaces_existing() {
        let node = ExpressionNode::StateRef {
            entity: StateEntity::Position,
            filters: vec![Filter::new(
                "user",
                crate::filter::FilterOp::Eq,
                serde_json::json!("0xold"),
            )],
            field: "supplyShares".into(),
            snapshot: "current".into(),
        };
        let overlaid = node.with_user_filter("0xnew");
        match overlaid {
            ExpressionNode::StateRef { filters, .. } => {
                assert_eq!(filters.len(), 1);
                assert_eq!(filters[0].value, serde_json::json!("0xnew"));
            }
            _ => panic!("expected StateRef"),
        }
    }

    #[test]
    fn with_user_filter_recurses_into_binary() {
        let node = ExpressionNode::binary(
            BinaryOp::Sub,
            ExpressionNode::StateRef {
                entity: StateEntity::Position,
                filters: vec![],
                field: "supplyShares".into(),
                snapshot: "current".into(),
            },
            ExpressionNode::constant(0.0),
        );
        let overlaid = node.with_user_filter("0xa");
        if let ExpressionNode::BinaryExpression { left, .. } = overlaid {
            if let ExpressionNode::StateRef { filters, .. } = *left {
                assert_eq!(filters.len(), 1);
            } else {
                panic!("expected StateRef on left");
            }
        } else {
            panic!("expected BinaryExpression");
        }
    }
}
