//! The user-facing condition DSL (§3 Condition).

use serde::{Deserialize, Serialize};

use crate::filter::Filter;
use crate::types::{Address, ChainId, MarketId};

/// Comparison operator shared by the DSL and the compiled AST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Neq,
}

impl ComparisonOperator {
    /// Parse the DSL's symbolic form (`>`, `>=`, `<`, `<=`, `==`, `!=`).
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Gte),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Lte),
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Neq),
            _ => None,
        }
    }
}

/// Direction of change a `Change` condition watches for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDirection {
    Increase,
    Decrease,
    /// Reserved for future use; rejected at compile time.
    Any,
}

/// How a `Change` condition's magnitude is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeBy {
    Percent(f64),
    Absolute(f64),
}

/// `{count, of}` requirement on a `Group` condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRequirement {
    pub count: usize,
    pub of: usize,
}

/// Boolean combinator applied across a list of condition results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Logic {
    And,
    Or,
}

/// Aggregation function applied across an `Aggregate` condition's targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

/// One clause of a signal definition, as authored by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    Threshold {
        metric: String,
        operator: ComparisonOperator,
        value: f64,
        #[serde(rename = "chainId", skip_serializing_if = "Option::is_none")]
        chain_id: Option<ChainId>,
        #[serde(rename = "marketId", skip_serializing_if = "Option::is_none")]
        market_id: Option<MarketId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        address: Option<Address>,
        #[serde(skip_serializing_if = "Option::is_none")]
        window: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        filters: Option<Vec<Filter>>,
    },
    Change {
        metric: String,
        direction: ChangeDirection,
        by: ChangeBy,
        #[serde(rename = "chainId", skip_serializing_if = "Option::is_none")]
        chain_id: Option<ChainId>,
        #[serde(rename = "marketId", skip_serializing_if = "Option::is_none")]
        market_id: Option<MarketId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        address: Option<Address>,
        #[serde(skip_serializing_if = "Option::is_none")]
        window: Option<String>,
    },
    Group {
        addresses: Vec<Address>,
        requirement: GroupRequirement,
        logic: Logic,
        conditions: Vec<Condition>,
    },
    Aggregate {
        aggregation: Aggregation,
        metric: String,
        operator: ComparisonOperator,
        value: f64,
        #[serde(rename = "chainId", skip_serializing_if = "Option::is_none")]
        chain_id: Option<ChainId>,
        #[serde(rename = "marketId", skip_serializing_if = "Option::is_none")]
        market_id: Option<MarketId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        window: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        filters: Option<Vec<Filter>>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_mapping() {
        assert_eq!(ComparisonOperator::from_symbol(">"), Some(ComparisonOperator::Gt));
        assert_eq!(ComparisonOperator::from_symbol("!="), Some(ComparisonOperator::Neq));
        assert_eq!(ComparisonOperator::from_symbol("~="), None);
    }

    #[test]
    fn threshold_roundtrips() {
        let c = Condition::Threshold {
            metric: "Morpho.Market.totalBorrowAssets".into(),
            operator: ComparisonOperator::Gt,
            value: 1_000_000.0,
            chain_id: Some(ChainId(1)),
            market_id: Some(MarketId::from("m1")),
            address: None,
            window: Some("1d".into()),
            filters: None,
        };
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"type\":\"threshold\""));
        let back: Condition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn group_roundtrips() {
        let c = Condition::Group {
            addresses: vec![Address::from("0x1"), Address::from("0x2")],
            requirement: GroupRequirement { count: 1, of: 2 },
            logic: Logic::And,
            conditions: vec![],
        };
        let json = serde_json::to_string(&c).unwrap();
        let back: Condition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
