//! Filters narrow a `StateRef`/`EventRef` read to specific rows (§3 Filter).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Filter field names reserved for event-index queries; the fetcher injects
/// these automatically from a condition's scope and rejects a user-supplied
/// filter that collides with one.
pub const RESERVED_EVENT_FILTER_FIELDS: &[&str] =
    &["chainId", "marketId", "market_id", "user", "onBehalf", "timestamp"];

/// A single `field op value` restriction applied to a metric read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

/// Comparison used when narrowing rows by a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Contains,
}

impl Filter {
    #[must_use]
    pub fn new(field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }

    /// `true` if this filter's field name collides with one the fetcher
    /// injects automatically from scope.
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        RESERVED_EVENT_FILTER_FIELDS.contains(&self.field.as_str())
    }

    /// Evaluate this filter against a JSON row value for `self.field`.
    #[must_use]
    pub fn matches(&self, field_value: &Value) -> bool {
        match self.op {
            FilterOp::Eq => field_value == &self.value,
            FilterOp::Neq => field_value != &self.value,
            FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
                match (field_value.as_f64(), self.value.as_f64()) {
                    (Some(a), Some(b)) => match self.op {
                        FilterOp::Gt => a > b,
                        FilterOp::Gte => a >= b,
                        FilterOp::Lt => a < b,
                        FilterOp::Lte => a <= b,
                        _ => unreachable!(),
                    },
                    _ => false,
                }
            }
            FilterOp::In => self
                .value
                .as_array()
                .is_some_and(|values| values.contains(field_value)),
            FilterOp::Contains => match (field_value.as_str(), self.value.as_str()) {
                (Some(haystack), Some(needle)) => haystack.contains(needle),
                _ => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reserved_fields_detected() {
        let f = Filter::new("chainId", FilterOp::Eq, json!(1));
        assert!(f.is_reserved());
        let f = Filter::new("ltv", FilterOp::Gt, json!(0.8));
        assert!(!f.is_reserved());
    }

    #[test]
    fn numeric_comparisons() {
        let f = Filter::new("ltv", FilterOp::Gt, json!(0.8));
        assert!(f.matches(&json!(0.9)));
        assert!(!f.matches(&json!(0.5)));
    }

    #[test]
    fn in_operator() {
        let f = Filter::new("kind", FilterOp::In, json!(["a", "b"]));
        assert!(f.matches(&json!("a")));
        assert!(!f.matches(&json!("c")));
    }

    #[test]
    fn contains_operator_on_strings() {
        let f = Filter::new("label", FilterOp::Contains, json!("mor"));
        assert!(f.matches(&json!("morpho-blue")));
        assert!(!f.matches(&json!("aave")));
    }

    #[test]
    fn type_mismatch_is_non_match_not_panic() {
        let f = Filter::new("ltv", FilterOp::Gt, json!("not-a-number"));
        assert!(!f.matches(&json!(1.0)));
    }
}
