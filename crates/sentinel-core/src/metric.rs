//! The static, process-wide metric registry (C1). The sole source of truth
//! for what a condition may reference; the compiler rejects anything absent
//! here.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::expr::{EventAggregation, StateEntity};

/// Entity/field a `state` metric resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMetricDescriptor {
    pub entity: StateEntity,
    pub field: String,
}

/// A derived metric computed from two other metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Computation {
    Ratio,
    Difference,
}

/// Event field/aggregation a `event` metric resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetricDescriptor {
    pub event_type: String,
    pub field: String,
    pub aggregation: EventAggregation,
}

/// Combination of two event metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainedOperation {
    Add,
    Sub,
}

/// A registry entry: one named metric, one shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricDescriptor {
    State(StateMetricDescriptor),
    Computed {
        computation: Computation,
        operands: [String; 2],
    },
    Event(EventMetricDescriptor),
    ChainedEvent {
        operation: ChainedOperation,
        operands: [String; 2],
    },
}

impl MetricDescriptor {
    /// The `StateEntity` this metric ultimately resolves through, if any.
    /// `Computed` metrics inherit from their first operand.
    #[must_use]
    pub fn entity(&self, registry: &MetricRegistry) -> Option<StateEntity> {
        match self {
            Self::State(s) => Some(s.entity),
            Self::Computed { operands, .. } => registry.get(&operands[0]).and_then(|d| d.entity(registry)),
            Self::Event(_) | Self::ChainedEvent { .. } => None,
        }
    }

    #[must_use]
    pub fn protocol(name: &str) -> Option<&str> {
        name.split('.').next()
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::State(_) => "state",
            Self::Computed { .. } => "computed",
            Self::Event(_) => "event",
            Self::ChainedEvent { .. } => "chained_event",
        }
    }
}

/// Read-only mapping from dotted metric name to its descriptor.
pub struct MetricRegistry {
    entries: HashMap<&'static str, MetricDescriptor>,
}

impl MetricRegistry {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MetricDescriptor> {
        self.entries.get(name)
    }

    /// `UnknownMetric` check used by the compiler.
    #[must_use]
    pub fn validate_existence(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Metrics whose dotted name begins with `protocol.`.
    #[must_use]
    pub fn list_by_protocol(&self, protocol: &str) -> Vec<&'static str> {
        self.entries
            .keys()
            .filter(|name| MetricDescriptor::protocol(name) == Some(protocol))
            .copied()
            .collect()
    }

    /// Metrics whose descriptor kind matches `kind` (`"state"`, `"computed"`,
    /// `"event"`, `"chained_event"`).
    #[must_use]
    pub fn list_by_kind(&self, kind: &str) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|(_, descriptor)| descriptor.kind_name() == kind)
            .map(|(name, _)| *name)
            .collect()
    }
}

/// The process-wide metric registry, populated with the Morpho Blue metric
/// set this deployment ships.
pub static METRIC_REGISTRY: LazyLock<MetricRegistry> = LazyLock::new(build_registry);

fn build_registry() -> MetricRegistry {
    let mut entries = HashMap::new();

    macro_rules! state {
        ($name:expr, $entity:expr, $field:expr) => {
            entries.insert(
                $name,
                MetricDescriptor::State(StateMetricDescriptor {
                    entity: $entity,
                    field: $field.to_owned(),
                }),
            );
        };
    }
    macro_rules! event {
        ($name:expr, $event_type:expr, $field:expr, $agg:expr) => {
            entries.insert(
                $name,
                MetricDescriptor::Event(EventMetricDescriptor {
                    event_type: $event_type.to_owned(),
                    field: $field.to_owned(),
                    aggregation: $agg,
                }),
            );
        };
    }

    state!("Morpho.Position.supplyShares", StateEntity::Position, "supplyShares");
    state!("Morpho.Position.borrowShares", StateEntity::Position, "borrowShares");
    state!("Morpho.Position.collateral", StateEntity::Position, "collateral");

    state!("Morpho.Market.totalSupplyAssets", StateEntity::Market, "totalSupplyAssets");
    state!("Morpho.Market.totalSupplyShares", StateEntity::Market, "totalSupplyShares");
    state!("Morpho.Market.totalBorrowAssets", StateEntity::Market, "totalBorrowAssets");
    state!("Morpho.Market.totalBorrowShares", StateEntity::Market, "totalBorrowShares");
    state!("Morpho.Market.lastUpdate", StateEntity::Market, "lastUpdate");
    state!("Morpho.Market.fee", StateEntity::Market, "fee");

    entries.insert(
        "Morpho.Market.utilization",
        MetricDescriptor::Computed {
            computation: Computation::Ratio,
            operands: [
                "Morpho.Market.totalBorrowAssets".to_owned(),
                "Morpho.Market.totalSupplyAssets".to_owned(),
            ],
        },
    );
    entries.insert(
        "Morpho.Market.availableLiquidity",
        MetricDescriptor::Computed {
            computation: Computation::Difference,
            operands: [
                "Morpho.Market.totalSupplyAssets".to_owned(),
                "Morpho.Market.totalBorrowAssets".to_owned(),
            ],
        },
    );

    event!("Morpho.Supply.assets", "Supply", "assets", EventAggregation::Sum);
    event!("Morpho.Withdraw.assets", "Withdraw", "assets", EventAggregation::Sum);
    event!("Morpho.Borrow.assets", "Borrow", "assets", EventAggregation::Sum);
    event!("Morpho.Repay.assets", "Repay", "assets", EventAggregation::Sum);
    event!("Morpho.Liquidate.repaidAssets", "Liquidate", "repaidAssets", EventAggregation::Sum);

    entries.insert(
        "Morpho.Flow.netSupply",
        MetricDescriptor::ChainedEvent {
            operation: ChainedOperation::Sub,
            operands: ["Morpho.Supply.assets".to_owned(), "Morpho.Withdraw.assets".to_owned()],
        },
    );
    entries.insert(
        "Morpho.Flow.netBorrow",
        MetricDescriptor::ChainedEvent {
            operation: ChainedOperation::Sub,
            operands: ["Morpho.Borrow.assets".to_owned(), "Morpho.Repay.assets".to_owned()],
        },
    );

    MetricRegistry { entries }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_metric_validates() {
        assert!(METRIC_REGISTRY.validate_existence("Morpho.Market.totalBorrowAssets"));
        assert!(!METRIC_REGISTRY.validate_existence("Morpho.Market.doesNotExist"));
    }

    #[test]
    fn position_metric_is_position_entity() {
        let descriptor = METRIC_REGISTRY.get("Morpho.Position.supplyShares").unwrap();
        assert_eq!(descriptor.entity(&METRIC_REGISTRY), Some(StateEntity::Position));
    }

    #[test]
    fn computed_metric_inherits_entity() {
        let descriptor = METRIC_REGISTRY.get("Morpho.Market.utilization").unwrap();
        assert_eq!(descriptor.entity(&METRIC_REGISTRY), Some(StateEntity::Market));
    }

    #[test]
    fn list_by_protocol_filters_prefix() {
        let names = METRIC_REGISTRY.list_by_protocol("Morpho");
        assert!(names.contains(&"Morpho.Market.totalBorrowAssets"));
    }

    #[test]
    fn list_by_kind_filters_event_metrics() {
        let names = METRIC_REGISTRY.list_by_kind("event");
        assert!(names.contains(&"Morpho.Supply.assets"));
        assert!(!names.contains(&"Morpho.Market.totalBorrowAssets"));
    }

    #[test]
    fn chained_event_metric_present() {
        let descriptor = METRIC_REGISTRY.get("Morpho.Flow.netSupply").unwrap();
        assert_eq!(descriptor.kind_name(), "chained_event");
    }
}
