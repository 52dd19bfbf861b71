//! Domain types, metric registry, and DSL/AST definitions for Sentinel.
//!
//! This crate is the shared vocabulary other Sentinel crates build on: the
//! condition DSL a user authors, the compiled AST the evaluator walks, the
//! metric registry naming what a condition may reference, and the signal
//! and audit entities persisted around them.

pub mod ast;
pub mod condition;
pub mod duration;
pub mod error;
pub mod expr;
pub mod filter;
pub mod metric;
pub mod notification;
pub mod scope;
pub mod signal;
pub mod types;

pub use ast::{CompiledAggregate, CompiledAst, CompiledCondition, CompiledGroup, Simple};
pub use condition::{
    Aggregation, ChangeBy, ChangeDirection, ComparisonOperator, Condition, GroupRequirement, Logic,
};
pub use duration::{format_duration, parse_duration, parse_duration_at};
pub use error::{Result, SentinelError};
pub use expr::{BinaryOp, EventAggregation, ExpressionNode, StateEntity};
pub use filter::{Filter, FilterOp, RESERVED_EVENT_FILTER_FIELDS};
pub use metric::{MetricDescriptor, MetricRegistry, METRIC_REGISTRY};
pub use notification::{ConditionOutcome, NotificationRecord, NotificationStatus, RunLogRecord};
pub use scope::Scope;
pub use signal::{
    BareDefinition, DefinitionEnvelope, Signal, StoredDefinition, CURRENT_DEFINITION_VERSION,
};
pub use types::{Address, ChainId, MarketId, ProtocolTag, SignalId, UserId};
