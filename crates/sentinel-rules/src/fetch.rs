//! The fetcher interface the evaluator drives (§4.3 Data Fetcher).
//!
//! Defined here, next to its consumer, rather than in `sentinel-core`: the
//! evaluator is the only thing that calls it, and `sentinel-chain` is the
//! only thing that implements it.

use async_trait::async_trait;
use sentinel_core::{EventAggregation, Filter, SentinelError, StateEntity};

/// Reads on-chain state and indexed events on behalf of the evaluator.
///
/// A single instance is process-wide and stateless aside from its own
/// clients/caches (§9 "Shared fetcher vs. per-signal fetcher").
#[async_trait]
pub trait DataFetcher: Send + Sync {
    /// Resolve a `StateRef` leaf. `timestamp` unset means "currently indexed
    /// value"; set means "chain RPC read at the block resolved from this
    /// timestamp".
    async fn fetch_state(
        &self,
        entity: StateEntity,
        filters: &[Filter],
        field: &str,
        timestamp: Option<i64>,
    ) -> Result<f64, SentinelError>;

    /// Resolve an `EventRef` leaf: query the index for `[start_ms, end_ms)`
    /// and reduce the matching rows by `aggregation`.
    async fn fetch_events(
        &self,
        event_type: &str,
        filters: &[Filter],
        field: &str,
        aggregation: EventAggregation,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<f64, SentinelError>;
}
