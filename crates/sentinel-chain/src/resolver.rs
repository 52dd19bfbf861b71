//! Block-by-timestamp resolver (C2, §4.2).

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use sentinel_core::ChainId;
use tracing::instrument;

use crate::config::chain_config;
use crate::rpc::{BlockInfo, BlockTag, RpcClient};

const DEFAULT_CACHE_CAPACITY: usize = 1000;
const MAX_BINARY_SEARCH_ITERATIONS: u32 = 50;

/// `(chain, timestamp-seconds) → block-number`, resident in an in-process
/// LRU of bounded size (§3 Cached Block Lookup).
///
/// The cache is the only mutable process-wide state in this crate; a single
/// mutex around it is fine at the specified cadence (§9 "Cache concurrency").
pub struct BlockResolver<R: RpcClient> {
    rpc: R,
    cache: Mutex<LruCache<(u64, i64), u64>>,
}

impl<R: RpcClient> BlockResolver<R> {
    #[must_use]
    pub fn new(rpc: R) -> Self {
        Self::with_capacity(rpc, DEFAULT_CACHE_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(rpc: R, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            rpc,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Resolve a wall-clock timestamp to a block number on `chain_id`.
    ///
    /// `timestamp ≤ genesis → 0`; `timestamp ≥ latest → latest block
    /// number`. A single RPC failure is never surfaced to the caller: the
    /// resolver retries across configured endpoints, then falls back to a
    /// linear-extrapolation estimate, caching the result either way.
    #[instrument(skip(self))]
    pub async fn resolve(&self, chain_id: ChainId, timestamp_ms: i64) -> u64 {
        let seconds = timestamp_ms / 1000;
        if let Some(block) = self.cache_get(chain_id, seconds) {
            return block;
        }

        let block = match chain_config(chain_id) {
            Some(config) => self.resolve_supported(config, timestamp_ms).await,
            None => Self::estimate_unsupported(timestamp_ms),
        };

        self.cache_put(chain_id, seconds, block);
        block
    }

    async fn resolve_supported(&self, config: &crate::config::ChainConfig, timestamp_ms: i64) -> u64 {
        if timestamp_ms <= config.genesis_timestamp_ms {
            return 0;
        }

        let Some(latest) = self.fetch_latest(&config.rpc_endpoints).await else {
            return Self::estimate_from_genesis(config, timestamp_ms);
        };

        if timestamp_ms >= latest.timestamp_ms {
            return latest.number;
        }

        let estimate = estimate_block_number(config, timestamp_ms, latest);
        self.binary_search(&config.rpc_endpoints, timestamp_ms, estimate, latest.number)
            .await
            .unwrap_or(estimate)
    }

    async fn fetch_latest(&self, endpoints: &[String]) -> Option<BlockInfo> {
        for endpoint in endpoints {
            if let Ok(block) = self.rpc.get_block(endpoint, BlockTag::Latest).await {
                return Some(block);
            }
        }
        None
    }

    /// Binary-search `[0, upper_bound]` for the highest block whose
    /// timestamp is `≤ target`, seeded by `estimate`, capped at 50
    /// iterations across however many endpoints are tried per probe.
    async fn binary_search(
        &self,
        endpoints: &[String],
        target_ms: i64,
        estimate: u64,
        upper_bound: u64,
    ) -> Option<u64> {
        let mut lo: u64 = 0;
        let mut hi: u64 = upper_bound;
        let mut best: Option<u64> = None;
        let mut probe = estimate.min(upper_bound);

        for _ in 0..MAX_BINARY_SEARCH_ITERATIONS {
            if lo > hi {
                break;
            }
            let block = self.fetch_block(endpoints, probe).await?;
            if block.timestamp_ms <= target_ms {
                best = Some(block.number);
                if block.number == hi {
                    break;
                }
                lo = block.number + 1;
            } else {
                if block.number == 0 {
                    break;
                }
                hi = block.number - 1;
            }
            if lo > hi {
                break;
            }
            probe = lo + (hi - lo) / 2;
        }

        best
    }

    async fn fetch_block(&self, endpoints: &[String], number: u64) -> Option<BlockInfo> {
        for endpoint in endpoints {
            if let Ok(block) = self.rpc.get_block(endpoint, BlockTag::Number(number)).await {
                return Some(block);
            }
        }
        None
    }

    fn estimate_from_genesis(config: &crate::config::ChainConfig, timestamp_ms: i64) -> u64 {
        let elapsed = (timestamp_ms - config.genesis_timestamp_ms).max(0);
        u64::try_from(elapsed / config.avg_block_time_ms.max(1)).unwrap_or(u64::MAX)
    }

    /// No chain config at all: degrade to a coarse linear estimate from a
    /// fixed reference point rather than fail the caller (§4.2 "Unsupported
    /// chain id → estimator path").
    fn estimate_unsupported(timestamp_ms: i64) -> u64 {
        const REFERENCE_TIMESTAMP_MS: i64 = 1_438_269_973_000;
        const REFERENCE_BLOCK_TIME_MS: i64 = 12_000;
        let elapsed = (timestamp_ms - REFERENCE_TIMESTAMP_MS).max(0);
        u64::try_from(elapsed / REFERENCE_BLOCK_TIME_MS).unwrap_or(u64::MAX)
    }

    fn cache_get(&self, chain_id: ChainId, seconds: i64) -> Option<u64> {
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&(chain_id.0, seconds))
            .copied()
    }

    fn cache_put(&self, chain_id: ChainId, seconds: i64, block: u64) {
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .put((chain_id.0, seconds), block);
    }
}

fn estimate_block_number(config: &crate::config::ChainConfig, target_ms: i64, latest: BlockInfo) -> u64 {
    let elapsed_ms = (latest.timestamp_ms - target_ms).max(0);
    let blocks_back = u64::try_from(elapsed_ms / config.avg_block_time_ms.max(1)).unwrap_or(latest.number);
    latest.number.saturating_sub(blocks_back)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sentinel_core::SentinelError;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// An in-memory "chain": a sorted block-number → timestamp table,
    /// letting the resolver's binary search run against deterministic data.
    struct FakeChain {
        blocks: BTreeMap<u64, i64>,
        latest: u64,
        calls: AtomicUsize,
    }

    impl FakeChain {
        fn new(block_time_ms: i64, genesis_ms: i64, count: u64) -> Self {
            let blocks = (0..=count).map(|n| (n, genesis_ms + n as i64 * block_time_ms)).collect();
            Self {
                blocks,
                latest: count,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RpcClient for FakeChain {
        async fn get_block(&self, _endpoint: &str, tag: BlockTag) -> Result<BlockInfo, SentinelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let number = match tag {
                BlockTag::Latest => self.latest,
                BlockTag::Number(n) => n,
            };
            self.blocks
                .get(&number)
                .map(|&timestamp_ms| BlockInfo { number, timestamp_ms })
                .ok_or_else(|| SentinelError::RpcQuery("no such block".into()))
        }

        async fn eth_call(&self, _endpoint: &str, _to: &str, _data: &str, _tag: BlockTag) -> Result<String, SentinelError> {
            Err(SentinelError::RpcQuery("not used in this test".into()))
        }
    }

    fn config_for(chain_id: ChainId, genesis_ms: i64, block_time_ms: i64) -> crate::config::ChainConfig {
        crate::config::ChainConfig {
            chain_id,
            genesis_timestamp_ms: genesis_ms,
            avg_block_time_ms: block_time_ms,
            rpc_endpoints: vec!["fake://chain".to_owned()],
        }
    }

    #[tokio::test]
    async fn binary_search_finds_exact_block() {
        let chain = FakeChain::new(12_000, 0, 1000);
        let config = config_for(ChainId(1), 0, 12_000);
        let resolver = BlockResolver::new(chain);
        // Targeting block 500's timestamp exactly.
        let target = 500 * 12_000;
        let found = resolver.resolve_supported(&config, target).await;
        assert_eq!(found, 500);
    }

    #[tokio::test]
    async fn timestamp_at_or_before_genesis_resolves_to_zero() {
        let chain = FakeChain::new(12_000, 1_000_000, 1000);
        let config = config_for(ChainId(1), 1_000_000, 12_000);
        let resolver = BlockResolver::new(chain);
        assert_eq!(resolver.resolve_supported(&config, 500_000).await, 0);
        assert_eq!(resolver.resolve_supported(&config, 1_000_000).await, 0);
    }

    #[tokio::test]
    async fn timestamp_at_or_after_latest_resolves_to_latest() {
        let chain = FakeChain::new(12_000, 0, 1000);
        let config = config_for(ChainId(1), 0, 12_000);
        let resolver = BlockResolver::new(chain);
        let latest_timestamp = 1000 * 12_000;
        assert_eq!(resolver.resolve_supported(&config, latest_timestamp + 1).await, 1000);
    }

    #[tokio::test]
    async fn unsupported_chain_uses_estimator() {
        let chain = FakeChain::new(12_000, 0, 1);
        let resolver = BlockResolver::new(chain);
        let block = resolver.resolve(ChainId(999_999), 2_000_000_000_000).await;
        assert!(block > 0);
    }

    #[tokio::test]
    async fn cache_short_circuits_repeat_lookups() {
        let chain = FakeChain::new(12_000, 0, 1000);
        let config = config_for(ChainId(1), 0, 12_000);
        let resolver = BlockResolver::new(chain);
        let target = 500 * 12_000;
        let first = resolver.resolve_supported(&config, target).await;
        let calls_after_first = resolver.rpc.calls.load(Ordering::SeqCst);
        resolver.cache_put(ChainId(1), target / 1000, first);
        assert_eq!(resolver.cache_get(ChainId(1), target / 1000), Some(first));
        assert!(calls_after_first > 0);
    }

    #[tokio::test]
    async fn monotonic_non_decreasing_in_timestamp() {
        let chain = FakeChain::new(12_000, 0, 1000);
        let config = config_for(ChainId(1), 0, 12_000);
        let resolver = BlockResolver::new(chain);
        let early = resolver.resolve_supported(&config, 100 * 12_000).await;
        let late = resolver.resolve_supported(&config, 200 * 12_000).await;
        assert!(late >= early);
    }
}
