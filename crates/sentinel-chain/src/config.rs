//! Static per-chain configuration: genesis timestamp, average block time,
//! and the RPC endpoint list tried in order on failure (§6.3).

use std::collections::HashMap;
use std::sync::LazyLock;

use sentinel_core::ChainId;

/// Configuration for one supported chain.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub chain_id: ChainId,
    pub genesis_timestamp_ms: i64,
    pub avg_block_time_ms: i64,
    pub rpc_endpoints: Vec<String>,
}

/// The Morpho Blue contract address on a chain, for `eth_call` reads.
#[derive(Debug, Clone)]
pub struct ContractConfig {
    pub morpho_blue_address: String,
}

/// Process-wide, read-only chain registry. Populated from static
/// deployment configuration; real endpoint URLs are supplied via
/// environment at startup in `sentinel-server`/`sentinel-cli` and threaded
/// in here (this default set documents the expected shape only).
pub static CHAIN_REGISTRY: LazyLock<HashMap<u64, (ChainConfig, ContractConfig)>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    map.insert(
        1,
        (
            ChainConfig {
                chain_id: ChainId(1),
                genesis_timestamp_ms: 1_438_269_973_000,
                avg_block_time_ms: 12_000,
                rpc_endpoints: vec!["https://eth.llamarpc.com".to_owned()],
            },
            ContractConfig {
                morpho_blue_address: "0xbbbbbbbbbb9cc5e90e3b3af64bdaf62c37eeffcb".to_owned(),
            },
        ),
    );
    map.insert(
        8453,
        (
            ChainConfig {
                chain_id: ChainId(8453),
                genesis_timestamp_ms: 1_686_789_347_000,
                avg_block_time_ms: 2_000,
                rpc_endpoints: vec!["https://base.llamarpc.com".to_owned()],
            },
            ContractConfig {
                morpho_blue_address: "0xbbbbbbbbbb9cc5e90e3b3af64bdaf62c37eeffcb".to_owned(),
            },
        ),
    );
    map
});

#[must_use]
pub fn chain_config(chain_id: ChainId) -> Option<&'static ChainConfig> {
    CHAIN_REGISTRY.get(&chain_id.0).map(|(c, _)| c)
}

#[must_use]
pub fn contract_config(chain_id: ChainId) -> Option<&'static ContractConfig> {
    CHAIN_REGISTRY.get(&chain_id.0).map(|(_, c)| c)
}
