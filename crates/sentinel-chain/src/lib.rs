//! Chain RPC and event-index clients: block resolution (C2), the event
//! index (part of C3), and JSON-RPC reads against a Morpho Blue deployment
//! (the other half of C3), wired together into a [`fetcher::ChainDataFetcher`]
//! implementing [`sentinel_rules::DataFetcher`].

pub mod config;
pub mod fetcher;
pub mod index;
pub mod resolver;
pub mod rpc;

pub use config::{chain_config, contract_config, ChainConfig, ContractConfig, CHAIN_REGISTRY};
pub use fetcher::ChainDataFetcher;
pub use index::{EventIndexClient, EventRow, HttpEventIndexClient, IndexQuery};
pub use resolver::BlockResolver;
pub use rpc::{BlockInfo, BlockTag, HttpRpcClient, RpcClient};
