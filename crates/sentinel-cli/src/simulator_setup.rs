//! Shared construction of a [`Simulator`] from CLI flags for the
//! simulate/sweep/first-trigger commands.

use std::sync::Arc;

use sentinel_chain::{BlockResolver, ChainDataFetcher, HttpEventIndexClient, HttpRpcClient};
use sentinel_simulator::Simulator;

pub fn build_simulator(event_index_url: &str) -> Simulator<HttpRpcClient> {
    let rpc = HttpRpcClient::new();
    let resolver = Arc::new(BlockResolver::new(rpc.clone()));
    let fetcher = Arc::new(ChainDataFetcher::new(rpc, HttpEventIndexClient::new(event_index_url)));
    Simulator::new(resolver, fetcher)
}
