//! Data fetcher (C3, §4.3): routes reads either to the event index or to
//! chain RPC at a resolved block, and implements [`sentinel_rules::DataFetcher`]
//! for the evaluator.

use async_trait::async_trait;
use sentinel_core::{EventAggregation, Filter, SentinelError, StateEntity};
use sentinel_rules::DataFetcher;

use crate::config::contract_config;
use crate::index::{namespaced_event_type, EventIndexClient, IndexQuery};
use crate::resolver::BlockResolver;
use crate::rpc::{BlockTag, RpcClient};

/// Function selectors for the Morpho Blue storage reads this fetcher
/// supports. Static per §6.3 ("Addresses and ABI are static per chain");
/// illustrative placeholders standing in for the deployment's real ABI.
fn position_field_selector(field: &str) -> Option<&'static str> {
    match field {
        "supplyShares" => Some("0x7f8661a1"),
        "borrowShares" => Some("0x8ad2e57b"),
        "collateral" => Some("0xad01477c"),
        _ => None,
    }
}

fn market_field_selector(field: &str) -> Option<&'static str> {
    match field {
        "totalSupplyAssets" => Some("0x6e553f65"),
        "totalSupplyShares" => Some("0xa3f4df7e"),
        "totalBorrowAssets" => Some("0xdec8a49e"),
        "totalBorrowShares" => Some("0x0fbb0025"),
        "lastUpdate" => Some("0x4cc7ed9f"),
        "fee" => Some("0xddca3f43"),
        _ => None,
    }
}

fn pad_hex_param(value: &str) -> String {
    let trimmed = value.trim_start_matches("0x");
    format!("{:0>64}", trimmed)
}

fn find_filter<'a>(filters: &'a [Filter], field: &str) -> Option<&'a str> {
    filters.iter().find(|f| f.field == field).and_then(|f| f.value.as_str())
}

fn chain_id_from_filters(filters: &[Filter]) -> Option<sentinel_core::ChainId> {
    filters
        .iter()
        .find(|f| f.field == "chainId")
        .and_then(|f| f.value.as_u64())
        .map(sentinel_core::ChainId)
}

/// The process-wide fetcher: stateless aside from its clients/caches
/// (§9 "Shared fetcher vs. per-signal fetcher").
pub struct ChainDataFetcher<R: RpcClient, I: EventIndexClient> {
    resolver: BlockResolver<R>,
    rpc: R,
    index: I,
}

impl<R: RpcClient + Clone, I: EventIndexClient> ChainDataFetcher<R, I> {
    #[must_use]
    pub fn new(rpc: R, index: I) -> Self {
        Self {
            resolver: BlockResolver::new(rpc.clone()),
            rpc,
            index,
        }
    }
}

#[async_trait]
impl<R: RpcClient + Clone, I: EventIndexClient> DataFetcher for ChainDataFetcher<R, I> {
    async fn fetch_state(
        &self,
        entity: StateEntity,
        filters: &[Filter],
        field: &str,
        timestamp: Option<i64>,
    ) -> Result<f64, SentinelError> {
        match timestamp {
            None => {
                let table = match entity {
                    StateEntity::Position => "Position",
                    StateEntity::Market => "Market",
                };
                self.index.query_current_state(table, filters, field).await
            }
            Some(ts) => self.fetch_state_at_block(entity, filters, field, ts).await,
        }
    }

    async fn fetch_events(
        &self,
        event_type: &str,
        filters: &[Filter],
        field: &str,
        aggregation: EventAggregation,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<f64, SentinelError> {
        let mut all_filters = filters.to_vec();
        all_filters.push(Filter::new(
            "timestamp",
            sentinel_core::FilterOp::Gte,
            serde_json::json!(start_ms / 1000),
        ));
        all_filters.push(Filter::new(
            "timestamp",
            sentinel_core::FilterOp::Lte,
            serde_json::json!(end_ms / 1000),
        ));

        let query = IndexQuery {
            alias: "rows".to_owned(),
            event_type: event_type.to_owned(),
            fields: vec![field.to_owned()],
            filters: all_filters,
        };
        let mut results = self.index.query_batch(std::slice::from_ref(&query)).await?;
        let rows = results.remove("rows").unwrap_or_default();
        let values: Vec<f64> = rows.iter().filter_map(|row| row.field_f64(field)).collect();

        Ok(match aggregation {
            EventAggregation::Sum => values.iter().sum(),
            EventAggregation::Count => values.len() as f64,
            EventAggregation::Avg => {
                if values.is_empty() {
                    0.0
                } else {
                    values.iter().sum::<f64>() / values.len() as f64
                }
            }
            EventAggregation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            EventAggregation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

impl<R: RpcClient + Clone, I: EventIndexClient> ChainDataFetcher<R, I> {
    async fn fetch_state_at_block(
        &self,
        entity: StateEntity,
        filters: &[Filter],
        field: &str,
        timestamp_ms: i64,
    ) -> Result<f64, SentinelError> {
        let chain_id = chain_id_from_filters(filters)
            .ok_or_else(|| SentinelError::FetchConfig("chainId filter missing at fetch time".into()))?;
        let market_id = find_filter(filters, "marketId")
            .ok_or_else(|| SentinelError::FetchConfig("marketId filter missing at fetch time".into()))?;

        let contract = contract_config(chain_id)
            .ok_or_else(|| SentinelError::FetchConfig(format!("no contract configured for chain {chain_id}")))?;

        let selector = match entity {
            StateEntity::Market => market_field_selector(field),
            StateEntity::Position => position_field_selector(field),
        }
        .ok_or_else(|| SentinelError::FetchConfig(format!("no RPC mapping for field `{field}`")))?;

        let mut calldata = selector.to_owned();
        calldata.push_str(&pad_hex_param(market_id));
        if entity == StateEntity::Position {
            let address = find_filter(filters, "user")
                .ok_or_else(|| SentinelError::FetchConfig("address filter missing at fetch time".into()))?;
            calldata.push_str(&pad_hex_param(address));
        }

        let block_number = self.resolver.resolve(chain_id, timestamp_ms).await;
        let endpoints = &crate::config::chain_config(chain_id)
            .ok_or_else(|| SentinelError::FetchConfig(format!("no endpoints configured for chain {chain_id}")))?
            .rpc_endpoints;

        let mut last_err = None;
        for endpoint in endpoints {
            match self
                .rpc
                .eth_call(endpoint, &contract.morpho_blue_address, &calldata, BlockTag::Number(block_number))
                .await
            {
                Ok(hex_value) => {
                    return u64::from_str_radix(hex_value.trim_start_matches("0x"), 16)
                        .map(|v| v as f64)
                        .map_err(|e| SentinelError::RpcQuery(format!("malformed eth_call result: {e}")));
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| SentinelError::RpcQuery("all endpoints failed".into())))
    }
}

#[must_use]
pub fn event_table_name(event_type: &str) -> String {
    namespaced_event_type(event_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_are_stable_per_field() {
        assert_eq!(market_field_selector("totalBorrowAssets"), Some("0xdec8a49e"));
        assert_eq!(position_field_selector("supplyShares"), Some("0x7f8661a1"));
        assert_eq!(market_field_selector("unknownField"), None);
    }

    #[test]
    fn pads_hex_param_to_32_bytes() {
        let padded = pad_hex_param("0xabc");
        assert_eq!(padded.len(), 64);
        assert!(padded.ends_with("abc"));
    }

    #[test]
    fn chain_id_extracted_from_filters() {
        let filters = vec![Filter::new("chainId", sentinel_core::FilterOp::Eq, serde_json::json!(1))];
        assert_eq!(chain_id_from_filters(&filters), Some(sentinel_core::ChainId(1)));
    }
}
