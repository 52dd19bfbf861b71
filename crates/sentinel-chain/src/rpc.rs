//! JSON-RPC 2.0 client for chain reads (§6.3).

use std::time::Duration;

use async_trait::async_trait;
use sentinel_core::SentinelError;
use serde::Deserialize;
use serde_json::json;

const RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// A block's number and timestamp, as returned by `eth_getBlockByNumber`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub number: u64,
    pub timestamp_ms: i64,
}

/// Which block to fetch: a specific number, or the chain tip.
#[derive(Debug, Clone, Copy)]
pub enum BlockTag {
    Number(u64),
    Latest,
}

impl BlockTag {
    fn to_rpc_param(self) -> String {
        match self {
            Self::Number(n) => format!("0x{n:x}"),
            Self::Latest => "latest".to_owned(),
        }
    }
}

/// Thin JSON-RPC 2.0 surface the block resolver and data fetcher depend on.
/// Abstracted behind a trait so the resolver's binary-search and retry
/// logic can be exercised without a live endpoint.
#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn get_block(&self, endpoint: &str, tag: BlockTag) -> Result<BlockInfo, SentinelError>;

    async fn eth_call(&self, endpoint: &str, to: &str, data: &str, tag: BlockTag) -> Result<String, SentinelError>;
}

/// `reqwest`-backed JSON-RPC client, one shared instance per process
/// (§9 "Shared fetcher vs. per-signal fetcher"). Cloning is cheap:
/// `reqwest::Client` is `Arc`-backed internally.
#[derive(Clone)]
pub struct HttpRpcClient {
    client: reqwest::Client,
}

impl HttpRpcClient {
    #[must_use]
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    async fn call(&self, endpoint: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value, SentinelError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .client
            .post(endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| SentinelError::RpcQuery(format!("{endpoint}: {e}")))?;
        let parsed: RpcEnvelope = response
            .json()
            .await
            .map_err(|e| SentinelError::RpcQuery(format!("{endpoint}: invalid response: {e}")))?;
        match parsed.error {
            Some(err) => Err(SentinelError::RpcQuery(format!("{endpoint}: {}", err.message))),
            None => parsed
                .result
                .ok_or_else(|| SentinelError::RpcQuery(format!("{endpoint}: empty result"))),
        }
    }
}

impl Default for HttpRpcClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    result: Option<serde_json::Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct BlockResult {
    number: String,
    timestamp: String,
}

fn parse_hex_u64(s: &str) -> Result<u64, SentinelError> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| SentinelError::RpcQuery(format!("malformed hex quantity `{s}`: {e}")))
}

#[async_trait]
impl RpcClient for HttpRpcClient {
    async fn get_block(&self, endpoint: &str, tag: BlockTag) -> Result<BlockInfo, SentinelError> {
        let value = self
            .call(endpoint, "eth_getBlockByNumber", json!([tag.to_rpc_param(), false]))
            .await?;
        let block: BlockResult = serde_json::from_value(value)
            .map_err(|e| SentinelError::RpcQuery(format!("{endpoint}: malformed block: {e}")))?;
        Ok(BlockInfo {
            number: parse_hex_u64(&block.number)?,
            timestamp_ms: i64::try_from(parse_hex_u64(&block.timestamp)?).unwrap_or(i64::MAX) * 1000,
        })
    }

    async fn eth_call(&self, endpoint: &str, to: &str, data: &str, tag: BlockTag) -> Result<String, SentinelError> {
        let value = self
            .call(
                endpoint,
                "eth_call",
                json!([{ "to": to, "data": data }, tag.to_rpc_param()]),
            )
            .await?;
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| SentinelError::RpcQuery(format!("{endpoint}: non-string eth_call result")))
    }
}
