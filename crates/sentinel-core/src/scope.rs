//! A signal's scope: the chains, markets, addresses and protocol it may
//! reference (§3 Scope, §3 Invariants).

use serde::{Deserialize, Serialize};

use crate::error::SentinelError;
use crate::types::{Address, ChainId, MarketId, ProtocolTag};

/// The set of chains/markets/addresses/protocol a signal's conditions are
/// allowed to read from. Conditions that reference anything outside this
/// set fail compilation with a `ScopeViolation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    #[serde(rename = "chainIds")]
    pub chain_ids: Vec<ChainId>,
    #[serde(rename = "marketIds", skip_serializing_if = "Option::is_none")]
    pub market_ids: Option<Vec<MarketId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<Address>>,
    #[serde(rename = "protocolTag", skip_serializing_if = "Option::is_none")]
    pub protocol_tag: Option<ProtocolTag>,
}

impl Scope {
    /// Validate the structural invariants: `chain_ids` must be non-empty,
    /// and any optional list present must itself be non-empty.
    pub fn validate(&self, field_path: &str) -> Result<(), SentinelError> {
        if self.chain_ids.is_empty() {
            return Err(SentinelError::validation(
                format!("{field_path}.chainIds"),
                "scope must declare at least one chain id",
            ));
        }
        if matches!(&self.market_ids, Some(m) if m.is_empty()) {
            return Err(SentinelError::validation(
                format!("{field_path}.marketIds"),
                "marketIds, if present, must not be empty",
            ));
        }
        if matches!(&self.addresses, Some(a) if a.is_empty()) {
            return Err(SentinelError::validation(
                format!("{field_path}.addresses"),
                "addresses, if present, must not be empty",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn contains_chain(&self, chain_id: ChainId) -> bool {
        self.chain_ids.contains(&chain_id)
    }

    #[must_use]
    pub fn contains_market(&self, market_id: &MarketId) -> bool {
        match &self.market_ids {
            Some(markets) => markets.contains(market_id),
            None => true,
        }
    }

    #[must_use]
    pub fn contains_address(&self, address: &Address) -> bool {
        match &self.addresses {
            Some(addresses) => addresses.contains(address),
            None => true,
        }
    }

    /// Check that a single chain id is a subset of this scope, producing a
    /// `ScopeViolation` naming `field_path` when it is not.
    pub fn require_chain(&self, field_path: &str, chain_id: ChainId) -> Result<(), SentinelError> {
        if self.contains_chain(chain_id) {
            Ok(())
        } else {
            Err(SentinelError::scope_violation(
                field_path,
                format!("chain {chain_id} is outside the signal's scope"),
            ))
        }
    }

    /// Check that market ids (if any are referenced) are a subset of this
    /// scope's declared markets.
    pub fn require_markets(
        &self,
        field_path: &str,
        market_ids: &[MarketId],
    ) -> Result<(), SentinelError> {
        for market_id in market_ids {
            if !self.contains_market(market_id) {
                return Err(SentinelError::scope_violation(
                    field_path,
                    format!("market {market_id} is outside the signal's scope"),
                ));
            }
        }
        Ok(())
    }

    /// Check that addresses (if any are referenced) are a subset of this
    /// scope's declared addresses.
    pub fn require_addresses(
        &self,
        field_path: &str,
        addresses: &[Address],
    ) -> Result<(), SentinelError> {
        for address in addresses {
            if !self.contains_address(address) {
                return Err(SentinelError::scope_violation(
                    field_path,
                    format!("address {address} is outside the signal's scope"),
                ));
            }
        }
        Ok(())
    }
}
