//! The exact wire shape of a triggered-signal notification (§6.5).

use chrono::{DateTime, Utc};
use sentinel_core::{ChainId, ConditionOutcome, MarketId, Scope, SignalId};
use serde::{Deserialize, Serialize};

/// The `scope` block of the payload: the signal's declared scope, rendered
/// as plain strings/numbers for consumption outside this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadScope {
    pub chains: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markets: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<String>>,
}

impl From<&Scope> for PayloadScope {
    fn from(scope: &Scope) -> Self {
        Self {
            chains: scope.chain_ids.iter().map(|c| c.0).collect(),
            markets: scope
                .market_ids
                .as_ref()
                .map(|ids| ids.iter().map(ToString::to_string).collect()),
            addresses: scope
                .addresses
                .as_ref()
                .map(|addrs| addrs.iter().map(ToString::to_string).collect()),
        }
    }
}

/// The `context` block: the concrete target this particular trigger
/// pertains to, distinct from the signal's overall (possibly broader) scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadContext {
    pub app_user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_id: Option<MarketId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<ChainId>,
}

/// The JSON object the dispatcher POSTs to a signal's webhook URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub signal_id: SignalId,
    pub signal_name: String,
    pub triggered_at: DateTime<Utc>,
    pub scope: PayloadScope,
    pub conditions_met: Vec<ConditionOutcome>,
    pub context: PayloadContext,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::Scope;

    #[test]
    fn payload_scope_renders_plain_values() {
        let scope = Scope {
            chain_ids: vec![ChainId(1), ChainId(8453)],
            market_ids: Some(vec![MarketId::from("0xabc")]),
            addresses: None,
            protocol_tag: None,
        };
        let rendered = PayloadScope::from(&scope);
        assert_eq!(rendered.chains, vec![1, 8453]);
        assert_eq!(rendered.markets, Some(vec!["0xabc".to_owned()]));
        assert_eq!(rendered.addresses, None);
    }

    #[test]
    fn payload_serializes_with_snake_case_field_names() {
        let payload = WebhookPayload {
            signal_id: SignalId::new(),
            signal_name: "whale watch".into(),
            triggered_at: Utc::now(),
            scope: PayloadScope {
                chains: vec![1],
                markets: None,
                addresses: None,
            },
            conditions_met: vec![],
            context: PayloadContext {
                app_user_id: "user-1".into(),
                address: None,
                market_id: None,
                chain_id: Some(ChainId(1)),
            },
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("signal_id").is_some());
        assert!(json.get("triggered_at").is_some());
        assert!(json.get("conditions_met").is_some());
    }
}
