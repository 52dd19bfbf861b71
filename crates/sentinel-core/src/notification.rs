//! Audit entities written by the worker (§3 Notification/Run Log rows).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::SignalId;

/// One clause's contribution to a triggered signal, as shown in the webhook
/// payload's `conditions_met` array (§6.5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionOutcome {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub triggered: bool,
    pub description: String,
    #[serde(rename = "actualValue", skip_serializing_if = "Option::is_none")]
    pub actual_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Outcome of delivering a notification to a signal's webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Delivered,
    Failed,
}

/// One row written whenever a signal triggers, regardless of dispatch
/// outcome (§3 invariant: every trigger results in exactly one notification
/// row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    #[serde(rename = "signalId")]
    pub signal_id: SignalId,
    pub status: NotificationStatus,
    #[serde(rename = "webhookStatus", skip_serializing_if = "Option::is_none")]
    pub webhook_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "retryCount")]
    pub retry_count: u32,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    #[serde(rename = "conditionsMet")]
    pub conditions_met: Vec<ConditionOutcome>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// One optional row written per evaluation (§3: "every evaluation
/// optionally results in a run-log row").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogRecord {
    pub id: Uuid,
    #[serde(rename = "signalId")]
    pub signal_id: SignalId,
    pub triggered: bool,
    pub conclusive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "evaluatedAt")]
    pub evaluated_at: DateTime<Utc>,
}
