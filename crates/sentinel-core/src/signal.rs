//! The `Signal` entity and its stored definition (§3 Signal).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ast::CompiledAst;
use crate::condition::Condition;
use crate::condition::Logic;
use crate::scope::Scope;
use crate::types::{SignalId, UserId};

/// A signal definition's schema version. Only version 1 exists today; the
/// field exists so future DSL revisions can coexist with stored data.
pub const CURRENT_DEFINITION_VERSION: u32 = 1;

/// A signal's DSL source plus its compiled AST, tagged with a schema
/// version. Always serialized in this versioned-wrapper shape; a bare DSL
/// document may be *read* (§9 Normalization) but is recompiled on load and
/// rewritten in this form on next save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDefinition {
    pub version: u32,
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
    #[serde(default = "default_logic")]
    pub logic: Logic,
    pub dsl: Vec<Condition>,
    pub ast: CompiledAst,
}

fn default_logic() -> Logic {
    Logic::And
}

/// A bare DSL document, the back-compat shape `StoredDefinition` normalizes
/// from by recompiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BareDefinition {
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
    #[serde(default = "default_logic")]
    pub logic: Logic,
    pub dsl: Vec<Condition>,
}

/// Either wire shape a definition may be persisted or submitted as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefinitionEnvelope {
    Versioned(StoredDefinition),
    Bare(BareDefinition),
}

/// A user-owned, scheduled monitoring query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: SignalId,
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub definition: StoredDefinition,
    #[serde(rename = "webhookUrl")]
    pub webhook_url: String,
    #[serde(rename = "cooldownMinutes")]
    pub cooldown_minutes: u32,
    #[serde(rename = "isActive")]
    pub is_active: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "lastEvaluatedAt", skip_serializing_if = "Option::is_none")]
    pub last_evaluated_at: Option<DateTime<Utc>>,
    #[serde(rename = "lastTriggeredAt", skip_serializing_if = "Option::is_none")]
    pub last_triggered_at: Option<DateTime<Utc>>,
}

impl Signal {
    /// `now - last_triggered_at ≥ cooldown_minutes` (§4.8 step 4).
    #[must_use]
    pub fn cooldown_elapsed(&self, now: DateTime<Utc>) -> bool {
        match self.last_triggered_at {
            None => true,
            Some(last) => {
                let elapsed_ms = (now - last).num_milliseconds();
                elapsed_ms >= i64::from(self.cooldown_minutes) * 60_000
            }
        }
    }
}
