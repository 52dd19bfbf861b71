//! Event index client: a GraphQL endpoint with Hasura-style filter grammar
//! (§6.4).

use std::time::Duration;

use async_trait::async_trait;
use sentinel_core::{Filter, FilterOp, SentinelError};
use serde_json::{json, Value};

const INDEX_TIMEOUT: Duration = Duration::from_secs(10);

/// Translate our `FilterOp` into the index's Hasura-style operator name.
#[must_use]
pub fn translate_operator(op: FilterOp) -> &'static str {
    match op {
        FilterOp::Eq => "_eq",
        FilterOp::Neq => "_neq",
        FilterOp::Gt => "_gt",
        FilterOp::Gte => "_gte",
        FilterOp::Lt => "_lt",
        FilterOp::Lte => "_lte",
        FilterOp::In => "_in",
        FilterOp::Contains => "_ilike",
    }
}

/// Build the `where` clause object for one query: caller-supplied filters
/// plus the reserved constraints the fetcher injects from scope.
#[must_use]
pub fn build_where_clause(filters: &[Filter]) -> Value {
    let mut fields = serde_json::Map::new();
    for filter in filters {
        fields.insert(filter.field.clone(), json!({ translate_operator(filter.op): filter.value }));
    }
    Value::Object(fields)
}

/// Namespace a bare event type with the index's `Morpho_` prefix.
#[must_use]
pub fn namespaced_event_type(event_type: &str) -> String {
    format!("Morpho_{event_type}")
}

/// One row the index returns for an event query.
#[derive(Debug, Clone)]
pub struct EventRow {
    pub fields: serde_json::Map<String, Value>,
}

impl EventRow {
    #[must_use]
    pub fn field_f64(&self, field: &str) -> Option<f64> {
        self.fields.get(field).and_then(Value::as_f64)
    }
}

/// A single named query batched into one GraphQL request, aliased so
/// multiple queries can share one round trip (§4.3 "batched into a single
/// index request").
#[derive(Debug, Clone)]
pub struct IndexQuery {
    pub alias: String,
    pub event_type: String,
    pub fields: Vec<String>,
    pub filters: Vec<Filter>,
}

/// GraphQL/Hasura-style event index.
#[async_trait]
pub trait EventIndexClient: Send + Sync {
    /// Execute a batch of aliased queries in one request; returns rows
    /// keyed by alias.
    async fn query_batch(
        &self,
        queries: &[IndexQuery],
    ) -> Result<std::collections::HashMap<String, Vec<EventRow>>, SentinelError>;

    /// Read the currently indexed value for a single-row state lookup
    /// (Position/Market "current" reads go through the index, not RPC).
    async fn query_current_state(
        &self,
        entity_table: &str,
        filters: &[Filter],
        field: &str,
    ) -> Result<f64, SentinelError>;
}

/// `reqwest`-backed Hasura-style GraphQL client.
pub struct HttpEventIndexClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpEventIndexClient {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(INDEX_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    async fn post(&self, query: &str, variables: Value) -> Result<Value, SentinelError> {
        let body = json!({ "query": query, "variables": variables });
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| SentinelError::IndexQuery(e.to_string()))?;
        let parsed: Value = response
            .json()
            .await
            .map_err(|e| SentinelError::IndexQuery(format!("invalid response: {e}")))?;
        if let Some(errors) = parsed.get("errors") {
            return Err(SentinelError::IndexQuery(errors.to_string()));
        }
        parsed
            .get("data")
            .cloned()
            .ok_or_else(|| SentinelError::IndexQuery("missing data field".into()))
    }
}

#[async_trait]
impl EventIndexClient for HttpEventIndexClient {
    async fn query_batch(
        &self,
        queries: &[IndexQuery],
    ) -> Result<std::collections::HashMap<String, Vec<EventRow>>, SentinelError> {
        let mut body = String::new();
        for q in queries {
            let table = namespaced_event_type(&q.event_type);
            let where_clause = build_where_clause(&q.filters);
            body.push_str(&format!(
                "{alias}: {table}(where: {where_clause}) {{ {fields} }}\n",
                alias = q.alias,
                fields = q.fields.join(" "),
            ));
        }
        let query = format!("query {{ {body} }}");
        let data = self.post(&query, Value::Null).await?;

        let mut out = std::collections::HashMap::new();
        for q in queries {
            let rows = data
                .get(&q.alias)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter_map(|row| row.as_object().cloned())
                .map(|fields| EventRow { fields })
                .collect();
            out.insert(q.alias.clone(), rows);
        }
        Ok(out)
    }

    async fn query_current_state(
        &self,
        entity_table: &str,
        filters: &[Filter],
        field: &str,
    ) -> Result<f64, SentinelError> {
        let where_clause = build_where_clause(filters);
        let query = format!("query {{ row: {entity_table}(where: {where_clause}, limit: 1) {{ {field} }} }}");
        let data = self.post(&query, Value::Null).await?;
        data.get("row")
            .and_then(Value::as_array)
            .and_then(|rows| rows.first())
            .and_then(|row| row.get(field))
            .and_then(Value::as_f64)
            .ok_or_else(|| SentinelError::FetchConfig(format!("no row for {entity_table}.{field}")))
    }
}
