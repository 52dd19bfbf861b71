use thiserror::Error;

/// Top-level error type for the Sentinel signal engine.
///
/// Variants correspond 1:1 to the error kinds the engine recognizes;
/// `field_path` identifies where in a signal definition a validation
/// error originated, for diagnostics shown to the signal's owner.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SentinelError {
    /// Malformed DSL: a field failed validation.
    #[error("validation error at `{field_path}`: {message}")]
    Validation {
        field_path: String,
        message: String,
    },

    /// A condition referenced a metric absent from the registry.
    #[error("unknown metric `{metric}` at `{field_path}`")]
    UnknownMetric { field_path: String, metric: String },

    /// A condition referenced a chain/market/address outside the signal's scope.
    #[error("scope violation at `{field_path}`: {message}")]
    ScopeViolation {
        field_path: String,
        message: String,
    },

    /// A duration string did not match the grammar in §6.6.
    #[error("invalid duration `{value}` at `{field_path}`")]
    DurationFormat { field_path: String, value: String },

    /// A required filter was missing when the fetcher tried to resolve a read.
    #[error("fetch config error: {0}")]
    FetchConfig(String),

    /// The event index rejected or failed a query.
    #[error("index query error: {0}")]
    IndexQuery(String),

    /// Chain RPC failed on every configured endpoint.
    #[error("rpc query error: {0}")]
    RpcQuery(String),

    /// Webhook delivery failed (network error, timeout, 4xx, or 5xx).
    #[error("dispatch error: {0}")]
    Dispatch(String),
}

impl SentinelError {
    /// Construct a `Validation` error.
    #[must_use]
    pub fn validation(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field_path: field_path.into(),
            message: message.into(),
        }
    }

    /// Construct a `ScopeViolation` error.
    #[must_use]
    pub fn scope_violation(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ScopeViolation {
            field_path: field_path.into(),
            message: message.into(),
        }
    }

    /// Construct an `UnknownMetric` error.
    #[must_use]
    pub fn unknown_metric(field_path: impl Into<String>, metric: impl Into<String>) -> Self {
        Self::UnknownMetric {
            field_path: field_path.into(),
            metric: metric.into(),
        }
    }

    /// The field path this error is attached to, if any (compile-time errors only).
    #[must_use]
    pub fn field_path(&self) -> Option<&str> {
        match self {
            Self::Validation { field_path, .. }
            | Self::UnknownMetric { field_path, .. }
            | Self::ScopeViolation { field_path, .. }
            | Self::DurationFormat { field_path, .. } => Some(field_path),
            Self::FetchConfig(_) | Self::IndexQuery(_) | Self::RpcQuery(_) | Self::Dispatch(_) => {
                None
            }
        }
    }

    /// `true` for fetch-time failures that must turn an evaluation inconclusive
    /// rather than be surfaced as a hard error (§7 propagation policy).
    #[must_use]
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            Self::FetchConfig(_) | Self::IndexQuery(_) | Self::RpcQuery(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SentinelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_has_field_path() {
        let e = SentinelError::validation("scope.chains", "must not be empty");
        assert_eq!(e.field_path(), Some("scope.chains"));
    }

    #[test]
    fn dispatch_has_no_field_path() {
        let e = SentinelError::Dispatch("timeout".into());
        assert_eq!(e.field_path(), None);
    }

    #[test]
    fn fetch_failures_classified() {
        assert!(SentinelError::FetchConfig("x".into()).is_fetch_failure());
        assert!(SentinelError::IndexQuery("x".into()).is_fetch_failure());
        assert!(SentinelError::RpcQuery("x".into()).is_fetch_failure());
        assert!(!SentinelError::Dispatch("x".into()).is_fetch_failure());
        assert!(!SentinelError::validation("a", "b").is_fetch_failure());
    }
}
