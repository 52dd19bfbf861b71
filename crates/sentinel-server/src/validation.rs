//! Signal CRUD validation (§6.1): empty name, invalid URL, invalid
//! duration, unknown metric, scope violation, and group/aggregate
//! constraint violations. Duration/metric/scope/group/aggregate checks are
//! delegated to the compiler (C4), which already enforces them with field
//! paths; this module adds the two checks the compiler has no opinion on.

use sentinel_core::{Condition, Logic, Scope, SentinelError, StoredDefinition};

pub fn validate_name(name: &str) -> Result<(), SentinelError> {
    if name.trim().is_empty() {
        return Err(SentinelError::validation("name", "must not be empty"));
    }
    Ok(())
}

pub fn validate_webhook_url(url: &str) -> Result<(), SentinelError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| SentinelError::validation("webhookUrl", e.to_string()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(SentinelError::validation("webhookUrl", "must be an http(s) URL"));
    }
    Ok(())
}

/// Compile a signal's DSL, surfacing the compiler's own validation errors
/// (unknown metric, scope violation, duration format, group/aggregate
/// constraint violations) unchanged.
pub fn compile_definition(
    scope: &Scope,
    window: Option<&str>,
    logic: Logic,
    dsl: &[Condition],
) -> Result<StoredDefinition, SentinelError> {
    sentinel_rules::compile(scope, window, logic, dsl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_is_rejected() {
        assert!(validate_name("  ").is_err());
    }

    #[test]
    fn non_empty_name_is_accepted() {
        assert!(validate_name("liquidation watch").is_ok());
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        assert!(validate_webhook_url("ftp://example.com/hook").is_err());
    }

    #[test]
    fn malformed_url_is_rejected() {
        assert!(validate_webhook_url("not a url").is_err());
    }

    #[test]
    fn valid_https_url_is_accepted() {
        assert!(validate_webhook_url("https://example.com/hook").is_ok());
    }
}
