use thiserror::Error;

/// Errors from building or sending a webhook request.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("HMAC signing error: {0}")]
    SigningError(String),
}

impl WebhookError {
    /// `true` if a retry is worth attempting: network-level failures and
    /// timeouts, never a malformed payload or bad signing key.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}
