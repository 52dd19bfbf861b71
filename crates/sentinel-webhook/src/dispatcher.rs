//! Webhook dispatcher (C9, §4.9): POSTs a triggered signal's payload to its
//! configured URL, retrying transient failures up to a configured bound.

use std::time::{Duration, Instant};

use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use tracing::{debug, instrument, warn};

use crate::error::WebhookError;
use crate::payload::WebhookPayload;

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_RETRIES: u32 = 2;
const RETRY_BACKOFF_BASE: Duration = Duration::from_millis(200);
const RETRY_BACKOFF_CAP: Duration = Duration::from_secs(2);

/// Per-signal dispatch configuration.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub secret: Option<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            secret: None,
        }
    }
}

/// Outcome of one dispatch call, independent of how many attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub success: bool,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub attempts: u32,
}

fn compute_signature(secret: &str, body: &[u8]) -> Result<String, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| WebhookError::SigningError(e.to_string()))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn backoff_for(attempt: u32) -> Duration {
    let scaled = RETRY_BACKOFF_BASE.saturating_mul(1 << attempt.min(4));
    scaled.min(RETRY_BACKOFF_CAP)
}

/// Dispatches webhook notifications, one shared instance per process.
pub struct WebhookDispatcher {
    client: Client,
}

impl WebhookDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::builder().build().unwrap_or_default(),
        }
    }

    /// Deliver `payload` to `url`, retrying on network errors and 5xx
    /// responses up to `config.max_retries` additional attempts. A 4xx
    /// response is terminal (§4.9: "a 4xx response is not retried").
    #[instrument(skip(self, payload, config), fields(url = %url))]
    pub async fn dispatch(&self, url: &str, payload: &WebhookPayload, config: &DispatchConfig) -> DispatchOutcome {
        let start = Instant::now();
        let body = match serde_json::to_vec(payload) {
            Ok(b) => b,
            Err(e) => {
                return DispatchOutcome {
                    success: false,
                    status: None,
                    error: Some(format!("invalid payload: {e}")),
                    duration_ms: elapsed_ms(start),
                    attempts: 0,
                };
            }
        };

        let mut attempts = 0;
        let mut last_error = None;

        loop {
            attempts += 1;
            match self.send_once(url, &body, config).await {
                Ok(status) if (200..300).contains(&status) => {
                    return DispatchOutcome {
                        success: true,
                        status: Some(status),
                        error: None,
                        duration_ms: elapsed_ms(start),
                        attempts,
                    };
                }
                Ok(status) if (400..500).contains(&status) => {
                    return DispatchOutcome {
                        success: false,
                        status: Some(status),
                        error: Some(format!("webhook endpoint returned {status}")),
                        duration_ms: elapsed_ms(start),
                        attempts,
                    };
                }
                Ok(status) => {
                    warn!(status, attempts, "webhook delivery failed, may retry");
                    last_error = Some(format!("webhook endpoint returned {status}"));
                }
                Err(e) => {
                    warn!(error = %e, attempts, "webhook transport error, may retry");
                    let retryable = e.is_retryable();
                    last_error = Some(e.to_string());
                    if !retryable {
                        return DispatchOutcome {
                            success: false,
                            status: None,
                            error: last_error,
                            duration_ms: elapsed_ms(start),
                            attempts,
                        };
                    }
                }
            }

            if attempts > config.max_retries {
                return DispatchOutcome {
                    success: false,
                    status: None,
                    error: last_error,
                    duration_ms: elapsed_ms(start),
                    attempts,
                };
            }
            tokio::time::sleep(backoff_for(attempts)).await;
        }
    }

    async fn send_once(&self, url: &str, body: &[u8], config: &DispatchConfig) -> Result<u16, WebhookError> {
        let mut request = self
            .client
            .post(url)
            .timeout(config.timeout)
            .header("Content-Type", "application/json")
            .body(body.to_vec());

        if let Some(secret) = &config.secret {
            let signature = compute_signature(secret, body)?;
            request = request.header("X-Sentinel-Signature", signature);
        }

        debug!(url, "dispatching webhook");
        let response = request.send().await?;
        Ok(response.status().as_u16())
    }
}

impl Default for WebhookDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::{ChainId, SignalId};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn payload() -> WebhookPayload {
        crate::payload::WebhookPayload {
            signal_id: SignalId::new(),
            signal_name: "test signal".into(),
            triggered_at: chrono::Utc::now(),
            scope: crate::payload::PayloadScope {
                chains: vec![1],
                markets: None,
                addresses: None,
            },
            conditions_met: vec![],
            context: crate::payload::PayloadContext {
                app_user_id: "user-1".into(),
                address: None,
                market_id: None,
                chain_id: Some(ChainId(1)),
            },
        }
    }

    /// Bind an ephemeral local listener and respond to the first connection
    /// with a fixed status and body, returning the bound URL and a join
    /// handle for the accept task.
    async fn serve_once(status_code: u16, body: &str) -> (String, tokio::task::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}");
        let body = body.to_owned();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 16384];
            let n = stream.read(&mut buf).await.unwrap();
            buf.truncate(n);
            let response = format!(
                "HTTP/1.1 {status_code} OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
            buf
        });
        (url, handle)
    }

    #[tokio::test]
    async fn successful_delivery_reports_status_and_one_attempt() {
        let dispatcher = WebhookDispatcher::new();
        let config = DispatchConfig::default();
        let (url, server) = serve_once(200, "{}").await;

        let outcome = dispatcher.dispatch(&url, &payload(), &config).await;
        server.await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.status, Some(200));
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn client_error_is_terminal_not_retried() {
        let dispatcher = WebhookDispatcher::new();
        let config = DispatchConfig::default();
        let (url, server) = serve_once(400, "{}").await;

        let outcome = dispatcher.dispatch(&url, &payload(), &config).await;
        server.await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.status, Some(400));
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn connection_failure_is_retried_up_to_bound() {
        let dispatcher = WebhookDispatcher::new();
        let config = DispatchConfig {
            timeout: Duration::from_millis(300),
            max_retries: 1,
            secret: None,
        };
        // Nothing is listening on this port; every attempt fails to connect.
        let outcome = dispatcher.dispatch("http://127.0.0.1:1", &payload(), &config).await;
        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 2);
    }

    #[test]
    fn hmac_signature_is_deterministic_hex() {
        let sig1 = compute_signature("secret", b"hello").unwrap();
        let sig2 = compute_signature("secret", b"hello").unwrap();
        assert_eq!(sig1, sig2);
        assert_eq!(sig1.len(), 64);
        assert!(sig1.chars().all(|c| c.is_ascii_hexdigit()));
        // No `sha256=` prefix, unlike the generic webhook provider convention.
        assert!(!sig1.starts_with("sha256="));
    }
}
