use async_trait::async_trait;
use postgate_common::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::{LlmClient, LlmRequest, LlmResponse};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Retries transient oracle failures (rate limits, 5xx, timeouts).
///
/// The chat loop itself never retries a turn; a failure that survives this
/// wrapper is treated as "no reply" for that round.
pub struct RetryingClient<T: LlmClient> {
    inner: T,
    config: RetryConfig,
}

impl<T: LlmClient> RetryingClient<T> {
    pub fn new(inner: T, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    fn is_retryable(error_msg: &str) -> bool {
        const TRANSIENT: &[&str] = &[
            "429",
            "rate limit",
            "resource_exhausted",
            "500",
            "502",
            "503",
            "504",
            "overloaded",
            "unavailable",
            "timed out",
            "timeout",
            "connection reset",
        ];
        let lower = error_msg.to_lowercase();
        TRANSIENT.iter().any(|needle| lower.contains(needle))
    }

    /// Seconds from a `retry-after: N` hint embedded in the error text, as millis.
    fn parse_retry_after(error_msg: &str) -> Option<u64> {
        let lower = error_msg.to_lowercase();
        let pos = lower.find("retry-after")?;
        lower[pos + "retry-after".len()..]
            .trim_start_matches([':', ' ', '='])
            .split(|c: char| !c.is_ascii_digit())
            .next()
            .and_then(|digits| digits.parse::<u64>().ok())
            .map(|secs| secs * 1000)
    }

    fn compute_delay(&self, attempt: u32) -> u64 {
        let base = self.config.initial_delay_ms as f64
            * self.config.backoff_multiplier.powi(attempt as i32);
        // Up to +10% spread so concurrent batch runs do not retry in lockstep.
        let spread = (attempt.wrapping_mul(2_654_435_761) % 100) as f64 / 1000.0;
        let delay = (base * (1.0 + spread)) as u64;
        delay.min(self.config.max_delay_ms)
    }
}

#[async_trait]
impl<T: LlmClient> LlmClient for RetryingClient<T> {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let mut attempt = 0;
        loop {
            let err = match self.inner.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            let error_msg = err.to_string();
            if attempt >= self.config.max_retries || !Self::is_retryable(&error_msg) {
                return Err(err);
            }

            let delay = Self::parse_retry_after(&error_msg)
                .map(|ms| ms.min(self.config.max_delay_ms))
                .unwrap_or_else(|| self.compute_delay(attempt));

            warn!(
                model = %self.inner.model_name(),
                attempt = attempt + 1,
                max_retries = self.config.max_retries,
                delay_ms = delay,
                error = %error_msg,
                "Retrying LLM request"
            );

            tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
            attempt += 1;
        }
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postgate_common::PostgateError;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyClient {
        calls: AtomicU32,
        fail_first: u32,
        error: &'static str,
    }

    #[async_trait]
    impl LlmClient for FlakyClient {
        async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(PostgateError::Llm(self.error.to_string()));
            }
            Ok(LlmResponse {
                content: "ok".to_string(),
                model: "flaky".to_string(),
                usage: None,
                finish_reason: None,
            })
        }
        fn model_name(&self) -> &str {
            "flaky"
        }
    }

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 1.0,
        }
    }

    #[test]
    fn transient_errors_are_retryable() {
        type R = RetryingClient<FlakyClient>;
        assert!(R::is_retryable("Gemini API error 429 Too Many Requests"));
        assert!(R::is_retryable("Gemini API error 503 Service Unavailable: overloaded"));
        assert!(R::is_retryable("OpenAI request failed: operation timed out"));
        assert!(!R::is_retryable("Gemini API error 400 Bad Request: API key not valid"));
        assert!(!R::is_retryable("gemini-2.5-pro returned an empty completion"));
    }

    #[test]
    fn retry_after_hint_is_parsed() {
        type R = RetryingClient<FlakyClient>;
        assert_eq!(R::parse_retry_after("429 Too Many Requests, Retry-After: 5"), Some(5000));
        assert_eq!(R::parse_retry_after("retry-after=2s"), Some(2000));
        assert_eq!(R::parse_retry_after("429 Too Many Requests"), None);
    }

    #[test]
    fn delay_is_capped() {
        let client = RetryingClient::new(
            FlakyClient {
                calls: AtomicU32::new(0),
                fail_first: 0,
                error: "",
            },
            RetryConfig {
                max_retries: 5,
                initial_delay_ms: 500,
                max_delay_ms: 2000,
                backoff_multiplier: 10.0,
            },
        );
        assert!(client.compute_delay(5) <= 2000);
        assert!(client.compute_delay(0) >= 500);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let client = RetryingClient::new(
            FlakyClient {
                calls: AtomicU32::new(0),
                fail_first: 2,
                error: "Gemini API error 503 Service Unavailable",
            },
            fast_config(3),
        );
        let response = client.complete(LlmRequest::default()).await.unwrap();
        assert_eq!(response.content, "ok");
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let client = RetryingClient::new(
            FlakyClient {
                calls: AtomicU32::new(0),
                fail_first: 10,
                error: "Gemini API error 401 Unauthorized",
            },
            fast_config(3),
        );
        assert!(client.complete(LlmRequest::default()).await.is_err());
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let client = RetryingClient::new(
            FlakyClient {
                calls: AtomicU32::new(0),
                fail_first: 10,
                error: "429 rate limit",
            },
            fast_config(2),
        );
        assert!(client.complete(LlmRequest::default()).await.is_err());
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 3);
    }
}
