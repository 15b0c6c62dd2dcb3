//! Twitter/X API v2 publisher.

use std::time::Duration;

use async_trait::async_trait;
use postgate_common::{PostgateError, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::endpoint::{PublishReceipt, Publisher};
use crate::oauth::{Nonce, OAuthCredentials};

pub const DEFAULT_API_URL: &str = "https://api.twitter.com";
pub const DEFAULT_MAX_CHARS: usize = 280;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Serialize)]
struct CreateTweetRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct CreateTweetResponse {
    data: Option<CreatedTweet>,
}

#[derive(Deserialize)]
struct CreatedTweet {
    id: String,
    text: String,
}

pub struct TwitterPublisher {
    api_url: String,
    credentials: OAuthCredentials,
    max_chars: usize,
    http_client: reqwest::Client,
}

impl TwitterPublisher {
    pub fn new(credentials: OAuthCredentials) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            credentials,
            max_chars: DEFAULT_MAX_CHARS,
            http_client: build_http_client(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Bound every request, so a stalled endpoint ends in a publish error.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.http_client = build_http_client(timeout_secs);
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    fn check_length(&self, text: &str) -> Result<()> {
        let chars = text.chars().count();
        if text.trim().is_empty() {
            return Err(PostgateError::Publish("refusing to post empty text".to_string()));
        }
        if chars > self.max_chars {
            return Err(PostgateError::Publish(format!(
                "post is {chars} characters, limit is {}",
                self.max_chars
            )));
        }
        Ok(())
    }
}

fn build_http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

#[async_trait]
impl Publisher for TwitterPublisher {
    async fn publish(&self, text: &str) -> Result<PublishReceipt> {
        self.check_length(text)?;

        let url = format!("{}/2/tweets", self.api_url);
        let auth = self
            .credentials
            .authorization_header("POST", &url, &Nonce::fresh(), &[])?;

        let response = self
            .http_client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, auth)
            .json(&CreateTweetRequest { text })
            .send()
            .await
            .map_err(|e| PostgateError::Publish(format!("Twitter request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            error!(%status, "Twitter rejected the post");
            return Err(PostgateError::Publish(format!(
                "Twitter API error {status}: {body_text}"
            )));
        }

        let parsed: CreateTweetResponse = response
            .json()
            .await
            .map_err(|e| PostgateError::Publish(format!("Failed to parse Twitter response: {e}")))?;

        let tweet = parsed
            .data
            .ok_or_else(|| PostgateError::Publish("No data returned from Twitter API".to_string()))?;

        let receipt = PublishReceipt::new(tweet.id, tweet.text)?;
        info!(id = %receipt.id(), "Posted to Twitter");
        Ok(receipt)
    }

    fn name(&self) -> &str {
        "twitter"
    }
}
