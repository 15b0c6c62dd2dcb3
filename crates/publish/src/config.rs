use std::sync::Arc;

use postgate_common::{PostgateError, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::endpoint::Publisher;
use crate::oauth::OAuthCredentials;
use crate::simulated::SimulatedPublisher;
use crate::twitter::{
    TwitterPublisher, DEFAULT_API_URL, DEFAULT_MAX_CHARS, DEFAULT_TIMEOUT_SECS,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishMode {
    /// Twitter when all four credentials are present, simulated otherwise.
    #[default]
    Auto,
    Simulated,
    Twitter,
}

/// Twitter/X credentials and limits. Secrets are expected to be resolved by the caller.
#[derive(Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_secret: Option<String>,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Per-request timeout for `POST /2/tweets`.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_max_chars() -> usize {
    DEFAULT_MAX_CHARS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            access_token: None,
            access_token_secret: None,
            api_url: default_api_url(),
            max_chars: default_max_chars(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for TwitterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitterConfig")
            .field("api_key", &self.api_key.is_some())
            .field("api_secret", &self.api_secret.is_some())
            .field("access_token", &self.access_token.is_some())
            .field("access_token_secret", &self.access_token_secret.is_some())
            .field("api_url", &self.api_url)
            .field("max_chars", &self.max_chars)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl TwitterConfig {
    /// All four OAuth values, or `None` if any is missing or blank.
    pub fn credentials(&self) -> Option<OAuthCredentials> {
        fn present(v: &Option<String>) -> Option<String> {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        }
        Some(OAuthCredentials {
            consumer_key: present(&self.api_key)?,
            consumer_secret: present(&self.api_secret)?,
            access_token: present(&self.access_token)?,
            access_token_secret: present(&self.access_token_secret)?,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default)]
    pub mode: PublishMode,
    #[serde(default)]
    pub twitter: TwitterConfig,
}

pub fn build_publisher(config: &PublishConfig) -> Result<Arc<dyn Publisher>> {
    let credentials = config.twitter.credentials();
    match (config.mode, credentials) {
        (PublishMode::Simulated, _) => {
            info!("Publishing in simulated mode");
            Ok(Arc::new(SimulatedPublisher::new()))
        }
        (PublishMode::Twitter | PublishMode::Auto, Some(creds)) => {
            info!(api_url = %config.twitter.api_url, "Twitter credentials found, posts will be real");
            Ok(Arc::new(
                TwitterPublisher::new(creds)
                    .with_api_url(config.twitter.api_url.clone())
                    .with_max_chars(config.twitter.max_chars)
                    .with_timeout(config.twitter.timeout_secs),
            ))
        }
        (PublishMode::Twitter, None) => Err(PostgateError::Config(
            "publish mode \"twitter\" needs api_key, api_secret, access_token and access_token_secret"
                .to_string(),
        )),
        (PublishMode::Auto, None) => {
            warn!("Twitter credentials not configured, simulating posts");
            Ok(Arc::new(SimulatedPublisher::new()))
        }
    }
}
