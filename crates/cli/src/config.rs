//! Configuration for the postgate binary.
//!
//! One TOML file with `[llm]`, `[publish]`, `[chat]` and `[prompts]` tables,
//! every table optional. Secrets left out of the file are filled from the
//! environment by [`PostgateConfig::resolve_secrets`]; nothing else in the
//! workspace reads the process environment.
//!
//! On Unix, [`PostgateConfig::from_file`] refuses world-writable files and
//! world-readable files that hold a secret.

use std::path::Path;

use postgate_agents::{ChatConfig, PromptOverrides};
use postgate_llm::{LlmConfig, LlmProvider};
use postgate_publish::PublishConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const REDACTED: &str = "<redacted>";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostgateConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub prompts: PromptOverrides,
}

impl PostgateConfig {
    /// Load configuration from a TOML file, checking permissions on Unix.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        #[cfg(unix)]
        validate_not_world_writable(path)?;

        let config = Self::from_file_unchecked(path)?;

        if config.has_inline_secret() {
            #[cfg(unix)]
            validate_secret_file_permissions(path)?;

            warn!(
                "Secrets found in config file '{}'. For better security, use environment \
                 variables instead (GEMINI_API_KEY, TWITTER_API_KEY, ...).",
                path.display()
            );
        }

        Ok(config)
    }

    /// Load configuration from a TOML file without permission checks.
    pub fn from_file_unchecked(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config file '{}': {}", path.display(), e))?;
        Ok(config)
    }

    fn has_inline_secret(&self) -> bool {
        let twitter = &self.publish.twitter;
        [
            &self.llm.api_key,
            &twitter.api_key,
            &twitter.api_secret,
            &twitter.access_token,
            &twitter.access_token_secret,
        ]
        .iter()
        .any(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }

    /// Fill secrets the file left empty from the process environment.
    pub fn resolve_secrets(&mut self) {
        self.resolve_secrets_with(|name| std::env::var(name).ok());
    }

    /// Fill secrets the file left empty using `lookup`.
    ///
    /// Priority:
    /// 1. Explicit value in the config
    /// 2. Environment variable for the provider / credential:
    ///    - gemini -> GEMINI_API_KEY, then GOOGLE_API_KEY
    ///    - openai -> OPENAI_API_KEY
    ///    - anthropic -> ANTHROPIC_API_KEY
    ///    - TWITTER_API_KEY, TWITTER_API_SECRET, TWITTER_ACCESS_TOKEN,
    ///      TWITTER_ACCESS_TOKEN_SECRET
    pub fn resolve_secrets_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if is_blank(&self.llm.api_key) {
            let vars: &[&str] = match self.llm.provider {
                LlmProvider::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
                LlmProvider::OpenAi => &["OPENAI_API_KEY"],
                LlmProvider::Anthropic => &["ANTHROPIC_API_KEY"],
            };
            self.llm.api_key = vars.iter().find_map(|name| lookup(*name));
        }

        let twitter = &mut self.publish.twitter;
        for (slot, name) in [
            (&mut twitter.api_key, "TWITTER_API_KEY"),
            (&mut twitter.api_secret, "TWITTER_API_SECRET"),
            (&mut twitter.access_token, "TWITTER_ACCESS_TOKEN"),
            (&mut twitter.access_token_secret, "TWITTER_ACCESS_TOKEN_SECRET"),
        ] {
            if is_blank(slot) {
                *slot = lookup(name);
            }
        }

        debug!(
            provider = %self.llm.provider,
            llm_key = self.llm.api_key.is_some(),
            twitter_credentials = self.publish.twitter.credentials().is_some(),
            "Resolved secrets"
        );
    }

    /// Copy with every secret replaced by a placeholder.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        let twitter = &mut copy.publish.twitter;
        for slot in [
            &mut copy.llm.api_key,
            &mut twitter.api_key,
            &mut twitter.api_secret,
            &mut twitter.access_token,
            &mut twitter.access_token_secret,
        ] {
            if slot.is_some() {
                *slot = Some(REDACTED.to_string());
            }
        }
        copy
    }

    /// Redacted configuration as TOML, for display.
    pub fn to_redacted_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(&self.redacted())?)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Regular file, not world-writable.
#[cfg(unix)]
fn validate_not_world_writable(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;

    if !metadata.is_file() {
        anyhow::bail!(
            "Config path '{}' is not a regular file. Directories and devices are not allowed.",
            path.display()
        );
    }

    let permission_bits = metadata.permissions().mode() & 0o777;
    if permission_bits & 0o002 != 0 {
        anyhow::bail!(
            "Config file '{}' is world-writable (mode {:04o}). Fix with: chmod o-w {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    Ok(())
}

/// A file holding secrets must not be world-readable; group-readable only warns.
#[cfg(unix)]
fn validate_secret_file_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let permission_bits = std::fs::metadata(path)?.permissions().mode() & 0o777;

    if permission_bits & 0o004 != 0 {
        anyhow::bail!(
            "Config file '{}' contains secrets but is world-readable (mode {:04o}). \
             Fix with: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    if permission_bits & 0o040 != 0 {
        warn!(
            "Config file '{}' contains secrets and is group-readable (mode {:04o}). \
             Consider restricting access with: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    Ok(())
}
