use async_trait::async_trait;
use postgate_common::{PostgateError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One completion call: a role prompt plus the transcript so far.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<String>,
}

impl LlmResponse {
    /// Trimmed reply text. A blank completion counts as no reply.
    pub fn into_text(self) -> Result<String> {
        let text = self.content.trim();
        if text.is_empty() {
            return Err(PostgateError::Llm(format!(
                "{} returned an empty completion (finish_reason: {})",
                self.model,
                self.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }
        Ok(text.to_string())
    }
}

/// Text oracle: turns a role prompt and transcript into a reply.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse>;
    fn model_name(&self) -> &str;
}

#[async_trait]
impl LlmClient for Box<dyn LlmClient> {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        (**self).complete(request).await
    }
    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

#[async_trait]
impl LlmClient for std::sync::Arc<dyn LlmClient> {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        (**self).complete(request).await
    }
    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Shared HTTP client for the provider implementations.
pub(crate) fn build_http_client(timeout_secs: Option<u64>) -> reqwest::Client {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(std::time::Duration::from_secs(secs));
    }
    builder.build().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Falling back to default HTTP client");
        reqwest::Client::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_keeps_transcript_order() {
        let request = LlmRequest {
            system_prompt: Some("You craft tweets.".to_string()),
            messages: vec![
                ChatMessage::user("[user] write one"),
                ChatMessage::assistant("Caches are hard."),
            ],
            temperature: Some(0.3),
            max_tokens: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][1]["role"], "assistant");
        assert_eq!(json["messages"][1]["content"], "Caches are hard.");
    }

    #[test]
    fn into_text_trims_reply() {
        let response = LlmResponse {
            content: "\n  Ship it.  \n".to_string(),
            model: "gemini-2.5-pro".to_string(),
            usage: None,
            finish_reason: Some("STOP".to_string()),
        };
        assert_eq!(response.into_text().unwrap(), "Ship it.");
    }

    #[test]
    fn blank_completion_is_an_error() {
        let response = LlmResponse {
            content: "   ".to_string(),
            model: "gemini-2.5-pro".to_string(),
            usage: None,
            finish_reason: Some("SAFETY".to_string()),
        };
        let err = response.into_text().unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }
}
