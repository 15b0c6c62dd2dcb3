use async_trait::async_trait;
use postgate_common::{PostgateError, Result};
use serde::Serialize;

/// Proof that a post went out. Both fields are always non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishReceipt {
    id: String,
    text: String,
}

impl PublishReceipt {
    /// Validate a success payload; an empty id or text is a failed publish.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let text = text.into();
        if id.trim().is_empty() {
            return Err(PostgateError::Publish(
                "publish endpoint returned an empty id".to_string(),
            ));
        }
        if text.trim().is_empty() {
            return Err(PostgateError::Publish(
                "publish endpoint returned empty text".to_string(),
            ));
        }
        Ok(Self { id, text })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Makes a draft publicly visible.
///
/// Implementations own any retry policy; callers invoke `publish` at most
/// once per approved draft and treat every `Err` as final.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, text: &str) -> Result<PublishReceipt>;

    /// Short label for logs ("twitter", "simulated", ...).
    fn name(&self) -> &str;

    /// True when nothing actually leaves the process.
    fn is_simulated(&self) -> bool {
        false
    }
}
