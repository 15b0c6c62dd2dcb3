//! Conversation log entries.

use serde::{Deserialize, Serialize};

use crate::verdict::Verdict;

/// Role a participant plays in the draft / critique / publish chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    /// Seeds the conversation with the task prompt.
    HumanProxy,
    /// Writes the candidate post.
    Drafter,
    /// Judges the latest draft with a verdict.
    Critic,
    /// Owns the publish side effect and reports its result.
    Gatekeeper,
}

impl std::fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HumanProxy => write!(f, "human_proxy"),
            Self::Drafter => write!(f, "drafter"),
            Self::Critic => write!(f, "critic"),
            Self::Gatekeeper => write!(f, "gatekeeper"),
        }
    }
}

/// A single entry in a conversation log. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Position in the log (0-based insertion order)
    pub order: u64,

    /// Name of the participant that produced the message
    pub speaker: String,

    /// Role of the speaker
    pub role: ParticipantRole,

    /// Message content
    pub content: String,

    /// Timestamp (Unix millis)
    pub timestamp: u64,
}

/// Typed reading of a message, keyed on the speaker's role rather than its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Utterance<'a> {
    /// Task prompt from the human proxy.
    Prompt(&'a str),
    /// Candidate post from the drafter. Empty drafts are never produced.
    Draft(&'a str),
    /// Critic judgment.
    Verdict(Verdict),
    /// Anything else (gatekeeper notices, empty drafter turns).
    Notice(&'a str),
}

impl Message {
    pub fn new(
        order: u64,
        speaker: impl Into<String>,
        role: ParticipantRole,
        content: impl Into<String>,
    ) -> Self {
        Self {
            order,
            speaker: speaker.into(),
            role,
            content: content.into(),
            timestamp: now_millis(),
        }
    }

    pub fn utterance(&self) -> Utterance<'_> {
        match self.role {
            ParticipantRole::HumanProxy => Utterance::Prompt(&self.content),
            ParticipantRole::Drafter => {
                let draft = self.content.trim();
                if draft.is_empty() {
                    Utterance::Notice(&self.content)
                } else {
                    Utterance::Draft(draft)
                }
            }
            ParticipantRole::Critic => Utterance::Verdict(Verdict::parse(&self.content)),
            ParticipantRole::Gatekeeper => Utterance::Notice(&self.content),
        }
    }
}

fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
