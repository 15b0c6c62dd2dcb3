//! Termination detection.

use postgate_common::Message;
use serde::{Deserialize, Serialize};

/// Ends the conversation outright.
pub const STOP_TOKEN: &str = "TERMINATE";
/// Prefix of the gatekeeper's success notice.
pub const POSTED_TOKEN: &str = "TWEET POSTED";
/// Prefix of the gatekeeper's failure notice.
pub const ERROR_TOKEN: &str = "ERROR:";

/// Case-insensitive substring match against a fixed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationDetector {
    vocabulary: Vec<String>,
}

impl Default for TerminationDetector {
    fn default() -> Self {
        Self::new([STOP_TOKEN, POSTED_TOKEN, ERROR_TOKEN])
    }
}

impl TerminationDetector {
    /// Blank tokens are dropped; they would match every message.
    pub fn new<I, S>(vocabulary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            vocabulary: vocabulary
                .into_iter()
                .map(|t| t.as_ref().trim().to_uppercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn is_terminal_text(&self, content: &str) -> bool {
        let upper = content.to_uppercase();
        self.vocabulary.iter().any(|token| upper.contains(token.as_str()))
    }

    pub fn is_terminal(&self, message: &Message) -> bool {
        self.is_terminal_text(&message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postgate_common::ParticipantRole;

    fn msg(content: &str) -> Message {
        Message::new(0, "tweet_poster", ParticipantRole::Gatekeeper, content)
    }

    #[test]
    fn default_vocabulary_matches_gatekeeper_notices() {
        let detector = TerminationDetector::default();
        assert!(detector.is_terminal(&msg("TWEET POSTED: hello\nTERMINATE")));
        assert!(detector.is_terminal(&msg("ERROR: Failed to post tweet")));
        assert!(detector.is_terminal(&msg("please terminate")));
    }

    #[test]
    fn ordinary_messages_do_not_terminate() {
        let detector = TerminationDetector::default();
        assert!(!detector.is_terminal(&msg("VERDICT: REJECTED\nFEEDBACK: too long")));
        assert!(!detector.is_terminal(&msg("Create a tweet about error handling")));
        assert!(!detector.is_terminal(&msg("")));
    }

    #[test]
    fn custom_vocabulary_is_case_insensitive_and_skips_blanks() {
        let detector = TerminationDetector::new(["done", "  "]);
        assert_eq!(detector.vocabulary(), &["DONE".to_string()]);
        assert!(detector.is_terminal_text("We are Done here"));
        assert!(!detector.is_terminal_text("anything else"));
    }
}
