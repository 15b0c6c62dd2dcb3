//! Chat participants.
//!
//! A participant is a name, a role and a role prompt. It only generates
//! text; side effects such as publishing live in the gatekeeper logic.

use postgate_common::{Message, ParticipantRole, Result};
use postgate_llm::{ChatMessage, LlmClient, LlmRequest};
use tracing::debug;

use crate::conversation::Conversation;
use crate::prompts::{CRITIC_PROMPT, DRAFTER_PROMPT, GATEKEEPER_PROMPT, HUMAN_PROXY_PROMPT};
use crate::termination::TerminationDetector;

#[derive(Debug, Clone)]
pub struct Participant {
    name: String,
    role: ParticipantRole,
    system_prompt: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    termination: TerminationDetector,
}

impl Participant {
    pub fn new(
        name: impl Into<String>,
        role: ParticipantRole,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            role,
            system_prompt: system_prompt.into(),
            temperature: None,
            max_tokens: None,
            termination: TerminationDetector::default(),
        }
    }

    pub fn human_proxy(name: impl Into<String>) -> Self {
        Self::new(name, ParticipantRole::HumanProxy, HUMAN_PROXY_PROMPT)
    }

    pub fn drafter(name: impl Into<String>) -> Self {
        Self::new(name, ParticipantRole::Drafter, DRAFTER_PROMPT)
    }

    pub fn critic(name: impl Into<String>) -> Self {
        Self::new(name, ParticipantRole::Critic, CRITIC_PROMPT)
    }

    pub fn gatekeeper(name: impl Into<String>) -> Self {
        Self::new(name, ParticipantRole::Gatekeeper, GATEKEEPER_PROMPT)
    }

    /// The four participants of the draft / critique / publish chat.
    pub fn default_roster() -> Vec<Self> {
        vec![
            Self::human_proxy("user"),
            Self::drafter("tweet_generator"),
            Self::critic("tweet_critic"),
            Self::gatekeeper("tweet_poster"),
        ]
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_termination(mut self, termination: TerminationDetector) -> Self {
        self.termination = termination;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> ParticipantRole {
        self.role
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Whether this participant considers `message` the end of the chat.
    pub fn is_termination_msg(&self, message: &Message) -> bool {
        self.termination.is_terminal(message)
    }

    /// Oracle request for this participant's next turn.
    ///
    /// Own messages become assistant turns; everyone else's become user turns
    /// tagged with the speaker's name. Empty turns are left out.
    pub fn build_request(&self, conversation: &Conversation) -> LlmRequest {
        let messages = conversation
            .messages()
            .iter()
            .filter(|m| !m.content.trim().is_empty())
            .map(|m| {
                if m.speaker == self.name {
                    ChatMessage::assistant(m.content.clone())
                } else {
                    ChatMessage::user(format!("[{}] {}", m.speaker, m.content))
                }
            })
            .collect();

        LlmRequest {
            system_prompt: Some(self.system_prompt.clone()),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// Produce this participant's reply. `Ok(None)` means the participant has
    /// nothing to say (the human proxy only ever speaks to seed the chat).
    pub async fn respond(
        &self,
        oracle: &dyn LlmClient,
        conversation: &Conversation,
    ) -> Result<Option<String>> {
        if self.role == ParticipantRole::HumanProxy {
            return Ok(None);
        }

        let request = self.build_request(conversation);
        debug!(
            participant = %self.name,
            role = %self.role,
            transcript_len = request.messages.len(),
            model = %oracle.model_name(),
            "Requesting reply"
        );
        let text = oracle.complete(request).await?.into_text()?;
        Ok(Some(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postgate_llm::Role;

    fn transcript() -> Conversation {
        let mut log = Conversation::new();
        log.append("user", ParticipantRole::HumanProxy, "Create a tweet about queues");
        log.append("tweet_generator", ParticipantRole::Drafter, "Queues: later is a strategy.");
        log.append("tweet_critic", ParticipantRole::Critic, "");
        log
    }

    #[test]
    fn default_roster_matches_roles() {
        let roster = Participant::default_roster();
        let roles: Vec<ParticipantRole> = roster.iter().map(Participant::role).collect();
        assert_eq!(
            roles,
            vec![
                ParticipantRole::HumanProxy,
                ParticipantRole::Drafter,
                ParticipantRole::Critic,
                ParticipantRole::Gatekeeper,
            ]
        );
        assert_eq!(roster[1].name(), "tweet_generator");
    }

    #[test]
    fn request_maps_own_turns_to_assistant() {
        let drafter = Participant::drafter("tweet_generator").with_temperature(Some(0.3));
        let request = drafter.build_request(&transcript());

        assert_eq!(request.system_prompt.as_deref(), Some(DRAFTER_PROMPT));
        assert_eq!(request.temperature, Some(0.3));
        // The empty critic turn is skipped.
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::User);
        assert_eq!(request.messages[0].content, "[user] Create a tweet about queues");
        assert_eq!(request.messages[1].role, Role::Assistant);
        assert_eq!(request.messages[1].content, "Queues: later is a strategy.");
    }

    #[test]
    fn request_tags_other_speakers() {
        let critic = Participant::critic("tweet_critic");
        let request = critic.build_request(&transcript());
        assert_eq!(
            request.messages[1].content,
            "[tweet_generator] Queues: later is a strategy."
        );
        assert!(request.messages.iter().all(|m| m.role == Role::User));
    }

    #[test]
    fn prompt_override_replaces_builtin() {
        let critic = Participant::critic("c").with_system_prompt("Be harsh.");
        assert_eq!(critic.system_prompt(), "Be harsh.");
    }
}
