//! Group chat run loop.
//!
//! One run seeds the conversation with the task prompt, then alternates
//! between asking the scheduler for a speaker and appending that speaker's
//! reply. After every append the gatekeeper sees the message (and may publish
//! and inject a notice), then the termination detectors decide whether to stop.
//!
//! # Example
//!
//! ```ignore
//! let chat = GroupChat::builder(oracle, publisher)
//!     .participants(Participant::default_roster())
//!     .max_rounds(4)
//!     .build()?;
//!
//! if let Some(tweet) = chat.run("microservices architecture").await {
//!     println!("{tweet}");
//! }
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use postgate_common::{Message, ParticipantRole, PostgateError, Result};
use postgate_llm::LlmClient;
use postgate_publish::{PublishReceipt, Publisher};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ChatConfig, PromptOverrides};
use crate::conversation::Conversation;
use crate::gatekeeper::{Gatekeeper, GatekeeperFault, GatekeeperState};
use crate::participant::Participant;
use crate::prompts::task_prompt;
use crate::scheduler::{NextSpeaker, Scheduler, SpeakerSelection};
use crate::termination::TerminationDetector;

/// Speaker name for gatekeeper notices when no gatekeeper participant exists.
pub const DEFAULT_GATEKEEPER_NAME: &str = "gatekeeper";

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// A message matched the termination vocabulary.
    Terminated { speaker: String },
    /// The turn budget ran out.
    RoundCap,
    /// The scheduler had nobody left to pick.
    SchedulerDone,
    /// The run's task died before finishing (batch mode only).
    Aborted { error: String },
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Terminated { speaker } => write!(f, "terminated by {speaker}"),
            Self::RoundCap => write!(f, "round cap reached"),
            Self::SchedulerDone => write!(f, "no next speaker"),
            Self::Aborted { error } => write!(f, "aborted: {error}"),
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub topic: String,
    pub published: Option<PublishReceipt>,
    pub state: GatekeeperState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<GatekeeperFault>,
    pub stop: StopReason,
    /// Turns taken, including the seed. Gatekeeper notices are not turns.
    pub rounds: usize,
    pub transcript: Vec<Message>,
    pub duration_ms: u64,
}

impl RunOutcome {
    pub(crate) fn aborted(topic: String, error: String) -> Self {
        Self {
            topic,
            published: None,
            state: GatekeeperState::Idle,
            fault: None,
            stop: StopReason::Aborted { error },
            rounds: 0,
            transcript: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn published_text(&self) -> Option<&str> {
        self.published.as_ref().map(PublishReceipt::text)
    }

    pub fn is_published(&self) -> bool {
        self.published.is_some()
    }
}

pub struct GroupChatBuilder {
    name: String,
    participants: Vec<Participant>,
    selection: SpeakerSelection,
    fixed_order: Vec<String>,
    max_rounds: usize,
    termination: TerminationDetector,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    oracle: Arc<dyn LlmClient>,
    publisher: Arc<dyn Publisher>,
}

impl GroupChatBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn participant(mut self, participant: Participant) -> Self {
        self.participants.push(participant);
        self
    }

    pub fn participants(mut self, participants: impl IntoIterator<Item = Participant>) -> Self {
        self.participants.extend(participants);
        self
    }

    pub fn max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn auto_selection(mut self) -> Self {
        self.selection = SpeakerSelection::Auto;
        self.fixed_order.clear();
        self
    }

    /// Fixed-order selection over `order`. An empty list means roster order.
    pub fn fixed_order(mut self, order: Vec<String>) -> Self {
        self.selection = SpeakerSelection::Fixed;
        self.fixed_order = order;
        self
    }

    pub fn termination(mut self, termination: TerminationDetector) -> Self {
        self.termination = termination;
        self
    }

    /// Sampling settings applied to every participant's oracle requests.
    pub fn sampling(mut self, temperature: Option<f32>, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn build(self) -> Result<GroupChat> {
        if self.participants.is_empty() {
            return Err(contract("group chat has no participants"));
        }
        if self.max_rounds == 0 {
            return Err(contract("max_rounds must be at least 1"));
        }

        let mut names = HashSet::new();
        for p in &self.participants {
            if p.name().trim().is_empty() {
                return Err(contract("participant names must not be empty"));
            }
            if !names.insert(p.name()) {
                return Err(contract(format!("duplicate participant name {:?}", p.name())));
            }
        }

        for role in [
            ParticipantRole::HumanProxy,
            ParticipantRole::Drafter,
            ParticipantRole::Critic,
            ParticipantRole::Gatekeeper,
        ] {
            let count = self.participants.iter().filter(|p| p.role() == role).count();
            if count > 1 {
                return Err(contract(format!("more than one {role} participant")));
            }
            if count == 0 && role != ParticipantRole::Gatekeeper {
                return Err(contract(format!("missing {role} participant")));
            }
        }

        if let Some(unknown) = self.fixed_order.iter().find(|n| !names.contains(n.as_str())) {
            return Err(contract(format!("fixed order names unknown participant {unknown:?}")));
        }

        let seed_speaker = self
            .participants
            .iter()
            .find(|p| p.role() == ParticipantRole::HumanProxy)
            .map(|p| p.name().to_string())
            .ok_or_else(|| contract("missing human_proxy participant"))?;
        let notice_speaker = self
            .participants
            .iter()
            .find(|p| p.role() == ParticipantRole::Gatekeeper)
            .map_or_else(|| DEFAULT_GATEKEEPER_NAME.to_string(), |p| p.name().to_string());

        let scheduler = match self.selection {
            SpeakerSelection::Auto => Scheduler::auto(self.max_rounds),
            SpeakerSelection::Fixed => Scheduler::fixed(self.fixed_order, self.max_rounds),
        };

        let (temperature, max_tokens) = (self.temperature, self.max_tokens);
        let participants = self
            .participants
            .into_iter()
            .map(|p| match (temperature, max_tokens) {
                (None, None) => p,
                _ => p.with_temperature(temperature).with_max_tokens(max_tokens),
            })
            .collect();

        Ok(GroupChat {
            name: self.name,
            participants,
            scheduler,
            termination: self.termination,
            seed_speaker,
            notice_speaker,
            oracle: self.oracle,
            publisher: self.publisher,
        })
    }
}

fn contract(msg: impl Into<String>) -> PostgateError {
    PostgateError::Conversation(msg.into())
}

/// A configured draft / critique / publish chat. Holds no per-run state, so
/// one instance can serve many (even concurrent) runs.
pub struct GroupChat {
    name: String,
    participants: Vec<Participant>,
    scheduler: Scheduler,
    termination: TerminationDetector,
    seed_speaker: String,
    notice_speaker: String,
    oracle: Arc<dyn LlmClient>,
    publisher: Arc<dyn Publisher>,
}

impl GroupChat {
    pub fn builder(oracle: Arc<dyn LlmClient>, publisher: Arc<dyn Publisher>) -> GroupChatBuilder {
        GroupChatBuilder {
            name: "tweet-chat".to_string(),
            participants: Vec::new(),
            selection: SpeakerSelection::Auto,
            fixed_order: Vec::new(),
            max_rounds: ChatConfig::default().max_rounds,
            termination: TerminationDetector::default(),
            temperature: None,
            max_tokens: None,
            oracle,
            publisher,
        }
    }

    /// Builder preloaded with the default roster, prompt overrides and the
    /// configured scheduling policy.
    pub fn from_config(
        config: &ChatConfig,
        prompts: &PromptOverrides,
        oracle: Arc<dyn LlmClient>,
        publisher: Arc<dyn Publisher>,
    ) -> GroupChatBuilder {
        let roster = Participant::default_roster().into_iter().map(|p| {
            let prompt = match p.role() {
                ParticipantRole::HumanProxy => prompts.human_proxy.as_ref(),
                ParticipantRole::Drafter => prompts.drafter.as_ref(),
                ParticipantRole::Critic => prompts.critic.as_ref(),
                ParticipantRole::Gatekeeper => prompts.gatekeeper.as_ref(),
            };
            match prompt {
                Some(prompt) => p.with_system_prompt(prompt.clone()),
                None => p,
            }
        });

        let builder = Self::builder(oracle, publisher)
            .participants(roster)
            .max_rounds(config.max_rounds);
        match config.speaker_selection {
            SpeakerSelection::Auto => builder.auto_selection(),
            SpeakerSelection::Fixed => builder.fixed_order(config.fixed_order.clone()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn publisher(&self) -> &Arc<dyn Publisher> {
        &self.publisher
    }

    /// Run one conversation and return the text that was actually published.
    pub async fn run(&self, topic: &str) -> Option<String> {
        self.run_detailed(topic)
            .await
            .published
            .map(PublishReceipt::into_text)
    }

    /// Run one conversation with fresh conversation and gatekeeper state.
    ///
    /// Oracle and publish failures never surface as errors here; they show
    /// up as empty turns or a `Failed` gatekeeper state.
    pub async fn run_detailed(&self, topic: &str) -> RunOutcome {
        let start_time = Instant::now();
        let topic = topic.trim().to_string();
        let mut conversation = Conversation::new();
        let mut gatekeeper = Gatekeeper::new(self.publisher.clone());

        info!(
            chat = %self.name,
            topic = %topic,
            participants = self.participants.len(),
            max_rounds = self.scheduler.max_rounds(),
            publisher = %self.publisher.name(),
            "Starting group chat"
        );

        conversation.append(
            self.seed_speaker.clone(),
            ParticipantRole::HumanProxy,
            task_prompt(&topic),
        );
        let mut rounds = 1;

        let stop = loop {
            if let Some(stop) = self.settle(&mut conversation, &mut gatekeeper).await {
                break stop;
            }

            let speaker =
                match self.scheduler.next_speaker(&conversation, &self.participants, rounds) {
                    NextSpeaker::Speaker(p) => p,
                    NextSpeaker::Done if self.scheduler.cap_reached(rounds) => {
                        break StopReason::RoundCap
                    }
                    NextSpeaker::Done => break StopReason::SchedulerDone,
                };

            rounds += 1;
            let reply = self.take_turn(speaker, &conversation, rounds).await;
            conversation.append(speaker.name(), speaker.role(), reply);
        };

        let state = gatekeeper.state();
        let fault = gatekeeper.fault().cloned();
        let published = gatekeeper.into_receipt();

        info!(
            chat = %self.name,
            topic = %topic,
            rounds,
            messages = conversation.len(),
            state = %state,
            stop = %stop,
            publish_id = published.as_ref().map(PublishReceipt::id).unwrap_or("-"),
            duration_ms = start_time.elapsed().as_millis() as u64,
            "Group chat finished"
        );

        RunOutcome {
            topic,
            published,
            state,
            fault,
            stop,
            rounds,
            transcript: conversation.into_messages(),
            duration_ms: start_time.elapsed().as_millis() as u64,
        }
    }

    /// Ask `speaker` for a reply. Failures become an empty turn.
    async fn take_turn(
        &self,
        speaker: &Participant,
        conversation: &Conversation,
        round: usize,
    ) -> String {
        match speaker.respond(self.oracle.as_ref(), conversation).await {
            Ok(Some(reply)) => {
                debug!(
                    chat = %self.name,
                    round,
                    speaker = %speaker.name(),
                    chars = reply.chars().count(),
                    "Turn completed"
                );
                reply
            }
            Ok(None) => {
                debug!(chat = %self.name, round, speaker = %speaker.name(), "Speaker had nothing to add");
                String::new()
            }
            Err(e) => {
                warn!(
                    chat = %self.name,
                    round,
                    speaker = %speaker.name(),
                    error = %e,
                    "Oracle failed, leaving turn empty"
                );
                String::new()
            }
        }
    }

    /// Process the newest message: gatekeeper first, then termination.
    async fn settle(
        &self,
        conversation: &mut Conversation,
        gatekeeper: &mut Gatekeeper,
    ) -> Option<StopReason> {
        let last = conversation.last()?.clone();
        let mut appended = vec![last];

        if let Some(notice) = gatekeeper.observe(&appended[0]).await {
            let notice = conversation
                .append(self.notice_speaker.clone(), ParticipantRole::Gatekeeper, notice)
                .clone();
            debug!(chat = %self.name, state = %gatekeeper.state(), "Gatekeeper notice appended");
            appended.push(notice);
        }

        appended
            .into_iter()
            .find(|m| self.is_terminal(m))
            .map(|m| StopReason::Terminated { speaker: m.speaker })
    }

    fn is_terminal(&self, message: &Message) -> bool {
        self.termination.is_terminal(message)
            || self.participants.iter().any(|p| p.is_termination_msg(message))
    }
}
