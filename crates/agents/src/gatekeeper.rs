//! Gatekeeper logic: the only component with a side effect.
//!
//! The gatekeeper watches every appended message. It remembers the latest
//! non-empty draft and, on the first approval verdict, publishes that draft.
//! Publishing happens at most once per conversation; a new conversation needs
//! a fresh gatekeeper (or [`Gatekeeper::reset`]).

use std::sync::Arc;

use postgate_common::{Message, Utterance};
use postgate_publish::{PublishReceipt, Publisher};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::termination::{ERROR_TOKEN, POSTED_TOKEN, STOP_TOKEN};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatekeeperState {
    #[default]
    Idle,
    Drafted,
    Published,
    Failed,
}

impl GatekeeperState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Published | Self::Failed)
    }
}

impl std::fmt::Display for GatekeeperState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Drafted => write!(f, "drafted"),
            Self::Published => write!(f, "published"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Why the gatekeeper ended in [`GatekeeperState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum GatekeeperFault {
    /// Approval arrived before any draft.
    NullDraft,
    /// The publish endpoint rejected the post.
    PublishFailed(String),
}

impl std::fmt::Display for GatekeeperFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NullDraft => write!(f, "approval received with no draft to publish"),
            Self::PublishFailed(reason) => write!(f, "failed to publish: {reason}"),
        }
    }
}

pub struct Gatekeeper {
    publisher: Arc<dyn Publisher>,
    state: GatekeeperState,
    pending_draft: Option<String>,
    has_published: bool,
    receipt: Option<PublishReceipt>,
    fault: Option<GatekeeperFault>,
}

impl std::fmt::Debug for Gatekeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gatekeeper")
            .field("publisher", &self.publisher.name())
            .field("state", &self.state)
            .field("pending_draft", &self.pending_draft)
            .field("has_published", &self.has_published)
            .field("receipt", &self.receipt)
            .field("fault", &self.fault)
            .finish()
    }
}

impl Gatekeeper {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self {
            publisher,
            state: GatekeeperState::Idle,
            pending_draft: None,
            has_published: false,
            receipt: None,
            fault: None,
        }
    }

    /// Back to `Idle` for a new conversation.
    pub fn reset(&mut self) {
        self.state = GatekeeperState::Idle;
        self.pending_draft = None;
        self.has_published = false;
        self.receipt = None;
        self.fault = None;
    }

    pub fn state(&self) -> GatekeeperState {
        self.state
    }

    pub fn pending_draft(&self) -> Option<&str> {
        self.pending_draft.as_deref()
    }

    pub fn has_published(&self) -> bool {
        self.has_published
    }

    pub fn receipt(&self) -> Option<&PublishReceipt> {
        self.receipt.as_ref()
    }

    pub fn fault(&self) -> Option<&GatekeeperFault> {
        self.fault.as_ref()
    }

    pub fn into_receipt(self) -> Option<PublishReceipt> {
        self.receipt
    }

    /// Feed one appended message through the state machine.
    ///
    /// Returns the notice to append when the message caused a publish attempt
    /// (or a null-draft fault). The notice always satisfies the default
    /// termination vocabulary.
    pub async fn observe(&mut self, message: &Message) -> Option<String> {
        if self.state.is_terminal() {
            return None;
        }

        match message.utterance() {
            Utterance::Draft(draft) => {
                debug!(
                    speaker = %message.speaker,
                    chars = draft.chars().count(),
                    replaced = self.pending_draft.is_some(),
                    "Recorded draft"
                );
                self.pending_draft = Some(draft.to_string());
                self.state = GatekeeperState::Drafted;
                None
            }
            Utterance::Verdict(verdict) if verdict.is_approved() => self.on_approval().await,
            Utterance::Verdict(verdict) => {
                debug!(
                    speaker = %message.speaker,
                    decision = ?verdict.decision,
                    state = %self.state,
                    "Verdict is not an approval, nothing to do"
                );
                None
            }
            Utterance::Prompt(_) | Utterance::Notice(_) => None,
        }
    }

    async fn on_approval(&mut self) -> Option<String> {
        if self.has_published {
            debug!("Already published, ignoring repeated approval");
            return None;
        }

        let Some(draft) = self.pending_draft.clone() else {
            warn!("Approval arrived with no pending draft, refusing to publish");
            return Some(self.fail(GatekeeperFault::NullDraft));
        };

        info!(
            publisher = %self.publisher.name(),
            chars = draft.chars().count(),
            "Draft approved, publishing"
        );
        match self.publisher.publish(&draft).await {
            Ok(receipt) => {
                info!(
                    publisher = %self.publisher.name(),
                    publish_id = %receipt.id(),
                    simulated = self.publisher.is_simulated(),
                    "Published"
                );
                let notice = format!("{POSTED_TOKEN}: {}\n{STOP_TOKEN}", receipt.text());
                self.has_published = true;
                self.state = GatekeeperState::Published;
                self.receipt = Some(receipt);
                Some(notice)
            }
            Err(e) => {
                error!(publisher = %self.publisher.name(), error = %e, "Publish failed");
                Some(self.fail(GatekeeperFault::PublishFailed(e.to_string())))
            }
        }
    }

    fn fail(&mut self, fault: GatekeeperFault) -> String {
        let notice = format!("{ERROR_TOKEN} {fault}\n{STOP_TOKEN}");
        self.state = GatekeeperState::Failed;
        self.fault = Some(fault);
        notice
    }
}
