//! Draft / critique / publish group chat.
//!
//! A human proxy seeds the conversation with a task prompt, a drafter writes a
//! candidate post, a critic judges it, and gatekeeper logic publishes the
//! latest draft on the first approval.
//!
//! ```text
//!   user ──► tweet_generator ──► tweet_critic ──┐
//!                 ▲                              │ REJECTED
//!                 └──────────────────────────────┘
//!                                                │ APPROVED
//!                                                ▼
//!                                   Gatekeeper ──► Publisher (at most once)
//!                                                │
//!                                                ▼
//!                                   "TWEET POSTED: ..." / "ERROR: ..." → stop
//! ```
//!
//! Participants only generate text. The run loop in [`chat`] feeds every
//! appended message to the [`Gatekeeper`] and the termination detectors, and
//! the [`Scheduler`] bounds the loop with a round cap.

pub mod batch;
pub mod chat;
pub mod config;
pub mod conversation;
pub mod gatekeeper;
pub mod participant;
pub mod prompts;
pub mod scheduler;
pub mod termination;

pub use batch::run_batch;
pub use chat::{GroupChat, GroupChatBuilder, RunOutcome, StopReason, DEFAULT_GATEKEEPER_NAME};
pub use config::{ChatConfig, PromptOverrides};
pub use conversation::Conversation;
pub use gatekeeper::{Gatekeeper, GatekeeperFault, GatekeeperState};
pub use participant::Participant;
pub use scheduler::{NextSpeaker, Scheduler, SpeakerSelection};
pub use termination::TerminationDetector;
