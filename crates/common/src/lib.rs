//! Common types shared across postgate crates.
//!
//! This crate provides the message log entry, the participant role tags and
//! the typed reading of a message's content that the chat loop, the oracle
//! clients and the publish endpoints all agree on.

pub mod error;
pub mod message;
pub mod verdict;

pub use error::{PostgateError, Result};
pub use message::{Message, ParticipantRole, Utterance};
pub use verdict::{Decision, Verdict};
