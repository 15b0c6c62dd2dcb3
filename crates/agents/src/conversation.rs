//! Append-only conversation log.

use postgate_common::{Message, ParticipantRole};

/// Ordered log of messages for one run. Owned by that run only.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return it. Prior entries are never touched.
    pub fn append(
        &mut self,
        speaker: impl Into<String>,
        role: ParticipantRole,
        content: impl Into<String>,
    ) -> &Message {
        let order = self.messages.len() as u64;
        self.messages.push(Message::new(order, speaker, role, content));
        &self.messages[self.messages.len() - 1]
    }

    /// Newest message matching `predicate`, scanning backwards.
    pub fn last_matching<P>(&self, predicate: P) -> Option<&Message>
    where
        P: Fn(&Message) -> bool,
    {
        self.messages.iter().rev().find(|m| predicate(m))
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop every message. Safe to call repeatedly.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}
