//! Turn scheduling.
//!
//! Both policies are pure functions of the conversation history and the round
//! index; the scheduler itself carries no per-run state.

use postgate_common::{Message, ParticipantRole, Utterance};
use serde::{Deserialize, Serialize};

use crate::conversation::Conversation;
use crate::participant::Participant;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerSelection {
    /// Route on the role and content of the last message.
    #[default]
    Auto,
    /// Cycle through a fixed list of participant names.
    Fixed,
}

/// Outcome of a scheduling decision.
#[derive(Debug, Clone, Copy)]
pub enum NextSpeaker<'a> {
    Speaker(&'a Participant),
    Done,
}

impl<'a> NextSpeaker<'a> {
    pub fn speaker(self) -> Option<&'a Participant> {
        match self {
            Self::Speaker(p) => Some(p),
            Self::Done => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    selection: SpeakerSelection,
    /// Speaking order for [`SpeakerSelection::Fixed`]. Empty means roster order.
    order: Vec<String>,
    max_rounds: usize,
}

impl Scheduler {
    pub fn auto(max_rounds: usize) -> Self {
        Self {
            selection: SpeakerSelection::Auto,
            order: Vec::new(),
            max_rounds,
        }
    }

    pub fn fixed(order: Vec<String>, max_rounds: usize) -> Self {
        Self {
            selection: SpeakerSelection::Fixed,
            order,
            max_rounds,
        }
    }

    pub fn selection(&self) -> SpeakerSelection {
        self.selection
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// Whether `rounds` turns have used up the budget.
    pub fn cap_reached(&self, rounds: usize) -> bool {
        rounds >= self.max_rounds
    }

    /// Pick who speaks after `rounds` completed turns.
    ///
    /// Returns [`NextSpeaker::Done`] once the round cap is reached, whatever
    /// the history says.
    pub fn next_speaker<'a>(
        &self,
        history: &Conversation,
        participants: &'a [Participant],
        rounds: usize,
    ) -> NextSpeaker<'a> {
        if self.cap_reached(rounds) {
            return NextSpeaker::Done;
        }
        match self.selection {
            SpeakerSelection::Auto => auto_select(history.last(), participants),
            SpeakerSelection::Fixed => self.fixed_select(history.last(), participants),
        }
    }

    fn fixed_select<'a>(
        &self,
        last: Option<&Message>,
        participants: &'a [Participant],
    ) -> NextSpeaker<'a> {
        let order: Vec<&str> = if self.order.is_empty() {
            participants.iter().map(Participant::name).collect()
        } else {
            self.order.iter().map(String::as_str).collect()
        };
        if order.is_empty() {
            return NextSpeaker::Done;
        }

        // A speaker outside the order (e.g. a synthesized notice) restarts it.
        let next = last
            .and_then(|m| order.iter().position(|name| *name == m.speaker))
            .map(|i| order[(i + 1) % order.len()])
            .unwrap_or(order[0]);

        match participants.iter().find(|p| p.name() == next) {
            Some(p) => NextSpeaker::Speaker(p),
            None => NextSpeaker::Done,
        }
    }
}

fn by_role(participants: &[Participant], role: ParticipantRole) -> NextSpeaker<'_> {
    participants
        .iter()
        .find(|p| p.role() == role)
        .map_or(NextSpeaker::Done, NextSpeaker::Speaker)
}

fn auto_select<'a>(last: Option<&Message>, participants: &'a [Participant]) -> NextSpeaker<'a> {
    let Some(last) = last else {
        return by_role(participants, ParticipantRole::HumanProxy);
    };

    match last.utterance() {
        Utterance::Prompt(_) => by_role(participants, ParticipantRole::Drafter),
        Utterance::Draft(_) => by_role(participants, ParticipantRole::Critic),
        // Empty drafter turn: ask again.
        Utterance::Notice(_) if last.role == ParticipantRole::Drafter => {
            by_role(participants, ParticipantRole::Drafter)
        }
        Utterance::Verdict(verdict) if verdict.is_approved() => {
            by_role(participants, ParticipantRole::Gatekeeper)
        }
        Utterance::Verdict(_) => by_role(participants, ParticipantRole::Drafter),
        Utterance::Notice(_) => NextSpeaker::Done,
    }
}
