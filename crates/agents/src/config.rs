use serde::{Deserialize, Serialize};

use crate::scheduler::SpeakerSelection;

/// Settings for the group chat run loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Turn budget per conversation, counting the seed message.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    #[serde(default)]
    pub speaker_selection: SpeakerSelection,
    /// Participant names for fixed-order selection. Empty means roster order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fixed_order: Vec<String>,
    #[serde(default = "default_topic")]
    pub default_topic: String,
}

fn default_max_rounds() -> usize {
    4
}

fn default_topic() -> String {
    "microservices architecture".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            speaker_selection: SpeakerSelection::default(),
            fixed_order: Vec::new(),
            default_topic: default_topic(),
        }
    }
}

/// Replacements for the built-in role prompts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drafter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gatekeeper: Option<String>,
}
