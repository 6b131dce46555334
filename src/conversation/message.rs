//! Conversation participants and the messages they produce

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two fixed participants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentLabel {
    Agent1,
    Agent2,
}

impl AgentLabel {
    /// The participant who speaks after this one
    pub fn other(self) -> Self {
        match self {
            AgentLabel::Agent1 => AgentLabel::Agent2,
            AgentLabel::Agent2 => AgentLabel::Agent1,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            AgentLabel::Agent1 => "Agent 1",
            AgentLabel::Agent2 => "Agent 2",
        }
    }
}

impl fmt::Display for AgentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A committed turn. Never mutated after it lands in the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub speaker: AgentLabel,
    /// Model that produced the content (the configured model for the seed)
    pub model: String,
    pub content: String,
    pub created_at: DateTime<Local>,
}

impl Message {
    pub fn new(
        speaker: AgentLabel,
        model: impl Into<String>,
        content: impl Into<String>,
        created_at: DateTime<Local>,
    ) -> Self {
        Self {
            speaker,
            model: model.into(),
            content: content.into(),
            created_at,
        }
    }

    /// Wall-clock time of day, as shown next to each message
    pub fn time_of_day(&self) -> String {
        self.created_at.format("%H:%M:%S").to_string()
    }
}
