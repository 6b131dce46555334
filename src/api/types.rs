//! API request and response types

use crate::config::ConversationDefaults;
use crate::conversation::{AgentLabel, ConvStatus, ConversationConfig, ConversationState, Message};
use crate::runtime::ConversationSnapshot;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How an agent's messages are drawn in the chat view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayAttributes {
    pub role: &'static str,
    pub avatar: &'static str,
}

pub fn display_attributes(agent: AgentLabel) -> DisplayAttributes {
    match agent {
        AgentLabel::Agent1 => DisplayAttributes {
            role: "user",
            avatar: "🤖",
        },
        AgentLabel::Agent2 => DisplayAttributes {
            role: "assistant",
            avatar: "🦾",
        },
    }
}

/// Request to start a conversation
#[derive(Debug, Deserialize)]
pub struct StartConversationRequest {
    pub agent1_model: String,
    pub agent2_model: String,
    pub topic: String,
    #[serde(default)]
    pub turn_limit_minutes: Option<u32>,
    #[serde(default)]
    pub agent1_system_prompt: Option<String>,
    #[serde(default)]
    pub agent2_system_prompt: Option<String>,
}

impl StartConversationRequest {
    /// Fill omitted or blank prompts and limit from the server defaults.
    pub fn into_config(self, defaults: &ConversationDefaults) -> ConversationConfig {
        let prompt = |p: Option<String>| {
            p.filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| defaults.system_prompt.clone())
        };

        ConversationConfig {
            agent1_model: self.agent1_model.trim().to_string(),
            agent2_model: self.agent2_model.trim().to_string(),
            topic: self.topic,
            turn_limit_minutes: self
                .turn_limit_minutes
                .unwrap_or(defaults.turn_limit_minutes),
            agent1_system_prompt: prompt(self.agent1_system_prompt),
            agent2_system_prompt: prompt(self.agent2_system_prompt),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
}

/// A history entry as the chat view renders it
#[derive(Debug, Serialize)]
pub struct MessageView {
    pub speaker: AgentLabel,
    pub speaker_name: &'static str,
    pub role: &'static str,
    pub avatar: &'static str,
    pub model: String,
    pub content: String,
    /// HH:MM:SS
    pub time: String,
    pub created_at: DateTime<Local>,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        let display = display_attributes(message.speaker);
        Self {
            speaker: message.speaker,
            speaker_name: message.speaker.display_name(),
            role: display.role,
            avatar: display.avatar,
            model: message.model.clone(),
            content: message.content.clone(),
            time: message.time_of_day(),
            created_at: message.created_at,
        }
    }
}

/// Full session view
#[derive(Debug, Serialize)]
pub struct ConversationView {
    pub status: ConvStatus,
    pub id: Option<Uuid>,
    pub config: Option<ConversationConfig>,
    pub current_turn: Option<AgentLabel>,
    pub started_at: Option<DateTime<Local>>,
    pub finished_at: Option<DateTime<Local>>,
    pub elapsed: Option<String>,
    pub messages: Vec<MessageView>,
    pub last_error: Option<String>,
}

impl From<&ConversationSnapshot> for ConversationView {
    fn from(snapshot: &ConversationSnapshot) -> Self {
        let conversation = snapshot.conversation.as_ref();
        Self {
            status: snapshot.status,
            id: conversation.map(ConversationState::id),
            config: conversation.map(|c| c.config().clone()),
            current_turn: conversation.map(ConversationState::current_turn),
            started_at: conversation.map(ConversationState::started_at),
            finished_at: conversation.and_then(ConversationState::finished_at),
            elapsed: snapshot.elapsed.clone(),
            messages: conversation
                .map(|c| c.history().iter().map(MessageView::from).collect())
                .unwrap_or_default(),
            last_error: snapshot.last_error.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> ConversationDefaults {
        ConversationDefaults {
            system_prompt: "be friendly".to_string(),
            turn_limit_minutes: 10,
        }
    }

    #[test]
    fn test_agents_map_to_distinct_display_roles() {
        assert_eq!(display_attributes(AgentLabel::Agent1).role, "user");
        assert_eq!(display_attributes(AgentLabel::Agent1).avatar, "🤖");
        assert_eq!(display_attributes(AgentLabel::Agent2).role, "assistant");
        assert_eq!(display_attributes(AgentLabel::Agent2).avatar, "🦾");
    }

    #[test]
    fn test_omitted_fields_use_defaults() {
        let request: StartConversationRequest = serde_json::from_str(
            r#"{"agent1_model":" A ","agent2_model":"B","topic":"T","agent2_system_prompt":"  "}"#,
        )
        .unwrap();

        let config = request.into_config(&defaults());
        assert_eq!(config.agent1_model, "A");
        assert_eq!(config.turn_limit_minutes, 10);
        assert_eq!(config.agent1_system_prompt, "be friendly");
        assert_eq!(config.agent2_system_prompt, "be friendly");
    }

    #[test]
    fn test_explicit_fields_win() {
        let request: StartConversationRequest = serde_json::from_str(
            r#"{"agent1_model":"A","agent2_model":"B","topic":"T","turn_limit_minutes":0,"agent1_system_prompt":"argue"}"#,
        )
        .unwrap();

        let config = request.into_config(&defaults());
        assert_eq!(config.turn_limit_minutes, 0);
        assert_eq!(config.agent1_system_prompt, "argue");
        assert_eq!(config.agent2_system_prompt, "be friendly");
    }

    #[test]
    fn test_empty_snapshot_view() {
        let snapshot = ConversationSnapshot::capture(None, None, Local::now());
        let view = ConversationView::from(&snapshot);
        assert_eq!(view.status, ConvStatus::NotStarted);
        assert!(view.messages.is_empty());
        assert!(view.id.is_none());
    }

    #[test]
    fn test_message_view_carries_display_attributes() {
        let message = Message::new(AgentLabel::Agent2, "B", "Hello", Local::now());
        let view = MessageView::from(&message);
        assert_eq!(view.role, "assistant");
        assert_eq!(view.speaker_name, "Agent 2");
        assert_eq!(view.time.len(), 8);
    }
}
