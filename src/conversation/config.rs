//! Per-conversation configuration and its boundary validation

use super::message::AgentLabel;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Everything needed to start a conversation. Fixed once the conversation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationConfig {
    pub agent1_model: String,
    pub agent2_model: String,
    pub topic: String,
    /// Minutes before the conversation pauses; 0 means unlimited
    pub turn_limit_minutes: u32,
    pub agent1_system_prompt: String,
    pub agent2_system_prompt: String,
}

/// Rejected configuration. Never reaches the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Enter a topic for the agents to discuss")]
    BlankTopic,
    #[error("No model selected for {0}")]
    BlankModel(AgentLabel),
    #[error("Both agents are set to {0}; pick two different models")]
    DuplicateModel(String),
    #[error("Model {model} for {agent} is not installed")]
    UnknownModel { agent: AgentLabel, model: String },
}

impl ConversationConfig {
    pub fn model_for(&self, agent: AgentLabel) -> &str {
        match agent {
            AgentLabel::Agent1 => &self.agent1_model,
            AgentLabel::Agent2 => &self.agent2_model,
        }
    }

    pub fn system_prompt_for(&self, agent: AgentLabel) -> &str {
        match agent {
            AgentLabel::Agent1 => &self.agent1_system_prompt,
            AgentLabel::Agent2 => &self.agent2_system_prompt,
        }
    }

    /// Check the configuration against the models the provider reports.
    pub fn validate(&self, available_models: &[String]) -> Result<(), ConfigError> {
        if self.topic.trim().is_empty() {
            return Err(ConfigError::BlankTopic);
        }

        for agent in [AgentLabel::Agent1, AgentLabel::Agent2] {
            let model = self.model_for(agent);
            if model.trim().is_empty() {
                return Err(ConfigError::BlankModel(agent));
            }
            if !available_models.iter().any(|m| m == model) {
                return Err(ConfigError::UnknownModel {
                    agent,
                    model: model.to_string(),
                });
            }
        }

        if self.agent1_model == self.agent2_model {
            return Err(ConfigError::DuplicateModel(self.agent1_model.clone()));
        }

        Ok(())
    }
}
