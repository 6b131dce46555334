//! Conversation state and its transitions
//!
//! Every operation takes the current time as an argument, so given the same
//! inputs a transition always produces the same state. The runtime owns the
//! clock.

use super::config::ConversationConfig;
use super::message::{AgentLabel, Message};
use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle of a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConvStatus {
    /// No conversation has been started in this session
    #[default]
    NotStarted,
    Running,
    PausedByTimeLimit,
    /// Terminal; a new conversation must be started to chat again
    Stopped,
}

impl ConvStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConvStatus::NotStarted => "not_started",
            ConvStatus::Running => "running",
            ConvStatus::PausedByTimeLimit => "paused_by_time_limit",
            ConvStatus::Stopped => "stopped",
        }
    }
}

/// Errors for operations attempted from the wrong state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Conversation is not running")]
    NotRunning,
    #[error("Conversation is not paused")]
    NotPaused,
    #[error("Conversation has already stopped")]
    AlreadyStopped,
    #[error("Time limit has not been reached")]
    TimeLimitNotReached,
    #[error("It is {expected}'s turn, not {got}'s")]
    TurnOutOfOrder { expected: AgentLabel, got: AgentLabel },
}

/// Who generates next, and with what
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextAgent {
    pub label: AgentLabel,
    pub model: String,
    pub system_prompt: String,
}

/// The conversation aggregate
#[derive(Debug, Clone, Serialize)]
pub struct ConversationState {
    id: Uuid,
    config: ConversationConfig,
    history: Vec<Message>,
    status: ConvStatus,
    started_at: DateTime<Local>,
    finished_at: Option<DateTime<Local>>,
    current_turn: AgentLabel,
    /// Start of the current time-limit window; moves forward on continue
    #[serde(skip)]
    limit_window_start: DateTime<Local>,
}

impl ConversationState {
    /// Start a conversation: Agent 1 has already "spoken" the topic.
    pub fn start(config: ConversationConfig, now: DateTime<Local>) -> Self {
        let seed = Message::new(
            AgentLabel::Agent1,
            config.agent1_model.clone(),
            config.topic.clone(),
            now,
        );

        Self {
            id: Uuid::new_v4(),
            config,
            history: vec![seed],
            status: ConvStatus::Running,
            started_at: now,
            finished_at: None,
            current_turn: AgentLabel::Agent2,
            limit_window_start: now,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn status(&self) -> ConvStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == ConvStatus::Running
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Local>> {
        self.finished_at
    }

    pub fn current_turn(&self) -> AgentLabel {
        self.current_turn
    }

    /// Whether the current limit window has run out. Always false when unlimited.
    pub fn is_time_limit_reached(&self, now: DateTime<Local>) -> bool {
        if self.config.turn_limit_minutes == 0 {
            return false;
        }
        let limit = Duration::minutes(i64::from(self.config.turn_limit_minutes));
        now - self.limit_window_start > limit
    }

    pub fn pause_for_time_limit(&mut self, now: DateTime<Local>) -> Result<(), TransitionError> {
        match self.status {
            ConvStatus::PausedByTimeLimit => Ok(()),
            ConvStatus::Running if self.is_time_limit_reached(now) => {
                self.status = ConvStatus::PausedByTimeLimit;
                Ok(())
            }
            ConvStatus::Running => Err(TransitionError::TimeLimitNotReached),
            ConvStatus::Stopped => Err(TransitionError::AlreadyStopped),
            ConvStatus::NotStarted => Err(TransitionError::NotRunning),
        }
    }

    /// Resume after a time-limit pause.
    ///
    /// `started_at` is kept so elapsed time covers the whole session; the limit
    /// window restarts at `now`, granting one more full interval.
    pub fn continue_conversation(&mut self, now: DateTime<Local>) -> Result<(), TransitionError> {
        match self.status {
            ConvStatus::PausedByTimeLimit => {
                self.status = ConvStatus::Running;
                self.limit_window_start = now;
                Ok(())
            }
            ConvStatus::Stopped => Err(TransitionError::AlreadyStopped),
            ConvStatus::Running | ConvStatus::NotStarted => Err(TransitionError::NotPaused),
        }
    }

    pub fn stop(&mut self, now: DateTime<Local>) -> Result<(), TransitionError> {
        match self.status {
            ConvStatus::Running | ConvStatus::PausedByTimeLimit => {
                self.status = ConvStatus::Stopped;
                self.finished_at = Some(now);
                Ok(())
            }
            ConvStatus::Stopped => Err(TransitionError::AlreadyStopped),
            ConvStatus::NotStarted => Err(TransitionError::NotRunning),
        }
    }

    /// Append a finished turn for `speaker`. The turn marker is left alone.
    pub fn record_turn(
        &mut self,
        speaker: AgentLabel,
        content: impl Into<String>,
        now: DateTime<Local>,
    ) -> Result<&Message, TransitionError> {
        if self.status != ConvStatus::Running {
            return Err(TransitionError::NotRunning);
        }
        if speaker != self.current_turn {
            return Err(TransitionError::TurnOutOfOrder {
                expected: self.current_turn,
                got: speaker,
            });
        }

        let model = self.config.model_for(speaker).to_string();
        self.history.push(Message::new(speaker, model, content, now));
        Ok(&self.history[self.history.len() - 1])
    }

    pub fn switch_turn(&mut self) {
        self.current_turn = self.current_turn.other();
    }

    pub fn next_agent(&self) -> NextAgent {
        let label = self.current_turn;
        NextAgent {
            label,
            model: self.config.model_for(label).to_string(),
            system_prompt: self.config.system_prompt_for(label).to_string(),
        }
    }

    /// Time since start, frozen once the conversation stops
    pub fn elapsed_time_display(&self, now: DateTime<Local>) -> String {
        let end = self.finished_at.unwrap_or(now);
        format_minutes_seconds(end - self.started_at)
    }

    /// Total duration for finished conversations
    pub fn duration_display(&self) -> String {
        match self.finished_at {
            Some(finished) => format_minutes_seconds(finished - self.started_at),
            None => "In progress".to_string(),
        }
    }
}

fn format_minutes_seconds(elapsed: Duration) -> String {
    let total = elapsed.num_seconds().max(0);
    format!("{}m {}s", total / 60, total % 60)
}
