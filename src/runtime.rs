//! Runtime for driving the agent-to-agent conversation
//!
//! A single background task owns the conversation. HTTP handlers talk to it
//! through a `SessionHandle`; SSE clients subscribe to its broadcast channel.

mod clock;
mod executor;
pub mod orchestrator;

#[cfg(test)]
pub mod testing;

pub use clock::{Clock, SystemClock};
pub use executor::ConversationRuntime;

use crate::conversation::{
    AgentLabel, ConfigError, ConvStatus, ConversationConfig, ConversationState, Message,
    TransitionError,
};
use crate::llm::{LlmError, ModelProvider};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Errors surfaced to callers of `SessionHandle`
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No conversation has been started")]
    NoConversation,
    #[error("A conversation is already running; stop it before starting another")]
    AlreadyRunning,
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Provider(#[from] LlmError),
    #[error("Conversation runtime is not available")]
    RuntimeClosed,
}

/// Point-in-time view of the session
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSnapshot {
    pub status: ConvStatus,
    pub conversation: Option<ConversationState>,
    /// "Xm Ys" since start, when a conversation exists
    pub elapsed: Option<String>,
    /// Message of the failure that stopped the conversation, if any
    pub last_error: Option<String>,
}

impl ConversationSnapshot {
    pub fn capture(
        conversation: Option<&ConversationState>,
        last_error: Option<&str>,
        now: DateTime<Local>,
    ) -> Self {
        Self {
            status: conversation.map_or(ConvStatus::NotStarted, ConversationState::status),
            conversation: conversation.cloned(),
            elapsed: conversation.map(|c| c.elapsed_time_display(now)),
            last_error: last_error.map(str::to_string),
        }
    }
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    Init {
        snapshot: ConversationSnapshot,
    },
    /// Streaming text for the turn in progress
    Fragment {
        agent: AgentLabel,
        text: String,
    },
    /// A message was committed to the history
    Message {
        message: Message,
    },
    StateChange {
        status: ConvStatus,
        reason: Option<String>,
    },
    Error {
        message: String,
    },
}

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// Commands accepted by the conversation runtime
#[derive(Debug)]
pub enum Command {
    Start {
        config: ConversationConfig,
        reply: Reply<ConversationSnapshot>,
    },
    Stop {
        reply: Reply<ConversationSnapshot>,
    },
    Continue {
        reply: Reply<ConversationSnapshot>,
    },
    Snapshot {
        reply: Reply<ConversationSnapshot>,
    },
    Export {
        reply: Reply<String>,
    },
}

/// Handle to interact with the conversation runtime
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<Command>,
    broadcast_tx: broadcast::Sender<SseEvent>,
}

impl SessionHandle {
    /// Spawn the runtime task and return a handle to it.
    pub fn spawn<P>(provider: Arc<P>, clock: Arc<dyn Clock>) -> Self
    where
        P: ModelProvider + ?Sized + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(256);

        let runtime = ConversationRuntime::new(provider, clock, command_rx, broadcast_tx.clone());
        tokio::spawn(runtime.run());

        Self {
            command_tx,
            broadcast_tx,
        }
    }

    /// Start a conversation from an already validated configuration.
    pub async fn start(&self, config: ConversationConfig) -> Result<ConversationSnapshot, SessionError> {
        self.request(|reply| Command::Start { config, reply }).await
    }

    pub async fn stop(&self) -> Result<ConversationSnapshot, SessionError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    pub async fn continue_conversation(&self) -> Result<ConversationSnapshot, SessionError> {
        self.request(|reply| Command::Continue { reply }).await
    }

    pub async fn snapshot(&self) -> Result<ConversationSnapshot, SessionError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Markdown transcript of the current conversation
    pub async fn export(&self) -> Result<String, SessionError> {
        self.request(|reply| Command::Export { reply }).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SseEvent> {
        self.broadcast_tx.subscribe()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(command(reply))
            .await
            .map_err(|_| SessionError::RuntimeClosed)?;
        rx.await.map_err(|_| SessionError::RuntimeClosed)?
    }
}
