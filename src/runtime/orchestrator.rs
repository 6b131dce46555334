//! One generation cycle against the model provider
//!
//! `run_turn` checks the time limit, streams the next agent's response while
//! still serving user commands, and commits the result.

use super::clock::Clock;
use crate::conversation::{AgentLabel, ConversationState, Message, TransitionError};
use crate::llm::{ChatMessage, LlmError, ModelProvider};
use async_trait::async_trait;
use futures::StreamExt;
use thiserror::Error;

/// Why a turn ended the conversation
#[derive(Debug, Clone, Error)]
pub enum TurnError {
    #[error("{agent} ({model}) failed to generate a response. The conversation has been stopped.")]
    EmptyGeneration { agent: AgentLabel, model: String },
    #[error("{agent} ({model}) could not generate a response: {source}")]
    Provider {
        agent: AgentLabel,
        model: String,
        source: LlmError,
    },
    #[error("Could not record the response: {0}")]
    Transition(#[from] TransitionError),
}

/// Result of a single `run_turn` call
#[derive(Debug)]
pub enum TurnOutcome {
    /// Conversation was not running; nothing happened
    Idle,
    PausedForTimeLimit,
    /// A message was appended and the turn passed to the other agent
    Recorded(Message),
    /// A user command left the running state mid-stream; partial text dropped
    Abandoned { discarded_bytes: usize },
    /// The conversation was stopped because of this failure
    Failed(TurnError),
}

/// Hooks the orchestrator calls while a generation streams in
#[async_trait]
pub trait TurnObserver: Send {
    /// A fragment arrived for `agent`
    fn on_fragment(&mut self, agent: AgentLabel, fragment: &str);

    /// Wait for the next user command and apply it to `state`.
    ///
    /// Raced against the generation stream, so it must be cancel safe: a
    /// command is either fully applied or left unreceived.
    async fn apply_next_command(&mut self, state: &mut ConversationState);
}

/// Map the history onto the provider's two-role chat view: the last message is
/// the prompt, everything before it is prior responder output.
pub fn project_history(history: &[Message]) -> Vec<ChatMessage> {
    let last = history.len().saturating_sub(1);
    history
        .iter()
        .enumerate()
        .map(|(i, message)| {
            if i == last {
                ChatMessage::user(message.content.as_str())
            } else {
                ChatMessage::assistant(message.content.as_str())
            }
        })
        .collect()
}

/// Drive exactly one generation cycle.
pub async fn run_turn<P, O>(
    state: &mut ConversationState,
    provider: &P,
    clock: &dyn Clock,
    observer: &mut O,
) -> TurnOutcome
where
    P: ModelProvider + ?Sized,
    O: TurnObserver + ?Sized,
{
    if !state.is_running() {
        return TurnOutcome::Idle;
    }

    let now = clock.now();
    if state.is_time_limit_reached(now) {
        if let Err(e) = state.pause_for_time_limit(now) {
            return fail(state, clock, e.into());
        }
        tracing::info!(conversation_id = %state.id(), "Time limit reached, conversation paused");
        return TurnOutcome::PausedForTimeLimit;
    }

    let next = state.next_agent();
    let history = project_history(state.history());
    tracing::info!(
        conversation_id = %state.id(),
        agent = %next.label,
        model = %next.model,
        "Generating turn"
    );

    let mut stream = provider.stream_generate(&next.model, &history, &next.system_prompt);
    let mut response = String::new();

    loop {
        // Commands first, so a stop wins over a fragment that is already waiting
        let item = tokio::select! {
            biased;

            () = observer.apply_next_command(state) => {
                if state.is_running() {
                    continue;
                }
                tracing::info!(
                    conversation_id = %state.id(),
                    agent = %next.label,
                    discarded_bytes = response.len(),
                    "Conversation left running state mid-generation, discarding partial response"
                );
                return TurnOutcome::Abandoned {
                    discarded_bytes: response.len(),
                };
            }

            item = stream.next() => item,
        };

        match item {
            Some(Ok(fragment)) => {
                response.push_str(&fragment);
                observer.on_fragment(next.label, &fragment);
            }
            Some(Err(source)) => {
                let error = TurnError::Provider {
                    agent: next.label,
                    model: next.model,
                    source,
                };
                return fail(state, clock, error);
            }
            None => break,
        }
    }

    if response.trim().is_empty() {
        tracing::warn!(model = %next.model, "Model returned an empty response");
        let error = TurnError::EmptyGeneration {
            agent: next.label,
            model: next.model,
        };
        return fail(state, clock, error);
    }

    let recorded = match state.record_turn(next.label, response, clock.now()) {
        Ok(message) => message.clone(),
        Err(e) => return fail(state, clock, e.into()),
    };
    state.switch_turn();

    TurnOutcome::Recorded(recorded)
}

fn fail(state: &mut ConversationState, clock: &dyn Clock, error: TurnError) -> TurnOutcome {
    // Already stopped is fine; the failure still gets reported
    let _ = state.stop(clock.now());
    TurnOutcome::Failed(error)
}
