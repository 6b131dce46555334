//! Conversation runtime executor

use super::orchestrator::{run_turn, TurnObserver, TurnOutcome};
use super::{Clock, Command, ConversationSnapshot, SessionError, SseEvent};
use crate::conversation::{AgentLabel, ConvStatus, ConversationConfig, ConversationState};
use crate::llm::ModelProvider;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc};

/// Owns the conversation and runs turns back to back while it is running
pub struct ConversationRuntime<P>
where
    P: ModelProvider + ?Sized + 'static,
{
    provider: Arc<P>,
    clock: Arc<dyn Clock>,
    conversation: Option<ConversationState>,
    /// Failure that stopped the current conversation
    last_error: Option<String>,
    command_rx: mpsc::Receiver<Command>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    /// Commands received mid-turn that only the run loop can handle
    deferred: Vec<Command>,
    /// Every handle is gone
    closed: bool,
}

impl<P> ConversationRuntime<P>
where
    P: ModelProvider + ?Sized + 'static,
{
    pub fn new(
        provider: Arc<P>,
        clock: Arc<dyn Clock>,
        command_rx: mpsc::Receiver<Command>,
        broadcast_tx: broadcast::Sender<SseEvent>,
    ) -> Self {
        Self {
            provider,
            clock,
            conversation: None,
            last_error: None,
            command_rx,
            broadcast_tx,
            deferred: Vec::new(),
            closed: false,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("Starting conversation runtime");

        loop {
            if self.is_running() {
                self.drain_commands();
                if self.closed {
                    break;
                }
                self.drive_turn().await;
                // Give handlers a chance between back-to-back turns
                tokio::task::yield_now().await;
            } else {
                match self.command_rx.recv().await {
                    Some(command) => self.handle_command(command),
                    None => break,
                }
            }
        }

        tracing::info!("Conversation runtime stopped");
    }

    fn is_running(&self) -> bool {
        self.conversation
            .as_ref()
            .is_some_and(ConversationState::is_running)
    }

    fn context(&self) -> CommandContext<'_> {
        CommandContext {
            clock: self.clock.as_ref(),
            broadcast_tx: &self.broadcast_tx,
            last_error: self.last_error.as_deref(),
        }
    }

    fn drain_commands(&mut self) {
        loop {
            match self.command_rx.try_recv() {
                Ok(command) => self.handle_command(command),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        let context = CommandContext {
            clock: self.clock.as_ref(),
            broadcast_tx: &self.broadcast_tx,
            last_error: self.last_error.as_deref(),
        };
        if let Some(Command::Start { config, reply }) =
            apply_command(self.conversation.as_mut(), command, &context)
        {
            let _ = reply.send(self.start(config));
        }
    }

    fn start(&mut self, config: ConversationConfig) -> Result<ConversationSnapshot, SessionError> {
        if self.is_running() {
            return Err(SessionError::AlreadyRunning);
        }

        let state = ConversationState::start(config, self.clock.now());
        tracing::info!(
            conversation_id = %state.id(),
            agent1_model = %state.config().agent1_model,
            agent2_model = %state.config().agent2_model,
            turn_limit_minutes = state.config().turn_limit_minutes,
            "Conversation started"
        );

        let seed = state.history().first().cloned();
        self.conversation = Some(state);
        self.last_error = None;

        let context = self.context();
        context.state_change(ConvStatus::Running, None);
        if let Some(message) = seed {
            context.broadcast(SseEvent::Message { message });
        }
        Ok(context.snapshot(self.conversation.as_ref()))
    }

    async fn drive_turn(&mut self) {
        let Some(state) = self.conversation.as_mut() else {
            return;
        };

        let mut observer = RuntimeObserver {
            command_rx: &mut self.command_rx,
            context: CommandContext {
                clock: self.clock.as_ref(),
                broadcast_tx: &self.broadcast_tx,
                last_error: self.last_error.as_deref(),
            },
            deferred: &mut self.deferred,
            closed: &mut self.closed,
        };
        let outcome = run_turn(
            state,
            self.provider.as_ref(),
            self.clock.as_ref(),
            &mut observer,
        )
        .await;

        self.report(outcome);

        for command in std::mem::take(&mut self.deferred) {
            self.handle_command(command);
        }
    }

    fn report(&mut self, outcome: TurnOutcome) {
        match outcome {
            TurnOutcome::Idle => {}
            TurnOutcome::Abandoned { discarded_bytes } => {
                tracing::debug!(discarded_bytes, "Turn abandoned");
            }
            TurnOutcome::PausedForTimeLimit => {
                let minutes = self
                    .conversation
                    .as_ref()
                    .map_or(0, |c| c.config().turn_limit_minutes);
                let reason = format!("Time limit of {minutes} minutes reached. Conversation paused.");
                self.context()
                    .state_change(ConvStatus::PausedByTimeLimit, Some(reason));
            }
            TurnOutcome::Recorded(message) => {
                self.context().broadcast(SseEvent::Message { message });
            }
            TurnOutcome::Failed(error) => {
                let conversation_id = self.conversation.as_ref().map(ConversationState::id);
                tracing::error!(
                    conversation_id = ?conversation_id,
                    error = %error,
                    "Turn failed, conversation stopped"
                );

                let message = error.to_string();
                self.last_error = Some(message.clone());
                let context = self.context();
                context.broadcast(SseEvent::Error { message });
                context.state_change(ConvStatus::Stopped, None);
            }
        }
    }
}

/// What command handling needs besides the conversation itself
struct CommandContext<'a> {
    clock: &'a dyn Clock,
    broadcast_tx: &'a broadcast::Sender<SseEvent>,
    last_error: Option<&'a str>,
}

impl CommandContext<'_> {
    fn snapshot(&self, conversation: Option<&ConversationState>) -> ConversationSnapshot {
        ConversationSnapshot::capture(conversation, self.last_error, self.clock.now())
    }

    fn broadcast(&self, event: SseEvent) {
        // No subscribers is fine
        let _ = self.broadcast_tx.send(event);
    }

    fn state_change(&self, status: ConvStatus, reason: Option<String>) {
        tracing::debug!(status = status.as_str(), reason = ?reason, "State change");
        self.broadcast(SseEvent::StateChange { status, reason });
    }
}

/// Apply a command to the current conversation.
///
/// A start is refused while the conversation runs. Otherwise it is handed
/// back, since replacing the conversation is up to the run loop.
#[must_use]
fn apply_command(
    conversation: Option<&mut ConversationState>,
    command: Command,
    context: &CommandContext<'_>,
) -> Option<Command> {
    match command {
        Command::Start { reply, .. }
            if conversation
                .as_deref()
                .is_some_and(ConversationState::is_running) =>
        {
            let _ = reply.send(Err(SessionError::AlreadyRunning));
        }
        start @ Command::Start { .. } => return Some(start),
        Command::Stop { reply } => {
            let result = match conversation {
                None => Err(SessionError::NoConversation),
                Some(state) => match state.stop(context.clock.now()) {
                    Ok(()) => {
                        tracing::info!(conversation_id = %state.id(), "Conversation stopped by user");
                        context
                            .state_change(ConvStatus::Stopped, Some("Stopped by user".to_string()));
                        Ok(context.snapshot(Some(&*state)))
                    }
                    Err(e) => Err(e.into()),
                },
            };
            let _ = reply.send(result);
        }
        Command::Continue { reply } => {
            let result = match conversation {
                None => Err(SessionError::NoConversation),
                Some(state) => match state.continue_conversation(context.clock.now()) {
                    Ok(()) => {
                        tracing::info!(conversation_id = %state.id(), "Conversation continued");
                        context.state_change(ConvStatus::Running, None);
                        Ok(context.snapshot(Some(&*state)))
                    }
                    Err(e) => Err(e.into()),
                },
            };
            let _ = reply.send(result);
        }
        Command::Snapshot { reply } => {
            let _ = reply.send(Ok(context.snapshot(conversation.as_deref())));
        }
        Command::Export { reply } => {
            let result = conversation
                .map(|state| state.export_to_text())
                .ok_or(SessionError::NoConversation);
            let _ = reply.send(result);
        }
    }
    None
}

/// Relays fragments to subscribers and serves commands mid-generation
struct RuntimeObserver<'a> {
    command_rx: &'a mut mpsc::Receiver<Command>,
    context: CommandContext<'a>,
    deferred: &'a mut Vec<Command>,
    closed: &'a mut bool,
}

#[async_trait]
impl TurnObserver for RuntimeObserver<'_> {
    fn on_fragment(&mut self, agent: AgentLabel, fragment: &str) {
        self.context.broadcast(SseEvent::Fragment {
            agent,
            text: fragment.to_string(),
        });
    }

    async fn apply_next_command(&mut self, state: &mut ConversationState) {
        // recv is cancel safe; everything after it is synchronous
        match self.command_rx.recv().await {
            Some(command) => {
                if let Some(command) = apply_command(Some(&mut *state), command, &self.context) {
                    self.deferred.push(command);
                }
            }
            None => {
                *self.closed = true;
                let _ = state.stop(self.context.clock.now());
            }
        }
    }
}
