//! Mock implementations for testing
//!
//! These mocks drive the runtime without a model server or wall clock.

use super::clock::Clock;
use super::orchestrator::TurnObserver;
use crate::conversation::{AgentLabel, ConversationState};
use crate::llm::{ChatMessage, FragmentStream, LlmError, ModelProvider};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Mock Model Provider
// ============================================================================

/// One scripted generation: fragments in order, then an optional error
struct Script {
    fragments: Vec<String>,
    error: Option<LlmError>,
}

/// A `stream_generate` call as the provider saw it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub model: String,
    pub history: Vec<ChatMessage>,
    pub system_prompt: String,
}

/// Mock provider that replays queued generations
pub struct MockProvider {
    models: Result<Vec<String>, LlmError>,
    scripts: Mutex<VecDeque<Script>>,
    fragment_delay: Option<Duration>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            models: Ok(vec!["A".to_string(), "B".to_string()]),
            scripts: Mutex::new(VecDeque::new()),
            fragment_delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_models(mut self, models: &[&str]) -> Self {
        self.models = Ok(models.iter().map(|m| (*m).to_string()).collect());
        self
    }

    /// Make `list_models` fail as if the server were down
    pub fn models_unavailable(mut self) -> Self {
        self.models = Err(LlmError::unavailable("connection refused"));
        self
    }

    /// Sleep before each fragment so tests can act mid-stream
    pub fn with_fragment_delay(mut self, delay: Duration) -> Self {
        self.fragment_delay = Some(delay);
        self
    }

    /// Queue a successful generation
    pub fn queue_fragments(&self, fragments: &[&str]) {
        self.queue(fragments, None);
    }

    /// Queue a generation that fails after the given fragments
    pub fn queue_error_after(&self, fragments: &[&str], error: LlmError) {
        self.queue(fragments, Some(error));
    }

    pub fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn queue(&self, fragments: &[&str], error: Option<LlmError>) {
        self.scripts.lock().unwrap().push_back(Script {
            fragments: fragments.iter().map(|f| (*f).to_string()).collect(),
            error,
        });
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        self.models.clone()
    }

    fn stream_generate(
        &self,
        model: &str,
        history: &[ChatMessage],
        system_prompt: &str,
    ) -> FragmentStream {
        self.requests.lock().unwrap().push(RecordedRequest {
            model: model.to_string(),
            history: history.to_vec(),
            system_prompt: system_prompt.to_string(),
        });
        let script = self.scripts.lock().unwrap().pop_front();
        let delay = self.fragment_delay;

        Box::pin(async_stream::stream! {
            match script {
                Some(script) => {
                    for fragment in script.fragments {
                        if let Some(delay) = delay {
                            tokio::time::sleep(delay).await;
                        }
                        yield Ok(fragment);
                    }
                    if let Some(error) = script.error {
                        yield Err(error);
                    }
                }
                None => yield Err(LlmError::unavailable("No mock response queued")),
            }
        })
    }
}

// ============================================================================
// Manual Clock
// ============================================================================

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Local::now()),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap()
    }
}

// ============================================================================
// Recording Observer
// ============================================================================

/// Observer that records fragments and can simulate a stop command
pub struct RecordingObserver {
    pub fragments: Vec<(AgentLabel, String)>,
    stop_after: Option<usize>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self {
            fragments: Vec::new(),
            stop_after: None,
        }
    }

    /// Stop the conversation once `count` fragments have arrived
    pub fn stop_after(mut self, count: usize) -> Self {
        self.stop_after = Some(count);
        self
    }
}

#[async_trait]
impl TurnObserver for RecordingObserver {
    fn on_fragment(&mut self, agent: AgentLabel, fragment: &str) {
        self.fragments.push((agent, fragment.to_string()));
    }

    async fn apply_next_command(&mut self, state: &mut ConversationState) {
        if self.stop_after.is_some_and(|n| self.fragments.len() >= n) {
            let _ = state.stop(Local::now());
            return;
        }
        // No user is typing
        std::future::pending::<()>().await;
    }
}
