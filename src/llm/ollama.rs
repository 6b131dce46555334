//! Ollama provider implementation
//!
//! Lists models via `/api/tags` and streams chat completions from `/api/chat`,
//! which answers with newline-delimited JSON.

use super::types::{ChatMessage, FragmentStream};
use super::{LlmError, ModelProvider};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for an Ollama server
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub host: String,
    pub connect_timeout: Duration,
    pub list_timeout: Duration,
    /// Longest silence tolerated between two reads of a generation stream
    pub read_timeout: Duration,
}

impl OllamaConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            connect_timeout: Duration::from_secs(10),
            list_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(120),
        }
    }
}

pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
}

impl OllamaProvider {
    pub fn new(config: OllamaConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build()
            .map_err(|e| LlmError::unavailable(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.host.trim_end_matches('/'))
    }

    fn build_request(model: &str, history: &[ChatMessage], system_prompt: &str) -> ChatRequest {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if !system_prompt.trim().is_empty() {
            messages.push(ChatMessage::system(system_prompt));
        }
        messages.extend(history.iter().cloned());

        ChatRequest {
            model: model.to_string(),
            messages,
            stream: true,
        }
    }
}

#[async_trait]
impl ModelProvider for OllamaProvider {
    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let url = self.url("/api/tags");
        tracing::debug!(url = %url, "Fetching installed models");

        let response = self
            .client
            .get(&url)
            .timeout(self.config.list_timeout)
            .send()
            .await
            .map_err(|e| {
                LlmError::unavailable(format!(
                    "Ollama is not running or not reachable at {}: {e}",
                    self.config.host
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::protocol(format!(
                "Ollama returned {status} listing models: {body}"
            )));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::protocol(format!("Malformed model list: {e}")))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn stream_generate(
        &self,
        model: &str,
        history: &[ChatMessage],
        system_prompt: &str,
    ) -> FragmentStream {
        let request = Self::build_request(model, history, system_prompt);
        let client = self.client.clone();
        let url = self.url("/api/chat");
        let model = model.to_string();

        Box::pin(async_stream::stream! {
            let response = client
                .post(&url)
                .json(&request)
                .send()
                .await;

            let response = match response {
                Ok(res) if res.status().is_success() => res,
                Ok(res) => {
                    let status = res.status();
                    let body = res.text().await.unwrap_or_default();
                    yield Err(LlmError::protocol(format!(
                        "Ollama returned {status} for {model}: {}",
                        error_text(&body)
                    )));
                    return;
                }
                Err(e) => {
                    yield Err(LlmError::unavailable(format!(
                        "Error communicating with model {model}: {e}"
                    )));
                    return;
                }
            };

            let mut body = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();
            let mut finished = false;

            while !finished {
                let chunk = match body.next().await {
                    Some(Ok(bytes)) => bytes,
                    Some(Err(e)) => {
                        yield Err(LlmError::unavailable(format!(
                            "Stream from {model} interrupted: {e}"
                        )));
                        return;
                    }
                    None => break,
                };
                buffer.extend_from_slice(&chunk);

                // Lines may be split across chunks; keep the tail for next time
                while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    match parse_line(&line) {
                        LineEvent::Fragment(text) => yield Ok(text),
                        LineEvent::Failed(e) => {
                            yield Err(e);
                            return;
                        }
                        LineEvent::Done => {
                            finished = true;
                            break;
                        }
                        LineEvent::Skip => {}
                    }
                }
            }

            // Trailing line without a newline
            if !finished {
                match parse_line(&buffer) {
                    LineEvent::Fragment(text) => yield Ok(text),
                    LineEvent::Failed(e) => yield Err(e),
                    LineEvent::Done | LineEvent::Skip => {}
                }
            }
        })
    }
}

enum LineEvent {
    Fragment(String),
    Failed(LlmError),
    Done,
    Skip,
}

fn parse_line(raw: &[u8]) -> LineEvent {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    if line.is_empty() {
        return LineEvent::Skip;
    }

    let parsed: ChatStreamLine = match serde_json::from_str(line) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(line = %line, error = %e, "Received non-JSON line from stream");
            return LineEvent::Skip;
        }
    };

    if let Some(error) = parsed.error {
        return LineEvent::Failed(LlmError::protocol(format!("Ollama error: {error}")));
    }

    let content = parsed
        .message
        .and_then(|m| m.content)
        .filter(|c| !c.is_empty());

    match (content, parsed.done) {
        (Some(text), _) => LineEvent::Fragment(text),
        (None, true) => LineEvent::Done,
        (None, false) => LineEvent::Skip,
    }
}

/// Pull the `error` field out of an Ollama error body when there is one
fn error_text(body: &str) -> String {
    serde_json::from_str::<ChatStreamLine>(body)
        .ok()
        .and_then(|line| line.error)
        .unwrap_or_else(|| body.to_string())
}

// ============================================================================
// Ollama API types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ChatStreamLine {
    #[serde(default)]
    message: Option<StreamMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamMessage {
    #[serde(default)]
    content: Option<String>,
}
