//! Model provider abstraction
//!
//! The conversation core only needs two things from a provider: the list of
//! installed models and a streamed chat generation.

mod error;
mod ollama;
mod types;

pub use error::LlmError;
#[cfg(test)]
pub use error::LlmErrorKind;
pub use ollama::{OllamaConfig, OllamaProvider};
pub use types::*;

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;

/// Common interface for model providers
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Identifiers of the installed models. An empty list is not an error.
    async fn list_models(&self) -> Result<Vec<String>, LlmError>;

    /// Stream a chat completion for `model`.
    fn stream_generate(
        &self,
        model: &str,
        history: &[ChatMessage],
        system_prompt: &str,
    ) -> FragmentStream;
}

#[async_trait]
impl<T: ModelProvider + ?Sized> ModelProvider for Arc<T> {
    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        (**self).list_models().await
    }

    fn stream_generate(
        &self,
        model: &str,
        history: &[ChatMessage],
        system_prompt: &str,
    ) -> FragmentStream {
        (**self).stream_generate(model, history, system_prompt)
    }
}

/// Logging wrapper for model providers
pub struct LoggingProvider {
    inner: Arc<dyn ModelProvider>,
}

impl LoggingProvider {
    pub fn new(inner: Arc<dyn ModelProvider>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ModelProvider for LoggingProvider {
    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let start = Instant::now();
        let result = self.inner.list_models().await;
        let duration = start.elapsed();

        match &result {
            Ok(models) => {
                tracing::info!(
                    duration_ms = %duration.as_millis(),
                    count = models.len(),
                    "Listed models"
                );
            }
            Err(e) => {
                tracing::error!(
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = e.kind.as_str(),
                    "Failed to list models"
                );
            }
        }

        result
    }

    fn stream_generate(
        &self,
        model: &str,
        history: &[ChatMessage],
        system_prompt: &str,
    ) -> FragmentStream {
        tracing::info!(model = %model, messages = history.len(), "Sending prompt");

        let mut inner = self.inner.stream_generate(model, history, system_prompt);
        let model = model.to_string();

        Box::pin(async_stream::stream! {
            let start = Instant::now();
            let mut fragments = 0usize;
            let mut chars = 0usize;

            while let Some(item) = inner.next().await {
                match &item {
                    Ok(text) => {
                        fragments += 1;
                        chars += text.len();
                    }
                    Err(e) => {
                        tracing::warn!(
                            model = %model,
                            duration_ms = %start.elapsed().as_millis(),
                            fragments,
                            error = %e.message,
                            kind = e.kind.as_str(),
                            "Generation failed"
                        );
                    }
                }
                yield item;
            }

            tracing::info!(
                model = %model,
                duration_ms = %start.elapsed().as_millis(),
                fragments,
                chars,
                "Generation stream ended"
            );
        })
    }
}
