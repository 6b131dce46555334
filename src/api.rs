//! HTTP API for the autopilot chat

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::config::ConversationDefaults;
use crate::llm::ModelProvider;
use crate::runtime::SessionHandle;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub session: SessionHandle,
    pub provider: Arc<dyn ModelProvider>,
    pub defaults: ConversationDefaults,
}

impl AppState {
    pub fn new(
        session: SessionHandle,
        provider: Arc<dyn ModelProvider>,
        defaults: ConversationDefaults,
    ) -> Self {
        Self {
            session,
            provider,
            defaults,
        }
    }
}
