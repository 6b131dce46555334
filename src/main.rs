//! Autopilot chat - two local models talking to each other
//!
//! Serves a small HTTP API that starts, pauses and stops an alternating
//! conversation between two Ollama models and streams it over SSE.

mod api;
mod config;
mod conversation;
mod llm;
mod runtime;

use api::{create_router, AppState};
use config::AppConfig;
use llm::{LoggingProvider, ModelProvider, OllamaConfig, OllamaProvider};
use runtime::{SessionHandle, SystemClock};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.default_log_filter().into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Model provider
    let ollama = OllamaProvider::new(OllamaConfig::new(&config.ollama_host))?;
    let provider: Arc<dyn ModelProvider> = Arc::new(LoggingProvider::new(Arc::new(ollama)));

    match provider.list_models().await {
        Ok(models) if models.is_empty() => {
            tracing::warn!(host = %config.ollama_host, "Ollama is running but no models are installed");
        }
        Ok(models) => {
            tracing::info!(host = %config.ollama_host, models = ?models, "Ollama reachable");
        }
        Err(e) => {
            tracing::warn!(
                host = %config.ollama_host,
                error = %e,
                "Ollama is not running or not reachable; start it with `ollama serve`"
            );
        }
    }

    // Conversation session
    let session = SessionHandle::spawn(provider.clone(), Arc::new(SystemClock));
    let state = AppState::new(session, provider, config.conversation_defaults());

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Autopilot chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
