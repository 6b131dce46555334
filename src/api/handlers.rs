//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{ConversationView, ErrorResponse, ModelsResponse, StartConversationRequest};
use super::AppState;
use crate::runtime::{SessionError, SseEvent};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Local;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Models
        .route("/api/models", get(list_models))
        // Conversation
        .route("/api/conversation", get(get_conversation))
        .route("/api/conversation/start", post(start_conversation))
        .route("/api/conversation/stop", post(stop_conversation))
        .route("/api/conversation/continue", post(continue_conversation))
        .route("/api/conversation/export", get(export_conversation))
        .route("/api/conversation/stream", get(stream_conversation))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Models
// ============================================================

async fn list_models(State(state): State<AppState>) -> Result<Json<ModelsResponse>, AppError> {
    let models = state
        .provider
        .list_models()
        .await
        .map_err(SessionError::from)?;
    Ok(Json(ModelsResponse { models }))
}

// ============================================================
// Conversation
// ============================================================

async fn get_conversation(
    State(state): State<AppState>,
) -> Result<Json<ConversationView>, AppError> {
    let snapshot = state.session.snapshot().await?;
    Ok(Json(ConversationView::from(&snapshot)))
}

async fn start_conversation(
    State(state): State<AppState>,
    Json(req): Json<StartConversationRequest>,
) -> Result<Json<ConversationView>, AppError> {
    let models = state
        .provider
        .list_models()
        .await
        .map_err(SessionError::from)?;

    let config = req.into_config(&state.defaults);
    config.validate(&models).map_err(SessionError::from)?;

    let snapshot = state.session.start(config).await?;
    Ok(Json(ConversationView::from(&snapshot)))
}

async fn stop_conversation(
    State(state): State<AppState>,
) -> Result<Json<ConversationView>, AppError> {
    let snapshot = state.session.stop().await?;
    Ok(Json(ConversationView::from(&snapshot)))
}

async fn continue_conversation(
    State(state): State<AppState>,
) -> Result<Json<ConversationView>, AppError> {
    let snapshot = state.session.continue_conversation().await?;
    Ok(Json(ConversationView::from(&snapshot)))
}

async fn export_conversation(State(state): State<AppState>) -> Result<Response, AppError> {
    let text = state.session.export().await.map_err(|e| match e {
        SessionError::NoConversation => AppError::NotFound(e.to_string()),
        other => other.into(),
    })?;

    let filename = format!("chat_{}.md", Local::now().format("%Y%m%d"));
    let headers = [
        (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
    ];
    Ok((headers, text).into_response())
}

async fn stream_conversation(State(state): State<AppState>) -> Result<Response, AppError> {
    // Subscribe first so nothing between the snapshot and the stream is lost
    let broadcast_rx = state.session.subscribe();
    let snapshot = state.session.snapshot().await?;
    Ok(sse_stream(SseEvent::Init { snapshot }, broadcast_rx).into_response())
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("autopilot-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(error: SessionError) -> Self {
        let message = error.to_string();
        match error {
            SessionError::Config(_) => AppError::BadRequest(message),
            SessionError::NoConversation
            | SessionError::AlreadyRunning
            | SessionError::Transition(_) => AppError::Conflict(message),
            SessionError::Provider(_) => AppError::ServiceUnavailable(message),
            SessionError::RuntimeClosed => AppError::Internal(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
