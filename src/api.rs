//! HTTP API

mod handlers;
mod types;

pub use handlers::create_router;

use crate::agents::{AgentError, AnswerEvaluator, ProblemGenerator, TutorAgent};
use crate::config::Config;
use crate::db::{Database, DbError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

/// Shared application state. Agents are constructed once at startup and
/// cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub tutor: TutorAgent,
    pub generator: ProblemGenerator,
    pub evaluator: AnswerEvaluator,
}

/// API error type with axum response conversion
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Internal(String),
    Upstream(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::Upstream(msg) => {
                tracing::warn!(error = %msg, "upstream completion failure");
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
        };

        (status, Json(types::ErrorResponse { error: message })).into_response()
    }
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(entity) => AppError::NotFound(format!("{entity} not found")),
            DbError::Conflict(msg) => AppError::BadRequest(msg),
            DbError::Sqlite(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<AgentError> for AppError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Auth(msg) => AppError::Upstream(format!("AI service auth failed: {msg}")),
            AgentError::GenerationFailed(msg) => AppError::Upstream(msg),
        }
    }
}
