//! AI Learning Companion backend
//!
//! A Rust backend serving an AI tutoring platform: conversational help,
//! generated practice problems with answer evaluation, and per-user
//! learning statistics.

mod agents;
mod api;
mod auth;
mod config;
mod db;
mod llm;

use agents::{AnswerEvaluator, ProblemGenerator, TutorAgent};
use api::{create_router, AppState};
use config::Config;
use db::Database;
use llm::{CompletionService, LoggingService, OpenAiClient};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "companion=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = Arc::new(Config::from_env());

    // Ensure database directory exists
    if let Some(parent) = PathBuf::from(&config.db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path, "Opening database");
    let db = Database::open(&config.db_path)?;

    if config.has_completion_credentials() {
        tracing::info!(model = %config.openai_model, "Completion client initialized");
    } else {
        tracing::warn!("No completion API key configured. Set OPENAI_API_KEY.");
    }

    // Agents share one logged completion client, built once at startup
    let client = OpenAiClient::new(
        &config.openai_api_key,
        &config.openai_model,
        config.openai_base_url.as_deref(),
    );
    let service: Arc<dyn CompletionService> = Arc::new(LoggingService::new(Arc::new(client)));

    let tutor = TutorAgent::new(service.clone(), config.max_tokens, config.temperature);
    let generator = ProblemGenerator::new(service, config.max_tokens, config.temperature);
    let evaluator = AnswerEvaluator::new(tutor.clone());

    let state = AppState {
        db,
        config: config.clone(),
        tutor,
        generator,
        evaluator,
    };

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
