//! Route handlers

use super::types::*;
use super::{AppError, AppState};
use crate::agents::{json_block, HISTORY_WINDOW};
use crate::auth::{self, AuthUser};
use crate::config::{SERVICE_NAME, SERVICE_VERSION};
use crate::db::LearningStats;
use crate::llm::ChatTurn;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

const PRACTICE_HISTORY_LIMIT: usize = 20;

const SUGGESTED_TOPICS: &[&str] = &[
    "Python Programming",
    "Data Structures",
    "Algorithms",
    "Web Development",
    "Machine Learning",
    "Database Design",
    "System Design",
    "Mathematics",
    "Statistics",
    "Computer Networks",
];

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/auth/profile", put(update_profile))
        .route("/api/conversations", post(create_conversation).get(list_conversations))
        .route("/api/conversations/:id", get(get_conversation).delete(delete_conversation))
        .route("/api/conversations/:id/messages", post(send_message))
        .route("/api/practice/generate", post(generate_problem))
        .route("/api/practice/submit", post(submit_answer))
        .route("/api/practice/history", get(practice_history))
        .route("/api/stats", get(stats))
        .route("/api/topics", get(topics))
        .route("/api/agent/recommendation", post(agent_recommendation))
        .route("/api/agent/chat", post(agent_chat))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ==================== Health ====================

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        version: SERVICE_VERSION,
        database: "connected",
        ai_service: if state.config.has_completion_credentials() {
            "configured"
        } else {
            "unconfigured"
        },
    })
}

// ==================== Auth ====================

async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), AppError> {
    validate_registration(&body)?;

    let salt = auth::generate_salt();
    let user = state.db.create_user(&crate::db::NewUser {
        username: body.username.clone(),
        email: body.email.clone(),
        full_name: body.full_name.clone(),
        password_hash: auth::hash_password(&body.password, &salt),
        password_salt: salt,
        learning_goals: body.learning_goals,
    })?;
    tracing::info!(username = %user.username, "user registered");

    Ok((StatusCode::CREATED, Json(token_response(&state, user)?)))
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = state
        .db
        .get_user_by_username(&body.username)
        .map_err(|_| AppError::Unauthorized("Incorrect credentials".to_string()))?;

    if !auth::verify_password(&body.password, &user.password_salt, &user.password_hash) {
        return Err(AppError::Unauthorized("Incorrect credentials".to_string()));
    }

    Ok(Json(token_response(&state, user)?))
}

async fn me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(user.into())
}

async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<crate::db::ProfileUpdate>,
) -> Result<Json<UserResponse>, AppError> {
    let updated = state.db.update_profile(user.id, &body)?;
    Ok(Json(updated.into()))
}

fn token_response(state: &AppState, user: crate::db::User) -> Result<TokenResponse, AppError> {
    let token = auth::issue_token(
        &user.username,
        &state.config.secret_key,
        state.config.token_expiry_minutes,
    )
    .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(TokenResponse {
        access_token: token,
        token_type: "bearer",
        user: user.into(),
    })
}

fn validate_registration(body: &RegisterRequest) -> Result<(), AppError> {
    let name_ok = (3..=50).contains(&body.username.len())
        && body
            .username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !name_ok {
        return Err(AppError::BadRequest(
            "Username must be 3-50 characters of letters, digits, '_' or '-'".to_string(),
        ));
    }
    if !body.email.contains('@') {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }
    if body.full_name.is_empty() || body.full_name.len() > 100 {
        return Err(AppError::BadRequest("Full name is required".to_string()));
    }

    let p = &body.password;
    if p.len() < 8
        || !p.chars().any(|c| c.is_ascii_uppercase())
        || !p.chars().any(|c| c.is_ascii_lowercase())
        || !p.chars().any(|c| c.is_ascii_digit())
    {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters with uppercase, lowercase, and digit"
                .to_string(),
        ));
    }
    Ok(())
}

// ==================== Conversations ====================

async fn create_conversation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<CreateConversationRequest>,
) -> Result<Json<ConversationResponse>, AppError> {
    let conv = state
        .db
        .create_conversation(user.id, body.title.as_deref(), body.topic.as_deref())?;
    Ok(Json(ConversationResponse::from(
        crate::db::ConversationSummary {
            conversation: conv,
            message_count: 0,
        },
    )))
}

async fn list_conversations(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<ConversationResponse>>, AppError> {
    let summaries = state.db.list_conversations(user.id)?;
    Ok(Json(summaries.into_iter().map(Into::into).collect()))
}

async fn get_conversation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ConversationDetailResponse>, AppError> {
    let conv = state.db.get_conversation(user.id, id)?;
    let messages = state.db.list_messages(conv.id)?;
    Ok(Json(ConversationDetailResponse {
        id: conv.id,
        title: conv.title,
        topic: conv.topic,
        created_at: conv.created_at,
        messages,
    }))
}

async fn delete_conversation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if state.db.delete_conversation(user.id, id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Conversation not found".to_string()))
    }
}

async fn send_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let conv = state.db.get_conversation(user.id, id)?;

    // History is captured before the new message lands so the window holds
    // prior turns only.
    let history: Vec<ChatTurn> = state
        .db
        .recent_messages(conv.id, HISTORY_WINDOW)?
        .into_iter()
        .map(|m| ChatTurn {
            role: m.role,
            content: m.content,
        })
        .collect();

    let user_message = state
        .db
        .add_message(conv.id, crate::llm::Role::User, &body.content)?;
    let reply = state.tutor.respond(&body.content, &history).await?;
    let assistant_message = state
        .db
        .add_message(conv.id, crate::llm::Role::Assistant, &reply)?;

    Ok(Json(MessageResponse {
        user_message,
        assistant_message,
    }))
}

// ==================== Practice ====================

async fn generate_problem(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<GenerateProblemRequest>,
) -> Result<Json<GenerateProblemResponse>, AppError> {
    let problem = state.generator.generate(&body.topic, body.difficulty).await?;
    let session = state.db.create_practice_session(
        user.id,
        &body.topic,
        body.difficulty.as_str(),
        &problem,
    )?;

    Ok(Json(GenerateProblemResponse {
        session_id: session.id,
        topic: body.topic,
        difficulty: body.difficulty,
        problem: ProblemPayload {
            problem_text: problem.problem_text,
            hints: problem.hints,
        },
    }))
}

async fn submit_answer(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<SubmitAnswerRequest>,
) -> Result<Json<SubmitAnswerResponse>, AppError> {
    // Session must exist before the evaluation call is spent
    state.db.get_practice_session(user.id, body.session_id)?;

    let result = state.evaluator.evaluate(&body.answer).await?;
    let session =
        state
            .db
            .complete_practice_session(user.id, body.session_id, &body.answer, &result)?;

    Ok(Json(SubmitAnswerResponse {
        session_id: session.id,
        is_correct: result.is_correct,
        score: result.score,
        feedback: result.feedback,
        solution: session.solution,
        explanation: session.explanation,
    }))
}

async fn practice_history(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<crate::db::PracticeSession>>, AppError> {
    Ok(Json(
        state.db.practice_history(user.id, PRACTICE_HISTORY_LIMIT)?,
    ))
}

// ==================== Stats and discovery ====================

async fn stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<StatsResponse>, AppError> {
    Ok(Json(StatsResponse {
        stats: state.db.user_stats(user.id)?,
    }))
}

async fn topics() -> Json<TopicsResponse> {
    Json(TopicsResponse {
        topics: SUGGESTED_TOPICS.to_vec(),
    })
}

// ==================== Companion agent ====================

async fn agent_recommendation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<RecommendationRequest>,
) -> Result<Json<RecommendationResponse>, AppError> {
    let stats = state.db.user_stats(user.id)?;
    let context = recommendation_context(&user, body.current_route.as_deref(), &stats);
    let prompt = format!(
        "Based on this user's learning context, provide a brief, helpful recommendation.\n\n\
         {context}\n\n\
         Respond in this exact JSON format:\n\
         {{\n\
         \x20   \"quick_tip\": \"A short motivational tip (1 sentence)\",\n\
         \x20   \"suggestion\": \"What the user should do next (2-3 sentences max)\",\n\
         \x20   \"estimated_time\": \"Time estimate like '5 min' or '15 min'\",\n\
         \x20   \"priority\": \"low\" or \"medium\" or \"high\",\n\
         \x20   \"action_type\": \"practice\" or \"review\" or \"learn\" or \"break\"\n\
         }}\n\n\
         Be encouraging and specific. If they're new, suggest starting with basics. \
         If they've been practicing a lot, maybe suggest a break or review."
    );

    let recommendation = match state.tutor.respond(&prompt, &[]).await {
        Ok(reply) => {
            let mut rec = parse_recommendation(&reply);
            rec.stats = Some(truncate_topics(stats));
            rec
        }
        Err(e) => {
            tracing::warn!(error = %e, "recommendation fell back to default");
            RecommendationResponse {
                quick_tip: "Ready to learn something new today?".to_string(),
                suggestion: "Start with a practice session or chat with the AI tutor to explore topics."
                    .to_string(),
                estimated_time: "10 min".to_string(),
                priority: "medium".to_string(),
                action_type: "learn".to_string(),
                stats: None,
            }
        }
    };

    Ok(Json(recommendation))
}

async fn agent_chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<AgentChatRequest>,
) -> Result<Json<AgentChatResponse>, AppError> {
    let stats = state.db.user_stats(user.id)?;
    let context = ChatTurn::system(chat_context(&user, &stats));

    let response = match state.tutor.respond(&body.message, &[context]).await {
        Ok(reply) => AgentChatResponse {
            message: reply,
            suggestions: suggestions_for(&body.message),
        },
        Err(e) => {
            tracing::warn!(error = %e, "agent chat fell back to apology");
            AgentChatResponse {
                message: "I apologize, but I'm having trouble responding right now. \
                          Please try again in a moment."
                    .to_string(),
                suggestions: vec![
                    "Try again".to_string(),
                    "Go to dashboard".to_string(),
                    "Start practice".to_string(),
                ],
            }
        }
    };

    Ok(Json(response))
}

fn recommendation_context(
    user: &crate::db::User,
    current_route: Option<&str>,
    stats: &LearningStats,
) -> String {
    format!(
        "User: {}\n\
         Current page: {}\n\
         Learning goals: {}\n\
         Total conversations: {}\n\
         Practice sessions: {}\n\
         Completed sessions: {}\n\
         Average score: {:.1}%\n\
         Topics practiced: {}",
        user.full_name,
        current_route.unwrap_or("unknown"),
        user.learning_goals.as_deref().unwrap_or("Not set"),
        stats.total_conversations,
        stats.total_practice_sessions,
        stats.practice_sessions_completed,
        stats.average_score,
        joined_topics(stats, 5),
    )
}

fn chat_context(user: &crate::db::User, stats: &LearningStats) -> String {
    format!(
        "You are a helpful AI learning assistant for {}.\n\n\
         User's learning profile:\n\
         - Learning goals: {}\n\
         - Topics practiced: {}\n\
         - Practice sessions: {} ({} completed)\n\
         - Average score: {:.1}%\n\n\
         Be helpful, encouraging, and concise. You can:\n\
         - Answer questions about topics they're learning\n\
         - Suggest what to study next\n\
         - Explain concepts simply\n\
         - Provide study tips\n\
         - Motivate them\n\n\
         Keep responses brief (2-4 sentences) unless they ask for detailed explanations.\n\
         Format responses in markdown when helpful.",
        user.full_name,
        user.learning_goals.as_deref().unwrap_or("Not specified"),
        joined_topics(stats, 5),
        stats.total_practice_sessions,
        stats.practice_sessions_completed,
        stats.average_score,
    )
}

fn joined_topics(stats: &LearningStats, limit: usize) -> String {
    if stats.topics_practiced.is_empty() {
        "None yet".to_string()
    } else {
        stats
            .topics_practiced
            .iter()
            .take(limit)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn parse_recommendation(reply: &str) -> RecommendationResponse {
    json_block(reply)
        .and_then(|block| serde_json::from_str(block).ok())
        .unwrap_or_else(|| RecommendationResponse {
            quick_tip: "Keep up the great work! Consistency is key to learning.".to_string(),
            suggestion: "Try practicing a new topic or review your recent sessions to reinforce \
                         your learning."
                .to_string(),
            estimated_time: "10 min".to_string(),
            priority: "medium".to_string(),
            action_type: "practice".to_string(),
            stats: None,
        })
}

fn truncate_topics(mut stats: LearningStats) -> LearningStats {
    stats.topics_practiced.truncate(10);
    stats
}

fn suggestions_for(message: &str) -> Vec<String> {
    let lower = message.to_lowercase();
    if lower.contains("practice") || lower.contains("learn") {
        vec![
            "Start a practice session".to_string(),
            "View my progress".to_string(),
            "Explore topics".to_string(),
        ]
    } else if lower.contains("help") {
        vec![
            "How do I practice?".to_string(),
            "What topics can I learn?".to_string(),
            "Show my stats".to_string(),
        ]
    } else {
        Vec::new()
    }
}
