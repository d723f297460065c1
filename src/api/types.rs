//! Request and response bodies

use crate::agents::Difficulty;
use crate::db::{self, LearningStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ==================== Auth ====================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    #[serde(default)]
    pub learning_goals: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: UserResponse,
}

/// Public view of a user record, without password material
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub learning_goals: Option<String>,
    pub preferred_topics: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<db::User> for UserResponse {
    fn from(user: db::User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            learning_goals: user.learning_goals,
            preferred_topics: user.preferred_topics,
            created_at: user.created_at,
        }
    }
}

// ==================== Conversations ====================

#[derive(Debug, Default, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub id: i64,
    pub title: String,
    pub topic: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: i64,
}

impl From<db::ConversationSummary> for ConversationResponse {
    fn from(summary: db::ConversationSummary) -> Self {
        let c = summary.conversation;
        Self {
            id: c.id,
            title: c.title,
            topic: c.topic,
            created_at: c.created_at,
            updated_at: c.updated_at,
            message_count: summary.message_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConversationDetailResponse {
    pub id: i64,
    pub title: String,
    pub topic: Option<String>,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<db::Message>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub user_message: db::Message,
    pub assistant_message: db::Message,
}

// ==================== Practice ====================

#[derive(Debug, Deserialize)]
pub struct GenerateProblemRequest {
    pub topic: String,
    pub difficulty: Difficulty,
}

/// Problem as shown to the student. The solution stays server-side until
/// an answer is submitted.
#[derive(Debug, Serialize)]
pub struct ProblemPayload {
    pub problem_text: String,
    pub hints: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateProblemResponse {
    pub session_id: i64,
    pub topic: String,
    pub difficulty: Difficulty,
    pub problem: ProblemPayload,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub session_id: i64,
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitAnswerResponse {
    pub session_id: i64,
    pub is_correct: bool,
    pub score: f64,
    pub feedback: String,
    pub solution: Option<String>,
    pub explanation: Option<String>,
}

// ==================== Stats and discovery ====================

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: LearningStats,
}

#[derive(Debug, Serialize)]
pub struct TopicsResponse {
    pub topics: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    pub ai_service: &'static str,
}

// ==================== Companion agent ====================

#[derive(Debug, Default, Deserialize)]
pub struct RecommendationRequest {
    #[serde(default)]
    pub current_route: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendationResponse {
    #[serde(default)]
    pub quick_tip: String,
    #[serde(default)]
    pub suggestion: String,
    #[serde(default)]
    pub estimated_time: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub action_type: String,
    #[serde(skip_deserializing)]
    pub stats: Option<LearningStats>,
}

#[derive(Debug, Deserialize)]
pub struct AgentChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct AgentChatResponse {
    pub message: String,
    pub suggestions: Vec<String>,
}
