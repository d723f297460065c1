//! Database schema and record types

use crate::llm::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    full_name TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    password_salt TEXT NOT NULL,
    learning_goals TEXT,
    preferred_topics TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_username ON users(username);

CREATE TABLE IF NOT EXISTS conversations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    title TEXT NOT NULL DEFAULT 'New Conversation',
    topic TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_conversations_user ON conversations(user_id, updated_at DESC);

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id INTEGER NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, id);

CREATE TABLE IF NOT EXISTS practice_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    topic TEXT NOT NULL,
    difficulty TEXT NOT NULL,
    problem_text TEXT NOT NULL,
    hints TEXT NOT NULL DEFAULT '[]',
    solution TEXT,
    explanation TEXT,
    user_answer TEXT,
    is_correct INTEGER,
    score REAL,
    feedback TEXT,
    completed_at TEXT,
    created_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_practice_user ON practice_sessions(user_id, created_at DESC);
";

/// User record. Password material stays in the db layer; API responses use
/// their own types.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub password_salt: String,
    pub learning_goals: Option<String>,
    pub preferred_topics: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a user
#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub password_salt: String,
    pub learning_goals: Option<String>,
}

/// Profile fields a user may change. `None` leaves the field untouched.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub learning_goals: Option<String>,
    pub preferred_topics: Option<Vec<String>>,
}

/// Conversation record
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub topic: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Conversation plus its message count, for listings
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub conversation: Conversation,
    pub message_count: i64,
}

/// Message record
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Practice session record. Answer fields stay NULL until submission.
#[derive(Debug, Clone, Serialize)]
pub struct PracticeSession {
    pub id: i64,
    pub user_id: i64,
    pub topic: String,
    pub difficulty: String,
    pub problem_text: String,
    pub hints: Vec<String>,
    pub solution: Option<String>,
    pub explanation: Option<String>,
    pub user_answer: Option<String>,
    pub is_correct: Option<bool>,
    pub score: Option<f64>,
    pub feedback: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Aggregated learning statistics for a user
#[derive(Debug, Clone, Serialize)]
pub struct LearningStats {
    pub total_conversations: i64,
    pub total_practice_sessions: i64,
    pub practice_sessions_completed: i64,
    pub average_score: f64,
    pub topics_practiced: Vec<String>,
}
