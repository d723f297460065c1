//! Persistence for users, conversations, and practice sessions
//!
//! The agents never touch storage; handlers persist what the agents
//! return and supply prior conversation turns back to them.

mod schema;

pub use schema::*;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== User Operations ====================

    pub fn create_user(&self, new_user: &NewUser) -> DbResult<User> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        let username_taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
            params![new_user.username],
            |row| row.get(0),
        )?;
        if username_taken {
            return Err(DbError::Conflict("Username already exists".to_string()));
        }

        let email_taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
            params![new_user.email],
            |row| row.get(0),
        )?;
        if email_taken {
            return Err(DbError::Conflict("Email already exists".to_string()));
        }

        conn.execute(
            "INSERT INTO users (username, email, full_name, password_hash, password_salt, learning_goals, preferred_topics, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, '[]', ?7)",
            params![
                new_user.username,
                new_user.email,
                new_user.full_name,
                new_user.password_hash,
                new_user.password_salt,
                new_user.learning_goals,
                now.to_rfc3339()
            ],
        )?;

        Ok(User {
            id: conn.last_insert_rowid(),
            username: new_user.username.clone(),
            email: new_user.email.clone(),
            full_name: new_user.full_name.clone(),
            password_hash: new_user.password_hash.clone(),
            password_salt: new_user.password_salt.clone(),
            learning_goals: new_user.learning_goals.clone(),
            preferred_topics: Vec::new(),
            created_at: now,
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> DbResult<User> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, username, email, full_name, password_hash, password_salt, learning_goals, preferred_topics, created_at
             FROM users WHERE username = ?1",
            params![username],
            map_user,
        )
        .map_err(not_found("user"))
    }

    pub fn get_user(&self, id: i64) -> DbResult<User> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, username, email, full_name, password_hash, password_salt, learning_goals, preferred_topics, created_at
             FROM users WHERE id = ?1",
            params![id],
            map_user,
        )
        .map_err(not_found("user"))
    }

    pub fn update_profile(&self, user_id: i64, update: &ProfileUpdate) -> DbResult<User> {
        {
            let conn = self.conn.lock().unwrap();
            if let Some(full_name) = &update.full_name {
                conn.execute(
                    "UPDATE users SET full_name = ?1 WHERE id = ?2",
                    params![full_name, user_id],
                )?;
            }
            if let Some(email) = &update.email {
                conn.execute(
                    "UPDATE users SET email = ?1 WHERE id = ?2",
                    params![email, user_id],
                )?;
            }
            if let Some(goals) = &update.learning_goals {
                conn.execute(
                    "UPDATE users SET learning_goals = ?1 WHERE id = ?2",
                    params![goals, user_id],
                )?;
            }
            if let Some(topics) = &update.preferred_topics {
                let json = serde_json::to_string(topics).unwrap_or_else(|_| "[]".to_string());
                conn.execute(
                    "UPDATE users SET preferred_topics = ?1 WHERE id = ?2",
                    params![json, user_id],
                )?;
            }
        }
        self.get_user(user_id)
    }

    // ==================== Conversation Operations ====================

    pub fn create_conversation(
        &self,
        user_id: i64,
        title: Option<&str>,
        topic: Option<&str>,
    ) -> DbResult<Conversation> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let title = title.unwrap_or("New Conversation");

        conn.execute(
            "INSERT INTO conversations (user_id, title, topic, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![user_id, title, topic, now.to_rfc3339()],
        )?;

        Ok(Conversation {
            id: conn.last_insert_rowid(),
            user_id,
            title: title.to_string(),
            topic: topic.map(String::from),
            created_at: now,
            updated_at: now,
        })
    }

    /// List a user's conversations, most recently updated first
    pub fn list_conversations(&self, user_id: i64) -> DbResult<Vec<ConversationSummary>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.user_id, c.title, c.topic, c.created_at, c.updated_at,
                    (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = c.id)
             FROM conversations c
             WHERE c.user_id = ?1
             ORDER BY c.updated_at DESC",
        )?;

        let rows = stmt.query_map(params![user_id], |row| {
            Ok(ConversationSummary {
                conversation: map_conversation(row)?,
                message_count: row.get(6)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Get a conversation, scoped to its owner
    pub fn get_conversation(&self, user_id: i64, id: i64) -> DbResult<Conversation> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, user_id, title, topic, created_at, updated_at
             FROM conversations WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
            map_conversation,
        )
        .map_err(not_found("conversation"))
    }

    /// Delete a conversation and its messages. Returns false if absent.
    pub fn delete_conversation(&self, user_id: i64, id: i64) -> DbResult<bool> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM messages WHERE conversation_id IN
             (SELECT id FROM conversations WHERE id = ?1 AND user_id = ?2)",
            params![id, user_id],
        )?;
        let deleted = conn.execute(
            "DELETE FROM conversations WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(deleted > 0)
    }

    // ==================== Message Operations ====================

    pub fn add_message(
        &self,
        conversation_id: i64,
        role: crate::llm::Role,
        content: &str,
    ) -> DbResult<Message> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO messages (conversation_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![conversation_id, role.as_str(), content, now.to_rfc3339()],
        )?;
        conn.execute(
            "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
            params![now.to_rfc3339(), conversation_id],
        )?;

        Ok(Message {
            id: conn.last_insert_rowid(),
            conversation_id,
            role,
            content: content.to_string(),
            created_at: now,
        })
    }

    /// All messages of a conversation, oldest first
    pub fn list_messages(&self, conversation_id: i64) -> DbResult<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, role, content, created_at
             FROM messages WHERE conversation_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![conversation_id], map_message)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// The most recent `limit` messages, returned oldest first
    pub fn recent_messages(&self, conversation_id: i64, limit: usize) -> DbResult<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, role, content, created_at FROM
             (SELECT * FROM messages WHERE conversation_id = ?1 ORDER BY id DESC LIMIT ?2)
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![conversation_id, limit as i64], map_message)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    // ==================== Practice Operations ====================

    pub fn create_practice_session(
        &self,
        user_id: i64,
        topic: &str,
        difficulty: &str,
        problem: &crate::agents::GeneratedProblem,
    ) -> DbResult<PracticeSession> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let hints_json =
            serde_json::to_string(&problem.hints).unwrap_or_else(|_| "[]".to_string());

        conn.execute(
            "INSERT INTO practice_sessions (user_id, topic, difficulty, problem_text, hints, solution, explanation, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user_id,
                topic,
                difficulty,
                problem.problem_text,
                hints_json,
                problem.solution,
                problem.explanation,
                now.to_rfc3339()
            ],
        )?;

        Ok(PracticeSession {
            id: conn.last_insert_rowid(),
            user_id,
            topic: topic.to_string(),
            difficulty: difficulty.to_string(),
            problem_text: problem.problem_text.clone(),
            hints: problem.hints.clone(),
            solution: Some(problem.solution.clone()),
            explanation: Some(problem.explanation.clone()),
            user_answer: None,
            is_correct: None,
            score: None,
            feedback: None,
            completed_at: None,
            created_at: now,
        })
    }

    pub fn get_practice_session(&self, user_id: i64, id: i64) -> DbResult<PracticeSession> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, user_id, topic, difficulty, problem_text, hints, solution, explanation,
                    user_answer, is_correct, score, feedback, completed_at, created_at
             FROM practice_sessions WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
            map_session,
        )
        .map_err(not_found("practice session"))
    }

    /// Record a submitted answer and its evaluation
    pub fn complete_practice_session(
        &self,
        user_id: i64,
        session_id: i64,
        answer: &str,
        result: &crate::agents::EvaluationResult,
    ) -> DbResult<PracticeSession> {
        {
            let conn = self.conn.lock().unwrap();
            let now = Utc::now();
            let updated = conn.execute(
                "UPDATE practice_sessions
                 SET user_answer = ?1, is_correct = ?2, score = ?3, feedback = ?4, completed_at = ?5
                 WHERE id = ?6 AND user_id = ?7",
                params![
                    answer,
                    result.is_correct,
                    result.score,
                    result.feedback,
                    now.to_rfc3339(),
                    session_id,
                    user_id
                ],
            )?;
            if updated == 0 {
                return Err(DbError::NotFound("practice session"));
            }
        }
        self.get_practice_session(user_id, session_id)
    }

    /// Most recent practice sessions, newest first
    pub fn practice_history(&self, user_id: i64, limit: usize) -> DbResult<Vec<PracticeSession>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, topic, difficulty, problem_text, hints, solution, explanation,
                    user_answer, is_correct, score, feedback, completed_at, created_at
             FROM practice_sessions WHERE user_id = ?1
             ORDER BY created_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit as i64], map_session)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    // ==================== Statistics ====================

    pub fn user_stats(&self, user_id: i64) -> DbResult<LearningStats> {
        let conn = self.conn.lock().unwrap();

        let total_conversations: i64 = conn.query_row(
            "SELECT COUNT(*) FROM conversations WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        let total_practice_sessions: i64 = conn.query_row(
            "SELECT COUNT(*) FROM practice_sessions WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        let practice_sessions_completed: i64 = conn.query_row(
            "SELECT COUNT(*) FROM practice_sessions WHERE user_id = ?1 AND is_correct IS NOT NULL",
            params![user_id],
            |row| row.get(0),
        )?;
        let average_score: f64 = conn.query_row(
            "SELECT COALESCE(AVG(score), 0.0) FROM practice_sessions
             WHERE user_id = ?1 AND score IS NOT NULL",
            params![user_id],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT DISTINCT topic FROM practice_sessions WHERE user_id = ?1",
        )?;
        let topics = stmt
            .query_map(params![user_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LearningStats {
            total_conversations,
            total_practice_sessions,
            practice_sessions_completed,
            average_score: (average_score * 100.0).round() / 100.0,
            topics_practiced: topics,
        })
    }
}

// ==================== Row mapping ====================

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        full_name: row.get(3)?,
        password_hash: row.get(4)?,
        password_salt: row.get(5)?,
        learning_goals: row.get(6)?,
        preferred_topics: parse_json_list(&row.get::<_, String>(7)?),
        created_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

fn map_conversation(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        topic: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        updated_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role: crate::llm::Role::parse(&row.get::<_, String>(2)?),
        content: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

fn map_session(row: &Row<'_>) -> rusqlite::Result<PracticeSession> {
    Ok(PracticeSession {
        id: row.get(0)?,
        user_id: row.get(1)?,
        topic: row.get(2)?,
        difficulty: row.get(3)?,
        problem_text: row.get(4)?,
        hints: parse_json_list(&row.get::<_, String>(5)?),
        solution: row.get(6)?,
        explanation: row.get(7)?,
        user_answer: row.get(8)?,
        is_correct: row.get(9)?,
        score: row.get(10)?,
        feedback: row.get(11)?,
        completed_at: row
            .get::<_, Option<String>>(12)?
            .map(|s| parse_datetime(&s)),
        created_at: parse_datetime(&row.get::<_, String>(13)?),
    })
}

fn parse_json_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn parse_datetime(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn not_found(entity: &'static str) -> impl FnOnce(rusqlite::Error) -> DbError {
    move |e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(entity),
        other => DbError::Sqlite(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{EvaluationResult, GeneratedProblem};
    use crate::llm::Role;

    fn test_user(db: &Database, username: &str) -> User {
        db.create_user(&NewUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            full_name: "Test User".to_string(),
            password_hash: "hash".to_string(),
            password_salt: "salt".to_string(),
            learning_goals: None,
        })
        .unwrap()
    }

    fn sample_problem() -> GeneratedProblem {
        GeneratedProblem {
            problem_text: "Sort this list".to_string(),
            hints: vec!["compare".to_string(), "swap".to_string()],
            solution: "bubble sort".to_string(),
            explanation: "pairwise swaps".to_string(),
        }
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("companion.db");

        {
            let db = Database::open(&path).unwrap();
            test_user(&db, "alice");
        }

        let db = Database::open(&path).unwrap();
        assert!(db.get_user_by_username("alice").is_ok());
    }

    #[test]
    fn create_and_fetch_user() {
        let db = Database::open_in_memory().unwrap();
        let user = test_user(&db, "alice");
        let fetched = db.get_user_by_username("alice").unwrap();
        assert_eq!(fetched.id, user.id);
        assert_eq!(fetched.email, "alice@example.com");
        assert!(fetched.preferred_topics.is_empty());
    }

    #[test]
    fn duplicate_username_is_conflict() {
        let db = Database::open_in_memory().unwrap();
        test_user(&db, "alice");
        let err = db
            .create_user(&NewUser {
                username: "alice".to_string(),
                email: "other@example.com".to_string(),
                full_name: "Other".to_string(),
                password_hash: "h".to_string(),
                password_salt: "s".to_string(),
                learning_goals: None,
            })
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[test]
    fn profile_update_is_partial() {
        let db = Database::open_in_memory().unwrap();
        let user = test_user(&db, "alice");
        let updated = db
            .update_profile(
                user.id,
                &ProfileUpdate {
                    learning_goals: Some("master recursion".to_string()),
                    preferred_topics: Some(vec!["Algorithms".to_string()]),
                    ..ProfileUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.learning_goals.as_deref(), Some("master recursion"));
        assert_eq!(updated.preferred_topics, vec!["Algorithms"]);
        // Untouched fields survive
        assert_eq!(updated.full_name, "Test User");
    }

    #[test]
    fn conversation_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let user = test_user(&db, "alice");

        let conv = db
            .create_conversation(user.id, Some("Recursion help"), Some("recursion"))
            .unwrap();
        db.add_message(conv.id, Role::User, "What is recursion?").unwrap();
        db.add_message(conv.id, Role::Assistant, "A function calling itself.").unwrap();

        let listed = db.list_conversations(user.id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].message_count, 2);

        let messages = db.list_messages(conv.id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);

        assert!(db.delete_conversation(user.id, conv.id).unwrap());
        assert!(db.list_messages(conv.id).unwrap().is_empty());
        assert!(!db.delete_conversation(user.id, conv.id).unwrap());
    }

    #[test]
    fn conversations_are_owner_scoped() {
        let db = Database::open_in_memory().unwrap();
        let alice = test_user(&db, "alice");
        let bob = test_user(&db, "bob");
        let conv = db.create_conversation(alice.id, None, None).unwrap();

        assert!(matches!(
            db.get_conversation(bob.id, conv.id),
            Err(DbError::NotFound(_))
        ));
        assert!(!db.delete_conversation(bob.id, conv.id).unwrap());
    }

    #[test]
    fn recent_messages_returns_last_n_oldest_first() {
        let db = Database::open_in_memory().unwrap();
        let user = test_user(&db, "alice");
        let conv = db.create_conversation(user.id, None, None).unwrap();
        for i in 0..15 {
            db.add_message(conv.id, Role::User, &format!("msg {i}")).unwrap();
        }

        let recent = db.recent_messages(conv.id, 10).unwrap();
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].content, "msg 5");
        assert_eq!(recent[9].content, "msg 14");
    }

    #[test]
    fn practice_session_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let user = test_user(&db, "alice");

        let session = db
            .create_practice_session(user.id, "sorting", "easy", &sample_problem())
            .unwrap();
        assert!(session.is_correct.is_none());
        assert_eq!(session.hints.len(), 2);

        let completed = db
            .complete_practice_session(
                user.id,
                session.id,
                "bubble sort",
                &EvaluationResult {
                    is_correct: true,
                    score: 85.0,
                    feedback: "Yes, correct".to_string(),
                },
            )
            .unwrap();
        assert_eq!(completed.user_answer.as_deref(), Some("bubble sort"));
        assert_eq!(completed.is_correct, Some(true));
        assert_eq!(completed.score, Some(85.0));
        assert!(completed.completed_at.is_some());
    }

    #[test]
    fn completing_unknown_session_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let user = test_user(&db, "alice");
        let err = db
            .complete_practice_session(
                user.id,
                999,
                "x",
                &EvaluationResult {
                    is_correct: false,
                    score: 40.0,
                    feedback: "No".to_string(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[test]
    fn stats_aggregate_counts_and_scores() {
        let db = Database::open_in_memory().unwrap();
        let user = test_user(&db, "alice");
        db.create_conversation(user.id, None, None).unwrap();

        let s1 = db
            .create_practice_session(user.id, "sorting", "easy", &sample_problem())
            .unwrap();
        db.create_practice_session(user.id, "graphs", "hard", &sample_problem())
            .unwrap();
        db.complete_practice_session(
            user.id,
            s1.id,
            "answer",
            &EvaluationResult {
                is_correct: true,
                score: 85.0,
                feedback: "Yes".to_string(),
            },
        )
        .unwrap();

        let stats = db.user_stats(user.id).unwrap();
        assert_eq!(stats.total_conversations, 1);
        assert_eq!(stats.total_practice_sessions, 2);
        assert_eq!(stats.practice_sessions_completed, 1);
        assert_eq!(stats.average_score, 85.0);
        assert_eq!(stats.topics_practiced.len(), 2);
    }

    #[test]
    fn stats_for_fresh_user_are_zero() {
        let db = Database::open_in_memory().unwrap();
        let user = test_user(&db, "alice");
        let stats = db.user_stats(user.id).unwrap();
        assert_eq!(stats.total_practice_sessions, 0);
        assert_eq!(stats.average_score, 0.0);
        assert!(stats.topics_practiced.is_empty());
    }
}
