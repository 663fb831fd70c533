//! Durable conversation history.
//!
//! Two records are kept per user:
//! - a turn log, one `{query, answer, sources}` row per answered question
//! - sessions, each holding the full message list shown in the client
//!
//! Every operation is scoped to a user id.

mod in_memory;
mod sqlite;

pub use in_memory::InMemoryHistoryStore;
pub use sqlite::SqliteHistoryStore;

use crate::error::Result;
use crate::message::Message;
use crate::protocol::Source;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest derived session title before it is cut off.
const TITLE_CHARS: usize = 50;

/// One answered question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub user_id: String,
    pub session_id: String,
    pub query: String,
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<Source>,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(user_id: &str, session_id: &str, query: &str, answer: &str, sources: Vec<Source>) -> Self {
        Self {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            query: query.to_string(),
            answer: answer.to_string(),
            sources,
            created_at: Utc::now(),
        }
    }

    /// The turn as a user message followed by an assistant message.
    pub fn to_messages(&self, index: usize) -> [Message; 2] {
        let mut answer = Message::assistant(format!("{}-{}", self.session_id, index * 2 + 1), &self.answer);
        if !self.sources.is_empty() {
            answer.sources = Some(self.sources.clone());
        }
        [
            Message::user(format!("{}-{}", self.session_id, index * 2), &self.query),
            answer,
        ]
    }
}

/// A stored conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Session listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.session_id.clone(),
            title: session.title.clone(),
            updated_at: session.updated_at,
        }
    }
}

/// Title for a session started by `question`.
pub fn derive_title(question: &str) -> String {
    if question.chars().count() > TITLE_CHARS {
        format!("{}...", question.chars().take(TITLE_CHARS).collect::<String>())
    } else {
        question.to_string()
    }
}

/// Mint a fresh session id.
pub fn new_session_id() -> String {
    format!("session_{}", uuid::Uuid::new_v4().simple())
}

/// Trait for conversation history backends.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Turns of a session, oldest first.
    async fn load_turns(&self, user_id: &str, session_id: &str) -> Result<Vec<ConversationTurn>>;

    /// Append one turn to the log.
    async fn append_turn(&self, turn: &ConversationTurn) -> Result<()>;

    /// Append messages to a session, creating it with `title` if missing.
    ///
    /// The title of an existing session is left untouched.
    async fn upsert_session(
        &self,
        user_id: &str,
        session_id: &str,
        title: &str,
        messages: &[Message],
    ) -> Result<()>;

    /// Sessions of a user, most recently updated first.
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionSummary>>;

    async fn get_session(&self, user_id: &str, session_id: &str) -> Result<Option<Session>>;

    /// Delete a session and its turns. Returns false if it did not exist.
    async fn delete_session(&self, user_id: &str, session_id: &str) -> Result<bool>;

    /// Rename a session. Returns the updated session, or None if it did not exist.
    async fn rename_session(&self, user_id: &str, session_id: &str, title: &str) -> Result<Option<Session>>;
}

/// Turns flattened into alternating user and assistant messages.
pub fn turns_to_messages(turns: &[ConversationTurn]) -> Vec<Message> {
    turns
        .iter()
        .enumerate()
        .flat_map(|(i, turn)| turn.to_messages(i))
        .collect()
}

/// Keep only the last `max` messages.
pub fn trim_history(mut messages: Vec<Message>, max: usize) -> Vec<Message> {
    if messages.len() > max {
        messages.drain(..messages.len() - max);
    }
    messages
}
