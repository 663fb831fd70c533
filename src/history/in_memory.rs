//! In-memory history store, for tests and throwaway servers.

use super::{ConversationTurn, HistoryStore, Session, SessionSummary};
use crate::error::{Result, SvarError};
use crate::message::Message;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::RwLock;

#[derive(Default)]
struct Inner {
    turns: Vec<ConversationTurn>,
    sessions: Vec<Session>,
}

pub struct InMemoryHistoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> SvarError {
    SvarError::History(format!("Failed to acquire lock: {}", e))
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn load_turns(&self, user_id: &str, session_id: &str) -> Result<Vec<ConversationTurn>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .turns
            .iter()
            .filter(|t| t.user_id == user_id && t.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn append_turn(&self, turn: &ConversationTurn) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.turns.push(turn.clone());
        Ok(())
    }

    async fn upsert_session(
        &self,
        user_id: &str,
        session_id: &str,
        title: &str,
        messages: &[Message],
    ) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        let now = Utc::now();

        match inner
            .sessions
            .iter_mut()
            .find(|s| s.user_id == user_id && s.session_id == session_id)
        {
            Some(session) => {
                session.messages.extend_from_slice(messages);
                session.updated_at = now;
            }
            None => inner.sessions.push(Session {
                session_id: session_id.to_string(),
                user_id: user_id.to_string(),
                title: title.to_string(),
                messages: messages.to_vec(),
                created_at: now,
                updated_at: now,
            }),
        }
        Ok(())
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionSummary>> {
        let inner = self.inner.read().map_err(poisoned)?;
        let mut sessions: Vec<SessionSummary> = inner
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .map(SessionSummary::from)
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    async fn get_session(&self, user_id: &str, session_id: &str) -> Result<Option<Session>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .sessions
            .iter()
            .find(|s| s.user_id == user_id && s.session_id == session_id)
            .cloned())
    }

    async fn delete_session(&self, user_id: &str, session_id: &str) -> Result<bool> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        let before = inner.sessions.len();
        inner
            .sessions
            .retain(|s| !(s.user_id == user_id && s.session_id == session_id));
        if inner.sessions.len() == before {
            return Ok(false);
        }
        inner
            .turns
            .retain(|t| !(t.user_id == user_id && t.session_id == session_id));
        Ok(true)
    }

    async fn rename_session(&self, user_id: &str, session_id: &str, title: &str) -> Result<Option<Session>> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        Ok(inner
            .sessions
            .iter_mut()
            .find(|s| s.user_id == user_id && s.session_id == session_id)
            .map(|session| {
                session.title = title.to_string();
                session.updated_at = Utc::now();
                session.clone()
            }))
    }
}
