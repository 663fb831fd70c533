//! SQLite-based history store.

use super::{ConversationTurn, HistoryStore, Session, SessionSummary};
use crate::error::{Result, SvarError};
use crate::message::Message;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS conversation_turns (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        session_id TEXT NOT NULL,
        query TEXT NOT NULL,
        answer TEXT NOT NULL,
        sources TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS sessions (
        user_id TEXT NOT NULL,
        session_id TEXT NOT NULL,
        title TEXT NOT NULL,
        messages TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (user_id, session_id)
    );

    CREATE INDEX IF NOT EXISTS idx_turns_session ON conversation_turns(session_id, created_at);
    CREATE INDEX IF NOT EXISTS idx_sessions_updated ON sessions(user_id, updated_at);
"#;

/// SQLite-based history store.
pub struct SqliteHistoryStore {
    conn: Mutex<Connection>,
}

impl SqliteHistoryStore {
    /// Open (or create) a history database at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite history store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SvarError::History(format!("Failed to acquire lock: {}", e)))
    }

    fn load_session(conn: &Connection, user_id: &str, session_id: &str) -> Result<Option<Session>> {
        let row = conn
            .query_row(
                r#"
                SELECT title, messages, created_at, updated_at
                FROM sessions WHERE user_id = ?1 AND session_id = ?2
                "#,
                params![user_id, session_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((title, messages, created_at, updated_at)) = row else {
            return Ok(None);
        };

        Ok(Some(Session {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            title,
            messages: serde_json::from_str(&messages)?,
            created_at: parse_time(&created_at),
            updated_at: parse_time(&updated_at),
        }))
    }
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn load_turns(&self, user_id: &str, session_id: &str) -> Result<Vec<ConversationTurn>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT query, answer, sources, created_at
            FROM conversation_turns
            WHERE user_id = ?1 AND session_id = ?2
            ORDER BY id ASC
            "#,
        )?;

        let rows = stmt.query_map(params![user_id, session_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut turns = Vec::new();
        for row in rows {
            let (query, answer, sources, created_at) = row?;
            turns.push(ConversationTurn {
                user_id: user_id.to_string(),
                session_id: session_id.to_string(),
                query,
                answer,
                sources: serde_json::from_str(&sources)?,
                created_at: parse_time(&created_at),
            });
        }

        debug!("Loaded {} turns for session {}", turns.len(), session_id);
        Ok(turns)
    }

    #[instrument(skip(self, turn), fields(session = %turn.session_id))]
    async fn append_turn(&self, turn: &ConversationTurn) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO conversation_turns (user_id, session_id, query, answer, sources, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                turn.user_id,
                turn.session_id,
                turn.query,
                turn.answer,
                serde_json::to_string(&turn.sources)?,
                turn.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    #[instrument(skip(self, messages), fields(count = messages.len()))]
    async fn upsert_session(
        &self,
        user_id: &str,
        session_id: &str,
        title: &str,
        messages: &[Message],
    ) -> Result<()> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let now = Utc::now().to_rfc3339();

        match Self::load_session(&tx, user_id, session_id)? {
            Some(mut session) => {
                session.messages.extend_from_slice(messages);
                tx.execute(
                    "UPDATE sessions SET messages = ?1, updated_at = ?2 WHERE user_id = ?3 AND session_id = ?4",
                    params![serde_json::to_string(&session.messages)?, now, user_id, session_id],
                )?;
            }
            None => {
                tx.execute(
                    r#"
                    INSERT INTO sessions (user_id, session_id, title, messages, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                    "#,
                    params![user_id, session_id, title, serde_json::to_string(messages)?, now],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT session_id, title, updated_at
            FROM sessions
            WHERE user_id = ?1
            ORDER BY updated_at DESC
            "#,
        )?;

        let sessions = stmt
            .query_map(params![user_id], |row| {
                let updated_at: String = row.get(2)?;
                Ok(SessionSummary {
                    session_id: row.get(0)?,
                    title: row.get(1)?,
                    updated_at: parse_time(&updated_at),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sessions)
    }

    async fn get_session(&self, user_id: &str, session_id: &str) -> Result<Option<Session>> {
        let conn = self.lock()?;
        Self::load_session(&conn, user_id, session_id)
    }

    #[instrument(skip(self))]
    async fn delete_session(&self, user_id: &str, session_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let deleted = tx.execute(
            "DELETE FROM sessions WHERE user_id = ?1 AND session_id = ?2",
            params![user_id, session_id],
        )?;
        if deleted > 0 {
            tx.execute(
                "DELETE FROM conversation_turns WHERE user_id = ?1 AND session_id = ?2",
                params![user_id, session_id],
            )?;
        }
        tx.commit()?;
        Ok(deleted > 0)
    }

    async fn rename_session(&self, user_id: &str, session_id: &str, title: &str) -> Result<Option<Session>> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE sessions SET title = ?1, updated_at = ?2 WHERE user_id = ?3 AND session_id = ?4",
            params![title, Utc::now().to_rfc3339(), user_id, session_id],
        )?;
        if updated == 0 {
            return Ok(None);
        }
        Self::load_session(&conn, user_id, session_id)
    }
}
