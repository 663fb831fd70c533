//! SQLite-based vector memory.
//!
//! Cosine similarity is computed in Rust over all entries of an index, which
//! is plenty for per-user conversation memory.

use super::{cosine_similarity, rank, MemoryEntry, MemoryHit, MemoryStore};
use crate::error::{Result, SvarError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS memory_indexes (
        name TEXT PRIMARY KEY,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS memory_entries (
        id TEXT PRIMARY KEY,
        index_name TEXT NOT NULL,
        session_id TEXT NOT NULL,
        role TEXT NOT NULL,
        kind TEXT NOT NULL,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_memory_entries_index ON memory_entries(index_name);
    CREATE INDEX IF NOT EXISTS idx_memory_entries_session ON memory_entries(session_id);
"#;

/// SQLite-based memory store.
pub struct SqliteMemoryStore {
    conn: Mutex<Connection>,
}

impl SqliteMemoryStore {
    /// Open (or create) a memory database at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite memory store at {:?}", path);

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
            .map_err(|e| SvarError::Memory(format!("Failed to acquire lock: {}", e)))
    }

    fn index_exists(conn: &Connection, index: &str) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM memory_indexes WHERE name = ?1",
            params![index],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }
}

#[async_trait]
impl MemoryStore for SqliteMemoryStore {
    #[instrument(skip(self))]
    async fn create_index(&self, index: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO memory_indexes (name, created_at) VALUES (?1, ?2)",
            params![index, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn has_index(&self, index: &str) -> Result<bool> {
        let conn = self.lock()?;
        Self::index_exists(&conn, index)
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn store(&self, index: &str, entries: &[MemoryEntry]) -> Result<usize> {
        let conn = self.lock()?;
        if !Self::index_exists(&conn, index)? {
            return Err(SvarError::IndexNotFound(index.to_string()));
        }

        let tx = conn.unchecked_transaction()?;
        for entry in entries {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO memory_entries
                (id, index_name, session_id, role, kind, content, embedding, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    entry.id.to_string(),
                    index,
                    entry.session_id,
                    entry.role,
                    entry.kind,
                    entry.content,
                    Self::embedding_to_bytes(&entry.embedding),
                    entry.created_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;

        debug!("Stored {} memory entries in {}", entries.len(), index);
        Ok(entries.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn search(
        &self,
        index: &str,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<MemoryHit>> {
        let conn = self.lock()?;
        if !Self::index_exists(&conn, index)? {
            return Err(SvarError::IndexNotFound(index.to_string()));
        }

        let mut stmt = conn.prepare(
            r#"
            SELECT id, session_id, role, kind, content, embedding, created_at
            FROM memory_entries
            WHERE index_name = ?1
            "#,
        )?;

        let entries = stmt.query_map(params![index], |row| {
            let id_str: String = row.get(0)?;
            let embedding_bytes: Vec<u8> = row.get(5)?;
            let created_at_str: String = row.get(6)?;

            Ok(MemoryEntry {
                id: uuid::Uuid::parse_str(&id_str).unwrap_or_default(),
                session_id: row.get(1)?,
                role: row.get(2)?,
                kind: row.get(3)?,
                content: row.get(4)?,
                embedding: Self::bytes_to_embedding(&embedding_bytes),
                created_at: DateTime::parse_from_rfc3339(&created_at_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;

        let hits = entries
            .filter_map(|e| e.ok())
            .map(|entry| MemoryHit {
                score: cosine_similarity(query_embedding, &entry.embedding),
                entry,
            })
            .filter(|h| h.score >= min_score)
            .collect();

        let ranked = rank(hits, limit);
        debug!("Found {} matching memory entries", ranked.len());
        Ok(ranked)
    }

    #[instrument(skip(self))]
    async fn delete_session(&self, index: &str, session_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM memory_entries WHERE index_name = ?1 AND session_id = ?2",
            params![index, session_id],
        )?;
        Ok(deleted)
    }

    async fn entry_count(&self, index: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM memory_entries WHERE index_name = ?1",
            params![index],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
