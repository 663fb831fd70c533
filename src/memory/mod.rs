//! Long-term vector memory.
//!
//! Stores embedded conversation messages in named indexes so later questions
//! can recall them. Writing to an index that does not exist fails with
//! [`SvarError::IndexNotFound`](crate::error::SvarError::IndexNotFound), which
//! callers treat as a degraded but expected state.

mod in_memory;
mod sqlite;

pub use in_memory::InMemoryMemoryStore;
pub use sqlite::SqliteMemoryStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One embedded message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: Uuid,
    /// Session the message belongs to.
    pub session_id: String,
    /// `user` or `assistant`.
    pub role: String,
    /// Entry kind, `message` for conversation turns.
    pub kind: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

impl MemoryEntry {
    /// Create a conversation-message entry.
    pub fn message(session_id: &str, role: &str, content: &str, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            role: role.to_string(),
            kind: "message".to_string(),
            content: content.to_string(),
            embedding,
            created_at: Utc::now(),
        }
    }
}

/// A recalled entry with its similarity score.
#[derive(Debug, Clone)]
pub struct MemoryHit {
    pub entry: MemoryEntry,
    /// Similarity score (higher is better).
    pub score: f32,
}

/// Trait for vector memory implementations.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Create an index if it does not exist yet.
    async fn create_index(&self, index: &str) -> Result<()>;

    /// Check whether an index exists.
    async fn has_index(&self, index: &str) -> Result<bool>;

    /// Store entries in an existing index.
    async fn store(&self, index: &str, entries: &[MemoryEntry]) -> Result<usize>;

    /// Search an index, keeping hits at or above `min_score`.
    async fn search(
        &self,
        index: &str,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<MemoryHit>>;

    /// Delete all entries of a session.
    async fn delete_session(&self, index: &str, session_id: &str) -> Result<usize>;

    /// Number of entries in an index.
    async fn entry_count(&self, index: &str) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Rank hits by descending score and keep the best `limit`.
pub(crate) fn rank(mut hits: Vec<MemoryHit>, limit: usize) -> Vec<MemoryHit> {
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(limit);
    hits
}
