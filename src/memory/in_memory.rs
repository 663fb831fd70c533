//! In-memory vector memory.
//!
//! Useful for testing and for running without a database.

use super::{cosine_similarity, rank, MemoryEntry, MemoryHit, MemoryStore};
use crate::error::{Result, SvarError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory memory store keyed by index name.
pub struct InMemoryMemoryStore {
    indexes: RwLock<HashMap<String, Vec<MemoryEntry>>>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self {
            indexes: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> SvarError {
    SvarError::Memory(format!("Failed to acquire lock: {}", e))
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn create_index(&self, index: &str) -> Result<()> {
        let mut indexes = self.indexes.write().map_err(poisoned)?;
        indexes.entry(index.to_string()).or_default();
        Ok(())
    }

    async fn has_index(&self, index: &str) -> Result<bool> {
        let indexes = self.indexes.read().map_err(poisoned)?;
        Ok(indexes.contains_key(index))
    }

    async fn store(&self, index: &str, entries: &[MemoryEntry]) -> Result<usize> {
        let mut indexes = self.indexes.write().map_err(poisoned)?;
        let stored = indexes
            .get_mut(index)
            .ok_or_else(|| SvarError::IndexNotFound(index.to_string()))?;
        stored.extend_from_slice(entries);
        Ok(entries.len())
    }

    async fn search(
        &self,
        index: &str,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<MemoryHit>> {
        let indexes = self.indexes.read().map_err(poisoned)?;
        let entries = indexes
            .get(index)
            .ok_or_else(|| SvarError::IndexNotFound(index.to_string()))?;

        let hits = entries
            .iter()
            .map(|entry| MemoryHit {
                score: cosine_similarity(query_embedding, &entry.embedding),
                entry: entry.clone(),
            })
            .filter(|h| h.score >= min_score)
            .collect();

        Ok(rank(hits, limit))
    }

    async fn delete_session(&self, index: &str, session_id: &str) -> Result<usize> {
        let mut indexes = self.indexes.write().map_err(poisoned)?;
        let Some(entries) = indexes.get_mut(index) else {
            return Ok(0);
        };
        let before = entries.len();
        entries.retain(|e| e.session_id != session_id);
        Ok(before - entries.len())
    }

    async fn entry_count(&self, index: &str) -> Result<usize> {
        let indexes = self.indexes.read().map_err(poisoned)?;
        Ok(indexes.get(index).map(|e| e.len()).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_requires_index() {
        let store = InMemoryMemoryStore::new();
        let entry = MemoryEntry::message("s1", "user", "hello", vec![1.0, 0.0]);

        let err = store.store("chat", &[entry.clone()]).await.unwrap_err();
        assert!(err.is_index_not_found());

        store.create_index("chat").await.unwrap();
        assert_eq!(store.store("chat", &[entry]).await.unwrap(), 1);
        assert_eq!(store.entry_count("chat").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_search_and_delete() {
        let store = InMemoryMemoryStore::new();
        store.create_index("chat").await.unwrap();
        store
            .store(
                "chat",
                &[
                    MemoryEntry::message("s1", "user", "rust", vec![1.0, 0.0]),
                    MemoryEntry::message("s2", "assistant", "go", vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store.search("chat", &[1.0, 0.1], 5, 0.5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry.content, "rust");

        assert_eq!(store.delete_session("chat", "s1").await.unwrap(), 1);
        assert_eq!(store.entry_count("chat").await.unwrap(), 1);
    }
}
