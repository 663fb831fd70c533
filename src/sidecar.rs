//! Background persistence started after a stream has ended.
//!
//! Each job runs detached with no channel back to the request. The job type
//! decides how its failures are reported.

use crate::embedding::Embedder;
use crate::error::Result;
use crate::history::{derive_title, ConversationTurn, HistoryStore};
use crate::memory::{MemoryEntry, MemoryStore};
use crate::message::Message;
use crate::protocol::Source;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// What a finished request leaves behind for persistence.
#[derive(Debug, Clone)]
pub struct AnsweredQuestion {
    pub user_id: String,
    pub session_id: String,
    pub question: String,
    pub answer: String,
    pub sources: Vec<Source>,
}

/// Durable turn log and session message list.
pub struct ConversationLogJob {
    pub store: Arc<dyn HistoryStore>,
    pub record: AnsweredQuestion,
}

/// Best-effort long-term vector memory.
pub struct VectorMemoryJob {
    pub store: Arc<dyn MemoryStore>,
    pub embedder: Arc<dyn Embedder>,
    pub index: String,
    pub record: AnsweredQuestion,
}

/// A detached persistence task.
pub enum BackgroundJob {
    ConversationLog(ConversationLogJob),
    VectorMemory(VectorMemoryJob),
}

impl BackgroundJob {
    pub fn name(&self) -> &'static str {
        match self {
            BackgroundJob::ConversationLog(_) => "conversation_log",
            BackgroundJob::VectorMemory(_) => "vector_memory",
        }
    }

    /// Run the job to completion, reporting failures by the job's policy.
    pub async fn run(self) {
        match self {
            BackgroundJob::ConversationLog(job) => {
                let session_id = job.record.session_id.clone();
                match job.execute().await {
                    Ok(()) => info!("Saved conversation turn for session {}", session_id),
                    Err(e) => error!("Error saving conversation for session {}: {}", session_id, e),
                }
            }
            BackgroundJob::VectorMemory(job) => {
                let index = job.index.clone();
                match job.execute().await {
                    Ok(stored) => debug!("Stored {} memory entries in {}", stored, index),
                    Err(e) if e.is_index_not_found() => warn!(
                        "Memory index '{}' not found. Skipping vector storage. Ensure the index exists.",
                        index
                    ),
                    Err(e) => error!("Error saving to vector memory: {}", e),
                }
            }
        }
    }

    /// Start the job on the runtime without waiting for it.
    pub fn spawn(self) -> JoinHandle<()> {
        debug!("Spawning background job {}", self.name());
        tokio::spawn(self.run())
    }
}

impl ConversationLogJob {
    async fn execute(&self) -> Result<()> {
        let r = &self.record;
        self.store
            .append_turn(&ConversationTurn::new(
                &r.user_id,
                &r.session_id,
                &r.question,
                &r.answer,
                r.sources.clone(),
            ))
            .await?;

        let mut answer = Message::assistant("", &r.answer);
        if !r.sources.is_empty() {
            answer.sources = Some(r.sources.clone());
        }
        self.store
            .upsert_session(
                &r.user_id,
                &r.session_id,
                &derive_title(&r.question),
                &[Message::user("", &r.question), answer],
            )
            .await
    }
}

impl VectorMemoryJob {
    async fn execute(&self) -> Result<usize> {
        let r = &self.record;
        let embeddings = self
            .embedder
            .embed_batch(&[r.question.clone(), r.answer.clone()])
            .await?;

        let entries: Vec<MemoryEntry> = [("user", &r.question), ("assistant", &r.answer)]
            .into_iter()
            .zip(embeddings)
            .map(|((role, content), embedding)| MemoryEntry::message(&r.session_id, role, content, embedding))
            .collect();

        self.store.store(&self.index, &entries).await
    }
}

/// Where long-term memory entries go.
#[derive(Clone)]
pub struct VectorMemory {
    pub store: Arc<dyn MemoryStore>,
    pub embedder: Arc<dyn Embedder>,
    pub index: String,
}

/// Persistence collaborators for a server.
#[derive(Clone)]
pub struct Sidecar {
    pub history: Arc<dyn HistoryStore>,
    /// None when vector memory is disabled.
    pub memory: Option<VectorMemory>,
}

impl Sidecar {
    /// Jobs to run for one answered question.
    pub fn jobs(&self, record: AnsweredQuestion) -> Vec<BackgroundJob> {
        let mut jobs = Vec::with_capacity(2);
        if let Some(memory) = &self.memory {
            jobs.push(BackgroundJob::VectorMemory(VectorMemoryJob {
                store: memory.store.clone(),
                embedder: memory.embedder.clone(),
                index: memory.index.clone(),
                record: record.clone(),
            }));
        }
        jobs.insert(
            0,
            BackgroundJob::ConversationLog(ConversationLogJob {
                store: self.history.clone(),
                record,
            }),
        );
        jobs
    }

    /// Spawn all jobs for a question whose `done` frame has been written.
    pub fn spawn_all(&self, record: AnsweredQuestion) -> Vec<JoinHandle<()>> {
        self.jobs(record).into_iter().map(BackgroundJob::spawn).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SvarError;
    use crate::history::InMemoryHistoryStore;
    use crate::memory::InMemoryMemoryStore;
    use async_trait::async_trait;

    struct UnitEmbedder;

    #[async_trait]
    impl Embedder for UnitEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }

        fn dimensions(&self) -> usize {
            1
        }
    }

    struct DownEmbedder;

    #[async_trait]
    impl Embedder for DownEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(SvarError::Embedding("service unavailable".into()))
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(SvarError::Embedding("service unavailable".into()))
        }

        fn dimensions(&self) -> usize {
            1
        }
    }

    fn record() -> AnsweredQuestion {
        AnsweredQuestion {
            user_id: "u1".into(),
            session_id: "session_1".into(),
            question: "What is the weather in Oslo right now and for the rest of the week?".into(),
            answer: "It is sunny".into(),
            sources: vec![Source::new("Met", "https://met.test", "")],
        }
    }

    #[tokio::test]
    async fn test_conversation_log_job() {
        let history = Arc::new(InMemoryHistoryStore::new());
        BackgroundJob::ConversationLog(ConversationLogJob {
            store: history.clone(),
            record: record(),
        })
        .run()
        .await;

        let turns = history.load_turns("u1", "session_1").await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].answer, "It is sunny");

        let session = history.get_session("u1", "session_1").await.unwrap().unwrap();
        assert_eq!(session.title, "What is the weather in Oslo right now and for the ...");
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].sources.as_ref().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_vector_memory_job_stores_two_entries() {
        let memory = Arc::new(InMemoryMemoryStore::new());
        memory.create_index("svar-chat").await.unwrap();

        let job = VectorMemoryJob {
            store: memory.clone(),
            embedder: Arc::new(UnitEmbedder),
            index: "svar-chat".into(),
            record: record(),
        };
        assert_eq!(job.execute().await.unwrap(), 2);

        let hits = memory.search("svar-chat", &[1.0], 10, 0.0).await.unwrap();
        let mut roles: Vec<_> = hits.iter().map(|h| h.entry.role.as_str()).collect();
        roles.sort();
        assert_eq!(roles, vec!["assistant", "user"]);
        assert!(hits.iter().all(|h| h.entry.session_id == "session_1" && h.entry.kind == "message"));
    }

    #[tokio::test]
    async fn test_vector_memory_failures_are_contained() {
        let missing_index = VectorMemoryJob {
            store: Arc::new(InMemoryMemoryStore::new()),
            embedder: Arc::new(UnitEmbedder),
            index: "absent".into(),
            record: record(),
        };
        assert!(missing_index.execute().await.unwrap_err().is_index_not_found());
        BackgroundJob::VectorMemory(missing_index).spawn().await.unwrap();

        let embedder_down = VectorMemoryJob {
            store: Arc::new(InMemoryMemoryStore::new()),
            embedder: Arc::new(DownEmbedder),
            index: "absent".into(),
            record: record(),
        };
        assert!(!embedder_down.execute().await.unwrap_err().is_index_not_found());
        BackgroundJob::VectorMemory(embedder_down).spawn().await.unwrap();
    }

    #[test]
    fn test_jobs_respect_disabled_memory() {
        let sidecar = Sidecar {
            history: Arc::new(InMemoryHistoryStore::new()),
            memory: None,
        };
        let jobs = sidecar.jobs(record());
        assert_eq!(jobs.iter().map(BackgroundJob::name).collect::<Vec<_>>(), vec!["conversation_log"]);

        let sidecar = Sidecar {
            memory: Some(VectorMemory {
                store: Arc::new(InMemoryMemoryStore::new()),
                embedder: Arc::new(UnitEmbedder),
                index: "svar-chat".into(),
            }),
            ..sidecar
        };
        assert_eq!(
            sidecar.jobs(record()).iter().map(BackgroundJob::name).collect::<Vec<_>>(),
            vec!["conversation_log", "vector_memory"]
        );
    }
}
