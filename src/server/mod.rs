//! HTTP API server.
//!
//! `POST /api/ask` streams protocol frames as server-sent events; the
//! `/api/history` routes manage the caller's stored sessions.

mod handlers;

use crate::agent::{AgentRunner, OpenAiAgent, ToolSet, VectorSearchTool, WebScraperTool};
use crate::classify::Classifier;
use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{Result, SvarError};
use crate::history::{HistoryStore, InMemoryHistoryStore, SqliteHistoryStore};
use crate::memory::{InMemoryMemoryStore, MemoryStore, SqliteMemoryStore};
use crate::sidecar::{Sidecar, VectorMemory};
use crate::suggest::{FollowUpGenerator, OpenAiFollowUps};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Shared application state.
pub struct AppState {
    pub agent: Arc<dyn AgentRunner>,
    /// Every tool the server knows; each request gets its focus mode's subset.
    pub tools: ToolSet,
    pub classifier: Classifier,
    pub suggester: Arc<dyn FollowUpGenerator>,
    pub history: Arc<dyn HistoryStore>,
    pub sidecar: Sidecar,
    pub prompts: Prompts,
    pub settings: Settings,
}

impl AppState {
    /// Wire up the configured stores, model clients and built-in tools.
    pub async fn from_settings(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let history: Arc<dyn HistoryStore> = match settings.history.provider.as_str() {
            "sqlite" => Arc::new(SqliteHistoryStore::new(&settings.history_path())?),
            "memory" => Arc::new(InMemoryHistoryStore::new()),
            other => {
                return Err(SvarError::Config(format!("Unknown history provider: {}", other)));
            }
        };

        let memory_store: Arc<dyn MemoryStore> = match settings.memory.provider.as_str() {
            "sqlite" => Arc::new(SqliteMemoryStore::new(&settings.memory_path())?),
            "memory" => Arc::new(InMemoryMemoryStore::new()),
            other => {
                return Err(SvarError::Config(format!("Unknown memory provider: {}", other)));
            }
        };
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::from_settings(&settings));
        let index = settings.memory.index.clone();

        if settings.memory.create_index_on_start {
            memory_store.create_index(&index).await?;
        } else if !memory_store.has_index(&index).await? {
            warn!("Memory index '{}' does not exist; answers will not be remembered", index);
        }

        let tools = ToolSet::new()
            .with(Arc::new(VectorSearchTool::new(
                memory_store.clone(),
                embedder.clone(),
                &index,
            )))
            .with(Arc::new(WebScraperTool::new(settings.tools.scraper_max_chars)));

        let memory = settings.memory.enabled.then(|| VectorMemory {
            store: memory_store,
            embedder,
            index,
        });

        Ok(Self {
            agent: Arc::new(OpenAiAgent::from_settings(&settings)),
            tools,
            classifier: Classifier::from_settings(&settings.tools),
            suggester: Arc::new(OpenAiFollowUps::from_settings(&settings, prompts.clone())),
            sidecar: Sidecar {
                history: history.clone(),
                memory,
            },
            history,
            prompts,
            settings,
        })
    }
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/ask", post(handlers::ask))
        .route("/api/history", get(handlers::list_sessions))
        .route(
            "/api/history/{session_id}",
            get(handlers::get_session)
                .delete(handlers::delete_session)
                .put(handlers::rename_session),
        )
        .layer(cors)
        .with_state(state)
}

/// Serve the API on an already bound listener until the process stops.
pub async fn serve(listener: tokio::net::TcpListener, state: Arc<AppState>) -> Result<()> {
    info!("Serving API on {:?}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
