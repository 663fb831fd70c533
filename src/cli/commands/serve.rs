//! Serve command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::server::{self, AppState};
use std::sync::Arc;

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let memory_enabled = settings.memory.enabled;
    let model = settings.llm.model.clone();

    let state = Arc::new(AppState::from_settings(settings).await?);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Svar API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    Output::kv("Model", &model);
    Output::kv("Memory", if memory_enabled { "enabled" } else { "disabled" });
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("Ask", "POST   /api/ask (server-sent events)");
    Output::kv("Sessions", "GET    /api/history");
    Output::kv("Session", "GET    /api/history/{session_id}");
    Output::kv("Rename", "PUT    /api/history/{session_id}");
    Output::kv("Delete", "DELETE /api/history/{session_id}");
    println!();
    Output::info("Press Ctrl+C to stop");

    server::serve(listener, state).await?;

    Ok(())
}
