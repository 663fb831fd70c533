//! Route handlers.

use super::AppState;
use crate::agent::{build_system_prompt, AgentRun, FocusMode, Tone};
use crate::client::{AskRequest, USER_ID_HEADER};
use crate::history::{new_session_id, trim_history, turns_to_messages};
use crate::message::Message;
use crate::protocol::Frame;
use crate::sidecar::AnsweredQuestion;
use crate::suggest::history_transcript;
use crate::transcode::{transcode, TranscodeOutcome};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// A JSON error reply.
pub(super) struct ApiError(StatusCode, String);

impl ApiError {
    fn internal(e: impl std::fmt::Display) -> Self {
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }

    fn not_found() -> Self {
        ApiError(StatusCode::NOT_FOUND, "Session not found".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ErrorResponse { error: self.1 })).into_response()
    }
}

#[derive(Deserialize)]
pub(super) struct RenameRequest {
    #[serde(default)]
    title: String,
}

/// Caller identity from the user id header, else the configured default.
fn user_id(headers: &HeaderMap, state: &AppState) -> String {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| state.settings.server.default_user_id.clone())
}

pub(super) async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub(super) async fn ask(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AskRequest>,
) -> std::result::Result<Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>>, ApiError> {
    let question = req
        .question()
        .ok_or_else(|| {
            ApiError(
                StatusCode::BAD_REQUEST,
                "Message, query or input is required".to_string(),
            )
        })?
        .to_string();

    let user_id = user_id(&headers, &state);
    let session_id = req
        .session_id
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(new_session_id);
    info!("Question for session {} from {}", session_id, user_id);

    let history = match state.history.load_turns(&user_id, &session_id).await {
        Ok(turns) => trim_history(
            turns_to_messages(&turns),
            state.settings.agent.max_history_messages,
        ),
        Err(e) => {
            warn!("Failed to load history for session {}: {}", session_id, e);
            Vec::new()
        }
    };

    let agent_settings = &state.settings.agent;
    let tone: Tone = req
        .tone
        .as_deref()
        .unwrap_or(&agent_settings.default_tone)
        .parse()
        .unwrap_or_default();
    let focus: FocusMode = req
        .focus_mode
        .as_deref()
        .unwrap_or(&agent_settings.default_focus_mode)
        .parse()
        .unwrap_or_default();
    debug!("Tone {}, focus {}, research {}", tone, focus, req.is_research_mode);

    let system_prompt = build_system_prompt(&state.prompts, tone, focus, req.is_research_mode);
    let tools = state
        .tools
        .select(&focus.tool_names(), &state.settings.tools.dynamic_prefix);
    let transcript = history_transcript(&history, &question);

    let mut messages = history;
    messages.push(Message::user(String::new(), question.clone()));
    let events = state
        .agent
        .run(AgentRun::new(messages, tools, system_prompt).with_model(req.model.clone()));

    let (mut tx, rx) = mpsc::channel::<Frame>(64);
    let job_state = state.clone();
    tokio::spawn(async move {
        let outcome = transcode(
            events,
            &job_state.classifier,
            job_state.suggester.as_ref(),
            &transcript,
            &mut tx,
        )
        .await;
        drop(tx);

        match outcome {
            TranscodeOutcome::Completed(done) => {
                job_state.sidecar.spawn_all(AnsweredQuestion {
                    user_id,
                    session_id,
                    question,
                    answer: done.answer,
                    sources: done.sources,
                });
            }
            TranscodeOutcome::Failed { message } => {
                debug!("Answer failed, nothing persisted: {}", message)
            }
            TranscodeOutcome::Abandoned => debug!("Client went away before the answer finished"),
        }
    });

    let stream = ReceiverStream::new(rx).map(|frame| Event::default().json_data(&frame));
    let keep_alive = KeepAlive::new().interval(Duration::from_secs(state.settings.server.keep_alive_seconds));

    Ok(Sse::new(stream).keep_alive(keep_alive))
}

pub(super) async fn list_sessions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let sessions = state
        .history
        .list_sessions(&user_id(&headers, &state))
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(sessions))
}

pub(super) async fn get_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    state
        .history
        .get_session(&user_id(&headers, &state), &session_id)
        .await
        .map_err(ApiError::internal)?
        .map(Json)
        .ok_or_else(ApiError::not_found)
}

pub(super) async fn delete_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let deleted = state
        .history
        .delete_session(&user_id(&headers, &state), &session_id)
        .await
        .map_err(ApiError::internal)?;
    if !deleted {
        return Err(ApiError::not_found());
    }

    if let Some(memory) = &state.sidecar.memory {
        if let Err(e) = memory.store.delete_session(&memory.index, &session_id).await {
            warn!("Failed to forget memory of session {}: {}", session_id, e);
        }
    }

    Ok(Json(serde_json::json!({ "message": "Session deleted successfully" })))
}

pub(super) async fn rename_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError(StatusCode::BAD_REQUEST, "Title is required".to_string()));
    }

    state
        .history
        .rename_session(&user_id(&headers, &state), &session_id, title)
        .await
        .map_err(ApiError::internal)?
        .map(Json)
        .ok_or_else(ApiError::not_found)
}
