//! HTTP client for a running Svar server.

use crate::config::Settings;
use crate::error::{Result, SvarError};
use crate::history::{Session, SessionSummary};
use crate::reducer::{Conversation, Effects};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

/// Header carrying the caller identity.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Body of `POST /api/ask`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub is_research_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_mode: Option<String>,
}

impl AskRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// The question, taken from `message`, `query` or `input` in that order.
    pub fn question(&self) -> Option<&str> {
        [&self.message, &self.query, &self.input]
            .into_iter()
            .flatten()
            .map(|s| s.as_str())
            .find(|s| !s.trim().is_empty())
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct SvarClient {
    http: reqwest::Client,
    base_url: String,
    user_id: String,
}

impl SvarClient {
    pub fn new(base_url: &str, user_id: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: user_id.to_string(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.client.server_url, &settings.client.user_id)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Ask a question, streaming the answer into `conversation`.
    ///
    /// `on_update` runs after every network chunk. The conversation's session
    /// id is sent unless the request names one.
    pub async fn ask<F>(
        &self,
        conversation: &mut Conversation,
        mut request: AskRequest,
        mut on_update: F,
    ) -> Result<Effects>
    where
        F: FnMut(&Conversation, Effects),
    {
        let question = request
            .question()
            .ok_or_else(|| SvarError::InvalidInput("Message, query or input is required".into()))?
            .to_string();
        if request.session_id.is_none() {
            request.session_id = conversation.session_id().map(str::to_string);
        }

        conversation.begin_ask(&question, request.is_research_mode)?;

        let response = match self
            .http
            .post(self.url("/api/ask"))
            .header(USER_ID_HEADER, &self.user_id)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                conversation.fail(&e.to_string());
                return Err(e.into());
            }
        };

        if !response.status().is_success() {
            let message = error_message(response).await;
            conversation.fail(&message);
            return Err(SvarError::Client(message));
        }

        let mut total = Effects::default();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    let effects = conversation.feed(&bytes);
                    total = total.merge(effects);
                    on_update(conversation, effects);
                    if !conversation.is_streaming() {
                        break;
                    }
                }
                Err(e) => {
                    conversation.fail(&e.to_string());
                    on_update(conversation, Effects::default());
                    return Err(e.into());
                }
            }
        }

        let effects = conversation.finish();
        if effects != Effects::default() {
            on_update(conversation, effects);
        }
        debug!("Answer stream closed");
        Ok(total.merge(effects))
    }

    /// Session summaries, most recently updated first.
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let response = self
            .http
            .get(self.url("/api/history"))
            .header(USER_ID_HEADER, &self.user_id)
            .send()
            .await?;
        Ok(checked(response).await?.json().await?)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Session> {
        let response = self
            .http
            .get(self.url(&format!("/api/history/{}", session_id)))
            .header(USER_ID_HEADER, &self.user_id)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SvarError::SessionNotFound(session_id.to_string()));
        }
        Ok(checked(response).await?.json().await?)
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("/api/history/{}", session_id)))
            .header(USER_ID_HEADER, &self.user_id)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SvarError::SessionNotFound(session_id.to_string()));
        }
        checked(response).await?;
        Ok(())
    }

    pub async fn rename_session(&self, session_id: &str, title: &str) -> Result<Session> {
        let response = self
            .http
            .put(self.url(&format!("/api/history/{}", session_id)))
            .header(USER_ID_HEADER, &self.user_id)
            .json(&json!({ "title": title }))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SvarError::SessionNotFound(session_id.to_string()));
        }
        Ok(checked(response).await?.json().await?)
    }
}

async fn checked(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(SvarError::Client(error_message(response).await))
    }
}

async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => format!("{} ({})", body.error, status),
        Err(_) => format!("Server returned {}", status),
    }
}
