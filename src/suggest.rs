//! Follow-up question suggestions.

use crate::config::{Prompts, Settings};
use crate::error::{Result, SvarError};
use crate::message::{Message, Role};
use crate::openai::create_client_with;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Most suggestions offered after one answer.
pub const MAX_SUGGESTIONS: usize = 3;

/// Produces short follow-up questions for a finished answer.
#[async_trait]
pub trait FollowUpGenerator: Send + Sync {
    async fn suggest(&self, history: &str, answer: &str) -> Result<Vec<String>>;
}

/// Render prior messages and the current question as `human:`/`ai:` lines.
pub fn history_transcript(history: &[Message], question: &str) -> String {
    history
        .iter()
        .map(|m| {
            let speaker = match m.role {
                Role::User => "human",
                Role::Assistant => "ai",
            };
            format!("{}: {}\n", speaker, m.content)
        })
        .chain(std::iter::once(format!("human: {}", question)))
        .collect()
}

/// Keep the first non-empty lines of a model reply.
pub fn parse_suggestions(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(MAX_SUGGESTIONS)
        .map(str::to_string)
        .collect()
}

/// Suggestion generator backed by an OpenAI-compatible chat model.
pub struct OpenAiFollowUps {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    prompts: Prompts,
}

impl OpenAiFollowUps {
    pub fn new(client: Client<OpenAIConfig>, model: &str, prompts: Prompts) -> Self {
        Self {
            client,
            model: model.to_string(),
            temperature: 0.7,
            prompts,
        }
    }

    pub fn from_settings(settings: &Settings, prompts: Prompts) -> Self {
        let client = create_client_with(
            settings.llm.api_base.as_deref(),
            Duration::from_secs(settings.llm.timeout_seconds),
        );
        let mut generator = Self::new(client, &settings.llm.model, prompts);
        generator.temperature = settings.llm.suggestion_temperature;
        generator
    }
}

#[async_trait]
impl FollowUpGenerator for OpenAiFollowUps {
    async fn suggest(&self, history: &str, answer: &str) -> Result<Vec<String>> {
        let mut vars = HashMap::new();
        vars.insert("history".to_string(), history.to_string());
        vars.insert("answer".to_string(), answer.to_string());
        let prompt = self.prompts.render_with_custom(&self.prompts.suggestions.user, &vars);

        let message: ChatCompletionRequestMessage = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| SvarError::Agent(e.to_string()))?
            .into();

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(self.temperature)
            .messages(vec![message])
            .build()
            .map_err(|e| SvarError::Agent(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| SvarError::OpenAI(format!("Suggestion API error: {}", e)))?;

        let text = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        let suggestions = parse_suggestions(&text);
        debug!("Generated {} follow-up suggestions", suggestions.len());
        Ok(suggestions)
    }
}

/// Generator that never suggests anything.
pub struct NoFollowUps;

#[async_trait]
impl FollowUpGenerator for NoFollowUps {
    async fn suggest(&self, _history: &str, _answer: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}
