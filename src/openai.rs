//! OpenAI-compatible client configuration with sensible defaults.

use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for LLM API requests (5 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create an OpenAI client with the default timeout and endpoint.
pub fn create_client() -> Client<OpenAIConfig> {
    create_client_with(None, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create a client for an OpenAI-compatible endpoint.
///
/// `api_base` lets the same code talk to Ollama, Groq or any other server that
/// speaks the chat-completions protocol. The API key still comes from
/// `OPENAI_API_KEY`.
pub fn create_client_with(api_base: Option<&str>, timeout: Duration) -> Client<OpenAIConfig> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());

    let mut config = OpenAIConfig::default();
    if let Some(base) = api_base.filter(|b| !b.is_empty()) {
        config = config.with_api_base(base);
    }

    Client::with_config(config).with_http_client(http_client)
}
