//! Ask command implementation.

use super::live::LiveAnswer;
use crate::cli::Output;
use crate::client::{AskRequest, SvarClient};
use crate::config::Settings;
use crate::reducer::Conversation;
use anyhow::Result;

/// Per-question options of the ask command.
#[derive(Debug, Default)]
pub struct AskOptions {
    pub session: Option<String>,
    pub research: bool,
    pub model: Option<String>,
    pub tone: Option<String>,
    pub focus: Option<String>,
}

/// Run the ask command.
pub async fn run_ask(question: &str, options: AskOptions, settings: Settings) -> Result<()> {
    let client = SvarClient::from_settings(&settings);
    let mut conversation = match &options.session {
        Some(id) => Conversation::with_session(id.clone()),
        None => Conversation::new(),
    };

    let request = AskRequest {
        session_id: options.session,
        is_research_mode: options.research,
        model: options.model,
        tone: options.tone,
        focus_mode: options.focus,
        ..AskRequest::new(question)
    };

    let mut live = LiveAnswer::new();
    let result = client
        .ask(&mut conversation, request, |conversation, _| live.update(conversation))
        .await;
    live.finish(&conversation);

    if let Err(e) = result {
        Output::error(&format!("Failed to get an answer: {}", e));
        Output::info(&format!("Is the server running at {}?", settings.client.server_url));
        return Err(e.into());
    }

    Ok(())
}
