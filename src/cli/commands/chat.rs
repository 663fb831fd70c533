//! Interactive chat command.

use super::live::LiveAnswer;
use crate::cli::Output;
use crate::client::{AskRequest, SvarClient};
use crate::config::Settings;
use crate::reducer::Conversation;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};
use tracing::debug;

/// Run the interactive chat command.
pub async fn run_chat(
    session: Option<String>,
    research: bool,
    model: Option<String>,
    settings: Settings,
) -> Result<()> {
    let client = SvarClient::from_settings(&settings);
    let mut research = research;

    let mut conversation = match session {
        Some(id) => resume(&client, &id).await?,
        None => Conversation::new(),
    };

    println!("\n{}", style("Svar Chat").bold().cyan());
    println!(
        "{}\n",
        style("Type your questions, or 'exit' to quit. Commands: /new, /research, /bookmark.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        match input {
            "/new" => {
                conversation.start_new_chat()?;
                Output::info("Started a new chat.");
                continue;
            }
            "/research" => {
                research = !research;
                Output::info(&format!(
                    "Research steps {}.",
                    if research { "on" } else { "off" }
                ));
                continue;
            }
            "/bookmark" => {
                let id = conversation.last_answer().map(|m| m.id.clone());
                match id.and_then(|id| conversation.toggle_bookmark(&id)) {
                    Some(true) => Output::success("Bookmarked the last answer."),
                    Some(false) => Output::info("Removed the bookmark."),
                    None => Output::warning("Nothing to bookmark yet."),
                }
                continue;
            }
            _ => {}
        }

        let request = AskRequest {
            is_research_mode: research,
            model: model.clone(),
            ..AskRequest::new(input)
        };

        let mut live = LiveAnswer::new();
        let result = client
            .ask(&mut conversation, request, |conversation, _| live.update(conversation))
            .await;
        live.finish(&conversation);

        match result {
            Ok(effects) if effects.refresh_sessions => {
                debug!("Session {:?} updated", conversation.session_id());
            }
            Ok(_) => {}
            Err(e) => Output::error(&format!("Error: {}", e)),
        }
    }

    Ok(())
}

async fn resume(client: &SvarClient, session_id: &str) -> Result<Conversation> {
    let session = client.get_session(session_id).await?;
    Output::info(&format!(
        "Resuming \"{}\" ({} messages)",
        session.title,
        session.messages.len()
    ));

    let mut conversation = Conversation::new();
    conversation.load_session(session)?;
    Ok(conversation)
}
