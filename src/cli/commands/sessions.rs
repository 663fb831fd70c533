//! Sessions command implementation.

use crate::cli::output::content_preview;
use crate::cli::{Output, SessionsAction};
use crate::client::SvarClient;
use crate::config::Settings;
use crate::message::Role;
use anyhow::Result;
use console::style;

/// Run the sessions command.
pub async fn run_sessions(action: &SessionsAction, settings: Settings) -> Result<()> {
    let client = SvarClient::from_settings(&settings);

    match action {
        SessionsAction::List => {
            let sessions = client.list_sessions().await?;
            if sessions.is_empty() {
                Output::info("No sessions yet. Ask something with 'svar ask' or 'svar chat'.");
                return Ok(());
            }

            Output::header(&format!("Sessions ({})", sessions.len()));
            for session in &sessions {
                Output::session_info(
                    &session.title,
                    &session.session_id,
                    &session.updated_at.format("%Y-%m-%d %H:%M").to_string(),
                );
            }
        }

        SessionsAction::Show { session_id } => {
            let session = client.get_session(session_id).await?;
            Output::header(&session.title);
            Output::kv("Session", &session.session_id);
            Output::kv("Updated", &session.updated_at.to_rfc3339());

            for message in &session.messages {
                let speaker = match message.role {
                    Role::User => style("You:").green().bold(),
                    Role::Assistant => style("Svar:").cyan().bold(),
                };
                println!("\n{} {}", speaker, message.content);
                if let Some(sources) = &message.sources {
                    for source in sources {
                        Output::list_item(&format!(
                            "{} {}",
                            source.title,
                            style(content_preview(&source.url, 80)).dim()
                        ));
                    }
                }
            }
            println!();
        }

        SessionsAction::Delete { session_id } => {
            client.delete_session(session_id).await?;
            Output::success(&format!("Deleted session {}", session_id));
        }

        SessionsAction::Rename { session_id, title } => {
            let session = client.rename_session(session_id, title).await?;
            Output::success(&format!("Renamed session to \"{}\"", session.title));
        }
    }

    Ok(())
}
