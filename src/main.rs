//! Svar CLI entry point.

use anyhow::Result;
use clap::Parser;
use svar::cli::{commands, Cli, Commands};
use svar::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("svar={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    match &cli.command {
        Commands::Serve { host, port } => {
            std::fs::create_dir_all(settings.data_dir())?;
            commands::run_serve(host.clone(), *port, settings).await?;
        }

        Commands::Ask {
            question,
            session,
            research,
            model,
            tone,
            focus,
        } => {
            let options = commands::AskOptions {
                session: session.clone(),
                research: *research,
                model: model.clone(),
                tone: tone.clone(),
                focus: focus.clone(),
            };
            commands::run_ask(question, options, settings).await?;
        }

        Commands::Chat {
            session,
            research,
            model,
        } => {
            commands::run_chat(session.clone(), *research, model.clone(), settings).await?;
        }

        Commands::Sessions { action } => {
            commands::run_sessions(action, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings)?;
        }
    }

    Ok(())
}
