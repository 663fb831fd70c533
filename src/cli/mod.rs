//! CLI module for Svar.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Svar - a streaming tool-use answer engine
///
/// Runs the answer API server and talks to it from the terminal.
/// The name "Svar" comes from the Norwegian/Scandinavian word for "answer."
#[derive(Parser, Debug)]
#[command(name = "svar")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the answer API server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a single question and stream the answer
    Ask {
        /// The question to ask
        question: String,

        /// Continue an existing session
        #[arg(short, long)]
        session: Option<String>,

        /// Show research steps as the agent works
        #[arg(short, long)]
        research: bool,

        /// LLM model to use instead of the server default
        #[arg(short, long)]
        model: Option<String>,

        /// Answer tone (neutral, professional, creative, academic, simplified, concise)
        #[arg(short, long)]
        tone: Option<String>,

        /// Focus mode (web, academic, writing, youtube, reddit)
        #[arg(short, long)]
        focus: Option<String>,
    },

    /// Start an interactive chat session
    Chat {
        /// Resume an existing session
        #[arg(short, long)]
        session: Option<String>,

        /// Show research steps as the agent works
        #[arg(short, long)]
        research: bool,

        /// LLM model to use
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Manage stored chat sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum SessionsAction {
    /// List sessions, most recent first
    List,

    /// Print the messages of a session
    Show {
        session_id: String,
    },

    /// Delete a session
    Delete {
        session_id: String,
    },

    /// Rename a session
    Rename {
        session_id: String,
        /// New title
        title: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
