//! Svar - a streaming tool-use answer engine
//!
//! Answers questions with a tool-calling LLM agent and streams the answer to
//! the client as it is produced, including a live list of research steps.
//!
//! The name "Svar" is the Norwegian/Scandinavian word for "answer."
//!
//! # Architecture
//!
//! - `agent` - Agent runner, tool registry and system prompt assembly
//! - `classify` - Maps raw agent events to steps, answer tokens and sources
//! - `transcode` - Turns the agent event stream into protocol frames
//! - `protocol` - The frame wire format and an incremental decoder
//! - `sidecar` - Background persistence of answered questions
//! - `history` - Conversation turns and session storage
//! - `memory` - Vector memory of past questions and answers
//! - `reducer` - Client-side folding of frames into conversation state
//! - `server` / `client` - HTTP API and its streaming client
//!
//! # Example
//!
//! ```rust,no_run
//! use svar::client::{AskRequest, SvarClient};
//! use svar::reducer::Conversation;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = SvarClient::new("http://127.0.0.1:3001", "me");
//!     let mut conversation = Conversation::new();
//!
//!     client
//!         .ask(&mut conversation, AskRequest::new("What's the weather in Oslo?"), |_, _| {})
//!         .await?;
//!     if let Some(answer) = conversation.last_answer() {
//!         println!("{}", answer.content);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod classify;
pub mod cli;
pub mod client;
pub mod config;
pub mod embedding;
pub mod error;
pub mod history;
pub mod memory;
pub mod message;
pub mod openai;
pub mod protocol;
pub mod reducer;
pub mod server;
pub mod sidecar;
pub mod suggest;
pub mod transcode;

pub use error::{Result, SvarError};
