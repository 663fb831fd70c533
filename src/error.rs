//! Error types for Svar.

use thiserror::Error;

/// Library-level error type for Svar operations.
#[derive(Error, Debug)]
pub enum SvarError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("History store error: {0}")]
    History(String),

    #[error("Memory store error: {0}")]
    Memory(String),

    #[error("Memory index not found: {0}")]
    IndexNotFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Response stream closed by peer")]
    SinkClosed,

    #[error("A question is already streaming")]
    Busy,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SvarError {
    /// Whether this error means the memory index simply does not exist.
    ///
    /// Remote vector services report a missing index as an HTTP 404, so an
    /// OpenAI/HTTP-shaped error carrying "404" counts as well.
    pub fn is_index_not_found(&self) -> bool {
        match self {
            SvarError::IndexNotFound(_) => true,
            SvarError::Http(e) => e.status().is_some_and(|s| s.as_u16() == 404),
            SvarError::Memory(msg) => msg.contains("404"),
            _ => false,
        }
    }
}

/// Result type alias for Svar operations.
pub type Result<T> = std::result::Result<T, SvarError>;
