//! Configuration module for Svar.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AgentPrompts, Prompts, SuggestionPrompts};
pub use settings::{
    AgentSettings, ClientSettings, EmbeddingSettings, GeneralSettings, HistorySettings,
    LlmSettings, MemorySettings, PromptSettings, ServerSettings, Settings, ToolSettings,
};
