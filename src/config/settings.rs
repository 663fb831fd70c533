//! Configuration settings for Svar.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub server: ServerSettings,
    pub llm: LlmSettings,
    pub agent: AgentSettings,
    pub tools: ToolSettings,
    pub embedding: EmbeddingSettings,
    pub memory: MemorySettings,
    pub history: HistorySettings,
    pub client: ClientSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.svar".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Interval between SSE keep-alive comments.
    pub keep_alive_seconds: u64,
    /// User id assumed when a request carries no `X-User-Id` header.
    pub default_user_id: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            keep_alive_seconds: 15,
            default_user_id: "anonymous".to_string(),
        }
    }
}

/// LLM endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// OpenAI-compatible API base URL. None uses api.openai.com.
    pub api_base: Option<String>,
    /// Model used when the request does not name one.
    pub model: String,
    /// Temperature for the agent run.
    pub temperature: f32,
    /// Temperature for follow-up suggestion generation.
    pub suggestion_temperature: f32,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_base: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            suggestion_temperature: 0.7,
            timeout_seconds: crate::openai::DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Agent loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Maximum LLM round trips per question.
    pub max_iterations: usize,
    /// Prior messages kept from the session history.
    pub max_history_messages: usize,
    /// Tone used when the request does not specify one.
    pub default_tone: String,
    /// Focus mode used when the request does not specify one.
    pub default_focus_mode: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            max_history_messages: 20,
            default_tone: "Neutral".to_string(),
            default_focus_mode: "web".to_string(),
        }
    }
}

/// Tool output handling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Tools whose output is parsed into sources and images.
    pub result_tools: Vec<String>,
    /// Name prefix marking dynamically registered tools, whose output is parsed too.
    pub dynamic_prefix: String,
    /// Maximum characters of page text returned by the scraper.
    pub scraper_max_chars: usize,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            result_tools: [
                "tavily_search_results_json",
                "web_scraper",
                "serper_search",
                "news_search",
                "vector_search",
                "calculator",
                "academic_search",
                "youtube_search",
                "weather",
                "reddit_search",
                "wikipedia",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            dynamic_prefix: "mcp_".to_string(),
            scraper_max_chars: 8000,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Long-term vector memory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySettings {
    /// Store question/answer pairs after each response.
    pub enabled: bool,
    /// Memory store provider (sqlite, memory).
    pub provider: String,
    /// Path to the SQLite database (for sqlite provider).
    pub sqlite_path: String,
    /// Index that entries are written to.
    pub index: String,
    /// Create the index at startup when missing.
    pub create_index_on_start: bool,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "sqlite".to_string(),
            sqlite_path: "~/.svar/memory.db".to_string(),
            index: "svar-chat".to_string(),
            create_index_on_start: true,
        }
    }
}

/// Durable conversation history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// History store provider (sqlite, memory).
    pub provider: String,
    /// Path to the SQLite database (for sqlite provider).
    pub sqlite_path: String,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            provider: "sqlite".to_string(),
            sqlite_path: "~/.svar/history.db".to_string(),
        }
    }
}

/// Settings for the streaming CLI client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub server_url: String,
    pub user_id: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3001".to_string(),
            user_id: "anonymous".to_string(),
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::SvarError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("svar")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded history database path.
    pub fn history_path(&self) -> PathBuf {
        Self::expand_path(&self.history.sqlite_path)
    }

    /// Get the expanded memory database path.
    pub fn memory_path(&self) -> PathBuf {
        Self::expand_path(&self.memory.sqlite_path)
    }
}
