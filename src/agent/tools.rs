//! Tool registry and built-in tools for the answer agent.
//!
//! A tool takes a JSON input and returns either JSON text (ideally
//! `{"results": [...], "images": [...]}`) or plain text.

use crate::embedding::Embedder;
use crate::error::{Result, SvarError};
use crate::memory::MemoryStore;
use async_openai::types::{ChatCompletionTool, ChatCompletionToolType, FunctionObject};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// A capability the agent can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name as shown to the model.
    fn name(&self) -> &str;

    /// When the model should use this tool.
    fn description(&self) -> &str;

    /// JSON schema of the input object.
    fn parameters(&self) -> Value;

    /// Run the tool.
    async fn call(&self, input: Value) -> Result<String>;
}

/// Ordered collection of tools available to one agent run.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Subset holding the named tools plus every tool carrying `dynamic_prefix`.
    pub fn select(&self, names: &[&str], dynamic_prefix: &str) -> ToolSet {
        let tools = self
            .tools
            .iter()
            .filter(|t| {
                names.contains(&t.name())
                    || (!dynamic_prefix.is_empty() && t.name().starts_with(dynamic_prefix))
            })
            .cloned()
            .collect();
        ToolSet { tools }
    }

    /// OpenAI function definitions for the tools in this set.
    pub fn definitions(&self) -> Vec<ChatCompletionTool> {
        self.tools
            .iter()
            .map(|t| ChatCompletionTool {
                r#type: ChatCompletionToolType::Function,
                function: FunctionObject {
                    name: t.name().to_string(),
                    description: Some(t.description().to_string()),
                    parameters: Some(t.parameters()),
                    strict: None,
                },
            })
            .collect()
    }
}

/// Read a string argument that may be passed bare or as an object field.
pub fn string_arg(input: &Value, key: &str) -> Result<String> {
    match input {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        Value::Object(map) => map
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .ok_or_else(|| SvarError::Tool(format!("Missing '{}' argument", key))),
        _ => Err(SvarError::Tool(format!("Missing '{}' argument", key))),
    }
}

/// Semantic search over the long-term conversation memory.
pub struct VectorSearchTool {
    store: Arc<dyn MemoryStore>,
    embedder: Arc<dyn Embedder>,
    index: String,
}

impl VectorSearchTool {
    pub fn new(store: Arc<dyn MemoryStore>, embedder: Arc<dyn Embedder>, index: &str) -> Self {
        Self {
            store,
            embedder,
            index: index.to_string(),
        }
    }
}

#[async_trait]
impl Tool for VectorSearchTool {
    fn name(&self) -> &str {
        "vector_search"
    }

    fn description(&self) -> &str {
        "Search earlier conversations and stored documents for relevant content. \
         Use this for questions about previous answers or uploaded material."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The search query" },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of results (default: 5)",
                    "default": 5
                }
            },
            "required": ["query"]
        })
    }

    async fn call(&self, input: Value) -> Result<String> {
        let query = string_arg(&input, "query")?;
        let limit = input.get("limit").and_then(|v| v.as_u64()).unwrap_or(5) as usize;

        let embedding = self.embedder.embed(&query).await?;
        let hits = self.store.search(&self.index, &embedding, limit, 0.3).await?;

        let results: Vec<Value> = hits
            .iter()
            .map(|h| {
                let title = match h.entry.role.as_str() {
                    "user" => "Earlier question",
                    _ => "Earlier answer",
                };
                json!({
                    "title": title,
                    "url": "#",
                    "content": h.entry.content.chars().take(1000).collect::<String>(),
                })
            })
            .collect();

        Ok(json!({ "results": results }).to_string())
    }
}

/// Fetch a web page and return its readable text.
pub struct WebScraperTool {
    client: reqwest::Client,
    max_chars: usize,
}

impl WebScraperTool {
    pub fn new(max_chars: usize) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("svar/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, max_chars }
    }
}

#[async_trait]
impl Tool for WebScraperTool {
    fn name(&self) -> &str {
        "web_scraper"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its text content. Use this to read a specific URL in full."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "Absolute URL of the page" }
            },
            "required": ["url"]
        })
    }

    async fn call(&self, input: Value) -> Result<String> {
        let url = string_arg(&input, "url")?;
        debug!("Scraping {}", url);

        let html = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let (title, text) = extract_page(&html);
        let content: String = text.chars().take(self.max_chars).collect();

        Ok(json!({
            "results": [{
                "title": title.unwrap_or_else(|| url.clone()),
                "url": url,
                "content": content,
            }]
        })
        .to_string())
    }
}

fn page_patterns() -> &'static (Regex, Regex, Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex, Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        (
            Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title pattern"),
            Regex::new(r"(?is)<(script|style|noscript)[^>]*>.*?</(script|style|noscript)>")
                .expect("valid block pattern"),
            Regex::new(r"(?s)<[^>]+>").expect("valid tag pattern"),
            Regex::new(r"\s+").expect("valid whitespace pattern"),
        )
    })
}

/// Title and whitespace-collapsed visible text of an HTML page.
fn extract_page(html: &str) -> (Option<String>, String) {
    let (title_re, block_re, tag_re, ws_re) = page_patterns();

    let title = title_re
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| ws_re.replace_all(m.as_str(), " ").trim().to_string())
        .filter(|t| !t.is_empty());

    let without_blocks = block_re.replace_all(html, " ");
    let without_tags = tag_re.replace_all(&without_blocks, " ");
    let text = ws_re.replace_all(&without_tags, " ").trim().to_string();

    (title, text)
}
