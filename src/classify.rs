//! Tool invocation classifier.
//!
//! Decodes one raw [`AgentEvent`] into a tool start, tool end, answer token or
//! nothing of interest, and phrases tool starts for display.

use crate::agent::events::{AgentEvent, ON_CHAT_MODEL_STREAM, ON_TOOL_END, ON_TOOL_START};
use crate::config::ToolSettings;
use crate::protocol::Source;
use serde_json::Value;
use std::collections::HashSet;

/// Longest query shown in a step before it is cut off.
const MAX_QUERY_CHARS: usize = 50;

/// Input fields checked, in order, for a query-like string.
const QUERY_FIELDS: &[&str] = &["query", "input", "url", "location"];

/// Display phrases for specific tools. `{q}` is replaced by the query.
const EXACT_PHRASES: &[(&str, &str)] = &[
    ("academic_search", "Researching academic papers for \"{q}\""),
    ("youtube_search", "Searching YouTube for \"{q}\""),
    ("weather", "Checking weather for \"{q}\""),
    ("reddit_search", "Searching Reddit for \"{q}\""),
    ("wikipedia", "Reading Wikipedia article \"{q}\""),
];

/// Display phrases chosen by substring of the tool name, first match wins.
const SUBSTRING_RULES: &[(&[&str], &str)] = &[
    (&["search"], "Searching for \"{q}\""),
    (&["scraper", "fetch"], "Reading {q}"),
    (&["calculator"], "Calculating {q}"),
];

/// What one agent event means to the protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    ToolStart {
        tool: String,
        display: String,
    },
    ToolEnd {
        tool: String,
        sources: Vec<Source>,
        images: Vec<String>,
    },
    Token(String),
    Other,
}

/// Classifies agent events. Holds the tool allow-list used for output parsing.
#[derive(Debug, Clone)]
pub struct Classifier {
    result_tools: HashSet<String>,
    dynamic_prefix: String,
}

impl Classifier {
    pub fn new<I, S>(result_tools: I, dynamic_prefix: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            result_tools: result_tools.into_iter().map(Into::into).collect(),
            dynamic_prefix: dynamic_prefix.to_string(),
        }
    }

    pub fn from_settings(settings: &ToolSettings) -> Self {
        Self::new(settings.result_tools.iter().cloned(), &settings.dynamic_prefix)
    }

    /// Whether output of `tool` is parsed into sources and images.
    pub fn parses_output(&self, tool: &str) -> bool {
        self.result_tools.contains(tool)
            || (!self.dynamic_prefix.is_empty() && tool.starts_with(&self.dynamic_prefix))
    }

    pub fn classify(&self, event: &AgentEvent) -> Classification {
        let name = event.name.as_deref().unwrap_or_default();
        let data = event.data.as_ref();

        match event.event.as_str() {
            ON_TOOL_START => Classification::ToolStart {
                tool: name.to_string(),
                display: describe_tool_start(name, data.and_then(|d| d.get("input"))),
            },
            ON_TOOL_END => {
                let (sources, images) = match data.and_then(|d| d.get("output")) {
                    Some(output) if self.parses_output(name) => parse_tool_output(output),
                    _ => (Vec::new(), Vec::new()),
                };
                Classification::ToolEnd {
                    tool: name.to_string(),
                    sources,
                    images,
                }
            }
            ON_CHAT_MODEL_STREAM => match data
                .and_then(|d| d.pointer("/chunk/content"))
                .and_then(Value::as_str)
            {
                Some(content) if !content.is_empty() => Classification::Token(content.to_string()),
                _ => Classification::Other,
            },
            _ => Classification::Other,
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::from_settings(&ToolSettings::default())
    }
}

/// Human-readable text for a tool starting with `input`.
pub fn describe_tool_start(tool: &str, input: Option<&Value>) -> String {
    let Some(query) = input.and_then(extract_query) else {
        return format!("Using tool: {}", tool);
    };
    let query = truncate_query(&query);

    if let Some((_, phrase)) = EXACT_PHRASES.iter().find(|(name, _)| *name == tool) {
        return phrase.replace("{q}", &query);
    }

    SUBSTRING_RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| tool.contains(n)))
        .map(|(_, phrase)| phrase.replace("{q}", &query))
        .unwrap_or_else(|| format!("Using {}: {}", tool, query))
}

/// Pull a query-like string out of a tool input.
pub fn extract_query(input: &Value) -> Option<String> {
    let non_empty = |v: &Value| v.as_str().filter(|s| !s.is_empty()).map(str::to_string);

    match input {
        Value::String(_) => non_empty(input),
        Value::Object(map) => QUERY_FIELDS
            .iter()
            .find_map(|field| map.get(*field).and_then(non_empty))
            .or_else(|| map.values().find_map(non_empty)),
        _ => None,
    }
}

pub fn truncate_query(query: &str) -> String {
    if query.chars().count() > MAX_QUERY_CHARS {
        let head: String = query.chars().take(MAX_QUERY_CHARS).collect();
        format!("{}...", head)
    } else {
        query.to_string()
    }
}

/// Derive sources and images from a tool's output.
///
/// Text that is not JSON becomes a single opaque "Tool Output" source.
pub fn parse_tool_output(output: &Value) -> (Vec<Source>, Vec<String>) {
    let parsed = match output {
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(value) => value,
            Err(_) => return (vec![Source::new("Tool Output", "#", raw.clone())], Vec::new()),
        },
        other => other.clone(),
    };

    let mut images = Vec::new();
    let items: &[Value] = match &parsed {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => {
            if let Some(Value::Array(found)) = map.get("images") {
                images.extend(found.iter().filter_map(Value::as_str).map(str::to_string));
            }
            match map.get("results") {
                Some(Value::Array(results)) => results.as_slice(),
                _ => &[][..],
            }
        }
        _ => &[][..],
    };

    if items.is_empty() {
        if let Value::String(text) = &parsed {
            return (vec![Source::new("Tool Output", "#", text.clone())], images);
        }
    }

    (items.iter().map(source_from_item).collect(), images)
}

fn source_from_item(item: &Value) -> Source {
    let field = |key: &str| item.get(key).and_then(Value::as_str).filter(|s| !s.is_empty());

    Source::new(
        field("title").unwrap_or("Source"),
        field("url").unwrap_or("#"),
        field("content").or_else(|| field("snippet")).unwrap_or_default(),
    )
}
