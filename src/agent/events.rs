//! Raw events produced by an agent run.

use crate::error::Result;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::pin::Pin;

pub const ON_CHAIN_START: &str = "on_chain_start";
pub const ON_CHAIN_END: &str = "on_chain_end";
pub const ON_TOOL_START: &str = "on_tool_start";
pub const ON_TOOL_END: &str = "on_tool_end";
pub const ON_CHAT_MODEL_STREAM: &str = "on_chat_model_stream";

/// One event of an agent run.
///
/// Payload shapes differ by event kind and by tool, so `data` stays untyped
/// here; the classifier decodes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl AgentEvent {
    pub fn new(event: &str, name: Option<&str>, data: Option<Value>) -> Self {
        Self {
            event: event.to_string(),
            name: name.map(|n| n.to_string()),
            data,
        }
    }

    pub fn chain_start() -> Self {
        Self::new(ON_CHAIN_START, None, None)
    }

    pub fn chain_end() -> Self {
        Self::new(ON_CHAIN_END, None, None)
    }

    /// A tool invocation began with `input` (a JSON value or raw string).
    pub fn tool_start(name: &str, input: Value) -> Self {
        Self::new(ON_TOOL_START, Some(name), Some(json!({ "input": input })))
    }

    /// A tool invocation finished with raw textual `output`.
    pub fn tool_end(name: &str, output: impl Into<String>) -> Self {
        Self::new(ON_TOOL_END, Some(name), Some(json!({ "output": output.into() })))
    }

    /// A streamed fragment of model output.
    pub fn token(content: impl Into<String>) -> Self {
        Self::new(
            ON_CHAT_MODEL_STREAM,
            None,
            Some(json!({ "chunk": { "content": content.into() } })),
        )
    }
}

/// Lazy, ordered sequence of events from one agent run.
///
/// An `Err` item means the run failed; nothing follows it.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<AgentEvent>> + Send>>;
