//! Answer agent: the LLM and tool pipeline behind one question.
//!
//! A run produces a lazy, ordered stream of [`AgentEvent`]s that the
//! transcoder turns into protocol frames.

pub mod events;
mod prompt;
mod runner;
mod tools;

pub use events::{AgentEvent, EventStream};
pub use prompt::{build_system_prompt, FocusMode, Tone};
pub use runner::{AgentRun, AgentRunner, OpenAiAgent};
pub use tools::{string_arg, Tool, ToolSet, VectorSearchTool, WebScraperTool};
