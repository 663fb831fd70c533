//! Agent runner with a streaming tool calling loop.

use super::events::{AgentEvent, EventStream};
use super::tools::ToolSet;
use crate::config::Settings;
use crate::error::{Result, SvarError};
use crate::message::{Message, Role};
use crate::openai::create_client_with;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionCall,
};
use async_openai::Client;
use futures::StreamExt;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Inputs of one agent run.
#[derive(Clone)]
pub struct AgentRun {
    /// Prior conversation followed by the current question.
    pub messages: Vec<Message>,
    pub tools: ToolSet,
    pub system_prompt: String,
    /// Model override for this run.
    pub model: Option<String>,
}

impl AgentRun {
    pub fn new(messages: Vec<Message>, tools: ToolSet, system_prompt: impl Into<String>) -> Self {
        Self {
            messages,
            tools,
            system_prompt: system_prompt.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model.filter(|m| !m.trim().is_empty());
        self
    }
}

/// Executes the LLM and tool pipeline for one question.
pub trait AgentRunner: Send + Sync {
    /// Start a run. Events arrive lazily; an `Err` item ends the run.
    fn run(&self, run: AgentRun) -> EventStream;
}

/// Agent backed by an OpenAI-compatible chat completion API.
#[derive(Clone)]
pub struct OpenAiAgent {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_iterations: usize,
}

impl OpenAiAgent {
    pub fn new(client: Client<OpenAIConfig>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
            temperature: 0.0,
            max_iterations: 15,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let client = create_client_with(
            settings.llm.api_base.as_deref(),
            Duration::from_secs(settings.llm.timeout_seconds),
        );
        Self::new(client, &settings.llm.model)
            .with_temperature(settings.llm.temperature)
            .with_max_iterations(settings.agent.max_iterations)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set maximum iterations for the agent loop.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }
}

impl AgentRunner for OpenAiAgent {
    fn run(&self, run: AgentRun) -> EventStream {
        let (tx, rx) = mpsc::channel(64);
        let agent = self.clone();

        tokio::spawn(async move {
            if !emit(&tx, AgentEvent::chain_start()).await {
                return;
            }
            match agent.drive(run, &tx).await {
                Ok(true) => {
                    emit(&tx, AgentEvent::chain_end()).await;
                }
                Ok(false) => debug!("Event consumer went away, abandoning agent run"),
                Err(e) => {
                    warn!("Agent run failed: {}", e);
                    let _ = tx.send(Err(e)).await;
                }
            }
        });

        Box::pin(ReceiverStream::new(rx))
    }
}

type EventSender = mpsc::Sender<Result<AgentEvent>>;

/// Send one event; false once the consumer has gone away.
async fn emit(tx: &EventSender, event: AgentEvent) -> bool {
    tx.send(Ok(event)).await.is_ok()
}

/// A tool call assembled from streamed fragments.
#[derive(Debug, Default)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

fn agent_err(e: impl std::fmt::Display) -> SvarError {
    SvarError::Agent(e.to_string())
}

impl OpenAiAgent {
    /// Run the tool loop. Returns `Ok(false)` if the consumer disconnected.
    async fn drive(&self, run: AgentRun, tx: &EventSender) -> Result<bool> {
        let model = run.model.clone().unwrap_or_else(|| self.model.clone());
        let mut messages = build_messages(&run)?;
        let definitions = run.tools.definitions();

        for iteration in 1..=self.max_iterations {
            debug!("Agent iteration {}", iteration);

            let mut args = CreateChatCompletionRequestArgs::default();
            args.model(&model)
                .temperature(self.temperature)
                .messages(messages.clone());
            if !definitions.is_empty() {
                args.tools(definitions.clone());
            }
            let request = args.build().map_err(agent_err)?;

            let mut stream = self
                .client
                .chat()
                .create_stream(request)
                .await
                .map_err(|e| SvarError::OpenAI(format!("Agent API error: {}", e)))?;

            let mut text = String::new();
            let mut calls: BTreeMap<u32, PendingCall> = BTreeMap::new();

            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| SvarError::OpenAI(format!("Agent stream error: {}", e)))?;
                for choice in chunk.choices {
                    if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                        text.push_str(&content);
                        if !emit(tx, AgentEvent::token(content)).await {
                            return Ok(false);
                        }
                    }
                    for fragment in choice.delta.tool_calls.unwrap_or_default() {
                        let call = calls.entry(fragment.index).or_default();
                        if let Some(id) = fragment.id {
                            call.id = id;
                        }
                        if let Some(function) = fragment.function {
                            if let Some(name) = function.name {
                                call.name.push_str(&name);
                            }
                            if let Some(arguments) = function.arguments {
                                call.arguments.push_str(&arguments);
                            }
                        }
                    }
                }
            }

            if calls.is_empty() {
                return Ok(true);
            }

            let tool_calls: Vec<ChatCompletionMessageToolCall> = calls
                .into_values()
                .map(|c| ChatCompletionMessageToolCall {
                    id: c.id,
                    r#type: ChatCompletionToolType::Function,
                    function: FunctionCall {
                        name: c.name,
                        arguments: c.arguments,
                    },
                })
                .collect();

            let mut assistant = ChatCompletionRequestAssistantMessageArgs::default();
            assistant.tool_calls(tool_calls.clone());
            if !text.is_empty() {
                assistant.content(text);
            }
            messages.push(assistant.build().map_err(agent_err)?.into());

            for call in &tool_calls {
                let Some(output) = self.execute_tool_call(&run.tools, call, tx).await else {
                    return Ok(false);
                };
                messages.push(
                    ChatCompletionRequestToolMessageArgs::default()
                        .tool_call_id(&call.id)
                        .content(output)
                        .build()
                        .map_err(agent_err)?
                        .into(),
                );
            }
        }

        Err(SvarError::Agent(format!(
            "Agent exceeded maximum iterations ({})",
            self.max_iterations
        )))
    }

    /// Execute one tool call, bracketed by start and end events.
    ///
    /// Tool failures become the tool's output. Returns None if the consumer
    /// disconnected.
    async fn execute_tool_call(
        &self,
        tools: &ToolSet,
        call: &ChatCompletionMessageToolCall,
        tx: &EventSender,
    ) -> Option<String> {
        let name = &call.function.name;
        let raw = &call.function.arguments;
        info!("Agent calling tool: {} with args: {}", name, raw);

        let input: Value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()));
        if !emit(tx, AgentEvent::tool_start(name, input.clone())).await {
            return None;
        }

        let output = match tools.get(name) {
            Some(tool) => match tool.call(input).await {
                Ok(output) => output,
                Err(e) => format!("Tool error: {}", e),
            },
            None => format!("Tool error: unknown tool '{}'", name),
        };

        if !emit(tx, AgentEvent::tool_end(name, output.clone())).await {
            return None;
        }
        Some(output)
    }
}

fn build_messages(run: &AgentRun) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut messages: Vec<ChatCompletionRequestMessage> = vec![ChatCompletionRequestSystemMessageArgs::default()
        .content(run.system_prompt.clone())
        .build()
        .map_err(agent_err)?
        .into()];

    for message in &run.messages {
        let built: ChatCompletionRequestMessage = match message.role {
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(message.content.clone())
                .build()
                .map_err(agent_err)?
                .into(),
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(message.content.clone())
                .build()
                .map_err(agent_err)?
                .into(),
        };
        messages.push(built);
    }

    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_messages_order() {
        let run = AgentRun::new(
            vec![
                Message::user("1", "Hi"),
                Message::assistant("2", "Hello!"),
                Message::user("3", "Weather in Oslo?"),
            ],
            ToolSet::new(),
            "system",
        );

        let messages = build_messages(&run).unwrap();
        assert_eq!(messages.len(), 4);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(messages[2], ChatCompletionRequestMessage::Assistant(_)));
        assert!(matches!(messages[3], ChatCompletionRequestMessage::User(_)));
    }

    #[test]
    fn test_blank_model_override_is_ignored() {
        let run = AgentRun::new(vec![], ToolSet::new(), "s").with_model(Some("  ".into()));
        assert_eq!(run.model, None);

        let run = AgentRun::new(vec![], ToolSet::new(), "s").with_model(Some("gpt-4o".into()));
        assert_eq!(run.model.as_deref(), Some("gpt-4o"));
    }
}
