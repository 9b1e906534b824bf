use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;

use super::{ChatModel, CompletionRequest, Message, ToolCall};
use crate::tools::{ToolInvocationRecord, ToolRoster};

/// Default ceiling on tool-calling rounds in one session.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 30;

/// Hook invoked after every successful tool call.
#[async_trait::async_trait]
pub trait ToolObserver: Send + Sync {
    async fn after_tool(&self, record: &ToolInvocationRecord);
}

#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// Content of the final assistant message.
    pub content: String,
    pub tool_outputs: Vec<ToolInvocationRecord>,
    /// Full transcript, including the messages the session started from.
    pub messages: Vec<Message>,
}

/// A tool-calling chat loop: ask the model, run the tools it requests, feed
/// the results back, and stop when it answers without tool calls.
#[derive(Clone)]
pub struct ChatSession {
    model: Arc<dyn ChatModel>,
    roster: ToolRoster,
    observer: Option<Arc<dyn ToolObserver>>,
    max_rounds: usize,
    temperature: Option<f32>,
    json_output: bool,
}

impl ChatSession {
    pub fn new(model: Arc<dyn ChatModel>, roster: ToolRoster) -> Self {
        Self {
            model,
            roster,
            observer: None,
            max_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            temperature: None,
            json_output: false,
        }
    }

    pub fn with_observer(mut self, observer: Option<Arc<dyn ToolObserver>>) -> Self {
        self.observer = observer;
        self
    }

    pub fn max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn json_output(mut self, json_output: bool) -> Self {
        self.json_output = json_output;
        self
    }

    pub async fn run(&self, model_name: &str, mut messages: Vec<Message>) -> Result<SessionOutcome> {
        let tools = self.roster.definitions();
        let mut tool_outputs = Vec::new();
        let mut rounds = 0;

        loop {
            // Past the ceiling the model is asked once more, without tools.
            let exhausted = rounds >= self.max_rounds;
            if exhausted {
                log::warn!(
                    "ChatSession: {} tool rounds used, asking for a final answer",
                    self.max_rounds
                );
            }

            let mut reply = self
                .model
                .complete(CompletionRequest {
                    model: model_name.to_string(),
                    messages: messages.clone(),
                    tools: if exhausted { Vec::new() } else { tools.clone() },
                    temperature: self.temperature,
                    json_output: self.json_output,
                })
                .await?;

            if exhausted && !reply.tool_calls.is_empty() {
                log::warn!(
                    "ChatSession: ignoring {} tool call(s) past the round ceiling",
                    reply.tool_calls.len()
                );
                reply.tool_calls.clear();
            }

            let calls = reply.tool_calls.clone();
            let content = reply.content.clone().unwrap_or_default();
            messages.push(reply);

            if calls.is_empty() {
                log::debug!(
                    "ChatSession: finished after {} tool rounds, {} tool calls",
                    rounds,
                    tool_outputs.len()
                );
                return Ok(SessionOutcome {
                    content,
                    tool_outputs,
                    messages,
                });
            }

            rounds += 1;
            for call in calls {
                let text = match self.dispatch(&call).await? {
                    Dispatch::Recorded(record) => {
                        let text = record.result.to_prompt_text();
                        if let Some(observer) = &self.observer {
                            observer.after_tool(&record).await;
                        }
                        tool_outputs.push(record);
                        text
                    }
                    Dispatch::Rejected(text) => text,
                };
                messages.push(Message::tool(call.id.clone(), text));
            }
        }
    }

    async fn dispatch(&self, call: &ToolCall) -> Result<Dispatch> {
        let name = call.function.name.as_str();
        let raw = call.function.arguments.trim();
        let input: Value = if raw.is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_str(raw) {
                Ok(input) => input,
                Err(e) => {
                    log::warn!("ChatSession: invalid arguments for {}: {}", name, e);
                    return Ok(Dispatch::Rejected(format!(
                        "Error: arguments for {} are not valid JSON: {}",
                        name, e
                    )));
                }
            }
        };

        log::info!("ChatSession: calling {} ({})", name, call.id);
        match self.roster.call(name, input.clone()).await {
            Ok(result) => Ok(Dispatch::Recorded(ToolInvocationRecord {
                tool_name: name.to_string(),
                input,
                result,
                call_id: call.id.clone(),
            })),
            Err(e) if e.is_recoverable() => {
                log::warn!("ChatSession: {}", e);
                Ok(Dispatch::Rejected(format!("Error: {}", e)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

enum Dispatch {
    Recorded(ToolInvocationRecord),
    Rejected(String),
}
