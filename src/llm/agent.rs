use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;

use super::session::{ChatSession, ToolObserver, DEFAULT_MAX_TOOL_ROUNDS};
use super::{ChatModel, Message, Role};
use crate::tools::{ToolInvocationRecord, ToolRoster};

/// Named instructions plus the tools they may use.
#[derive(Clone)]
pub struct Agent {
    pub name: String,
    pub instructions: String,
    pub roster: ToolRoster,
    /// Ask the model for a JSON object instead of free text.
    pub json_output: bool,
}

#[derive(Debug, Clone)]
pub struct AgentRun {
    /// Items produced by this run: assistant turns and tool results.
    pub new_items: Vec<Message>,
    pub final_output: String,
    pub tool_outputs: Vec<ToolInvocationRecord>,
}

impl AgentRun {
    /// The input the run started from followed by everything it produced.
    pub fn to_input_list(&self, input: &[Message]) -> Vec<Message> {
        let mut items = input.to_vec();
        items.extend(self.new_items.iter().cloned());
        items
    }
}

/// Runs agents over an input item list.
pub struct AgentRunner {
    model: Arc<dyn ChatModel>,
    model_name: String,
    temperature: Option<f32>,
    max_rounds: usize,
    observer: Option<Arc<dyn ToolObserver>>,
}

impl AgentRunner {
    pub fn new(model: Arc<dyn ChatModel>, model_name: impl Into<String>) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            temperature: None,
            max_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            observer: None,
        }
    }

    pub fn temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_observer(mut self, observer: Option<Arc<dyn ToolObserver>>) -> Self {
        self.observer = observer;
        self
    }

    pub async fn run(&self, agent: &Agent, input: &[Message]) -> Result<AgentRun> {
        log::info!("Agent {}: running over {} input items", agent.name, input.len());

        let mut messages = Vec::with_capacity(input.len() + 1);
        messages.push(Message::system(agent.instructions.clone()));
        messages.extend(input.iter().cloned());
        let start = messages.len();

        let outcome = ChatSession::new(self.model.clone(), agent.roster.clone())
            .with_observer(self.observer.clone())
            .max_rounds(self.max_rounds)
            .temperature(self.temperature)
            .json_output(agent.json_output)
            .run(&self.model_name, messages)
            .await?;

        Ok(AgentRun {
            new_items: outcome.messages[start..].to_vec(),
            final_output: outcome.content,
            tool_outputs: outcome.tool_outputs,
        })
    }
}

/// Call ids seen in an item list, from assistant tool calls and tool results.
pub fn distinct_call_ids(items: &[Message]) -> HashSet<String> {
    let mut ids = HashSet::new();
    for item in items {
        match item.role {
            Role::Assistant => {
                ids.extend(item.tool_calls.iter().map(|call| call.id.clone()));
            }
            Role::Tool => {
                if let Some(id) = &item.tool_call_id {
                    ids.insert(id.clone());
                }
            }
            _ => {}
        }
    }
    ids
}
