pub mod pdf_citations;
pub mod text_to_sql;
pub mod think;
pub mod web_search;

pub use pdf_citations::{PdfCitationsAnswer, PdfCitationsTool};
pub use text_to_sql::{SqlAnswer, TextToSqlTool};
pub use think::ThinkTool;
pub use web_search::{WebSearchAnswer, WebSearchTool};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::llm::ToolDefinition;

/// Names of the tools this crate provides. Custom tools may not reuse them.
pub const BUILTIN_TOOL_NAMES: [&str; 4] = [
    text_to_sql::TOOL_NAME,
    think::TOOL_NAME,
    web_search::TOOL_NAME,
    pdf_citations::TOOL_NAME,
];

/// Errors a tool can raise.
///
/// Expected data problems (bad SQL, empty results) are not errors: tools fold
/// them into their own output so the model can read them and retry.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    Unknown(String),
    #[error("invalid input for {tool}: {message}")]
    InvalidInput { tool: String, message: String },
    #[error("{tool} failed: {message}")]
    Failed { tool: String, message: String },
}

impl ToolError {
    pub fn failed(tool: &str, err: anyhow::Error) -> Self {
        Self::Failed {
            tool: tool.to_string(),
            message: format!("{:#}", err),
        }
    }

    /// Whether the model should see this error and try again.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Tool trait for agent-orchestrated operations.
///
/// Not object-safe (associated types). Rosters hold tools through the
/// [`RosterTool`] blanket impl, which decodes model arguments into `Input`.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    type Input: Send;
    type Output: Send;

    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema of `Input`, advertised to the model.
    fn parameters(&self) -> Value;
    async fn run(&self, input: Self::Input) -> Result<Self::Output, ToolError>;
}

/// Object-safe view of a tool, invoked with raw JSON arguments.
#[async_trait::async_trait]
pub trait RosterTool: Send + Sync {
    fn definition(&self) -> ToolDefinition;
    fn tool_name(&self) -> &str;
    async fn invoke(&self, input: Value) -> Result<ToolOutput, ToolError>;
}

#[async_trait::async_trait]
impl<T> RosterTool for T
where
    T: Tool,
    T::Input: DeserializeOwned,
    T::Output: Into<ToolOutput>,
{
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }

    fn tool_name(&self) -> &str {
        self.name()
    }

    async fn invoke(&self, input: Value) -> Result<ToolOutput, ToolError> {
        let input: T::Input =
            serde_json::from_value(input).map_err(|e| ToolError::InvalidInput {
                tool: self.name().to_string(),
                message: e.to_string(),
            })?;
        Ok(self.run(input).await?.into())
    }
}

/// Result of one tool invocation, whatever the tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Sql(SqlAnswer),
    WebSearch(WebSearchAnswer),
    PdfCitations(PdfCitationsAnswer),
    Text(String),
    Custom(Value),
}

impl ToolOutput {
    /// The analysis id carried by the result itself, if any.
    pub fn analysis_id(&self) -> Option<String> {
        match self {
            Self::Sql(answer) => Some(answer.analysis_id.to_string()),
            Self::WebSearch(answer) => answer.analysis_id.map(|id| id.to_string()),
            Self::PdfCitations(answer) => Some(answer.analysis_id.to_string()),
            Self::Text(_) => None,
            Self::Custom(value) => value
                .get("analysis_id")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    /// Text handed back to the model as the tool message.
    pub fn to_prompt_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            other => serde_json::to_string(other).unwrap_or_default(),
        }
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        Self::Custom(value)
    }
}

/// One entry of a run's tool trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRecord {
    pub tool_name: String,
    pub input: Value,
    pub result: ToolOutput,
    pub call_id: String,
}

/// Ordered set of tools offered to one LLM session.
#[derive(Clone, Default)]
pub struct ToolRoster {
    tools: HashMap<String, Arc<dyn RosterTool>>,
    order: Vec<String>,
}

impl ToolRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Returns false (and keeps the existing tool) when the
    /// name is already taken.
    pub fn register(&mut self, tool: Arc<dyn RosterTool>) -> bool {
        let name = tool.tool_name().to_string();
        if self.tools.contains_key(&name) {
            return false;
        }
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        true
    }

    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect()
    }

    pub async fn call(&self, name: &str, input: Value) -> Result<ToolOutput, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::Unknown(name.to_string()))?;
        tool.invoke(input).await
    }
}
