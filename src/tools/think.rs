use serde::Deserialize;
use serde_json::Value;

use super::{Tool, ToolError, ToolOutput};

pub const TOOL_NAME: &str = "think_tool";

#[derive(Debug, Clone, Deserialize)]
pub struct ThinkInput {
    pub thought: String,
}

/// Scratchpad for the model. Nothing is fetched or changed.
pub struct ThinkTool;

#[async_trait::async_trait]
impl Tool for ThinkTool {
    type Input = ThinkInput;
    type Output = ToolOutput;

    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Think about how to best perform the task requested by the user, given the available tools, the previous context, and the user's question. Use it at the start, when complex reasoning is needed, and near the end of the task to see if more analyses are needed for a higher quality final output."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "thought": {
                    "type": "string",
                    "description": "A thought to think about"
                }
            },
            "required": ["thought"]
        })
    }

    async fn run(&self, input: ThinkInput) -> Result<ToolOutput, ToolError> {
        log::info!("Think: {}", input.thought);
        Ok(ToolOutput::Text(input.thought))
    }
}
