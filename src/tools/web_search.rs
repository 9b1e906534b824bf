use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use super::{Tool, ToolError, ToolOutput};
use crate::llm::WebSearchModel;

pub const TOOL_NAME: &str = "web_search_tool";

#[derive(Debug, Clone, Deserialize)]
pub struct WebSearchInput {
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSource {
    pub source: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSearchAnswer {
    #[serde(default)]
    pub analysis_id: Option<Uuid>,
    pub answer: String,
    #[serde(default)]
    pub reference_sources: Vec<ReferenceSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Answers a question from the web. Provider failures are folded into the
/// answer rather than raised.
pub struct WebSearchTool {
    model: Arc<dyn WebSearchModel>,
}

impl WebSearchTool {
    pub fn new(model: Arc<dyn WebSearchModel>) -> Self {
        Self { model }
    }

    pub async fn search(&self, question: &str) -> WebSearchAnswer {
        log::info!("WebSearch: {}", question);

        match self.model.search(question).await {
            Ok(completion) => {
                log::info!(
                    "WebSearch: answer with {} sources",
                    completion.citations.len()
                );
                WebSearchAnswer {
                    analysis_id: Some(Uuid::new_v4()),
                    answer: completion.content,
                    reference_sources: completion
                        .citations
                        .into_iter()
                        .map(|c| ReferenceSource {
                            source: c.title,
                            url: c.url,
                        })
                        .collect(),
                    error: None,
                }
            }
            Err(e) => {
                log::error!("WebSearch: provider call failed: {:#}", e);
                WebSearchAnswer {
                    analysis_id: None,
                    answer: "Error calling OpenAI API".to_string(),
                    reference_sources: Vec::new(),
                    error: Some(format!("{:#}", e)),
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl Tool for WebSearchTool {
    type Input = WebSearchInput;
    type Output = ToolOutput;

    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Given a user question, this tool will visit the web and provide an answer to the question along with the sources."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question to research on the web"
                }
            },
            "required": ["question"]
        })
    }

    async fn run(&self, input: WebSearchInput) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::WebSearch(self.search(&input.question).await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::UrlCitation;
    use crate::testing::FakeWebSearch;

    #[tokio::test]
    async fn test_answer_carries_sources() {
        let model = FakeWebSearch::answering(
            "Inflation was 3.1%.",
            vec![UrlCitation {
                title: "BLS".to_string(),
                url: "https://www.bls.gov/cpi".to_string(),
            }],
        );
        let answer = WebSearchTool::new(Arc::new(model)).search("US CPI 2024?").await;

        assert!(answer.analysis_id.is_some());
        assert_eq!(answer.answer, "Inflation was 3.1%.");
        assert_eq!(
            answer.reference_sources,
            vec![ReferenceSource {
                source: "BLS".to_string(),
                url: "https://www.bls.gov/cpi".to_string(),
            }]
        );
        assert!(answer.error.is_none());
    }

    #[tokio::test]
    async fn test_provider_failure_is_folded_into_answer() {
        let tool = WebSearchTool::new(Arc::new(FakeWebSearch::failing("rate limited")));
        let answer = tool.search("anything").await;

        assert_eq!(answer.answer, "Error calling OpenAI API");
        assert!(answer.analysis_id.is_none());
        assert!(answer.reference_sources.is_empty());
        assert_eq!(answer.error.as_deref(), Some("rate limited"));
    }
}
