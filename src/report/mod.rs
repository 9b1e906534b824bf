pub mod documents;
pub mod engine;
pub mod plan;
pub mod prompts;

pub use engine::{Orchestrator, ReportSettings, ToolKit};
pub use plan::PhasePlan;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::llm::ContentBlock;
use crate::tools::{text_to_sql, SqlAnswer, ToolInvocationRecord, ToolOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// One tool-calling session; the model decides when to stop.
    #[default]
    SinglePass,
    /// Analyst, evaluator, then a cited synthesis.
    ThreePhase,
    /// Analyst and evaluator agents in a bounded loop, then a report agent.
    AgentLoop,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportRequest {
    pub question: String,
    pub db_name: String,
    #[serde(default)]
    pub clarification_responses: String,
    #[serde(default)]
    pub pdf_file_ids: Vec<String>,
    #[serde(default)]
    pub use_websearch: bool,
    #[serde(default)]
    pub strategy: Strategy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportResult {
    pub report: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_with_citations: Option<Vec<ContentBlock>>,
    pub sql_answers: Vec<SqlAnswer>,
    pub tool_outputs: Vec<ToolInvocationRecord>,
    pub tool_call_count: usize,
}

impl ReportResult {
    /// A failed run: the message as the report and nothing else.
    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            report: message.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorVerdict {
    pub further_research_needed: bool,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub follow_up_questions: Option<Vec<String>>,
}

impl EvaluatorVerdict {
    /// Parse a verdict from model output, tolerating prose or code fences
    /// around the JSON object.
    pub fn parse(text: &str) -> Result<Self> {
        let start = text.find('{');
        let end = text.rfind('}');
        let json = match (start, end) {
            (Some(s), Some(e)) if s < e => &text[s..=e],
            _ => text,
        };
        serde_json::from_str(json)
            .with_context(|| format!("Evaluator returned an invalid verdict: {}", text))
    }

    /// The user message appended after this verdict.
    pub fn feedback(&self, last_iteration: bool) -> String {
        if last_iteration || !self.further_research_needed {
            return prompts::FINAL_REPORT_INSTRUCTION.to_string();
        }
        let mut feedback = format!("Feedback: {}", self.explanation);
        if let Some(questions) = self.follow_up_questions.as_ref().filter(|q| !q.is_empty()) {
            feedback.push_str(&format!("\nFollow-up questions: {:?}", questions));
        }
        feedback
    }
}

/// SQL answers in trace order.
pub fn extract_sql_answers(trace: &[ToolInvocationRecord]) -> Vec<SqlAnswer> {
    trace
        .iter()
        .filter(|record| record.tool_name == text_to_sql::TOOL_NAME)
        .filter_map(|record| match &record.result {
            ToolOutput::Sql(answer) => Some(answer.clone()),
            other => {
                log::error!("Orchestrator: unexpected SQL tool output: {:?}", other);
                None
            }
        })
        .collect()
}
