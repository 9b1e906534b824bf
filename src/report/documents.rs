use serde_json::Value;

use crate::llm::{CitationsToggle, DocumentSource, InputBlock};
use crate::tools::{ToolInvocationRecord, ToolOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Text,
    Pdf,
}

/// A tool result packaged as a citable document for the synthesis call.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentFragment {
    pub title: String,
    pub media_type: MediaType,
    /// Plain text, or base64 data for PDFs.
    pub content: String,
    pub citations_enabled: bool,
}

impl DocumentFragment {
    /// Package one trace entry. Results without a document rendering (custom
    /// tools, thoughts) yield `None`.
    pub fn from_record(record: &ToolInvocationRecord) -> Option<Self> {
        let content = match &record.result {
            ToolOutput::Sql(answer) => {
                let mut data = format!("Question: {}\n", answer.question);
                data.push_str(&format!(
                    "SQL: ```sql\n{}\n```\n",
                    answer.sql.as_deref().unwrap_or_default()
                ));
                if let Some(rows) = answer.usable_rows().filter(|rows| *rows != "[]") {
                    data.push_str(&format!("Data: {}\n", rows));
                }
                if answer.has_error() {
                    data.push_str(&format!("Error: {}\n", answer.error));
                }
                data
            }
            ToolOutput::WebSearch(answer) => {
                let mut data = format!("Question: {}\n", input_question(&record.input));
                data.push_str(&format!("Answer: {}\n", answer.answer));
                data.push_str("Sources:\n");
                for source in &answer.reference_sources {
                    data.push_str(&format!("- {}: {}\n", source.source, source.url));
                }
                data
            }
            ToolOutput::PdfCitations(answer) => {
                let mut data = format!("Question: {}\n", input_question(&record.input));
                let pdf_files = record.input.get("pdf_files").cloned().unwrap_or(Value::Array(vec![]));
                data.push_str(&format!("PDF IDs: {}\n", pdf_files));
                for block in answer.citations.iter().filter(|b| b.is_text()) {
                    data.push_str(block.text.as_deref().unwrap_or_default());
                    data.push('\n');
                }
                data
            }
            ToolOutput::Text(_) | ToolOutput::Custom(_) => return None,
        };

        let analysis_id = record
            .result
            .analysis_id()
            .unwrap_or_else(|| "Unknown".to_string());

        Some(Self {
            title: format!("{}: {}", record.tool_name, analysis_id),
            media_type: MediaType::Text,
            content,
            citations_enabled: true,
        })
    }

    pub fn into_block(self) -> InputBlock {
        let source = match self.media_type {
            MediaType::Text => DocumentSource::Text {
                media_type: "text/plain".to_string(),
                data: self.content,
            },
            MediaType::Pdf => DocumentSource::Base64 {
                media_type: "application/pdf".to_string(),
                data: self.content,
            },
        };
        InputBlock::Document {
            source,
            title: self.title,
            citations: CitationsToggle {
                enabled: self.citations_enabled,
            },
            cache_control: None,
        }
    }
}

fn input_question(input: &Value) -> &str {
    input
        .get("question")
        .and_then(Value::as_str)
        .unwrap_or("No question")
}

/// Documents for every renderable entry of a trace, in order.
pub fn trace_documents(trace: &[ToolInvocationRecord]) -> Vec<InputBlock> {
    trace
        .iter()
        .filter_map(DocumentFragment::from_record)
        .map(DocumentFragment::into_block)
        .collect()
}
