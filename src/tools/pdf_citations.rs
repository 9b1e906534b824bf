use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use super::{Tool, ToolError, ToolOutput};
use crate::llm::{
    CacheControl, CitationsToggle, ContentBlock, DocumentModel, DocumentRequest, DocumentSource,
    InputBlock,
};
use crate::services::PdfStore;

pub const TOOL_NAME: &str = "pdf_citations_tool";

const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone, Deserialize)]
pub struct PdfCitationsInput {
    pub question: String,
    pub pdf_files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfCitationsAnswer {
    pub analysis_id: Uuid,
    pub citations: Vec<ContentBlock>,
}

/// Wrap a question and the SQL that answered it into a PDF search prompt.
pub fn pdf_search_question(question: &str, sql: &str) -> String {
    format!(
        "Question: {}\n\nSQL Query: {}\n\nPlease find any relevant information in the PDFs that relates to this question or provides context to understand the SQL results. If there are data points or statistics related to the question/SQL query, please provide them.",
        question, sql
    )
}

/// Answers a question from stored PDFs with citation spans.
pub struct PdfCitationsTool {
    store: Arc<dyn PdfStore>,
    model: Arc<dyn DocumentModel>,
    model_name: String,
}

impl PdfCitationsTool {
    pub fn new(store: Arc<dyn PdfStore>, model: Arc<dyn DocumentModel>, model_name: String) -> Self {
        Self {
            store,
            model,
            model_name,
        }
    }

    pub async fn cite(&self, question: &str, pdf_files: &[String]) -> anyhow::Result<PdfCitationsAnswer> {
        log::info!(
            "PdfCitations: question {:?} over PDF ids {:?}",
            question,
            pdf_files
        );

        let mut content = Vec::with_capacity(pdf_files.len() + 1);
        for file_id in pdf_files {
            let pdf = self.store.get_pdf_content(file_id).await?;
            content.push(InputBlock::Document {
                source: DocumentSource::Base64 {
                    media_type: "application/pdf".to_string(),
                    data: pdf.base64_data,
                },
                title: pdf.file_name,
                citations: CitationsToggle { enabled: true },
                cache_control: Some(CacheControl::ephemeral()),
            });
        }
        content.push(InputBlock::Text {
            text: format!("{}\nUse citations to back up your answer", question),
        });

        let citations = self
            .model
            .create_message(DocumentRequest {
                model: self.model_name.clone(),
                system: None,
                content,
                temperature: None,
                max_tokens: MAX_TOKENS,
            })
            .await?;

        log::info!("PdfCitations: {} content blocks returned", citations.len());

        Ok(PdfCitationsAnswer {
            analysis_id: Uuid::new_v4(),
            citations,
        })
    }
}

#[async_trait::async_trait]
impl Tool for PdfCitationsTool {
    type Input = PdfCitationsInput;
    type Output = ToolOutput;

    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Given a user question and a list of PDF ids, this tool will attempt to answer the question from the information that is available in the PDFs. It will return the answer as a JSON."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question to answer from the PDFs"
                },
                "pdf_files": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Ids of the PDF files to search"
                }
            },
            "required": ["question", "pdf_files"]
        })
    }

    async fn run(&self, input: PdfCitationsInput) -> Result<ToolOutput, ToolError> {
        self.cite(&input.question, &input.pdf_files)
            .await
            .map(ToolOutput::PdfCitations)
            .map_err(|e| {
                log::error!("PdfCitations: {:#}", e);
                ToolError::failed(TOOL_NAME, e)
            })
    }
}
