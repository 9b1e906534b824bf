//! Scripted stand-ins for the external services.

use anyhow::Result;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::llm::{
    ChatModel, CompletionRequest, ContentBlock, DocumentModel, DocumentRequest, FunctionCall,
    Message, Role, SearchCompletion, ToolCall, UrlCitation, WebSearchModel,
};
use crate::services::{
    Cell, ColumnMetadata, DatabaseEntry, DatabaseRegistry, MetadataStore, PdfContent, PdfStore,
    QueryExecutor, QueryResult, SqlGenerator,
};

/// An assistant message requesting a single tool call.
pub fn tool_call(id: &str, name: &str, arguments: Value) -> Message {
    Message {
        role: Role::Assistant,
        content: None,
        tool_calls: vec![ToolCall {
            id: id.to_string(),
            kind: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }],
        tool_call_id: None,
    }
}

/// Rows `{n, amount}` for n in `0..count`.
pub fn numbered_rows(count: usize) -> QueryResult {
    QueryResult {
        columns: vec!["n".to_string(), "amount".to_string()],
        rows: (0..count)
            .map(|i| vec![Cell::Int(i as i64), Cell::Float(i as f64 * 1.5)])
            .collect(),
    }
}

pub fn sales_registry() -> DatabaseRegistry {
    DatabaseRegistry::new(vec![DatabaseEntry {
        name: "sales".to_string(),
        db_type: "sqlite".to_string(),
        creds: serde_json::json!({ "path": ":memory:" }),
        metadata_file: None,
    }])
}

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<Message> + Send + Sync>;

/// Chat model answering from a script or a closure, recording every request.
pub struct FakeChat {
    responder: Responder,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeChat {
    pub fn scripted(replies: Vec<Message>) -> Self {
        let queue = Mutex::new(VecDeque::from(replies));
        Self::from_fn(move |_| {
            queue
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("chat script exhausted"))
        })
    }

    pub fn from_fn(f: impl Fn(&CompletionRequest) -> Result<Message> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(f),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ChatModel for FakeChat {
    async fn complete(&self, request: CompletionRequest) -> Result<Message> {
        let reply = (self.responder)(&request);
        self.requests.lock().unwrap().push(request);
        reply
    }
}

/// SQL generator replaying scripted results in order.
pub struct FakeSqlGenerator {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    questions: Mutex<Vec<String>>,
}

impl FakeSqlGenerator {
    pub fn new(replies: Vec<std::result::Result<&str, &str>>) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            questions: Mutex::new(Vec::new()),
        }
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SqlGenerator for FakeSqlGenerator {
    async fn generate(&self, question: &str, _db_name: &str) -> Result<String> {
        self.questions.lock().unwrap().push(question.to_string());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(sql)) => Ok(sql),
            Some(Err(e)) => Err(anyhow::anyhow!(e)),
            None => Err(anyhow::anyhow!("no scripted SQL")),
        }
    }
}

/// Executor keyed by exact SQL text.
#[derive(Default)]
pub struct FakeExecutor {
    results: HashMap<String, std::result::Result<QueryResult, String>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sql: &str, result: std::result::Result<QueryResult, &str>) -> Self {
        self.results
            .insert(sql.to_string(), result.map_err(str::to_string));
        self
    }
}

#[async_trait::async_trait]
impl QueryExecutor for FakeExecutor {
    async fn execute(&self, _db: &DatabaseEntry, sql: &str) -> Result<QueryResult> {
        match self.results.get(sql) {
            Some(Ok(result)) => Ok(result.clone()),
            Some(Err(e)) => Err(anyhow::anyhow!(e.clone())),
            None => Err(anyhow::anyhow!("unexpected SQL: {}", sql)),
        }
    }
}

pub struct FakeWebSearch {
    reply: std::result::Result<SearchCompletion, String>,
}

impl FakeWebSearch {
    pub fn answering(content: &str, citations: Vec<UrlCitation>) -> Self {
        Self {
            reply: Ok(SearchCompletion {
                content: content.to_string(),
                citations,
            }),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl WebSearchModel for FakeWebSearch {
    async fn search(&self, _question: &str) -> Result<SearchCompletion> {
        self.reply.clone().map_err(|e| anyhow::anyhow!(e))
    }
}

/// Document model returning fixed blocks, recording requests.
pub struct FakeDocumentModel {
    reply: std::result::Result<Vec<ContentBlock>, String>,
    requests: Mutex<Vec<DocumentRequest>>,
}

impl FakeDocumentModel {
    pub fn replying(blocks: Vec<ContentBlock>) -> Self {
        Self {
            reply: Ok(blocks),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn last_request(&self) -> Option<DocumentRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait::async_trait]
impl DocumentModel for FakeDocumentModel {
    async fn create_message(&self, request: DocumentRequest) -> Result<Vec<ContentBlock>> {
        self.requests.lock().unwrap().push(request);
        self.reply.clone().map_err(|e| anyhow::anyhow!(e))
    }
}

/// PDF store over `(id, file_name, base64_data)` triples.
pub struct FakePdfStore {
    files: HashMap<String, PdfContent>,
}

impl FakePdfStore {
    pub fn with(files: &[(&str, &str, &str)]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(id, name, data)| {
                    (
                        id.to_string(),
                        PdfContent {
                            file_name: name.to_string(),
                            base64_data: data.to_string(),
                        },
                    )
                })
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl PdfStore for FakePdfStore {
    async fn get_pdf_content(&self, file_id: &str) -> Result<PdfContent> {
        self.files
            .get(file_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("PDF {} not found", file_id))
    }
}

/// Metadata for a single `sales` table.
pub struct FakeMetadataStore;

#[async_trait::async_trait]
impl MetadataStore for FakeMetadataStore {
    async fn get_metadata(&self, _db_name: &str) -> Result<Vec<ColumnMetadata>> {
        Ok(vec![
            ColumnMetadata {
                table_name: "sales".to_string(),
                column_name: "sold_on".to_string(),
                data_type: "date".to_string(),
                column_description: None,
            },
            ColumnMetadata {
                table_name: "sales".to_string(),
                column_name: "amount".to_string(),
                data_type: "real".to_string(),
                column_description: Some("Net amount in USD".to_string()),
            },
        ])
    }
}
