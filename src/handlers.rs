use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::custom_tools::{load_custom_tools, CustomToolRegistry, ToolHelpers, YamlToolRegistry};
use crate::llm::{joined_text, AnthropicClient, OpenAiClient, ToolObserver};
use crate::report::engine::CustomToolSource;
use crate::report::{Orchestrator, ReportRequest, ReportResult, ReportSettings, ToolKit};
use crate::services::{
    DatabaseRegistry, DirectoryPdfStore, FileMetadataStore, HttpSqlGenerator, LocalQueryExecutor,
};
use crate::tools::pdf_citations::pdf_search_question;
use crate::tools::{
    PdfCitationsTool, TextToSqlTool, Tool, ToolInvocationRecord, WebSearchTool, BUILTIN_TOOL_NAMES,
};

/// Everything the commands need, built once from the configuration.
pub struct Services {
    pub orchestrator: Orchestrator,
    pub pdf_citations: Arc<PdfCitationsTool>,
    pub registry: Arc<dyn CustomToolRegistry>,
    pub helpers: ToolHelpers,
}

impl Services {
    pub fn from_config(config: &Config) -> Result<Self> {
        let openai = Arc::new(
            OpenAiClient::new(
                config.llm.endpoint.clone(),
                config.llm.api_key.clone().unwrap_or_default(),
            )
            .with_search(
                config.web_search.model.clone(),
                config.web_search.search_context_size.clone(),
            ),
        );
        let anthropic = Arc::new(AnthropicClient::new(
            config.citations.endpoint.clone(),
            config.citations.api_key.clone().unwrap_or_default(),
        ));

        let databases = Arc::new(DatabaseRegistry::new(config.databases.clone()));
        let executor = Arc::new(LocalQueryExecutor::new());
        let generator = Arc::new(
            HttpSqlGenerator::new(
                config.sql_service.endpoint.clone(),
                Duration::from_secs(config.sql_service.timeout_secs),
            )
            .context("Failed to build SQL service client")?,
        );

        let helpers = ToolHelpers {
            databases: databases.clone(),
            executor: executor.clone(),
        };
        let registry: Arc<dyn CustomToolRegistry> =
            Arc::new(YamlToolRegistry::new(&config.custom_tools.registry_file));

        let pdf_citations = Arc::new(PdfCitationsTool::new(
            Arc::new(DirectoryPdfStore::new(&config.pdf.dir)),
            anthropic.clone(),
            config.citations.model.clone(),
        ));

        let tools = ToolKit {
            sql: Arc::new(TextToSqlTool::new(generator, databases.clone(), executor)),
            web_search: config
                .web_search
                .enabled
                .then(|| Arc::new(WebSearchTool::new(openai.clone()))),
            pdf_citations: Some(pdf_citations.clone()),
            custom: config.custom_tools.enabled.then(|| CustomToolSource {
                registry: registry.clone(),
                helpers: helpers.clone(),
            }),
        };

        let settings = ReportSettings {
            chat_model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tool_rounds: config.llm.max_tool_rounds,
            citation_model: config.citations.model.clone(),
        };

        let orchestrator = Orchestrator::new(
            openai,
            anthropic,
            Arc::new(FileMetadataStore::new(databases.clone())),
            tools,
            settings,
        )
        .with_observer(Arc::new(LoggingObserver));

        log::info!(
            "Services ready: databases {:?}, chat model {}",
            databases.names(),
            config.llm.model
        );

        Ok(Self {
            orchestrator,
            pdf_citations,
            registry,
            helpers,
        })
    }
}

/// Logs every finished tool call.
pub struct LoggingObserver;

#[async_trait::async_trait]
impl ToolObserver for LoggingObserver {
    async fn after_tool(&self, record: &ToolInvocationRecord) {
        log::info!(
            "Tool {} finished (call {}, analysis {})",
            record.tool_name,
            record.call_id,
            record
                .result
                .analysis_id()
                .unwrap_or_else(|| "none".to_string())
        );
    }
}

/// Handler for the `report` command
pub async fn report_handler(services: &Services, request: ReportRequest, json: bool) -> Result<()> {
    let result = services.orchestrator.generate_report(&request).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", render_markdown(&result));
    }
    Ok(())
}

/// Report text followed by the SQL behind it.
pub fn render_markdown(result: &ReportResult) -> String {
    let mut text = result.report.clone();
    if result.sql_answers.is_empty() {
        return text;
    }

    text.push_str(&format!(
        "\n\n---\n\n## Queries ({} tool calls)\n",
        result.tool_call_count
    ));
    for answer in &result.sql_answers {
        text.push_str(&format!("\n### {}\n", answer.question));
        if let Some(sql) = &answer.sql {
            text.push_str(&format!("\n```sql\n{}\n```\n", sql));
        }
        if answer.has_error() {
            text.push_str(&format!("\n> {}\n", answer.error));
        }
    }
    text
}

/// Handler for the `check-tools` command: load the registry and report
/// which tools would be offered.
pub async fn check_tools_handler(services: &Services) -> Result<()> {
    let records = services.registry.enabled_tools().await?;
    let report = load_custom_tools(records, &services.helpers, &BUILTIN_TOOL_NAMES);

    for tool in &report.loaded {
        println!("✅ {} (query block {})", tool.name(), tool.block_name());
    }
    for (name, err) in &report.rejected {
        println!("❌ {}: {}", name, err);
    }
    println!(
        "{} loaded, {} rejected",
        report.loaded.len(),
        report.rejected.len()
    );

    if !report.rejected.is_empty() {
        anyhow::bail!("{} custom tool(s) were rejected", report.rejected.len());
    }
    Ok(())
}

/// Handler for the `pdf-search` command
pub async fn pdf_search_handler(
    services: &Services,
    question: &str,
    sql: &str,
    pdf_ids: &[String],
) -> Result<()> {
    let prompt = pdf_search_question(question, sql);
    let answer = services.pdf_citations.cite(&prompt, pdf_ids).await?;

    println!("{}", joined_text(&answer.citations));
    log::info!(
        "PDF search {} returned {} block(s)",
        answer.analysis_id,
        answer.citations.len()
    );
    Ok(())
}
