use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;

use super::documents::trace_documents;
use super::plan::{
    CallCount, Conversation, Finish, PhaseOutput, PhasePlan, PhaseSpec, ToolAccess,
    SYNTHESIS_MAX_TOKENS, SYNTHESIS_TEMPERATURE,
};
use super::prompts::render;
use super::{extract_sql_answers, EvaluatorVerdict, ReportRequest, ReportResult};
use crate::custom_tools::{load_custom_tools, CustomToolRegistry, ToolHelpers};
use crate::llm::{
    distinct_call_ids, joined_text, Agent, AgentRunner, ChatModel, ChatSession, DocumentModel,
    DocumentRequest, InputBlock, Message, ToolObserver,
};
use crate::services::{mk_create_ddl, MetadataStore};
use crate::tools::{
    PdfCitationsTool, TextToSqlTool, ThinkTool, ToolInvocationRecord, ToolRoster, WebSearchTool,
    BUILTIN_TOOL_NAMES,
};

#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub chat_model: String,
    pub temperature: Option<f32>,
    pub max_tool_rounds: usize,
    pub citation_model: String,
}

/// Where custom tools come from and what they can reach.
#[derive(Clone)]
pub struct CustomToolSource {
    pub registry: Arc<dyn CustomToolRegistry>,
    pub helpers: ToolHelpers,
}

/// Tools available to a run. Optional tools are only offered when the
/// request asks for them.
#[derive(Clone)]
pub struct ToolKit {
    pub sql: Arc<TextToSqlTool>,
    pub web_search: Option<Arc<WebSearchTool>>,
    pub pdf_citations: Option<Arc<PdfCitationsTool>>,
    pub custom: Option<CustomToolSource>,
}

struct PhaseRun {
    content: String,
    /// The running input after this phase, for running conversations.
    input_list: Option<Vec<Message>>,
    tool_outputs: Vec<ToolInvocationRecord>,
}

/// Turns a question into a report by running a [`PhasePlan`].
pub struct Orchestrator {
    chat: Arc<dyn ChatModel>,
    documents: Arc<dyn DocumentModel>,
    metadata: Arc<dyn MetadataStore>,
    tools: ToolKit,
    settings: ReportSettings,
    observer: Option<Arc<dyn ToolObserver>>,
}

impl Orchestrator {
    pub fn new(
        chat: Arc<dyn ChatModel>,
        documents: Arc<dyn DocumentModel>,
        metadata: Arc<dyn MetadataStore>,
        tools: ToolKit,
        settings: ReportSettings,
    ) -> Self {
        Self {
            chat,
            documents,
            metadata,
            tools,
            settings,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ToolObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Run the request's strategy. Failures come back as a degraded result
    /// carrying the strategy's failure message.
    pub async fn generate_report(&self, request: &ReportRequest) -> ReportResult {
        let plan = PhasePlan::for_strategy(request.strategy);
        self.generate_with_plan(&plan, request).await
    }

    pub async fn generate_with_plan(&self, plan: &PhasePlan, request: &ReportRequest) -> ReportResult {
        log::info!(
            "Orchestrator: {} report for {:?} on {}",
            plan.name,
            request.question,
            request.db_name
        );

        match self.run_plan(plan, request).await {
            Ok(result) => {
                log::info!(
                    "Orchestrator: report ready ({} tool calls, {} SQL answers)",
                    result.tool_call_count,
                    result.sql_answers.len()
                );
                result
            }
            Err(e) => {
                log::error!("Orchestrator: {} run failed: {:#}", plan.name, e);
                ReportResult::degraded(plan.failure.render(&e))
            }
        }
    }

    /// Tools offered for one request. Custom tools are re-read from the
    /// registry every time.
    pub async fn build_roster(&self, request: &ReportRequest) -> Result<ToolRoster> {
        let mut roster = ToolRoster::new();
        roster.register(self.tools.sql.clone());
        roster.register(Arc::new(ThinkTool));

        if request.use_websearch {
            match &self.tools.web_search {
                Some(tool) => {
                    roster.register(tool.clone());
                }
                None => log::warn!("Orchestrator: web search requested but not configured"),
            }
        }

        if !request.pdf_file_ids.is_empty() {
            match &self.tools.pdf_citations {
                Some(tool) => {
                    roster.register(tool.clone());
                }
                None => log::warn!("Orchestrator: PDF ids given but citations are not configured"),
            }
        }

        if let Some(custom) = &self.tools.custom {
            let records = custom
                .registry
                .enabled_tools()
                .await
                .context("Failed to fetch custom tools")?;
            let report = load_custom_tools(records, &custom.helpers, &BUILTIN_TOOL_NAMES);
            for tool in report.loaded {
                roster.register(tool);
            }
        }

        log::info!("Orchestrator: tools {:?}", roster.names());
        Ok(roster)
    }

    async fn run_plan(&self, plan: &PhasePlan, request: &ReportRequest) -> Result<ReportResult> {
        log::info!("Orchestrator: Step 1 - Assembling tools");
        let roster = self.build_roster(request).await?;

        log::info!("Orchestrator: Step 2 - Loading schema for {}", request.db_name);
        let metadata = self
            .metadata
            .get_metadata(&request.db_name)
            .await
            .with_context(|| format!("Failed to load metadata for {}", request.db_name))?;
        let mut vars = base_vars(request, mk_create_ddl(&metadata));

        log::info!("Orchestrator: Step 3 - Running {} phases", plan.name);
        let mut running: Vec<Message> = plan
            .initial_input
            .map(|template| vec![Message::user(render(template, &vars))])
            .unwrap_or_default();
        let mut trace: Vec<ToolInvocationRecord> = Vec::new();
        let mut last_narrative = String::new();

        let iterations = plan.max_iterations.unwrap_or(1).max(1);
        'iterations: for iteration in 1..=iterations {
            let last_iteration = iteration == iterations;
            if plan.max_iterations.is_some() {
                log::info!("Orchestrator: iteration {}/{}", iteration, iterations);
            }

            for phase in &plan.phases {
                let run = self
                    .run_phase(plan.conversation, phase, &roster, &vars, &running)
                    .await
                    .with_context(|| format!("{} phase failed", phase.name))?;
                trace.extend(run.tool_outputs);

                match phase.output {
                    PhaseOutput::Narrative => {
                        if let Some(input_list) = run.input_list {
                            running = input_list;
                        }
                        vars.insert(format!("{}_output", phase.name), run.content.clone());
                        last_narrative = run.content;
                    }
                    PhaseOutput::Verdict => {
                        let verdict = EvaluatorVerdict::parse(&run.content)?;
                        log::info!(
                            "Orchestrator: further research needed: {} ({})",
                            verdict.further_research_needed,
                            verdict.explanation
                        );
                        if plan.conversation == Conversation::Running {
                            running.push(Message::user(verdict.feedback(last_iteration)));
                        }
                        if !verdict.further_research_needed {
                            break 'iterations;
                        }
                    }
                }
            }
        }

        log::info!("Orchestrator: Step 4 - Writing report");
        let (report, report_with_citations) = match &plan.finish {
            Finish::LastNarrative => (last_narrative, None),
            Finish::CitedSynthesis { system, user } => {
                let blocks = self.synthesize(system, user, &vars, &trace).await?;
                (joined_text(&blocks), Some(blocks))
            }
            Finish::ReportAgent(report_phase) => {
                let run = self
                    .run_phase(Conversation::Running, report_phase, &roster, &vars, &running)
                    .await
                    .context("report phase failed")?;
                trace.extend(run.tool_outputs);
                (run.content, None)
            }
        };

        let tool_call_count = match plan.count {
            CallCount::Trace => trace.len(),
            CallCount::DistinctCallIds => distinct_call_ids(&running).len(),
        };

        Ok(ReportResult {
            report,
            report_with_citations,
            sql_answers: extract_sql_answers(&trace),
            tool_outputs: trace,
            tool_call_count,
        })
    }

    async fn run_phase(
        &self,
        conversation: Conversation,
        phase: &PhaseSpec,
        roster: &ToolRoster,
        vars: &HashMap<String, String>,
        running: &[Message],
    ) -> Result<PhaseRun> {
        log::info!("Orchestrator: {} phase", phase.name);

        let tools = match phase.tools {
            ToolAccess::Roster => roster.clone(),
            ToolAccess::None => ToolRoster::new(),
        };
        let json_output = phase.output == PhaseOutput::Verdict;
        let system = phase.system.map(|t| render(t, vars));
        let user = phase.user.map(|t| Message::user(render(t, vars)));

        match conversation {
            Conversation::Fresh => {
                let mut messages = Vec::new();
                if let Some(system) = system {
                    messages.push(Message::system(system));
                }
                messages.extend(user);

                let outcome = ChatSession::new(self.chat.clone(), tools)
                    .with_observer(self.observer.clone())
                    .max_rounds(self.settings.max_tool_rounds)
                    .temperature(self.settings.temperature)
                    .json_output(json_output)
                    .run(&self.settings.chat_model, messages)
                    .await?;

                Ok(PhaseRun {
                    content: outcome.content,
                    input_list: None,
                    tool_outputs: outcome.tool_outputs,
                })
            }
            Conversation::Running => {
                let agent = Agent {
                    name: phase.name.to_string(),
                    instructions: system.unwrap_or_default(),
                    roster: tools,
                    json_output,
                };
                let mut input = running.to_vec();
                input.extend(user);

                let run = AgentRunner::new(self.chat.clone(), self.settings.chat_model.clone())
                    .temperature(self.settings.temperature)
                    .max_rounds(self.settings.max_tool_rounds)
                    .with_observer(self.observer.clone())
                    .run(&agent, &input)
                    .await?;

                Ok(PhaseRun {
                    input_list: Some(run.to_input_list(&input)),
                    content: run.final_output,
                    tool_outputs: run.tool_outputs,
                })
            }
        }
    }

    async fn synthesize(
        &self,
        system: &str,
        user: &str,
        vars: &HashMap<String, String>,
        trace: &[ToolInvocationRecord],
    ) -> Result<Vec<crate::llm::ContentBlock>> {
        let mut content = vec![InputBlock::Text {
            text: render(user, vars),
        }];
        content.extend(trace_documents(trace));
        log::info!(
            "Orchestrator: synthesizing from {} documents",
            content.len() - 1
        );

        self.documents
            .create_message(DocumentRequest {
                model: self.settings.citation_model.clone(),
                system: Some(render(system, vars)),
                content,
                temperature: Some(SYNTHESIS_TEMPERATURE),
                max_tokens: SYNTHESIS_MAX_TOKENS,
            })
            .await
            .context("Citation synthesis failed")
    }
}

fn base_vars(request: &ReportRequest, schema: String) -> HashMap<String, String> {
    let pdf_instruction = if request.pdf_file_ids.is_empty() {
        String::new()
    } else {
        format!(
            "\nThe following PDF file ids can be searched through to help generate your answer: {:?}\n",
            request.pdf_file_ids
        )
    };

    HashMap::from([
        ("question".to_string(), request.question.clone()),
        ("db_name".to_string(), request.db_name.clone()),
        ("schema".to_string(), schema),
        (
            "clarifications".to_string(),
            request.clarification_responses.clone(),
        ),
        ("pdf_instruction".to_string(), pdf_instruction),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custom_tools::CustomToolRecord;
    use crate::llm::{CompletionRequest, ContentBlock, Role};
    use crate::report::{prompts, Strategy};
    use crate::testing::{
        numbered_rows, sales_registry, tool_call, FakeChat, FakeDocumentModel, FakeExecutor,
        FakeMetadataStore, FakePdfStore, FakeSqlGenerator, FakeWebSearch,
    };
    use crate::tools::ToolOutput;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const QUESTION: &str = "What were total sales last month?";
    const SQL: &str = "SELECT day, SUM(amount) FROM sales GROUP BY day";

    struct StaticRegistry(anyhow::Result<Vec<CustomToolRecord>, String>);

    #[async_trait::async_trait]
    impl CustomToolRegistry for StaticRegistry {
        async fn enabled_tools(&self) -> Result<Vec<CustomToolRecord>> {
            self.0.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }

    fn request(strategy: Strategy) -> ReportRequest {
        ReportRequest {
            question: QUESTION.to_string(),
            db_name: "sales".to_string(),
            strategy,
            ..ReportRequest::default()
        }
    }

    fn orchestrator(chat: Arc<FakeChat>, documents: Arc<FakeDocumentModel>) -> Orchestrator {
        let generator = Arc::new(FakeSqlGenerator::new(vec![Ok(SQL)]));
        let executor = Arc::new(FakeExecutor::new().with(SQL, Ok(numbered_rows(10))));
        let databases = Arc::new(sales_registry());

        let tools = ToolKit {
            sql: Arc::new(TextToSqlTool::new(generator, databases.clone(), executor.clone())),
            web_search: Some(Arc::new(WebSearchTool::new(Arc::new(FakeWebSearch::answering(
                "answer",
                vec![],
            ))))),
            pdf_citations: Some(Arc::new(PdfCitationsTool::new(
                Arc::new(FakePdfStore::with(&[])),
                documents.clone(),
                "citation-model".to_string(),
            ))),
            custom: None,
        };

        Orchestrator::new(
            chat,
            documents,
            Arc::new(FakeMetadataStore),
            tools,
            ReportSettings {
                chat_model: "chat-model".to_string(),
                temperature: None,
                max_tool_rounds: 10,
                citation_model: "citation-model".to_string(),
            },
        )
    }

    fn sql_call(id: &str) -> Message {
        tool_call(
            id,
            "text_to_sql_tool",
            serde_json::json!({ "question": QUESTION, "db_name": "sales" }),
        )
    }

    fn last_is_tool_result(request: &CompletionRequest) -> bool {
        request.messages.last().map(|m| m.role) == Some(Role::Tool)
    }

    #[tokio::test]
    async fn test_single_pass_end_to_end() {
        let chat = Arc::new(FakeChat::scripted(vec![
            sql_call("call_1"),
            Message::assistant("# Sales report\nTotal sales were up."),
        ]));
        let documents = Arc::new(FakeDocumentModel::replying(vec![]));

        let result = orchestrator(chat.clone(), documents)
            .generate_report(&request(Strategy::SinglePass))
            .await;

        assert_eq!(result.report, "# Sales report\nTotal sales were up.");
        assert_eq!(result.sql_answers.len(), 1);
        assert_eq!(result.sql_answers[0].error, "");
        assert!(!result.sql_answers[0].truncated);
        assert_eq!(result.tool_outputs.len(), 1);
        assert_eq!(result.tool_call_count, 1);
        assert!(result.report_with_citations.is_none());

        let first = &chat.requests()[0];
        assert_eq!(first.model, "chat-model");
        assert_eq!(first.messages.len(), 1);
        let prompt = first.messages[0].content.as_deref().unwrap();
        assert!(prompt.contains(QUESTION));
        assert!(prompt.contains("CREATE TABLE sales"));
        let tools: Vec<&str> = first.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tools, vec!["text_to_sql_tool", "think_tool"]);
    }

    #[tokio::test]
    async fn test_single_pass_keeps_trace_when_model_overruns_rounds() {
        let chat = Arc::new(FakeChat::from_fn(|req| {
            if req.tools.is_empty() {
                Ok(Message::assistant("Report from what I have."))
            } else {
                Ok(tool_call("think", "think_tool", serde_json::json!({ "thought": "one more" })))
            }
        }));
        let documents = Arc::new(FakeDocumentModel::replying(vec![]));

        let result = orchestrator(chat.clone(), documents)
            .generate_report(&request(Strategy::SinglePass))
            .await;

        assert_eq!(result.report, "Report from what I have.");
        assert_eq!(result.tool_outputs.len(), 10);
        assert_eq!(result.tool_call_count, 10);
        assert_eq!(chat.requests().len(), 11);
    }

    #[tokio::test]
    async fn test_three_phase_synthesizes_with_citations() {
        let chat = Arc::new(FakeChat::scripted(vec![
            sql_call("call_1"),
            Message::assistant("Phase one findings"),
            Message::assistant("Phase two findings"),
        ]));
        let documents = Arc::new(FakeDocumentModel::replying(vec![
            ContentBlock::text("Sales "),
            ContentBlock::text("rose."),
        ]));

        let result = orchestrator(chat.clone(), documents.clone())
            .generate_report(&request(Strategy::ThreePhase))
            .await;

        assert_eq!(result.report, "Sales rose.");
        assert_eq!(result.report_with_citations.as_ref().map(Vec::len), Some(2));
        assert_eq!(result.sql_answers.len(), 1);

        let requests = chat.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].messages[0].role, Role::System);
        let evaluator_prompt = requests[2].messages[1].content.as_deref().unwrap();
        assert!(evaluator_prompt.contains("DATA ANALYSIS FINDINGS:\nPhase one findings"));

        let synthesis = documents.last_request().unwrap();
        assert_eq!(synthesis.model, "citation-model");
        assert_eq!(synthesis.max_tokens, 8191);
        assert_eq!(synthesis.temperature, Some(0.3));
        assert_eq!(synthesis.system.as_deref(), Some(prompts::SYNTHESIS_SYSTEM));
        assert_eq!(synthesis.content.len(), 2);
        let InputBlock::Text { text } = &synthesis.content[0] else {
            panic!("expected the prompt first");
        };
        assert!(text.contains("# Phase 1: Initial Data Analysis\nPhase one findings"));
        assert!(text.contains("# Phase 2: Follow-up Analysis and Gap Filling\nPhase two findings"));
        let InputBlock::Document { title, .. } = &synthesis.content[1] else {
            panic!("expected a document");
        };
        assert_eq!(
            title,
            &format!("text_to_sql_tool: {}", result.sql_answers[0].analysis_id)
        );
    }

    #[tokio::test]
    async fn test_agent_loop_stops_at_iteration_cap() {
        let evaluations = Arc::new(AtomicUsize::new(0));
        let counter = evaluations.clone();
        let chat = Arc::new(FakeChat::from_fn(move |req| {
            if req.json_output {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Message::assistant(
                    r#"{"further_research_needed": true, "explanation": "dig deeper"}"#,
                ))
            } else if req.tools.is_empty() {
                Ok(Message::assistant("Final report"))
            } else {
                Ok(Message::assistant("analysis"))
            }
        }));
        let documents = Arc::new(FakeDocumentModel::replying(vec![]));

        let result = orchestrator(chat.clone(), documents)
            .generate_report(&request(Strategy::AgentLoop))
            .await;

        assert_eq!(result.report, "Final report");
        assert_eq!(evaluations.load(Ordering::SeqCst), 20);

        let requests = chat.requests();
        let analyst_runs = requests
            .iter()
            .filter(|r| !r.json_output && !r.tools.is_empty())
            .count();
        assert_eq!(analyst_runs, 20);

        let report_request = requests.last().unwrap();
        assert!(report_request.tools.is_empty());
        let last_input = report_request.messages.last().unwrap();
        assert_eq!(last_input.content.as_deref(), Some(prompts::FINAL_REPORT_INSTRUCTION));
        let feedback = report_request
            .messages
            .iter()
            .filter(|m| m.content.as_deref() == Some("Feedback: dig deeper"))
            .count();
        assert_eq!(feedback, 19);
    }

    #[tokio::test]
    async fn test_agent_loop_counts_distinct_call_ids() {
        let evaluations = AtomicUsize::new(0);
        let chat = Arc::new(FakeChat::from_fn(move |req| {
            if req.json_output {
                let n = evaluations.fetch_add(1, Ordering::SeqCst);
                let more = n == 0;
                Ok(Message::assistant(format!(
                    r#"{{"further_research_needed": {}, "explanation": "check", "follow_up_questions": ["by region?"]}}"#,
                    more
                )))
            } else if req.tools.is_empty() {
                Ok(Message::assistant("Final report"))
            } else if last_is_tool_result(req) {
                Ok(Message::assistant("analysis"))
            } else {
                Ok(tool_call("shared", "think_tool", serde_json::json!({ "thought": "plan" })))
            }
        }));
        let documents = Arc::new(FakeDocumentModel::replying(vec![]));

        let result = orchestrator(chat.clone(), documents)
            .generate_report(&request(Strategy::AgentLoop))
            .await;

        assert_eq!(result.report, "Final report");
        assert_eq!(result.tool_outputs.len(), 2);
        assert_eq!(result.tool_call_count, 1);

        let report_request = chat.requests().last().cloned().unwrap();
        assert!(report_request.messages.iter().any(|m| m.content.as_deref()
            == Some("Feedback: check\nFollow-up questions: [\"by region?\"]")));
    }

    #[tokio::test]
    async fn test_raising_tool_degrades_every_strategy() {
        for (strategy, expected) in [
            (Strategy::SinglePass, "Error in generating report from question"),
            (Strategy::ThreePhase, "Error in multi-agent report generation: "),
            (Strategy::AgentLoop, "Error in generating report with agents"),
        ] {
            let chat = Arc::new(FakeChat::scripted(vec![
                sql_call("call_1"),
                tool_call(
                    "call_2",
                    "pdf_citations_tool",
                    serde_json::json!({ "question": "q", "pdf_files": ["missing"] }),
                ),
            ]));
            let documents = Arc::new(FakeDocumentModel::replying(vec![]));
            let mut req = request(strategy);
            req.pdf_file_ids = vec!["missing".to_string()];

            let result = orchestrator(chat, documents).generate_report(&req).await;

            assert!(result.report.starts_with(expected), "{}", result.report);
            assert!(result.sql_answers.is_empty());
            assert!(result.tool_outputs.is_empty());
            assert_eq!(result.tool_call_count, 0);
        }
    }

    #[tokio::test]
    async fn test_roster_follows_request() {
        let chat = Arc::new(FakeChat::scripted(vec![]));
        let documents = Arc::new(FakeDocumentModel::replying(vec![]));
        let mut orchestrator = orchestrator(chat, documents);
        orchestrator.tools.custom = Some(CustomToolSource {
            registry: Arc::new(StaticRegistry(Ok(vec![
                CustomToolRecord {
                    tool_name: "region_totals".to_string(),
                    tool_description: "Totals by region".to_string(),
                    input_model: None,
                    tool_code: "-- tool: region_totals\nSELECT region, SUM(amount) FROM sales GROUP BY region".to_string(),
                    is_enabled: true,
                },
                CustomToolRecord {
                    tool_name: "web_search_tool".to_string(),
                    tool_description: "shadow".to_string(),
                    input_model: None,
                    tool_code: "-- tool: web_search_tool\nSELECT 1".to_string(),
                    is_enabled: true,
                },
            ]))),
            helpers: ToolHelpers {
                databases: Arc::new(sales_registry()),
                executor: Arc::new(FakeExecutor::new()),
            },
        });

        let plain = orchestrator.build_roster(&request(Strategy::SinglePass)).await.unwrap();
        assert_eq!(plain.names(), vec!["text_to_sql_tool", "think_tool", "region_totals"]);

        let mut req = request(Strategy::SinglePass);
        req.use_websearch = true;
        req.pdf_file_ids = vec!["7".to_string()];
        let full = orchestrator.build_roster(&req).await.unwrap();
        assert_eq!(
            full.names(),
            vec![
                "text_to_sql_tool",
                "think_tool",
                "web_search_tool",
                "pdf_citations_tool",
                "region_totals"
            ]
        );
    }

    #[tokio::test]
    async fn test_registry_failure_degrades() {
        let chat = Arc::new(FakeChat::scripted(vec![Message::assistant("unused")]));
        let documents = Arc::new(FakeDocumentModel::replying(vec![]));
        let mut orchestrator = orchestrator(chat.clone(), documents);
        orchestrator.tools.custom = Some(CustomToolSource {
            registry: Arc::new(StaticRegistry(Err("registry offline".to_string()))),
            helpers: ToolHelpers {
                databases: Arc::new(sales_registry()),
                executor: Arc::new(FakeExecutor::new()),
            },
        });

        let result = orchestrator.generate_report(&request(Strategy::ThreePhase)).await;
        assert!(result.report.contains("registry offline"));
        assert!(chat.requests().is_empty());
    }

    #[tokio::test]
    async fn test_observer_sees_each_tool_call() {
        #[derive(Default)]
        struct Seen(Mutex<Vec<String>>);

        #[async_trait::async_trait]
        impl ToolObserver for Seen {
            async fn after_tool(&self, record: &ToolInvocationRecord) {
                if let ToolOutput::Sql(answer) = &record.result {
                    self.0.lock().unwrap().push(answer.question.clone());
                }
            }
        }

        let chat = Arc::new(FakeChat::scripted(vec![
            sql_call("call_1"),
            Message::assistant("done"),
        ]));
        let seen = Arc::new(Seen::default());
        let orchestrator = orchestrator(chat, Arc::new(FakeDocumentModel::replying(vec![])))
            .with_observer(seen.clone());

        orchestrator.generate_report(&request(Strategy::SinglePass)).await;
        assert_eq!(*seen.0.lock().unwrap(), vec![QUESTION.to_string()]);
    }
}
