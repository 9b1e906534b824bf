use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use super::{Tool, ToolError};
use crate::services::{DatabaseRegistry, QueryExecutor, QueryResult, SqlGenerator};

/// Largest result set handed back to the model.
pub const MAX_ROWS_DISPLAYED: usize = 50;

pub const TOOL_NAME: &str = "text_to_sql_tool";

pub const NO_DATA_GUIDANCE: &str = "No data retrieved. Consider rephrasing the question or generating a new question. Pay close attention to column names and column descriptions in the database schema to ensure you are fetching the right data. If necessary, first retrieve the unique values of the column(s) or first few rows of the table to better understand the data.";

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerQuestionFromDatabaseInput {
    pub question: String,
    pub db_name: String,
}

/// Answer to one database question.
///
/// A non-empty `error` means `rows` must not be used, even when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlAnswer {
    pub analysis_id: Uuid,
    pub question: String,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Option<String>,
    #[serde(default)]
    pub truncated: bool,
    #[serde(default)]
    pub error: String,
}

impl SqlAnswer {
    fn failed(question: &str, sql: Option<String>, error: String) -> Self {
        log::error!("SqlTool: {}", error);
        Self {
            analysis_id: Uuid::new_v4(),
            question: question.to_string(),
            sql,
            columns: Vec::new(),
            rows: None,
            truncated: false,
            error,
        }
    }

    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// Rows that downstream consumers may rely on.
    pub fn usable_rows(&self) -> Option<&str> {
        if self.has_error() {
            None
        } else {
            self.rows.as_deref()
        }
    }
}

/// A result set capped for display.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayTable {
    pub columns: Vec<String>,
    pub rows_json: String,
    pub truncated: bool,
}

impl DisplayTable {
    pub fn from_result(mut result: QueryResult) -> Self {
        result.dedup_columns();
        let truncated = result.truncate(MAX_ROWS_DISPLAYED);
        Self {
            rows_json: result.to_records_json(),
            columns: result.columns,
            truncated,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows_json == "[]"
    }
}

fn aggregation_instruction() -> String {
    format!(
        " Aggregate or limit the data appropriately or place the data in meaningful buckets such that the result is within a reasonable size (max {} rows) and useful for analysis.",
        MAX_ROWS_DISPLAYED
    )
}

fn log_preview(label: &str, result: &QueryResult, max_rows: usize) {
    if log::log_enabled!(log::Level::Debug) {
        log::debug!("SqlTool: {} column names: {:?}", label, result.columns);
        for row in result.rows.iter().take(max_rows) {
            log::debug!("SqlTool: {} row: {:?}", label, row);
        }
    }
}

/// Generates SQL for a single question, runs it, and returns the rows.
pub struct TextToSqlTool {
    generator: Arc<dyn SqlGenerator>,
    databases: Arc<DatabaseRegistry>,
    executor: Arc<dyn QueryExecutor>,
}

impl TextToSqlTool {
    pub fn new(
        generator: Arc<dyn SqlGenerator>,
        databases: Arc<DatabaseRegistry>,
        executor: Arc<dyn QueryExecutor>,
    ) -> Self {
        Self {
            generator,
            databases,
            executor,
        }
    }

    pub async fn answer(&self, question: &str, db_name: &str) -> SqlAnswer {
        log::info!("SqlTool: question for database {}: {}", db_name, question);

        let sql = match self.generator.generate(question, db_name).await {
            Ok(sql) => sql,
            Err(e) => {
                return SqlAnswer::failed(question, None, format!("Error generating SQL: {:#}.", e))
            }
        };

        let Some(db) = self.databases.get(db_name) else {
            return SqlAnswer::failed(
                question,
                Some(sql),
                format!(
                    "Database '{}' not found. Check if the database name is correct or if credentials have been configured.",
                    db_name
                ),
            );
        };

        let result = match self.executor.execute(db, &sql).await {
            Ok(result) => result,
            Err(e) => {
                return SqlAnswer::failed(
                    question,
                    Some(sql),
                    format!(
                        "Error executing SQL: {:#}. Rephrase the question by incorporating specific details of the error to address it.",
                        e
                    ),
                )
            }
        };
        log_preview("primary", &result, 20);

        let (sql, result) = if result.len() > MAX_ROWS_DISPLAYED {
            log::info!(
                "SqlTool: {} rows returned, regenerating an aggregated query",
                result.len()
            );
            let agg_question = format!("{}{}", question, aggregation_instruction());

            let agg_sql = match self.generator.generate(&agg_question, db_name).await {
                Ok(sql) => sql,
                Err(e) => {
                    return SqlAnswer::failed(
                        question,
                        None,
                        format!("Error generating aggregate SQL: {:#}.", e),
                    )
                }
            };

            let agg_result = match self.executor.execute(db, &agg_sql).await {
                Ok(result) => result,
                Err(e) => {
                    return SqlAnswer::failed(
                        question,
                        Some(agg_sql),
                        format!(
                            "Error executing aggregate SQL: {:#}. Rephrase the question by incorporating specific details of the error to address it.",
                            e
                        ),
                    )
                }
            };
            log_preview("aggregate", &agg_result, 5);
            (agg_sql, agg_result)
        } else {
            (sql, result)
        };

        let table = DisplayTable::from_result(result);
        let error = if table.is_empty() {
            NO_DATA_GUIDANCE.to_string()
        } else {
            String::new()
        };

        SqlAnswer {
            analysis_id: Uuid::new_v4(),
            question: question.to_string(),
            sql: Some(sql),
            columns: table.columns,
            rows: Some(table.rows_json),
            truncated: table.truncated,
            error,
        }
    }
}

#[async_trait::async_trait]
impl Tool for TextToSqlTool {
    type Input = AnswerQuestionFromDatabaseInput;
    type Output = super::ToolOutput;

    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Given a *single* question for a *single* database, generate a SQL query to answer the question, execute it on the database and return the results. IMPORTANT: this tool only takes a single question. Do not try to handle multiple questions in the same call."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "One question to answer from the database"
                },
                "db_name": {
                    "type": "string",
                    "description": "Name of the database to query"
                }
            },
            "required": ["question", "db_name"]
        })
    }

    async fn run(&self, input: AnswerQuestionFromDatabaseInput) -> Result<super::ToolOutput, ToolError> {
        Ok(super::ToolOutput::Sql(
            self.answer(&input.question, &input.db_name).await,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Cell;
    use crate::testing::{numbered_rows, sales_registry, FakeExecutor, FakeSqlGenerator};

    fn tool(generator: &Arc<FakeSqlGenerator>, executor: FakeExecutor) -> TextToSqlTool {
        TextToSqlTool::new(generator.clone(), Arc::new(sales_registry()), Arc::new(executor))
    }

    fn row_count(answer: &SqlAnswer) -> usize {
        let rows: Vec<Value> = serde_json::from_str(answer.rows.as_deref().unwrap()).unwrap();
        rows.len()
    }

    #[tokio::test]
    async fn test_small_result_is_returned_as_is() {
        let generator = Arc::new(FakeSqlGenerator::new(vec![Ok("SELECT * FROM sales")]));
        let executor = FakeExecutor::new().with("SELECT * FROM sales", Ok(numbered_rows(10)));

        let answer = tool(&generator, executor).answer("What were total sales last month?", "sales").await;

        assert_eq!(answer.error, "");
        assert!(!answer.truncated);
        assert_eq!(answer.sql.as_deref(), Some("SELECT * FROM sales"));
        assert_eq!(answer.columns, vec!["n", "amount"]);
        assert_eq!(row_count(&answer), 10);
        assert_eq!(generator.questions().len(), 1);
    }

    #[tokio::test]
    async fn test_large_result_is_replaced_by_aggregate() {
        let generator = Arc::new(FakeSqlGenerator::new(vec![
            Ok("SELECT * FROM sales"),
            Ok("SELECT region, SUM(amount) FROM sales GROUP BY region"),
        ]));
        let executor = FakeExecutor::new()
            .with("SELECT * FROM sales", Ok(numbered_rows(120)))
            .with(
                "SELECT region, SUM(amount) FROM sales GROUP BY region",
                Ok(numbered_rows(12)),
            );

        let answer = tool(&generator, executor).answer("Sales by day", "sales").await;

        assert_eq!(answer.error, "");
        assert!(!answer.truncated);
        assert_eq!(
            answer.sql.as_deref(),
            Some("SELECT region, SUM(amount) FROM sales GROUP BY region")
        );
        assert_eq!(row_count(&answer), 12);

        let questions = generator.questions();
        assert_eq!(questions[0], "Sales by day");
        assert!(questions[1].starts_with("Sales by day Aggregate or limit the data"));
        assert!(questions[1].contains("max 50 rows"));
    }

    #[tokio::test]
    async fn test_large_aggregate_is_truncated_to_cap() {
        let generator = Arc::new(FakeSqlGenerator::new(vec![
            Ok("SELECT * FROM sales"),
            Ok("SELECT day, SUM(amount) FROM sales GROUP BY day"),
        ]));
        let executor = FakeExecutor::new()
            .with("SELECT * FROM sales", Ok(numbered_rows(500)))
            .with(
                "SELECT day, SUM(amount) FROM sales GROUP BY day",
                Ok(numbered_rows(80)),
            );

        let answer = tool(&generator, executor).answer("Daily sales", "sales").await;

        assert!(answer.truncated);
        assert_eq!(row_count(&answer), MAX_ROWS_DISPLAYED);
        assert_eq!(
            answer.sql.as_deref(),
            Some("SELECT day, SUM(amount) FROM sales GROUP BY day")
        );
        assert_eq!(answer.error, "");
    }

    #[tokio::test]
    async fn test_execution_failure_keeps_sql_and_drops_rows() {
        let generator = Arc::new(FakeSqlGenerator::new(vec![Ok("SELECT nope FROM sales")]));
        let executor = FakeExecutor::new()
            .with("SELECT nope FROM sales", Err("no such column: nope"));

        let answer = tool(&generator, executor).answer("Broken", "sales").await;

        assert!(answer.error.starts_with("Error executing SQL: no such column: nope."));
        assert!(answer.error.contains("Rephrase the question"));
        assert_eq!(answer.sql.as_deref(), Some("SELECT nope FROM sales"));
        assert!(answer.rows.is_none());
        assert!(answer.usable_rows().is_none());
    }

    #[tokio::test]
    async fn test_aggregate_failure_does_not_fall_back() {
        let generator = Arc::new(FakeSqlGenerator::new(vec![
            Ok("SELECT * FROM sales"),
            Ok("SELECT bad"),
        ]));
        let executor = FakeExecutor::new()
            .with("SELECT * FROM sales", Ok(numbered_rows(60)))
            .with("SELECT bad", Err("syntax error"));

        let answer = tool(&generator, executor).answer("Everything", "sales").await;

        assert!(answer.error.starts_with("Error executing aggregate SQL: syntax error."));
        assert_eq!(answer.sql.as_deref(), Some("SELECT bad"));
        assert!(answer.rows.is_none());
    }

    #[tokio::test]
    async fn test_aggregate_generation_failure_is_returned() {
        let generator = Arc::new(FakeSqlGenerator::new(vec![
            Ok("SELECT * FROM sales"),
            Err("service timeout"),
        ]));
        let executor = FakeExecutor::new().with("SELECT * FROM sales", Ok(numbered_rows(60)));

        let answer = tool(&generator, executor).answer("Everything", "sales").await;

        assert!(answer.error.starts_with("Error generating aggregate SQL"));
        assert_eq!(answer.error, "Error generating aggregate SQL: service timeout.");
        assert!(answer.sql.is_none());
        assert!(answer.rows.is_none());
        assert!(answer.has_error());

        let questions = generator.questions();
        assert_eq!(questions.len(), 2);
        assert!(questions[1].starts_with("Everything Aggregate or limit"));
    }

    #[tokio::test]
    async fn test_empty_result_sets_guidance() {
        let generator = Arc::new(FakeSqlGenerator::new(vec![Ok("SELECT * FROM sales WHERE 0")]));
        let executor = FakeExecutor::new().with(
            "SELECT * FROM sales WHERE 0",
            Ok(QueryResult {
                columns: vec!["amount".to_string()],
                rows: vec![],
            }),
        );

        let answer = tool(&generator, executor).answer("Nothing", "sales").await;

        assert_eq!(answer.rows.as_deref(), Some("[]"));
        assert_eq!(answer.error, NO_DATA_GUIDANCE);
        assert!(!answer.truncated);
    }

    #[tokio::test]
    async fn test_generation_and_lookup_failures() {
        let generator = Arc::new(FakeSqlGenerator::new(vec![Err("model offline")]));
        let answer = tool(&generator, FakeExecutor::new()).answer("q", "sales").await;
        assert_eq!(answer.error, "Error generating SQL: model offline.");
        assert!(answer.sql.is_none());

        let generator = Arc::new(FakeSqlGenerator::new(vec![Ok("SELECT 1")]));
        let answer = tool(&generator, FakeExecutor::new()).answer("q", "hr").await;
        assert!(answer.error.starts_with("Database 'hr' not found."));
    }

    #[tokio::test]
    async fn test_duplicate_columns_are_renamed() {
        let generator = Arc::new(FakeSqlGenerator::new(vec![Ok("SELECT a.id, b.id FROM a, b")]));
        let executor = FakeExecutor::new().with(
            "SELECT a.id, b.id FROM a, b",
            Ok(QueryResult {
                columns: vec!["id".to_string(), "id".to_string()],
                rows: vec![vec![Cell::Int(1), Cell::Int(2)]],
            }),
        );

        let answer = tool(&generator, executor).answer("ids", "sales").await;
        assert_eq!(answer.columns, vec!["id", "id_1"]);
        assert_eq!(answer.rows.as_deref(), Some(r#"[{"id":1,"id_1":2}]"#));
    }

    #[tokio::test]
    async fn test_runs_through_roster_interface() {
        use crate::tools::RosterTool;

        let generator = Arc::new(FakeSqlGenerator::new(vec![Ok("SELECT * FROM sales")]));
        let executor = FakeExecutor::new().with("SELECT * FROM sales", Ok(numbered_rows(3)));
        let tool = tool(&generator, executor);

        let out = tool
            .invoke(serde_json::json!({ "question": "q", "db_name": "sales" }))
            .await
            .unwrap();
        assert!(matches!(out, crate::tools::ToolOutput::Sql(ref a) if a.error.is_empty()));

        let err = tool.invoke(serde_json::json!({ "question": "q" })).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput { .. }));
    }
}
