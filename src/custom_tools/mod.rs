//! Operator-registered tools.
//!
//! A custom tool is a record in a registry file whose code holds one or more
//! named SQL query blocks (see [`template`]). Enabled records are linted,
//! parsed and bound to a block each time a report runs, so registry edits
//! take effect without a restart.

pub mod lint;
pub mod template;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::services::{DatabaseRegistry, QueryExecutor};
use crate::tools::text_to_sql::{DisplayTable, NO_DATA_GUIDANCE};
use crate::tools::{Tool, ToolError, ToolOutput};
use lint::ValidationError;
use template::{QueryBlock, TemplateError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomToolRecord {
    pub tool_name: String,
    pub tool_description: String,
    /// JSON schema of the tool input. Derived from the placeholders when absent.
    #[serde(default)]
    pub input_model: Option<String>,
    pub tool_code: String,
    #[serde(default = "enabled_by_default")]
    pub is_enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// Storage for custom tool records.
#[async_trait::async_trait]
pub trait CustomToolRegistry: Send + Sync {
    async fn enabled_tools(&self) -> Result<Vec<CustomToolRecord>>;
}

#[derive(Debug, Default, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    tools: Vec<CustomToolRecord>,
}

/// Registry kept in a YAML file with a top-level `tools:` list.
pub struct YamlToolRegistry {
    path: PathBuf,
}

impl YamlToolRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl CustomToolRegistry for YamlToolRegistry {
    async fn enabled_tools(&self) -> Result<Vec<CustomToolRecord>> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            log::debug!("CustomTools: no registry at {}", self.path.display());
            return Ok(Vec::new());
        }

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read tool registry {}", self.path.display()))?;
        let file: RegistryFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse tool registry {}", self.path.display()))?;

        Ok(file.tools.into_iter().filter(|t| t.is_enabled).collect())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("unsafe code: {0}")]
    Unsafe(#[from] ValidationError),
    #[error("invalid query blocks: {0}")]
    Template(#[from] TemplateError),
    #[error("input_model is not a JSON schema object: {0}")]
    InputModel(String),
    #[error("name is already used by another tool")]
    NameTaken,
}

/// Services a custom tool can reach.
#[derive(Clone)]
pub struct ToolHelpers {
    pub databases: Arc<DatabaseRegistry>,
    pub executor: Arc<dyn QueryExecutor>,
}

#[derive(Default)]
pub struct LoadReport {
    pub loaded: Vec<Arc<CustomTool>>,
    pub rejected: Vec<(String, LoadError)>,
}

/// Build tools from registry records. A record that fails any check is
/// logged and skipped; the rest still load.
pub fn load_custom_tools(
    records: Vec<CustomToolRecord>,
    helpers: &ToolHelpers,
    reserved: &[&str],
) -> LoadReport {
    let mut report = LoadReport::default();

    for record in records {
        let name = record.tool_name.clone();
        let taken = reserved.contains(&name.as_str())
            || report.loaded.iter().any(|t| t.name == name);

        let result = if taken {
            Err(LoadError::NameTaken)
        } else {
            CustomTool::from_record(record, helpers.clone())
        };

        match result {
            Ok(tool) => {
                log::info!("CustomTools: loaded {} (query block {})", name, tool.block.name);
                report.loaded.push(Arc::new(tool));
            }
            Err(e) => {
                log::error!("CustomTools: tool {} will not be loaded: {}", name, e);
                report.rejected.push((name, e));
            }
        }
    }

    report
}

/// A query block exposed as a tool. Calls take `db_name` plus one value per
/// placeholder.
pub struct CustomTool {
    name: String,
    description: String,
    parameters: Value,
    block: QueryBlock,
    helpers: ToolHelpers,
}

impl CustomTool {
    pub fn from_record(record: CustomToolRecord, helpers: ToolHelpers) -> Result<Self, LoadError> {
        lint::validate(&record.tool_code)?;

        let blocks = template::parse_blocks(&record.tool_code)?;
        let block = match blocks.iter().position(|b| b.name == record.tool_name) {
            Some(pos) => blocks[pos].clone(),
            None => {
                log::warn!(
                    "CustomTools: no query block named {}, using {}",
                    record.tool_name,
                    blocks[0].name
                );
                blocks[0].clone()
            }
        };

        let parameters = match record.input_model.as_deref().map(str::trim) {
            Some(schema) if !schema.is_empty() => with_db_name(
                serde_json::from_str(schema).map_err(|e| LoadError::InputModel(e.to_string()))?,
            )?,
            _ => derived_schema(&block),
        };

        Ok(Self {
            name: record.tool_name,
            description: record.tool_description,
            parameters,
            block,
            helpers,
        })
    }

    pub fn block_name(&self) -> &str {
        &self.block.name
    }

    fn answer(&self, analysis_id: Uuid, sql: Option<&str>, table: Option<DisplayTable>, error: String) -> ToolOutput {
        let (columns, rows, truncated) = match table {
            Some(t) => (t.columns, Some(t.rows_json), t.truncated),
            None => (Vec::new(), None, false),
        };
        ToolOutput::Custom(serde_json::json!({
            "analysis_id": analysis_id.to_string(),
            "tool_name": self.name,
            "sql": sql,
            "columns": columns,
            "rows": rows,
            "truncated": truncated,
            "error": error,
        }))
    }
}

fn derived_schema(block: &QueryBlock) -> Value {
    let mut properties = Map::new();
    properties.insert(
        "db_name".to_string(),
        serde_json::json!({ "type": "string", "description": "Name of the database to query" }),
    );
    let mut required = vec![Value::from("db_name")];
    for param in block.params() {
        properties.insert(
            param.clone(),
            serde_json::json!({ "description": format!("Value for :{}", param) }),
        );
        required.push(Value::from(param));
    }
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn with_db_name(mut schema: Value) -> Result<Value, LoadError> {
    let Some(obj) = schema.as_object_mut() else {
        return Err(LoadError::InputModel("expected an object".to_string()));
    };
    let properties = obj
        .entry("properties")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Some(props) = properties.as_object_mut() {
        props.entry("db_name").or_insert_with(
            || serde_json::json!({ "type": "string", "description": "Name of the database to query" }),
        );
    }
    let required = obj
        .entry("required")
        .or_insert_with(|| Value::Array(Vec::new()));
    let Some(required) = required.as_array_mut() else {
        return Err(LoadError::InputModel("required must be an array".to_string()));
    };
    if !required.iter().any(|name| name == "db_name") {
        required.insert(0, Value::from("db_name"));
    }
    Ok(schema)
}

#[async_trait::async_trait]
impl Tool for CustomTool {
    type Input = Value;
    type Output = ToolOutput;

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn run(&self, input: Value) -> Result<ToolOutput, ToolError> {
        let invalid = |message: String| ToolError::InvalidInput {
            tool: self.name.clone(),
            message,
        };

        let Value::Object(mut args) = input else {
            return Err(invalid("expected a JSON object".to_string()));
        };
        let db_name = match args.remove("db_name") {
            Some(Value::String(db)) => db,
            _ => return Err(invalid("missing string field db_name".to_string())),
        };
        let sql = self.block.render(&args).map_err(|e| invalid(e.to_string()))?;
        let analysis_id = Uuid::new_v4();

        log::info!("CustomTools: {} on {}", self.name, db_name);

        let Some(db) = self.helpers.databases.get(&db_name) else {
            let error = format!("Database '{}' not found.", db_name);
            log::error!("CustomTools: {}: {}", self.name, error);
            return Ok(self.answer(analysis_id, Some(&sql), None, error));
        };

        match self.helpers.executor.execute(db, &sql).await {
            Ok(result) => {
                let table = DisplayTable::from_result(result);
                let error = if table.is_empty() {
                    NO_DATA_GUIDANCE.to_string()
                } else {
                    String::new()
                };
                Ok(self.answer(analysis_id, Some(&sql), Some(table), error))
            }
            Err(e) => {
                let error = format!("Error executing SQL: {:#}.", e);
                log::error!("CustomTools: {}: {}", self.name, error);
                Ok(self.answer(analysis_id, Some(&sql), None, error))
            }
        }
    }
}
