use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::DatabaseRegistry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
    #[serde(default)]
    pub column_description: Option<String>,
}

/// Source of per-database column metadata.
#[async_trait::async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get_metadata(&self, db_name: &str) -> Result<Vec<ColumnMetadata>>;
}

/// Reads each database's metadata from the YAML file named in its registry
/// entry: a list of `{table_name, column_name, data_type, column_description}`.
pub struct FileMetadataStore {
    databases: Arc<DatabaseRegistry>,
}

impl FileMetadataStore {
    pub fn new(databases: Arc<DatabaseRegistry>) -> Self {
        Self { databases }
    }
}

#[async_trait::async_trait]
impl MetadataStore for FileMetadataStore {
    async fn get_metadata(&self, db_name: &str) -> Result<Vec<ColumnMetadata>> {
        let entry = self
            .databases
            .get(db_name)
            .with_context(|| format!("Database '{}' is not registered", db_name))?;

        let Some(path) = &entry.metadata_file else {
            log::warn!("Metadata: no metadata file configured for {}", db_name);
            return Ok(Vec::new());
        };

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read metadata file {}", path.display()))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse metadata file {}", path.display()))
    }
}

/// Render metadata as `CREATE TABLE` statements, tables in first-seen order,
/// with column descriptions as trailing comments.
pub fn mk_create_ddl(metadata: &[ColumnMetadata]) -> String {
    let mut tables: Vec<(&str, Vec<&ColumnMetadata>)> = Vec::new();
    for column in metadata {
        match tables.iter().position(|(name, _)| *name == column.table_name) {
            Some(pos) => tables[pos].1.push(column),
            None => tables.push((&column.table_name, vec![column])),
        }
    }

    let mut ddl = String::new();
    for (table, columns) in tables {
        ddl.push_str(&format!("CREATE TABLE {} (\n", table));
        for (i, column) in columns.iter().enumerate() {
            ddl.push_str(&format!("  {} {}", column.column_name, column.data_type));
            if i + 1 < columns.len() {
                ddl.push(',');
            }
            if let Some(desc) = column.column_description.as_deref().filter(|d| !d.is_empty()) {
                ddl.push_str(&format!(" --{}", desc));
            }
            ddl.push('\n');
        }
        ddl.push_str(");\n");
    }
    ddl
}
