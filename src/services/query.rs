use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde_json::{Map, Number, Value};
use std::collections::HashSet;

use super::DatabaseEntry;

/// Decimal places kept for floating-point cells.
const FLOAT_PRECISION: i32 = 4;

/// One value of a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Text cells holding an ISO date or timestamp become date cells, so they
    /// serialise in one canonical format whatever the engine stored.
    pub fn from_text(text: String) -> Self {
        for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(ts) = NaiveDateTime::parse_from_str(&text, fmt) {
                return Self::DateTime(ts);
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(&text, "%Y-%m-%d") {
            return Self::Date(date);
        }
        Self::Text(text)
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => {
                let scale = 10f64.powi(FLOAT_PRECISION);
                let rounded = if (f.abs() * scale).is_finite() {
                    (f * scale).round() / scale
                } else {
                    *f
                };
                Number::from_f64(rounded)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
            Self::Text(s) => Value::String(s.clone()),
            Self::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            Self::DateTime(ts) => Value::String(ts.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()),
        }
    }

    fn from_sqlite(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(i) => Self::Int(i),
            ValueRef::Real(f) => Self::Float(f),
            ValueRef::Text(bytes) => Self::from_text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Self::Text(format!("<{} bytes>", bytes.len())),
        }
    }
}

/// Column names plus row tuples, as returned by a query engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keep the first `max_rows` rows. Returns true when rows were dropped.
    pub fn truncate(&mut self, max_rows: usize) -> bool {
        if self.rows.len() > max_rows {
            self.rows.truncate(max_rows);
            true
        } else {
            false
        }
    }

    /// Rename repeated column names to `name_1`, `name_2`, ... so that
    /// records keyed by column do not overwrite each other.
    pub fn dedup_columns(&mut self) {
        let mut taken: HashSet<String> = HashSet::new();
        for column in self.columns.iter_mut() {
            if taken.insert(column.clone()) {
                continue;
            }
            let mut n = 1;
            let renamed = loop {
                let candidate = format!("{}_{}", column, n);
                if !taken.contains(&candidate) {
                    break candidate;
                }
                n += 1;
            };
            taken.insert(renamed.clone());
            *column = renamed;
        }
    }

    /// Serialise rows as a JSON array of `{column: value}` records.
    pub fn to_records_json(&self) -> String {
        let records: Vec<Value> = self
            .rows
            .iter()
            .map(|row| {
                let record: Map<String, Value> = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().map(Cell::to_json))
                    .collect();
                Value::Object(record)
            })
            .collect();
        Value::Array(records).to_string()
    }
}

/// Runs SQL against a registered database.
#[async_trait::async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, db: &DatabaseEntry, sql: &str) -> Result<QueryResult>;
}

/// Executor for databases reachable from this host. SQLite files are opened
/// read-only; other engines are reported as unsupported.
#[derive(Debug, Default)]
pub struct LocalQueryExecutor;

impl LocalQueryExecutor {
    pub fn new() -> Self {
        Self
    }

    fn run_sqlite(path: String, sql: String) -> Result<QueryResult> {
        let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("Failed to open SQLite database {}", path))?;

        let mut stmt = conn.prepare(&sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                cells.push(Cell::from_sqlite(row.get_ref(i)?));
            }
            rows.push(cells);
        }

        Ok(QueryResult { columns, rows })
    }
}

#[async_trait::async_trait]
impl QueryExecutor for LocalQueryExecutor {
    async fn execute(&self, db: &DatabaseEntry, sql: &str) -> Result<QueryResult> {
        match db.db_type.as_str() {
            "sqlite" => {
                let path = db.creds["path"]
                    .as_str()
                    .with_context(|| format!("Database '{}' has no sqlite path in creds", db.name))?
                    .to_string();
                let sql = sql.to_string();
                tokio::task::spawn_blocking(move || Self::run_sqlite(path, sql))
                    .await
                    .context("Query task panicked")?
            }
            other => anyhow::bail!("db_type '{}' is not supported by this executor", other),
        }
    }
}
