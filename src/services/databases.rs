use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;

/// A registered database: its engine, connection credentials and the file
/// holding its column metadata.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DatabaseEntry {
    pub name: String,
    pub db_type: String,
    #[serde(default)]
    pub creds: Value,
    #[serde(default)]
    pub metadata_file: Option<PathBuf>,
}

/// Lookup table of registered databases, by name.
#[derive(Debug, Clone, Default)]
pub struct DatabaseRegistry {
    entries: Vec<DatabaseEntry>,
}

impl DatabaseRegistry {
    pub fn new(entries: Vec<DatabaseEntry>) -> Self {
        Self { entries }
    }

    pub fn get(&self, db_name: &str) -> Option<&DatabaseEntry> {
        self.entries.iter().find(|e| e.name == db_name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }
}
