use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::llm::session::DEFAULT_MAX_TOOL_ROUNDS;
use crate::services::DatabaseEntry;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    #[serde(default)]
    pub web_search: WebSearchConfig,
    pub citations: CitationsConfig,
    pub sql_service: SqlServiceConfig,
    #[serde(default)]
    pub databases: Vec<DatabaseEntry>,
    #[serde(default)]
    pub pdf: PdfConfig,
    #[serde(default)]
    pub custom_tools: CustomToolsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// OpenAI-compatible chat endpoint used by every report session.
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebSearchConfig {
    pub enabled: bool,
    pub model: String,
    pub search_context_size: String,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "gpt-4o-search-preview".to_string(),
            search_context_size: "high".to_string(),
        }
    }
}

/// Anthropic messages endpoint for cited synthesis and PDF search.
#[derive(Debug, Deserialize, Clone)]
pub struct CitationsConfig {
    pub endpoint: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SqlServiceConfig {
    pub endpoint: String,
    #[serde(default = "default_sql_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PdfConfig {
    pub dir: PathBuf,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./pdfs"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CustomToolsConfig {
    pub enabled: bool,
    pub registry_file: PathBuf,
}

impl Default for CustomToolsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            registry_file: PathBuf::from("./custom_tools.yaml"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn default_max_tool_rounds() -> usize {
    DEFAULT_MAX_TOOL_ROUNDS
}

fn default_sql_timeout() -> u64 {
    120
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).with_context(|| {
            format!(
                "Failed to read config file {}. Make sure it exists.",
                path.display()
            )
        })?;

        let mut config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override secrets and endpoints with environment variables if set
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            self.citations.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("SQL_SERVICE_URL") {
            self.sql_service.endpoint = url;
        }
    }
}
