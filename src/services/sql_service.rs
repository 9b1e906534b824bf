use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// Turns a natural-language question into SQL for a registered database.
#[async_trait::async_trait]
pub trait SqlGenerator: Send + Sync {
    /// Returns the generated SQL, or the service's error message as `Err`.
    async fn generate(&self, question: &str, db_name: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    sql: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for an HTTP SQL-generation service.
///
/// Request body: `{"question": ..., "db_name": ...}`.
/// Response body: `{"sql": ...}` or `{"error": ...}`.
pub struct HttpSqlGenerator {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpSqlGenerator {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build SQL service client")?;
        Ok(Self { endpoint, client })
    }
}

#[async_trait::async_trait]
impl SqlGenerator for HttpSqlGenerator {
    async fn generate(&self, question: &str, db_name: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({
                "question": question,
                "db_name": db_name,
            }))
            .send()
            .await
            .context("Failed to reach SQL generation service")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("SQL service error ({}): {}", status, error_text);
        }

        let body: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse SQL service response")?;

        if let Some(error) = body.error.filter(|e| !e.is_empty()) {
            anyhow::bail!(error);
        }

        body.sql
            .filter(|sql| !sql.trim().is_empty())
            .context("SQL service returned no SQL")
    }
}
