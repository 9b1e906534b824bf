use anyhow::{Context, Result};

use super::{ContentBlock, DocumentModel, DocumentRequest};

const API_VERSION: &str = "2023-06-01";

/// HTTP client for the Anthropic messages API, used for document citations.
pub struct AnthropicClient {
    pub endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl DocumentModel for AnthropicClient {
    async fn create_message(&self, request: DocumentRequest) -> Result<Vec<ContentBlock>> {
        let mut body = serde_json::json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "messages": [
                { "role": "user", "content": request.content }
            ]
        });

        if let Some(system) = &request.system {
            body["system"] = serde_json::json!(system);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }

        let response = self
            .client
            .post(format!("{}/messages", self.endpoint))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Anthropic")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API error ({}): {}", status, error_text);
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse Anthropic response")?;

        let content = response_json
            .get("content")
            .cloned()
            .context("No content in Anthropic response")?;

        serde_json::from_value(content).context("Malformed content blocks in Anthropic response")
    }
}
