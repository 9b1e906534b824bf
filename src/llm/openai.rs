use anyhow::{Context, Result};
use serde_json::Value;

use super::{
    ChatModel, CompletionRequest, Message, SearchCompletion, UrlCitation, WebSearchModel,
};

/// Shared HTTP client for OpenAI-compatible chat completion APIs.
///
/// Works against api.openai.com and against local servers that expose the
/// same `/chat/completions` route (Ollama, vLLM).
pub struct OpenAiClient {
    pub endpoint: String,
    api_key: String,
    search_model: String,
    search_context_size: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            search_model: "gpt-4o-search-preview".to_string(),
            search_context_size: "high".to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_search(mut self, model: String, context_size: String) -> Self {
        self.search_model = model;
        self.search_context_size = context_size;
        self
    }

    async fn post_chat(&self, body: &Value) -> Result<Value> {
        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .json(body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .context("Failed to send request to chat completion API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error ({}): {}", status, error_text);
        }

        response
            .json()
            .await
            .context("Failed to parse chat completion response")
    }
}

#[async_trait::async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Message> {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
        });

        if !request.tools.is_empty() {
            body["tools"] = request.tools.iter().map(|t| t.to_openai()).collect();
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if request.json_output {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        let response_json = self.post_chat(&body).await?;
        let message = response_json["choices"][0]["message"].clone();
        if message.is_null() {
            anyhow::bail!("No message in chat completion response");
        }

        serde_json::from_value(message).context("Malformed assistant message")
    }
}

#[async_trait::async_trait]
impl WebSearchModel for OpenAiClient {
    async fn search(&self, question: &str) -> Result<SearchCompletion> {
        let body = serde_json::json!({
            "model": self.search_model,
            "web_search_options": {
                "search_context_size": self.search_context_size,
            },
            "messages": [
                { "role": "user", "content": question }
            ]
        });

        let response_json = self.post_chat(&body).await?;
        let message = &response_json["choices"][0]["message"];

        let content = message["content"]
            .as_str()
            .context("No content in search response")?
            .to_string();

        let citations = message["annotations"]
            .as_array()
            .map(|annotations| {
                annotations
                    .iter()
                    .filter(|a| a["type"] == "url_citation")
                    .map(|a| UrlCitation {
                        title: a["url_citation"]["title"].as_str().unwrap_or_default().to_string(),
                        url: a["url_citation"]["url"].as_str().unwrap_or_default().to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(SearchCompletion { content, citations })
    }
}
