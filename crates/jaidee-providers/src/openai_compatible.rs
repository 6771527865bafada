//! OpenAI-compatible chat completions.
//!
//! One struct for every provider that speaks the `/chat/completions`
//! protocol. Providers are distinguished only by base URL and API key.

use async_trait::async_trait;
use jaidee_core::config::LlmConfig;
use jaidee_core::error::{JaideeError, Result};
use jaidee_core::traits::{CompletionOptions, TextCompletion};
use jaidee_core::types::ChatMessage;
use serde_json::{Value, json};
use std::time::Duration;

pub struct OpenAiCompatibleCompletion {
    /// Provider name, derived from the host (e.g. "deepseek").
    name: String,
    api_key: String,
    /// Base URL without trailing slash.
    base_url: String,
    chat_path: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleCompletion {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Self::new(&config.endpoint, &config.api_key, Duration::from_secs(config.timeout_secs))
    }

    /// `timeout` bounds the whole request; there is no other cancellation.
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let base_url = endpoint.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(JaideeError::Config("llm.endpoint must not be empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| JaideeError::Remote(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            name: provider_name(&base_url),
            api_key: api_key.to_string(),
            base_url,
            chat_path: "/chat/completions".to_string(),
            client,
        })
    }

    fn url(&self) -> String {
        format!("{}{}", self.base_url, self.chat_path)
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            req
        } else {
            req.bearer_auth(&self.api_key)
        }
    }
}

/// "https://api.deepseek.com/v1" → "deepseek".
fn provider_name(base_url: &str) -> String {
    let host = base_url
        .split("://")
        .nth(1)
        .unwrap_or(base_url)
        .split(['/', ':'])
        .next()
        .unwrap_or_default();
    let labels: Vec<&str> = host.split('.').collect();
    match labels.as_slice() {
        [.., name, _tld] if !name.is_empty() => name.to_string(),
        [single] if !single.is_empty() => single.to_string(),
        _ => "custom".to_string(),
    }
}

/// Standard OpenAI request body.
fn build_body(messages: &[ChatMessage], options: &CompletionOptions) -> Result<Value> {
    let mut body = json!({
        "model": options.model,
        "messages": serde_json::to_value(messages)?,
        "temperature": options.temperature,
        "max_tokens": options.max_tokens,
    });
    if let Some(top_p) = options.top_p {
        body["top_p"] = json!(top_p);
    }
    Ok(body)
}

/// Text of the first choice.
fn parse_content(json: &Value) -> Result<String> {
    let choice = json["choices"]
        .get(0)
        .ok_or_else(|| JaideeError::Remote("No choices in response".into()))?;
    choice["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| JaideeError::Remote("No content in first choice".into()))
}

#[async_trait]
impl TextCompletion for OpenAiCompatibleCompletion {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String> {
        let body = build_body(messages, options)?;
        let url = self.url();
        tracing::debug!(
            "🤖 {} request: {} messages, model {}",
            self.name,
            messages.len(),
            options.model
        );

        let req = self.client.post(&url).json(&body);
        let resp = self.apply_auth(req).send().await.map_err(|e| {
            JaideeError::Remote(format!("{} connection failed ({url}): {e}", self.name))
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(JaideeError::Remote(format!("{} API error {status}: {text}", self.name)));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| JaideeError::Remote(format!("{} sent invalid JSON: {e}", self.name)))?;
        let content = parse_content(&json)?;

        if let Some(total) = json["usage"]["total_tokens"].as_u64() {
            tracing::debug!("📊 {} usage: {total} tokens", self.name);
        }
        Ok(content)
    }
}
