//! Push dispatch: delivers texts to users.
//! Supports: generic HTTP webhook (JSON POST) and a log-only fallback.

use async_trait::async_trait;
use jaidee_core::config::PushConfig;
use jaidee_core::error::{JaideeError, Result};
use jaidee_core::traits::PushChannel;
use std::sync::Arc;
use std::time::Duration;

const PUSH_TIMEOUT_SECS: u64 = 10;

/// POSTs `{"user_id": .., "text": ..}` to a messaging gateway.
pub struct WebhookPush {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl WebhookPush {
    pub fn new(endpoint: &str, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(PUSH_TIMEOUT_SECS))
            .build()
            .map_err(|e| JaideeError::Push(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    fn payload(user_id: &str, text: &str) -> serde_json::Value {
        serde_json::json!({
            "user_id": user_id,
            "text": text,
        })
    }
}

#[async_trait]
impl PushChannel for WebhookPush {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, user_id: &str, text: &str) -> Result<()> {
        let mut req = self.client.post(&self.endpoint).json(&Self::payload(user_id, text));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| JaideeError::Push(format!("Webhook send failed: {e}")))?;

        if resp.status().is_success() {
            tracing::info!("✅ Push sent to {user_id}");
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(JaideeError::Push(format!("Webhook error {status}: {body}")))
        }
    }
}

/// Used when no endpoint is configured: texts only reach the log.
#[derive(Debug, Default)]
pub struct LogPush;

#[async_trait]
impl PushChannel for LogPush {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, user_id: &str, text: &str) -> Result<()> {
        tracing::info!("📢 [push → {user_id}] {text}");
        Ok(())
    }
}

/// Build the push channel described by config.
pub fn push_from_config(config: &PushConfig) -> Result<Arc<dyn PushChannel>> {
    if config.endpoint.trim().is_empty() {
        tracing::warn!("⚠️ No push endpoint configured, pushes are only logged");
        return Ok(Arc::new(LogPush));
    }
    let token = Some(config.token.clone());
    Ok(Arc::new(WebhookPush::new(config.endpoint.trim(), token)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let body = WebhookPush::payload("U123", "สวัสดีครับ");
        assert_eq!(body["user_id"], "U123");
        assert_eq!(body["text"], "สวัสดีครับ");
    }

    #[test]
    fn test_empty_token_is_dropped() {
        let push = WebhookPush::new("http://localhost:8080/push", Some(String::new())).unwrap();
        assert!(push.token.is_none());
    }

    #[test]
    fn test_config_selects_channel() {
        let log = push_from_config(&PushConfig::default()).unwrap();
        assert_eq!(log.name(), "log");

        let config = PushConfig {
            endpoint: "http://localhost:8080/push".into(),
            token: "secret".into(),
        };
        assert_eq!(push_from_config(&config).unwrap().name(), "webhook");
    }

    #[tokio::test]
    async fn test_log_push_always_succeeds() {
        assert!(LogPush.send("u1", "hello").await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_push_error() {
        // port 9 (discard) is closed on test machines
        let push = WebhookPush::new("http://127.0.0.1:9/push", None).unwrap();
        let err = push.send("u1", "hello").await.unwrap_err();
        assert!(matches!(err, JaideeError::Push(_)));
    }
}
