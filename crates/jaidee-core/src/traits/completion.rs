//! Opaque AI completion collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::ChatMessage;

/// Sampling parameters for one completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(default)]
    pub top_p: Option<f32>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: "deepseek-chat".into(),
            temperature: 1.0,
            max_tokens: 500,
            top_p: Some(0.9),
        }
    }
}

/// A single blocking call that turns an ordered message list into text.
///
/// Implementations return `JaideeError::Remote` on any transport or server
/// failure. There are no partial results.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, messages: &[ChatMessage], options: &CompletionOptions)
    -> Result<String>;
}
