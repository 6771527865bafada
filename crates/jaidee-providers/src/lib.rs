//! # Jaidee Providers
//!
//! Text completion backends. Every OpenAI-compatible API (DeepSeek, OpenAI,
//! Groq, a local llama.cpp server) is served by [`OpenAiCompatibleCompletion`];
//! providers differ only by endpoint and key.

pub mod openai_compatible;

pub use openai_compatible::OpenAiCompatibleCompletion;

use jaidee_core::config::LlmConfig;
use jaidee_core::error::Result;
use jaidee_core::traits::TextCompletion;
use std::sync::Arc;

/// Create the completion backend from configuration.
pub fn create_completion(config: &LlmConfig) -> Result<Arc<dyn TextCompletion>> {
    Ok(Arc::new(OpenAiCompatibleCompletion::from_config(config)?))
}
