//! LLM provider trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Result;

/// Default sampling temperature for chat and retrieval answers
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Callback receiving streamed text fragments as they arrive
pub type TokenSink<'a> = &'a mut (dyn FnMut(&str) + Send);

/// Configuration for text generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub model_id: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stop_sequences: Vec<String>,
    pub timeout: Duration,
}

impl GenerationConfig {
    /// Generation settings for `model_id` with the default temperature
    pub fn for_model(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model_id: String::new(),
            temperature: Some(DEFAULT_TEMPERATURE),
            max_tokens: None,
            stop_sequences: vec!["Human:".to_string()],
            timeout: Duration::from_secs(600),
        }
    }
}

/// Result of a text generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    pub model_id: String,
    pub tokens_used: Option<u32>,
}

/// Trait for LLM providers (e.g., a local Ollama server)
///
/// A provider is not bound to a single model: every call names the model
/// through its [`GenerationConfig`].
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate text with custom configuration
    async fn generate_with_config(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<GenerationResult>;

    /// Generate text, handing every fragment to `on_token` as it arrives.
    /// The returned result carries the full text.
    async fn generate_stream(
        &self,
        prompt: &str,
        config: &GenerationConfig,
        on_token: TokenSink<'_>,
    ) -> Result<GenerationResult>;

    /// Human-readable provider name
    fn name(&self) -> &str;
}
