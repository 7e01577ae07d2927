//! Test doubles shared by the llamadesk crates
//!
//! Compiled for this crate's tests and for dependents that enable the
//! `test-util` feature.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::{Error, GenerationConfig, GenerationResult, LLMProvider, Result, TokenSink};

/// Replays canned replies in order (repeating the last) and records every call
pub struct ScriptedLLM {
    replies: Vec<String>,
    fail: bool,
    calls: Mutex<Vec<GenerationConfig>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLLM {
    pub fn replying(replies: &[&str]) -> Self {
        Self {
            replies: replies.iter().map(|r| r.to_string()).collect(),
            fail: false,
            calls: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::replying(&[])
        }
    }

    pub fn calls(&self) -> Vec<GenerationConfig> {
        self.calls.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn next_reply(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(config.clone());
            calls.len() - 1
        };
        self.prompts.lock().unwrap().push(prompt.to_string());

        if self.fail {
            return Err(Error::BackendUnavailable("connection refused".to_string()));
        }
        Ok(self
            .replies
            .get(index)
            .or(self.replies.last())
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl LLMProvider for ScriptedLLM {
    async fn generate_with_config(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<GenerationResult> {
        Ok(GenerationResult {
            text: self.next_reply(prompt, config)?,
            model_id: config.model_id.clone(),
            tokens_used: None,
        })
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        config: &GenerationConfig,
        on_token: TokenSink<'_>,
    ) -> Result<GenerationResult> {
        let text = self.next_reply(prompt, config)?;
        for piece in text.split_inclusive(' ') {
            on_token(piece);
        }
        Ok(GenerationResult {
            text,
            model_id: config.model_id.clone(),
            tokens_used: None,
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order_then_repeats_last() {
        let llm = ScriptedLLM::replying(&["one", "two words"]);
        let config = GenerationConfig::default();

        assert_eq!(llm.generate_with_config("a", &config).await.unwrap().text, "one");
        let mut streamed = Vec::new();
        let mut sink = |token: &str| streamed.push(token.to_string());
        llm.generate_stream("b", &config, &mut sink).await.unwrap();
        assert_eq!(streamed, vec!["two ", "words"]);
        assert_eq!(llm.generate_with_config("c", &config).await.unwrap().text, "two words");
        assert_eq!(llm.prompts(), vec!["a", "b", "c"]);
        assert_eq!(llm.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_failing_reports_backend_unavailable() {
        let llm = ScriptedLLM::failing();
        let err = llm
            .generate_with_config("hi", &GenerationConfig::default())
            .await
            .unwrap_err();
        assert!(err.is_backend_unavailable());
        assert_eq!(llm.prompts(), vec!["hi"]);
    }
}
