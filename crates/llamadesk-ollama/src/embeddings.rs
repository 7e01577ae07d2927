//! Embeddings served by Ollama

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use llamadesk_core::{Embedder, Error, Result};

use crate::client::OllamaClient;
use crate::config::OllamaConfig;

/// Embedder backed by the `/api/embed` endpoint
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(config: OllamaConfig, model: impl Into<String>) -> Self {
        Self {
            client: OllamaClient::new(config),
            model: model.into(),
        }
    }
}

/// Texts sent per `/api/embed` request
pub const EMBED_BATCH_SIZE: usize = 64;

impl OllamaEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .http()
            .post(self.client.config().endpoint("api/embed"))
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .timeout(self.client.config().embed_timeout)
            .send()
            .await
            .map_err(|e| self.client.request_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "Ollama embed failed with status {}: {}",
                status, error_text
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| self.body_error(e))?;

        if body.embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                body.embeddings.len()
            )));
        }
        Ok(body.embeddings)
    }

    fn body_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else {
            Error::Embedding(e.to_string())
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(model = %self.model, count = texts.len(), "ollama embed");

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            embeddings.extend(self.embed_batch(batch).await?);
        }
        Ok(embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
