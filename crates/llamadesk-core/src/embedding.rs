//! Embedding backend trait and model catalog types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Where an embedding model runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingKind {
    /// Computed in-process, no server round trip
    #[serde(alias = "huggingface")]
    Local,
    /// Served by the Ollama model server
    Ollama,
}

/// Catalog entry describing an embedding model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingModelSpec {
    /// Backend model name (e.g. `nomic-embed-text`)
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EmbeddingKind,
    #[serde(default)]
    pub description: String,
    /// Vector width for local models; ignored for served models
    #[serde(default)]
    pub dimensions: Option<usize>,
}

/// Trait for embedding backends
///
/// Exposes a single "embed texts" capability; query embedding defaults to
/// embedding a one-element batch.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input in order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query string
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| crate::Error::Embedding("Backend returned no vector".to_string()))
    }

    /// Model name used for these embeddings
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_huggingface_alias_maps_to_local() {
        let spec: EmbeddingModelSpec = serde_json::from_str(
            r#"{"name": "bge-small-en", "type": "huggingface", "extra": 1}"#,
        )
        .unwrap();
        assert_eq!(spec.kind, EmbeddingKind::Local);
        assert!(spec.description.is_empty());
        assert_eq!(spec.dimensions, None);
    }

    #[test]
    fn test_ollama_kind() {
        let spec: EmbeddingModelSpec =
            serde_json::from_str(r#"{"name": "nomic-embed-text", "type": "ollama"}"#).unwrap();
        assert_eq!(spec.kind, EmbeddingKind::Ollama);
    }
}
