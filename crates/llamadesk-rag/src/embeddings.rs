//! Embedding backends for retrieval

use async_trait::async_trait;
use std::sync::Arc;

use llamadesk_core::{Embedder, EmbeddingKind, EmbeddingModelSpec, Result};
use llamadesk_ollama::{OllamaConfig, OllamaEmbedder};

const DEFAULT_DIMENSIONS: usize = 384;

/// In-process embedder built from hashed word and bigram features.
///
/// Vectors are L2-normalized and depend only on the text, so embeddings
/// written into a saved experiment stay valid across runs.
pub struct HashEmbedder {
    model: String,
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model: model.into(),
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Generate the feature vector for one text
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let normalized: String = text
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();
        let words: Vec<&str> = normalized.split_whitespace().collect();
        let dims = self.dimensions as u64;

        let mut embedding = vec![0.0f32; self.dimensions];

        for (pos, word) in words.iter().enumerate() {
            let hash = stable_hash(word.as_bytes());
            // Dampen position so long chunks still weigh their tail
            let weight = 1.0 / (1.0 + pos as f32 * 0.1);

            embedding[(hash % dims) as usize] += weight;
            if word.chars().count() > 3 {
                embedding[((hash >> 16) % dims) as usize] += weight * 0.5;
            }
        }

        for pair in words.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            let hash = stable_hash(bigram.as_bytes());
            embedding[(hash % dims) as usize] += 0.3;
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for val in &mut embedding {
                *val /= magnitude;
            }
        }
        embedding
    }
}

/// FNV-1a; fixed across builds, unlike `DefaultHasher`
fn stable_hash(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Build the embedder an embedding model's declared type calls for
pub fn create_embedder(spec: &EmbeddingModelSpec, ollama: &OllamaConfig) -> Arc<dyn Embedder> {
    match spec.kind {
        EmbeddingKind::Local => Arc::new(HashEmbedder::new(
            spec.name.clone(),
            spec.dimensions.unwrap_or(DEFAULT_DIMENSIONS),
        )),
        EmbeddingKind::Ollama => Arc::new(OllamaEmbedder::new(ollama.clone(), spec.name.clone())),
    }
}
