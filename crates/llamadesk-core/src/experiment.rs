//! RAG experiment configuration and answers

use serde::{Deserialize, Serialize};

/// Configuration record persisted next to an experiment's retriever.
///
/// Unknown fields are ignored on read and missing ones fall back to defaults,
/// so older or newer records still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Name as typed by the user, before sanitization
    pub experiment_name: String,
    pub llm_model: String,
    pub embedding_model: String,
    /// Child chunk size in characters
    pub chunk_size: usize,
    pub top_k: usize,
    pub total_documents: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            experiment_name: String::new(),
            llm_model: "N/A".to_string(),
            embedding_model: "N/A".to_string(),
            chunk_size: 0,
            top_k: 0,
            total_documents: 0,
        }
    }
}

/// Text fragment that contributed context to an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFragment {
    pub source: String,
    pub content: String,
}

/// Answer produced by a retrieval-augmented query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<SourceFragment>,
}
