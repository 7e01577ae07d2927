//! Parent/child document retriever
//!
//! Documents are cut into large parent chunks, and each parent into small
//! child chunks. Only children are embedded and searched; a hit resolves to
//! the parent it came from, so the LLM sees wide context while matching
//! stays precise.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use llamadesk_core::{
    Document, Embedder, Error, Result, SearchConfig, VectorDocument, VectorStore,
};

use crate::splitter::ChunkingConfig;
use crate::vector_store::LocalVectorStore;

const PLACEHOLDER_ID: &str = "placeholder";
const PARENT_ID_KEY: &str = "parent_id";

/// A parent chunk as held in the document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentChunk {
    pub id: String,
    pub source: String,
    pub content: String,
}

/// Serializable retriever state: everything needed to rebuild it except the
/// embedder itself, which is recreated from `embedding_model`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieverSnapshot {
    pub chunking: ChunkingConfig,
    /// Embedding catalog key
    pub embedding_model: String,
    pub top_k: usize,
    pub parents: Vec<ParentChunk>,
    pub children: Vec<VectorDocument>,
}

pub struct ParentDocumentRetriever {
    chunking: ChunkingConfig,
    embedding_model: String,
    top_k: usize,
    embedder: Arc<dyn Embedder>,
    children: LocalVectorStore,
    parents: Vec<ParentChunk>,
}

impl ParentDocumentRetriever {
    /// Create an empty retriever whose index holds a single placeholder entry
    pub async fn new(
        chunking: ChunkingConfig,
        embedding_model: impl Into<String>,
        top_k: usize,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        if top_k == 0 {
            return Err(Error::InvalidInput("top_k must be at least 1".to_string()));
        }

        let children = LocalVectorStore::new();
        let seed = embedder.embed_query(PLACEHOLDER_ID).await?;
        children
            .store_batch(vec![VectorDocument {
                id: PLACEHOLDER_ID.to_string(),
                content: PLACEHOLDER_ID.to_string(),
                embedding: Some(seed),
                metadata: json!({}),
                score: None,
            }])
            .await?;

        Ok(Self {
            chunking,
            embedding_model: embedding_model.into(),
            top_k,
            embedder,
            children,
            parents: Vec::new(),
        })
    }

    /// Rebuild from a snapshot, pairing it with a freshly built embedder
    pub fn from_snapshot(snapshot: RetrieverSnapshot, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            chunking: snapshot.chunking,
            embedding_model: snapshot.embedding_model,
            top_k: snapshot.top_k.max(1),
            embedder,
            children: LocalVectorStore::from_documents(snapshot.children),
            parents: snapshot.parents,
        }
    }

    pub fn chunking(&self) -> &ChunkingConfig {
        &self.chunking
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn parents(&self) -> &[ParentChunk] {
        &self.parents
    }

    /// Entries in the child index, the placeholder included
    pub async fn indexed_children(&self) -> Result<usize> {
        self.children.count().await
    }

    /// Split, embed and index documents; returns the number of child chunks.
    ///
    /// All embeddings are computed before anything is indexed, so a failure
    /// leaves the retriever unchanged.
    pub async fn add_documents(&mut self, documents: &[Document]) -> Result<usize> {
        let parent_splitter = self.chunking.parent_splitter();
        let child_splitter = self.chunking.child_splitter();

        let mut parents = Vec::new();
        let mut child_texts = Vec::new();
        let mut child_meta = Vec::new();

        for document in documents {
            for parent_text in parent_splitter.split_text(&document.content) {
                let parent_id = Uuid::new_v4().to_string();
                for child_text in child_splitter.split_text(&parent_text) {
                    child_texts.push(child_text);
                    child_meta.push(json!({
                        "parent_id": parent_id,
                        "source": document.source,
                    }));
                }
                parents.push(ParentChunk {
                    id: parent_id,
                    source: document.source.clone(),
                    content: parent_text,
                });
            }
        }

        let embeddings = self.embedder.embed(&child_texts).await?;
        if embeddings.len() != child_texts.len() {
            return Err(Error::Embedding(format!(
                "Expected {} embeddings, got {}",
                child_texts.len(),
                embeddings.len()
            )));
        }

        let children: Vec<VectorDocument> = child_texts
            .into_iter()
            .zip(child_meta)
            .zip(embeddings)
            .map(|((content, metadata), embedding)| VectorDocument {
                id: Uuid::new_v4().to_string(),
                content,
                embedding: Some(embedding),
                metadata,
                score: None,
            })
            .collect();

        let child_count = children.len();
        debug!(parents = parents.len(), children = child_count, "indexing chunks");

        self.children.store_batch(children).await?;
        self.parents.extend(parents);
        debug!(indexed = self.indexed_children().await?, "child index updated");
        Ok(child_count)
    }

    /// Parent chunks for the `top_k` closest children, best first, without duplicates
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ParentChunk>> {
        let vector = self.embedder.embed_query(query).await?;
        let config = SearchConfig {
            top_k: self.top_k,
            score_threshold: None,
        };
        let hits = self.children.search_by_vector(&vector, &config).await?;

        let mut seen = HashSet::new();
        let parents = hits
            .documents
            .iter()
            .filter_map(|child| child.metadata.get(PARENT_ID_KEY)?.as_str())
            .filter(|parent_id| seen.insert(parent_id.to_string()))
            .filter_map(|parent_id| self.parents.iter().find(|p| p.id == parent_id))
            .cloned()
            .collect();
        Ok(parents)
    }

    pub fn snapshot(&self) -> Result<RetrieverSnapshot> {
        Ok(RetrieverSnapshot {
            chunking: self.chunking,
            embedding_model: self.embedding_model.clone(),
            top_k: self.top_k,
            parents: self.parents.clone(),
            children: self.children.snapshot()?,
        })
    }
}
