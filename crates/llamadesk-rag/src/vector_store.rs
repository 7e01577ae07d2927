//! In-memory vector store

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use llamadesk_core::{Error, Result, SearchConfig, SearchResult, VectorDocument, VectorStore};

/// Local in-memory vector store with cosine similarity search.
///
/// Documents keep their insertion order, so snapshots are stable and equal
/// scores rank earlier documents first.
#[derive(Clone, Default)]
pub struct LocalVectorStore {
    entries: Arc<RwLock<Entries>>,
}

/// Documents in insertion order plus an id -> position index
#[derive(Default)]
struct Entries {
    documents: Vec<VectorDocument>,
    positions: HashMap<String, usize>,
}

impl Entries {
    fn upsert(&mut self, document: VectorDocument) {
        match self.positions.get(&document.id) {
            Some(&position) => self.documents[position] = document,
            None => {
                self.positions.insert(document.id.clone(), self.documents.len());
                self.documents.push(document);
            }
        }
    }
}

impl LocalVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from previously snapshotted documents
    pub fn from_documents(documents: Vec<VectorDocument>) -> Self {
        let mut entries = Entries::default();
        for document in documents {
            entries.upsert(document);
        }
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// Copy of every stored document, in insertion order
    pub fn snapshot(&self) -> Result<Vec<VectorDocument>> {
        let docs = self
            .entries
            .read()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;
        Ok(docs.documents.clone())
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot_product / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn store_batch(&self, documents: Vec<VectorDocument>) -> Result<Vec<String>> {
        let mut docs = self
            .entries
            .write()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;

        let mut ids = Vec::with_capacity(documents.len());
        docs.documents.reserve(documents.len());
        for document in documents {
            ids.push(document.id.clone());
            docs.upsert(document);
        }
        Ok(ids)
    }

    async fn search_by_vector(&self, vector: &[f32], config: &SearchConfig) -> Result<SearchResult> {
        let docs = self
            .entries
            .read()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;

        let mut results: Vec<VectorDocument> = docs
            .documents
            .iter()
            .filter_map(|doc| {
                let score = Self::cosine_similarity(vector, doc.embedding.as_deref()?);
                let mut scored = doc.clone();
                scored.score = Some(score);
                Some(scored)
            })
            .filter(|doc| match config.score_threshold {
                Some(threshold) => doc.score.unwrap_or(0.0) >= threshold,
                None => true,
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .unwrap_or(0.0)
                .partial_cmp(&a.score.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(config.top_k);

        let total = results.len();
        Ok(SearchResult {
            documents: results,
            total,
        })
    }

    async fn count(&self) -> Result<usize> {
        let docs = self
            .entries
            .read()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;
        Ok(docs.documents.len())
    }
}
