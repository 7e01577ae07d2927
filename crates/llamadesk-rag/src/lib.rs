//! Retrieval-augmented generation for llamadesk
//!
//! This crate provides the recursive text splitter, an in-memory vector store,
//! the in-process embedder, document loading, the parent/child retriever and
//! the [`RagEngine`] that ties them to an LLM provider and the experiment store.

mod embeddings;
mod engine;
mod loader;
mod retriever;
mod splitter;
mod vector_store;

#[cfg(test)]
mod tests;

pub use embeddings::{HashEmbedder, create_embedder};
pub use engine::{RAG_PROMPT_TEMPLATE, RagEngine, format_configurations};
pub use loader::load_documents;
pub use retriever::{ParentChunk, ParentDocumentRetriever, RetrieverSnapshot};
pub use splitter::{ChunkingConfig, TEXT_SEPARATORS, TextSplitter};
pub use vector_store::LocalVectorStore;

// Re-export core types for convenience
pub use llamadesk_core::{
    Document, Embedder, Error, ExperimentConfig, RagAnswer, Result, SourceFile, SourceFragment,
    VectorDocument, VectorStore,
};
