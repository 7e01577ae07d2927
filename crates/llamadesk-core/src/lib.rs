//! Core traits and types for llamadesk
//!
//! This crate defines the fundamental traits and types used across the llamadesk system.
//! It provides capability-facing interfaces for LLM providers, embedding backends and
//! vector stores, plus the shared error type, chat types and application configuration.

pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod experiment;
pub mod llm;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod types;
pub mod vector_store;

pub use config::AppConfig;
pub use document::{Document, SourceFile};
pub use embedding::{Embedder, EmbeddingKind, EmbeddingModelSpec};
pub use error::{Error, Result};
pub use experiment::{ExperimentConfig, RagAnswer, SourceFragment};
pub use llm::{GenerationConfig, GenerationResult, LLMProvider, TokenSink};
pub use types::*;
pub use vector_store::{SearchConfig, SearchResult, VectorDocument, VectorStore};
