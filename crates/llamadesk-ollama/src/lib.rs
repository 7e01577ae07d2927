//! Ollama integration for llamadesk
//!
//! This crate provides the Ollama implementation of the LLMProvider and Embedder
//! traits, the installed-model catalog client (list, show, pull) and the static
//! model catalogs read from the config directory.

mod catalog;
mod client;
mod config;
mod embeddings;
mod model_info;


pub use catalog::{EmbeddingCatalog, HARDWARE_REQUIREMENTS, LibraryEntry, ModelLibrary};
pub use client::{ModelDescriptor, ModelDetails, OllamaClient, PullOutcome, filter_chat_models};
pub use config::OllamaConfig;
pub use embeddings::{EMBED_BATCH_SIZE, OllamaEmbedder};
pub use model_info::{ModelInfo, ModelInfoReport};

// Re-export core types for convenience
pub use llamadesk_core::{
    Embedder, Error, GenerationConfig, GenerationResult, LLMProvider, Result, TokenSink,
};
