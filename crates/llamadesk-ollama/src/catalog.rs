//! Static model catalogs read from the config directory

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::warn;

use llamadesk_core::{EmbeddingKind, EmbeddingModelSpec, Error, Result};

/// Minimum RAM by model size class
pub const HARDWARE_REQUIREMENTS: &[(&str, &str)] = &[
    ("1B-7B", "8GB RAM"),
    ("8B-13B", "16GB RAM"),
    ("14B-33B", "32GB RAM"),
    ("34B+", "64GB+ RAM"),
];

/// A downloadable model in the library listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    #[serde(default)]
    pub description: String,
    /// Available parameter sizes, e.g. `"1b, 3b"`
    #[serde(default)]
    pub params: String,
}

/// Catalog of models that can be pulled, keyed by model name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelLibrary {
    entries: BTreeMap<String, LibraryEntry>,
}

impl ModelLibrary {
    /// Load the library; a missing or corrupt file gives an empty library
    pub fn load(path: &Path) -> Self {
        match read_catalog(path) {
            Ok(library) => library,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "model library unavailable");
                Self::default()
            }
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &LibraryEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Embedding models selectable for RAG experiments, keyed by catalog id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmbeddingCatalog {
    models: BTreeMap<String, EmbeddingModelSpec>,
}

impl Default for EmbeddingCatalog {
    fn default() -> Self {
        let mut models = BTreeMap::new();
        models.insert(
            "local-hash".to_string(),
            EmbeddingModelSpec {
                name: "hash-bigram".to_string(),
                kind: EmbeddingKind::Local,
                description: "Lexical word and bigram hashing (not a semantic model)".to_string(),
                dimensions: Some(384),
            },
        );
        models.insert(
            "nomic-embed".to_string(),
            EmbeddingModelSpec {
                name: "nomic-embed-text".to_string(),
                kind: EmbeddingKind::Ollama,
                description: "Served by Ollama".to_string(),
                dimensions: None,
            },
        );
        Self { models }
    }
}

impl EmbeddingCatalog {
    /// Load the catalog; a missing, corrupt or empty file gives the defaults
    pub fn load(path: &Path) -> Self {
        match read_catalog::<Self>(path) {
            Ok(catalog) if !catalog.models.is_empty() => catalog,
            Ok(_) => Self::default(),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "using default embedding models");
                Self::default()
            }
        }
    }

    /// Look up a model by catalog id
    pub fn get(&self, key: &str) -> Result<&EmbeddingModelSpec> {
        self.models
            .get(key)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown embedding model '{}'", key)))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EmbeddingModelSpec)> {
        self.models.iter().map(|(key, spec)| (key.as_str(), spec))
    }
}

fn read_catalog<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
