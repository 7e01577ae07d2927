//! Wiring shared by every page: configuration, the model server client and
//! the stores under the data directory.

use std::sync::Arc;

use llamadesk_core::{AppConfig, Error, LLMProvider, Result};
use llamadesk_ollama::{EmbeddingCatalog, ModelLibrary, OllamaClient, OllamaConfig};
use llamadesk_rag::RagEngine;
use llamadesk_store::{ConversationStore, ExperimentStore};

pub struct App {
    config: AppConfig,
    client: OllamaClient,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let client = OllamaClient::new(OllamaConfig::from_app(&config));
        Self { config, client }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn client(&self) -> &OllamaClient {
        &self.client
    }

    pub fn llm(&self) -> Arc<dyn LLMProvider> {
        Arc::new(self.client.clone())
    }

    pub fn conversation_store(&self) -> Result<ConversationStore> {
        ConversationStore::new(self.config.conversations_dir())
    }

    pub fn experiment_store(&self) -> Result<ExperimentStore> {
        ExperimentStore::new(self.config.experiments_dir())
    }

    pub fn embedding_catalog(&self) -> EmbeddingCatalog {
        EmbeddingCatalog::load(&self.config.embedding_models_file())
    }

    pub fn model_library(&self) -> ModelLibrary {
        ModelLibrary::load(&self.config.model_library_file())
    }

    pub fn rag_engine(&self) -> Result<RagEngine> {
        Ok(RagEngine::new(
            self.llm(),
            self.experiment_store()?,
            self.embedding_catalog(),
            self.client.config().clone(),
        )
        .with_temperature(self.config.temperature))
    }

    /// Installed chat models; fails when the server is down or nothing is installed
    pub async fn chat_models(&self) -> Result<Vec<String>> {
        let models = self.client.available_models().await?;
        if models.is_empty() {
            return Err(Error::NotReady(
                "No chat models installed. Pull one with: llamadesk models pull <name>".to_string(),
            ));
        }
        Ok(models)
    }

    /// `requested` if installed, otherwise the first installed chat model
    pub async fn resolve_model(&self, requested: Option<&str>) -> Result<String> {
        let models = self.chat_models().await?;
        match requested {
            Some(name) => pick_model(&models, name),
            None => Ok(models[0].clone()),
        }
    }
}

/// Match `name` against installed models, accepting a name without its `:tag`
pub(crate) fn pick_model(models: &[String], name: &str) -> Result<String> {
    models
        .iter()
        .find(|m| m.as_str() == name)
        .or_else(|| {
            models
                .iter()
                .find(|m| m.split_once(':').is_some_and(|(base, _)| base == name))
        })
        .cloned()
        .ok_or_else(|| {
            Error::InvalidInput(format!(
                "Model '{}' is not installed. Installed: {}",
                name,
                models.join(", ")
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_pick_model_accepts_untagged_name() {
        let models = vec!["llama3.2:latest".to_string(), "mistral:7b".to_string()];
        assert_eq!(pick_model(&models, "mistral:7b").unwrap(), "mistral:7b");
        assert_eq!(pick_model(&models, "llama3.2").unwrap(), "llama3.2:latest");
        assert!(matches!(pick_model(&models, "phi3"), Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_backend_unavailable() {
        let dir = tempdir().unwrap();
        let app = App::new(
            AppConfig::default()
                .with_ollama_url("http://127.0.0.1:1")
                .with_data_dir(dir.path()),
        );

        let err = app.resolve_model(None).await.unwrap_err();
        assert!(err.is_backend_unavailable());
    }

    #[test]
    fn test_stores_live_under_data_dir() {
        let dir = tempdir().unwrap();
        let app = App::new(
            AppConfig::default()
                .with_data_dir(dir.path())
                .with_config_dir(dir.path().join("config")),
        );

        let conversations = app.conversation_store().unwrap();
        let experiments = app.experiment_store().unwrap();
        assert_eq!(conversations.base_dir(), dir.path().join("saved_conversations"));
        assert_eq!(experiments.base_dir(), dir.path().join("experiments"));
        // No catalog file in the config dir falls back to the built-in entries
        assert!(app.embedding_catalog().get("local-hash").is_ok());
    }
}
