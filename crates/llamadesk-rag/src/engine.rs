//! RAG engine implementation

use std::sync::Arc;
use tracing::{error, info, warn};

use llamadesk_core::config::PARENT_CHUNK_MULTIPLIER;
use llamadesk_core::llm::DEFAULT_TEMPERATURE;
use llamadesk_core::{
    Error, ExperimentConfig, GenerationConfig, LLMProvider, RagAnswer, Result, SourceFile,
    SourceFragment, TokenSink,
};
use llamadesk_ollama::{EmbeddingCatalog, OllamaConfig};
use llamadesk_store::ExperimentStore;

use crate::embeddings::create_embedder;
use crate::loader::load_documents;
use crate::retriever::{ParentChunk, ParentDocumentRetriever, RetrieverSnapshot};
use crate::splitter::ChunkingConfig;

/// Prompt used to answer from retrieved context
pub const RAG_PROMPT_TEMPLATE: &str = "Context: {context}
Question: {question}

Provide a detailed, well-structured answer based only on the above context.";

/// Builds retrievers over uploaded documents and answers questions from them.
///
/// At most one retriever is active at a time; it is replaced by
/// [`process_documents`](Self::process_documents) or
/// [`load_experiment`](Self::load_experiment).
pub struct RagEngine {
    llm: Arc<dyn LLMProvider>,
    experiments: ExperimentStore,
    embeddings: EmbeddingCatalog,
    ollama: OllamaConfig,
    temperature: f32,
    retriever: Option<ParentDocumentRetriever>,
}

impl RagEngine {
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        experiments: ExperimentStore,
        embeddings: EmbeddingCatalog,
        ollama: OllamaConfig,
    ) -> Self {
        Self {
            llm,
            experiments,
            embeddings,
            ollama,
            temperature: DEFAULT_TEMPERATURE,
            retriever: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn is_ready(&self) -> bool {
        self.retriever.is_some()
    }

    pub fn retriever(&self) -> Option<&ParentDocumentRetriever> {
        self.retriever.as_ref()
    }

    pub fn embedding_catalog(&self) -> &EmbeddingCatalog {
        &self.embeddings
    }

    /// Drop the active retriever
    pub fn reset(&mut self) {
        self.retriever = None;
    }

    /// Extract, chunk, embed and index `files` as a new retriever.
    ///
    /// Returns the number of input documents. The previous retriever stays
    /// active unless every step succeeds.
    pub async fn process_documents(
        &mut self,
        files: &[SourceFile],
        experiment_name: &str,
        embedding_model: &str,
        child_chunk_size: usize,
        top_k: usize,
    ) -> Result<usize> {
        if experiment_name.trim().is_empty() {
            return Err(Error::InvalidInput("Experiment name must be provided".to_string()));
        }
        if files.is_empty() {
            return Err(Error::InvalidInput("No files provided for processing".to_string()));
        }

        let documents = load_documents(files)?;
        let spec = self.embeddings.get(embedding_model)?;
        let embedder = create_embedder(spec, &self.ollama);
        let chunking = ChunkingConfig::from_child(child_chunk_size)?;

        let mut retriever =
            ParentDocumentRetriever::new(chunking, embedding_model, top_k, embedder).await?;
        let children = retriever.add_documents(&documents).await?;

        info!(
            experiment = %experiment_name,
            documents = documents.len(),
            parents = retriever.parents().len(),
            children,
            "documents processed"
        );

        self.retriever = Some(retriever);
        Ok(documents.len())
    }

    /// Answer `question` with `model_id` from the active retriever's context
    pub async fn query(&self, question: &str, model_id: &str) -> Result<RagAnswer> {
        let (prompt, sources) = self.prepare(question).await?;
        let result = self
            .llm
            .generate_with_config(&prompt, &self.generation_config(model_id))
            .await?;

        Ok(RagAnswer {
            answer: result.text,
            sources,
        })
    }

    /// Like [`query`](Self::query), handing answer fragments to `on_token` as they arrive
    pub async fn query_stream(
        &self,
        question: &str,
        model_id: &str,
        on_token: TokenSink<'_>,
    ) -> Result<RagAnswer> {
        let (prompt, sources) = self.prepare(question).await?;
        let result = self
            .llm
            .generate_stream(&prompt, &self.generation_config(model_id), on_token)
            .await?;

        Ok(RagAnswer {
            answer: result.text,
            sources,
        })
    }

    async fn prepare(&self, question: &str) -> Result<(String, Vec<SourceFragment>)> {
        let retriever = self.retriever.as_ref().ok_or_else(|| {
            Error::NotReady("Process documents or load an experiment first".to_string())
        })?;
        if question.trim().is_empty() {
            return Err(Error::InvalidInput("Question must not be empty".to_string()));
        }

        let parents = retriever.retrieve(question).await?;
        let prompt = build_prompt(&parents, question);
        let sources = parents
            .into_iter()
            .map(|parent| SourceFragment {
                source: parent.source,
                content: parent.content,
            })
            .collect();
        Ok((prompt, sources))
    }

    fn generation_config(&self, model_id: &str) -> GenerationConfig {
        GenerationConfig {
            stop_sequences: Vec::new(),
            ..GenerationConfig::for_model(model_id).with_temperature(self.temperature)
        }
    }

    /// Persist the active retriever under `config.experiment_name`
    pub fn save_experiment(&self, config: &ExperimentConfig) -> bool {
        let Some(retriever) = &self.retriever else {
            warn!(experiment = %config.experiment_name, "no retriever to save");
            return false;
        };

        match retriever.snapshot() {
            Ok(snapshot) => self.experiments.save(&config.experiment_name, &snapshot, config),
            Err(e) => {
                error!(experiment = %config.experiment_name, error = %e, "error saving experiment");
                false
            }
        }
    }

    /// Load a saved experiment and make its retriever active
    pub fn load_experiment(&mut self, experiment_name: &str) -> Option<ExperimentConfig> {
        let (snapshot, config) = self
            .experiments
            .load::<RetrieverSnapshot>(experiment_name)?;

        let spec = match self.embeddings.get(&snapshot.embedding_model) {
            Ok(spec) => spec,
            Err(e) => {
                error!(experiment = %experiment_name, error = %e, "error loading experiment");
                return None;
            }
        };

        let embedder = create_embedder(spec, &self.ollama);
        self.retriever = Some(ParentDocumentRetriever::from_snapshot(snapshot, embedder));
        Some(config)
    }

    pub fn list_experiments(&self) -> Vec<(String, ExperimentConfig)> {
        self.experiments.list_all()
    }

    pub fn delete_experiment(&self, experiment_name: &str) -> bool {
        self.experiments.delete(experiment_name)
    }

    pub fn experiment_exists(&self, experiment_name: &str) -> bool {
        self.experiments.exists(experiment_name)
    }
}

fn build_prompt(parents: &[ParentChunk], question: &str) -> String {
    let context = parents
        .iter()
        .map(|parent| parent.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    RAG_PROMPT_TEMPLATE
        .replace("{context}", &context)
        .replace("{question}", question)
}

/// Overview of saved experiments; `None` when there are none
pub fn format_configurations(experiments: &[(String, ExperimentConfig)]) -> Option<String> {
    if experiments.is_empty() {
        return None;
    }

    let blocks: Vec<String> = experiments
        .iter()
        .map(|(name, config)| {
            [
                "--------------------------------------".to_string(),
                format!("Experiment: {}", name),
                "-------------------".to_string(),
                "Model Configuration".to_string(),
                format!("• LLM Model: {}", config.llm_model),
                format!("• Embedding Model: {}", config.embedding_model),
                String::new(),
                "Processing Settings".to_string(),
                format!("• Child Chunk Size: {} characters", config.chunk_size),
                format!(
                    "• Parent Chunk Size: {} characters",
                    config.chunk_size * PARENT_CHUNK_MULTIPLIER
                ),
                format!("• Top K Documents: {}", config.top_k),
                String::new(),
                "Document Information".to_string(),
                format!("• Total Uploaded Files: {}", config.total_documents),
            ]
            .join("\n")
        })
        .collect();

    Some(blocks.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use llamadesk_core::testing::ScriptedLLM;
    use tempfile::{TempDir, tempdir};

    fn engine(llm: Arc<ScriptedLLM>) -> (RagEngine, TempDir) {
        let dir = tempdir().unwrap();
        let store = ExperimentStore::new(dir.path()).unwrap();
        let engine = RagEngine::new(
            llm,
            store,
            EmbeddingCatalog::default(),
            OllamaConfig::new("http://127.0.0.1:1"),
        );
        (engine, dir)
    }

    fn files() -> Vec<SourceFile> {
        vec![
            SourceFile::new(
                "tea.txt",
                "Green tea should steep for two minutes at eighty degrees.",
            ),
            SourceFile::new(
                "rust.md",
                "The borrow checker rejects aliasing mutable references.",
            ),
        ]
    }

    #[tokio::test]
    async fn test_query_without_retriever_is_not_ready() {
        let (engine, _dir) = engine(Arc::new(ScriptedLLM::replying(&["unused"])));
        let err = engine.query("anything?", "llama3").await.unwrap_err();
        assert!(matches!(err, Error::NotReady(_)));
    }

    #[tokio::test]
    async fn test_process_documents_validates_input() {
        let (mut engine, _dir) = engine(Arc::new(ScriptedLLM::replying(&["unused"])));

        let err = engine
            .process_documents(&files(), "  ", "local-hash", 300, 4)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = engine
            .process_documents(&[], "papers", "local-hash", 300, 4)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = engine
            .process_documents(&files(), "papers", "no-such-model", 300, 4)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(!engine.is_ready());
    }

    #[tokio::test]
    async fn test_process_and_query() {
        let llm = Arc::new(ScriptedLLM::replying(&["Two minutes."]));
        let (mut engine, _dir) = engine(llm.clone());

        let count = engine
            .process_documents(&files(), "papers", "local-hash", 300, 1)
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert!(engine.is_ready());
        assert_eq!(engine.retriever().unwrap().chunking().parent_chunk_size, 1500);

        let answer = engine
            .query("How long should green tea steep?", "llama3")
            .await
            .unwrap();
        assert_eq!(answer.answer, "Two minutes.");
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].source, "tea.txt");

        let prompts = llm.prompts();
        assert!(prompts[0].starts_with("Context: Green tea should steep"));
        assert!(prompts[0].contains("Question: How long should green tea steep?"));
    }

    #[tokio::test]
    async fn test_query_stream_forwards_tokens() {
        let (mut engine, _dir) = engine(Arc::new(ScriptedLLM::replying(&["Steep it briefly."])));
        engine
            .process_documents(&files(), "papers", "local-hash", 300, 2)
            .await
            .unwrap();

        let mut streamed = String::new();
        let mut sink = |token: &str| streamed.push_str(token);
        let answer = engine
            .query_stream("green tea?", "llama3", &mut sink)
            .await
            .unwrap();

        assert_eq!(streamed, "Steep it briefly.");
        assert_eq!(answer.answer, "Steep it briefly.");
    }

    #[tokio::test]
    async fn test_failed_processing_keeps_previous_retriever() {
        let (mut engine, _dir) = engine(Arc::new(ScriptedLLM::replying(&["ok"])));
        engine
            .process_documents(&files(), "papers", "local-hash", 300, 4)
            .await
            .unwrap();

        let err = engine
            .process_documents(&[SourceFile::new("x.docx", "?")], "papers", "local-hash", 300, 4)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(engine.is_ready());
    }

    #[tokio::test]
    async fn test_save_load_experiment() {
        let llm = Arc::new(ScriptedLLM::replying(&["From the saved experiment."]));
        let (mut engine, _dir) = engine(llm);

        let config = ExperimentConfig {
            experiment_name: "Tea notes".to_string(),
            llm_model: "llama3".to_string(),
            embedding_model: "local-hash".to_string(),
            chunk_size: 300,
            top_k: 2,
            total_documents: 2,
        };
        assert!(!engine.save_experiment(&config));

        engine
            .process_documents(&files(), "Tea notes", "local-hash", 300, 2)
            .await
            .unwrap();
        assert!(engine.save_experiment(&config));
        assert!(engine.experiment_exists("Tea notes"));

        engine.reset();
        assert!(!engine.is_ready());

        let loaded = engine.load_experiment("Tea notes").unwrap();
        assert_eq!(loaded, config);
        assert!(engine.is_ready());
        assert_eq!(engine.retriever().unwrap().top_k(), 2);

        let answer = engine.query("green tea", "llama3").await.unwrap();
        assert_eq!(answer.sources[0].source, "tea.txt");

        assert_eq!(engine.list_experiments().len(), 1);
        assert!(engine.delete_experiment("Tea notes"));
        assert!(engine.load_experiment("Tea notes").is_none());
    }

    #[test]
    fn test_format_configurations() {
        assert!(format_configurations(&[]).is_none());

        let config = ExperimentConfig {
            llm_model: "mistral".to_string(),
            embedding_model: "nomic-embed".to_string(),
            chunk_size: 200,
            top_k: 3,
            total_documents: 4,
            ..Default::default()
        };
        let text = format_configurations(&[("Contracts".to_string(), config)]).unwrap();

        assert!(text.contains("Experiment: Contracts"));
        assert!(text.contains("• LLM Model: mistral"));
        assert!(text.contains("• Child Chunk Size: 200 characters"));
        assert!(text.contains("• Parent Chunk Size: 1000 characters"));
        assert!(text.contains("• Total Uploaded Files: 4"));
    }
}
