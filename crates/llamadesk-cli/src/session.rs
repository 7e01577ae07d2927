//! Session state owned by the front end
//!
//! A [`SessionContext`] holds the visible transcript, the identity of the
//! conversation being edited, the active model and its chat session. It is
//! the only writer of conversation records while the app runs.

use std::sync::Arc;
use tracing::warn;

use llamadesk_core::llm::DEFAULT_TEMPERATURE;
use llamadesk_core::{
    ChatMessage, Error, ExperimentConfig, LLMProvider, NEW_CONVERSATION_ID,
    NEW_CONVERSATION_TITLE, RagAnswer, Result, SourceFile, TokenSink,
};
use llamadesk_rag::RagEngine;
use llamadesk_store::{ConversationListing, ConversationStore, SavedConversation, derive_title};

use crate::conversation::ChatSession;
use crate::stream::clean_response;

/// Prefix of the transcript entry recorded when a turn fails
pub const TURN_ERROR_PREFIX: &str = "Error generating response";

pub struct SessionContext {
    llm: Arc<dyn LLMProvider>,
    conversations: ConversationStore,
    temperature: f32,
    messages: Vec<ChatMessage>,
    conversation_id: String,
    conversation_title: String,
    version_key: Option<String>,
    model_id: Option<String>,
    session: Option<ChatSession>,
    rag: Option<RagSession>,
}

impl SessionContext {
    pub fn new(llm: Arc<dyn LLMProvider>, conversations: ConversationStore) -> Self {
        Self {
            llm,
            conversations,
            temperature: DEFAULT_TEMPERATURE,
            messages: Vec::new(),
            conversation_id: NEW_CONVERSATION_ID.to_string(),
            conversation_title: NEW_CONVERSATION_TITLE.to_string(),
            version_key: None,
            model_id: None,
            session: None,
            rag: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Attach a RAG engine for document question answering
    pub fn with_rag(mut self, engine: RagEngine) -> Self {
        self.rag = Some(RagSession::new(engine));
        self
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn conversation_title(&self) -> &str {
        &self.conversation_title
    }

    /// Stored record backing the transcript, once it has been saved or loaded
    pub fn version_key(&self) -> Option<&str> {
        self.version_key.as_deref()
    }

    pub fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }

    pub fn rag(&self) -> Option<&RagSession> {
        self.rag.as_ref()
    }

    pub fn rag_mut(&mut self) -> Option<&mut RagSession> {
        self.rag.as_mut()
    }

    /// Chat session for `model_id`, created on first use.
    ///
    /// Switching to a different model starts a fresh, unsaved conversation.
    pub fn get_session(&mut self, model_id: &str) -> &mut ChatSession {
        if self.model_id.as_deref() != Some(model_id) {
            if self.model_id.is_some() {
                self.new_conversation();
            }
            self.model_id = Some(model_id.to_string());
        }

        let temperature = self.temperature;
        self.session
            .get_or_insert_with(|| ChatSession::new(model_id).with_temperature(temperature))
    }

    /// Forget the transcript and start an unsaved conversation with the same model
    pub fn new_conversation(&mut self) {
        self.messages.clear();
        self.session = None;
        self.conversation_id = NEW_CONVERSATION_ID.to_string();
        self.conversation_title = NEW_CONVERSATION_TITLE.to_string();
        self.version_key = None;
    }

    /// One user turn against `model_id`, saved afterwards.
    ///
    /// A failed turn is still recorded: the transcript gets an assistant entry
    /// describing the error, and the error is returned.
    pub async fn chat_turn(
        &mut self,
        model_id: &str,
        user_text: &str,
        on_token: TokenSink<'_>,
    ) -> Result<String> {
        let llm = Arc::clone(&self.llm);
        // May reset the transcript, so it runs before the user message is added
        self.get_session(model_id);
        self.messages.push(ChatMessage::user(user_text));

        let outcome = match self.session.as_mut() {
            Some(session) => session.turn(llm.as_ref(), user_text, on_token).await,
            None => Err(Error::NotReady("No chat session".to_string())),
        };

        match &outcome {
            Ok(reply) => self.messages.push(ChatMessage::assistant(reply.clone())),
            Err(e) => self
                .messages
                .push(ChatMessage::assistant(format!("{}: {}", TURN_ERROR_PREFIX, e))),
        }
        self.save();
        outcome
    }

    /// Persist the transcript; the first save fixes the conversation id
    pub fn save(&mut self) -> Option<SavedConversation> {
        let model_id = self.model_id.as_deref().unwrap_or("unknown");
        let memory = self
            .session
            .as_ref()
            .map(|s| s.memory().to_vec())
            .unwrap_or_default();

        let saved = self.conversations.save(
            &self.conversation_id,
            &self.messages,
            model_id,
            &memory,
            Some(&self.conversation_title),
        )?;

        self.conversation_title = derive_title(Some(&self.conversation_title), &self.messages);
        self.conversation_id = saved.logical_id.clone();
        self.version_key = Some(saved.version_key.clone());
        Some(saved)
    }

    pub fn list_conversations(&self) -> Vec<ConversationListing> {
        self.conversations.list_all()
    }

    /// Continue a saved conversation, restoring its model and memory
    pub fn load_conversation(&mut self, version_key: &str) -> bool {
        let Some(record) = self.conversations.load(version_key) else {
            warn!(version_key = %version_key, "could not load conversation");
            return false;
        };

        let logical_id = if record.logical_id.is_empty() {
            logical_id_from_version_key(version_key)
        } else {
            record.logical_id.clone()
        };

        self.session = Some(
            ChatSession::new(record.model_id.clone())
                .with_temperature(self.temperature)
                .with_memory(record.memory),
        );
        self.model_id = Some(record.model_id);
        self.messages = record.messages;
        self.conversation_id = logical_id;
        self.version_key = Some(version_key.to_string());
        self.conversation_title = if record.title.is_empty() {
            NEW_CONVERSATION_TITLE.to_string()
        } else {
            record.title
        };
        true
    }

    /// Delete a saved conversation and start over with an empty one
    pub fn delete_conversation(&mut self, version_key: &str) -> bool {
        let deleted = self.conversations.delete(version_key);
        self.new_conversation();
        deleted
    }
}

/// `{logical_id}_{YYYYMMDD}_{HHMMSS}` back to `logical_id`, for records written without one
fn logical_id_from_version_key(version_key: &str) -> String {
    let mut parts = version_key.rsplitn(3, '_');
    let (time, date, id) = (parts.next(), parts.next(), parts.next());
    let is_digits = |s: Option<&str>, len: usize| {
        s.is_some_and(|s| s.len() == len && s.bytes().all(|b| b.is_ascii_digit()))
    };

    match id {
        Some(id) if is_digits(date, 8) && is_digits(time, 6) && !id.is_empty() => id.to_string(),
        _ => version_key.to_string(),
    }
}

/// Document question answering state: the engine, the experiment it serves
/// and the RAG transcript.
pub struct RagSession {
    engine: RagEngine,
    config: Option<ExperimentConfig>,
    messages: Vec<ChatMessage>,
}

impl RagSession {
    pub fn new(engine: RagEngine) -> Self {
        Self {
            engine,
            config: None,
            messages: Vec::new(),
        }
    }

    pub fn engine(&self) -> &RagEngine {
        &self.engine
    }

    /// Configuration of the active experiment
    pub fn config(&self) -> Option<&ExperimentConfig> {
        self.config.as_ref()
    }

    pub fn experiment_name(&self) -> Option<&str> {
        self.config.as_ref().map(|c| c.experiment_name.as_str())
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Build a new experiment from files; it becomes active but is not saved
    pub async fn process(
        &mut self,
        files: &[SourceFile],
        experiment_name: &str,
        llm_model: &str,
        embedding_model: &str,
        chunk_size: usize,
        top_k: usize,
    ) -> Result<usize> {
        let total_documents = self
            .engine
            .process_documents(files, experiment_name, embedding_model, chunk_size, top_k)
            .await?;

        self.config = Some(ExperimentConfig {
            experiment_name: experiment_name.to_string(),
            llm_model: llm_model.to_string(),
            embedding_model: embedding_model.to_string(),
            chunk_size,
            top_k,
            total_documents,
        });
        self.messages.clear();
        Ok(total_documents)
    }

    /// Make a saved experiment active
    pub fn load(&mut self, experiment_name: &str) -> Option<&ExperimentConfig> {
        let config = self.engine.load_experiment(experiment_name)?;
        self.messages.clear();
        Some(self.config.insert(config))
    }

    /// Save the active experiment under its name
    pub fn save(&self) -> bool {
        match &self.config {
            Some(config) => self.engine.save_experiment(config),
            None => {
                warn!("no active experiment to save");
                false
            }
        }
    }

    /// Switch the model answering questions for the active experiment
    pub fn set_llm_model(&mut self, llm_model: &str) {
        if let Some(config) = self.config.as_mut() {
            config.llm_model = llm_model.to_string();
        }
    }

    /// Ask a question of the active experiment, recording both sides
    pub async fn ask(&mut self, question: &str, on_token: TokenSink<'_>) -> Result<RagAnswer> {
        let Some(config) = &self.config else {
            return Err(Error::NotReady(
                "Process documents or load an experiment first".to_string(),
            ));
        };

        self.messages.push(ChatMessage::user(question));
        let outcome = self
            .engine
            .query_stream(question, &config.llm_model, on_token)
            .await
            .map(|answer| RagAnswer {
                answer: clean_response(&answer.answer),
                sources: answer.sources,
            });

        match &outcome {
            Ok(answer) => self.messages.push(ChatMessage::assistant(answer.answer.clone())),
            Err(e) => self
                .messages
                .push(ChatMessage::assistant(format!("{}: {}", TURN_ERROR_PREFIX, e))),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llamadesk_core::testing::ScriptedLLM;
    use llamadesk_core::Role;
    use llamadesk_ollama::{EmbeddingCatalog, OllamaConfig};
    use llamadesk_store::ExperimentStore;
    use tempfile::{TempDir, tempdir};

    fn context(llm: Arc<ScriptedLLM>) -> (SessionContext, TempDir) {
        let dir = tempdir().unwrap();
        let store = ConversationStore::new(dir.path().join("conversations")).unwrap();
        (SessionContext::new(llm, store), dir)
    }

    fn quiet() -> impl FnMut(&str) + Send {
        |_: &str| {}
    }

    #[tokio::test]
    async fn test_first_turn_saves_and_fixes_id() {
        let llm = Arc::new(ScriptedLLM::replying(&["Tunnelling is..."]));
        let (mut ctx, _dir) = context(llm);

        let reply = ctx
            .chat_turn(
                "llama3",
                "Explain quantum tunnelling in simple terms please",
                &mut quiet(),
            )
            .await
            .unwrap();

        assert_eq!(reply, "Tunnelling is...");
        assert_eq!(ctx.conversation_id(), "Explain_quantum_tunnelling_in_simple_ter");
        assert_eq!(ctx.conversation_title(), "Explain quantum tunnelling in simple ter");

        let listed = ctx.list_conversations();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].version_key.starts_with("Explain_quantum_tunnelling_in_simple_ter_"));
    }

    #[tokio::test]
    async fn test_resave_keeps_one_record() {
        let llm = Arc::new(ScriptedLLM::replying(&["one", "two"]));
        let (mut ctx, _dir) = context(llm);

        ctx.chat_turn("llama3", "first question", &mut quiet()).await.unwrap();
        let id = ctx.conversation_id().to_string();
        ctx.chat_turn("llama3", "second question", &mut quiet()).await.unwrap();

        assert_eq!(ctx.conversation_id(), id);
        assert_eq!(ctx.messages().len(), 4);
        assert_eq!(ctx.list_conversations().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_turn_becomes_error_message() {
        let (mut ctx, _dir) = context(Arc::new(ScriptedLLM::failing()));

        let err = ctx.chat_turn("llama3", "hello", &mut quiet()).await.unwrap_err();
        assert!(err.is_backend_unavailable());

        let last = ctx.messages().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert!(last.content.starts_with(TURN_ERROR_PREFIX));
        // The failed exchange is still persisted
        assert_eq!(ctx.list_conversations().len(), 1);
    }

    #[tokio::test]
    async fn test_model_change_resets_conversation() {
        let llm = Arc::new(ScriptedLLM::replying(&["hi"]));
        let (mut ctx, _dir) = context(llm);

        ctx.chat_turn("llama3", "hello", &mut quiet()).await.unwrap();
        assert_eq!(ctx.get_session("llama3").memory().len(), 2);

        let session = ctx.get_session("mistral");
        assert_eq!(session.model_id(), "mistral");
        assert!(session.memory().is_empty());
        assert!(ctx.messages().is_empty());
        assert_eq!(ctx.conversation_id(), NEW_CONVERSATION_ID);
    }

    #[tokio::test]
    async fn test_load_restores_memory_and_continues_same_record() {
        let llm = Arc::new(ScriptedLLM::replying(&["Paris.", "About 2 million."]));
        let (mut ctx, _dir) = context(llm.clone());

        ctx.chat_turn("llama3", "Capital of France?", &mut quiet()).await.unwrap();
        let key = ctx.list_conversations()[0].version_key.clone();

        ctx.new_conversation();
        assert!(ctx.messages().is_empty());

        assert!(ctx.load_conversation(&key));
        assert_eq!(ctx.conversation_id(), "Capital_of_France");
        assert_eq!(ctx.messages().len(), 2);

        ctx.chat_turn("llama3", "Population?", &mut quiet()).await.unwrap();
        assert!(llm.prompts()[1].contains("Human: Capital of France?\nAssistant: Paris."));
        assert_eq!(ctx.list_conversations().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_resets_session() {
        let (mut ctx, _dir) = context(Arc::new(ScriptedLLM::replying(&["ok"])));
        ctx.chat_turn("llama3", "temporary", &mut quiet()).await.unwrap();
        let key = ctx.list_conversations()[0].version_key.clone();

        assert_eq!(ctx.version_key(), Some(key.as_str()));
        assert!(ctx.delete_conversation(&key));
        assert!(ctx.messages().is_empty());
        assert_eq!(ctx.conversation_title(), NEW_CONVERSATION_TITLE);
        assert!(ctx.list_conversations().is_empty());
        assert!(!ctx.load_conversation(&key));
    }

    #[test]
    fn test_logical_id_from_version_key() {
        assert_eq!(logical_id_from_version_key("my_chat_20240301_090000"), "my_chat");
        assert_eq!(logical_id_from_version_key("plain"), "plain");
        assert_eq!(logical_id_from_version_key("a_b_c"), "a_b_c");
    }

    fn rag_session(llm: Arc<ScriptedLLM>, dir: &TempDir) -> RagSession {
        let engine = RagEngine::new(
            llm,
            ExperimentStore::new(dir.path().join("experiments")).unwrap(),
            EmbeddingCatalog::default(),
            OllamaConfig::new("http://127.0.0.1:1"),
        );
        RagSession::new(engine)
    }

    #[tokio::test]
    async fn test_rag_session_flow() {
        let dir = tempdir().unwrap();
        let llm = Arc::new(ScriptedLLM::replying(&["<think>look</think>Two minutes."]));
        let mut rag = rag_session(llm, &dir);

        let err = rag.ask("anything", &mut quiet()).await.unwrap_err();
        assert!(matches!(err, Error::NotReady(_)));

        let files = [SourceFile::new("tea.txt", "Steep green tea for two minutes.")];
        let count = rag
            .process(&files, "Tea", "llama3", "local-hash", 300, 4)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(rag.experiment_name(), Some("Tea"));

        let answer = rag.ask("How long?", &mut quiet()).await.unwrap();
        assert_eq!(answer.answer, "Two minutes.");
        assert_eq!(rag.messages().len(), 2);

        assert!(rag.save());
        let config = rag.load("Tea").unwrap();
        assert_eq!(config.total_documents, 1);
        assert!(rag.messages().is_empty());
    }
}
