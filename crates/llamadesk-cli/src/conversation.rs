//! Memory-augmented chat sessions

use llamadesk_core::llm::DEFAULT_TEMPERATURE;
use llamadesk_core::{ChatMessage, GenerationConfig, LLMProvider, Result, Role, TokenSink};

use crate::stream::clean_response;

/// Framing prompt for every chat turn
pub const CHAT_PROMPT_TEMPLATE: &str = "Current conversation:
{history}
Human: {input}
Assistant:";

/// A chat bound to one model, carrying the full exchange as memory
#[derive(Debug, Clone)]
pub struct ChatSession {
    model_id: String,
    temperature: f32,
    memory: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            temperature: DEFAULT_TEMPERATURE,
            memory: Vec::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Restore memory saved with a conversation
    pub fn with_memory(mut self, memory: Vec<ChatMessage>) -> Self {
        self.memory = memory;
        self
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn memory(&self) -> &[ChatMessage] {
        &self.memory
    }

    /// Memory rendered as `Human:` / `Assistant:` lines
    pub fn history(&self) -> String {
        self.memory
            .iter()
            .map(|message| {
                let speaker = match message.role {
                    Role::User => "Human",
                    Role::Assistant => "Assistant",
                    Role::System => "System",
                };
                format!("{}: {}", speaker, message.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn build_prompt(&self, input: &str) -> String {
        CHAT_PROMPT_TEMPLATE
            .replace("{history}", &self.history())
            .replace("{input}", input)
    }

    /// Run one exchange. Memory only grows when the model answers.
    pub async fn turn(
        &mut self,
        llm: &dyn LLMProvider,
        input: &str,
        on_token: TokenSink<'_>,
    ) -> Result<String> {
        let prompt = self.build_prompt(input);
        let config = GenerationConfig::for_model(&self.model_id).with_temperature(self.temperature);

        let result = llm.generate_stream(&prompt, &config, on_token).await?;
        let reply = clean_response(&result.text);

        self.memory.push(ChatMessage::user(input));
        self.memory.push(ChatMessage::assistant(reply.clone()));
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llamadesk_core::testing::ScriptedLLM;

    #[test]
    fn test_prompt_framing() {
        let session = ChatSession::new("llama3").with_memory(vec![
            ChatMessage::user("Hi"),
            ChatMessage::assistant("Hello!"),
        ]);

        assert_eq!(
            session.build_prompt("How are you?"),
            "Current conversation:\nHuman: Hi\nAssistant: Hello!\nHuman: How are you?\nAssistant:"
        );
    }

    #[tokio::test]
    async fn test_turn_appends_to_memory_and_cleans_reply() {
        let llm = ScriptedLLM::replying(&["<think>hmm</think>Fine, thanks."]);
        let mut session = ChatSession::new("qwen3");
        let mut sink = |_: &str| {};

        let reply = session.turn(&llm, "How are you?", &mut sink).await.unwrap();

        assert_eq!(reply, "Fine, thanks.");
        assert_eq!(
            session.memory(),
            &[
                ChatMessage::user("How are you?"),
                ChatMessage::assistant("Fine, thanks."),
            ]
        );

        let calls = llm.calls();
        assert_eq!(calls[0].model_id, "qwen3");
        assert_eq!(calls[0].temperature, Some(0.2));
    }

    #[tokio::test]
    async fn test_failed_turn_leaves_memory_untouched() {
        let llm = ScriptedLLM::failing();
        let mut session = ChatSession::new("llama3");
        let mut sink = |_: &str| {};

        assert!(session.turn(&llm, "Hello", &mut sink).await.is_err());
        assert!(session.memory().is_empty());
    }
}
