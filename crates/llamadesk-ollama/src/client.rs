//! Ollama server client implementation

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use llamadesk_core::config::MODEL_FILTER_KEYWORDS;
use llamadesk_core::{Error, GenerationConfig, GenerationResult, LLMProvider, Result, TokenSink};

use crate::config::OllamaConfig;
use crate::model_info::{ModelInfo, ModelInfoReport};

/// Ollama server client
///
/// Talks HTTP to the server for listing, generation and embeddings, and
/// shells out to the `ollama` command for `show` and `pull`.
#[derive(Clone)]
pub struct OllamaClient {
    config: OllamaConfig,
    client: Client,
}

/// Installed model as reported by `/api/tags`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modified_at: String,
    #[serde(default)]
    pub details: ModelDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDetails {
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub parameter_size: String,
    #[serde(default)]
    pub quantization_level: String,
}

/// Result of an `ollama pull`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullOutcome {
    pub success: bool,
    pub message: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelDescriptor>,
}

#[derive(Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

/// One NDJSON line of `/api/generate` output (or the whole body when not streaming)
#[derive(Debug, Deserialize)]
pub(crate) struct GenerateChunk {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub eval_count: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Drop installed models that are not usable for chat (embedders, failed pulls)
pub fn filter_chat_models<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names
        .into_iter()
        .map(Into::into)
        .filter(|name| {
            let lower = name.to_lowercase();
            !MODEL_FILTER_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
        })
        .collect()
}

impl OllamaClient {
    /// Create a new client from configuration
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    /// Create a new client from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(OllamaConfig::from_env()?))
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    /// Map a transport failure onto the error kinds callers branch on
    pub(crate) fn request_error(&self, e: reqwest::Error) -> Error {
        if e.is_connect() {
            Error::BackendUnavailable(format!(
                "Ollama server not running at {}. Start it with: ollama serve",
                self.config.base_url
            ))
        } else if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else {
            Error::Network(e.to_string())
        }
    }

    /// Check whether the server answers on `/api/tags`
    pub async fn is_running(&self) -> bool {
        match self
            .client
            .get(self.config.endpoint("api/tags"))
            .timeout(self.config.health_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "ollama health check failed");
                false
            }
        }
    }

    /// All installed models with their details
    pub async fn list_models(&self) -> Result<Vec<ModelDescriptor>> {
        let response = self
            .client
            .get(self.config.endpoint("api/tags"))
            .timeout(self.config.list_timeout)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            return Err(Error::LLMProvider(format!(
                "Listing models failed with status {}",
                response.status()
            )));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(tags.models)
    }

    /// Names of installed models usable for chat
    pub async fn available_models(&self) -> Result<Vec<String>> {
        let models = self.list_models().await?;
        Ok(filter_chat_models(models.into_iter().map(|m| m.name)))
    }

    /// Run `ollama show` and parse the model metadata.
    ///
    /// A non-zero exit, empty output or timeout yields the unavailable report;
    /// `None` means the command could not be run at all.
    pub async fn model_info(&self, model_name: &str) -> Option<ModelInfoReport> {
        let child = Command::new(&self.config.ollama_bin)
            .arg("show")
            .arg(model_name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!(model = %model_name, error = %e, "failed to run ollama show");
                return None;
            }
        };

        let unavailable = || ModelInfoReport::Unavailable {
            model: model_name.to_string(),
        };

        match timeout(self.config.show_timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                if output.status.success() && !stdout.trim().is_empty() {
                    Some(ModelInfoReport::Available(ModelInfo::parse(&stdout)))
                } else {
                    Some(unavailable())
                }
            }
            Ok(Err(e)) => {
                warn!(model = %model_name, error = %e, "ollama show did not complete");
                None
            }
            Err(_) => {
                warn!(model = %model_name, "ollama show timed out");
                Some(unavailable())
            }
        }
    }

    /// Download a model with `ollama pull`
    pub async fn pull_model(&self, model_name: &str) -> PullOutcome {
        info!(model = %model_name, "pulling model");

        let child = Command::new(&self.config.ollama_bin)
            .arg("pull")
            .arg(model_name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                return PullOutcome {
                    success: false,
                    message: format!("Error downloading {}: {}", model_name, e),
                };
            }
        };

        match timeout(self.config.pull_timeout, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => PullOutcome {
                success: true,
                message: format!("Successfully installed {}", model_name),
            },
            Ok(Ok(output)) => PullOutcome {
                success: false,
                message: format!(
                    "Error pulling {}: {}",
                    model_name,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            },
            Ok(Err(e)) => PullOutcome {
                success: false,
                message: format!("Error downloading {}: {}", model_name, e),
            },
            Err(_) => PullOutcome {
                success: false,
                message: format!(
                    "Error pulling {}: timed out after {}s",
                    model_name,
                    self.config.pull_timeout.as_secs()
                ),
            },
        }
    }

    async fn post_generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
        stream: bool,
    ) -> Result<reqwest::Response> {
        if config.model_id.is_empty() {
            return Err(Error::InvalidInput("No model selected".to_string()));
        }

        let request = GenerateRequest {
            model: &config.model_id,
            prompt,
            stream,
            options: GenerateOptions {
                temperature: config.temperature,
                num_predict: config.max_tokens,
                stop: config.stop_sequences.clone(),
            },
        };

        debug!(model = %config.model_id, stream, "ollama generate");

        let response = self
            .client
            .post(self.config.endpoint("api/generate"))
            .json(&request)
            .timeout(config.timeout)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::LLMProvider(format!(
                "Ollama generate failed with status {}: {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

/// Parse one NDJSON line; blank lines yield `None`
pub(crate) fn parse_generate_line(line: &[u8]) -> Result<Option<GenerateChunk>> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let chunk: GenerateChunk = serde_json::from_str(line)?;
    if let Some(error) = chunk.error {
        return Err(Error::LLMProvider(error));
    }
    Ok(Some(chunk))
}

#[async_trait]
impl LLMProvider for OllamaClient {
    async fn generate_with_config(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<GenerationResult> {
        let response = self.post_generate(prompt, config, false).await?;
        let body = response.bytes().await.map_err(|e| self.request_error(e))?;

        let chunk = parse_generate_line(&body)?
            .ok_or_else(|| Error::LLMProvider("Empty response from Ollama".to_string()))?;

        Ok(GenerationResult {
            text: chunk.response,
            model_id: config.model_id.clone(),
            tokens_used: chunk.eval_count,
        })
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        config: &GenerationConfig,
        on_token: TokenSink<'_>,
    ) -> Result<GenerationResult> {
        let response = self.post_generate(prompt, config, true).await?;
        let mut stream = response.bytes_stream();

        let mut pending: Vec<u8> = Vec::new();
        let mut text = String::new();
        let mut tokens_used = None;
        let mut handle = |chunk: GenerateChunk, text: &mut String| {
            if !chunk.response.is_empty() {
                on_token(&chunk.response);
                text.push_str(&chunk.response);
            }
            chunk.done.then_some(chunk.eval_count).flatten()
        };

        while let Some(bytes) = stream.next().await {
            let bytes = bytes.map_err(|e| self.request_error(e))?;
            pending.extend_from_slice(&bytes);

            while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                if let Some(chunk) = parse_generate_line(&line)? {
                    if let Some(count) = handle(chunk, &mut text) {
                        tokens_used = Some(count);
                    }
                }
            }
        }

        if let Some(chunk) = parse_generate_line(&pending)? {
            if let Some(count) = handle(chunk, &mut text) {
                tokens_used = Some(count);
            }
        }

        Ok(GenerationResult {
            text,
            model_id: config.model_id.clone(),
            tokens_used,
        })
    }

    fn name(&self) -> &str {
        "Ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_client() -> OllamaClient {
        // Port 1 is never served in test environments, so connects are refused
        OllamaClient::new(OllamaConfig::new("http://127.0.0.1:1"))
    }

    #[test]
    fn test_filter_chat_models() {
        let names = vec![
            "llama3:8b",
            "nomic-embed-text:latest",
            "BGE-m3",
            "mistral-failed",
            "qwen2.5:7b",
        ];
        assert_eq!(filter_chat_models(names), vec!["llama3:8b", "qwen2.5:7b"]);
    }

    #[test]
    fn test_tags_response_parsing() {
        let body = r#"{"models":[{"name":"llama3:8b","size":4661224676,"modified_at":"2024-05-01T10:00:00Z",
            "details":{"family":"llama","parameter_size":"8.0B","quantization_level":"Q4_0"}},
            {"name":"tiny"}]}"#;
        let tags: TagsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(tags.models.len(), 2);
        assert_eq!(tags.models[0].details.parameter_size, "8.0B");
        assert_eq!(tags.models[1].size, 0);
        assert!(tags.models[1].details.family.is_empty());
    }

    #[test]
    fn test_parse_generate_line() {
        assert!(parse_generate_line(b"  \n").unwrap().is_none());

        let chunk = parse_generate_line(br#"{"response":"Hel","done":false}"#)
            .unwrap()
            .unwrap();
        assert_eq!(chunk.response, "Hel");
        assert!(!chunk.done);

        let last = parse_generate_line(br#"{"response":"","done":true,"eval_count":12}"#)
            .unwrap()
            .unwrap();
        assert_eq!(last.eval_count, Some(12));

        let err = parse_generate_line(br#"{"error":"model 'x' not found"}"#).unwrap_err();
        assert!(matches!(err, Error::LLMProvider(msg) if msg.contains("not found")));
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let client = unreachable_client();
        assert!(!client.is_running().await);

        let err = client.available_models().await.unwrap_err();
        assert!(err.is_backend_unavailable());

        let err = client
            .generate_with_config("hi", &GenerationConfig::for_model("llama3"))
            .await
            .unwrap_err();
        assert!(err.is_backend_unavailable());
    }

    #[tokio::test]
    async fn test_generate_requires_model() {
        let err = unreachable_client()
            .generate_with_config("hi", &GenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_model_info_missing_binary_is_absent() {
        let client = OllamaClient::new(
            OllamaConfig::default().with_ollama_bin("llamadesk-no-such-binary"),
        );
        assert!(client.model_info("llama3").await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_model_info_failed_command_is_unavailable() {
        let client = OllamaClient::new(OllamaConfig::default().with_ollama_bin("false"));
        let report = client.model_info("llama3").await.unwrap();
        assert_eq!(
            report,
            ModelInfoReport::Unavailable {
                model: "llama3".to_string()
            }
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pull_failure_reports_message() {
        let client = OllamaClient::new(OllamaConfig::default().with_ollama_bin("false"));
        let outcome = client.pull_model("llama3").await;
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("Error pulling llama3"));

        let client = OllamaClient::new(OllamaConfig::default().with_ollama_bin("true"));
        let outcome = client.pull_model("llama3").await;
        assert!(outcome.success);
        assert_eq!(outcome.message, "Successfully installed llama3");
    }
}
