//! Ollama client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use llamadesk_core::{AppConfig, Result};

/// Configuration for the Ollama client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub base_url: String,
    /// Command used for `show` and `pull`
    pub ollama_bin: String,
    pub health_timeout: Duration,
    pub list_timeout: Duration,
    pub show_timeout: Duration,
    pub pull_timeout: Duration,
    /// Limit for each `/api/embed` request
    pub embed_timeout: Duration,
}

impl OllamaConfig {
    /// Create configuration with an explicit server URL and default timeouts
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ollama_bin: "ollama".to_string(),
            health_timeout: Duration::from_secs(5),
            list_timeout: Duration::from_secs(10),
            show_timeout: Duration::from_secs(30),
            pull_timeout: Duration::from_secs(3600),
            embed_timeout: Duration::from_secs(600),
        }
    }

    /// Derive the client settings from the application configuration
    pub fn from_app(app: &AppConfig) -> Self {
        Self {
            show_timeout: app.show_timeout,
            pull_timeout: app.pull_timeout,
            embed_timeout: app.request_timeout,
            ..Self::new(app.ollama_url.clone())
        }
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_app(&AppConfig::from_env()?))
    }

    pub fn with_ollama_bin(mut self, bin: impl Into<String>) -> Self {
        self.ollama_bin = bin.into();
        self
    }

    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self::new(llamadesk_core::config::DEFAULT_OLLAMA_URL)
    }
}
