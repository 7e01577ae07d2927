//! Application configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::llm::DEFAULT_TEMPERATURE;
use crate::{Error, Result};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_CHUNK_SIZE: usize = 300;
pub const DEFAULT_TOP_K: usize = 4;

/// Parent chunks are this many times larger than child chunks
pub const PARENT_CHUNK_MULTIPLIER: usize = 5;

/// Overlap between neighbouring chunks, as a fraction of the chunk size
pub const CHUNK_OVERLAP_RATIO: f64 = 0.1;

/// Installed models whose name contains one of these are hidden from chat model lists
pub const MODEL_FILTER_KEYWORDS: &[&str] = &["failed", "embed", "bge"];

/// Configuration for the whole application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the Ollama server
    pub ollama_url: String,
    /// Root of runtime data (conversations, experiments)
    pub data_dir: PathBuf,
    /// Directory holding the model catalogs
    pub config_dir: PathBuf,
    pub temperature: f32,
    pub show_timeout: Duration,
    pub pull_timeout: Duration,
    /// Per-request limit for embedding calls to the server
    pub request_timeout: Duration,
    pub default_chunk_size: usize,
    pub default_top_k: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            data_dir: PathBuf::from("data"),
            config_dir: PathBuf::from("config"),
            temperature: DEFAULT_TEMPERATURE,
            show_timeout: Duration::from_secs(30),
            pull_timeout: Duration::from_secs(3600),
            request_timeout: Duration::from_secs(600),
            default_chunk_size: DEFAULT_CHUNK_SIZE,
            default_top_k: DEFAULT_TOP_K,
        }
    }
}

impl AppConfig {
    /// Create configuration from environment variables (and a `.env` file if present)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup("LLAMADESK_OLLAMA_URL") {
            config.ollama_url = validate_url(&url)?;
        }
        if let Some(dir) = lookup("LLAMADESK_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("LLAMADESK_CONFIG_DIR") {
            config.config_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup("LLAMADESK_TEMPERATURE") {
            config.temperature = parse_value("LLAMADESK_TEMPERATURE", &value)?;
        }
        if let Some(value) = lookup("LLAMADESK_SHOW_TIMEOUT_SECS") {
            config.show_timeout =
                Duration::from_secs(parse_value("LLAMADESK_SHOW_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = lookup("LLAMADESK_PULL_TIMEOUT_SECS") {
            config.pull_timeout =
                Duration::from_secs(parse_value("LLAMADESK_PULL_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = lookup("LLAMADESK_REQUEST_TIMEOUT_SECS") {
            config.request_timeout =
                Duration::from_secs(parse_value("LLAMADESK_REQUEST_TIMEOUT_SECS", &value)?);
        }

        Ok(config)
    }

    pub fn with_ollama_url(mut self, url: impl Into<String>) -> Self {
        self.ollama_url = url.into();
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    pub fn conversations_dir(&self) -> PathBuf {
        self.data_dir.join("saved_conversations")
    }

    pub fn experiments_dir(&self) -> PathBuf {
        self.data_dir.join("experiments")
    }

    pub fn model_library_file(&self) -> PathBuf {
        self.config_dir.join("ollama_models.json")
    }

    pub fn embedding_models_file(&self) -> PathBuf {
        self.config_dir.join("embedding_models.json")
    }
}

fn validate_url(raw: &str) -> Result<String> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| Error::Configuration(format!("Invalid LLAMADESK_OLLAMA_URL '{}': {}", raw, e)))?;
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Configuration(format!("{} has an invalid value: '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.ollama_url, DEFAULT_OLLAMA_URL);
        assert_eq!(config.default_chunk_size, 300);
        assert_eq!(config.default_top_k, 4);
        assert_eq!(config.conversations_dir(), PathBuf::from("data/saved_conversations"));
        assert_eq!(config.experiments_dir(), PathBuf::from("data/experiments"));
    }

    #[test]
    fn test_overrides_from_lookup() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("LLAMADESK_OLLAMA_URL", "http://gpu-box:11434/"),
            ("LLAMADESK_DATA_DIR", "/tmp/llamadesk"),
            ("LLAMADESK_PULL_TIMEOUT_SECS", "60"),
            ("LLAMADESK_REQUEST_TIMEOUT_SECS", "90"),
        ]))
        .unwrap();
        assert_eq!(config.ollama_url, "http://gpu-box:11434");
        assert_eq!(config.experiments_dir(), PathBuf::from("/tmp/llamadesk/experiments"));
        assert_eq!(config.pull_timeout, Duration::from_secs(60));
        assert_eq!(config.request_timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_invalid_values_are_configuration_errors() {
        let err = AppConfig::from_lookup(lookup_from(&[("LLAMADESK_OLLAMA_URL", "not a url")]))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = AppConfig::from_lookup(lookup_from(&[("LLAMADESK_TEMPERATURE", "warm")]))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
