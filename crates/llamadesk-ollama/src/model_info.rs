//! Parsing of `ollama show` output

use serde::Serialize;
use std::fmt;

const NOT_AVAILABLE: &str = "N/A";

/// Model metadata extracted from `ollama show`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub architecture: String,
    pub parameters: String,
    pub quantization: String,
    pub context_length: String,
    pub embedding_length: String,
}

impl ModelInfo {
    /// Extract the known fields; any that cannot be found become `N/A`
    pub fn parse(raw: &str) -> Self {
        Self {
            architecture: value_after(raw, "architecture"),
            parameters: value_after(raw, "parameters"),
            quantization: value_after(raw, "quantization"),
            context_length: value_after(raw, "context length"),
            embedding_length: value_after(raw, "embedding length"),
        }
    }
}

/// Rest of the line following the first occurrence of `key`
fn value_after(raw: &str, key: &str) -> String {
    raw.find(key)
        .and_then(|pos| raw[pos + key.len()..].lines().next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(NOT_AVAILABLE)
        .to_string()
}

/// Outcome of a model information request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ModelInfoReport {
    Available(ModelInfo),
    /// The model exists in name only: still downloading or broken
    Unavailable { model: String },
}

impl fmt::Display for ModelInfoReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelInfoReport::Available(info) => {
                writeln!(f, "Model Architecture")?;
                writeln!(f, "------------------")?;
                writeln!(f, "• Architecture: {}", info.architecture)?;
                writeln!(f, "• Parameters: {}", info.parameters)?;
                writeln!(f, "• Quantization: {}", info.quantization)?;
                writeln!(f)?;
                writeln!(f, "Context Settings")?;
                writeln!(f, "----------------")?;
                writeln!(f, "• Context Length: {}", info.context_length)?;
                write!(f, "• Embedding Length: {}", info.embedding_length)
            }
            ModelInfoReport::Unavailable { model } => {
                writeln!(f, "Model Information Unavailable")?;
                writeln!(f, "-----------------------------")?;
                writeln!(f, "Unable to fetch model details. The model might be:")?;
                writeln!(f, "• Still downloading")?;
                writeln!(f, "• Partially downloaded")?;
                writeln!(f, "• Not properly installed")?;
                writeln!(f)?;
                write!(
                    f,
                    "You can try: 'ollama show {}' in terminal for more details.",
                    model
                )
            }
        }
    }
}
