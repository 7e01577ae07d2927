//! Error types for llamadesk

use thiserror::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the llamadesk system
#[derive(Error, Debug)]
pub enum Error {
    #[error("Model server unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Corrupt stored record: {0}")]
    StorageCorrupt(String),

    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Storage IO error: {0}")]
    StorageIo(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Whether the error means the model server could not be reached at all
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Error::BackendUnavailable(_))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts_to_storage_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io.into();
        assert!(matches!(err, Error::StorageIo(_)));
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_backend_unavailable_flag() {
        assert!(Error::BackendUnavailable("down".to_string()).is_backend_unavailable());
        assert!(!Error::NotReady("no retriever".to_string()).is_backend_unavailable());
    }
}
