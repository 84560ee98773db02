//! Error types for the question-answering chain.

use thiserror::Error;

/// Result type alias for chain operations.
pub type Result<T> = std::result::Result<T, ChainError>;

/// Errors that can occur while configuring or invoking a chain.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Error from the LLM backend.
    #[error("Backend error: {0}")]
    Backend(String),

    /// HTTP/network error.
    #[error("Network error: {0}")]
    Network(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Prompt template error (missing or misnamed slot).
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Invalid chain input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Graph store error.
    #[error("Graph error: {0}")]
    Graph(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for ChainError {
    fn from(e: reqwest::Error) -> Self {
        ChainError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(e: serde_json::Error) -> Self {
        ChainError::Serialization(e.to_string())
    }
}

impl From<medrag_graph::StoreError> for ChainError {
    fn from(e: medrag_graph::StoreError) -> Self {
        ChainError::Graph(e.to_string())
    }
}
