//! Error types for Emoflux

use thiserror::Error;

/// Errors that can occur anywhere in the emotion pipeline
#[derive(Debug, Error)]
pub enum FluxError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unknown emotion label: {0}")]
    UnknownEmotion(String),

    #[error("Unknown observation source: {0}")]
    UnknownSource(String),

    #[error("Input text is empty")]
    EmptyInput,

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Suggestion request failed: {0}")]
    SuggestionRequest(String),

    #[error("Suggestion service responded with status {0}")]
    SuggestionStatus(u16),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Errors raised by a persistence backend
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage quota exceeded: {needed} bytes needed, quota is {quota} bytes")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}
