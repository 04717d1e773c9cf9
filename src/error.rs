//! Error types for flaskbot

use thiserror::Error;

/// Main error type for flaskbot
#[derive(Debug, Error)]
pub enum Error {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(String),

    /// Session-related errors
    #[error("Session error: {0}")]
    Session(String),

    /// LLM client errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// User-input validation errors (400-class, reported verbatim)
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Resource exhaustion (rate limit, pool, deadline)
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SQL errors
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    /// Reqwest HTTP client errors
    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for flaskbot operations
pub type Result<T> = std::result::Result<T, Error>;
