//! Shared HTTP client configuration
//!
//! Provides pre-configured HTTP clients with timeouts appropriate for the
//! outbound calls this service makes (LLM completions, embedding calls).
//! All clients should go through these constructors so timeout behavior
//! and connection pooling stay consistent.

use std::time::Duration;

/// Connect timeout in seconds (time to establish TCP connection)
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Request timeout for LLM completion calls, per spec.md §5
pub const LLM_TIMEOUT_SECS: u64 = 20;

/// Request timeout for embedding calls, per spec.md §5
pub const EMBEDDING_TIMEOUT_SECS: u64 = 10;

/// Create an HTTP client for LLM completion requests
pub fn llm_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(LLM_TIMEOUT_SECS))
        .build()
        .expect("Failed to build LLM HTTP client")
}

/// Create an HTTP client for embedding requests
pub fn embedding_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(EMBEDDING_TIMEOUT_SECS))
        .build()
        .expect("Failed to build embedding HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_client_creation() {
        let client = llm_client();
        drop(client);
    }

    #[test]
    fn test_embedding_client_creation() {
        let client = embedding_client();
        drop(client);
    }
}
