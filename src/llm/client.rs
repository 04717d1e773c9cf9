//! LLM client implementation
//!
//! Provides an HTTP client for an OpenAI-compatible chat-completions API,
//! and the trait the rest of the crate programs against.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::http_client;

/// A single completion request
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            system: None,
            prompt: prompt.into(),
            max_tokens: 1024,
            temperature: 0.3,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// A completion response
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Abstract language-model capability. A production implementation talks to
/// a remote service; a test implementation returns a scripted reply.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse>;
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Usage,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// HTTP-backed LLM client speaking the OpenAI chat-completions wire format.
#[derive(Clone)]
pub struct HttpLlmClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpLlmClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            client: http_client::llm_client(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.llm_api_key.clone(), config.llm_base_url.clone())
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let mut messages = Vec::new();
        if let Some(system) = request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.prompt,
        });

        let body = ChatCompletionRequest {
            model: request.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: false,
        };

        let response = tokio::time::timeout(
            Duration::from_secs(http_client::LLM_TIMEOUT_SECS),
            self.client
                .post(format!("{}/v1/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body)
                .send(),
        )
        .await
        .map_err(|_| Error::ResourceExhausted("LLM call exceeded deadline".into()))??;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("provider returned {}: {}", status, text)));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Llm(format!("failed to parse provider response: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Llm("provider returned no choices".into()))?
            .message
            .content;

        Ok(LlmResponse {
            content,
            input_tokens: parsed.usage.prompt_tokens,
            output_tokens: parsed.usage.completion_tokens,
        })
    }
}

/// Token-bucket rate limiter wrapping an inner [`LlmClient`], per spec.md
/// §5's "own rate-limit token bucket" requirement. A background task
/// refills the semaphore to `capacity` permits once a minute; callers
/// waiting longer than `max_wait` fail fast rather than queue forever.
pub struct RateLimitedLlmClient {
    inner: Arc<dyn LlmClient>,
    permits: Arc<Semaphore>,
    max_wait: Duration,
}

impl RateLimitedLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, requests_per_minute: u32) -> Self {
        let permits = Arc::new(Semaphore::new(requests_per_minute as usize));
        let refill = permits.clone();
        let capacity = requests_per_minute as usize;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(60));
            loop {
                ticker.tick().await;
                let available = refill.available_permits();
                if available < capacity {
                    refill.add_permits(capacity - available);
                }
            }
        });
        Self { inner, permits, max_wait: Duration::from_secs(10) }
    }
}

#[async_trait]
impl LlmClient for RateLimitedLlmClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let permit = tokio::time::timeout(self.max_wait, self.permits.clone().acquire_owned())
            .await
            .map_err(|_| Error::ResourceExhausted("language-model rate limit exhausted".into()))?
            .map_err(|_| Error::Other("rate limit semaphore closed".into()))?;
        // Forget the permit rather than returning it on drop: the bucket
        // refills on the minute ticker, not on request completion.
        permit.forget();
        self.inner.complete(request).await
    }
}

/// Deterministic scripted client for tests: returns a fixed reply regardless
/// of prompt, or replies keyed by a substring match when more than one
/// scripted reply is registered.
#[cfg(any(test, feature = "test-support"))]
pub struct ScriptedLlmClient {
    replies: Vec<(String, String)>,
    default_reply: String,
}

#[cfg(any(test, feature = "test-support"))]
impl ScriptedLlmClient {
    pub fn new(default_reply: impl Into<String>) -> Self {
        Self {
            replies: Vec::new(),
            default_reply: default_reply.into(),
        }
    }

    pub fn with_reply(mut self, contains: impl Into<String>, reply: impl Into<String>) -> Self {
        self.replies.push((contains.into(), reply.into()));
        self
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let content = self
            .replies
            .iter()
            .find(|(needle, _)| request.prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.default_reply.clone());

        Ok(LlmResponse {
            content,
            input_tokens: 0,
            output_tokens: 0,
        })
    }
}
