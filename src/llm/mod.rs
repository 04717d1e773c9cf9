//! Language-model client abstraction
//!
//! The rest of the crate depends only on the `LlmClient` trait (an abstract
//! `complete(prompt) -> text` capability, per spec.md §9's design note), not
//! on any particular provider. `HttpLlmClient` talks to an OpenAI-compatible
//! chat-completions endpoint; `ScriptedLlmClient` (test-only) returns
//! canned replies so the Planner and Orchestrator can be tested without
//! network access.

pub mod client;

pub use client::{HttpLlmClient, LlmClient, LlmRequest, LlmResponse, RateLimitedLlmClient};
