//! Backend trait and normalized request/response types.
//!
//! The [`Backend`] trait abstracts over LLM providers, translating between
//! normalized [`LlmRequest`]/[`LlmResponse`] types and provider-specific
//! HTTP APIs. Built-in implementations: [`OllamaBackend`], [`OpenAiBackend`]
//! (feature `openai`), and [`MockBackend`] for tests.
//!
//! ## Architecture
//!
//! ```text
//! BatchInvoker ──► LlmRequest ──► Backend::complete() ──► LlmResponse
//!                                        │
//!                             ┌──────────┴──────────┐
//!                        OllamaBackend         OpenAiBackend
//!                          /api/chat        /v1/chat/completions
//! ```
//!
//! Backends make exactly one call per `complete`. Retrying is owned by
//! [`BatchInvoker`](crate::invoker::BatchInvoker), which waits between
//! attempts through a [`Delay`] strategy from [`backoff`].

pub mod backoff;
pub mod mock;
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;

pub use backoff::{BackoffConfig, Delay, JitterStrategy, NoDelay, RecordingDelay, TokioDelay};
pub use mock::{MockBackend, MockReply};
pub use ollama::OllamaBackend;
#[cfg(feature = "openai")]
pub use openai::OpenAiBackend;

use crate::config::LlmConfig;
use crate::error::{BatchError, Result};
use crate::prompt::BatchPrompt;
use async_trait::async_trait;
use reqwest::Client;

/// A normalized LLM request, provider-agnostic.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Model identifier (e.g. `"llama3.2"`, `"gpt-4o"`).
    pub model: String,

    /// Ordered, role-tagged conversation turns.
    pub messages: Vec<ChatMessage>,

    /// Sampling configuration (temperature, max_tokens, custom options).
    pub config: LlmConfig,
}

impl LlmRequest {
    /// Lay a [`BatchPrompt`] out as three turns: system, context, format reminder.
    pub fn from_prompt(model: impl Into<String>, prompt: &BatchPrompt, config: LlmConfig) -> Self {
        Self {
            model: model.into(),
            messages: vec![
                ChatMessage::system(prompt.system.clone()),
                ChatMessage::user(prompt.context.clone()),
                ChatMessage::user(prompt.format.clone()),
            ],
            config,
        }
    }
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// The role of the message author.
    pub role: Role,
    /// The message content.
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// The role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// System instructions.
    System,
    /// User input.
    User,
}

impl Role {
    /// Wire name shared by the Ollama and OpenAI chat APIs.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

/// A normalized LLM response.
#[derive(Debug)]
pub struct LlmResponse {
    /// The generated text content. Empty when the provider returned none.
    pub text: String,

    /// HTTP status code (for diagnostics/logging).
    pub status: u16,

    /// Provider-specific metadata (token counts, timing, model info).
    pub metadata: Option<serde_json::Value>,
}

impl LlmResponse {
    /// Whether the provider returned no usable content.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Abstraction over LLM providers.
///
/// Implementors translate between the normalized [`LlmRequest`]/[`LlmResponse`]
/// and the provider's HTTP API. Any failure (transport or provider status)
/// is returned as an `Err`; the caller decides whether to retry.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute a non-streaming chat completion.
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Turn a non-success HTTP response into [`BatchError::HttpError`].
pub(crate) async fn error_for_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(BatchError::HttpError { status, body })
}
