//! Execution context shared across a run.
//!
//! [`ExecCtx`] carries the HTTP client, LLM backend, endpoint, delay strategy,
//! cancellation handle, and optional event handler. It is constructed once
//! per run and borrowed by the scheduler and invoker.

use crate::backend::{Backend, Delay, OllamaBackend, TokioDelay};
#[cfg(feature = "openai")]
use crate::backend::OpenAiBackend;
use crate::error::Result;
use crate::events::EventHandler;
use reqwest::Client;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

/// Shared execution context for a run.
///
/// # Example
///
/// ```
/// use llm_batch::ExecCtx;
///
/// let ctx = ExecCtx::builder("http://localhost:11434").build().unwrap();
/// assert_eq!(ctx.base_url, "http://localhost:11434");
/// ```
pub struct ExecCtx {
    /// HTTP client (cheap to clone -- uses `Arc` internally).
    pub client: Client,
    /// Base URL for the LLM provider (e.g. `http://localhost:11434`).
    pub base_url: String,
    /// LLM backend. Default: [`OllamaBackend`].
    pub backend: Arc<dyn Backend>,
    /// How to wait between failed attempts. Default: [`TokioDelay`].
    pub delay: Arc<dyn Delay>,
    /// Optional cancellation flag, checked between batches.
    pub cancellation: Option<Arc<AtomicBool>>,
    /// Optional event handler for lifecycle events.
    pub event_handler: Option<Arc<dyn EventHandler>>,
}

impl ExecCtx {
    /// Create a new builder.
    pub fn builder(base_url: impl Into<String>) -> ExecCtxBuilder {
        ExecCtxBuilder {
            client: None,
            base_url: base_url.into(),
            backend: None,
            delay: None,
            cancellation: None,
            event_handler: None,
            timeout: None,
        }
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|c| c.load(Ordering::Relaxed))
    }

    /// Return an error if cancellation has been requested.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(crate::BatchError::Cancelled);
        }
        Ok(())
    }
}

impl std::fmt::Debug for ExecCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecCtx")
            .field("base_url", &self.base_url)
            .field("backend", &self.backend.name())
            .field("has_cancellation", &self.cancellation.is_some())
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

/// Builder for [`ExecCtx`].
pub struct ExecCtxBuilder {
    client: Option<Client>,
    base_url: String,
    backend: Option<Arc<dyn Backend>>,
    delay: Option<Arc<dyn Delay>>,
    cancellation: Option<Arc<AtomicBool>>,
    event_handler: Option<Arc<dyn EventHandler>>,
    timeout: Option<Duration>,
}

impl ExecCtxBuilder {
    /// Set the HTTP client. If not set, a default client is created.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the LLM backend. Default: [`OllamaBackend`].
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Use the OpenAI-compatible backend, with an API key when given.
    #[cfg(feature = "openai")]
    pub fn openai(mut self, api_key: Option<String>) -> Self {
        let backend = match api_key {
            Some(key) => OpenAiBackend::new().with_api_key(key),
            None => OpenAiBackend::new(),
        };
        self.backend = Some(Arc::new(backend));
        self
    }

    /// Set the delay strategy. Default: [`TokioDelay`].
    pub fn delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Set the cancellation flag.
    pub fn cancellation(mut self, cancel: Option<Arc<AtomicBool>>) -> Self {
        self.cancellation = cancel;
        self
    }

    /// Set the event handler.
    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Set the request timeout. Default: 60 seconds.
    ///
    /// Ignored when a custom `Client` is provided via `.client()`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the execution context.
    pub fn build(self) -> Result<ExecCtx> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .timeout(self.timeout.unwrap_or(Duration::from_secs(60)))
                .build()?,
        };
        Ok(ExecCtx {
            client,
            base_url: normalize_base_url(&self.base_url),
            backend: self.backend.unwrap_or_else(|| Arc::new(OllamaBackend)),
            delay: self.delay.unwrap_or_else(|| Arc::new(TokioDelay)),
            cancellation: self.cancellation,
            event_handler: self.event_handler,
        })
    }
}

/// Strip known provider path suffixes from a base URL.
/// e.g., "https://api.openai.com/v1" -> "https://api.openai.com"
/// e.g., "http://localhost:11434/api" -> "http://localhost:11434"
fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    // Longest first
    for suffix in &["/v1/chat/completions", "/v1/chat", "/v1", "/api/chat", "/api"] {
        if let Some(stripped) = trimmed.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("https://api.openai.com/v1/"), "https://api.openai.com");
        assert_eq!(normalize_base_url("http://localhost:11434/api"), "http://localhost:11434");
        assert_eq!(normalize_base_url("http://localhost:11434/api/chat"), "http://localhost:11434");
        assert_eq!(normalize_base_url("http://localhost:11434"), "http://localhost:11434");
    }

    #[test]
    fn test_defaults() {
        let ctx = ExecCtx::builder("http://localhost:11434/")
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap();
        assert_eq!(ctx.backend.name(), "ollama");
        assert!(!ctx.is_cancelled());
        assert!(ctx.check_cancelled().is_ok());
    }

    #[test]
    fn test_custom_backend_and_cancellation() {
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = ExecCtx::builder("http://unused")
            .backend(Arc::new(MockBackend::fixed("x")))
            .cancellation(Some(flag.clone()))
            .build()
            .unwrap();
        assert_eq!(ctx.backend.name(), "mock");

        flag.store(true, Ordering::Relaxed);
        assert!(matches!(ctx.check_cancelled(), Err(crate::BatchError::Cancelled)));
    }
}
