//! Mock backend for testing without a live LLM.
//!
//! [`MockBackend`] returns scripted replies, allowing deterministic tests of
//! the retry loop: well-formed lists, empty content, wrong counts, and
//! transport failures.
//!
//! # Example
//!
//! ```
//! use llm_batch::backend::{MockBackend, MockReply};
//!
//! let mock = MockBackend::new(vec![MockReply::Empty, MockReply::text("\"Alien\"")]);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::Client;

use super::{Backend, LlmRequest, LlmResponse};
use crate::error::{BatchError, Result};

/// One scripted reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Successful call with this content.
    Text(String),
    /// Successful call with no content.
    Empty,
    /// Provider returned a non-success status.
    Status(u16),
    /// Transport-level failure.
    Error(String),
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        MockReply::Text(text.into())
    }
}

type ReplyFn = Box<dyn Fn(&LlmRequest) -> MockReply + Send + Sync>;

enum Script {
    Sequence(Vec<MockReply>),
    Function(ReplyFn),
}

/// A test backend that returns scripted replies.
///
/// Sequences cycle back to the beginning when exhausted. Function scripts
/// see each request and can answer based on its content.
pub struct MockBackend {
    script: Script,
    calls: AtomicUsize,
}

impl MockBackend {
    /// Create a mock backend with the given replies, returned in order.
    pub fn new(replies: Vec<MockReply>) -> Self {
        assert!(!replies.is_empty(), "MockBackend requires at least one reply");
        Self {
            script: Script::Sequence(replies),
            calls: AtomicUsize::new(0),
        }
    }

    /// Create a mock that always returns the same text.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![MockReply::text(response)])
    }

    /// Create a mock that computes each reply from the request.
    pub fn from_fn(f: impl Fn(&LlmRequest) -> MockReply + Send + Sync + 'static) -> Self {
        Self {
            script: Script::Function(Box::new(f)),
            calls: AtomicUsize::new(0),
        }
    }

    /// A well-behaved model: answers with every `Title:` line of the
    /// context, quoted, one per line.
    pub fn echo_titles() -> Self {
        Self::from_fn(|request| MockReply::Text(echo_reply(request)))
    }

    /// Number of `complete` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn next_reply(&self, request: &LlmRequest) -> MockReply {
        let idx = self.calls.fetch_add(1, Ordering::Relaxed);
        match &self.script {
            Script::Sequence(replies) => replies[idx % replies.len()].clone(),
            Script::Function(f) => f(request),
        }
    }
}

/// Titles from the context turn of a request, in order.
pub fn context_titles(request: &LlmRequest) -> Vec<String> {
    request
        .messages
        .get(1)
        .map(|m| {
            m.content
                .lines()
                .filter_map(|line| line.strip_prefix("Title: "))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// A correctly formatted reply for the titles in `request`.
pub fn echo_reply(request: &LlmRequest) -> String {
    context_titles(request)
        .iter()
        .map(|t| format!("\"{}\"", t))
        .collect::<Vec<_>>()
        .join("\n")
}

impl fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let script = match &self.script {
            Script::Sequence(r) => format!("sequence({})", r.len()),
            Script::Function(_) => "function".to_string(),
        };
        f.debug_struct("MockBackend")
            .field("script", &script)
            .field("calls", &self.calls())
            .finish()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn complete(
        &self,
        _client: &Client,
        _base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse> {
        match self.next_reply(request) {
            MockReply::Text(text) => Ok(LlmResponse {
                text,
                status: 200,
                metadata: None,
            }),
            MockReply::Empty => Ok(LlmResponse {
                text: String::new(),
                status: 200,
                metadata: None,
            }),
            MockReply::Status(status) => Err(BatchError::HttpError {
                status,
                body: "mock provider error".into(),
            }),
            MockReply::Error(message) => Err(BatchError::Other(message)),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ChatMessage;
    use crate::config::LlmConfig;

    fn request(context: &str) -> LlmRequest {
        LlmRequest {
            model: "test".to_string(),
            messages: vec![
                ChatMessage::system("sys"),
                ChatMessage::user(context),
                ChatMessage::user("fmt"),
            ],
            config: LlmConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_mock_fixed_response() {
        let mock = MockBackend::fixed("Hello!");
        let client = Client::new();
        let resp = mock.complete(&client, "http://unused", &request("")).await.unwrap();
        assert_eq!(resp.text, "Hello!");
        assert_eq!(resp.status, 200);
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_cycles_replies() {
        let mock = MockBackend::new(vec![
            MockReply::text("first"),
            MockReply::Empty,
            MockReply::Status(503),
        ]);
        let client = Client::new();
        let req = request("");
        let r1 = mock.complete(&client, "http://unused", &req).await.unwrap();
        let r2 = mock.complete(&client, "http://unused", &req).await.unwrap();
        let r3 = mock.complete(&client, "http://unused", &req).await;
        let r4 = mock.complete(&client, "http://unused", &req).await.unwrap();
        assert_eq!(r1.text, "first");
        assert!(r2.is_empty());
        assert!(matches!(r3, Err(BatchError::HttpError { status: 503, .. })));
        assert_eq!(r4.text, "first"); // cycles
    }

    #[tokio::test]
    async fn test_mock_error_reply() {
        let mock = MockBackend::new(vec![MockReply::Error("connection refused".into())]);
        let result = mock.complete(&Client::new(), "http://unused", &request("")).await;
        assert!(matches!(result, Err(BatchError::Other(ref m)) if m == "connection refused"));
    }

    #[tokio::test]
    async fn test_echo_titles() {
        let mock = MockBackend::echo_titles();
        let req = request("[context]\nTitle: Alien\n-----\n\nTitle: Heat\n-----\n[/context]");
        let resp = mock.complete(&Client::new(), "http://unused", &req).await.unwrap();
        assert_eq!(resp.text, "\"Alien\"\n\"Heat\"");
    }

    #[test]
    fn test_debug_shows_script() {
        let mock = MockBackend::fixed("x");
        assert!(format!("{:?}", mock).contains("sequence(1)"));
    }
}
