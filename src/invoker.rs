//! Per-batch model invocation with bounded retry.
//!
//! [`BatchInvoker`] drives one [`Batch`] through the model: it builds the
//! three-turn prompt, calls the backend, parses the reply, and checks that
//! exactly one title came back per record. Failed attempts (transport error,
//! empty reply, wrong count) are retried up to `max_attempts` times with a
//! `base ^ attempt` second wait in between. The result is always a
//! [`BatchOutcome`], never an error.

use crate::{
    backend::{BackoffConfig, LlmRequest},
    config::{LlmConfig, RunConfig},
    diagnostics::BatchDiagnostics,
    error::{BatchError, Result},
    events::{emit, Event},
    exec_ctx::ExecCtx,
    parsing::parse_titles,
    prompt::build_prompt,
    types::{Batch, BatchOutcome},
};
use tracing::{debug, info, warn};

/// Characters of a reply shown in debug logs.
const PREVIEW_CHARS: usize = 200;

/// Drives a single batch through the model with bounded retry.
///
/// # Example
///
/// ```
/// use llm_batch::{BatchInvoker, ExecCtx, MockBackend};
/// use llm_batch::types::{Batch, BatchOutcome, Record};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let ctx = ExecCtx::builder("http://unused")
///     .backend(Arc::new(MockBackend::fixed("\"Alien\"\n\"Heat\"")))
///     .build()
///     .unwrap();
/// let batch = Batch::new(1, vec![Record::new("Alien"), Record::new("Heat")]);
///
/// let outcome = BatchInvoker::new("llama3.2").invoke(&ctx, batch).await;
/// assert_eq!(outcome, BatchOutcome::Success(vec!["Alien".into(), "Heat".into()]));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct BatchInvoker {
    /// Model identifier (e.g. `"llama3.2"`).
    model: String,
    /// Sampling options forwarded to the backend.
    config: LlmConfig,
    /// Model calls per batch before giving up.
    max_attempts: u32,
    /// Wait between failed attempts.
    backoff: BackoffConfig,
}

impl BatchInvoker {
    /// Create an invoker with 10 attempts and no backoff.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            config: LlmConfig::default(),
            max_attempts: 10,
            backoff: BackoffConfig::default(),
        }
    }

    /// Create an invoker from a run configuration. An attempt budget of 0 is
    /// raised to 1, as with [`with_max_attempts`](Self::with_max_attempts).
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            model: config.model.clone(),
            config: config.llm.clone(),
            max_attempts: config.max_attempts_per_batch.max(1),
            backoff: config.backoff(),
        }
    }

    pub fn with_config(mut self, config: LlmConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the attempt budget. Values below 1 are raised to 1.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Drive `batch` to a terminal outcome.
    pub async fn invoke(&self, ctx: &ExecCtx, batch: Batch) -> BatchOutcome {
        self.invoke_with_diagnostics(ctx, batch).await.0
    }

    /// Same as [`invoke`](Self::invoke), also returning attempt statistics.
    pub async fn invoke_with_diagnostics(
        &self,
        ctx: &ExecCtx,
        batch: Batch,
    ) -> (BatchOutcome, BatchDiagnostics) {
        let expected = batch.len();
        let prompt = build_prompt(&batch, expected);
        let request = LlmRequest::from_prompt(self.model.clone(), &prompt, self.config.clone());
        let mut diag = BatchDiagnostics::default();

        for attempt in 1..=self.max_attempts {
            diag.attempts = attempt;

            match self.attempt(ctx, &request, expected).await {
                Ok(titles) => {
                    info!(
                        batch = batch.number,
                        attempt,
                        titles = titles.len(),
                        "batch processed"
                    );
                    diag.succeeded_on = Some(attempt);
                    return (BatchOutcome::Success(titles), diag);
                }
                Err(err) => {
                    match err {
                        BatchError::CardinalityMismatch { expected, got } => warn!(
                            batch = batch.number,
                            attempt, expected, got, "title count mismatch"
                        ),
                        BatchError::EmptyResponse => {
                            warn!(batch = batch.number, attempt, "no response content")
                        }
                        ref other => warn!(
                            batch = batch.number,
                            attempt,
                            error = %other,
                            "model call failed"
                        ),
                    }
                    diag.record_failure(&err);
                    emit(
                        &ctx.event_handler,
                        Event::AttemptFailed {
                            batch: batch.number,
                            attempt,
                            kind: err.failure_kind(),
                            reason: err.to_string(),
                        },
                    );
                }
            }

            if attempt < self.max_attempts {
                let delay = self.backoff.delay_for_attempt(attempt);
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                debug!(batch = batch.number, attempt, delay_ms, "retrying");
                emit(
                    &ctx.event_handler,
                    Event::Backoff {
                        batch: batch.number,
                        attempt,
                        delay_ms,
                    },
                );
                ctx.delay.sleep(delay).await;
                diag.backoff_total_ms = diag.backoff_total_ms.saturating_add(delay_ms);
            }
        }

        warn!(
            batch = batch.number,
            attempts = self.max_attempts,
            "max attempts reached, moving on"
        );
        (BatchOutcome::Failure(batch), diag)
    }

    /// One call + parse + count check.
    async fn attempt(
        &self,
        ctx: &ExecCtx,
        request: &LlmRequest,
        expected: usize,
    ) -> Result<Vec<String>> {
        let response = ctx
            .backend
            .complete(&ctx.client, &ctx.base_url, request)
            .await?;

        if response.is_empty() {
            return Err(BatchError::EmptyResponse);
        }
        debug!(preview = %preview(&response.text), "response received");

        let titles = parse_titles(&response.text);
        if titles.len() != expected {
            return Err(BatchError::CardinalityMismatch {
                expected,
                got: titles.len(),
            });
        }
        Ok(titles)
    }
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, MockReply, NoDelay, RecordingDelay};
    use crate::events::FnEventHandler;
    use crate::types::Record;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn batch(n: usize) -> Batch {
        Batch::new(7, (0..n).map(|i| Record::new(format!("Title {}", i))).collect())
    }

    fn ctx_with(backend: Arc<MockBackend>) -> ExecCtx {
        ExecCtx::builder("http://unused")
            .backend(backend)
            .delay(Arc::new(NoDelay))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_success_preserves_line_order() {
        for n in [1usize, 2, 5, 20] {
            let reply = (0..n)
                .rev()
                .map(|i| format!("\"Line {}\"", i))
                .collect::<Vec<_>>()
                .join("\n");
            let mock = Arc::new(MockBackend::fixed(reply));
            let ctx = ctx_with(mock.clone());

            let outcome = BatchInvoker::new("m").invoke(&ctx, batch(n)).await;
            let expected: Vec<String> = (0..n).rev().map(|i| format!("Line {}", i)).collect();
            assert_eq!(outcome, BatchOutcome::Success(expected));
            assert_eq!(mock.calls(), 1);
        }
    }

    #[tokio::test]
    async fn test_wrong_count_exhausts_attempts() {
        let mock = Arc::new(MockBackend::fixed("\"only one\""));
        let ctx = ctx_with(mock.clone());
        let original = batch(3);

        let (outcome, diag) = BatchInvoker::new("m")
            .with_max_attempts(4)
            .invoke_with_diagnostics(&ctx, original.clone())
            .await;

        assert_eq!(outcome, BatchOutcome::Failure(original));
        assert_eq!(mock.calls(), 4);
        assert_eq!(diag.attempts, 4);
        assert_eq!(diag.cardinality_mismatches, 4);
        assert!(diag.succeeded_on.is_none());
    }

    #[tokio::test]
    async fn test_every_failure_kind_is_retried() {
        let mock = Arc::new(MockBackend::new(vec![
            MockReply::Error("connection refused".into()),
            MockReply::Status(500),
            MockReply::Empty,
            MockReply::text("   \n  "),
            MockReply::text("\"a\"\n\"b\"\n\"c\"\n\"d\""),
        ]));
        let ctx = ctx_with(mock.clone());

        let (outcome, diag) = BatchInvoker::new("m")
            .with_max_attempts(5)
            .invoke_with_diagnostics(&ctx, batch(2))
            .await;

        assert!(matches!(outcome, BatchOutcome::Failure(_)));
        assert_eq!(mock.calls(), 5);
        assert_eq!(diag.transport_errors, 2);
        assert_eq!(diag.empty_responses, 2);
        assert_eq!(diag.cardinality_mismatches, 1);
    }

    #[tokio::test]
    async fn test_recovers_after_failures_without_merging() {
        let mock = Arc::new(MockBackend::new(vec![
            MockReply::text("\"A\""),
            MockReply::Status(503),
            MockReply::text("\"B\"\n\"C\""),
        ]));
        let ctx = ctx_with(mock.clone());

        let (outcome, diag) = BatchInvoker::new("m").invoke_with_diagnostics(&ctx, batch(2)).await;

        assert_eq!(outcome, BatchOutcome::Success(vec!["B".into(), "C".into()]));
        assert_eq!(diag.succeeded_on, Some(3));
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_zero_backoff_base_waits_zero() {
        let mock = Arc::new(MockBackend::new(vec![MockReply::Empty]));
        let delay = Arc::new(RecordingDelay::new());
        let ctx = ExecCtx::builder("http://unused")
            .backend(mock.clone())
            .delay(delay.clone())
            .build()
            .unwrap();

        let (_, diag) = BatchInvoker::new("m")
            .with_max_attempts(10)
            .with_backoff(BackoffConfig::new(0.0))
            .invoke_with_diagnostics(&ctx, batch(1))
            .await;

        // One wait between each pair of attempts, none after the last.
        assert_eq!(delay.waits(), vec![Duration::ZERO; 9]);
        assert_eq!(diag.backoff_total_ms, 0);
        assert_eq!(mock.calls(), 10);
    }

    #[tokio::test]
    async fn test_backoff_schedule() {
        let mock = Arc::new(MockBackend::new(vec![MockReply::Empty]));
        let delay = Arc::new(RecordingDelay::new());
        let ctx = ExecCtx::builder("http://unused")
            .backend(mock)
            .delay(delay.clone())
            .build()
            .unwrap();

        let (_, diag) = BatchInvoker::new("m")
            .with_max_attempts(4)
            .with_backoff(BackoffConfig::new(2.0))
            .invoke_with_diagnostics(&ctx, batch(1))
            .await;

        assert_eq!(
            delay.waits(),
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8)
            ]
        );
        assert_eq!(diag.backoff_total_ms, 14_000);
    }

    #[tokio::test]
    async fn test_huge_backoff_base_saturates() {
        let config = RunConfig::default()
            .with_backoff_base(1e6)
            .with_max_attempts(5);
        config.validate().unwrap();

        let mock = Arc::new(MockBackend::new(vec![MockReply::Empty]));
        let delay = Arc::new(RecordingDelay::new());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let ctx = ExecCtx::builder("http://unused")
            .backend(mock.clone())
            .delay(delay.clone())
            .event_handler(Arc::new(FnEventHandler(move |e: Event| {
                sink.lock().unwrap().push(e)
            })))
            .build()
            .unwrap();

        let (outcome, diag) = BatchInvoker::from_config(&config)
            .invoke_with_diagnostics(&ctx, batch(1))
            .await;

        assert!(matches!(outcome, BatchOutcome::Failure(_)));
        assert_eq!(mock.calls(), 5);
        assert_eq!(delay.waits().len(), 4);
        assert_eq!(diag.backoff_total_ms, u64::MAX);
        let events = events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            Event::Backoff {
                delay_ms: u64::MAX,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn test_no_wait_after_success() {
        let delay = Arc::new(RecordingDelay::new());
        let ctx = ExecCtx::builder("http://unused")
            .backend(Arc::new(MockBackend::fixed("\"x\"")))
            .delay(delay.clone())
            .build()
            .unwrap();

        let outcome = BatchInvoker::new("m")
            .with_backoff(BackoffConfig::new(3.0))
            .invoke(&ctx, batch(1))
            .await;

        assert!(outcome.is_success());
        assert!(delay.waits().is_empty());
    }

    #[tokio::test]
    async fn test_sends_three_turns_with_model() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mock = Arc::new(MockBackend::from_fn(move |req| {
            sink.lock().unwrap().push(req.clone());
            MockReply::text("\"Title 0\"")
        }));
        let ctx = ctx_with(mock);

        BatchInvoker::new("llama3.2").invoke(&ctx, batch(1)).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "llama3.2");
        assert_eq!(seen[0].messages.len(), 3);
        assert!(seen[0].messages[1].content.contains("Title: Title 0"));
        assert!(seen[0].messages[2].content.contains("EXPECTED LIST SIZE: 1"));
    }

    #[tokio::test]
    async fn test_emits_attempt_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let ctx = ExecCtx::builder("http://unused")
            .backend(Arc::new(MockBackend::new(vec![
                MockReply::Empty,
                MockReply::text("\"x\""),
            ])))
            .delay(Arc::new(NoDelay))
            .event_handler(Arc::new(FnEventHandler(move |e: Event| {
                sink.lock().unwrap().push(e)
            })))
            .build()
            .unwrap();

        BatchInvoker::new("m").invoke(&ctx, batch(1)).await;

        let events = events.lock().unwrap();
        assert!(matches!(
            events[0],
            Event::AttemptFailed {
                batch: 7,
                attempt: 1,
                kind: "empty_response",
                ..
            }
        ));
        assert_eq!(
            events[1],
            Event::Backoff {
                batch: 7,
                attempt: 1,
                delay_ms: 0
            }
        );
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_from_config() {
        let config = RunConfig::default()
            .with_model("phi3")
            .with_max_attempts(3)
            .with_backoff_base(1.5);
        let invoker = BatchInvoker::from_config(&config);
        assert_eq!(invoker.model(), "phi3");
        assert_eq!(invoker.max_attempts(), 3);
        assert_eq!(invoker.backoff.base, 1.5);
    }

    #[tokio::test]
    async fn test_transport_errors_reported_as_transport() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let mock = Arc::new(MockBackend::new(vec![MockReply::Error("reset".into())]));
        let ctx = ExecCtx::builder("http://unused")
            .backend(mock)
            .delay(Arc::new(NoDelay))
            .event_handler(Arc::new(FnEventHandler(move |e: Event| {
                sink.lock().unwrap().push(e)
            })))
            .build()
            .unwrap();

        let (_, diag) = BatchInvoker::new("m")
            .with_max_attempts(2)
            .invoke_with_diagnostics(&ctx, batch(1))
            .await;

        assert_eq!(diag.transport_errors, 2);
        let kinds: Vec<&str> = events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                Event::AttemptFailed { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect();
        assert_eq!(kinds, vec!["transport", "transport"]);
    }

    #[tokio::test]
    async fn test_from_config_raises_zero_attempts() {
        let config = RunConfig {
            max_attempts_per_batch: 0,
            ..RunConfig::default()
        };
        let invoker = BatchInvoker::from_config(&config);
        assert_eq!(invoker.max_attempts(), 1);

        let mock = Arc::new(MockBackend::new(vec![MockReply::Empty]));
        let ctx = ctx_with(mock.clone());
        let outcome = invoker.invoke(&ctx, batch(1)).await;
        assert!(matches!(outcome, BatchOutcome::Failure(_)));
        assert_eq!(mock.calls(), 1);
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(500);
        assert_eq!(preview(&long).len(), PREVIEW_CHARS + 3);
        assert_eq!(preview("short"), "short");
    }
}
