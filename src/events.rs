//! Event system for batch lifecycle hooks.
//!
//! Provides an optional, non-intrusive way to observe a run. The scheduler
//! and invoker emit events as batches start, attempts fail, and batches are
//! deferred or resolved. Implement [`EventHandler`] to receive them for
//! progress bars, metrics, or custom logging. Runs behave identically with
//! or without a handler.

use std::sync::Arc;

/// Which scheduler pass a batch is being processed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// The full pass over every batch.
    First,
    /// The single retry pass over deferred batches.
    Retry,
}

/// Events emitted during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A batch is about to be sent to the model.
    BatchStart {
        /// 1-based batch number from the first pass.
        batch: usize,
        /// Records in the batch.
        size: usize,
        pass: Pass,
    },
    /// One attempt for a batch failed.
    AttemptFailed {
        batch: usize,
        /// The attempt number (1-indexed).
        attempt: u32,
        /// [`BatchError::failure_kind`](crate::BatchError::failure_kind) of the error.
        kind: &'static str,
        /// Error description.
        reason: String,
    },
    /// Waiting before the next attempt.
    Backoff {
        batch: usize,
        /// The attempt that just failed.
        attempt: u32,
        delay_ms: u64,
    },
    /// A batch produced exactly one title per record.
    BatchSucceeded {
        batch: usize,
        /// The attempt that succeeded (1-indexed).
        attempt: u32,
        pass: Pass,
    },
    /// Every attempt for a batch failed in the first pass; it will be retried.
    BatchDeferred { batch: usize },
    /// The retry pass is starting.
    RetryPassStart {
        /// Number of deferred batches.
        deferred: usize,
    },
    /// A batch failed the retry pass too and needs manual inspection.
    BatchUnresolved { batch: usize, size: usize },
}

/// Handler for run lifecycle events.
///
/// # Example
///
/// ```
/// use llm_batch::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: Event) {
///         match event {
///             Event::BatchStart { batch, .. } => println!("[start] batch {}", batch),
///             Event::BatchUnresolved { batch, .. } => println!("[unresolved] {}", batch),
///             _ => {}
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called when the run emits an event.
    fn on_event(&self, event: Event);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: Event) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
///
/// # Example
///
/// ```
/// use llm_batch::events::{Event, FnEventHandler};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: Event| {
///     if let Event::BatchDeferred { batch } = event {
///         eprintln!("batch {} deferred", batch);
///     }
/// }));
/// ```
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}
