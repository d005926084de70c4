//! Attempt statistics for batch invocations.
//!
//! [`BatchDiagnostics`] records what happened while a batch was driven
//! through the model: how many attempts were made, how each failed attempt
//! failed, and how long was spent waiting in backoff.

use crate::error::BatchError;

/// Records what happened during one or more batch invocations.
///
/// Returned alongside the outcome by
/// [`BatchInvoker::invoke_with_diagnostics`](crate::invoker::BatchInvoker::invoke_with_diagnostics)
/// and summed over the whole run in [`RunResult`](crate::types::RunResult).
///
/// # Example
///
/// ```
/// use llm_batch::diagnostics::BatchDiagnostics;
///
/// let diag = BatchDiagnostics::default();
/// assert_eq!(diag.failed_attempts(), 0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchDiagnostics {
    /// Total model calls made.
    pub attempts: u32,

    /// Attempts that failed at the transport or provider layer.
    pub transport_errors: u32,

    /// Attempts where the call succeeded but returned no content.
    pub empty_responses: u32,

    /// Attempts where the parsed title count did not match the batch size.
    pub cardinality_mismatches: u32,

    /// Total time spent in backoff delays (milliseconds).
    pub backoff_total_ms: u64,

    /// Attempt number (1-based) that succeeded, for a single invocation.
    pub succeeded_on: Option<u32>,
}

impl BatchDiagnostics {
    /// Count a failed attempt under its failure kind.
    pub fn record_failure(&mut self, error: &BatchError) {
        match error.failure_kind() {
            "empty_response" => self.empty_responses += 1,
            "cardinality_mismatch" => self.cardinality_mismatches += 1,
            _ => self.transport_errors += 1,
        }
    }

    pub fn failed_attempts(&self) -> u32 {
        self.transport_errors + self.empty_responses + self.cardinality_mismatches
    }

    /// Fold another invocation's statistics into this aggregate.
    ///
    /// `succeeded_on` is per-invocation and is not carried over.
    pub fn merge(&mut self, other: &BatchDiagnostics) {
        self.attempts = self.attempts.saturating_add(other.attempts);
        self.transport_errors = self.transport_errors.saturating_add(other.transport_errors);
        self.empty_responses = self.empty_responses.saturating_add(other.empty_responses);
        self.cardinality_mismatches = self
            .cardinality_mismatches
            .saturating_add(other.cardinality_mismatches);
        self.backoff_total_ms = self.backoff_total_ms.saturating_add(other.backoff_total_ms);
    }
}
