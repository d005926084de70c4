//! Two-pass batch scheduling.
//!
//! [`BatchScheduler`] splits the fetched records into consecutive batches,
//! sends each through a [`BatchInvoker`] in order, and defers failures. After
//! the full pass every deferred batch gets exactly one more invocation;
//! batches failing that too end up in [`RunResult::unresolved_batches`].

use crate::{
    config::RunConfig,
    diagnostics::BatchDiagnostics,
    error::Result,
    events::{emit, Event, Pass},
    exec_ctx::ExecCtx,
    invoker::BatchInvoker,
    source::RecordSource,
    types::{Batch, BatchOutcome, Record, RunResult},
};
use tracing::{error, info};

/// Partition records into consecutive batches of `batch_size`.
///
/// The last batch holds the remainder and may be shorter. Batches are
/// numbered from 1.
///
/// # Example
///
/// ```
/// use llm_batch::scheduler::partition;
/// use llm_batch::types::Record;
///
/// let records: Vec<Record> = (0..45).map(|i| Record::new(i.to_string())).collect();
/// let batches = partition(records, 20);
/// assert_eq!(batches.iter().map(|b| b.len()).collect::<Vec<_>>(), vec![20, 20, 5]);
/// ```
pub fn partition(records: Vec<Record>, batch_size: usize) -> Vec<Batch> {
    let size = batch_size.max(1);
    let mut batches = Vec::with_capacity(records.len().div_ceil(size));
    let mut records = records.into_iter().peekable();
    while records.peek().is_some() {
        let chunk: Vec<Record> = records.by_ref().take(size).collect();
        batches.push(Batch::new(batches.len() + 1, chunk));
    }
    batches
}

/// Drives every record through the model in two passes.
///
/// # Example
///
/// ```
/// use llm_batch::{BatchInvoker, BatchScheduler, ExecCtx, MockBackend};
/// use llm_batch::types::Record;
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let ctx = ExecCtx::builder("http://unused")
///     .backend(Arc::new(MockBackend::echo_titles()))
///     .build()
///     .unwrap();
/// let records: Vec<Record> = (0..50).map(|i| Record::new(format!("Film {}", i))).collect();
///
/// let scheduler = BatchScheduler::new(BatchInvoker::new("llama3.2"), 20);
/// let result = scheduler.run(&ctx, records).await.unwrap();
/// assert_eq!(result.collected_titles.len(), 50);
/// assert_eq!(result.first_pass_batches, 3);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    invoker: BatchInvoker,
    batch_size: usize,
}

impl BatchScheduler {
    /// Create a scheduler. A `batch_size` of 0 is treated as 1.
    pub fn new(invoker: BatchInvoker, batch_size: usize) -> Self {
        Self {
            invoker,
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(BatchInvoker::from_config(config), config.batch_size)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn invoker(&self) -> &BatchInvoker {
        &self.invoker
    }

    /// Run both passes over `records`.
    ///
    /// Batch failures never abort the run; the only error is cancellation,
    /// checked before each batch.
    pub async fn run(&self, ctx: &ExecCtx, records: Vec<Record>) -> Result<RunResult> {
        let total = records.len();
        let batches = partition(records, self.batch_size);
        let mut result = RunResult {
            first_pass_batches: batches.len(),
            ..Default::default()
        };
        info!(records = total, batches = batches.len(), batch_size = self.batch_size, "starting run");

        let mut deferred = Vec::new();
        for batch in batches {
            ctx.check_cancelled()?;
            let number = batch.number;
            match self.process(ctx, batch, Pass::First, &mut result.diagnostics).await {
                BatchOutcome::Success(titles) => {
                    result.collected_titles.extend(titles);
                    info!(
                        batch = number,
                        collected = result.collected_titles.len(),
                        "total titles collected"
                    );
                }
                BatchOutcome::Failure(batch) => {
                    info!(batch = number, "batch failed, will retry later");
                    emit(&ctx.event_handler, Event::BatchDeferred { batch: number });
                    deferred.push(batch);
                }
            }
        }

        result.deferred_batches = deferred.len();
        if deferred.is_empty() {
            return Ok(result);
        }

        info!(deferred = deferred.len(), "retrying failed batches");
        emit(
            &ctx.event_handler,
            Event::RetryPassStart {
                deferred: deferred.len(),
            },
        );

        for batch in deferred {
            ctx.check_cancelled()?;
            let number = batch.number;
            match self.process(ctx, batch, Pass::Retry, &mut result.diagnostics).await {
                BatchOutcome::Success(titles) => {
                    result.collected_titles.extend(titles);
                    result.recovered_batches += 1;
                    info!(
                        batch = number,
                        collected = result.collected_titles.len(),
                        "retried batch recovered"
                    );
                }
                BatchOutcome::Failure(batch) => {
                    error!(batch = number, size = batch.len(), "batch failed again, skipping");
                    emit(
                        &ctx.event_handler,
                        Event::BatchUnresolved {
                            batch: number,
                            size: batch.len(),
                        },
                    );
                    result.unresolved_batches.push(batch);
                }
            }
        }

        Ok(result)
    }

    /// Fetch up to `max_records` from `source`, then [`run`](Self::run) them.
    ///
    /// Returns the result together with the number of records fetched. A
    /// source failure aborts before any batch is sent.
    pub async fn run_source(
        &self,
        ctx: &ExecCtx,
        source: &dyn RecordSource,
        max_records: usize,
    ) -> Result<(RunResult, usize)> {
        info!(source = %source.name(), max_records, "fetching records");
        let records = source.fetch(max_records).await?;
        let total = records.len();
        let result = self.run(ctx, records).await?;
        Ok((result, total))
    }

    async fn process(
        &self,
        ctx: &ExecCtx,
        batch: Batch,
        pass: Pass,
        totals: &mut BatchDiagnostics,
    ) -> BatchOutcome {
        let number = batch.number;
        emit(
            &ctx.event_handler,
            Event::BatchStart {
                batch: number,
                size: batch.len(),
                pass,
            },
        );

        let (outcome, diag) = self.invoker.invoke_with_diagnostics(ctx, batch).await;
        totals.merge(&diag);

        if let (BatchOutcome::Success(_), Some(attempt)) = (&outcome, diag.succeeded_on) {
            emit(
                &ctx.event_handler,
                Event::BatchSucceeded {
                    batch: number,
                    attempt,
                    pass,
                },
            );
        }
        outcome
    }
}
