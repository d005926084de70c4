//! # LLM Batch
//!
//! Batch title extraction through a generative model, with validation and
//! bounded retry.
//!
//! Records are fetched once from a [`RecordSource`], split into fixed-size
//! batches, and each batch is sent to the model as a three-turn prompt asking
//! for one quoted title per line. Replies are cleaned by a defensive line
//! parser and accepted only when they hold exactly one title per record.
//! Failed batches are retried inside the batch, deferred, and retried once
//! more after the full pass; whatever still fails is reported by title.
//!
//! ## Core Concepts
//!
//! - **[`BatchInvoker`]**: drives one batch to a [`BatchOutcome`] with
//!   per-attempt backoff. Never returns an error.
//! - **[`BatchScheduler`]**: partitions records, runs the first pass and the
//!   single retry pass, and accumulates a [`RunResult`].
//! - **[`ExecCtx`]**: HTTP client, backend, delay strategy, cancellation,
//!   and optional event handler shared across the run.
//! - **[`Report`]**: counts, unresolved titles, and the numbered title list.
//!
//! ## Quick Start
//!
//! ```no_run
//! use llm_batch::{BatchScheduler, ExecCtx, JsonFileSource, Report, RunConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RunConfig::default().with_model("llama3.2");
//!     config.validate()?;
//!
//!     let ctx = ExecCtx::builder(&config.base_url)
//!         .timeout(config.request_timeout())
//!         .build()?;
//!     let source = JsonFileSource::new("movies.json");
//!
//!     let scheduler = BatchScheduler::from_config(&config);
//!     let (result, total) = scheduler.run_source(&ctx, &source, config.max_records).await?;
//!     print!("{}", Report::new(&result, total));
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod exec_ctx;
pub mod invoker;
pub mod parsing;
pub mod prompt;
pub mod report;
pub mod scheduler;
pub mod source;
pub mod types;

pub use backend::{BackoffConfig, MockBackend, OllamaBackend};
#[cfg(feature = "openai")]
pub use backend::OpenAiBackend;
pub use config::{LlmConfig, RunConfig};
pub use diagnostics::BatchDiagnostics;
pub use error::{BatchError, Result};
pub use exec_ctx::{ExecCtx, ExecCtxBuilder};
pub use invoker::BatchInvoker;
pub use report::Report;
pub use scheduler::BatchScheduler;
pub use source::{InMemorySource, JsonFileSource, RecordSource};
pub use types::{Batch, BatchOutcome, Record, RunResult};
