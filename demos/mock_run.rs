//! Full run against a scripted model, no server required.
//!
//! Batch 3 is answered with the wrong number of lines for its first five
//! calls, so it exhausts its first-pass attempts, is deferred, and recovers
//! on the retry pass.
//!
//! ```sh
//! RUST_LOG=debug cargo run --example mock_run
//! ```

use llm_batch::backend::mock::{context_titles, echo_reply};
use llm_batch::backend::{MockBackend, MockReply, NoDelay};
use llm_batch::events::{Event, FnEventHandler};
use llm_batch::{BatchScheduler, ExecCtx, InMemorySource, Report, RunConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = RunConfig::default()
        .with_batch_size(4)
        .with_max_attempts(3)
        .with_max_records(18);
    config.validate()?;

    let flaky_calls = AtomicUsize::new(0);
    let backend = MockBackend::from_fn(move |request| {
        let titles = context_titles(request);
        if titles.first().map(String::as_str) == Some("Movie 9")
            && flaky_calls.fetch_add(1, Ordering::Relaxed) < 5
        {
            return MockReply::Text(format!("{}\n\"Extra\"", echo_reply(request)));
        }
        MockReply::Text(echo_reply(request))
    });

    let ctx = ExecCtx::builder(&config.base_url)
        .backend(Arc::new(backend))
        .delay(Arc::new(NoDelay))
        .event_handler(Arc::new(FnEventHandler(|event: Event| {
            if let Event::BatchDeferred { batch } = event {
                println!("-> batch {} deferred", batch);
            }
        })))
        .build()?;

    let source = InMemorySource::from_titles((1..=20).map(|i| format!("Movie {}", i)));
    let scheduler = BatchScheduler::from_config(&config);
    let (result, total) = scheduler
        .run_source(&ctx, &source, config.max_records)
        .await?;

    print!("\n{}", Report::new(&result, total));
    Ok(())
}
