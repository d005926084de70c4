//! Command-line runner: fetch records from a JSON file, extract their titles
//! through the model in batches, and print the report.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use llm_batch::{BatchScheduler, ExecCtx, JsonFileSource, Report, RunConfig};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    Ollama,
    #[cfg(feature = "openai")]
    Openai,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Records to process: a JSON array or newline-delimited JSON objects with a `title` field
    #[arg(long, env = "LLM_BATCH_INPUT")]
    input: PathBuf,

    /// JSON (or YAML with the `yaml` feature) config file; flags override it
    #[arg(long, env = "LLM_BATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Model identifier
    #[arg(long, env = "LLM_BATCH_MODEL")]
    model: Option<String>,

    /// Provider base URL
    #[arg(long, env = "LLM_BATCH_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, value_enum, default_value = "ollama")]
    backend: BackendKind,

    /// API key for the OpenAI-compatible backend
    #[cfg(feature = "openai")]
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Records per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Model calls per batch before it is deferred
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Wait `base ^ attempt` seconds between failed attempts
    #[arg(long)]
    backoff_base: Option<f64>,

    /// Maximum records to fetch
    #[arg(long)]
    max_records: Option<usize>,

    /// HTTP request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f64>,

    /// Maximum tokens per reply
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Also write collected titles to this file, one per line
    #[arg(long, short)]
    output: Option<PathBuf>,
}

impl Cli {
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => RunConfig::default(),
        };
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(size) = self.batch_size {
            config.batch_size = size;
        }
        if let Some(attempts) = self.max_attempts {
            config.max_attempts_per_batch = attempts;
        }
        if let Some(base) = self.backoff_base {
            config.backoff_base = base;
        }
        if let Some(max) = self.max_records {
            config.max_records = max;
        }
        if let Some(secs) = self.timeout_secs {
            config.request_timeout_secs = secs;
        }
        if let Some(temp) = self.temperature {
            config.llm.temperature = temp;
        }
        if let Some(tokens) = self.max_tokens {
            config.llm.max_tokens = tokens;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = cli.run_config()?;
    tracing::info!(model = %config.model, base_url = %config.base_url, "configuration loaded");

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current batch");
            flag.store(true, Ordering::Relaxed);
        }
    });

    let builder = ExecCtx::builder(&config.base_url)
        .timeout(config.request_timeout())
        .cancellation(Some(cancel));
    let builder = match cli.backend {
        BackendKind::Ollama => builder,
        #[cfg(feature = "openai")]
        BackendKind::Openai => builder.openai(cli.api_key.clone()),
    };
    let ctx = builder.build().context("building HTTP client")?;

    let source = JsonFileSource::new(&cli.input);
    let scheduler = BatchScheduler::from_config(&config);
    let (result, total) = scheduler
        .run_source(&ctx, &source, config.max_records)
        .await
        .context("run aborted")?;

    let report = Report::new(&result, total);
    print!("\n{}", report);

    if let Some(path) = &cli.output {
        report
            .write_titles(path)
            .with_context(|| format!("writing titles to {}", path.display()))?;
        tracing::info!(path = %path.display(), titles = report.collected(), "titles written");
    }

    Ok(())
}
