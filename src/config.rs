//! Run configuration.
//!
//! [`RunConfig`] is built once at process start (from CLI flags, environment,
//! or a JSON/YAML file) and passed by reference to the scheduler and invoker.
//! [`LlmConfig`] holds the sampling options forwarded to the backend.

use crate::backend::BackoffConfig;
use crate::error::{BatchError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Sampling configuration for LLM requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f64,

    /// Maximum tokens to generate.
    pub max_tokens: u32,

    /// Custom options merged into the Ollama options object.
    pub options: Option<Value>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
            options: None,
        }
    }
}

impl LlmConfig {
    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }
}

/// Immutable settings for one run.
///
/// # Example
///
/// ```
/// use llm_batch::RunConfig;
///
/// let config = RunConfig::default()
///     .with_model("llama3.2:3b")
///     .with_batch_size(10);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.max_attempts_per_batch, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Model identifier passed to the backend.
    pub model: String,

    /// Base URL of the model provider.
    pub base_url: String,

    /// Records per batch. The last batch may be shorter.
    pub batch_size: usize,

    /// Model calls per batch before it is deferred (or left unresolved).
    pub max_attempts_per_batch: u32,

    /// Base of the `base ^ attempt` second wait between failed attempts.
    pub backoff_base: f64,

    /// Upper bound on records fetched from the source.
    pub max_records: usize,

    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Sampling options.
    pub llm: LlmConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model: "llama3.2".to_string(),
            base_url: "http://localhost:11434".to_string(),
            batch_size: 20,
            max_attempts_per_batch: 10,
            backoff_base: 0.0,
            max_records: 1000,
            request_timeout_secs: 60,
            llm: LlmConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts_per_batch = attempts;
        self
    }

    pub fn with_backoff_base(mut self, base: f64) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn with_max_records(mut self, max: usize) -> Self {
        self.max_records = max;
        self
    }

    pub fn with_llm(mut self, llm: LlmConfig) -> Self {
        self.llm = llm;
        self
    }

    /// Reject settings the run loop cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(BatchError::InvalidConfig("model must not be empty".into()));
        }
        if self.batch_size == 0 {
            return Err(BatchError::InvalidConfig("batch_size must be at least 1".into()));
        }
        if self.max_attempts_per_batch == 0 {
            return Err(BatchError::InvalidConfig(
                "max_attempts_per_batch must be at least 1".into(),
            ));
        }
        if !self.backoff_base.is_finite() || self.backoff_base < 0.0 {
            return Err(BatchError::InvalidConfig(format!(
                "backoff_base must be a non-negative number, got {}",
                self.backoff_base
            )));
        }
        if self.max_records == 0 {
            return Err(BatchError::InvalidConfig("max_records must be at least 1".into()));
        }
        Ok(())
    }

    pub fn backoff(&self) -> BackoffConfig {
        BackoffConfig::new(self.backoff_base)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Parse and validate a JSON config. Missing keys take their defaults.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a YAML config. Missing keys take their defaults.
    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(s)
            .map_err(|e| BatchError::InvalidConfig(format!("YAML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, choosing the format from its extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            #[cfg(feature = "yaml")]
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text),
            Some("json") => Self::from_json_str(&text),
            other => Err(BatchError::InvalidConfig(format!(
                "unsupported config format: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }
}
