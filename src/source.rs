//! Record sources.
//!
//! A [`RecordSource`] yields up to `max_records` records, each projected to
//! its title. The source is queried once per run and fully materialized.
//! Any failure here is fatal: the run aborts before a batch is sent.

use crate::error::{BatchError, Result};
use crate::types::Record;
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use tracing::info;

/// Anything that can yield a finite, ordered list of titled records.
pub trait RecordSource: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> String;

    /// Fetch at most `max_records` records, in source order.
    fn fetch(&self, max_records: usize) -> BoxFuture<'_, Result<Vec<Record>>>;
}

/// Records held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    records: Vec<Record>,
}

impl InMemorySource {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Build from bare titles.
    pub fn from_titles<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(titles.into_iter().map(Record::new).collect())
    }
}

impl RecordSource for InMemorySource {
    fn name(&self) -> String {
        "memory".to_string()
    }

    fn fetch(&self, max_records: usize) -> BoxFuture<'_, Result<Vec<Record>>> {
        Box::pin(async move { Ok(self.records.iter().take(max_records).cloned().collect()) })
    }
}

/// Records read from a JSON file: either a single array of objects or
/// newline-delimited objects (e.g. a `mongoexport` dump).
///
/// Each object needs at most a `title` field; other fields are ignored.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(&self, text: &str, max_records: usize) -> Result<Vec<Record>> {
        let trimmed = text.trim_start();
        if trimmed.starts_with('[') {
            let records: Vec<Record> = serde_json::from_str(trimmed).map_err(|e| {
                BatchError::Source(format!("{}: {}", self.path.display(), e))
            })?;
            return Ok(records.into_iter().take(max_records).collect());
        }

        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .take(max_records)
            .map(|(i, line)| {
                serde_json::from_str::<Record>(line).map_err(|e| {
                    BatchError::Source(format!("{}:{}: {}", self.path.display(), i + 1, e))
                })
            })
            .collect()
    }
}

impl RecordSource for JsonFileSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self, max_records: usize) -> BoxFuture<'_, Result<Vec<Record>>> {
        Box::pin(async move {
            let text = tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|e| BatchError::Source(format!("{}: {}", self.path.display(), e)))?;
            let records = self.parse(&text, max_records)?;
            info!(source = %self.path.display(), records = records.len(), "fetched records");
            Ok(records)
        })
    }
}
