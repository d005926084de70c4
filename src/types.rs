use crate::diagnostics::BatchDiagnostics;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Title substituted for records that carry no `title` field.
pub const MISSING_TITLE: &str = "N/A";

/// One source document, projected to its title.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    /// Opaque source identifier (e.g. a Mongo `_id`), kept for diagnostics only.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    /// The record title. `None` when the source document has no title.
    #[serde(default)]
    pub title: Option<String>,
}

impl Record {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: Some(title.into()),
        }
    }

    /// A record with no title; renders as [`MISSING_TITLE`].
    pub fn untitled() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: Value) -> Self {
        self.id = Some(id);
        self
    }

    /// The title, or [`MISSING_TITLE`] when absent.
    pub fn title_or_default(&self) -> &str {
        self.title.as_deref().unwrap_or(MISSING_TITLE)
    }
}

/// A contiguous group of records submitted to the model in one prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// 1-based position of the batch in the first pass.
    pub number: usize,
    /// The records, in source order.
    pub records: Vec<Record>,
}

impl Batch {
    pub fn new(number: usize, records: Vec<Record>) -> Self {
        Self { number, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record titles in order, with the sentinel for missing ones.
    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(Record::title_or_default)
    }
}

/// Terminal result of driving one batch through the model.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// The model produced exactly one title per record.
    Success(Vec<String>),
    /// Every attempt failed; carries the original batch unchanged.
    Failure(Batch),
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Success(_))
    }
}

/// Aggregate result of a full scheduler run.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    /// Titles in batch completion order.
    pub collected_titles: Vec<String>,

    /// Batches that failed both the first pass and the retry pass.
    pub unresolved_batches: Vec<Batch>,

    /// Number of batches submitted in the first pass.
    pub first_pass_batches: usize,

    /// Number of batches deferred to the retry pass.
    pub deferred_batches: usize,

    /// Number of deferred batches that succeeded in the retry pass.
    pub recovered_batches: usize,

    /// Attempt statistics summed over every batch invocation.
    pub diagnostics: BatchDiagnostics,
}

impl RunResult {
    /// Collected titles plus records left in unresolved batches. Equals the
    /// number of records fetched once a run has finished.
    pub fn accounted_records(&self) -> usize {
        self.collected_titles.len() + self.unresolved_record_count()
    }

    pub fn unresolved_record_count(&self) -> usize {
        self.unresolved_batches.iter().map(Batch::len).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.unresolved_batches.is_empty()
    }
}
