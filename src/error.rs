use thiserror::Error;

/// Errors produced by the batch runner and its collaborators.
#[derive(Error, Debug)]
pub enum BatchError {
    /// Low-level HTTP transport failure (connection refused, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON parsing failed at the serde level.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem failure while reading records or writing results.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error with status code and response body.
    ///
    /// Returned by [`Backend`](crate::backend::Backend) implementations when
    /// the provider returns a non-success status code.
    #[error("HTTP {status}: {body}")]
    HttpError {
        /// HTTP status code (e.g. 429, 500, 503).
        status: u16,
        /// Response body text.
        body: String,
    },

    /// The model call succeeded but returned no content.
    #[error("model returned no content")]
    EmptyResponse,

    /// The parsed response did not contain one title per record.
    #[error("expected {expected} titles, got {got}")]
    CardinalityMismatch { expected: usize, got: usize },

    /// The record source could not be reached or read. Fatal to the run.
    #[error("record source unavailable: {0}")]
    Source(String),

    /// The run was cancelled via the cancellation flag.
    #[error("run was cancelled")]
    Cancelled,

    /// Invalid configuration detected at build time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl BatchError {
    /// Short label for the attempt-failure kind, used in logs and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            BatchError::Request(_) | BatchError::HttpError { .. } => "transport",
            BatchError::EmptyResponse => "empty_response",
            BatchError::CardinalityMismatch { .. } => "cardinality_mismatch",
            BatchError::Json(_) => "json",
            BatchError::Io(_) => "io",
            BatchError::Source(_) => "source",
            BatchError::Cancelled => "cancelled",
            BatchError::InvalidConfig(_) => "invalid_config",
            BatchError::Other(_) => "other",
        }
    }

    /// How a failed model attempt is classified. Anything that is neither an
    /// empty reply nor a wrong title count is a transport failure.
    pub fn failure_kind(&self) -> &'static str {
        match self {
            BatchError::EmptyResponse => "empty_response",
            BatchError::CardinalityMismatch { .. } => "cardinality_mismatch",
            _ => "transport",
        }
    }
}

impl From<anyhow::Error> for BatchError {
    fn from(err: anyhow::Error) -> Self {
        BatchError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BatchError>;
