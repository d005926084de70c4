//! Final run report.
//!
//! [`Report`] turns a [`RunResult`] and the number of records originally
//! fetched into counts, a listing of every title left unresolved, and the
//! numbered list of collected titles.

use crate::error::Result;
use crate::types::RunResult;
use std::fmt;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Outcome summary of a run.
///
/// # Example
///
/// ```
/// use llm_batch::report::Report;
/// use llm_batch::types::RunResult;
///
/// let result = RunResult {
///     collected_titles: vec!["Alien".into(), "Heat".into()],
///     ..Default::default()
/// };
/// let report = Report::new(&result, 3);
/// assert_eq!(report.missing(), 1);
/// assert!(report.to_string().contains("1: Alien"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Report<'a> {
    result: &'a RunResult,
    total: usize,
}

impl<'a> Report<'a> {
    pub fn new(result: &'a RunResult, total: usize) -> Self {
        Self { result, total }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn collected(&self) -> usize {
        self.result.collected_titles.len()
    }

    pub fn missing(&self) -> usize {
        self.total.saturating_sub(self.collected())
    }

    /// Titles of every unresolved batch, keyed by batch number.
    pub fn unresolved(&self) -> Vec<(usize, Vec<&'a str>)> {
        self.result
            .unresolved_batches
            .iter()
            .map(|b| (b.number, b.titles().collect()))
            .collect()
    }

    /// Write collected titles, one per line, in collected order.
    pub fn write_titles(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut out = BufWriter::new(file);
        for title in &self.result.collected_titles {
            writeln!(out, "{}", title)?;
        }
        out.flush()?;
        Ok(())
    }

    fn write_summary(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let diag = &self.result.diagnostics;
        writeln!(
            f,
            "Batches: {} in first pass, {} deferred, {} recovered, {} unresolved.",
            self.result.first_pass_batches,
            self.result.deferred_batches,
            self.result.recovered_batches,
            self.result.unresolved_batches.len()
        )?;
        writeln!(
            f,
            "Model calls: {} ({} transport errors, {} empty, {} wrong count).",
            diag.attempts, diag.transport_errors, diag.empty_responses, diag.cardinality_mismatches
        )
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_summary(f)?;

        if self.result.deferred_batches > 0 {
            let unresolved = self.unresolved();
            if unresolved.is_empty() {
                writeln!(f, "\nAll batches processed successfully after retries.")?;
            } else {
                writeln!(
                    f,
                    "\n{} batch(es) failed after retries. Please inspect manually.",
                    unresolved.len()
                )?;
                for (number, titles) in unresolved {
                    writeln!(f, "\nFailed Batch {}:", number)?;
                    for title in titles {
                        writeln!(f, "{}", title)?;
                    }
                }
            }
        }

        if self.missing() == 0 {
            writeln!(f, "\nAll {} titles have been successfully collected.", self.total)?;
        } else {
            writeln!(
                f,
                "\nTotal titles collected: {} out of {}.",
                self.collected(),
                self.total
            )?;
            writeln!(f, "Missing {} titles.", self.missing())?;
        }

        writeln!(f, "\nHere is the complete list of titles:")?;
        for (idx, title) in self.result.collected_titles.iter().enumerate() {
            writeln!(f, "{}: {}", idx + 1, title)?;
        }
        Ok(())
    }
}
