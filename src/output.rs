//! Batch results: per-file outcomes and the ordered ledger.

use crate::error::FileError;
use crate::pipeline::input::MediaKind;
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `success` or `error`, derived from the outcome's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Error,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Success => f.write_str("success"),
            OutcomeStatus::Error => f.write_str("error"),
        }
    }
}

/// Either the extracted table or the reason the file failed, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OutcomeResult {
    Success { table: Table },
    Error { error: FileError },
}

/// Result of processing one file. Created once and never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingOutcome {
    pub file_name: String,
    pub media_kind: MediaKind,
    #[serde(flatten)]
    pub result: OutcomeResult,
}

impl ProcessingOutcome {
    pub fn succeeded(file_name: impl Into<String>, media_kind: MediaKind, table: Table) -> Self {
        Self {
            file_name: file_name.into(),
            media_kind,
            result: OutcomeResult::Success { table },
        }
    }

    pub fn failed(file_name: impl Into<String>, media_kind: MediaKind, error: FileError) -> Self {
        Self {
            file_name: file_name.into(),
            media_kind,
            result: OutcomeResult::Error { error },
        }
    }

    pub fn status(&self) -> OutcomeStatus {
        match self.result {
            OutcomeResult::Success { .. } => OutcomeStatus::Success,
            OutcomeResult::Error { .. } => OutcomeStatus::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == OutcomeStatus::Success
    }

    pub fn table(&self) -> Option<&Table> {
        match &self.result {
            OutcomeResult::Success { table } => Some(table),
            OutcomeResult::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&FileError> {
        match &self.result {
            OutcomeResult::Error { error } => Some(error),
            OutcomeResult::Success { .. } => None,
        }
    }

    /// One-line description for result lists, e.g. `12 rows × 3 columns`
    /// or the error message.
    pub fn describe(&self) -> String {
        match &self.result {
            OutcomeResult::Success { table } => {
                format!("{} rows × {} columns", table.data_row_count(), table.width())
            }
            OutcomeResult::Error { error } => error.to_string(),
        }
    }
}

/// Ordered, append-only record of one batch: one outcome per submitted file,
/// in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLedger {
    outcomes: Vec<ProcessingOutcome>,
}

impl BatchLedger {
    pub(crate) fn with_capacity(n: usize) -> Self {
        Self {
            outcomes: Vec::with_capacity(n),
        }
    }

    pub(crate) fn append(&mut self, outcome: ProcessingOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ProcessingOutcome> {
        self.outcomes.get(index)
    }

    pub fn outcomes(&self) -> &[ProcessingOutcome] {
        &self.outcomes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProcessingOutcome> {
        self.outcomes.iter()
    }

    /// Successful outcomes, in ledger order.
    pub fn successes(&self) -> impl Iterator<Item = &ProcessingOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn summary(&self) -> BatchSummary {
        let succeeded = self.successes().count();
        BatchSummary {
            total: self.outcomes.len(),
            succeeded,
            failed: self.outcomes.len() - succeeded,
        }
    }
}

impl<'a> IntoIterator for &'a BatchLedger {
    type Item = &'a ProcessingOutcome;
    type IntoIter = std::slice::Iter<'a, ProcessingOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.iter()
    }
}

/// Counts for the batch report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} succeeded of {}", self.succeeded, self.total)
    }
}
