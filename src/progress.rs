//! Progress-callback trait for per-file batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::BatchConfigBuilder::progress_callback`] (or
//! [`crate::batch::BatchOrchestrator::with_progress`]) to receive events as
//! the orchestrator works through the queue.
//!
//! Progress is a side channel: events describe what is happening, while the
//! ledger remains the only record of results. Callers can forward events to a
//! terminal progress bar, a channel, or a log without the library knowing.
//!
//! # Example
//!
//! ```rust
//! use edgequake_ocr2xlsx::{BatchProgressCallback, ProgressState};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counter(AtomicUsize);
//!
//! impl BatchProgressCallback for Counter {
//!     fn on_file_start(&self, state: &ProgressState) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {}", state.current, state.total, state.file_name);
//!     }
//! }
//! ```

use crate::output::ProcessingOutcome;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The file currently in flight.
///
/// Ephemeral: a new value is produced for every file and none of them is
/// part of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    /// 1-indexed position of the file in the batch.
    pub current: usize,
    /// Number of files in the batch.
    pub total: usize,
    /// Display name of the file.
    pub file_name: String,
}

/// Called by the orchestrator as it processes each file.
///
/// Files are processed one at a time, so calls never overlap; the trait is
/// still `Send + Sync` so implementations can be shared with other tasks.
/// All methods have default no-op implementations.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first file.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called before the file is encoded and sent.
    fn on_file_start(&self, state: &ProgressState) {
        let _ = state;
    }

    /// Called after the file's outcome is known, success or error.
    fn on_file_complete(&self, state: &ProgressState, outcome: &ProcessingOutcome) {
        let _ = (state, outcome);
    }

    /// Called once after every file has been attempted.
    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
