//! Batch orchestration: drive every file through encode → OCR → normalize.
//!
//! Two entry points share one loop:
//!
//! * [`run_batch`]: a stateless reducer from a file list to a [`BatchLedger`].
//! * [`BatchOrchestrator`]: owns the submission queue, the batch status, the
//!   in-flight indicator and the last ledger, for callers that drive a batch
//!   interactively (submit, edit, run, inspect).
//!
//! Files are processed strictly one after another. A failure in one file is
//! recorded as that file's outcome and the loop moves on; nothing but a panic
//! stops a batch early.

use crate::config::BatchConfig;
use crate::error::{FileError, OcrBatchError};
use crate::output::{BatchLedger, BatchSummary, ProcessingOutcome};
use crate::pipeline::encode::encode;
use crate::pipeline::input::{SourceFile, SUPPORTED_FORMATS};
use crate::pipeline::normalize::normalize;
use crate::pipeline::ocr::{AnthropicOcrClient, OcrService};
use crate::progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback, ProgressState};
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

// ── Stateless reducer ────────────────────────────────────────────────────────

/// Run one file through the chain and capture the result as an outcome.
pub async fn process_file(service: &dyn OcrService, file: &SourceFile) -> ProcessingOutcome {
    match extract_table(service, file).await {
        Ok(table) => ProcessingOutcome::succeeded(file.name(), file.media_kind(), table),
        Err(e) => ProcessingOutcome::failed(file.name(), file.media_kind(), e),
    }
}

async fn extract_table(service: &dyn OcrService, file: &SourceFile) -> Result<Table, FileError> {
    let payload = encode(file).await?;
    let response = service
        .extract(&payload, file.media_kind(), file.name())
        .await?;
    normalize(&response)
}

/// Process `files` in order and return one outcome per file.
///
/// `ledger[i]` always describes `files[i]`. Progress events are emitted
/// before and after each file; they never affect the ledger.
pub async fn run_batch(
    service: &dyn OcrService,
    files: &[SourceFile],
    progress: &dyn BatchProgressCallback,
) -> BatchLedger {
    drive(service, files, progress, |_| {}).await
}

/// The shared loop. `track` sees the in-flight state, then `None` at the end.
async fn drive(
    service: &dyn OcrService,
    files: &[SourceFile],
    progress: &dyn BatchProgressCallback,
    mut track: impl FnMut(Option<ProgressState>),
) -> BatchLedger {
    let total = files.len();
    let start = Instant::now();
    info!("Starting batch: {} files", total);
    progress.on_batch_start(total);

    let mut ledger = BatchLedger::with_capacity(total);
    for (i, file) in files.iter().enumerate() {
        let state = ProgressState {
            current: i + 1,
            total,
            file_name: file.name().to_string(),
        };
        track(Some(state.clone()));
        progress.on_file_start(&state);

        let file_start = Instant::now();
        let outcome = process_file(service, file).await;
        match outcome.error() {
            None => info!(
                "[{}/{}] {}: {} ({:?})",
                state.current,
                total,
                outcome.file_name,
                outcome.describe(),
                file_start.elapsed()
            ),
            Some(e) => warn!("[{}/{}] {} failed: {}", state.current, total, outcome.file_name, e),
        }

        progress.on_file_complete(&state, &outcome);
        ledger.append(outcome);
    }
    track(None);

    let summary = ledger.summary();
    info!("Batch finished: {} in {:?}", summary, start.elapsed());
    progress.on_batch_complete(summary.total, summary.succeeded);
    ledger
}

// ── Stateful orchestrator ────────────────────────────────────────────────────

/// Lifecycle of a [`BatchOrchestrator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum BatchStatus {
    Idle,
    Processing,
    Completed,
    /// A submission or run was refused before any file was processed.
    Error(String),
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStatus::Idle => f.write_str("idle"),
            BatchStatus::Processing => f.write_str("processing"),
            BatchStatus::Completed => f.write_str("completed"),
            BatchStatus::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

/// Read-only view of an orchestrator, e.g. for `--json` status output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSnapshot {
    pub status: BatchStatus,
    pub queued: usize,
    pub in_flight: Option<ProgressState>,
    pub summary: Option<BatchSummary>,
}

/// Owns one batch: the queued files, its status and its ledger.
///
/// ```text
/// idle ──run──▶ processing ──▶ completed ──run──▶ processing …
///   │                                  ▲
///   └─submit([]) / run(empty)──▶ error─┘ (submit recovers)
/// ```
pub struct BatchOrchestrator {
    service: Arc<dyn OcrService>,
    progress: ProgressCallback,
    status: BatchStatus,
    queue: Vec<SourceFile>,
    ledger: Option<BatchLedger>,
    in_flight: Option<ProgressState>,
}

impl fmt::Debug for BatchOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchOrchestrator")
            .field("status", &self.status)
            .field("queued", &self.queue.len())
            .field("ledger", &self.ledger.as_ref().map(BatchLedger::summary))
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

impl BatchOrchestrator {
    pub fn new(service: Arc<dyn OcrService>) -> Self {
        Self {
            service,
            progress: Arc::new(NoopProgressCallback),
            status: BatchStatus::Idle,
            queue: Vec::new(),
            ledger: None,
            in_flight: None,
        }
    }

    /// Orchestrator backed by [`AnthropicOcrClient`], using the config's
    /// progress callback if it has one.
    pub fn from_config(config: &BatchConfig) -> Result<Self, OcrBatchError> {
        let client = AnthropicOcrClient::new(config)?;
        let mut orchestrator = Self::new(Arc::new(client));
        if let Some(ref cb) = config.progress_callback {
            orchestrator.progress = Arc::clone(cb);
        }
        Ok(orchestrator)
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    /// Replace the queue with `files` and discard any previous ledger.
    ///
    /// An empty list puts the orchestrator in the error state.
    pub fn submit(&mut self, files: Vec<SourceFile>) -> Result<(), OcrBatchError> {
        self.ledger = None;
        self.in_flight = None;
        self.queue = files;
        if self.queue.is_empty() {
            return Err(self.refuse_empty());
        }
        debug!("Queued {} files", self.queue.len());
        self.status = BatchStatus::Idle;
        Ok(())
    }

    /// Drop one queued file. The previous ledger no longer matches the queue
    /// and is discarded.
    pub fn remove(&mut self, index: usize) -> Result<SourceFile, OcrBatchError> {
        if self.status == BatchStatus::Processing {
            return Err(OcrBatchError::InvalidState(
                "cannot edit the queue while a batch is processing".into(),
            ));
        }
        if index >= self.queue.len() {
            return Err(OcrBatchError::InvalidState(format!(
                "no queued file at index {index} ({} queued)",
                self.queue.len()
            )));
        }
        let removed = self.queue.remove(index);
        debug!("Removed '{}' from the queue", removed.name());
        self.ledger = None;
        self.status = BatchStatus::Idle;
        Ok(removed)
    }

    /// Process the queued files and return the resulting ledger.
    ///
    /// Runs from `Idle` or `Completed`; a completed batch can be re-run with
    /// the same files. If a previous `run` future was dropped mid-batch the
    /// orchestrator stays in `Processing` and this returns `InvalidState`
    /// until the files are submitted again.
    pub async fn run(&mut self) -> Result<&BatchLedger, OcrBatchError> {
        if self.status == BatchStatus::Processing {
            return Err(OcrBatchError::InvalidState(
                "a batch is already processing; submit the files again to restart".into(),
            ));
        }
        if self.queue.is_empty() {
            return Err(self.refuse_empty());
        }

        self.status = BatchStatus::Processing;
        self.ledger = None;

        let in_flight = &mut self.in_flight;
        let ledger = drive(
            self.service.as_ref(),
            &self.queue,
            self.progress.as_ref(),
            |state| *in_flight = state,
        )
        .await;

        self.status = BatchStatus::Completed;
        let ledger: &BatchLedger = self.ledger.insert(ledger);
        Ok(ledger)
    }

    fn refuse_empty(&mut self) -> OcrBatchError {
        let err = OcrBatchError::NoFiles {
            supported: SUPPORTED_FORMATS.to_string(),
        };
        self.status = BatchStatus::Error(err.to_string());
        err
    }

    pub fn status(&self) -> &BatchStatus {
        &self.status
    }

    /// The file currently being processed, if any.
    pub fn progress(&self) -> Option<&ProgressState> {
        self.in_flight.as_ref()
    }

    /// Ledger of the last completed run.
    pub fn ledger(&self) -> Option<&BatchLedger> {
        self.ledger.as_ref()
    }

    pub fn queued(&self) -> &[SourceFile] {
        &self.queue
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        BatchSnapshot {
            status: self.status.clone(),
            queued: self.queue.len(),
            in_flight: self.in_flight.clone(),
            summary: self.ledger.as_ref().map(BatchLedger::summary),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::EncodedPayload;
    use crate::pipeline::input::MediaKind;
    use crate::pipeline::ocr::OcrResponse;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Answers by file name and records every call in a shared log.
    struct Scripted {
        replies: HashMap<String, Result<OcrResponse, FileError>>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Scripted {
        fn new(log: Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                replies: HashMap::new(),
                log,
            }
        }

        fn reply(mut self, name: &str, reply: Result<OcrResponse, FileError>) -> Self {
            self.replies.insert(name.to_string(), reply);
            self
        }
    }

    #[async_trait]
    impl OcrService for Scripted {
        async fn extract(
            &self,
            _payload: &EncodedPayload,
            _media_kind: MediaKind,
            file_name: &str,
        ) -> Result<OcrResponse, FileError> {
            self.log.lock().unwrap().push(format!("ocr {file_name}"));
            self.replies
                .get(file_name)
                .cloned()
                .unwrap_or_else(|| Ok(OcrResponse::from_text(r#"{"rows":[["x","1"]]}"#)))
        }
    }

    struct Never;

    #[async_trait]
    impl OcrService for Never {
        async fn extract(
            &self,
            _payload: &EncodedPayload,
            _media_kind: MediaKind,
            _file_name: &str,
        ) -> Result<OcrResponse, FileError> {
            std::future::pending().await
        }
    }

    struct LogProgress(Arc<Mutex<Vec<String>>>);

    impl BatchProgressCallback for LogProgress {
        fn on_file_start(&self, state: &ProgressState) {
            self.0
                .lock()
                .unwrap()
                .push(format!("start {}/{} {}", state.current, state.total, state.file_name));
        }

        fn on_file_complete(&self, state: &ProgressState, outcome: &ProcessingOutcome) {
            self.0
                .lock()
                .unwrap()
                .push(format!("done {} {}", state.file_name, outcome.status()));
        }
    }

    fn file(name: &str) -> SourceFile {
        let kind = MediaKind::from_path(std::path::Path::new(name)).unwrap();
        SourceFile::with_kind(name, kind, vec![0u8, 1, 2])
    }

    fn log() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[tokio::test]
    async fn ledger_matches_input_order() {
        let service = Scripted::new(log());
        let files = vec![file("a.pdf"), file("b.png"), file("c.jpg")];
        let ledger = run_batch(&service, &files, &NoopProgressCallback).await;

        assert_eq!(ledger.len(), 3);
        for (outcome, f) in ledger.iter().zip(&files) {
            assert_eq!(outcome.file_name, f.name());
            assert_eq!(outcome.media_kind, f.media_kind());
        }
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_batch() {
        let service = Scripted::new(log())
            .reply(
                "b.png",
                Err(FileError::Remote {
                    status: Some(500),
                    message: "boom".into(),
                }),
            )
            .reply("c.gif", Ok(OcrResponse::from_text("not json")));
        let files = vec![file("a.pdf"), file("b.png"), file("c.gif"), file("d.webp")];
        let ledger = run_batch(&service, &files, &NoopProgressCallback).await;

        let statuses: Vec<String> = ledger.iter().map(|o| o.status().to_string()).collect();
        assert_eq!(statuses, vec!["success", "error", "error", "success"]);
        assert_eq!(ledger.get(1).unwrap().describe(), "API error (500): boom");
        assert!(matches!(
            ledger.get(2).unwrap().error(),
            Some(FileError::MalformedResult { .. })
        ));
    }

    #[tokio::test]
    async fn unreadable_file_is_an_io_outcome() {
        let service = Scripted::new(log());
        let missing = SourceFile::from_path("/no/such/dir/scan.png").unwrap();
        let ledger = run_batch(&service, &[missing], &NoopProgressCallback).await;
        assert!(matches!(ledger.get(0).unwrap().error(), Some(FileError::Io { .. })));
    }

    #[tokio::test]
    async fn progress_is_announced_before_the_call() {
        let events = log();
        let service = Scripted::new(Arc::clone(&events));
        let progress = LogProgress(Arc::clone(&events));
        run_batch(&service, &[file("a.pdf"), file("b.png")], &progress).await;

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                "start 1/2 a.pdf",
                "ocr a.pdf",
                "done a.pdf success",
                "start 2/2 b.png",
                "ocr b.png",
                "done b.png success",
            ]
        );
    }

    #[tokio::test]
    async fn orchestrator_lifecycle() {
        let mut orch = BatchOrchestrator::new(Arc::new(Scripted::new(log())));
        assert_eq!(orch.status(), &BatchStatus::Idle);

        orch.submit(vec![file("a.pdf"), file("b.png")]).unwrap();
        assert_eq!(orch.queued().len(), 2);

        let ledger = orch.run().await.unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(orch.status(), &BatchStatus::Completed);
        assert!(orch.progress().is_none());
        assert_eq!(orch.snapshot().summary.unwrap().succeeded, 2);

        // Completed batches can be re-run.
        assert_eq!(orch.run().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_submission_is_an_error_state() {
        let mut orch = BatchOrchestrator::new(Arc::new(Scripted::new(log())));
        let err = orch.submit(Vec::new()).unwrap_err();
        assert!(matches!(err, OcrBatchError::NoFiles { .. }));
        assert!(matches!(orch.status(), BatchStatus::Error(_)));

        let err = orch.run().await.unwrap_err();
        assert!(matches!(err, OcrBatchError::NoFiles { .. }));
        assert!(orch.ledger().is_none());

        orch.submit(vec![file("a.pdf")]).unwrap();
        assert_eq!(orch.status(), &BatchStatus::Idle);
    }

    #[tokio::test]
    async fn remove_edits_queue_and_discards_ledger() {
        let mut orch = BatchOrchestrator::new(Arc::new(Scripted::new(log())));
        orch.submit(vec![file("a.pdf"), file("b.png")]).unwrap();
        orch.run().await.unwrap();

        let removed = orch.remove(0).unwrap();
        assert_eq!(removed.name(), "a.pdf");
        assert!(orch.ledger().is_none());
        assert_eq!(orch.status(), &BatchStatus::Idle);
        assert!(matches!(orch.remove(5), Err(OcrBatchError::InvalidState(_))));

        let ledger = orch.run().await.unwrap();
        assert_eq!(ledger.get(0).unwrap().file_name, "b.png");
    }

    #[tokio::test]
    async fn dropped_run_leaves_processing_until_resubmitted() {
        let mut orch = BatchOrchestrator::new(Arc::new(Never));
        orch.submit(vec![file("a.pdf")]).unwrap();

        let timed_out = tokio::time::timeout(Duration::from_millis(20), orch.run()).await;
        assert!(timed_out.is_err());
        assert_eq!(orch.status(), &BatchStatus::Processing);
        assert_eq!(orch.progress().unwrap().file_name, "a.pdf");

        assert!(matches!(orch.run().await, Err(OcrBatchError::InvalidState(_))));
        assert!(matches!(orch.remove(0), Err(OcrBatchError::InvalidState(_))));

        orch.submit(vec![file("a.pdf")]).unwrap();
        assert_eq!(orch.status(), &BatchStatus::Idle);
    }

    #[test]
    fn status_serialises_with_message() {
        let v = serde_json::to_value(BatchStatus::Error("nope".into())).unwrap();
        assert_eq!(v["state"], "error");
        assert_eq!(v["message"], "nope");
        let v = serde_json::to_value(BatchStatus::Completed).unwrap();
        assert_eq!(v["state"], "completed");
    }
}
