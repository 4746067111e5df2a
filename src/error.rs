//! Error types for the edgequake-ocr2xlsx library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`OcrBatchError`] — **Fatal**: the requested operation cannot proceed
//!   at all (nothing submitted, unsupported input, exporting a failed result,
//!   bad configuration). Returned directly to the caller and never recorded in
//!   a ledger.
//!
//! * [`FileError`] — **Non-fatal**: one file failed somewhere in the
//!   encode → OCR → normalize chain. Stored inside
//!   [`crate::output::ProcessingOutcome`] so the rest of the batch carries on
//!   and the caller sees exactly which file failed and why.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-ocr2xlsx library.
///
/// Per-file failures use [`FileError`] and live in the batch ledger instead.
#[derive(Debug, Error)]
pub enum OcrBatchError {
    // ── Submission errors ─────────────────────────────────────────────────
    /// A batch was started with an empty file list.
    #[error("No files submitted.\nSelect at least one file ({supported}).")]
    NoFiles { supported: String },

    /// Input paths were given but none of them is a supported file.
    #[error("No supported files found ({supported})")]
    NoSupportedFiles { supported: String },

    /// A single file has a media kind outside the supported set.
    #[error("Unsupported file type for '{name}' ({kind}).\nSupported: {supported}")]
    UnsupportedMediaKind {
        name: String,
        kind: String,
        supported: String,
    },

    /// An input path does not exist.
    #[error("Input not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// An input directory could not be listed.
    #[error("Failed to read directory '{path}': {source}")]
    DirectoryReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Lifecycle errors ──────────────────────────────────────────────────
    /// The operation was invoked on data in the wrong lifecycle state,
    /// e.g. exporting a failed outcome.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A merged export was requested but no file succeeded.
    #[error("No successful results to export")]
    EmptyResult,

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// The spreadsheet writer rejected the workbook.
    #[error("Failed to build workbook: {0}")]
    Workbook(String),

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<rust_xlsxwriter::XlsxError> for OcrBatchError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        OcrBatchError::Workbook(e.to_string())
    }
}

/// A non-fatal error for a single file.
///
/// Captured by the batch orchestrator and stored in the file's
/// [`crate::output::ProcessingOutcome`]; the batch continues with the next file.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileError {
    /// The source bytes could not be read.
    #[error("Cannot read '{file}': {detail}")]
    Io { file: String, detail: String },

    /// The OCR service answered with a non-success status, or the call never
    /// completed (`status` is `None` for transport failures and timeouts).
    #[error("API error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Remote { status: Option<u16>, message: String },

    /// The OCR service succeeded but returned no content blocks.
    #[error("The OCR service returned no content")]
    EmptyResponse,

    /// Content came back but could not be turned into a usable table.
    #[error("Failed to parse OCR result: {detail}")]
    MalformedResult { detail: String },
}

impl FileError {
    pub(crate) fn malformed(detail: impl Into<String>) -> Self {
        FileError::MalformedResult {
            detail: detail.into(),
        }
    }
}
