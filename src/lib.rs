//! # edgequake-ocr2xlsx
//!
//! Batch-extract tables from PDFs and images with a vision LLM and write them
//! to Excel workbooks.
//!
//! Receipts, invoices and scanned forms rarely survive classic OCR with their
//! structure intact. This crate sends each file to the Anthropic Messages API
//! with an instruction asking for a JSON table, normalizes whatever comes
//! back into a rectangular grid, and exports one workbook per file or one
//! merged workbook with a sheet per file.
//!
//! ## Pipeline Overview
//!
//! ```text
//! files / folders
//!  │
//!  ├─ 1. Input      expand paths, pick a media kind per file
//!  ├─ 2. Encode     bytes → base64
//!  ├─ 3. OCR        one Messages API call per file (document or image part)
//!  ├─ 4. Normalize  strip fences, parse JSON, reshape to a Table
//!  ├─ 5. Ledger     one outcome per file, in submission order
//!  └─ 6. Export     per-file `<name>_OCR.xlsx` or merged `all_ocr_data.xlsx`
//! ```
//!
//! Files are processed one at a time. A file that fails records its error in
//! the ledger and the batch moves on.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_ocr2xlsx::{collect_sources, export_all, write_artifact, BatchConfig, BatchOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BatchConfig::builder()
//!         .api_key(std::env::var("ANTHROPIC_API_KEY")?)
//!         .build()?;
//!
//!     let mut batch = BatchOrchestrator::from_config(&config)?;
//!     batch.submit(collect_sources(["receipts/"])?)?;
//!     let ledger = batch.run().await?;
//!
//!     for outcome in ledger {
//!         eprintln!("{}: {}", outcome.file_name, outcome.describe());
//!     }
//!     write_artifact("all_ocr_data.xlsx", &export_all(ledger)?).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr2xlsx` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-ocr2xlsx = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod export;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod table;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{process_file, run_batch, BatchOrchestrator, BatchSnapshot, BatchStatus};
pub use config::{BatchConfig, BatchConfigBuilder};
pub use error::{FileError, OcrBatchError};
pub use export::{
    export_all, export_one, single_export_file_name, write_artifact, write_workbooks,
    WorkbookSelection, WriteReport, MERGED_EXPORT_FILE_NAME,
};
pub use output::{BatchLedger, BatchSummary, OutcomeStatus, ProcessingOutcome};
pub use pipeline::input::{collect_sources, MediaKind, SourceFile, SUPPORTED_FORMATS};
pub use pipeline::ocr::{AnthropicOcrClient, ContentBlock, OcrResponse, OcrService};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback, ProgressState};
pub use table::{RowAdjustments, Table, MAX_CELL_CHARS};
