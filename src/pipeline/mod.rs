//! Per-file pipeline stages for image/PDF-to-table extraction.
//!
//! Each submodule implements exactly one step, and the orchestrator in
//! [`crate::batch`] drives them once per file, in order.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ ocr ──▶ normalize
//! (path/bytes) (base64) (Messages API) (JSON → Table)
//! ```
//!
//! 1. [`input`]: resolve paths, folders and buffers into [`input::SourceFile`]s
//!    with a declared [`input::MediaKind`]
//! 2. [`encode`]: read the bytes and base64-wrap them for the request body
//! 3. [`ocr`]: one call to the OCR service; the only stage with network I/O
//! 4. [`normalize`]: strip fences, parse the JSON object, shape it into a
//!    rectangular [`crate::table::Table`]

pub mod encode;
pub mod input;
pub mod normalize;
pub mod ocr;
