//! Spreadsheet export: tables → `.xlsx` bytes, and bytes → files on disk.
//!
//! Exports are pure functions of the ledger. Building the workbook never
//! touches the filesystem; [`write_artifact`] is the only writer, and
//! [`write_workbooks`] drives it for a whole ledger.
//!
//! ## Sheet names
//!
//! Excel limits sheet names to 31 characters, forbids `[ ] : * ? / \`, and
//! rejects leading/trailing apostrophes and case-insensitive duplicates.
//! Display names are shaped to fit those rules so an awkward file name never
//! fails a merged export:
//!
//! ```text
//! "receipt: march?.pdf"  ──▶ "receipt_ march_"
//! "a very long scanned invoice name.png" ──▶ "a very long scanned invoice nam"
//! "scan.png", "SCAN.jpg" ──▶ "scan", "SCAN (2)"
//! ```

use crate::error::OcrBatchError;
use crate::output::{BatchLedger, ProcessingOutcome};
use crate::table::Table;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Sheet name used for single-file exports.
pub const SINGLE_SHEET_NAME: &str = "OCR extracted data";

/// File name of the merged workbook.
pub const MERGED_EXPORT_FILE_NAME: &str = "all_ocr_data.xlsx";

/// Longest sheet name Excel accepts.
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Widest column, in character units.
pub const MAX_COLUMN_WIDTH: usize = 50;

static RE_MEDIA_EXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(pdf|jpe?g|png|gif|webp|bmp|tiff?)$").unwrap());

static RE_SHEET_INVALID: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\[\]:*?/\\]").unwrap());

// ── Workbooks ────────────────────────────────────────────────────────────────

/// One-sheet workbook for a single successful outcome.
///
/// Exporting a failed outcome is an [`OcrBatchError::InvalidState`].
pub fn export_one(outcome: &ProcessingOutcome) -> Result<Vec<u8>, OcrBatchError> {
    let table = outcome.table().ok_or_else(|| {
        OcrBatchError::InvalidState(format!(
            "'{}' has no table to export (status: {})",
            outcome.file_name,
            outcome.status()
        ))
    })?;

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SINGLE_SHEET_NAME)?;
    write_table(sheet, table)?;

    let bytes = workbook.save_to_buffer()?;
    debug!("Exported '{}' ({} bytes)", outcome.file_name, bytes.len());
    Ok(bytes)
}

/// One workbook with a sheet per successful outcome, in ledger order.
///
/// Failed outcomes are skipped. With no successes there is nothing to write
/// and [`OcrBatchError::EmptyResult`] is returned.
pub fn export_all(ledger: &BatchLedger) -> Result<Vec<u8>, OcrBatchError> {
    let mut workbook = Workbook::new();
    let mut taken = HashSet::new();
    let mut sheets = 0;

    for outcome in ledger.successes() {
        let Some(table) = outcome.table() else { continue };
        let name = unique_sheet_name(sheet_name_for(&outcome.file_name, sheets), &mut taken);
        let sheet = workbook.add_worksheet();
        sheet.set_name(&name)?;
        write_table(sheet, table)?;
        sheets += 1;
    }

    if sheets == 0 {
        return Err(OcrBatchError::EmptyResult);
    }

    let bytes = workbook.save_to_buffer()?;
    info!(
        "Merged {} of {} results into one workbook ({} bytes)",
        sheets,
        ledger.len(),
        bytes.len()
    );
    Ok(bytes)
}

fn write_table(sheet: &mut Worksheet, table: &Table) -> Result<(), XlsxError> {
    for (r, row) in table.rows().iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            sheet.write_string(r as u32, c as u16, cell)?;
        }
    }
    for (c, width) in column_widths(table).into_iter().enumerate() {
        sheet.set_column_width(c as u16, width as f64)?;
    }
    Ok(())
}

/// Width of each column: the longest cell (header included) plus 2, capped
/// at [`MAX_COLUMN_WIDTH`]. Lengths are counted in characters.
pub fn column_widths(table: &Table) -> Vec<usize> {
    (0..table.width())
        .map(|c| {
            let longest = table
                .rows()
                .iter()
                .map(|row| row[c].chars().count())
                .max()
                .unwrap_or(0);
            (longest + 2).min(MAX_COLUMN_WIDTH)
        })
        .collect()
}

// ── Names ────────────────────────────────────────────────────────────────────

/// `receipt.pdf` → `receipt_OCR.xlsx`.
///
/// A recognised media extension is replaced; any other name keeps its full
/// text and gets the suffix appended.
pub fn single_export_file_name(file_name: &str) -> String {
    format!("{}_OCR.xlsx", RE_MEDIA_EXT.replace(file_name, ""))
}

/// Valid sheet name for the `index`-th (0-based) sheet, before deduplication.
pub fn sheet_name_for(file_name: &str, index: usize) -> String {
    let stem = RE_MEDIA_EXT.replace(file_name, "");
    let cleaned = RE_SHEET_INVALID.replace_all(&stem, "_");
    let truncated: String = cleaned
        .trim_matches('\'')
        .chars()
        .take(MAX_SHEET_NAME_LEN)
        .collect();
    let name = truncated.trim_end_matches('\'');

    if name.trim().is_empty() {
        format!("Sheet{}", index + 1)
    } else {
        name.to_string()
    }
}

/// Append ` (2)`, ` (3)`, … until the name is unused (case-insensitively),
/// shortening the base so the result still fits.
fn unique_sheet_name(base: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(base.to_lowercase()) {
        return base;
    }
    for n in 2.. {
        let suffix = format!(" ({n})");
        let room = MAX_SHEET_NAME_LEN - suffix.chars().count();
        let head: String = base.chars().take(room).collect();
        let candidate = format!("{}{}", head.trim_end_matches('\''), suffix);
        if taken.insert(candidate.to_lowercase()) {
            return candidate;
        }
    }
    unreachable!("sheet name suffixes are unbounded")
}

// ── Writing ──────────────────────────────────────────────────────────────────

/// Write `bytes` to `path`, creating parent directories.
///
/// The bytes go to a temporary file beside the target which is then renamed
/// over it, so readers never see a half-written workbook.
pub async fn write_artifact(path: impl AsRef<Path>, bytes: &[u8]) -> Result<(), OcrBatchError> {
    let path = path.as_ref();
    let write_err = |source| OcrBatchError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::env::current_dir().map_err(write_err)?,
    };
    tokio::fs::create_dir_all(&dir).await.map_err(write_err)?;

    let tmp = tempfile::Builder::new()
        .prefix(".ocr2xlsx-")
        .suffix(".tmp")
        .tempfile_in(&dir)
        .map_err(write_err)?
        .into_temp_path();
    tokio::fs::write(&tmp, bytes).await.map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Which workbooks [`write_workbooks`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkbookSelection {
    /// One `<name>_OCR.xlsx` per successful file.
    pub individual: bool,
    /// One [`MERGED_EXPORT_FILE_NAME`] with a sheet per successful file.
    pub merged: bool,
}

/// What [`write_workbooks`] managed to write.
#[derive(Debug, Default)]
pub struct WriteReport {
    pub written: Vec<PathBuf>,
    /// Display name (or merged file name) and why it was not written.
    pub failed: Vec<(String, OcrBatchError)>,
}

/// Export the ledger's successes into `dir`.
///
/// A workbook that cannot be built or written is recorded in the report and
/// the remaining ones are still written. Per-file names that collide within
/// one call get a ` (n)` suffix.
pub async fn write_workbooks(
    ledger: &BatchLedger,
    dir: &Path,
    selection: WorkbookSelection,
) -> WriteReport {
    let mut report = WriteReport::default();

    if selection.individual {
        let mut used = HashSet::new();
        for outcome in ledger.successes() {
            let path = unique_path(dir, &single_export_file_name(&outcome.file_name), &mut used);
            let result = match export_one(outcome) {
                Ok(bytes) => write_artifact(&path, &bytes).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => report.written.push(path),
                Err(e) => {
                    warn!("Could not write workbook for '{}': {}", outcome.file_name, e);
                    report.failed.push((outcome.file_name.clone(), e));
                }
            }
        }
    }

    if selection.merged {
        let path = dir.join(MERGED_EXPORT_FILE_NAME);
        let result = match export_all(ledger) {
            Ok(bytes) => write_artifact(&path, &bytes).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => report.written.push(path),
            Err(e) => {
                warn!("Could not write {}: {}", MERGED_EXPORT_FILE_NAME, e);
                report.failed.push((MERGED_EXPORT_FILE_NAME.to_string(), e));
            }
        }
    }

    report
}

/// `dir/name`, or `dir/stem (n).xlsx` if an earlier file already claimed it.
fn unique_path(dir: &Path, name: &str, used: &mut HashSet<String>) -> PathBuf {
    if used.insert(name.to_lowercase()) {
        return dir.join(name);
    }
    let stem = name.trim_end_matches(".xlsx");
    for n in 2.. {
        let candidate = format!("{stem} ({n}).xlsx");
        if used.insert(candidate.to_lowercase()) {
            return dir.join(candidate);
        }
    }
    unreachable!("file name suffixes are unbounded")
}
