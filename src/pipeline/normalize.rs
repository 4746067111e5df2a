//! Result normalization: loosely structured OCR text → rectangular [`Table`].
//!
//! ## Why so defensive?
//!
//! The instruction asks for a bare JSON object, but that is a convention, not
//! a contract. Models wrap the object in ```` ```json ```` fences, add a
//! sentence before it, return numbers instead of strings, or drop `headers`
//! altogether. Every field is therefore treated as optional and its shape is
//! checked before use.
//!
//! ## Steps
//!
//! 1. Join the text blocks in order with `\n`
//! 2. Remove code-fence markers wherever they occur, then trim
//! 3. Parse as JSON, falling back to the outermost `{ … }` span
//! 4. Read optional `headers` and `rows`, defaulting headers to
//!    [`DEFAULT_HEADERS`]
//! 5. Build the table; a header with no data rows is rejected

use crate::error::FileError;
use crate::pipeline::ocr::OcrResponse;
use crate::prompts::DEFAULT_HEADERS;
use crate::table::Table;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Turn an OCR response into a table.
///
/// Fails with [`FileError::MalformedResult`] when the text is not a JSON
/// object of the expected shape or yields no data rows.
pub fn normalize(response: &OcrResponse) -> Result<Table, FileError> {
    let text = response.joined_text();
    let cleaned = strip_code_fences(&text);
    let value = parse_json_object(&cleaned)?;

    let header = match value.get("headers") {
        None | Some(Value::Null) => default_header(),
        Some(Value::Array(items)) if items.is_empty() => default_header(),
        Some(Value::Array(items)) => items.iter().map(cell_text).collect(),
        Some(other) => {
            return Err(FileError::malformed(format!(
                "\"headers\" must be an array, got {}",
                json_type(other)
            )))
        }
    };

    let rows: Vec<Vec<String>> = match value.get("rows") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().map(row_cells).collect(),
        Some(other) => {
            return Err(FileError::malformed(format!(
                "\"rows\" must be an array, got {}",
                json_type(other)
            )))
        }
    };

    if rows.is_empty() {
        return Err(FileError::malformed("no data extracted"));
    }

    debug!(
        "Normalized OCR result: {} columns, {} data rows",
        header.len(),
        rows.len()
    );
    Ok(Table::new(header, rows))
}

// ── Step 2: Strip code fences ────────────────────────────────────────────────

static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```[A-Za-z0-9_+-]*[ \t]*\r?\n?").unwrap());

fn strip_code_fences(input: &str) -> String {
    RE_FENCE.replace_all(input, "").trim().to_string()
}

// ── Step 3: Parse the JSON object ────────────────────────────────────────────

fn parse_json_object(text: &str) -> Result<serde_json::Map<String, Value>, FileError> {
    let value = match serde_json::from_str::<Value>(text) {
        Ok(v) => v,
        Err(first_err) => match outer_braces(text) {
            Some(span) if span.len() < text.len() => serde_json::from_str::<Value>(span)
                .map_err(|_| FileError::malformed(first_err.to_string()))?,
            _ => return Err(FileError::malformed(first_err.to_string())),
        },
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(FileError::malformed(format!(
            "expected a JSON object, got {}",
            json_type(&other)
        ))),
    }
}

/// The span from the first `{` to the last `}`, if any.
fn outer_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

// ── Step 4: Shape the cells ──────────────────────────────────────────────────

fn default_header() -> Vec<String> {
    DEFAULT_HEADERS.iter().map(|h| h.to_string()).collect()
}

fn row_cells(row: &Value) -> Vec<String> {
    match row {
        Value::Array(cells) => cells.iter().map(cell_text).collect(),
        scalar => vec![cell_text(scalar)],
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
